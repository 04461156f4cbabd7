use tracing::info;

use super::BoardSync;
use crate::error::Result;
use crate::model::{Card, CardPosition, Column, Issue, Project};

impl BoardSync {
    /// Make sure exactly one card for `issue` sits in `target`.
    ///
    /// An existing card in the target column is left alone, a card elsewhere on
    /// the board is moved, and a missing card is created at the top.
    pub async fn ensure_card_in_column(
        &self,
        project: &Project,
        issue: &Issue,
        target: &Column,
        position: CardPosition,
    ) -> Result<Card> {
        match self.locate_card(project, issue).await? {
            Some(card) if card.column_id == target.id => {
                info!(issue = issue.number, column = %target.name, "card already in place");
                Ok(card)
            }
            Some(mut card) => {
                self.tracker().move_card(&card, target, position).await?;
                info!(
                    issue = issue.number,
                    column = %target.name,
                    %position,
                    "moved card"
                );
                card.column_id = target.id;
                Ok(card)
            }
            None => {
                let card = self.tracker().create_card(target, issue).await?;
                info!(issue = issue.number, column = %target.name, "created card");
                Ok(card)
            }
        }
    }

    /// Resolve `board`/`column` by name and ensure the issue's card sits there.
    pub async fn move_issue_to_column(
        &self,
        number: u64,
        board: &str,
        column: &str,
        position: CardPosition,
    ) -> Result<Card> {
        let issue = self.issue(number).await?;
        let project = self.project(board).await?;
        let target = self.column(&project, column).await?;
        self.ensure_card_in_column(&project, &issue, &target, position)
            .await
    }
}
