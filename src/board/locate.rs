use futures::TryStreamExt;
use tracing::debug;

use super::BoardSync;
use crate::error::Result;
use crate::model::{Card, Column, Issue, Project};

impl BoardSync {
    /// Find the card for `issue` anywhere on `project`.
    ///
    /// Columns are scanned in board order and each column's cards top to
    /// bottom; the first card pointing at the issue wins. Card pages are pulled
    /// only until a match turns up.
    pub async fn locate_card(&self, project: &Project, issue: &Issue) -> Result<Option<Card>> {
        for column in self.columns(project).await? {
            if let Some(card) = self.locate_card_in_column(&column, &issue.url).await? {
                debug!(issue = issue.number, column = %column.name, card = card.id, "located card");
                return Ok(Some(card));
            }
        }
        debug!(issue = issue.number, project = %project.name, "no card on board");
        Ok(None)
    }

    pub async fn locate_card_in_column(
        &self,
        column: &Column,
        issue_url: &str,
    ) -> Result<Option<Card>> {
        let mut cards = self.tracker().get_cards(column);
        while let Some(card) = cards.try_next().await? {
            if card.is_for(issue_url) {
                return Ok(Some(card));
            }
        }
        Ok(None)
    }
}
