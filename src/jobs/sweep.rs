use futures::TryStreamExt;
use tracing::info;

use super::JobSummary;
use crate::board::BoardSync;
use crate::error::Result;
use crate::model::{Card, CardPosition};

/// Move the cards of closed issues from every other column to the bottom of
/// the terminal column.
pub async fn sweep_closed(sync: &BoardSync, board: &str, terminal: &str) -> Result<JobSummary> {
    let mut summary = JobSummary::new("sweep-closed");
    let project = sync.project(board).await?;
    let terminal = sync.column(&project, terminal).await?;

    for column in sync.columns(&project).await? {
        if column.id == terminal.id {
            continue;
        }
        // read the whole column before moving anything out of it
        let cards: Vec<Card> = match sync.tracker().get_cards(&column).try_collect().await {
            Ok(cards) => cards,
            Err(e) => {
                summary.fail(format!("column {}", column.name), &e);
                continue;
            }
        };
        for card in &cards {
            let issue = match sync.issue_for_card(card).await {
                Ok(Some(issue)) => issue,
                Ok(None) => continue,
                Err(e) => {
                    summary.fail(format!("card {}", card.id), &e);
                    continue;
                }
            };
            if issue.is_open() {
                summary.skipped += 1;
                continue;
            }
            match sync
                .tracker()
                .move_card(card, &terminal, CardPosition::Bottom)
                .await
            {
                Ok(()) => {
                    info!(issue = issue.number, from = %column.name, to = %terminal.name, "swept card");
                    summary.changed += 1;
                }
                Err(e) => summary.fail(format!("issue #{}", issue.number), &e),
            }
        }
    }
    Ok(summary)
}
