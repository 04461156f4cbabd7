use futures::TryStreamExt;
use tracing::{debug, info};

use super::JobSummary;
use crate::board::BoardSync;
use crate::error::Result;
use crate::model::{Card, IssueUpdate};

/// Comment on and close every open issue whose card sits in `column` of
/// `board`. Issues that are already closed are left alone.
pub async fn close_done(
    sync: &BoardSync,
    board: &str,
    column: &str,
    comment: &str,
) -> Result<JobSummary> {
    let mut summary = JobSummary::new("close-done");
    let project = sync.project(board).await?;
    let terminal = sync.column(&project, column).await?;
    let cards: Vec<Card> = sync.tracker().get_cards(&terminal).try_collect().await?;

    for card in &cards {
        let issue = match sync.issue_for_card(card).await {
            Ok(Some(issue)) => issue,
            Ok(None) => continue,
            Err(e) => {
                summary.fail(format!("card {}", card.id), &e);
                continue;
            }
        };
        if !issue.is_open() {
            debug!(issue = issue.number, "already closed");
            summary.skipped += 1;
            continue;
        }

        let closed = async {
            sync.tracker().comment(issue.number, comment).await?;
            sync.tracker()
                .update_issue(issue.number, &IssueUpdate::close())
                .await
        }
        .await;
        match closed {
            Ok(()) => {
                info!(issue = issue.number, title = %issue.title, "closed issue");
                summary.changed += 1;
            }
            Err(e) => summary.fail(format!("issue #{}", issue.number), &e),
        }
    }
    Ok(summary)
}
