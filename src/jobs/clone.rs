use std::collections::HashSet;

use futures::TryStreamExt;
use tracing::info;

use super::JobSummary;
use crate::board::BoardSync;
use crate::error::Result;
use crate::model::{Card, Column, Project};

/// Copy every column and issue card of `source` into `destination`.
///
/// The destination board and columns are created when missing. Cards already
/// present in a destination column are skipped, and the destination keeps the
/// source's top-to-bottom card order. The destination board is closed at the
/// end.
pub async fn clone_board(sync: &BoardSync, source: &str, destination: &str) -> Result<JobSummary> {
    let mut summary = JobSummary::new("clone-board");
    let source = sync.project(source).await?;
    let target = find_or_create_board(sync, &source, destination).await?;

    let mut target_columns: Vec<Column> = sync.tracker().get_columns(&target).try_collect().await?;

    for column in sync.columns(&source).await? {
        let target_column = match target_columns.iter().find(|c| c.is_named(&column.name)) {
            Some(existing) => existing.clone(),
            None => match sync.tracker().create_column(&target, &column.name).await {
                Ok(created) => {
                    info!(board = %target.name, column = %created.name, "created column");
                    target_columns.push(created.clone());
                    created
                }
                Err(e) => {
                    summary.fail(format!("column {}", column.name), &e);
                    continue;
                }
            },
        };
        if let Err(e) = clone_column(sync, &column, &target_column, &mut summary).await {
            summary.fail(format!("column {}", column.name), &e);
        }
    }

    sync.tracker().close_project(&target).await?;
    info!(board = %target.name, %summary, "closed cloned board");
    Ok(summary)
}

async fn find_or_create_board(sync: &BoardSync, source: &Project, name: &str) -> Result<Project> {
    match sync.project(name).await {
        Ok(project) => Ok(project),
        Err(e) if e.is_not_found() => {
            let body = format!("Cloned from {}", source.name);
            let project = sync.tracker().create_project(name, &body).await?;
            info!(board = %project.name, "created board");
            Ok(project)
        }
        Err(e) => Err(e),
    }
}

async fn clone_column(
    sync: &BoardSync,
    source: &Column,
    target: &Column,
    summary: &mut JobSummary,
) -> Result<()> {
    let mut present: HashSet<String> = sync
        .tracker()
        .get_cards(target)
        .try_filter_map(|card| futures::future::ready(Ok(card.content_url)))
        .try_collect()
        .await?;
    let cards: Vec<Card> = sync.tracker().get_cards(source).try_collect().await?;

    // new cards land on top, so walk the source bottom-up
    for card in cards.iter().rev() {
        let Some(url) = card.content_url.as_deref() else {
            continue;
        };
        if present.contains(url) {
            summary.skipped += 1;
            continue;
        }
        let issue = match sync.issue_for_url(url).await {
            Ok(issue) => issue,
            Err(e) => {
                summary.fail(format!("card {} ({url})", card.id), &e);
                continue;
            }
        };
        match sync.tracker().create_card(target, &issue).await {
            Ok(_) => {
                info!(issue = issue.number, column = %target.name, "cloned card");
                present.insert(issue.url.clone());
                summary.changed += 1;
            }
            Err(e) => summary.fail(format!("issue #{}", issue.number), &e),
        }
    }
    Ok(())
}
