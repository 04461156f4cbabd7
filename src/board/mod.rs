//! Board synchronization core: resolving boards, columns and issues, finding an
//! issue's card, and placing it in a column.
//!
//! A [`BoardSync`] lives for one command or one webhook delivery. Its memoized
//! lookups (issue by URL, columns per board, column and board by id) are never
//! shared beyond that.

pub mod cache;
mod locate;
mod upsert;

use std::sync::Arc;

use futures::TryStreamExt;

use crate::config::BoardSettings;
use crate::error::{EntityKind, Result, TrackerError};
use crate::model::{Card, Column, Issue, Project};
use crate::providers::Tracker;
use cache::Memo;

pub struct BoardSync {
    tracker: Arc<dyn Tracker>,
    settings: BoardSettings,
    issues: Memo<String, Issue>,
    columns: Memo<u64, Vec<Column>>,
    columns_by_id: Memo<u64, Column>,
    projects_by_id: Memo<u64, Project>,
}

impl BoardSync {
    pub fn new(tracker: Arc<dyn Tracker>, settings: BoardSettings) -> Self {
        Self {
            tracker,
            settings,
            issues: Memo::default(),
            columns: Memo::default(),
            columns_by_id: Memo::default(),
            projects_by_id: Memo::default(),
        }
    }

    pub fn tracker(&self) -> &dyn Tracker {
        self.tracker.as_ref()
    }

    pub fn settings(&self) -> &BoardSettings {
        &self.settings
    }

    pub async fn project(&self, name: &str) -> Result<Project> {
        self.tracker.get_project(name).await
    }

    pub async fn project_by_id(&self, id: u64) -> Result<Project> {
        self.projects_by_id
            .get_or_try_insert(id, || self.tracker.get_project_by_id(id))
            .await
    }

    /// All columns of `project`, in board order. Memoized per board id.
    pub async fn columns(&self, project: &Project) -> Result<Vec<Column>> {
        self.columns
            .get_or_try_insert(project.id, || {
                self.tracker.get_columns(project).try_collect::<Vec<_>>()
            })
            .await
    }

    pub async fn column(&self, project: &Project, name: &str) -> Result<Column> {
        self.columns(project)
            .await?
            .into_iter()
            .find(|c| c.is_named(name))
            .ok_or_else(|| {
                TrackerError::not_found(
                    EntityKind::Column,
                    format!("{name} (project {})", project.name),
                )
            })
    }

    pub async fn column_by_id(&self, id: u64) -> Result<Column> {
        self.columns_by_id
            .get_or_try_insert(id, || self.tracker.get_column_by_id(id))
            .await
    }

    pub async fn issue(&self, number: u64) -> Result<Issue> {
        let issue = self.tracker.get_issue(number).await?;
        self.issues
            .get_or_try_insert(issue.url.clone(), || async { Ok(issue) })
            .await
    }

    pub async fn issue_for_url(&self, url: &str) -> Result<Issue> {
        self.issues
            .get_or_try_insert(url.to_string(), || self.tracker.get_issue_by_url(url))
            .await
    }

    /// The issue behind a card, or `None` for notes.
    pub async fn issue_for_card(&self, card: &Card) -> Result<Option<Issue>> {
        match card.content_url.as_deref() {
            Some(url) => self.issue_for_url(url).await.map(Some),
            None => Ok(None),
        }
    }
}
