pub mod github;
pub mod jira;
pub mod link;
pub mod redmine;

use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt, TryStreamExt};

use crate::config::{AppConfig, BackendKind};
use crate::error::{EntityKind, Result, TrackerError};
use crate::model::{
    Card, CardPosition, Column, ColumnPosition, Issue, IssueUpdate, Label, Milestone, Project,
};

/// Everything the board logic needs from an issue tracker.
///
/// List calls hand back lazily paginated streams; a backend follows its
/// next-page links only as far as the caller keeps pulling. Backends that only
/// know about issues keep the default board methods, which report
/// [`TrackerError::Unsupported`].
#[async_trait]
pub trait Tracker: Send + Sync {
    fn name(&self) -> &str;

    async fn get_issue(&self, number: u64) -> Result<Issue>;

    /// Resolve the issue behind a card's `content_url`.
    async fn get_issue_by_url(&self, url: &str) -> Result<Issue> {
        let number = issue_number_from_url(url)
            .ok_or_else(|| TrackerError::not_found(EntityKind::Issue, url))?;
        self.get_issue(number).await
    }

    fn get_labels(&self) -> BoxStream<'_, Result<Label>> {
        unsupported_stream(self.unsupported("get_labels"))
    }

    async fn create_label(&self, _name: &str, _color: &str) -> Result<Label> {
        Err(self.unsupported("create_label"))
    }

    async fn add_label(&self, _label: &Label, _issue_number: u64) -> Result<()> {
        Err(self.unsupported("add_label"))
    }

    fn get_milestones(&self) -> BoxStream<'_, Result<Milestone>> {
        unsupported_stream(self.unsupported("get_milestones"))
    }

    async fn get_milestone(&self, title: &str) -> Result<Milestone> {
        let mut milestones = self.get_milestones();
        while let Some(milestone) = milestones.try_next().await? {
            if milestone.title.trim() == title.trim() {
                return Ok(milestone);
            }
        }
        Err(TrackerError::not_found(EntityKind::Milestone, title))
    }

    fn milestone_issues<'a>(&'a self, _milestone: &'a Milestone) -> BoxStream<'a, Result<Issue>> {
        unsupported_stream(self.unsupported("milestone_issues"))
    }

    fn get_projects(&self) -> BoxStream<'_, Result<Project>> {
        unsupported_stream(self.unsupported("get_projects"))
    }

    async fn get_project(&self, name: &str) -> Result<Project> {
        let mut projects = self.get_projects();
        while let Some(project) = projects.try_next().await? {
            if project.is_named(name) {
                return Ok(project);
            }
        }
        Err(TrackerError::not_found(EntityKind::Project, name))
    }

    async fn get_project_by_id(&self, _id: u64) -> Result<Project> {
        Err(self.unsupported("get_project_by_id"))
    }

    async fn create_project(&self, _name: &str, _body: &str) -> Result<Project> {
        Err(self.unsupported("create_project"))
    }

    async fn close_project(&self, _project: &Project) -> Result<()> {
        Err(self.unsupported("close_project"))
    }

    fn get_columns<'a>(&'a self, _project: &'a Project) -> BoxStream<'a, Result<Column>> {
        unsupported_stream(self.unsupported("get_columns"))
    }

    async fn get_column(&self, project: &Project, name: &str) -> Result<Column> {
        let mut columns = self.get_columns(project);
        while let Some(column) = columns.try_next().await? {
            if column.is_named(name) {
                return Ok(column);
            }
        }
        Err(TrackerError::not_found(
            EntityKind::Column,
            format!("{name} (project {})", project.name),
        ))
    }

    async fn get_column_by_id(&self, _id: u64) -> Result<Column> {
        Err(self.unsupported("get_column_by_id"))
    }

    async fn create_column(&self, _project: &Project, _name: &str) -> Result<Column> {
        Err(self.unsupported("create_column"))
    }

    async fn delete_column(&self, _column: &Column) -> Result<()> {
        Err(self.unsupported("delete_column"))
    }

    async fn move_column(&self, _column: &Column, _position: ColumnPosition) -> Result<()> {
        Err(self.unsupported("move_column"))
    }

    fn get_cards<'a>(&'a self, _column: &'a Column) -> BoxStream<'a, Result<Card>> {
        unsupported_stream(self.unsupported("get_cards"))
    }

    /// Create a card for `issue` at the top of `column`.
    async fn create_card(&self, _column: &Column, _issue: &Issue) -> Result<Card> {
        Err(self.unsupported("create_card"))
    }

    async fn move_card(&self, _card: &Card, _column: &Column, _position: CardPosition) -> Result<()> {
        Err(self.unsupported("move_card"))
    }

    async fn delete_card(&self, _card: &Card) -> Result<()> {
        Err(self.unsupported("delete_card"))
    }

    fn search<'a>(&'a self, _query: &'a str) -> BoxStream<'a, Result<Issue>> {
        unsupported_stream(self.unsupported("search"))
    }

    async fn update_issue(&self, _number: u64, _update: &IssueUpdate) -> Result<()> {
        Err(self.unsupported("update_issue"))
    }

    async fn comment(&self, _number: u64, _text: &str) -> Result<()> {
        Err(self.unsupported("comment"))
    }

    fn unsupported(&self, operation: &'static str) -> TrackerError {
        TrackerError::Unsupported {
            backend: self.name().to_string(),
            operation,
        }
    }
}

fn unsupported_stream<'a, T: Send + 'a>(err: TrackerError) -> BoxStream<'a, Result<T>> {
    stream::once(futures::future::ready(Err(err))).boxed()
}

/// Pull the trailing issue number out of an issue URL,
/// e.g. `https://api.github.com/repos/org/repo/issues/1234` -> 1234.
pub fn issue_number_from_url(url: &str) -> Option<u64> {
    url.trim_end_matches('/').rsplit('/').next()?.parse().ok()
}

/// Build the tracker selected by `config.backend`. Called once at startup.
pub fn create_tracker(config: &AppConfig) -> Result<Arc<dyn Tracker>> {
    config.validate()?;
    let tracker: Arc<dyn Tracker> = match config.backend {
        BackendKind::Github => {
            let cfg = config
                .github
                .as_ref()
                .ok_or_else(|| TrackerError::Configuration("missing [github] section".into()))?;
            Arc::new(github::GitHubTracker::new(cfg)?)
        }
        BackendKind::Jira => {
            let cfg = config
                .jira
                .as_ref()
                .ok_or_else(|| TrackerError::Configuration("missing [jira] section".into()))?;
            Arc::new(jira::JiraTracker::new(cfg))
        }
        BackendKind::Redmine => {
            let cfg = config
                .redmine
                .as_ref()
                .ok_or_else(|| TrackerError::Configuration("missing [redmine] section".into()))?;
            Arc::new(redmine::RedmineTracker::new(cfg))
        }
    };
    Ok(tracker)
}
