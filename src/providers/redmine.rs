use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;

use super::Tracker;
use crate::config::RedmineConfig;
use crate::error::{EntityKind, Result, TrackerError};
use crate::model::{Issue, IssueState};

/// Issue-only backend for Redmine.
pub struct RedmineTracker {
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl RedmineTracker {
    pub fn new(cfg: &RedmineConfig) -> Self {
        Self {
            base_url: cfg.url.trim_end_matches('/').to_string(),
            api_key: cfg.api_key.clone(),
            client: reqwest::Client::new(),
        }
    }
}

#[derive(Deserialize)]
struct IssueEnvelope {
    issue: RedmineIssue,
}

#[derive(Deserialize)]
struct RedmineIssue {
    id: u64,
    subject: String,
    description: Option<String>,
    status: Option<NamedRef>,
    assigned_to: Option<NamedRef>,
    closed_on: Option<String>,
    fixed_version: Option<NamedRef>,
}

#[derive(Deserialize)]
struct NamedRef {
    name: String,
}

impl RedmineIssue {
    fn into_issue(self, url: String) -> Issue {
        let closed = self.closed_on.is_some()
            || self
                .status
                .as_ref()
                .is_some_and(|s| s.name.eq_ignore_ascii_case("closed"));
        Issue {
            id: self.id,
            number: self.id,
            url,
            title: self.subject,
            state: if closed {
                IssueState::Closed
            } else {
                IssueState::Open
            },
            labels: Vec::new(),
            assignee: self.assigned_to.map(|a| a.name),
            body: self.description.filter(|d| !d.trim().is_empty()),
            milestone: self.fixed_version.map(|v| v.name),
        }
    }
}

#[async_trait]
impl Tracker for RedmineTracker {
    fn name(&self) -> &str {
        "Redmine"
    }

    async fn get_issue(&self, number: u64) -> Result<Issue> {
        let url = format!("{}/issues/{number}.json", self.base_url);
        let resp = self
            .client
            .get(&url)
            .header("X-Redmine-API-Key", &self.api_key)
            .send()
            .await
            .map_err(|e| TrackerError::operation("get_issue", url.as_str(), e.to_string()))?;

        match resp.status() {
            StatusCode::NOT_FOUND => Err(TrackerError::not_found(EntityKind::Issue, url)),
            status if status.is_success() => {
                let envelope: IssueEnvelope = resp.json().await?;
                Ok(envelope.issue.into_issue(url))
            }
            status => Err(TrackerError::operation("get_issue", url, status.to_string())),
        }
    }
}
