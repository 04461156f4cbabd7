use async_trait::async_trait;
use base64::Engine;
use reqwest::StatusCode;
use serde::Deserialize;

use super::Tracker;
use crate::config::JiraConfig;
use crate::error::{EntityKind, Result, TrackerError};
use crate::model::{Issue, IssueState, Label};

/// Issue-only backend: Jira has no notion of the boards this tool drives.
pub struct JiraTracker {
    base_url: String,
    project: String,
    auth_header: String,
    client: reqwest::Client,
}

impl JiraTracker {
    pub fn new(cfg: &JiraConfig) -> Self {
        let creds = format!("{}:{}", cfg.email, cfg.api_token);
        let encoded = base64::engine::general_purpose::STANDARD.encode(creds);
        Self {
            base_url: cfg.api_url.trim_end_matches('/').to_string(),
            project: cfg.project.clone(),
            auth_header: format!("Basic {encoded}"),
            client: reqwest::Client::new(),
        }
    }

    fn issue_key(&self, number: u64) -> String {
        format!("{}-{number}", self.project)
    }
}

#[derive(Deserialize)]
struct JiraIssue {
    id: String,
    key: String,
    #[serde(rename = "self")]
    self_url: String,
    fields: IssueFields,
}

#[derive(Deserialize)]
struct IssueFields {
    summary: Option<String>,
    description: Option<String>,
    status: Option<StatusField>,
    #[serde(default)]
    labels: Vec<String>,
    assignee: Option<UserField>,
}

#[derive(Deserialize)]
struct StatusField {
    #[serde(rename = "statusCategory")]
    category: Option<StatusCategory>,
}

#[derive(Deserialize)]
struct StatusCategory {
    key: String,
}

#[derive(Deserialize)]
struct UserField {
    #[serde(rename = "displayName")]
    display_name: String,
}

impl JiraIssue {
    fn into_issue(self, number: u64) -> Issue {
        let state = match self.fields.status.and_then(|s| s.category) {
            Some(category) if category.key == "done" => IssueState::Closed,
            _ => IssueState::Open,
        };
        Issue {
            id: self.id.parse().unwrap_or(number),
            number,
            url: self.self_url,
            title: self
                .fields
                .summary
                .unwrap_or_else(|| self.key.clone()),
            state,
            labels: self
                .fields
                .labels
                .into_iter()
                .map(|name| Label::new(name, ""))
                .collect(),
            assignee: self.fields.assignee.map(|a| a.display_name),
            body: self.fields.description.filter(|d| !d.trim().is_empty()),
            milestone: None,
        }
    }
}

#[async_trait]
impl Tracker for JiraTracker {
    fn name(&self) -> &str {
        "Jira"
    }

    async fn get_issue(&self, number: u64) -> Result<Issue> {
        let key = self.issue_key(number);
        let url = format!(
            "{}/rest/api/2/issue/{}",
            self.base_url,
            urlencoding::encode(&key)
        );

        let resp = self
            .client
            .get(&url)
            .header("Authorization", &self.auth_header)
            .header("Accept", "application/json")
            .query(&[("fields", "*all")])
            .send()
            .await
            .map_err(|e| TrackerError::operation("get_issue", key.as_str(), e.to_string()))?;

        match resp.status() {
            StatusCode::NOT_FOUND => Err(TrackerError::not_found(EntityKind::Issue, key)),
            status if status.is_success() => {
                let issue: JiraIssue = resp.json().await?;
                Ok(issue.into_issue(number))
            }
            status => Err(TrackerError::operation(
                "get_issue",
                key,
                status.to_string(),
            )),
        }
    }
}
