use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt, TryStreamExt};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, LINK};
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use super::{issue_number_from_url, link, Tracker};
use crate::config::GitHubConfig;
use crate::error::{EntityKind, Result, TrackerError};
use crate::model::{
    Card, CardPosition, Column, ColumnPosition, Issue, IssueState, IssueUpdate, Label, Milestone,
    Project,
};

/// Classic projects still sit behind the inertia preview media type.
const PROJECTS_MEDIA_TYPE: &str = "application/vnd.github.inertia-preview+json";
const PER_PAGE: u32 = 100;

pub struct GitHubTracker {
    client: reqwest::Client,
    api_url: String,
    owner: String,
    repo: String,
    org_projects: bool,
}

impl GitHubTracker {
    pub fn new(cfg: &GitHubConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        let auth = HeaderValue::from_str(&format!("token {}", cfg.token)).map_err(|_| {
            TrackerError::Configuration("github.token contains invalid characters".into())
        })?;
        headers.insert(AUTHORIZATION, auth);
        headers.insert(ACCEPT, HeaderValue::from_static(PROJECTS_MEDIA_TYPE));

        let client = reqwest::Client::builder()
            .user_agent(concat!("issuebranch/", env!("CARGO_PKG_VERSION")))
            .default_headers(headers)
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            api_url: cfg.api_url.trim_end_matches('/').to_string(),
            owner: cfg.owner.clone(),
            repo: cfg.repo.clone(),
            org_projects: cfg.org_projects,
        })
    }

    fn api(&self, path: &str) -> String {
        format!("{}{path}", self.api_url)
    }

    fn repo_api(&self, path: &str) -> String {
        format!("{}/repos/{}/{}{path}", self.api_url, self.owner, self.repo)
    }

    fn projects_url(&self) -> String {
        if self.org_projects {
            self.api(&format!("/orgs/{}/projects", self.owner))
        } else {
            self.repo_api("/projects")
        }
    }

    /// Send a request and turn transport failures and non-2xx statuses into
    /// an `Operation` error naming the call and its target.
    async fn send(
        &self,
        request: RequestBuilder,
        operation: &'static str,
        target: impl Into<String>,
    ) -> Result<Response> {
        let target = target.into();
        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => return Err(TrackerError::operation(operation, target, e.to_string())),
        };
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(TrackerError::operation(
            operation,
            target,
            format!("{status}: {}", body.trim()),
        ))
    }

    /// GET a single entity, mapping 404 to `NotFound`.
    async fn fetch<T: DeserializeOwned>(&self, url: &str, kind: EntityKind) -> Result<T> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| TrackerError::operation("get", url, e.to_string()))?;
        match response.status() {
            StatusCode::NOT_FOUND => Err(TrackerError::not_found(kind, url)),
            status if status.is_success() => Ok(response.json().await?),
            status => {
                let body = response.text().await.unwrap_or_default();
                Err(TrackerError::operation(
                    "get",
                    url,
                    format!("{status}: {}", body.trim()),
                ))
            }
        }
    }

    /// Lazily walk a paginated listing, following `rel="next"` until it runs out.
    fn paginate<'a, P, T>(&'a self, url: String, items: fn(P) -> Vec<T>) -> BoxStream<'a, Result<T>>
    where
        P: DeserializeOwned + Send + 'a,
        T: Send + 'a,
    {
        stream::try_unfold(Some(with_per_page(&url)), move |next| async move {
            let Some(url) = next else {
                return Ok(None);
            };
            debug!(%url, "fetching page");
            let response = self.send(self.client.get(&url), "list", url.as_str()).await?;
            let next = response
                .headers()
                .get(LINK)
                .and_then(|value| value.to_str().ok())
                .and_then(link::next_url);
            let page: P = response.json().await?;
            let page = stream::iter(items(page).into_iter().map(Ok::<T, TrackerError>));
            Ok::<_, TrackerError>(Some((page, next)))
        })
        .try_flatten()
        .boxed()
    }
}

fn with_per_page(url: &str) -> String {
    if url.contains("per_page=") {
        return url.to_string();
    }
    let sep = if url.contains('?') { '&' } else { '?' };
    format!("{url}{sep}per_page={PER_PAGE}")
}

#[derive(Deserialize)]
struct GhUser {
    login: String,
}

#[derive(Deserialize)]
struct GhLabel {
    name: String,
    #[serde(default)]
    color: String,
}

#[derive(Deserialize)]
struct GhMilestoneRef {
    title: String,
}

#[derive(Deserialize)]
struct GhIssue {
    id: u64,
    number: u64,
    url: String,
    title: String,
    state: IssueState,
    #[serde(default)]
    labels: Vec<GhLabel>,
    assignee: Option<GhUser>,
    body: Option<String>,
    milestone: Option<GhMilestoneRef>,
    pull_request: Option<serde_json::Value>,
}

impl From<GhIssue> for Issue {
    fn from(issue: GhIssue) -> Self {
        Issue {
            id: issue.id,
            number: issue.number,
            url: issue.url,
            title: issue.title,
            state: issue.state,
            labels: issue
                .labels
                .into_iter()
                .map(|l| Label::new(l.name, l.color))
                .collect(),
            assignee: issue.assignee.map(|u| u.login),
            body: issue.body.filter(|b| !b.trim().is_empty()),
            milestone: issue.milestone.map(|m| m.title),
        }
    }
}

#[derive(Deserialize)]
struct GhMilestone {
    number: u64,
    title: String,
    #[serde(default)]
    state: String,
    due_on: Option<chrono::DateTime<chrono::Utc>>,
}

impl From<GhMilestone> for Milestone {
    fn from(m: GhMilestone) -> Self {
        Milestone {
            number: m.number,
            title: m.title,
            state: m.state,
            due_on: m.due_on,
        }
    }
}

#[derive(Deserialize)]
struct GhProject {
    id: u64,
    name: String,
    #[serde(default)]
    state: String,
}

impl From<GhProject> for Project {
    fn from(p: GhProject) -> Self {
        Project {
            id: p.id,
            name: p.name,
            state: p.state,
        }
    }
}

#[derive(Deserialize)]
struct GhColumn {
    id: u64,
    name: String,
    project_url: String,
}

impl From<GhColumn> for Column {
    fn from(c: GhColumn) -> Self {
        Column {
            id: c.id,
            project_id: issue_number_from_url(&c.project_url).unwrap_or_default(),
            name: c.name,
        }
    }
}

#[derive(Deserialize)]
struct GhCard {
    id: u64,
    content_url: Option<String>,
    column_url: String,
    note: Option<String>,
}

impl From<GhCard> for Card {
    fn from(c: GhCard) -> Self {
        Card {
            id: c.id,
            content_url: c.content_url,
            column_id: issue_number_from_url(&c.column_url).unwrap_or_default(),
            note: c.note,
        }
    }
}

#[derive(Deserialize)]
struct GhSearchPage {
    items: Vec<GhIssue>,
}

fn into_all<W, T: From<W>>(page: Vec<W>) -> Vec<T> {
    page.into_iter().map(T::from).collect()
}

fn issues_only(page: Vec<GhIssue>) -> Vec<Issue> {
    page.into_iter()
        .filter(|i| i.pull_request.is_none())
        .map(Issue::from)
        .collect()
}

fn search_items(page: GhSearchPage) -> Vec<Issue> {
    issues_only(page.items)
}

#[async_trait]
impl Tracker for GitHubTracker {
    fn name(&self) -> &str {
        "GitHub"
    }

    async fn get_issue(&self, number: u64) -> Result<Issue> {
        let issue: GhIssue = self
            .fetch(&self.repo_api(&format!("/issues/{number}")), EntityKind::Issue)
            .await?;
        Ok(issue.into())
    }

    async fn get_issue_by_url(&self, url: &str) -> Result<Issue> {
        let issue: GhIssue = self.fetch(url, EntityKind::Issue).await?;
        Ok(issue.into())
    }

    fn get_labels(&self) -> BoxStream<'_, Result<Label>> {
        self.paginate(self.repo_api("/labels"), |page: Vec<GhLabel>| {
            page.into_iter().map(|l| Label::new(l.name, l.color)).collect()
        })
    }

    async fn create_label(&self, name: &str, color: &str) -> Result<Label> {
        let request = self
            .client
            .post(self.repo_api("/labels"))
            .json(&json!({ "name": name, "color": color.trim_start_matches('#') }));
        let label: GhLabel = self.send(request, "create_label", name).await?.json().await?;
        Ok(Label::new(label.name, label.color))
    }

    async fn add_label(&self, label: &Label, issue_number: u64) -> Result<()> {
        let request = self
            .client
            .post(self.repo_api(&format!("/issues/{issue_number}/labels")))
            .json(&json!({ "labels": [label.name] }));
        self.send(
            request,
            "add_label",
            format!("label {} -> issue #{issue_number}", label.name),
        )
        .await?;
        Ok(())
    }

    fn get_milestones(&self) -> BoxStream<'_, Result<Milestone>> {
        self.paginate(
            self.repo_api("/milestones?state=all"),
            into_all::<GhMilestone, Milestone>,
        )
    }

    fn milestone_issues<'a>(&'a self, milestone: &'a Milestone) -> BoxStream<'a, Result<Issue>> {
        self.paginate(
            self.repo_api(&format!("/issues?milestone={}&state=all", milestone.number)),
            issues_only,
        )
    }

    fn get_projects(&self) -> BoxStream<'_, Result<Project>> {
        self.paginate(
            format!("{}?state=all", self.projects_url()),
            into_all::<GhProject, Project>,
        )
    }

    async fn get_project_by_id(&self, id: u64) -> Result<Project> {
        let project: GhProject = self
            .fetch(&self.api(&format!("/projects/{id}")), EntityKind::Project)
            .await?;
        Ok(project.into())
    }

    async fn create_project(&self, name: &str, body: &str) -> Result<Project> {
        let request = self
            .client
            .post(self.projects_url())
            .json(&json!({ "name": name, "body": body }));
        let project: GhProject = self.send(request, "create_project", name).await?.json().await?;
        Ok(project.into())
    }

    async fn close_project(&self, project: &Project) -> Result<()> {
        let request = self
            .client
            .patch(self.api(&format!("/projects/{}", project.id)))
            .json(&json!({ "state": "closed" }));
        self.send(request, "close_project", project.name.as_str()).await?;
        Ok(())
    }

    fn get_columns<'a>(&'a self, project: &'a Project) -> BoxStream<'a, Result<Column>> {
        self.paginate(
            self.api(&format!("/projects/{}/columns", project.id)),
            into_all::<GhColumn, Column>,
        )
    }

    async fn get_column_by_id(&self, id: u64) -> Result<Column> {
        let column: GhColumn = self
            .fetch(&self.api(&format!("/projects/columns/{id}")), EntityKind::Column)
            .await?;
        Ok(column.into())
    }

    async fn create_column(&self, project: &Project, name: &str) -> Result<Column> {
        let request = self
            .client
            .post(self.api(&format!("/projects/{}/columns", project.id)))
            .json(&json!({ "name": name }));
        let column: GhColumn = self
            .send(request, "create_column", format!("{name} (project {})", project.name))
            .await?
            .json()
            .await?;
        Ok(column.into())
    }

    async fn delete_column(&self, column: &Column) -> Result<()> {
        let request = self
            .client
            .delete(self.api(&format!("/projects/columns/{}", column.id)));
        self.send(request, "delete_column", column.name.as_str()).await?;
        Ok(())
    }

    async fn move_column(&self, column: &Column, position: ColumnPosition) -> Result<()> {
        let request = self
            .client
            .post(self.api(&format!("/projects/columns/{}/moves", column.id)))
            .json(&json!({ "position": position.to_string() }));
        self.send(request, "move_column", column.name.as_str()).await?;
        Ok(())
    }

    fn get_cards<'a>(&'a self, column: &'a Column) -> BoxStream<'a, Result<Card>> {
        self.paginate(
            self.api(&format!("/projects/columns/{}/cards", column.id)),
            into_all::<GhCard, Card>,
        )
    }

    async fn create_card(&self, column: &Column, issue: &Issue) -> Result<Card> {
        let request = self
            .client
            .post(self.api(&format!("/projects/columns/{}/cards", column.id)))
            .json(&json!({ "content_id": issue.id, "content_type": "Issue" }));
        let card: GhCard = self
            .send(
                request,
                "create_card",
                format!("issue #{} -> column {}", issue.number, column.name),
            )
            .await?
            .json()
            .await?;
        Ok(card.into())
    }

    async fn move_card(&self, card: &Card, column: &Column, position: CardPosition) -> Result<()> {
        let request = self
            .client
            .post(self.api(&format!("/projects/columns/cards/{}/moves", card.id)))
            .json(&json!({ "position": position.as_str(), "column_id": column.id }));
        self.send(
            request,
            "move_card",
            format!("card {} -> column {}", card.id, column.name),
        )
        .await?;
        Ok(())
    }

    async fn delete_card(&self, card: &Card) -> Result<()> {
        let request = self
            .client
            .delete(self.api(&format!("/projects/columns/cards/{}", card.id)));
        self.send(request, "delete_card", format!("card {}", card.id))
            .await?;
        Ok(())
    }

    fn search<'a>(&'a self, query: &'a str) -> BoxStream<'a, Result<Issue>> {
        let scoped = if query.contains("repo:") {
            query.to_string()
        } else {
            format!("repo:{}/{} {query}", self.owner, self.repo)
        };
        self.paginate(
            self.api(&format!("/search/issues?q={}", urlencoding::encode(&scoped))),
            search_items,
        )
    }

    async fn update_issue(&self, number: u64, update: &IssueUpdate) -> Result<()> {
        let request = self
            .client
            .patch(self.repo_api(&format!("/issues/{number}")))
            .json(update);
        self.send(request, "update_issue", format!("issue #{number}"))
            .await?;
        Ok(())
    }

    async fn comment(&self, number: u64, text: &str) -> Result<()> {
        let request = self
            .client
            .post(self.repo_api(&format!("/issues/{number}/comments")))
            .json(&json!({ "body": text }));
        self.send(request, "comment", format!("issue #{number}"))
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tracker(org_projects: bool) -> GitHubTracker {
        GitHubTracker::new(&GitHubConfig {
            api_url: "https://api.github.com/".into(),
            token: "ghp_test".into(),
            owner: "acme".into(),
            repo: "widgets".into(),
            org_projects,
            timeout_secs: 5,
        })
        .unwrap()
    }

    #[test]
    fn builds_repo_and_project_urls() {
        let gh = tracker(true);
        assert_eq!(
            gh.repo_api("/issues/7"),
            "https://api.github.com/repos/acme/widgets/issues/7"
        );
        assert_eq!(gh.projects_url(), "https://api.github.com/orgs/acme/projects");
        assert_eq!(
            tracker(false).projects_url(),
            "https://api.github.com/repos/acme/widgets/projects"
        );
    }

    #[test]
    fn per_page_is_appended_once() {
        assert_eq!(with_per_page("https://a.test/x"), "https://a.test/x?per_page=100");
        assert_eq!(
            with_per_page("https://a.test/x?state=all"),
            "https://a.test/x?state=all&per_page=100"
        );
        assert_eq!(
            with_per_page("https://a.test/x?page=2&per_page=100"),
            "https://a.test/x?page=2&per_page=100"
        );
    }

    #[test]
    fn issue_payload_maps_to_model() {
        let raw = r#"{
            "id": 9001,
            "number": 468,
            "url": "https://api.github.com/repos/acme/widgets/issues/468",
            "title": "Fix login",
            "state": "open",
            "labels": [{"name": "changetype:bugfix", "color": "d73a4a"}],
            "assignee": {"login": "octocat"},
            "body": "  ",
            "milestone": {"title": "Sprint 4"}
        }"#;
        let issue: Issue = serde_json::from_str::<GhIssue>(raw).unwrap().into();
        assert_eq!(issue.number, 468);
        assert!(issue.is_open());
        assert!(issue.has_label("changetype:bugfix"));
        assert_eq!(issue.assignee.as_deref(), Some("octocat"));
        assert_eq!(issue.body, None);
        assert_eq!(issue.milestone.as_deref(), Some("Sprint 4"));
    }

    #[test]
    fn card_and_column_ids_come_from_urls() {
        let card: Card = serde_json::from_str::<GhCard>(
            r#"{
                "id": 6731956,
                "content_url": "https://api.github.com/repos/acme/widgets/issues/468",
                "column_url": "https://api.github.com/projects/columns/2001376",
                "note": null
            }"#,
        )
        .unwrap()
        .into();
        assert_eq!(card.column_id, 2001376);

        let column: Column = serde_json::from_str::<GhColumn>(
            r#"{
                "id": 2001377,
                "name": "On Deck",
                "project_url": "https://api.github.com/projects/1206552"
            }"#,
        )
        .unwrap()
        .into();
        assert_eq!(column.project_id, 1206552);
        assert!(column.is_named("on deck"));
    }

    #[test]
    fn pull_requests_are_filtered_from_issue_listings() {
        let page: Vec<GhIssue> = serde_json::from_str(
            r#"[
                {"id": 1, "number": 1, "url": "u1", "title": "issue", "state": "open"},
                {"id": 2, "number": 2, "url": "u2", "title": "pr", "state": "open", "pull_request": {}}
            ]"#,
        )
        .unwrap();
        let issues = issues_only(page);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].number, 1);
    }

    mod paging {
        use std::collections::HashMap;
        use std::sync::{Arc, Mutex};

        use axum::extract::{Query, State};
        use axum::http::{header, StatusCode};
        use axum::response::{IntoResponse, Response};
        use axum::routing::get;
        use axum::{Json, Router};

        use super::*;

        #[derive(Clone)]
        struct Pages {
            base: String,
            requested: Arc<Mutex<Vec<String>>>,
        }

        async fn labels(
            State(pages): State<Pages>,
            Query(query): Query<HashMap<String, String>>,
        ) -> Response {
            let page = query.get("page").cloned().unwrap_or_else(|| "1".into());
            pages.requested.lock().unwrap().push(page.clone());
            let url = format!("{}/repos/acme/widgets/labels", pages.base);
            match page.as_str() {
                "1" => (
                    [(
                        header::LINK,
                        format!(
                            "<{url}?page=2&per_page=100>; rel=\"next\", <{url}?page=9&per_page=100>; rel=\"last\""
                        ),
                    )],
                    Json(json!([{"name": "bug", "color": "d73a4a"}, {"name": "points:3"}])),
                )
                    .into_response(),
                "2" => Json(json!([{"name": "walk-in", "color": "fbca04"}])).into_response(),
                _ => (StatusCode::BAD_GATEWAY, "unexpected page").into_response(),
            }
        }

        async fn serve() -> Pages {
            let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
            let pages = Pages {
                base: format!("http://{}", listener.local_addr().unwrap()),
                requested: Arc::default(),
            };
            let app = Router::new()
                .route("/repos/acme/widgets/labels", get(labels))
                .fallback(|| async { (StatusCode::BAD_GATEWAY, "upstream down") })
                .with_state(pages.clone());
            tokio::spawn(async move { axum::serve(listener, app).await });
            pages
        }

        fn tracker_at(base: &str, repo: &str) -> GitHubTracker {
            GitHubTracker::new(&GitHubConfig {
                api_url: base.to_string(),
                token: "ghp_test".into(),
                owner: "acme".into(),
                repo: repo.into(),
                org_projects: false,
                timeout_secs: 5,
            })
            .unwrap()
        }

        #[tokio::test]
        async fn follows_next_links_across_pages() {
            let pages = serve().await;
            let gh = tracker_at(&pages.base, "widgets");

            let labels: Vec<Label> = gh.get_labels().try_collect().await.unwrap();

            let names: Vec<_> = labels.iter().map(|l| l.name.as_str()).collect();
            assert_eq!(names, vec!["bug", "points:3", "walk-in"]);
            assert_eq!(*pages.requested.lock().unwrap(), vec!["1", "2"]);
        }

        #[tokio::test]
        async fn failed_page_is_an_operation_error() {
            let pages = serve().await;
            let gh = tracker_at(&pages.base, "broken");

            let err = gh.get_labels().try_collect::<Vec<_>>().await.unwrap_err();

            match err {
                TrackerError::Operation { operation, message, .. } => {
                    assert_eq!(operation, "list");
                    assert!(message.starts_with("502"), "{message}");
                }
                other => panic!("expected an operation error, got {other:?}"),
            }
        }

        #[tokio::test]
        async fn unreachable_host_names_the_call() {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            let base = format!("http://{}", listener.local_addr().unwrap());
            drop(listener);
            let gh = tracker_at(&base, "widgets");

            let err = gh.get_labels().try_collect::<Vec<_>>().await.unwrap_err();

            assert!(matches!(err, TrackerError::Operation { operation: "list", .. }));
        }
    }
}
