use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::TrackerError;

pub const DEFAULT_GITHUB_API_URL: &str = "https://api.github.com";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    #[default]
    Github,
    Jira,
    Redmine,
}

impl std::str::FromStr for BackendKind {
    type Err = TrackerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "github" => Ok(BackendKind::Github),
            "jira" => Ok(BackendKind::Jira),
            "redmine" => Ok(BackendKind::Redmine),
            other => Err(TrackerError::Configuration(format!(
                "unknown issue backend '{other}'"
            ))),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub backend: BackendKind,
    pub github: Option<GitHubConfig>,
    pub jira: Option<JiraConfig>,
    pub redmine: Option<RedmineConfig>,
    #[serde(default)]
    pub boards: BoardSettings,
    #[serde(default)]
    pub webhook: WebhookConfig,
    #[serde(default)]
    pub branch: BranchConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GitHubConfig {
    #[serde(default = "default_github_api_url")]
    pub api_url: String,
    #[serde(default)]
    pub token: String,
    #[serde(default)]
    pub owner: String,
    #[serde(default)]
    pub repo: String,
    /// List boards from the organization instead of the repository.
    #[serde(default = "default_true")]
    pub org_projects: bool,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            api_url: default_github_api_url(),
            token: String::new(),
            owner: String::new(),
            repo: String::new(),
            org_projects: true,
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct JiraConfig {
    pub api_url: String,
    pub email: String,
    pub api_token: String,
    pub project: String,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct RedmineConfig {
    pub url: String,
    pub api_key: String,
}

/// Board and column names the sync logic keys on. All compared case-insensitively.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BoardSettings {
    pub primary: String,
    pub overflow: String,
    pub relay_column: String,
    pub parking_lot: String,
    pub terminal_column: String,
    pub active_column: String,
    pub default_column: String,
}

impl Default for BoardSettings {
    fn default() -> Self {
        Self {
            primary: "product backlog".into(),
            overflow: "scrum board".into(),
            relay_column: "on deck".into(),
            parking_lot: "parking lot".into(),
            terminal_column: "done".into(),
            active_column: "in progress".into(),
            default_column: "to do".into(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WebhookConfig {
    pub listen: String,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            listen: "0.0.0.0:8000".into(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BranchConfig {
    pub base: String,
    pub max_length: usize,
}

impl Default for BranchConfig {
    fn default() -> Self {
        Self {
            base: "origin/master".into(),
            max_length: 32,
        }
    }
}

fn default_github_api_url() -> String {
    DEFAULT_GITHUB_API_URL.to_string()
}

fn default_true() -> bool {
    true
}

fn default_timeout_secs() -> u64 {
    30
}

fn config_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".issuebranch")
        .join("config.toml")
}

/// Load `~/.issuebranch/config.toml`, apply environment overrides and validate.
pub fn load_config() -> Result<AppConfig> {
    let env: HashMap<String, String> = std::env::vars().collect();
    load_config_from(&config_path(), &env)
}

pub fn load_config_from(path: &Path, env: &HashMap<String, String>) -> Result<AppConfig> {
    let mut config = if path.exists() {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {}", path.display()))?;
        toml::from_str(&contents)
            .with_context(|| format!("Failed to parse {}", path.display()))?
    } else {
        AppConfig::default()
    };
    config.apply_env(env)?;
    config.validate()?;
    Ok(config)
}

impl AppConfig {
    /// Environment values win over the file. Unset or empty variables are ignored.
    pub fn apply_env(&mut self, env: &HashMap<String, String>) -> Result<(), TrackerError> {
        let get = |key: &str| env.get(key).filter(|v| !v.trim().is_empty()).cloned();

        if let Some(backend) = get("ISSUE_BACKEND") {
            self.backend = backend.parse()?;
        }
        if let Some(name) = get("DEFAULT_BOARD_NAME") {
            self.boards.overflow = name;
        }
        if let Some(name) = get("DEFAULT_COLUMN_NAME") {
            self.boards.default_column = name;
        }

        let api_key = get("ISSUE_BACKEND_API_KEY");
        let url = get("ISSUE_BACKEND_URL");
        match self.backend {
            BackendKind::Github => {
                let user = get("ISSUE_BACKEND_USER");
                let repo = get("ISSUE_BACKEND_REPO");
                if api_key.is_none() && user.is_none() && repo.is_none() && url.is_none() {
                    return Ok(());
                }
                let github = self.github.get_or_insert_with(GitHubConfig::default);
                if let Some(token) = api_key {
                    github.token = token;
                }
                if let Some(owner) = user {
                    github.owner = owner;
                }
                if let Some(repo) = repo {
                    github.repo = repo;
                }
                if let Some(url) = url {
                    github.api_url = url;
                }
            }
            BackendKind::Jira => {
                if let Some(key) = api_key {
                    // Jira keys are given as "email:token".
                    let jira = self.jira.get_or_insert_with(JiraConfig::default);
                    match key.split_once(':') {
                        Some((email, token)) => {
                            jira.email = email.to_string();
                            jira.api_token = token.to_string();
                        }
                        None => jira.api_token = key,
                    }
                }
                if let Some(url) = url {
                    self.jira.get_or_insert_with(JiraConfig::default).api_url = url;
                }
            }
            BackendKind::Redmine => {
                if let Some(key) = api_key {
                    self.redmine.get_or_insert_with(RedmineConfig::default).api_key = key;
                }
                if let Some(url) = url {
                    self.redmine.get_or_insert_with(RedmineConfig::default).url = url;
                }
            }
        }
        Ok(())
    }

    /// Checks the selected backend has what it needs. Runs before any network call.
    pub fn validate(&self) -> Result<(), TrackerError> {
        fn require(section: &str, field: &str, value: &str) -> Result<(), TrackerError> {
            if value.trim().is_empty() {
                return Err(TrackerError::Configuration(format!(
                    "missing {section}.{field}"
                )));
            }
            Ok(())
        }

        match self.backend {
            BackendKind::Github => {
                let Some(github) = &self.github else {
                    return Err(TrackerError::Configuration(
                        "backend is github but no [github] section is configured".into(),
                    ));
                };
                require("github", "token", &github.token)?;
                require("github", "owner", &github.owner)?;
                require("github", "repo", &github.repo)?;
            }
            BackendKind::Jira => {
                let Some(jira) = &self.jira else {
                    return Err(TrackerError::Configuration(
                        "backend is jira but no [jira] section is configured".into(),
                    ));
                };
                require("jira", "api_url", &jira.api_url)?;
                require("jira", "email", &jira.email)?;
                require("jira", "api_token", &jira.api_token)?;
                require("jira", "project", &jira.project)?;
            }
            BackendKind::Redmine => {
                let Some(redmine) = &self.redmine else {
                    return Err(TrackerError::Configuration(
                        "backend is redmine but no [redmine] section is configured".into(),
                    ));
                };
                require("redmine", "url", &redmine.url)?;
                require("redmine", "api_key", &redmine.api_key)?;
            }
        }

        if self.boards.primary.eq_ignore_ascii_case(&self.boards.overflow) {
            return Err(TrackerError::Configuration(
                "boards.primary and boards.overflow must name different boards".into(),
            ));
        }
        Ok(())
    }
}
