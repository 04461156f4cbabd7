use thiserror::Error;

use crate::config::BranchConfig;
use crate::labels;
use crate::model::Issue;

/// Offered when an issue has no `changetype:` label and the tracker has none
/// to suggest.
pub const DEFAULT_PREFIXES: &[&str] = &["feature", "bugfix", "hotfix", "chore"];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum BranchError {
    #[error("no changetype label on issue #{issue} and no prefix chosen")]
    MissingPrefix { issue: u64 },
}

/// Asks for a branch prefix when the issue does not carry one.
pub trait PrefixPrompt: Send + Sync {
    fn choose(&self, issue: &Issue, choices: &[String]) -> Option<String>;
}

/// Never answers. For non-interactive runs.
pub struct NoPrompt;

impl PrefixPrompt for NoPrompt {
    fn choose(&self, _issue: &Issue, _choices: &[String]) -> Option<String> {
        None
    }
}

/// Pick the branch prefix: an explicit one wins, then the issue's changetype
/// label, then whatever the prompt returns.
pub fn resolve_prefix(
    explicit: Option<&str>,
    issue: &Issue,
    choices: &[String],
    prompt: &dyn PrefixPrompt,
) -> Result<String, BranchError> {
    if let Some(prefix) = explicit.map(str::trim).filter(|p| !p.is_empty()) {
        return Ok(prefix.to_string());
    }
    if let Some(prefix) = labels::changetype(issue) {
        return Ok(prefix.to_string());
    }
    prompt
        .choose(issue, choices)
        .filter(|p| !p.trim().is_empty())
        .ok_or(BranchError::MissingPrefix {
            issue: issue.number,
        })
}

/// Lowercase `text`, keep `[a-z0-9/_]`, turn every other run of characters
/// into a single dash, then cut to `max_length`.
pub fn slugify(text: &str, max_length: usize) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut pending_dash = false;
    for c in text.to_lowercase().chars() {
        if c.is_ascii_lowercase() || c.is_ascii_digit() || c == '/' || c == '_' {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c);
        } else {
            pending_dash = true;
        }
    }
    let truncated: String = slug.chars().take(max_length).collect();
    truncated.trim_matches('-').to_string()
}

/// `{prefix}/{number}-{subject}` as a git-safe slug. Slashes in the subject
/// are dropped so they cannot add path segments.
pub fn branch_name(prefix: &str, number: u64, subject: &str, max_length: usize) -> String {
    let subject: String = subject.chars().filter(|c| *c != '/').collect();
    slugify(&format!("{prefix}/{number}-{subject}"), max_length)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BranchPlan {
    pub name: String,
    pub base: String,
}

impl BranchPlan {
    pub fn new(prefix: &str, issue: &Issue, subject: Option<&str>, cfg: &BranchConfig) -> Self {
        let subject = subject.unwrap_or(&issue.title);
        Self {
            name: branch_name(prefix, issue.number, subject, cfg.max_length),
            base: cfg.base.clone(),
        }
    }

    pub fn with_base(mut self, base: Option<&str>) -> Self {
        if let Some(base) = base {
            self.base = base.to_string();
        }
        self
    }

    /// A base of `.` means "the branch I am on".
    pub fn uses_current_branch(&self) -> bool {
        self.base == "."
    }
}
