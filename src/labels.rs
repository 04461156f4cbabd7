//! Label conventions: `changetype:<prefix>`, `points:<n>`, `walk-in`,
//! `epic:<milestone>`, and free-form routing labels such as `team:<name>`.

use crate::model::{Issue, Milestone};

pub const CHANGETYPE_PREFIX: &str = "changetype:";
pub const POINTS_PREFIX: &str = "points:";
pub const EPIC_PREFIX: &str = "epic:";
pub const WALK_IN_MARKER: &str = "walk-in";

/// The branch prefix encoded in the first `changetype:` label.
pub fn changetype(issue: &Issue) -> Option<&str> {
    issue
        .labels
        .iter()
        .find_map(|label| label.name.strip_prefix(CHANGETYPE_PREFIX))
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

/// Parse a single label as story points. `points:nan`, infinities and
/// anything unparsable yield `None`.
pub fn parse_points(label: &str) -> Option<f64> {
    let raw = label.strip_prefix(POINTS_PREFIX)?;
    raw.trim().parse::<f64>().ok().filter(|points| points.is_finite())
}

/// Story points for an issue, or `None` when it is unpointed.
pub fn points(issue: &Issue) -> Option<f64> {
    issue
        .labels
        .iter()
        .filter(|label| label.name.starts_with(POINTS_PREFIX))
        .find_map(|label| parse_points(&label.name))
}

pub fn is_walk_in(issue: &Issue) -> bool {
    issue
        .labels
        .iter()
        .any(|label| label.name.to_lowercase().contains(WALK_IN_MARKER))
}

pub fn epic_label(milestone: &Milestone) -> String {
    format!("{EPIC_PREFIX}{}", milestone.title.trim())
}

/// Turn free text into a label name.
///
/// `"TEAM - Core Engineering"` becomes `team:core_engineering` with prefix
/// `team` and `team_core_engineering` without one. A leading copy of the
/// prefix in the text is dropped.
pub fn derive_label(text: &str, prefix: Option<&str>) -> String {
    let lowered = text.trim().to_lowercase();
    match prefix.map(|p| p.trim().to_lowercase()).filter(|p| !p.is_empty()) {
        Some(prefix) => {
            let rest = lowered.strip_prefix(prefix.as_str()).unwrap_or(&lowered);
            format!("{prefix}:{}", underscore_words(rest))
        }
        None => underscore_words(&lowered),
    }
}

fn underscore_words(text: &str) -> String {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|word| !word.is_empty())
        .collect::<Vec<_>>()
        .join("_")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{IssueState, Label};

    fn issue_with(labels: &[&str]) -> Issue {
        Issue {
            id: 1,
            number: 1,
            url: "https://tracker.test/issues/1".into(),
            title: "t".into(),
            state: IssueState::Open,
            labels: labels.iter().map(|l| Label::new(*l, "fff")).collect(),
            assignee: None,
            body: None,
            milestone: None,
        }
    }

    #[test]
    fn derives_prefixed_and_plain_labels() {
        assert_eq!(
            derive_label("TEAM - Core Engineering", Some("team")),
            "team:core_engineering"
        );
        assert_eq!(derive_label("TEAM - Core Engineering", None), "team_core_engineering");
        assert_eq!(derive_label("Mobile App", Some("project")), "project:mobile_app");
        assert_eq!(derive_label("  Ops  ", Some("")), "ops");
    }

    #[test]
    fn points_reject_nan_and_garbage() {
        assert_eq!(parse_points("points:3"), Some(3.0));
        assert_eq!(parse_points("points: 0.5"), Some(0.5));
        assert_eq!(parse_points("points:nan"), None);
        assert_eq!(parse_points("points:inf"), None);
        assert_eq!(parse_points("points:lots"), None);
        assert_eq!(parse_points("priority:3"), None);
    }

    #[test]
    fn issue_points_use_first_parsable_label() {
        assert_eq!(points(&issue_with(&["bug", "points:nan", "points:2"])), Some(2.0));
        assert_eq!(points(&issue_with(&["bug"])), None);
    }

    #[test]
    fn changetype_and_walk_in() {
        let issue = issue_with(&["changetype:bugfix", "Walk-In"]);
        assert_eq!(changetype(&issue), Some("bugfix"));
        assert!(is_walk_in(&issue));

        let plain = issue_with(&["changetype:"]);
        assert_eq!(changetype(&plain), None);
        assert!(!is_walk_in(&plain));
    }

    #[test]
    fn epic_label_trims_title() {
        let milestone = Milestone {
            number: 1,
            title: " Checkout v2 ".into(),
            state: "open".into(),
            due_on: None,
        };
        assert_eq!(epic_label(&milestone), "epic:Checkout v2");
    }
}
