use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TrackerError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub state: String,
}

impl Project {
    pub fn is_named(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name.trim())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Column {
    pub id: u64,
    pub name: String,
    pub project_id: u64,
}

impl Column {
    pub fn is_named(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name.trim())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Card {
    pub id: u64,
    /// Issue URL for issue cards, `None` for notes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_url: Option<String>,
    pub column_id: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl Card {
    pub fn is_for(&self, issue_url: &str) -> bool {
        self.content_url.as_deref() == Some(issue_url)
    }
}

/// Where a moved card lands inside its column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CardPosition {
    #[default]
    Top,
    Bottom,
}

impl CardPosition {
    pub fn as_str(&self) -> &'static str {
        match self {
            CardPosition::Top => "top",
            CardPosition::Bottom => "bottom",
        }
    }
}

impl fmt::Display for CardPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CardPosition {
    type Err = TrackerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "top" => Ok(CardPosition::Top),
            "bottom" => Ok(CardPosition::Bottom),
            _ => Err(TrackerError::InvalidPosition(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnPosition {
    First,
    Last,
    After(u64),
}

impl fmt::Display for ColumnPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnPosition::First => f.write_str("first"),
            ColumnPosition::Last => f.write_str("last"),
            ColumnPosition::After(id) => write!(f, "after:{id}"),
        }
    }
}

impl FromStr for ColumnPosition {
    type Err = TrackerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_lowercase();
        match lower.as_str() {
            "first" => Ok(ColumnPosition::First),
            "last" => Ok(ColumnPosition::Last),
            other => other
                .strip_prefix("after:")
                .and_then(|id| id.parse().ok())
                .map(ColumnPosition::After)
                .ok_or_else(|| {
                    TrackerError::Configuration(format!(
                        "invalid column position '{s}', expected first, last or after:<id>"
                    ))
                }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn card_position_parses_top_and_bottom() {
        assert_eq!("top".parse::<CardPosition>().unwrap(), CardPosition::Top);
        assert_eq!(" Bottom ".parse::<CardPosition>().unwrap(), CardPosition::Bottom);
    }

    #[test]
    fn card_position_rejects_anything_else() {
        let err = "middle".parse::<CardPosition>().unwrap_err();
        assert!(matches!(err, TrackerError::InvalidPosition(ref p) if p == "middle"));
    }

    #[test]
    fn column_position_round_trips_after() {
        let pos: ColumnPosition = "after:42".parse().unwrap();
        assert_eq!(pos, ColumnPosition::After(42));
        assert_eq!(pos.to_string(), "after:42");
        assert!("after:x".parse::<ColumnPosition>().is_err());
    }

    #[test]
    fn names_compare_case_insensitively() {
        let column = Column {
            id: 1,
            name: "On Deck".into(),
            project_id: 9,
        };
        assert!(column.is_named("on deck"));
        assert!(column.is_named("ON DECK "));
        assert!(!column.is_named("parking lot"));
    }

    #[test]
    fn note_cards_match_no_issue() {
        let note = Card {
            id: 3,
            content_url: None,
            column_id: 1,
            note: Some("reminder".into()),
        };
        assert!(!note.is_for("https://tracker.test/issues/1"));
    }
}
