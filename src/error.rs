//! Typed errors shared by the tracker backends and the board logic.
//!
//! `NotFound` is the one callers are expected to branch on (create instead of
//! move, skip a card, abort one command). Everything else is either fatal to a
//! single command or caught per item by the bulk jobs.

use std::fmt;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, TrackerError>;

/// The kind of entity a lookup missed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Issue,
    Label,
    Milestone,
    Project,
    Column,
    Card,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EntityKind::Issue => "issue",
            EntityKind::Label => "label",
            EntityKind::Milestone => "milestone",
            EntityKind::Project => "project",
            EntityKind::Column => "column",
            EntityKind::Card => "card",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("{kind} not found: {name}")]
    NotFound { kind: EntityKind, name: String },

    #[error("{operation} failed for {target}: {message}")]
    Operation {
        operation: &'static str,
        target: String,
        message: String,
    },

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("invalid card position '{0}', expected top or bottom")]
    InvalidPosition(String),

    #[error("{backend} backend does not support {operation}")]
    Unsupported {
        backend: String,
        operation: &'static str,
    },

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("failed to decode tracker response: {0}")]
    Decode(#[from] serde_json::Error),
}

impl TrackerError {
    pub fn not_found(kind: EntityKind, name: impl Into<String>) -> Self {
        TrackerError::NotFound {
            kind,
            name: name.into(),
        }
    }

    pub fn operation(
        operation: &'static str,
        target: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        TrackerError::Operation {
            operation,
            target: target.into(),
            message: message.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, TrackerError::NotFound { .. })
    }
}
