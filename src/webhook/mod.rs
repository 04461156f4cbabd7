//! Inbound tracker webhooks: classify the delivery, pick a handler, run it.

pub mod server;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{info, warn};

use crate::board::BoardSync;
use crate::config::BoardSettings;
use crate::error::Result;
use crate::mirror::{self, CardMoved};
use crate::providers::Tracker;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Issue,
    Project,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Issue => "issue",
            EventKind::Project => "project",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Any payload mentioning an issue is an issue event, whatever else it
/// carries. A moved project card is a project event. Everything else is
/// unrecognized.
pub fn classify(payload: &Value) -> Option<EventKind> {
    if payload.get("issue").is_some() {
        return Some(EventKind::Issue);
    }
    let moved = payload.get("action").and_then(Value::as_str) == Some("moved");
    let has_card = payload.get("project_card").is_some_and(|card| !card.is_null());
    if moved && has_card {
        return Some(EventKind::Project);
    }
    None
}

fn action(payload: &Value) -> &str {
    payload
        .get("action")
        .and_then(Value::as_str)
        .unwrap_or_default()
}

#[async_trait]
pub trait Handler: Send + Sync {
    async fn run(&self, sync: &BoardSync) -> Result<()>;
}

pub struct IssueHandler {
    payload: Value,
}

impl IssueHandler {
    pub fn new(payload: Value) -> Self {
        Self { payload }
    }

    /// New issues land in the primary board's parking lot. An issue that
    /// already has a card anywhere on that board is left where it is.
    async fn opened(&self, sync: &BoardSync, number: u64) -> Result<()> {
        let settings = sync.settings();
        let issue = sync.issue(number).await?;
        let board = sync.project(&settings.primary).await?;
        if let Some(card) = sync.locate_card(&board, &issue).await? {
            info!(issue = number, card = card.id, "issue already on board");
            return Ok(());
        }
        let parking = sync.column(&board, &settings.parking_lot).await?;
        let card = sync.tracker().create_card(&parking, &issue).await?;
        info!(issue = number, card = card.id, "parked new issue");
        Ok(())
    }
}

#[async_trait]
impl Handler for IssueHandler {
    async fn run(&self, sync: &BoardSync) -> Result<()> {
        let number = self
            .payload
            .pointer("/issue/number")
            .and_then(Value::as_u64);
        match (action(&self.payload), number) {
            ("opened", Some(number)) => self.opened(sync, number).await,
            ("opened", None) => {
                warn!("opened event without an issue number");
                Ok(())
            }
            (other, _) => {
                info!(action = other, "no handler for issue action");
                Ok(())
            }
        }
    }
}

pub struct ProjectHandler {
    payload: Value,
}

impl ProjectHandler {
    pub fn new(payload: Value) -> Self {
        Self { payload }
    }
}

#[async_trait]
impl Handler for ProjectHandler {
    async fn run(&self, sync: &BoardSync) -> Result<()> {
        if action(&self.payload) != "moved" {
            return Ok(());
        }
        let Some(event) = CardMoved::from_payload(&self.payload) else {
            warn!("project_card payload could not be read");
            return Ok(());
        };
        let outcome = mirror::apply_card_move(sync, &event).await?;
        info!(card = event.card.id, ?outcome, "handled card move");
        Ok(())
    }
}

fn handler_for(kind: EventKind, payload: Value) -> Box<dyn Handler> {
    match kind {
        EventKind::Issue => Box::new(IssueHandler::new(payload)),
        EventKind::Project => Box::new(ProjectHandler::new(payload)),
    }
}

/// Routes deliveries to handlers. Each delivery gets its own [`BoardSync`], so
/// nothing memoized survives from one delivery to the next.
#[derive(Clone)]
pub struct Dispatcher {
    tracker: Arc<dyn Tracker>,
    settings: BoardSettings,
}

impl Dispatcher {
    pub fn new(tracker: Arc<dyn Tracker>, settings: BoardSettings) -> Self {
        Self { tracker, settings }
    }

    pub async fn dispatch(&self, payload: Value) -> Result<Option<EventKind>> {
        let Some(kind) = classify(&payload) else {
            warn!(action = action(&payload), "unrecognized webhook payload");
            return Ok(None);
        };
        info!(kind = %kind, action = action(&payload), "dispatching webhook");
        let sync = BoardSync::new(self.tracker.clone(), self.settings.clone());
        handler_for(kind, payload).run(&sync).await?;
        Ok(Some(kind))
    }
}
