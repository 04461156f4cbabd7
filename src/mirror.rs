//! Relay column mirroring between the primary and overflow boards.
//!
//! When a card enters the relay column on one board of the pair, the same
//! issue gets a card in the partner board's relay column. When it leaves, the
//! partner's card is deleted. Every branch is safe to replay, so duplicate
//! webhook deliveries leave the boards unchanged.

use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info};

use crate::board::BoardSync;
use crate::error::Result;
use crate::model::{Card, CardPosition, Column, Project};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayTransition {
    IntoRelay,
    OutOfRelay,
    Elsewhere,
}

/// What applying a card move did to the partner board.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MirrorOutcome {
    Created { board: String, card: u64 },
    AlreadyMirrored { board: String },
    Deleted { board: String, card: u64 },
    NotMirrored { board: String },
    Ignored(&'static str),
}

/// A `project_card` "moved" delivery reduced to what the mirror needs.
#[derive(Debug, Clone)]
pub struct CardMoved {
    pub card: Card,
    pub from_column_id: Option<u64>,
}

#[derive(Deserialize)]
struct ColumnChange {
    from: u64,
}

impl CardMoved {
    pub fn from_payload(payload: &Value) -> Option<Self> {
        let card = Card::deserialize(payload.get("project_card")?).ok()?;
        let from_column_id = payload
            .pointer("/changes/column_id")
            .and_then(|change| ColumnChange::deserialize(change).ok())
            .map(|change| change.from);
        Some(Self {
            card,
            from_column_id,
        })
    }
}

/// The other half of the mirror pair, if `board` belongs to it.
pub fn partner_board<'a>(sync: &'a BoardSync, board: &str) -> Option<&'a str> {
    let settings = sync.settings();
    if board.eq_ignore_ascii_case(&settings.primary) {
        Some(&settings.overflow)
    } else if board.eq_ignore_ascii_case(&settings.overflow) {
        Some(&settings.primary)
    } else {
        None
    }
}

/// Decide what a move means for the relay column.
///
/// The destination is looked up from the card's current column. Only when
/// that is not the relay column is the origin consulted.
pub async fn classify_move(sync: &BoardSync, event: &CardMoved) -> Result<RelayTransition> {
    let relay = &sync.settings().relay_column;
    let destination = sync.column_by_id(event.card.column_id).await?;
    if destination.is_named(relay) {
        return Ok(RelayTransition::IntoRelay);
    }
    if let Some(from) = event.from_column_id {
        let origin = sync.column_by_id(from).await?;
        if origin.is_named(relay) {
            return Ok(RelayTransition::OutOfRelay);
        }
    }
    Ok(RelayTransition::Elsewhere)
}

pub async fn apply_card_move(sync: &BoardSync, event: &CardMoved) -> Result<MirrorOutcome> {
    let Some(issue_url) = event.card.content_url.as_deref() else {
        debug!(card = event.card.id, "note card, nothing to mirror");
        return Ok(MirrorOutcome::Ignored("note card"));
    };

    let column = sync.column_by_id(event.card.column_id).await?;
    let board = sync.project_by_id(column.project_id).await?;
    let Some(partner_name) = partner_board(sync, &board.name) else {
        info!(board = %board.name, "board is not mirrored");
        return Ok(MirrorOutcome::Ignored("board outside mirror pair"));
    };

    match classify_move(sync, event).await? {
        RelayTransition::IntoRelay => {
            let (partner, relay) = partner_relay(sync, partner_name).await?;
            if sync.locate_card_in_column(&relay, issue_url).await?.is_some() {
                info!(board = %partner.name, url = issue_url, "already mirrored");
                return Ok(MirrorOutcome::AlreadyMirrored {
                    board: partner.name,
                });
            }
            let issue = sync.issue_for_url(issue_url).await?;
            let card = sync
                .ensure_card_in_column(&partner, &issue, &relay, CardPosition::Top)
                .await?;
            info!(
                from = %board.name,
                to = %partner.name,
                issue = issue.number,
                "mirrored card into relay column"
            );
            Ok(MirrorOutcome::Created {
                board: partner.name,
                card: card.id,
            })
        }
        RelayTransition::OutOfRelay => {
            let (partner, relay) = partner_relay(sync, partner_name).await?;
            match sync.locate_card_in_column(&relay, issue_url).await? {
                Some(mirrored) => {
                    sync.tracker().delete_card(&mirrored).await?;
                    info!(board = %partner.name, card = mirrored.id, "removed mirrored card");
                    Ok(MirrorOutcome::Deleted {
                        board: partner.name,
                        card: mirrored.id,
                    })
                }
                None => {
                    debug!(board = %partner.name, url = issue_url, "no mirrored card to remove");
                    Ok(MirrorOutcome::NotMirrored {
                        board: partner.name,
                    })
                }
            }
        }
        RelayTransition::Elsewhere => {
            debug!(board = %board.name, column = %column.name, "move does not touch relay column");
            Ok(MirrorOutcome::Ignored("relay column not involved"))
        }
    }
}

async fn partner_relay(sync: &BoardSync, partner_name: &str) -> Result<(Project, Column)> {
    let partner = sync.project(partner_name).await?;
    let relay = sync.column(&partner, &sync.settings().relay_column).await?;
    Ok((partner, relay))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::board::test_support::board_sync;
    use crate::model::{Column, Issue};
    use crate::providers::tests::FakeTracker;

    struct Boards {
        tracker: FakeTracker,
        backlog_parking: Column,
        backlog_relay: Column,
        scrum_relay: Column,
        issue: Issue,
    }

    fn boards() -> Boards {
        let tracker = FakeTracker::new();
        let backlog = tracker.add_project("Product Backlog");
        let backlog_parking = tracker.add_column(&backlog, "Parking Lot");
        let backlog_relay = tracker.add_column(&backlog, "On Deck");
        let scrum = tracker.add_project("Scrum Board");
        tracker.add_column(&scrum, "To Do");
        let scrum_relay = tracker.add_column(&scrum, "On Deck");
        let issue = tracker.add_issue(468, "Checkout flow", &[]);
        Boards {
            tracker,
            backlog_parking,
            backlog_relay,
            scrum_relay,
            issue,
        }
    }

    fn moved(card: &Card, to: &Column, from: &Column) -> CardMoved {
        let mut card = card.clone();
        card.column_id = to.id;
        CardMoved {
            card,
            from_column_id: Some(from.id),
        }
    }

    #[test]
    fn payload_carries_card_and_origin() {
        let payload = json!({
            "action": "moved",
            "project_card": {
                "id": 9,
                "column_id": 22,
                "content_url": "https://tracker.test/repos/acme/widgets/issues/468",
                "note": null,
                "creator": {"login": "octo"}
            },
            "changes": {"column_id": {"from": 21}}
        });
        let event = CardMoved::from_payload(&payload).unwrap();
        assert_eq!(event.card.id, 9);
        assert_eq!(event.card.column_id, 22);
        assert_eq!(event.from_column_id, Some(21));

        let without_changes = json!({"project_card": {"id": 1, "column_id": 2}});
        let event = CardMoved::from_payload(&without_changes).unwrap();
        assert!(event.card.content_url.is_none());
        assert!(event.from_column_id.is_none());
    }

    #[tokio::test]
    async fn relay_round_trip_creates_then_deletes_mirror() {
        let b = boards();
        let card = b.tracker.add_card(&b.backlog_parking, &b.issue);
        let sync = board_sync(&b.tracker);

        let into = moved(&card, &b.backlog_relay, &b.backlog_parking);
        assert_eq!(
            classify_move(&sync, &into).await.unwrap(),
            RelayTransition::IntoRelay
        );
        let outcome = apply_card_move(&sync, &into).await.unwrap();
        assert!(matches!(outcome, MirrorOutcome::Created { ref board, .. } if board == "Scrum Board"));
        assert_eq!(b.tracker.card_numbers(&b.scrum_relay), vec![468]);

        let out = moved(&card, &b.backlog_parking, &b.backlog_relay);
        assert_eq!(
            classify_move(&sync, &out).await.unwrap(),
            RelayTransition::OutOfRelay
        );
        let outcome = apply_card_move(&sync, &out).await.unwrap();
        assert!(matches!(outcome, MirrorOutcome::Deleted { .. }));
        assert!(b.tracker.cards_in(&b.scrum_relay).is_empty());
    }

    #[tokio::test]
    async fn duplicate_into_delivery_leaves_one_card() {
        let b = boards();
        let card = b.tracker.add_card(&b.backlog_relay, &b.issue);
        let sync = board_sync(&b.tracker);
        let into = moved(&card, &b.backlog_relay, &b.backlog_parking);

        apply_card_move(&sync, &into).await.unwrap();
        let mutations = b.tracker.mutation_count();
        let second = apply_card_move(&sync, &into).await.unwrap();

        assert!(matches!(second, MirrorOutcome::AlreadyMirrored { .. }));
        assert_eq!(b.tracker.mutation_count(), mutations);
        assert_eq!(b.tracker.card_numbers(&b.scrum_relay), vec![468]);
    }

    #[tokio::test]
    async fn mirroring_works_from_the_overflow_side() {
        let b = boards();
        let scrum = b.tracker.project_named("scrum board").unwrap();
        let todo = b.tracker.columns_of(&scrum)[0].clone();
        let card = b.tracker.add_card(&todo, &b.issue);
        let sync = board_sync(&b.tracker);

        apply_card_move(&sync, &moved(&card, &b.scrum_relay, &todo))
            .await
            .unwrap();
        assert_eq!(b.tracker.card_numbers(&b.backlog_relay), vec![468]);
    }

    #[tokio::test]
    async fn leaving_relay_without_mirror_is_a_no_op() {
        let b = boards();
        let card = b.tracker.add_card(&b.backlog_parking, &b.issue);
        let sync = board_sync(&b.tracker);

        let outcome = apply_card_move(&sync, &moved(&card, &b.backlog_parking, &b.backlog_relay))
            .await
            .unwrap();
        assert!(matches!(outcome, MirrorOutcome::NotMirrored { .. }));
        assert_eq!(b.tracker.mutation_count(), 0);
    }

    #[tokio::test]
    async fn moves_outside_relay_make_no_mutations() {
        let b = boards();
        let backlog = b.tracker.project_named("product backlog").unwrap();
        let icebox = b.tracker.add_column(&backlog, "Icebox");
        let card = b.tracker.add_card(&icebox, &b.issue);
        let sync = board_sync(&b.tracker);

        let event = moved(&card, &b.backlog_parking, &icebox);
        assert_eq!(
            classify_move(&sync, &event).await.unwrap(),
            RelayTransition::Elsewhere
        );
        apply_card_move(&sync, &event).await.unwrap();
        assert_eq!(b.tracker.mutation_count(), 0);
    }

    #[tokio::test]
    async fn unpaired_boards_and_notes_are_ignored() {
        let b = boards();
        let roadmap = b.tracker.add_project("Roadmap");
        let roadmap_relay = b.tracker.add_column(&roadmap, "On Deck");
        let card = b.tracker.add_card(&roadmap_relay, &b.issue);
        let note = b.tracker.add_note(&b.backlog_relay, "sprint goal");
        let sync = board_sync(&b.tracker);

        let outcome = apply_card_move(&sync, &moved(&card, &roadmap_relay, &roadmap_relay))
            .await
            .unwrap();
        assert_eq!(outcome, MirrorOutcome::Ignored("board outside mirror pair"));

        let outcome = apply_card_move(&sync, &moved(&note, &b.backlog_relay, &b.backlog_parking))
            .await
            .unwrap();
        assert_eq!(outcome, MirrorOutcome::Ignored("note card"));
        assert_eq!(b.tracker.mutation_count(), 0);
    }
}
