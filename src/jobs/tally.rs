use std::fmt;

use futures::TryStreamExt;
use tracing::warn;

use crate::board::BoardSync;
use crate::error::Result;
use crate::labels;
use crate::model::Card;

/// Card and story point counts for one column.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ColumnTally {
    pub name: String,
    pub cards: usize,
    pub walk_ins: usize,
    pub points: f64,
    pub walk_in_points: f64,
    pub unpointed: usize,
    /// Cards (or a whole column listing) that could not be read.
    pub failed: usize,
}

impl fmt::Display for ColumnTally {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:<20} cards={:<4} points={:<6} walk-ins={:<3} walk-in points={:<6} unpointed={}",
            self.name, self.cards, self.points, self.walk_ins, self.walk_in_points, self.unpointed
        )?;
        if self.failed > 0 {
            write!(f, " failed={}", self.failed)?;
        }
        Ok(())
    }
}

pub async fn tally_board(sync: &BoardSync, board: &str) -> Result<Vec<ColumnTally>> {
    let project = sync.project(board).await?;
    let mut tallies = Vec::new();

    for column in sync.columns(&project).await? {
        let mut tally = ColumnTally {
            name: column.name.clone(),
            ..ColumnTally::default()
        };
        let cards: Vec<Card> = match sync.tracker().get_cards(&column).try_collect().await {
            Ok(cards) => cards,
            Err(e) => {
                warn!(column = %column.name, error = %e, "FAILED to list cards for tally");
                tally.failed += 1;
                tallies.push(tally);
                continue;
            }
        };
        for card in &cards {
            let issue = match sync.issue_for_card(card).await {
                Ok(Some(issue)) => issue,
                Ok(None) => continue,
                Err(e) => {
                    warn!(card = card.id, error = %e, "FAILED to read issue for tally");
                    tally.failed += 1;
                    continue;
                }
            };
            let walk_in = labels::is_walk_in(&issue);
            tally.cards += 1;
            if walk_in {
                tally.walk_ins += 1;
            }
            match labels::points(&issue) {
                Some(points) => {
                    tally.points += points;
                    if walk_in {
                        tally.walk_in_points += points;
                    }
                }
                None => tally.unpointed += 1,
            }
        }
        tallies.push(tally);
    }
    Ok(tallies)
}
