//! Long-running board maintenance jobs.
//!
//! Jobs walk boards one call at a time. A failure on one item is logged with a
//! `FAILED` marker, counted, and the job moves on; only failures resolving the
//! boards themselves abort a job.

mod clone;
mod close_done;
mod columns;
mod milestones;
mod sweep;
mod tally;

use std::fmt;

use tracing::warn;

use crate::error::TrackerError;

pub use clone::clone_board;
pub use close_done::close_done;
pub use columns::{clear_column, move_column};
pub use milestones::{label_milestone_issues, milestone_labels};
pub use sweep::sweep_closed;
pub use tally::{tally_board, ColumnTally};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobSummary {
    pub job: &'static str,
    /// Items that were changed.
    pub changed: usize,
    /// Items left alone because they were already in the desired state.
    pub skipped: usize,
    pub failed: usize,
}

impl JobSummary {
    pub fn new(job: &'static str) -> Self {
        Self {
            job,
            ..Self::default()
        }
    }

    pub(crate) fn fail(&mut self, item: impl fmt::Display, err: &TrackerError) {
        self.failed += 1;
        warn!(job = self.job, %item, error = %err, "FAILED");
    }
}

impl fmt::Display for JobSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} changed, {} skipped, {} failed",
            self.job, self.changed, self.skipped, self.failed
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_display_counts_failures() {
        let mut summary = JobSummary::new("sweep-closed");
        summary.changed = 2;
        summary.skipped = 1;
        summary.fail("card 9", &TrackerError::operation("move_card", "card 9", "502"));
        assert_eq!(summary.failed, 1);
        assert_eq!(
            summary.to_string(),
            "sweep-closed: 2 changed, 1 skipped, 1 failed"
        );
    }
}
