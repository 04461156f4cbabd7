use std::collections::HashMap;

use futures::TryStreamExt;
use tracing::{info, warn};

use super::JobSummary;
use crate::error::{EntityKind, Result, TrackerError};
use crate::labels::epic_label;
use crate::model::{Label, Milestone};
use crate::providers::Tracker;

async fn labels_by_name(tracker: &dyn Tracker) -> Result<HashMap<String, Label>> {
    tracker
        .get_labels()
        .map_ok(|label| (label.name.clone(), label))
        .try_collect()
        .await
}

/// Create an `epic:<milestone>` label for each milestone that lacks one.
pub async fn milestone_labels(tracker: &dyn Tracker, color: &str) -> Result<JobSummary> {
    let mut summary = JobSummary::new("milestone-labels");
    let mut existing = labels_by_name(tracker).await?;
    let milestones: Vec<Milestone> = tracker.get_milestones().try_collect().await?;

    for milestone in &milestones {
        let name = epic_label(milestone);
        if existing.contains_key(&name) {
            summary.skipped += 1;
            continue;
        }
        match tracker.create_label(&name, color).await {
            Ok(label) => {
                info!(label = %label.name, "created label");
                existing.insert(name, label);
                summary.changed += 1;
            }
            Err(e) => summary.fail(&name, &e),
        }
    }
    Ok(summary)
}

/// Attach each milestone's epic label to every issue in the milestone.
pub async fn label_milestone_issues(tracker: &dyn Tracker) -> Result<JobSummary> {
    let mut summary = JobSummary::new("label-milestones");
    let labels = labels_by_name(tracker).await?;
    let milestones: Vec<Milestone> = tracker.get_milestones().try_collect().await?;

    for milestone in &milestones {
        let name = epic_label(milestone);
        let Some(label) = labels.get(&name) else {
            warn!(milestone = %milestone.title, "no epic label, run milestone-labels first");
            summary.fail(&name, &TrackerError::not_found(EntityKind::Label, name.clone()));
            continue;
        };
        let mut issues = tracker.milestone_issues(milestone);
        loop {
            let issue = match issues.try_next().await {
                Ok(Some(issue)) => issue,
                Ok(None) => break,
                Err(e) => {
                    summary.fail(&milestone.title, &e);
                    break;
                }
            };
            if issue.has_label(&label.name) {
                summary.skipped += 1;
                continue;
            }
            match tracker.add_label(label, issue.number).await {
                Ok(()) => {
                    info!(issue = issue.number, label = %label.name, "labeled issue");
                    summary.changed += 1;
                }
                Err(e) => summary.fail(format!("issue #{}", issue.number), &e),
            }
        }
    }
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::tests::FakeTracker;

    #[tokio::test]
    async fn creates_only_missing_epic_labels() {
        let tracker = FakeTracker::new();
        tracker.add_label("epic:Checkout v2");
        tracker.add_milestone(1, "Checkout v2", &[]);
        tracker.add_milestone(2, "Search", &[]);

        let summary = milestone_labels(&tracker, "5319e7").await.unwrap();

        assert_eq!(tracker.mutations(), vec!["create_label epic:Search"]);
        assert_eq!(summary.changed, 1);
        assert_eq!(summary.skipped, 1);
    }

    #[tokio::test]
    async fn labels_every_issue_in_each_milestone() {
        let tracker = FakeTracker::new();
        tracker.add_issue(1, "a", &[]);
        tracker.add_issue(2, "b", &["epic:Search"]);
        tracker.add_issue(3, "c", &[]);
        tracker.add_label("epic:Search");
        tracker.add_milestone(7, "Search", &[1, 2, 3]);

        let summary = label_milestone_issues(&tracker).await.unwrap();

        assert!(tracker.issue(1).has_label("epic:Search"));
        assert!(tracker.issue(3).has_label("epic:Search"));
        assert_eq!(summary.changed, 2);
        assert_eq!(summary.skipped, 1);
    }

    #[tokio::test]
    async fn milestone_without_label_is_reported() {
        let tracker = FakeTracker::new();
        tracker.add_issue(1, "a", &[]);
        tracker.add_milestone(7, "Orphan", &[1]);

        let summary = label_milestone_issues(&tracker).await.unwrap();
        assert_eq!(summary.failed, 1);
        assert_eq!(tracker.mutation_count(), 0);
    }
}
