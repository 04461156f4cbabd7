use std::io::IsTerminal;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use dialoguer::{theme::ColorfulTheme, Select};
use futures::TryStreamExt;

use crate::board::BoardSync;
use crate::branch::{self, BranchPlan, NoPrompt, PrefixPrompt};
use crate::config::AppConfig;
use crate::git;
use crate::jobs;
use crate::labels;
use crate::model::{CardPosition, ColumnPosition, Issue, Label, Milestone, Project};
use crate::providers::Tracker;
use crate::webhook::{server, Dispatcher};

#[derive(Parser)]
#[command(name = "issuebranch")]
#[command(version, about = "Branches and kanban boards driven by your issue tracker")]
pub struct Cli {
    /// Log at debug level (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create a git branch named after an issue
    Branch {
        issue: u64,
        /// Branch prefix, e.g. feature or bugfix (defaults to the changetype label)
        #[arg(long)]
        prefix: Option<String>,
        /// Use this text instead of the issue title
        #[arg(long)]
        subject: Option<String>,
        /// Base branch; "." means the current branch
        #[arg(short, long)]
        base: Option<String>,
        /// Also move the issue's card to the active column
        #[arg(long)]
        board: bool,
        /// Print the branch name without touching git or the board
        #[arg(long)]
        dry_run: bool,
    },
    /// Put an issue's card in a column, creating it if needed
    Column {
        board: String,
        issue: u64,
        /// Defaults to the configured default column
        column: Option<String>,
        #[arg(long, default_value = "top")]
        position: CardPosition,
    },
    /// Print an issue as JSON
    Show { issue: u64 },
    /// List milestones
    Milestones,
    /// List project boards
    Projects,
    /// Search issues
    Search {
        #[arg(required = true)]
        query: Vec<String>,
    },
    /// Copy a board's columns and cards into another board
    CloneBoard { source: String, destination: String },
    /// Comment on and close open issues in the terminal column
    CloseDone {
        #[arg(long)]
        board: Option<String>,
        #[arg(long)]
        column: Option<String>,
        #[arg(long, default_value = "Closing: card is in the done column.")]
        comment: String,
    },
    /// Move closed issues to the bottom of the terminal column
    SweepClosed {
        #[arg(long)]
        board: Option<String>,
        #[arg(long)]
        column: Option<String>,
    },
    /// Count cards and story points per column
    Tally {
        #[arg(long)]
        board: Option<String>,
    },
    /// Create an epic:<title> label for every milestone
    MilestoneLabels { color: String },
    /// Add each milestone's epic label to its issues
    LabelMilestones,
    /// Create a label derived from free text, optionally attaching it to an issue
    Label {
        text: String,
        #[arg(long)]
        prefix: Option<String>,
        #[arg(long, default_value = "ededed")]
        color: String,
        #[arg(long)]
        issue: Option<u64>,
    },
    /// Delete a column from a board
    ClearColumn { board: String, column: String },
    /// Reposition a column: first, last or after:<column id>
    MoveColumn {
        board: String,
        column: String,
        position: ColumnPosition,
    },
    /// Serve tracker webhooks over HTTP
    Serve {
        #[arg(long)]
        listen: Option<String>,
    },
}

/// Branch prefix prompt backed by a terminal menu.
struct DialoguerPrompt;

impl PrefixPrompt for DialoguerPrompt {
    fn choose(&self, issue: &Issue, choices: &[String]) -> Option<String> {
        let prompt = format!(
            "#{} \"{}\" has no changetype label, pick a prefix",
            issue.number, issue.title
        );
        match Select::with_theme(&ColorfulTheme::default())
            .with_prompt(prompt)
            .items(choices)
            .default(0)
            .interact_opt()
        {
            Ok(Some(idx)) => choices.get(idx).cloned(),
            _ => None,
        }
    }
}

pub async fn run(cli: Cli, config: AppConfig, tracker: Arc<dyn Tracker>) -> Result<()> {
    let settings = config.boards.clone();
    let sync = BoardSync::new(tracker.clone(), settings.clone());

    match cli.command {
        Commands::Branch {
            issue,
            prefix,
            subject,
            base,
            board,
            dry_run,
        } => {
            handle_branch(
                &sync,
                &config,
                issue,
                prefix.as_deref(),
                subject.as_deref(),
                base.as_deref(),
                board,
                dry_run,
            )
            .await
        }
        Commands::Column {
            board,
            issue,
            column,
            position,
        } => {
            let column = column.unwrap_or_else(|| settings.default_column.clone());
            let card = sync
                .move_issue_to_column(issue, &board, &column, position)
                .await
                .with_context(|| format!("Failed to place #{issue} in {board}/{column}"))?;
            println!("#{issue} is in {board}/{column} (card {})", card.id);
            Ok(())
        }
        Commands::Show { issue } => {
            let issue = tracker.get_issue(issue).await?;
            println!("{}", serde_json::to_string_pretty(&issue)?);
            Ok(())
        }
        Commands::Milestones => {
            let milestones: Vec<Milestone> = tracker.get_milestones().try_collect().await?;
            for m in milestones {
                let due = m
                    .due_on
                    .map(|d| d.format("%Y-%m-%d").to_string())
                    .unwrap_or_default();
                println!("{:>5}  {:<40} {:<8} {}", m.number, m.title, m.state, due);
            }
            Ok(())
        }
        Commands::Projects => {
            let projects: Vec<Project> = tracker.get_projects().try_collect().await?;
            for p in projects {
                println!("{:>10}  {} ({})", p.id, p.name, p.state);
            }
            Ok(())
        }
        Commands::Search { query } => {
            let query = query.join(" ");
            let issues: Vec<Issue> = tracker.search(&query).try_collect().await?;
            for issue in &issues {
                let state = if issue.is_open() { "open" } else { "closed" };
                let labels = issue.label_names().collect::<Vec<_>>().join(", ");
                println!("#{:<6} [{state}] {}  {labels}", issue.number, issue.title);
            }
            println!("{} result(s)", issues.len());
            Ok(())
        }
        Commands::CloneBoard {
            source,
            destination,
        } => {
            let summary = jobs::clone_board(&sync, &source, &destination)
                .await
                .with_context(|| format!("Failed to clone {source} into {destination}"))?;
            println!("{summary}");
            Ok(())
        }
        Commands::CloseDone {
            board,
            column,
            comment,
        } => {
            let board = board.unwrap_or_else(|| settings.overflow.clone());
            let column = column.unwrap_or_else(|| settings.terminal_column.clone());
            let summary = jobs::close_done(&sync, &board, &column, &comment).await?;
            println!("{summary}");
            Ok(())
        }
        Commands::SweepClosed { board, column } => {
            let board = board.unwrap_or_else(|| settings.overflow.clone());
            let column = column.unwrap_or_else(|| settings.terminal_column.clone());
            let summary = jobs::sweep_closed(&sync, &board, &column).await?;
            println!("{summary}");
            Ok(())
        }
        Commands::Tally { board } => {
            let board = board.unwrap_or_else(|| settings.overflow.clone());
            let tallies = jobs::tally_board(&sync, &board).await?;
            let mut total = jobs::ColumnTally {
                name: "total".into(),
                ..Default::default()
            };
            for tally in &tallies {
                println!("{tally}");
                total.cards += tally.cards;
                total.walk_ins += tally.walk_ins;
                total.points += tally.points;
                total.walk_in_points += tally.walk_in_points;
                total.unpointed += tally.unpointed;
                total.failed += tally.failed;
            }
            println!("{total}");
            Ok(())
        }
        Commands::MilestoneLabels { color } => {
            let summary = jobs::milestone_labels(tracker.as_ref(), &color).await?;
            println!("{summary}");
            Ok(())
        }
        Commands::LabelMilestones => {
            let summary = jobs::label_milestone_issues(tracker.as_ref()).await?;
            println!("{summary}");
            Ok(())
        }
        Commands::Label {
            text,
            prefix,
            color,
            issue,
        } => handle_label(tracker.as_ref(), &text, prefix.as_deref(), &color, issue).await,
        Commands::ClearColumn { board, column } => {
            let removed = jobs::clear_column(&sync, &board, &column).await?;
            println!("Deleted column {} ({}) from {board}", removed.name, removed.id);
            Ok(())
        }
        Commands::MoveColumn {
            board,
            column,
            position,
        } => {
            let moved = jobs::move_column(&sync, &board, &column, position).await?;
            println!("Moved column {} to {position}", moved.name);
            Ok(())
        }
        Commands::Serve { listen } => {
            let listen = listen.unwrap_or_else(|| config.webhook.listen.clone());
            server::serve(&listen, Dispatcher::new(tracker, settings)).await
        }
    }
}

#[allow(clippy::too_many_arguments)]
async fn handle_branch(
    sync: &BoardSync,
    config: &AppConfig,
    number: u64,
    prefix: Option<&str>,
    subject: Option<&str>,
    base: Option<&str>,
    move_card: bool,
    dry_run: bool,
) -> Result<()> {
    let issue = sync
        .issue(number)
        .await
        .with_context(|| format!("Failed to fetch issue #{number}"))?;

    let choices = if prefix.is_none() && labels::changetype(&issue).is_none() {
        prefix_choices(sync.tracker()).await
    } else {
        Vec::new()
    };
    let prompt: &dyn PrefixPrompt = if std::io::stdin().is_terminal() {
        &DialoguerPrompt
    } else {
        &NoPrompt
    };
    let prefix = branch::resolve_prefix(prefix, &issue, &choices, prompt)?;

    let plan = BranchPlan::new(&prefix, &issue, subject, &config.branch).with_base(base);
    if dry_run {
        println!("{}", plan.name);
        return Ok(());
    }

    let base = if plan.uses_current_branch() {
        git::current_branch().await?
    } else {
        plan.base.clone()
    };
    git::checkout_new_branch(&plan.name, &base).await?;
    println!("Switched to new branch {} (from {base})", plan.name);

    if move_card {
        let settings = sync.settings();
        sync.move_issue_to_column(
            number,
            &settings.overflow,
            &settings.active_column,
            CardPosition::Top,
        )
        .await
        .with_context(|| format!("Failed to move #{number} to {}", settings.active_column))?;
        println!("Moved #{number} to {}/{}", settings.overflow, settings.active_column);
    }
    Ok(())
}

/// Prefixes offered by the prompt: the repository's changetype labels, or a
/// fixed list when the tracker has none (or cannot list labels).
async fn prefix_choices(tracker: &dyn Tracker) -> Vec<String> {
    let found: Vec<String> = match tracker.get_labels().try_collect::<Vec<Label>>().await {
        Ok(labels) => labels
            .into_iter()
            .filter_map(|l| {
                l.name
                    .strip_prefix(labels::CHANGETYPE_PREFIX)
                    .map(|p| p.trim().to_string())
            })
            .filter(|p| !p.is_empty())
            .collect(),
        Err(e) => {
            tracing::debug!(error = %e, "could not list labels for prefix choices");
            Vec::new()
        }
    };
    if found.is_empty() {
        branch::DEFAULT_PREFIXES.iter().map(|p| p.to_string()).collect()
    } else {
        found
    }
}

async fn handle_label(
    tracker: &dyn Tracker,
    text: &str,
    prefix: Option<&str>,
    color: &str,
    issue: Option<u64>,
) -> Result<()> {
    let name = labels::derive_label(text, prefix);
    let existing: Vec<Label> = tracker.get_labels().try_collect().await?;
    let label = match existing.into_iter().find(|l| l.name == name) {
        Some(label) => {
            println!("Label {name} already exists");
            label
        }
        None => {
            let label = tracker
                .create_label(&name, color)
                .await
                .with_context(|| format!("Failed to create label {name}"))?;
            println!("Created label {name}");
            label
        }
    };
    if let Some(number) = issue {
        tracker.add_label(&label, number).await?;
        println!("Labeled #{number} with {name}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::tests::FakeTracker;

    #[test]
    fn parses_branch_flags() {
        let cli = Cli::try_parse_from([
            "issuebranch",
            "branch",
            "42",
            "--prefix",
            "feature",
            "-b",
            ".",
            "--dry-run",
        ])
        .unwrap();
        match cli.command {
            Commands::Branch {
                issue,
                prefix,
                base,
                dry_run,
                board,
                ..
            } => {
                assert_eq!(issue, 42);
                assert_eq!(prefix.as_deref(), Some("feature"));
                assert_eq!(base.as_deref(), Some("."));
                assert!(dry_run);
                assert!(!board);
            }
            _ => panic!("Expected Branch command"),
        }
    }

    #[test]
    fn move_column_position_is_parsed() {
        let cli = Cli::try_parse_from(["issuebranch", "move-column", "scrum board", "done", "after:12"])
            .unwrap();
        match cli.command {
            Commands::MoveColumn { position, .. } => {
                assert_eq!(position, ColumnPosition::After(12));
            }
            _ => panic!("Expected MoveColumn command"),
        }
        assert!(Cli::try_parse_from(["issuebranch", "move-column", "b", "c", "middle"]).is_err());
    }

    #[test]
    fn column_position_is_checked_at_parse_time() {
        let cli = Cli::try_parse_from([
            "issuebranch", "column", "scrum board", "42", "done", "--position", "bottom",
        ])
        .unwrap();
        match cli.command {
            Commands::Column { position, column, .. } => {
                assert_eq!(position, CardPosition::Bottom);
                assert_eq!(column.as_deref(), Some("done"));
            }
            _ => panic!("Expected Column command"),
        }

        let cli = Cli::try_parse_from(["issuebranch", "column", "scrum board", "42"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Column { position: CardPosition::Top, column: None, .. }
        ));

        for position in ["middle", "", "TOPMOST"] {
            assert!(Cli::try_parse_from([
                "issuebranch", "column", "scrum board", "42", "--position", position,
            ])
            .is_err());
        }
    }

    #[test]
    fn search_requires_a_query() {
        assert!(Cli::try_parse_from(["issuebranch", "search"]).is_err());
    }

    #[tokio::test]
    async fn prefix_choices_come_from_changetype_labels() {
        let tracker = FakeTracker::new();
        tracker.add_label("changetype:feature");
        tracker.add_label("changetype:bugfix");
        tracker.add_label("bug");
        assert_eq!(prefix_choices(&tracker).await, vec!["feature", "bugfix"]);

        let empty = FakeTracker::new();
        assert_eq!(prefix_choices(&empty).await, branch::DEFAULT_PREFIXES);
    }

    #[tokio::test]
    async fn label_command_creates_once_and_attaches() {
        let tracker = FakeTracker::new();
        tracker.add_issue(5, "Routing", &[]);

        handle_label(&tracker, "TEAM - Core Engineering", Some("team"), "0e8a16", Some(5))
            .await
            .unwrap();
        handle_label(&tracker, "TEAM - Core Engineering", Some("team"), "0e8a16", None)
            .await
            .unwrap();

        assert!(tracker.issue(5).has_label("team:core_engineering"));
        let creates = tracker
            .mutations()
            .into_iter()
            .filter(|m| m.starts_with("create_label"))
            .count();
        assert_eq!(creates, 1);
    }
}
