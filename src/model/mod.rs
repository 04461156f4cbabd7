pub mod board;
pub mod issue;

pub use board::{Card, CardPosition, Column, ColumnPosition, Project};
pub use issue::{Issue, IssueState, IssueUpdate, Label, Milestone};
