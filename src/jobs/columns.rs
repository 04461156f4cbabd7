use tracing::info;

use crate::board::BoardSync;
use crate::error::Result;
use crate::model::{Column, ColumnPosition};

/// Delete `column` (and the cards in it) from `board`.
pub async fn clear_column(sync: &BoardSync, board: &str, column: &str) -> Result<Column> {
    let project = sync.project(board).await?;
    let column = sync.column(&project, column).await?;
    sync.tracker().delete_column(&column).await?;
    info!(board = %project.name, column = %column.name, "deleted column");
    Ok(column)
}

pub async fn move_column(
    sync: &BoardSync,
    board: &str,
    column: &str,
    position: ColumnPosition,
) -> Result<Column> {
    let project = sync.project(board).await?;
    let column = sync.column(&project, column).await?;
    sync.tracker().move_column(&column, position).await?;
    info!(board = %project.name, column = %column.name, %position, "moved column");
    Ok(column)
}
