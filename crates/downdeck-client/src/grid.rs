//! Progress partition engine: maps a task's worker chunk ranges onto a
//! fixed 400-cell grid for rendering.

use crate::palette::{self, Rgb};
use downdeck_core::{Chunk, DownloadStatus, Task};

/// Number of cells in the visual partition (rendered 20x20).
pub const GRID_SIZE: usize = 400;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellStatus {
    /// Covered by a worker's range, not yet downloaded.
    Pending,
    /// The worker's cursor is inside this cell right now.
    Active,
    /// Downloaded, or the whole task finished.
    Done,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cell {
    pub status: CellStatus,
    pub color: Rgb,
    /// Worker index owning this cell, for the hover label.
    pub worker: u32,
}

impl Cell {
    pub fn label(&self) -> String {
        format!("Thread {}", self.worker)
    }
}

/// Partition a byte range into [`GRID_SIZE`] cells.
///
/// `None` cells carry no data at all (unknown size, or bytes outside every
/// worker's range). Overlapping chunks are tolerated: an `Active`
/// classification always overrides whatever was written before, otherwise
/// the first writer wins.
pub fn partition(total_size: i64, chunks: &[Chunk], finished: bool) -> Vec<Option<Cell>> {
    let mut cells: Vec<Option<Cell>> = vec![None; GRID_SIZE];

    // A task can be reported finished before it ever reported chunk
    // detail; render it as uniformly complete.
    if chunks.is_empty() {
        if finished {
            cells.fill(Some(Cell {
                status: CellStatus::Done,
                color: palette::COMPLETION,
                worker: 0,
            }));
        }
        return cells;
    }

    if total_size <= 0 {
        return cells;
    }

    let bytes_per_cell = total_size as f64 / GRID_SIZE as f64;
    let index_of = |offset: u64| (offset as f64 / bytes_per_cell).floor() as usize;

    for chunk in chunks {
        let start_index = index_of(chunk.start);
        let end_index = index_of(chunk.end).min(GRID_SIZE - 1);
        // Deliberately unclamped: a cursor one past the range must mark the
        // last covered cell done, not active.
        let cursor_index = index_of(chunk.current);
        if start_index > end_index {
            continue;
        }
        let color = palette::color_for(chunk.color_index);
        for index in start_index..=end_index {
            let status = if finished || index < cursor_index {
                CellStatus::Done
            } else if index == cursor_index {
                CellStatus::Active
            } else {
                CellStatus::Pending
            };
            if cells[index].is_none() || status == CellStatus::Active {
                cells[index] = Some(Cell {
                    status,
                    color,
                    worker: chunk.color_index,
                });
            }
        }
    }
    cells
}

/// Partition a task directly; `finished` follows terminal-success status.
pub fn grid_for(task: &Task) -> Vec<Option<Cell>> {
    partition(
        task.total_size,
        task.chunk_slice(),
        task.status == DownloadStatus::Finished,
    )
}
