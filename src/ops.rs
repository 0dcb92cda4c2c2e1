//! Deferred operation queue: the dispatcher enqueues [`Operation`]s instead
//! of mutating the grid directly; [`OpQueue::flush`] applies them in order
//! against a [`Grid`], checking protected cells at *apply* time rather than
//! at enqueue time (a cell's DECSCA protection can itself change between
//! enqueue and flush within the same batch).

use crate::cell::{Color, SgrAttrs, SgrFlags};
use crate::grid::Grid;
use crate::patch::DirtyTracker;

/// Per-row flags that live outside the cell grid: DECDHL/DECDWL line
/// attributes. Kept as a sibling `Vec<RowFlags>` (resized in lockstep with
/// the grid) rather than folded into `Cell` — these are line-wide, not
/// per-cell, properties.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RowFlags {
    pub double_width: bool,
    pub double_height_top: bool,
    pub double_height_bottom: bool,
}

/// A single deferred screen mutation. Produced by the dispatcher from a
/// parsed `Action`; applied in FIFO order by [`OpQueue::flush`].
#[derive(Debug, Clone)]
pub enum Operation {
    /// Write one printable scalar at `(row, col)` with the given width (1 or
    /// 2 — wide pairs are written as a single `Write` with `width: 2`).
    Write {
        row: u16,
        col: u16,
        ch: char,
        width: u8,
        attrs: SgrAttrs,
    },
    /// Attach a zero-width combining mark to the nearest preceding
    /// non-combining cell (`row`, `col` is that cell's position, not a new
    /// column — the mark never advances the cursor or occupies its own
    /// cell).
    AttachCombining {
        row: u16,
        col: u16,
        ch: char,
    },
    FillRect {
        top: u16,
        left: u16,
        bottom: u16,
        right: u16,
        ch: char,
        attrs: SgrAttrs,
    },
    CopyRect {
        top: u16,
        left: u16,
        bottom: u16,
        right: u16,
        dst_row: u16,
        dst_col: u16,
    },
    SetAttrRect {
        top: u16,
        left: u16,
        bottom: u16,
        right: u16,
        flags: SgrFlags,
    },
    ReverseAttrRect {
        top: u16,
        left: u16,
        bottom: u16,
        right: u16,
        flags: SgrFlags,
    },
    /// `DECSERA`/selective-erase variants: always protected-cell aware.
    EraseRectSelective {
        top: u16,
        left: u16,
        bottom: u16,
        right: u16,
        bg: Color,
    },
    /// Plain ED/EL/ECH-style erase: never protected-cell aware.
    EraseRect {
        top: u16,
        left: u16,
        bottom: u16,
        right: u16,
        bg: Color,
    },
    ScrollUp { top: u16, bottom: u16, count: u16, bg: Color },
    ScrollDown { top: u16, bottom: u16, count: u16, bg: Color },
    InsertLines { row: u16, count: u16, top: u16, bottom: u16, bg: Color },
    DeleteLines { row: u16, count: u16, top: u16, bottom: u16, bg: Color },
    InsertChars { row: u16, col: u16, count: u16, bg: Color },
    DeleteChars { row: u16, col: u16, count: u16, bg: Color },
    EraseChars { row: u16, col: u16, count: u16, bg: Color },
    SetLineFlags { row: u16, flags: RowFlags },
    ResetLineFlags { row: u16 },
}

/// FIFO queue of deferred [`Operation`]s, flushed against a [`Grid`] and a
/// parallel row-flags vector. Accumulates dirty-rect damage into the
/// supplied [`DirtyTracker`] as it flushes.
#[derive(Debug, Clone, Default)]
pub struct OpQueue {
    ops: Vec<Operation>,
}

impl OpQueue {
    pub fn new() -> Self {
        Self { ops: Vec::new() }
    }

    pub fn enqueue(&mut self, op: Operation) {
        self.ops.push(op);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Apply every queued operation to `grid` (and `line_flags`, one entry
    /// per row) in FIFO order, marking damage in `tracker`, then clear the
    /// queue.
    pub fn flush(&mut self, grid: &mut Grid, line_flags: &mut [RowFlags], tracker: &mut DirtyTracker) {
        for op in self.ops.drain(..) {
            apply(grid, line_flags, tracker, op);
        }
    }
}

/// Whether any cell in `[top, bottom) x [left, right)` carries the DECSCA
/// protection flag. Checked at flush time (not enqueue time) so a prior op
/// in the same batch that cleared protection can unblock a later one.
fn rect_has_protected(grid: &Grid, top: u16, left: u16, bottom: u16, right: u16) -> bool {
    (top..bottom).any(|row| {
        grid.row_cells(row)
            .map(|cells| {
                let right = (right as usize).min(cells.len());
                let left = (left as usize).min(right);
                cells[left..right].iter().any(|c| c.is_protected())
            })
            .unwrap_or(false)
    })
}

fn apply(grid: &mut Grid, line_flags: &mut [RowFlags], tracker: &mut DirtyTracker, op: Operation) {
    match op {
        Operation::Write { row, col, ch, width: _, attrs } => {
            let written = grid.write_printable(row, col, ch, attrs);
            if written > 0 {
                tracker.mark_rect(row, col, row + 1, col + written as u16);
            }
        }
        Operation::AttachCombining { row, col, ch } => {
            if grid.attach_combining(row, col, ch) {
                tracker.mark_rect(row, col, row + 1, col + 1);
            }
        }
        Operation::FillRect { top, left, bottom, right, ch, attrs } => {
            grid.fill_rect(top, left, bottom, right, ch, attrs);
            tracker.mark_rect(top, left, bottom, right);
        }
        Operation::CopyRect { top, left, bottom, right, dst_row, dst_col } => {
            let src = grid.clone();
            grid.copy_rect(&src, top, left, bottom, right, dst_row, dst_col);
            let height = bottom.saturating_sub(top);
            let width = right.saturating_sub(left);
            tracker.mark_rect(dst_row, dst_col, dst_row + height, dst_col + width);
        }
        Operation::SetAttrRect { top, left, bottom, right, flags } => {
            grid.apply_attrs_rect(top, left, bottom, right, flags);
            tracker.mark_rect(top, left, bottom, right);
        }
        Operation::ReverseAttrRect { top, left, bottom, right, flags } => {
            grid.reverse_attrs_rect(top, left, bottom, right, flags);
            tracker.mark_rect(top, left, bottom, right);
        }
        Operation::EraseRectSelective { top, left, bottom, right, bg } => {
            grid.erase_rect_selective(top, left, bottom, right, bg);
            tracker.mark_rect(top, left, bottom, right);
        }
        Operation::EraseRect { top, left, bottom, right, bg } => {
            grid.clear_region(top, left, bottom, right);
            let _ = bg; // clear_region always resets to Cell::default(); bg kept for symmetry/logging
            tracker.mark_rect(top, left, bottom, right);
        }
        Operation::ScrollUp { top, bottom, count, bg } => {
            if rect_has_protected(grid, top, 0, bottom, grid.cols()) {
                return;
            }
            grid.scroll_up(top, bottom, count, bg);
            tracker.mark_rect(top, 0, bottom + 1, grid.cols());
        }
        Operation::ScrollDown { top, bottom, count, bg } => {
            if rect_has_protected(grid, top, 0, bottom, grid.cols()) {
                return;
            }
            grid.scroll_down(top, bottom, count, bg);
            tracker.mark_rect(top, 0, bottom + 1, grid.cols());
        }
        Operation::InsertLines { row, count, top, bottom, bg } => {
            if rect_has_protected(grid, row, 0, bottom, grid.cols()) {
                return;
            }
            grid.insert_lines(row, count, top, bottom, bg);
            tracker.mark_rect(row, 0, bottom + 1, grid.cols());
        }
        Operation::DeleteLines { row, count, top, bottom, bg } => {
            if rect_has_protected(grid, row, 0, bottom, grid.cols()) {
                return;
            }
            grid.delete_lines(row, count, top, bottom, bg);
            tracker.mark_rect(row, 0, bottom + 1, grid.cols());
        }
        Operation::InsertChars { row, col, count, bg } => {
            if rect_has_protected(grid, row, col, row + 1, grid.cols()) {
                return;
            }
            grid.insert_chars(row, col, count, bg);
            tracker.mark_rect(row, col, row + 1, grid.cols());
        }
        Operation::DeleteChars { row, col, count, bg } => {
            if rect_has_protected(grid, row, col, row + 1, grid.cols()) {
                return;
            }
            grid.delete_chars(row, col, count, bg);
            tracker.mark_rect(row, col, row + 1, grid.cols());
        }
        Operation::EraseChars { row, col, count, bg } => {
            grid.erase_chars(row, col, count, bg);
            tracker.mark_rect(row, col, row + 1, col.saturating_add(count));
        }
        Operation::SetLineFlags { row, flags } => {
            if let Some(slot) = line_flags.get_mut(row as usize) {
                *slot = flags;
            }
            tracker.mark_rect(row, 0, row + 1, grid.cols());
        }
        Operation::ResetLineFlags { row } => {
            if let Some(slot) = line_flags.get_mut(row as usize) {
                *slot = RowFlags::default();
            }
            tracker.mark_rect(row, 0, row + 1, grid.cols());
        }
    }
}
