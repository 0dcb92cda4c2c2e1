//! Cursor position, pen attributes, tab stops, scroll region, and the
//! per-slot charset designation table.
//!
//! Everything here is plain, saturating arithmetic over `u16` grid
//! coordinates — there is no way to construct an out-of-bounds cursor short
//! of calling `clamp`/`resize` with a zero-size grid, which both handle.

use crate::cell::SgrAttrs;
use crate::charset::{Charset, GraphicSlot};

/// Which single-shift (SS2/SS3) is pending for the next printable character,
/// if any.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SingleShift {
    #[default]
    None,
    Ss2,
    Ss3,
}

/// Cursor position, attributes, and the addressing state that travels with
/// it: pending-wrap flag, scroll/margin region, tab stops, and charset
/// designation/shift state.
#[derive(Debug, Clone, PartialEq)]
pub struct Cursor {
    pub row: u16,
    pub col: u16,
    pub attrs: SgrAttrs,
    /// Set when a printable character was written into the last column and
    /// autowrap is armed to carry the *next* character onto a new line
    /// (xterm's "deferred wrap" / "last column" flag).
    pub pending_wrap: bool,
    /// SS2/SS3 pending for exactly the next printable character.
    pub single_shift: SingleShift,

    scroll_top: u16,
    scroll_bottom: u16,
    left_margin: u16,
    right_margin: u16,

    /// G0-G3 designated charsets.
    charsets: [Charset; 4],
    /// Which slot is locked into GL via SI/SO.
    locked_slot: GraphicSlot,

    /// One bit per column: `true` marks a tab stop.
    tab_stops: Vec<bool>,
}

impl Cursor {
    /// A cursor homed at the origin with the default 8-column tab stops for
    /// a grid of the given size.
    pub fn new(cols: u16, rows: u16) -> Self {
        let mut cursor = Self {
            row: 0,
            col: 0,
            attrs: SgrAttrs::default(),
            pending_wrap: false,
            single_shift: SingleShift::None,
            scroll_top: 0,
            scroll_bottom: rows.saturating_sub(1),
            left_margin: 0,
            right_margin: cols.saturating_sub(1),
            charsets: [Charset::Ascii; 4],
            locked_slot: GraphicSlot::G0,
            tab_stops: Vec::new(),
        };
        cursor.reset_default_tab_stops(cols);
        cursor
    }

    /// A cursor at an explicit position (row/col already clamped by caller).
    pub fn at(row: u16, col: u16) -> Self {
        Self {
            row,
            col,
            ..Self::new(col.saturating_add(1).max(1), row.saturating_add(1).max(1))
        }
    }

    fn reset_default_tab_stops(&mut self, cols: u16) {
        self.tab_stops = (0..cols).map(|c| c % 8 == 0).collect();
    }

    // ── Movement ────────────────────────────────────────────────────

    pub fn carriage_return(&mut self) {
        self.col = self.left_margin;
        self.pending_wrap = false;
    }

    pub fn move_up(&mut self, n: u16) {
        self.row = self.row.saturating_sub(n);
        self.pending_wrap = false;
    }

    pub fn move_down(&mut self, n: u16, rows: u16) {
        let max_row = rows.saturating_sub(1);
        self.row = self.row.saturating_add(n).min(max_row);
        self.pending_wrap = false;
    }

    pub fn move_left(&mut self, n: u16) {
        self.col = self.col.saturating_sub(n);
        self.pending_wrap = false;
    }

    pub fn move_right(&mut self, n: u16, cols: u16) {
        let max_col = cols.saturating_sub(1);
        self.col = self.col.saturating_add(n).min(max_col);
        self.pending_wrap = false;
    }

    /// Absolute cursor positioning (`CUP`/`HVP`), already origin-mode
    /// translated by the dispatcher. Clamps to the grid bounds.
    pub fn move_to(&mut self, row: u16, col: u16, rows: u16, cols: u16) {
        self.row = row.min(rows.saturating_sub(1));
        self.col = col.min(cols.saturating_sub(1));
        self.pending_wrap = false;
    }

    /// Advance one column, arming `pending_wrap` instead of moving past the
    /// right margin when autowrap would otherwise carry over.
    ///
    /// Returns `true` if the cursor actually wrapped this call (used by the
    /// dispatcher to decide whether to mark the outgoing row as `wrapped`
    /// for scrollback reflow purposes).
    pub fn advance_with_wrap(&mut self, width: u16, autowrap: bool) -> bool {
        if self.pending_wrap {
            if autowrap {
                self.col = self.left_margin;
                self.row = self.row.saturating_add(1).min(self.scroll_bottom);
                self.pending_wrap = false;
            } else {
                self.pending_wrap = false;
            }
        }
        let next = self.col.saturating_add(width);
        if next > self.right_margin {
            self.col = self.right_margin;
            self.pending_wrap = true;
            true
        } else {
            self.col = next;
            false
        }
    }

    // ── Scroll region / margins ─────────────────────────────────────

    #[must_use]
    pub fn scroll_top(&self) -> u16 {
        self.scroll_top
    }

    #[must_use]
    pub fn scroll_bottom(&self) -> u16 {
        self.scroll_bottom
    }

    #[must_use]
    pub fn left_margin(&self) -> u16 {
        self.left_margin
    }

    #[must_use]
    pub fn right_margin(&self) -> u16 {
        self.right_margin
    }

    /// `DECSTBM`: set the top/bottom scroll margins (0-based, inclusive).
    /// Invalid ranges (top >= bottom) are ignored, matching xterm.
    pub fn set_scroll_region(&mut self, top: u16, bottom: u16, rows: u16) {
        let max_row = rows.saturating_sub(1);
        let top = top.min(max_row);
        let bottom = bottom.min(max_row);
        if top < bottom {
            self.scroll_top = top;
            self.scroll_bottom = bottom;
        }
    }

    pub fn reset_scroll_region(&mut self, rows: u16) {
        self.scroll_top = 0;
        self.scroll_bottom = rows.saturating_sub(1);
    }

    /// `DECSLRM`: set the left/right margins (requires DECLRMM enabled,
    /// checked by the dispatcher before calling this).
    pub fn set_left_right_margin(&mut self, left: u16, right: u16, cols: u16) {
        let max_col = cols.saturating_sub(1);
        let left = left.min(max_col);
        let right = right.min(max_col);
        if left < right {
            self.left_margin = left;
            self.right_margin = right;
        }
    }

    pub fn reset_left_right_margin(&mut self, cols: u16) {
        self.left_margin = 0;
        self.right_margin = cols.saturating_sub(1);
    }

    // ── Tab stops ───────────────────────────────────────────────────

    pub fn set_tab_stop(&mut self) {
        if let Some(slot) = self.tab_stops.get_mut(self.col as usize) {
            *slot = true;
        }
    }

    pub fn clear_tab_stop(&mut self) {
        if let Some(slot) = self.tab_stops.get_mut(self.col as usize) {
            *slot = false;
        }
    }

    pub fn clear_all_tab_stops(&mut self) {
        for slot in &mut self.tab_stops {
            *slot = false;
        }
    }

    /// Restore the default every-8th-column tab stops.
    pub fn reset_default_tabs(&mut self) {
        let cols = self.tab_stops.len() as u16;
        self.reset_default_tab_stops(cols);
    }

    /// Move the cursor to the next tab stop, or the right margin if none
    /// remain. Returns the column moved to.
    pub fn next_tab_stop(&mut self, cols: u16) -> u16 {
        let limit = self.right_margin.min(cols.saturating_sub(1));
        let mut col = self.col.saturating_add(1);
        while col < limit {
            if self.tab_stops.get(col as usize).copied().unwrap_or(false) {
                break;
            }
            col += 1;
        }
        self.col = col.min(limit);
        self.pending_wrap = false;
        self.col
    }

    /// Move the cursor to the previous tab stop, or the left margin.
    pub fn prev_tab_stop(&mut self) -> u16 {
        if self.col == 0 {
            return 0;
        }
        let mut col = self.col - 1;
        while col > self.left_margin {
            if self.tab_stops.get(col as usize).copied().unwrap_or(false) {
                break;
            }
            col -= 1;
        }
        self.col = col.max(self.left_margin);
        self.pending_wrap = false;
        self.col
    }

    // ── Charset designation ─────────────────────────────────────────

    pub fn designate_charset(&mut self, slot: GraphicSlot, charset: Charset) {
        self.charsets[slot.index()] = charset;
    }

    /// The charset currently in effect for the next printable character,
    /// accounting for a pending single shift (which applies once) before
    /// falling back to the locked GL slot.
    #[must_use]
    pub fn effective_charset(&self) -> Charset {
        match self.single_shift {
            SingleShift::Ss2 => self.charsets[GraphicSlot::G2.index()],
            SingleShift::Ss3 => self.charsets[GraphicSlot::G3.index()],
            SingleShift::None => self.charsets[self.locked_slot.index()],
        }
    }

    /// Consume the pending single shift, if any, returning it to the cursor's
    /// `None` resting state. Call once the affected character is written.
    pub fn consume_single_shift(&mut self) {
        self.single_shift = SingleShift::None;
    }

    pub fn invoke_single_shift_2(&mut self) {
        self.single_shift = SingleShift::Ss2;
    }

    pub fn invoke_single_shift_3(&mut self) {
        self.single_shift = SingleShift::Ss3;
    }

    /// SI (Shift In): lock GL to G0.
    pub fn shift_in(&mut self) {
        self.locked_slot = GraphicSlot::G0;
    }

    /// SO (Shift Out): lock GL to G1.
    pub fn shift_out(&mut self) {
        self.locked_slot = GraphicSlot::G1;
    }

    pub fn reset_charset(&mut self) {
        self.charsets = [Charset::Ascii; 4];
        self.locked_slot = GraphicSlot::G0;
        self.single_shift = SingleShift::None;
    }

    // ── Bounds maintenance ──────────────────────────────────────────

    /// Clamp the cursor and margins into `[0, cols) x [0, rows)` after an
    /// external resize or any other operation that may have shrunk the grid.
    pub fn clamp(&mut self, cols: u16, rows: u16) {
        let max_col = cols.saturating_sub(1);
        let max_row = rows.saturating_sub(1);
        self.col = self.col.min(max_col);
        self.row = self.row.min(max_row);
        self.scroll_top = self.scroll_top.min(max_row);
        self.scroll_bottom = self.scroll_bottom.min(max_row);
        if self.scroll_top > self.scroll_bottom {
            self.scroll_top = 0;
            self.scroll_bottom = max_row;
        }
        self.left_margin = self.left_margin.min(max_col);
        self.right_margin = self.right_margin.min(max_col);
        if self.left_margin > self.right_margin {
            self.left_margin = 0;
            self.right_margin = max_col;
        }
        self.pending_wrap = false;
    }

    /// Resize the tab-stop table to the new column count, preserving
    /// existing stops within range and extending with the default
    /// every-8th-column pattern for newly added columns, then clamp.
    pub fn resize(&mut self, new_cols: u16, new_rows: u16) {
        let new_cols = new_cols as usize;
        if new_cols > self.tab_stops.len() {
            let start = self.tab_stops.len();
            self.tab_stops.resize(new_cols, false);
            for col in start..new_cols {
                if col % 8 == 0 {
                    self.tab_stops[col] = true;
                }
            }
        } else {
            self.tab_stops.truncate(new_cols);
        }
        self.clamp(new_cols as u16, new_rows);
        self.reset_scroll_region(new_rows);
        self.reset_left_right_margin(new_cols as u16);
    }
}

/// `DECSC`/`DECRC` saved-cursor snapshot: position, pen, charset state, and
/// (per xterm) whether origin mode was in effect at save time.
#[derive(Debug, Clone, PartialEq)]
pub struct SavedCursor {
    pub row: u16,
    pub col: u16,
    pub attrs: SgrAttrs,
    pub pending_wrap: bool,
    pub origin_mode: bool,
    charsets: [Charset; 4],
    locked_slot: GraphicSlot,
}

impl Default for SavedCursor {
    fn default() -> Self {
        Self {
            row: 0,
            col: 0,
            attrs: SgrAttrs::default(),
            pending_wrap: false,
            origin_mode: false,
            charsets: [Charset::Ascii; 4],
            locked_slot: GraphicSlot::G0,
        }
    }
}

impl SavedCursor {
    /// Capture the cursor's DECSC-relevant state.
    pub fn save(cursor: &Cursor, origin_mode: bool) -> Self {
        Self {
            row: cursor.row,
            col: cursor.col,
            attrs: cursor.attrs,
            pending_wrap: cursor.pending_wrap,
            origin_mode,
            charsets: cursor.charsets,
            locked_slot: cursor.locked_slot,
        }
    }

    /// Restore into an existing cursor (position/attrs/pending-wrap/charset
    /// only — scroll region and tab stops are DECSTBM/HTS state, not part of
    /// DECSC/DECRC). Returns the saved origin-mode bit for the dispatcher to
    /// re-apply to the mode register.
    pub fn restore(&self, cursor: &mut Cursor) -> bool {
        cursor.row = self.row;
        cursor.col = self.col;
        cursor.attrs = self.attrs;
        cursor.pending_wrap = self.pending_wrap;
        cursor.charsets = self.charsets;
        cursor.locked_slot = self.locked_slot;
        self.origin_mode
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_cursor_is_homed_with_default_tabs() {
        let mut cursor = Cursor::new(80, 24);
        assert_eq!((cursor.row, cursor.col), (0, 0));
        assert_eq!(cursor.scroll_top(), 0);
        assert_eq!(cursor.scroll_bottom(), 23);
        cursor.col = 0;
        assert_eq!(cursor.next_tab_stop(80), 8);
    }

    #[test]
    fn move_clamped_to_bounds() {
        let mut cursor = Cursor::new(10, 5);
        cursor.move_right(100, 10);
        assert_eq!(cursor.col, 9);
        cursor.move_down(100, 5);
        assert_eq!(cursor.row, 4);
        cursor.move_left(100);
        assert_eq!(cursor.col, 0);
        cursor.move_up(100);
        assert_eq!(cursor.row, 0);
    }

    #[test]
    fn advance_with_wrap_arms_and_fires() {
        let mut cursor = Cursor::new(4, 3);
        cursor.col = 3;
        assert!(!cursor.pending_wrap);
        let wrapped = cursor.advance_with_wrap(1, true);
        assert!(wrapped);
        assert!(cursor.pending_wrap);
        assert_eq!(cursor.col, 3);
        // Next advance actually performs the wrap.
        let wrapped2 = cursor.advance_with_wrap(1, true);
        assert!(!wrapped2);
        assert_eq!(cursor.row, 1);
        assert_eq!(cursor.col, 1);
    }

    #[test]
    fn advance_without_autowrap_sticks_at_margin() {
        let mut cursor = Cursor::new(4, 3);
        cursor.col = 3;
        cursor.advance_with_wrap(1, false);
        cursor.advance_with_wrap(1, false);
        assert_eq!(cursor.col, 3);
        assert_eq!(cursor.row, 0);
    }

    #[test]
    fn tab_stops_default_every_eight_columns() {
        let mut cursor = Cursor::new(40, 1);
        cursor.col = 0;
        assert_eq!(cursor.next_tab_stop(40), 8);
        assert_eq!(cursor.next_tab_stop(40), 16);
        cursor.clear_all_tab_stops();
        assert_eq!(cursor.next_tab_stop(40), 39);
    }

    #[test]
    fn set_and_clear_single_tab_stop() {
        let mut cursor = Cursor::new(40, 1);
        cursor.clear_all_tab_stops();
        cursor.col = 5;
        cursor.set_tab_stop();
        cursor.col = 0;
        assert_eq!(cursor.next_tab_stop(40), 5);
        cursor.col = 5;
        cursor.clear_tab_stop();
        cursor.col = 0;
        assert_eq!(cursor.next_tab_stop(40), 39);
    }

    #[test]
    fn prev_tab_stop_honors_left_margin() {
        let mut cursor = Cursor::new(40, 1);
        cursor.set_left_right_margin(4, 39, 40);
        cursor.col = 10;
        assert_eq!(cursor.prev_tab_stop(), 8);
        assert_eq!(cursor.prev_tab_stop(), 4);
    }

    #[test]
    fn scroll_region_rejects_inverted_range() {
        let mut cursor = Cursor::new(10, 10);
        cursor.set_scroll_region(5, 2, 10);
        assert_eq!((cursor.scroll_top(), cursor.scroll_bottom()), (0, 9));
        cursor.set_scroll_region(2, 5, 10);
        assert_eq!((cursor.scroll_top(), cursor.scroll_bottom()), (2, 5));
    }

    #[test]
    fn charset_designation_and_single_shift() {
        let mut cursor = Cursor::new(10, 10);
        cursor.designate_charset(GraphicSlot::G1, Charset::DecSpecialGraphics);
        cursor.shift_out();
        assert_eq!(cursor.effective_charset(), Charset::DecSpecialGraphics);
        cursor.designate_charset(GraphicSlot::G2, Charset::Uk);
        cursor.invoke_single_shift_2();
        assert_eq!(cursor.effective_charset(), Charset::Uk);
        cursor.consume_single_shift();
        assert_eq!(cursor.effective_charset(), Charset::DecSpecialGraphics);
    }

    #[test]
    fn save_restore_round_trip() {
        let mut cursor = Cursor::new(10, 10);
        cursor.row = 3;
        cursor.col = 4;
        cursor.attrs.flags = crate::cell::SgrFlags::BOLD;
        cursor.designate_charset(GraphicSlot::G0, Charset::DecSpecialGraphics);
        let saved = SavedCursor::save(&cursor, true);

        let mut fresh = Cursor::new(10, 10);
        let origin = saved.restore(&mut fresh);
        assert!(origin);
        assert_eq!(fresh.row, 3);
        assert_eq!(fresh.col, 4);
        assert_eq!(fresh.attrs.flags, crate::cell::SgrFlags::BOLD);
        assert_eq!(fresh.effective_charset(), Charset::DecSpecialGraphics);
    }

    #[test]
    fn clamp_after_shrink_fixes_margins_and_region() {
        let mut cursor = Cursor::new(80, 24);
        cursor.row = 20;
        cursor.col = 70;
        cursor.set_scroll_region(5, 20, 24);
        cursor.clamp(40, 10);
        assert_eq!(cursor.col, 39);
        assert_eq!(cursor.row, 9);
        assert_eq!(cursor.scroll_bottom(), 9);
    }

    #[test]
    fn resize_extends_tab_stops_with_default_pattern() {
        let mut cursor = Cursor::new(10, 5);
        cursor.clear_all_tab_stops();
        cursor.resize(20, 5);
        cursor.col = 0;
        assert_eq!(cursor.next_tab_stop(20), 16);
    }
}
