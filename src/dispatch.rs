//! Command dispatcher: turns parsed [`Action`]s into deferred [`Operation`]s
//! on a session's [`OpQueue`] plus the side effects that must happen
//! immediately rather than at flush time — cursor motion, mode writes,
//! charset/shift state, scroll-region-aware scrolling (which needs the
//! scrollback, not modeled as a deferred op), and response-sink writes.
//!
//! Coordinate translation (DECOM origin mode, DECLRMM left/right margins)
//! is centralized here in [`translate`] rather than scattered across every
//! cursor-addressing action, so the origin-mode semantics can't drift
//! between `CUP`, `HVP`, and the rectangular-area operations.

use crate::cell::{Cell, Color, SgrFlags};
use crate::charset::translate_charset;
use crate::cursor::SavedCursor;
use crate::gateway::{GatewayCommand, GatewayOutcome, GatewayState};
use crate::ops::Operation;
use crate::parser::{Action, StringKind, StringPayload};
use crate::session::Session;

#[cfg(feature = "tracing")]
use tracing::warn;

/// xterm caps the `XTPUSHSGR` rendition stack at 10 entries; excess pushes
/// are silently dropped rather than growing without bound.
const SGR_STACK_LIMIT: usize = 10;

/// What a single `dispatch` call produced beyond grid/cursor side effects:
/// a Gateway command the host's own callback must handle, or a dimension
/// change the host must propagate to its own window/pty.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DispatchOutcome {
    /// Set when a Gateway command addressed a class other than `KTERM` —
    /// a handled/delegated split flattened into this struct rather than
    /// returned as an enum so ordinary actions don't have to wrap a
    /// trivial "handled" every call.
    pub gateway_delegated: Option<GatewayCommand>,
    /// Set when `DECCOLM` (80/132 column switch) changed the session's
    /// dimensions; the host is expected to resize its own buffers to match.
    pub resized: Option<(u16, u16)>,
}

impl DispatchOutcome {
    fn gateway(outcome: GatewayOutcome) -> Self {
        match outcome {
            GatewayOutcome::Handled => Self::default(),
            GatewayOutcome::Delegated(cmd) => Self { gateway_delegated: Some(cmd), ..Self::default() },
        }
    }
}

/// Apply one parsed `Action` to `session`: enqueue [`Operation`]s for grid
/// content, update cursor/mode/charset state immediately, and write any
/// reply bytes to the session's response sink.
pub fn dispatch(action: Action, session: &mut Session) -> DispatchOutcome {
    match action {
        Action::Print(ch) => {
            dispatch_print(session, ch);
        }
        Action::Newline => dispatch_newline(session),
        Action::CarriageReturn => session.cursor.carriage_return(),
        Action::Tab => {
            let cols = session.cols;
            session.cursor.col = session.cursor.next_tab_stop(cols);
        }
        Action::Backspace => session.cursor.move_left(1),
        Action::Bell => {}
        Action::CursorUp(n) => session.cursor.move_up(n.max(1)),
        Action::CursorDown(n) => session.cursor.move_down(n.max(1), session.rows),
        Action::CursorRight(n) => session.cursor.move_right(n.max(1), session.cols),
        Action::CursorLeft(n) => session.cursor.move_left(n.max(1)),
        Action::CursorNextLine(n) => {
            session.cursor.move_down(n.max(1), session.rows);
            session.cursor.col = session.cursor.left_margin();
            session.cursor.pending_wrap = false;
        }
        Action::CursorPrevLine(n) => {
            session.cursor.move_up(n.max(1));
            session.cursor.col = session.cursor.left_margin();
            session.cursor.pending_wrap = false;
        }
        Action::CursorRow(row) => {
            let (abs_row, _) = translate(session, row, session.cursor.col);
            let (rows, cols) = (session.rows, session.cols);
            session.cursor.move_to(abs_row, session.cursor.col, rows, cols);
        }
        Action::CursorColumn(col) => {
            let (rows, cols) = (session.rows, session.cols);
            session.cursor.move_to(session.cursor.row, col, rows, cols);
        }
        Action::CursorPosition { row, col } => {
            let (abs_row, abs_col) = translate(session, row, col);
            let (rows, cols) = (session.rows, session.cols);
            session.cursor.move_to(abs_row, abs_col, rows, cols);
        }
        Action::SetScrollRegion { top, bottom } => {
            let rows = session.rows;
            let bottom = if bottom == 0 { rows } else { bottom.min(rows) };
            session.cursor.set_scroll_region(top, bottom.saturating_sub(1), rows);
            home_cursor(session);
        }
        Action::SetLeftRightMargin { left, right } => {
            if session.modes.left_right_margin_mode() {
                let cols = session.cols;
                let right = if right == 0 { cols } else { right.min(cols) };
                session.cursor.set_left_right_margin(left, right.saturating_sub(1), cols);
                home_cursor(session);
            }
        }
        Action::ScrollUp(count) => scroll_region_up(session, count.max(1)),
        Action::ScrollDown(count) => scroll_region_down(session, count.max(1)),
        Action::InsertLines(count) => {
            let row = session.cursor.row;
            let (top, bottom) = (session.cursor.scroll_top(), session.cursor.scroll_bottom() + 1);
            let bg = session.cursor.attrs.bg;
            session.ops.enqueue(Operation::InsertLines { row, count: count.max(1), top, bottom, bg });
            session.cursor.pending_wrap = false;
        }
        Action::DeleteLines(count) => {
            let row = session.cursor.row;
            let (top, bottom) = (session.cursor.scroll_top(), session.cursor.scroll_bottom() + 1);
            let bg = session.cursor.attrs.bg;
            session.ops.enqueue(Operation::DeleteLines { row, count: count.max(1), top, bottom, bg });
            session.cursor.pending_wrap = false;
        }
        Action::InsertChars(count) => {
            let (row, col) = (session.cursor.row, session.cursor.col);
            let bg = session.cursor.attrs.bg;
            session.ops.enqueue(Operation::InsertChars { row, col, count: count.max(1), bg });
            session.cursor.pending_wrap = false;
        }
        Action::DeleteChars(count) => {
            let (row, col) = (session.cursor.row, session.cursor.col);
            let bg = session.cursor.attrs.bg;
            session.ops.enqueue(Operation::DeleteChars { row, col, count: count.max(1), bg });
            session.cursor.pending_wrap = false;
        }
        Action::EraseChars(count) => {
            let (row, col) = (session.cursor.row, session.cursor.col);
            let bg = session.cursor.attrs.bg;
            session.ops.enqueue(Operation::EraseChars { row, col, count: count.max(1), bg });
        }
        Action::EraseInDisplay(mode) => dispatch_erase_display(session, mode, false),
        Action::EraseInLine(mode) => dispatch_erase_line(session, mode, false),
        Action::SelectiveEraseInDisplay(mode) => dispatch_erase_display(session, mode, true),
        Action::SelectiveEraseInLine(mode) => dispatch_erase_line(session, mode, true),
        Action::RepeatChar(count) => {
            if let Some(ch) = session.last_char {
                for _ in 0..count.max(1) {
                    dispatch_print(session, ch);
                }
            }
        }
        Action::Sgr(params) => session.cursor.attrs.apply_sgr_params(&params),
        Action::PushSgr(_params) => {
            // Aspect-selection (`Ps` naming individual SGR groups) isn't
            // modeled; every push saves the full rendition, which is what
            // an unparameterized XTPUSHSGR does and a superset of any
            // selective form.
            if session.sgr_stack.len() < SGR_STACK_LIMIT {
                session.sgr_stack.push(session.cursor.attrs);
            }
        }
        Action::PopSgr => {
            if let Some(attrs) = session.sgr_stack.pop() {
                session.cursor.attrs = attrs;
            }
        }
        Action::DecSet(params) => {
            let mut resized = None;
            for p in params {
                resized = set_dec_mode(session, p, true).or(resized);
            }
            return DispatchOutcome { resized, ..DispatchOutcome::default() };
        }
        Action::DecRst(params) => {
            let mut resized = None;
            for p in params {
                resized = set_dec_mode(session, p, false).or(resized);
            }
            return DispatchOutcome { resized, ..DispatchOutcome::default() };
        }
        Action::AnsiSet(params) => {
            for p in params {
                session.modes.set_ansi_mode(p, true);
            }
        }
        Action::AnsiRst(params) => {
            for p in params {
                session.modes.set_ansi_mode(p, false);
            }
        }
        Action::RequestMode { param, private } => report_mode(session, param, private),
        Action::SaveCursor => {
            session.saved_cursor = SavedCursor::save(&session.cursor, session.modes.origin_mode());
        }
        Action::RestoreCursor => {
            let origin_mode = session.saved_cursor.restore(&mut session.cursor);
            session.modes.dec.set(crate::modes::DecModes::ORIGIN, origin_mode);
            let (rows, cols) = (session.rows, session.cols);
            session.cursor.clamp(cols, rows);
        }
        Action::Index => index_or_scroll(session),
        Action::ReverseIndex => reverse_index(session),
        Action::NextLine => {
            session.cursor.col = session.cursor.left_margin();
            session.cursor.pending_wrap = false;
            index_or_scroll(session);
        }
        Action::FullReset => full_reset(session),
        Action::SoftReset => soft_reset(session),
        Action::SetTabStop => session.cursor.set_tab_stop(),
        Action::ClearTabStop(mode) => match mode {
            3 | 5 => session.cursor.clear_all_tab_stops(),
            _ => session.cursor.clear_tab_stop(),
        },
        Action::ForwardTab(count) => {
            let cols = session.cols;
            for _ in 0..count.max(1) {
                session.cursor.next_tab_stop(cols);
            }
        }
        Action::BackTab(count) => {
            for _ in 0..count {
                session.cursor.prev_tab_stop();
            }
        }
        Action::ApplicationKeypad => session.modes.dec.insert(crate::modes::DecModes::APPLICATION_KEYPAD),
        Action::NormalKeypad => session.modes.dec.remove(crate::modes::DecModes::APPLICATION_KEYPAD),
        Action::SetCursorShape(shape) => session.cursor_shape = shape,
        Action::DesignateCharset { slot, charset } => session.cursor.designate_charset(slot, charset),
        Action::SingleShift2 => session.cursor.invoke_single_shift_2(),
        Action::SingleShift3 => session.cursor.invoke_single_shift_3(),
        Action::ShiftIn => session.cursor.shift_in(),
        Action::ShiftOut => session.cursor.shift_out(),
        Action::FocusIn | Action::FocusOut => {}
        Action::PasteStart | Action::PasteEnd => {}
        Action::MouseEvent { .. } => {}
        Action::DeviceAttributes => {
            if !session.parser.is_vt52() {
                let reply = session.level.da1_reply().to_string();
                session.response.write_str(&reply);
            }
        }
        Action::DeviceAttributesSecondary => {
            let reply = session.level.da2_reply().to_string();
            session.response.write_str(&reply);
        }
        Action::DeviceAttributesTertiary => {
            session.response.write_str("\x1bP!|00000000\x1b\\");
        }
        Action::DeviceStatusReport { param, private } => report_status(session, param, private),
        Action::FillRectArea(params) => dispatch_fill_rect(session, &params),
        Action::CopyRectArea(params) => dispatch_copy_rect(session, &params),
        Action::ChangeAttrRect { params, reverse } => dispatch_change_attr_rect(session, &params, reverse),
        Action::EraseRectArea(params) => dispatch_erase_rect_area(session, &params),
        Action::SelectiveEraseRect(params) => dispatch_selective_erase_rect(session, &params),
        Action::RequestChecksumRect(params) => dispatch_checksum_rect(session, &params),
        Action::SetProtection(mode) => session.protected_pen = mode == 1,
        Action::StringPayload(payload) => return dispatch_string_payload(session, payload),
        Action::Vt52CursorPosition { row, col } => {
            let (rows, cols) = (session.rows, session.cols);
            session.cursor.move_to(row, col, rows, cols);
        }
        Action::Vt52Identify => session.response.write_str("\x1b/Z"),
        Action::EnterVt52 => enter_vt52(session),
        Action::ExitVt52 => exit_vt52(session),
        Action::Unsupported(seq) => dispatch_unsupported(session, &seq),
    }
    DispatchOutcome::default()
}

// ── Coordinate translation (DECOM) ─────────────────────────────────────

/// Translate a row/column pair from a cursor-addressing action (`CUP`,
/// `HVP`, `VPA`) into absolute grid coordinates, honoring origin mode. Row
/// addressing is relative to the scroll region when DECOM is set; column
/// addressing is always absolute (xterm does not offset columns by the
/// left margin for `CUP`/`VPA`, only the cursor's own advance logic does).
fn translate(session: &Session, row: u16, col: u16) -> (u16, u16) {
    if session.modes.origin_mode() {
        let top = session.cursor.scroll_top();
        let bottom = session.cursor.scroll_bottom();
        let abs_row = row.saturating_add(top).min(bottom);
        (abs_row, col)
    } else {
        (row, col)
    }
}

fn home_cursor(session: &mut Session) {
    if session.modes.origin_mode() {
        session.cursor.row = session.cursor.scroll_top();
        session.cursor.col = session.cursor.left_margin();
    } else {
        let (rows, cols) = (session.rows, session.cols);
        session.cursor.move_to(0, 0, rows, cols);
    }
    session.cursor.pending_wrap = false;
}

// ── Printing / newline / scrolling ──────────────────────────────────────

fn dispatch_print(session: &mut Session, ch: char) {
    let ch = translate_charset(ch, session.cursor.effective_charset());
    session.cursor.consume_single_shift();

    if session.cursor.pending_wrap {
        wrap_to_next_line(session);
    }

    let width = Cell::display_width(ch);
    if width == 0 {
        if let Some((row, col)) = session.last_print_pos {
            session.ops.enqueue(Operation::AttachCombining { row, col, ch });
        }
        return;
    }

    if width == 2 && session.cursor.col + 1 > session.cursor.right_margin() {
        wrap_to_next_line(session);
    }

    let attrs = session.cursor.attrs;
    let row = session.cursor.row;
    let col = session.cursor.col;

    if session.modes.insert_mode() {
        session.ops.enqueue(Operation::InsertChars { row, col, count: width as u16, bg: attrs.bg });
    }

    session.ops.enqueue(Operation::Write { row, col, ch, width, attrs });
    session.last_print_pos = Some((row, col));
    if session.current_hyperlink != 0 {
        session.pending_hyperlinks.push((row, col, session.current_hyperlink));
    }
    if session.protected_pen {
        session.pending_protected.push((row, col));
    }
    session.last_char = Some(ch);

    let written = width as u16;
    let right_margin = session.cursor.right_margin();
    if col + written > right_margin {
        session.cursor.col = right_margin;
        session.cursor.pending_wrap = true;
    } else {
        session.cursor.col = col + written;
        session.cursor.pending_wrap = false;
    }
}

fn wrap_to_next_line(session: &mut Session) {
    session.cursor.col = session.cursor.left_margin();
    session.cursor.pending_wrap = false;
    index_or_scroll(session);
}

fn dispatch_newline(session: &mut Session) {
    if session.modes.ansi.contains(crate::modes::AnsiModes::LINEFEED_NEWLINE) {
        session.cursor.col = session.cursor.left_margin();
    }
    index_or_scroll(session);
}

/// `IND`/bottom-of-region autowrap: advance one row, scrolling the region
/// (and, on the primary screen, pushing the evicted row into scrollback)
/// when the cursor is already on the bottom margin.
fn index_or_scroll(session: &mut Session) {
    if session.cursor.row >= session.cursor.scroll_bottom() {
        scroll_region_up(session, 1);
    } else {
        session.cursor.row += 1;
        session.cursor.pending_wrap = false;
    }
}

fn reverse_index(session: &mut Session) {
    if session.cursor.row == session.cursor.scroll_top() {
        scroll_region_down(session, 1);
    } else {
        session.cursor.move_up(1);
    }
}

fn scroll_region_up(session: &mut Session, count: u16) {
    let top = session.cursor.scroll_top();
    let bottom = session.cursor.scroll_bottom() + 1;
    let bg = session.cursor.attrs.bg;
    if session.using_alt_screen {
        session.grid.scroll_up(top, bottom, count, bg);
    } else {
        session.grid.scroll_up_into(top, bottom, count, &mut session.scrollback, bg);
    }
    session.tracker.mark_rect(top, 0, bottom, session.grid.cols());
}

fn scroll_region_down(session: &mut Session, count: u16) {
    let top = session.cursor.scroll_top();
    let bottom = session.cursor.scroll_bottom() + 1;
    let bg = session.cursor.attrs.bg;
    if !session.using_alt_screen && !session.scrollback.is_empty() {
        session.grid.scroll_down_from(top, bottom, count, &mut session.scrollback, bg);
    } else {
        session.grid.scroll_down(top, bottom, count, bg);
    }
    session.tracker.mark_rect(top, 0, bottom, session.grid.cols());
}

// ── Erase ────────────────────────────────────────────────────────────

fn dispatch_erase_display(session: &mut Session, mode: u16, selective: bool) {
    let (row, col) = (session.cursor.row, session.cursor.col);
    let (cols, rows) = (session.grid.cols(), session.grid.rows());
    let bg = session.cursor.attrs.bg;
    match mode {
        0 => {
            enqueue_erase(session, row, col, row + 1, cols, bg, selective);
            if row + 1 < rows {
                enqueue_erase(session, row + 1, 0, rows, cols, bg, selective);
            }
        }
        1 => {
            if row > 0 {
                enqueue_erase(session, 0, 0, row, cols, bg, selective);
            }
            enqueue_erase(session, row, 0, row + 1, col + 1, bg, selective);
        }
        2 | 3 => enqueue_erase(session, 0, 0, rows, cols, bg, selective),
        _ => {}
    }
}

fn dispatch_erase_line(session: &mut Session, mode: u16, selective: bool) {
    let (row, col) = (session.cursor.row, session.cursor.col);
    let cols = session.grid.cols();
    let bg = session.cursor.attrs.bg;
    match mode {
        0 => enqueue_erase(session, row, col, row + 1, cols, bg, selective),
        1 => enqueue_erase(session, row, 0, row + 1, col + 1, bg, selective),
        2 => enqueue_erase(session, row, 0, row + 1, cols, bg, selective),
        _ => {}
    }
}

fn enqueue_erase(session: &mut Session, top: u16, left: u16, bottom: u16, right: u16, bg: Color, selective: bool) {
    if selective {
        session.ops.enqueue(Operation::EraseRectSelective { top, left, bottom, right, bg });
    } else {
        session.ops.enqueue(Operation::EraseRect { top, left, bottom, right, bg });
    }
}

// ── Modes ────────────────────────────────────────────────────────────

fn set_dec_mode(session: &mut Session, param: u16, enabled: bool) -> Option<(u16, u16)> {
    match param {
        // DECANM (mode 2) has inverted sense from the literal VT52 bit:
        // `CSI ? 2 h` ("set DECANM") means enter ANSI mode, i.e. clear the
        // VT52 bit; `CSI ? 2 l` means drop into VT52 mode, i.e. set it.
        2 => {
            session.modes.set_dec_mode(2, !enabled);
            session.parser.set_vt52(!enabled);
            None
        }
        3 => {
            session.modes.set_dec_mode(3, enabled);
            resize_for_decolm(session, enabled)
        }
        47 | 1047 => {
            session.modes.set_dec_mode(param, enabled);
            swap_alt_screen(session, enabled, false);
            None
        }
        1048 => {
            session.modes.set_dec_mode(1048, enabled);
            if enabled {
                session.saved_cursor = SavedCursor::save(&session.cursor, session.modes.origin_mode());
            } else {
                session.saved_cursor.restore(&mut session.cursor);
            }
            None
        }
        1049 => {
            session.modes.set_dec_mode(1049, enabled);
            swap_alt_screen(session, enabled, true);
            None
        }
        _ => {
            session.modes.set_dec_mode(param, enabled);
            None
        }
    }
}

/// `DECCOLM`: switch between 80- and 132-column mode. xterm resizes the
/// grid and (unless `DECNCSM` is set) clears the screen and homes the
/// cursor. Returns the new `(cols, rows)` so the caller can surface it
/// through `DispatchOutcome::resized`.
fn resize_for_decolm(session: &mut Session, wide: bool) -> Option<(u16, u16)> {
    let new_cols = if wide { 132 } else { 80 };
    if new_cols == session.cols {
        return None;
    }
    session.cols = new_cols;
    let cursor_row = session.cursor.row;
    let new_row = session.grid.resize_with_scrollback(new_cols, session.rows, cursor_row, &mut session.scrollback);
    session.cursor.resize(new_cols, session.rows);
    session.cursor.row = new_row;
    session.line_flags.resize(session.rows as usize, Default::default());
    if !session.modes.dec.contains(crate::modes::DecModes::NO_CLEAR_ON_COLM) {
        session.grid.erase_all(Color::Default);
        session.cursor.move_to(0, 0, session.rows, session.cols);
    }
    session.tracker.resize(session.cols, session.rows);
    Some((session.cols, session.rows))
}

fn swap_alt_screen(session: &mut Session, enter: bool, save_cursor: bool) {
    if enter == session.using_alt_screen {
        return;
    }
    if enter {
        if save_cursor {
            session.saved_cursor = SavedCursor::save(&session.cursor, session.modes.origin_mode());
        }
        std::mem::swap(&mut session.grid, &mut session.alt_grid);
        session.grid.erase_all(Color::Default);
        session.using_alt_screen = true;
    } else {
        std::mem::swap(&mut session.grid, &mut session.alt_grid);
        session.alt_grid = crate::grid::Grid::new(session.cols, session.rows);
        session.using_alt_screen = false;
        if save_cursor {
            session.saved_cursor.restore(&mut session.cursor);
        }
    }
    session.tracker.resize(session.cols, session.rows);
}

fn enter_vt52(session: &mut Session) {
    session.modes.dec.insert(crate::modes::DecModes::VT52);
    session.parser.set_vt52(true);
}

fn exit_vt52(session: &mut Session) {
    session.modes.dec.remove(crate::modes::DecModes::VT52);
    session.parser.set_vt52(false);
}

fn report_mode(session: &mut Session, param: u16, private: bool) {
    let state = if private { session.modes.dec_mode(param) } else { session.modes.ansi_mode(param) };
    let pm = match state {
        None => 0,
        Some(true) => 1,
        Some(false) => 2,
    };
    if private {
        session.response.write_str(&format!("\x1b[?{param};{pm}$y"));
    } else {
        session.response.write_str(&format!("\x1b[{param};{pm}$y"));
    }
}

fn report_status(session: &mut Session, param: u16, private: bool) {
    match param {
        5 => session.response.write_str("\x1b[0n"),
        6 => {
            let row = session.cursor.row + 1;
            let col = session.cursor.col + 1;
            if private {
                session.response.write_str(&format!("\x1b[?{row};{col}R"));
            } else {
                session.response.write_str(&format!("\x1b[{row};{col}R"));
            }
        }
        _ => {}
    }
}

// ── Reset ────────────────────────────────────────────────────────────

fn full_reset(session: &mut Session) {
    let (cols, rows) = (session.cols, session.rows);
    session.grid = crate::grid::Grid::new(cols, rows);
    session.alt_grid = crate::grid::Grid::new(cols, rows);
    session.using_alt_screen = false;
    session.cursor = crate::cursor::Cursor::new(cols, rows);
    session.saved_cursor = SavedCursor::default();
    session.scrollback.clear();
    session.modes = session.level.default_modes();
    session.line_flags = vec![Default::default(); rows as usize];
    session.tracker.clear();
    session.tracker.resize(cols, rows);
    session.gateway = GatewayState::default();
    session.hyperlinks.clear();
    session.current_hyperlink = 0;
    session.pending_hyperlinks.clear();
    session.pending_protected.clear();
    session.protected_pen = false;
    session.cursor_shape = 0;
    session.title.clear();
    session.sgr_stack.clear();
    session.sixel.reset();
    session.kitty.reset();
    session.softfont.reset();
    session.udk.clear();
    session.udk_locked = false;
    session.gateway_settings = Default::default();
}

fn soft_reset(session: &mut Session) {
    session.modes.soft_reset();
    session.cursor.attrs = Default::default();
    let rows = session.rows;
    session.cursor.reset_scroll_region(rows);
    let cols = session.cols;
    session.cursor.reset_left_right_margin(cols);
    session.cursor.pending_wrap = false;
    session.cursor.reset_charset();
    session.protected_pen = false;
    session.sgr_stack.clear();
    session.sixel.reset();
    session.kitty.reset();
    session.softfont.reset();
}

// ── Rectangular operations ──────────────────────────────────────────

/// `DECFRA`: `Pc;Ptop;Pleft;Pbottom;Pright`. Absolute coordinates are
/// frozen here (at enqueue time) via [`translate`] so a later `DECOM`
/// toggle can't retroactively move an already-queued rectangle.
fn dispatch_fill_rect(session: &mut Session, params: &[u16]) {
    if !session.level.supports_rectangular_ops() {
        return;
    }
    let [ch_code, top, left, bottom, right] = take5(params) else { return };
    let Some(ch) = char::from_u32(ch_code as u32) else { return };
    let (top, left, bottom, right) = rect_params(session, top, left, bottom, right);
    let attrs = session.cursor.attrs;
    session.ops.enqueue(Operation::FillRect { top, left, bottom, right, ch, attrs });
}

/// `DECCRA`: `Ptop;Pleft;Pbottom;Pright;Psrc;Pdtop;Pdleft[;Pddst]`. This
/// core only supports same-terminal source/destination (`Psrc` naming a
/// different session is accepted but treated as the current session).
fn dispatch_copy_rect(session: &mut Session, params: &[u16]) {
    if !session.level.supports_rectangular_ops() {
        return;
    }
    if params.len() < 6 {
        return;
    }
    let (top, left, bottom, right) = rect_params(session, params[0], params[1], params[2], params[3]);
    let dst_left_param = params.get(6).copied().unwrap_or(1);
    let (dst_row, dst_col) = translate(session, params[5].saturating_sub(1), dst_left_param.saturating_sub(1));
    session.ops.enqueue(Operation::CopyRect { top, left, bottom, right, dst_row, dst_col });
}

/// `DECCARA`/`DECRARA`: `Ptop;Pleft;Pbottom;Pright;Ps...`, where the
/// trailing `Ps` list is SGR-style attribute codes (1/4/5/7/8 and their
/// `2x` reset forms) rather than a single value.
fn dispatch_change_attr_rect(session: &mut Session, params: &[u16], reverse: bool) {
    if !session.level.supports_rectangular_ops() || params.len() < 4 {
        return;
    }
    let (top, left, bottom, right) = rect_params(session, params[0], params[1], params[2], params[3]);
    let flags = sgr_codes_to_flags(&params[4..]);
    if reverse {
        session.ops.enqueue(Operation::ReverseAttrRect { top, left, bottom, right, flags });
    } else {
        session.ops.enqueue(Operation::SetAttrRect { top, left, bottom, right, flags });
    }
}

/// `DECERA`: `Ptop;Pleft;Pbottom;Pright` — unlike `DECSERA` this erases
/// every cell in the rectangle regardless of the protected attribute.
fn dispatch_erase_rect_area(session: &mut Session, params: &[u16]) {
    if !session.level.supports_rectangular_ops() || params.len() < 4 {
        return;
    }
    let (top, left, bottom, right) = rect_params(session, params[0], params[1], params[2], params[3]);
    let bg = session.cursor.attrs.bg;
    session.ops.enqueue(Operation::EraseRect { top, left, bottom, right, bg });
}

/// `DECSERA`: `Ptop;Pleft;Pbottom;Pright` — always protected-cell aware.
fn dispatch_selective_erase_rect(session: &mut Session, params: &[u16]) {
    if params.len() < 4 {
        return;
    }
    let (top, left, bottom, right) = rect_params(session, params[0], params[1], params[2], params[3]);
    let bg = session.cursor.attrs.bg;
    session.ops.enqueue(Operation::EraseRectSelective { top, left, bottom, right, bg });
}

/// `DECRQCRA`: `Pid;Pg;Ptop;Pleft;Pbottom;Pright` — reply with a 16-bit
/// checksum of cell content over the rectangle as
/// `DCS Pid ! ~ hhhh ST`.
fn dispatch_checksum_rect(session: &mut Session, params: &[u16]) {
    if params.len() < 6 {
        return;
    }
    let id = params[0];
    let (top, left, bottom, right) = rect_params(session, params[2], params[3], params[4], params[5]);
    let mut checksum: u32 = 0;
    for row in top..bottom {
        if let Some(cells) = session.grid.row_cells(row) {
            let right = (right as usize).min(cells.len());
            let left = (left as usize).min(right);
            for cell in &cells[left..right] {
                checksum = checksum.wrapping_add(cell.content() as u32);
            }
        }
    }
    let checksum = (checksum & 0xffff) as u16;
    session.response.write_str(&format!("\x1bP{id}!~{checksum:04x}\x1b\\"));
}

/// Convert a raw 1-based `top;left;bottom;right` parameter group into
/// absolute, exclusive-bound, 0-based grid coordinates, applying the
/// DECOM origin-mode offset exactly once.
fn rect_params(session: &Session, top: u16, left: u16, bottom: u16, right: u16) -> (u16, u16, u16, u16) {
    let (cols, rows) = (session.grid.cols(), session.grid.rows());
    let (abs_top, abs_left) = translate(session, top.saturating_sub(1), left.saturating_sub(1));
    let bottom = if bottom == 0 { rows } else { bottom.min(rows) };
    let right = if right == 0 { cols } else { right.min(cols) };
    (abs_top, abs_left, bottom, right)
}

fn take5(params: &[u16]) -> Option<[u16; 5]> {
    if params.len() < 5 {
        return None;
    }
    Some([params[0], params[1], params[2], params[3], params[4]])
}

fn sgr_codes_to_flags(codes: &[u16]) -> SgrFlags {
    let mut flags = SgrFlags::empty();
    for &code in codes {
        let bit = match code {
            1 | 21 => SgrFlags::BOLD,
            4 | 24 => SgrFlags::UNDERLINE,
            5 | 25 => SgrFlags::BLINK,
            7 | 27 => SgrFlags::INVERSE,
            8 | 28 => SgrFlags::HIDDEN,
            _ => continue,
        };
        flags.insert(bit);
    }
    flags
}

// ── DCS/OSC/APC/PM/SOS string payload routing ───────────────────────

fn dispatch_string_payload(session: &mut Session, payload: StringPayload) -> DispatchOutcome {
    match payload.kind {
        StringKind::Dcs => return dispatch_dcs(session, &payload),
        StringKind::Osc => dispatch_osc(session, &payload.body),
        StringKind::Apc => {
            if session.level.supports_graphics() {
                session.kitty.feed(&payload.body);
            }
        }
        StringKind::Pm | StringKind::Sos => {}
    }
    DispatchOutcome::default()
}

fn dispatch_dcs(session: &mut Session, payload: &StringPayload) -> DispatchOutcome {
    if payload.prefix.is_empty() && payload.body.starts_with(b"GATE;") {
        return dispatch_gateway(session, &payload.body);
    }
    if payload.prefix.last() == Some(&b'|') {
        load_udk(session, &payload.prefix, &payload.body);
        return DispatchOutcome::default();
    }
    if !session.level.supports_graphics() {
        return DispatchOutcome::default();
    }
    match payload.prefix.last() {
        Some(b'q') => session.sixel.feed(&payload.body),
        Some(b'{') => {
            let params = crate::graphics::softfont::SoftFontState::parse_prefix(&payload.prefix);
            session.softfont.begin(params);
            session.softfont.feed(&payload.body);
        }
        _ => {}
    }
    DispatchOutcome::default()
}

/// `DECUDK`: `DCS Pclear ; Plock | Dk1 / hex1 ; Dk2 / hex2 ; ... ST`.
/// `Pclear` (0, default) clears every key before loading, `1` only clears
/// the keys this sequence redefines; `Plock` (1) locks the keyboard against
/// further redefinition until a `Pclear == 0` load runs.
fn load_udk(session: &mut Session, prefix: &[u8], body: &[u8]) {
    if session.udk_locked {
        return;
    }
    let param_text = String::from_utf8_lossy(&prefix[..prefix.len() - 1]);
    let mut params = param_text.split(';').map(|p| p.parse::<u16>().unwrap_or(0));
    let clear_mode = params.next().unwrap_or(0);
    let lock = params.next().unwrap_or(0);

    if clear_mode == 0 {
        session.udk.clear();
    }
    for entry in body.split(|&b| b == b';') {
        let Some(slash) = entry.iter().position(|&b| b == b'/') else { continue };
        let (key_bytes, rest) = entry.split_at(slash);
        let hex = &rest[1..];
        let Ok(key) = String::from_utf8_lossy(key_bytes).parse::<u16>() else { continue };
        let mut decoded = Vec::with_capacity(hex.len() / 2);
        let mut chunks = hex.chunks_exact(2);
        for pair in &mut chunks {
            let Ok(s) = std::str::from_utf8(pair) else { continue };
            let Ok(byte) = u8::from_str_radix(s, 16) else { continue };
            decoded.push(byte);
        }
        session.udk.insert(key, decoded);
    }
    session.udk_locked = lock == 1;
}

/// `DECRQPKU` reply for one programmable key: `DCS Key;Locked;body ST`,
/// `body` hex-encoded exactly as a `DECUDK` load would send it.
#[must_use]
pub fn request_pku_reply(session: &Session, key: u16) -> Vec<u8> {
    let body = session.udk.get(&key).map(|bytes| {
        bytes.iter().map(|b| format!("{b:02X}")).collect::<String>()
    }).unwrap_or_default();
    let locked = if session.udk_locked { 1 } else { 0 };
    let mut out = vec![0x1b, b'P'];
    out.extend_from_slice(format!("{key};{locked};{body}").as_bytes());
    out.push(0x1b);
    out.push(b'\\');
    out
}

fn dispatch_gateway(session: &mut Session, body: &[u8]) -> DispatchOutcome {
    let cmd = match GatewayCommand::parse(body) {
        Ok(cmd) => cmd,
        Err(_) => return DispatchOutcome::default(),
    };
    if !cmd.is_reserved_class() {
        return DispatchOutcome::gateway(GatewayOutcome::Delegated(cmd));
    }
    use crate::gateway::GatewayVerb;
    let mut resized = None;
    match cmd.verb {
        GatewayVerb::Set => resized = apply_gateway_set_bundle(session, &cmd.params),
        GatewayVerb::Get => {
            if let Some(key) = cmd.params.first() {
                if key == "PKU" {
                    let udk_key = cmd.params.get(1).and_then(|p| p.parse::<u16>().ok()).unwrap_or(0);
                    session.response.write(&request_pku_reply(session, udk_key));
                } else {
                    let value = gateway_get(session, key);
                    let reply = crate::gateway::report_reply(cmd.id, key, &value);
                    session.response.write(&reply);
                }
            }
        }
        GatewayVerb::Pipe => {
            if let Some(kind) = cmd.params.first() {
                match kind.as_str() {
                    "VT" => {
                        if let Some(payload) = &cmd.pipe_payload {
                            let decoded = decode_pipe_payload(cmd.params.get(1).map(String::as_str), payload);
                            let actions = session.parser.feed(&decoded);
                            for action in actions {
                                dispatch(action, session);
                            }
                        }
                    }
                    "BANNER" => {
                        // Rendering a banner is an outer-shell concern; the
                        // payload is delegated rather than interpreted here.
                        return DispatchOutcome::gateway(GatewayOutcome::Delegated(cmd));
                    }
                    _ => {}
                }
            }
        }
        GatewayVerb::Init => {
            // Sub-protocols (Sixel/Kitty/soft font) attach lazily on first
            // DCS byte; INIT has nothing to eagerly allocate.
        }
        GatewayVerb::Reset => apply_gateway_reset(session, &cmd.params),
        GatewayVerb::Unknown(ref verb) => {
            #[cfg(feature = "tracing")]
            warn!(verb = %verb, id = cmd.id, "Unknown Gateway Command");
            #[cfg(not(feature = "tracing"))]
            let _ = verb;
        }
    }
    DispatchOutcome { resized, ..DispatchOutcome::default() }
}

/// `PIPE;VT;B64|...` / `PIPE;VT;HEX|...` / `PIPE;VT;RAW|...` — decode the
/// payload captured after the lexer's `|` token before feeding it to the
/// target session's parser.
fn decode_pipe_payload(encoding: Option<&str>, payload: &[u8]) -> Vec<u8> {
    match encoding {
        Some("B64") => {
            use base64::Engine;
            base64::engine::general_purpose::STANDARD.decode(payload).unwrap_or_default()
        }
        Some("HEX") => payload
            .chunks_exact(2)
            .filter_map(|pair| std::str::from_utf8(pair).ok().and_then(|s| u8::from_str_radix(s, 16).ok()))
            .collect(),
        _ => payload.to_vec(),
    }
}

/// `SET;Kind;...` — `Kind` selects which bundle the remaining params feed.
fn apply_gateway_set_bundle(session: &mut Session, params: &[String]) -> Option<(u16, u16)> {
    let mut it = params.iter();
    let kind = it.next()?;
    let rest: Vec<&String> = it.collect();
    match kind.as_str() {
        "LEVEL" => {
            if let Some(level_param) = rest.first().and_then(|p| p.parse::<u16>().ok()) {
                apply_gateway_level(session, level_param);
            }
        }
        "SESSION" => set_session_route(&mut session.gateway.target_session, &rest),
        "REGIS_SESSION" => set_session_route(&mut session.gateway.regis_session, &rest),
        "TEKTRONIX_SESSION" => set_session_route(&mut session.gateway.tektronix_session, &rest),
        "KITTY_SESSION" => set_session_route(&mut session.gateway.kitty_session, &rest),
        "SIXEL_SESSION" => set_session_route(&mut session.gateway.sixel_session, &rest),
        "ATTR" => {
            for kv in rest.iter().copied() {
                if let Some((key, value)) = GatewayCommand::param_kv(kv) {
                    apply_attr_bundle_key(session, key, value);
                }
            }
        }
        "GRID" => apply_grid_bundle(session, &rest),
        "CONCEAL" => {
            session.gateway_settings.conceal_codepoint = rest.first().and_then(|p| p.parse::<u32>().ok());
        }
        "BLINK" => {
            for kv in rest.iter().copied() {
                if let Some((key, value)) = GatewayCommand::param_kv(kv) {
                    let ms = value.parse::<u32>().unwrap_or(0);
                    match key {
                        "FAST" => session.gateway_settings.blink.fast_ms = ms,
                        "SLOW" => session.gateway_settings.blink.slow_ms = ms,
                        "BG" => session.gateway_settings.blink.bg_ms = ms,
                        _ => {}
                    }
                }
            }
        }
        "KEYBOARD" => {
            for kv in rest.iter().copied() {
                if let Some((key, value)) = GatewayCommand::param_kv(kv) {
                    match key {
                        "REPEAT" => {
                            session.gateway_settings.keyboard.repeat = match value {
                                "SOFTWARE" => crate::gateway::KeyRepeatSource::Software,
                                _ => crate::gateway::KeyRepeatSource::Host,
                            };
                        }
                        "REPEAT_RATE" => {
                            session.gateway_settings.keyboard.repeat_rate_ms = value.parse().unwrap_or(30)
                        }
                        "DELAY" => session.gateway_settings.keyboard.delay_ms = value.parse().unwrap_or(400),
                        _ => {}
                    }
                }
            }
        }
        "FONT" => session.font = rest.first().map(|s| s.to_string()),
        "TITLE" => session.title = rest.first().map(|s| s.to_string()).unwrap_or_default(),
        "DEBUG" => {
            session.gateway_debug = rest.first().and_then(|s| crate::gateway::parse_bool(s)).unwrap_or(false)
        }
        "OUTPUT" => session.gateway_output = rest.first().map(|s| s.to_string()).unwrap_or_default(),
        "WIDTH" => {
            if let Some(cols) = rest.first().and_then(|p| p.parse::<u16>().ok()) {
                let rows = session.rows;
                if session.resize(cols, rows).is_ok() {
                    return Some((cols, rows));
                }
            }
        }
        "HEIGHT" => {
            if let Some(rows) = rest.first().and_then(|p| p.parse::<u16>().ok()) {
                let cols = session.cols;
                if session.resize(cols, rows).is_ok() {
                    return Some((cols, rows));
                }
            }
        }
        "SIZE" => {
            let cols = rest.first().and_then(|p| p.parse::<u16>().ok());
            let rows = rest.get(1).and_then(|p| p.parse::<u16>().ok());
            if let (Some(cols), Some(rows)) = (cols, rows) {
                if session.resize(cols, rows).is_ok() {
                    return Some((cols, rows));
                }
            }
        }
        _ => {}
    }
    None
}

fn set_session_route(slot: &mut i32, rest: &[&String]) {
    if let Some(n) = rest.first().and_then(|p| p.parse::<i32>().ok()) {
        *slot = n;
    }
}

fn apply_attr_bundle_key(session: &mut Session, key: &str, value: &str) {
    let attrs = &mut session.cursor.attrs;
    let on = crate::gateway::parse_bool(value).unwrap_or(false);
    match key {
        "BOLD" => attrs.flags.set(SgrFlags::BOLD, on),
        "DIM" => attrs.flags.set(SgrFlags::DIM, on),
        "ITALIC" => attrs.flags.set(SgrFlags::ITALIC, on),
        "UNDERLINE" => attrs.flags.set(SgrFlags::UNDERLINE, on),
        "BLINK" => attrs.flags.set(SgrFlags::BLINK, on),
        "REVERSE" => attrs.flags.set(SgrFlags::INVERSE, on),
        "HIDDEN" => attrs.flags.set(SgrFlags::HIDDEN, on),
        "STRIKE" => attrs.flags.set(SgrFlags::STRIKETHROUGH, on),
        "FG" => attrs.fg = parse_gateway_color(value).unwrap_or(attrs.fg),
        "BG" => attrs.bg = parse_gateway_color(value).unwrap_or(attrs.bg),
        "UL" => attrs.underline_color = parse_gateway_color(value),
        "ST" => attrs.strike_color = parse_gateway_color(value),
        _ => {}
    }
}

/// Accepts a bare palette index (`"5"`) or `R,G,B` (`"255,0,0"`).
fn parse_gateway_color(value: &str) -> Option<Color> {
    if let Some((r, rest)) = value.split_once(',') {
        let (g, b) = rest.split_once(',')?;
        return Some(Color::Rgb(r.parse().ok()?, g.parse().ok()?, b.parse().ok()?));
    }
    value.parse::<u8>().ok().map(Color::Indexed)
}

fn apply_grid_bundle(session: &mut Session, rest: &[&String]) {
    let overlay = &mut session.gateway_settings.grid_overlay;
    if let Some(state) = rest.first() {
        overlay.enabled = crate::gateway::parse_bool(state).unwrap_or(overlay.enabled);
    }
    for kv in rest.iter().skip(1).copied() {
        if let Some((key, value)) = GatewayCommand::param_kv(kv) {
            let v = value.parse::<u8>().unwrap_or(0);
            match key {
                "R" => overlay.r = v,
                "G" => overlay.g = v,
                "B" => overlay.b = v,
                "A" => overlay.a = v,
                _ => {}
            }
        }
    }
}

/// `RESET;Kind[;Params]` — `RESET` with no params resets Gateway routing;
/// the structured sub-forms reset one field group.
fn apply_gateway_reset(session: &mut Session, params: &[String]) {
    match params.first().map(String::as_str) {
        None => session.gateway.reset(),
        Some("ATTR") => session.cursor.attrs = Default::default(),
        Some("BLINK") => session.gateway_settings.blink = Default::default(),
        Some("TABS") => {
            if params.get(1).map(String::as_str) == Some("DEFAULT8") {
                session.cursor.reset_default_tabs();
            } else {
                session.cursor.clear_all_tab_stops();
            }
        }
        Some(_) => {}
    }
}

fn apply_gateway_level(session: &mut Session, level_param: u16) {
    let level = match level_param {
        52 => crate::conformance::ConformanceLevel::Vt52,
        100 => crate::conformance::ConformanceLevel::Vt100,
        220 => crate::conformance::ConformanceLevel::Vt220,
        320 => crate::conformance::ConformanceLevel::Vt320,
        420 => crate::conformance::ConformanceLevel::Vt420,
        510 => crate::conformance::ConformanceLevel::Vt510,
        525 => crate::conformance::ConformanceLevel::Vt525,
        _ => return,
    };
    session.level = level;
}

fn gateway_get(session: &Session, key: &str) -> String {
    match key {
        "LEVEL" => format!("{:?}", session.level),
        "TITLE" => session.title.clone(),
        "COLS" => session.cols.to_string(),
        "ROWS" => session.rows.to_string(),
        "VERSION" => env!("CARGO_PKG_VERSION").to_string(),
        "OUTPUT" => session.gateway_output.clone(),
        "FONTS" => session.font.clone().unwrap_or_default(),
        "UNDERLINE_COLOR" => color_to_gateway_string(session.cursor.attrs.underline_color),
        "STRIKE_COLOR" => color_to_gateway_string(session.cursor.attrs.strike_color),
        _ => String::new(),
    }
}

fn color_to_gateway_string(color: Option<Color>) -> String {
    match color {
        Some(Color::Rgb(r, g, b)) => format!("{r},{g},{b}"),
        Some(Color::Indexed(n)) | Some(Color::Named(n)) => n.to_string(),
        Some(Color::Default) | None => String::new(),
    }
}

fn dispatch_osc(session: &mut Session, body: &[u8]) {
    let text = String::from_utf8_lossy(body);
    let mut parts = text.splitn(2, ';');
    let Some(ps) = parts.next() else { return };
    let rest = parts.next().unwrap_or("");
    match ps {
        "0" | "2" => session.title = rest.to_string(),
        "1" => session.icon_title = rest.to_string(),
        "8" => dispatch_hyperlink(session, rest),
        _ => {}
    }
}

/// `OSC 8 ; params ; uri ST` — an empty `uri` closes the currently open
/// hyperlink span.
fn dispatch_hyperlink(session: &mut Session, rest: &str) {
    let mut fields = rest.splitn(2, ';');
    let _params = fields.next().unwrap_or("");
    let uri = fields.next().unwrap_or("");

    if session.current_hyperlink != 0 {
        session.hyperlinks.release_id(session.current_hyperlink);
    }
    session.current_hyperlink = if uri.is_empty() { 0 } else { session.hyperlinks.acquire(uri) };
}

fn dispatch_unsupported(session: &mut Session, seq: &[u8]) {
    // DECALN (`ESC # 8`) has no dedicated `Action`; every other
    // unrecognized sequence is dropped (matches xterm's handling of
    // control sequences it doesn't implement).
    if seq == [0x1b, b'#', b'8'] {
        session.grid.fill_all('E');
        let (rows, cols) = (session.rows, session.cols);
        session.cursor.move_to(0, 0, rows, cols);
        session.tracker.mark_rect(0, 0, rows, cols);
    }
}

