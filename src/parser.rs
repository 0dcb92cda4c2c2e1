//! VT/ANSI/VT52 byte-level state machine.
//!
//! A Paul Flo Williams-style escape-sequence state machine (the same shape
//! this module started from), extended with the full state list needed to
//! cover VT52 parallel mode, DCS/OSC/APC/PM/SOS string collection terminated
//! by ST, Sixel/DCS passthrough, and per-G-set charset designation, an
//! inline UTF-8 decoder with U+FFFD recovery, and CAN/SUB cancellation.
//!
//! The parser never touches the grid or cursor directly — it only produces
//! [`Action`]s. Turning those into grid mutations is `dispatch`'s job.

use crate::cell::SgrParam;
use crate::charset::{Charset, GraphicSlot};

#[cfg(feature = "tracing")]
use tracing::debug;

/// Maximum CSI/DCS parameters collected before overflow silently drops the
/// rest (bounded at a generous size; overflow is tolerated, not fatal).
const MAX_PARAMS: usize = 32;

/// Byte cap on OSC/DCS/APC/PM/SOS string collection before the rest of the
/// string is discarded (still consumed through ST, just not retained).
const MAX_STRING_LEN: usize = 1 << 20;

/// A DCS/OSC/APC/PM/SOS string payload handed up verbatim for the
/// dispatcher to interpret (Gateway, Sixel, Kitty, DECDLD, OSC number
/// dispatch, DECRQSS, …).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StringPayload {
    pub kind: StringKind,
    /// Parameters/intermediates/final byte collected before the first
    /// payload byte (DCS only; e.g. `1000q` for Sixel, `0;1{` for DECDLD).
    /// Always empty for OSC/APC/PM/SOS, whose "prefix" is just data.
    pub prefix: Vec<u8>,
    pub body: Vec<u8>,
    /// Set when the string was truncated at [`MAX_STRING_LEN`] and the
    /// remainder was discarded rather than collected.
    pub truncated: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StringKind {
    Dcs,
    Osc,
    Apc,
    Pm,
    Sos,
}

/// Parser output: one token per completed control, printable scalar, or
/// string. `feed`/`advance` never panics on any input.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Print(char),
    Newline,
    CarriageReturn,
    Tab,
    Backspace,
    Bell,

    CursorUp(u16),
    CursorDown(u16),
    CursorRight(u16),
    CursorLeft(u16),
    CursorNextLine(u16),
    CursorPrevLine(u16),
    CursorRow(u16),
    CursorColumn(u16),
    CursorPosition { row: u16, col: u16 },
    SetScrollRegion { top: u16, bottom: u16 },
    SetLeftRightMargin { left: u16, right: u16 },

    ScrollUp(u16),
    ScrollDown(u16),
    InsertLines(u16),
    DeleteLines(u16),
    InsertChars(u16),
    DeleteChars(u16),
    EraseChars(u16),

    EraseInDisplay(u16),
    EraseInLine(u16),
    SelectiveEraseInDisplay(u16),
    SelectiveEraseInLine(u16),
    RepeatChar(u16),

    Sgr(Vec<SgrParam>),
    /// `XTPUSHSGR`/`XTPOPSGR` (`CSI # {` / `CSI # }`): save/restore the
    /// current SGR rendition on a bounded per-session stack. `Ps` params
    /// select which aspects to save; an empty list saves everything.
    PushSgr(Vec<u16>),
    PopSgr,
    DecSet(Vec<u16>),
    DecRst(Vec<u16>),
    AnsiSet(Vec<u16>),
    AnsiRst(Vec<u16>),
    RequestMode { param: u16, private: bool },

    SaveCursor,
    RestoreCursor,
    Index,
    ReverseIndex,
    NextLine,
    FullReset,
    SoftReset,

    SetTabStop,
    ClearTabStop(u16),
    ForwardTab(u16),
    BackTab(u16),

    ApplicationKeypad,
    NormalKeypad,
    SetCursorShape(u16),

    DesignateCharset { slot: GraphicSlot, charset: Charset },
    SingleShift2,
    SingleShift3,
    ShiftIn,
    ShiftOut,

    FocusIn,
    FocusOut,
    PasteStart,
    PasteEnd,
    MouseEvent { params: Vec<u16>, final_byte: u8 },

    DeviceAttributes,
    DeviceAttributesSecondary,
    DeviceAttributesTertiary,
    DeviceStatusReport { param: u16, private: bool },

    /// Rectangular area ops (DECFRA/DECCRA/DECCARA/DECRARA/DECSERA/DECRQCRA),
    /// still carrying raw 1-based parameters; `dispatch` performs the
    /// DECOM/DECLRMM coordinate transform at enqueue time.
    FillRectArea(Vec<u16>),
    CopyRectArea(Vec<u16>),
    ChangeAttrRect { params: Vec<u16>, reverse: bool },
    EraseRectArea(Vec<u16>),
    SelectiveEraseRect(Vec<u16>),
    RequestChecksumRect(Vec<u16>),
    SetProtection(u16),

    /// A DCS/OSC/APC/PM/SOS string, collected verbatim and handed to the
    /// dispatcher (which routes Gateway/Sixel/Kitty/DECDLD/OSC-number/
    /// DECRQSS payloads by prefix).
    StringPayload(StringPayload),

    /// VT52-mode equivalents of the handful of ANSI actions it supports.
    Vt52CursorPosition { row: u16, col: u16 },
    Vt52Identify,
    EnterVt52,
    ExitVt52,

    /// A recognized-but-unimplemented escape/CSI form, captured verbatim so
    /// the dispatcher can log an observability event without the parser
    /// needing to know about logging.
    Unsupported(Vec<u8>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Ground,
    Escape,
    EscapeIntermediate,
    CsiEntry,
    CsiParam,
    CsiIntermediate,
    CsiIgnore,
    DcsEntry,
    DcsParam,
    DcsIntermediate,
    DcsPassthrough,
    DcsIgnore,
    OscString,
    ApcString,
    PmString,
    SosString,
    /// Consuming bytes until `ESC \` / `0x9C` after a string whose final
    /// `ESC` byte has already been seen.
    StWait,
    Vt52,
    Vt52Y { row: Option<u8> },
    CharsetDesignate(GraphicSlot),
}

/// A collected CSI/DCS parameter list plus intermediates and the private
/// marker (`?`, `>`, `=`, `<`), shared by the CSI and DCS entry paths.
#[derive(Debug, Clone, Default)]
struct ParamCollector {
    params: Vec<SgrParam>,
    current: u32,
    current_has_digits: bool,
    intermediates: Vec<u8>,
    private_marker: Option<u8>,
}

impl ParamCollector {
    fn clear(&mut self) {
        self.params.clear();
        self.current = 0;
        self.current_has_digits = false;
        self.intermediates.clear();
        self.private_marker = None;
    }

    fn push_digit(&mut self, d: u8) {
        self.current_has_digits = true;
        self.current = self.current.saturating_mul(10).saturating_add(u32::from(d));
    }

    /// `:` inside a parameter group: attach as a subparam of the group's
    /// leading value (ITU colon form of SGR 38/48/58, or `4:3` underline
    /// style).
    fn end_subparam(&mut self) {
        let value = self.current.min(u32::from(u16::MAX)) as u16;
        if self.params.len() >= MAX_PARAMS {
            self.current = 0;
            self.current_has_digits = false;
            return;
        }
        if self.params.is_empty() {
            self.params.push(SgrParam::plain(0));
        }
        self.params.last_mut().expect("just ensured non-empty").sub.push(value);
        self.current = 0;
        self.current_has_digits = false;
    }

    fn end_param(&mut self) {
        if self.params.len() < MAX_PARAMS {
            let value = if self.current_has_digits { self.current.min(u32::from(u16::MAX)) as u16 } else { 0 };
            self.params.push(SgrParam::plain(value));
        }
        self.current = 0;
        self.current_has_digits = false;
    }

    fn finish(&mut self) -> Vec<SgrParam> {
        self.end_param();
        std::mem::take(&mut self.params)
    }

    fn values(&mut self) -> Vec<u16> {
        self.finish().into_iter().map(|p| p.value).collect()
    }

    /// The 1-based value at `index`, or `default` if absent or explicitly 0
    /// (ECMA-48: an omitted or zero numeric parameter means "use default").
    fn value_or(&mut self, index: usize, default: u16) -> u16 {
        let values = self.values();
        values.get(index).copied().filter(|&v| v != 0).unwrap_or(default)
    }
}

/// The VT/ANSI/VT52 state machine. One parser instance per session.
#[derive(Debug, Clone)]
pub struct Parser {
    state: State,
    collector: ParamCollector,
    string_kind: Option<StringKind>,
    string_prefix: Vec<u8>,
    string_body: Vec<u8>,
    string_truncated: bool,
    utf8_pending: Vec<u8>,
    utf8_expected: usize,
    /// Mirrors DECANM so `ESC` can be routed to either the VT52 command
    /// table or the CSI/ESC-intermediate machinery. Kept in sync by
    /// [`Self::set_vt52`], which `dispatch` calls whenever DECANM changes.
    vt52_active: bool,
}

impl Default for Parser {
    fn default() -> Self {
        Self::new()
    }
}

impl Parser {
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: State::Ground,
            collector: ParamCollector::default(),
            string_kind: None,
            string_prefix: Vec::new(),
            string_body: Vec::new(),
            string_truncated: false,
            utf8_pending: Vec::new(),
            utf8_expected: 0,
            vt52_active: false,
        }
    }

    #[must_use]
    pub fn is_vt52(&self) -> bool {
        self.vt52_active
    }

    /// Enter or leave VT52 mode (driven by DECANM, `dispatch`'s job to
    /// track). Switching does not itself reset the current state — only a
    /// subsequent `ESC` is interpreted differently.
    pub fn set_vt52(&mut self, active: bool) {
        self.vt52_active = active;
    }

    #[must_use]
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<Action> {
        let mut out = Vec::new();
        for &b in bytes {
            if let Some(action) = self.advance(b) {
                out.push(action);
            }
        }
        out
    }

    /// Advance the parser by one byte. `CAN`/`SUB` abort any in-progress
    /// sequence unconditionally; that byte consumes no further input and
    /// produces no token (VT100 behavior).
    pub fn advance(&mut self, b: u8) -> Option<Action> {
        if matches!(b, 0x18 | 0x1A) && !matches!(self.state, State::Ground) {
            self.state = State::Ground;
            self.clear_string();
            return None;
        }

        match self.state {
            State::Ground => self.advance_ground(b),
            State::Escape => self.advance_escape(b),
            State::EscapeIntermediate => self.advance_escape_intermediate(b),
            State::CsiEntry | State::CsiParam => self.advance_csi_param(b),
            State::CsiIntermediate => self.advance_csi_intermediate(b),
            State::CsiIgnore => self.advance_csi_ignore(b),
            State::DcsEntry | State::DcsParam => self.advance_dcs_param(b),
            State::DcsIntermediate => self.advance_dcs_intermediate(b),
            State::DcsPassthrough => self.advance_dcs_passthrough(b),
            State::DcsIgnore => self.advance_dcs_ignore(b),
            State::OscString | State::ApcString | State::PmString | State::SosString => {
                self.advance_string(b)
            }
            State::StWait => self.advance_st_wait(b),
            State::Vt52 => self.advance_vt52(b),
            State::Vt52Y { row } => self.advance_vt52_y(b, row),
            State::CharsetDesignate(slot) => self.advance_charset_designate(b, slot),
        }
    }

    // ── Ground ──────────────────────────────────────────────────────

    fn advance_ground(&mut self, b: u8) -> Option<Action> {
        match b {
            0x00 | 0x7F => None,
            0x07 => Some(Action::Bell),
            0x08 => Some(Action::Backspace),
            0x09 => Some(Action::Tab),
            0x0A | 0x0B | 0x0C => Some(Action::Newline),
            0x0D => Some(Action::CarriageReturn),
            0x0E => Some(Action::ShiftOut),
            0x0F => Some(Action::ShiftIn),
            0x1B => {
                self.state = if self.vt52_active { State::Vt52 } else { State::Escape };
                None
            }
            // C1 controls in their 8-bit form.
            0x84 => Some(Action::Index),
            0x85 => Some(Action::NextLine),
            0x88 => Some(Action::SetTabStop),
            0x8D => Some(Action::ReverseIndex),
            0x8E => Some(Action::SingleShift2),
            0x8F => Some(Action::SingleShift3),
            0x90 => self.start_string(StringKind::Dcs),
            0x98 => self.start_string(StringKind::Sos),
            0x9B => {
                self.state = State::CsiEntry;
                self.collector.clear();
                None
            }
            0x9C => None,
            0x9D => self.start_string(StringKind::Osc),
            0x9E => self.start_string(StringKind::Pm),
            0x9F => self.start_string(StringKind::Apc),
            0x01..=0x1F => None,
            _ => self.decode_utf8_byte(b),
        }
    }

    fn start_string(&mut self, kind: StringKind) -> Option<Action> {
        self.string_kind = Some(kind);
        self.string_prefix.clear();
        self.string_body.clear();
        self.string_truncated = false;
        self.collector.clear();
        self.state = match kind {
            StringKind::Dcs => State::DcsEntry,
            StringKind::Osc => State::OscString,
            StringKind::Apc => State::ApcString,
            StringKind::Pm => State::PmString,
            StringKind::Sos => State::SosString,
        };
        None
    }

    fn clear_string(&mut self) {
        self.string_kind = None;
        self.string_prefix.clear();
        self.string_body.clear();
        self.string_truncated = false;
    }

    /// Decode one byte of a UTF-8 sequence in GROUND, emitting `Print` once
    /// a scalar (or a replacement for a malformed sequence) is available.
    fn decode_utf8_byte(&mut self, b: u8) -> Option<Action> {
        if self.utf8_expected == 0 {
            if b < 0x80 {
                return Some(Action::Print(b as char));
            }
            let expected = if b & 0xE0 == 0xC0 {
                1
            } else if b & 0xF0 == 0xE0 {
                2
            } else if b & 0xF8 == 0xF0 {
                3
            } else {
                #[cfg(feature = "tracing")]
                debug!(byte = b, "invalid UTF-8 leading byte, substituting replacement character");
                return Some(Action::Print('\u{FFFD}'));
            };
            self.utf8_expected = expected;
            self.utf8_pending.clear();
            self.utf8_pending.push(b);
            None
        } else if b & 0xC0 == 0x80 {
            self.utf8_pending.push(b);
            if self.utf8_pending.len() == self.utf8_expected + 1 {
                self.utf8_expected = 0;
                let bytes = std::mem::take(&mut self.utf8_pending);
                Some(match std::str::from_utf8(&bytes).ok().and_then(|s| s.chars().next()) {
                    Some(ch) => Action::Print(ch),
                    None => {
                        #[cfg(feature = "tracing")]
                        debug!(?bytes, "malformed UTF-8 sequence, substituting replacement character");
                        Action::Print('\u{FFFD}')
                    }
                })
            } else {
                None
            }
        } else {
            // Expected a continuation byte, didn't get one: the pending
            // sequence was malformed; reprocess `b` fresh.
            #[cfg(feature = "tracing")]
            debug!(byte = b, "expected UTF-8 continuation byte, got none; resyncing");
            self.utf8_pending.clear();
            self.utf8_expected = 0;
            Some(self.decode_utf8_byte(b).unwrap_or(Action::Print('\u{FFFD}')))
        }
    }

    // ── Escape ──────────────────────────────────────────────────────

    fn advance_escape(&mut self, b: u8) -> Option<Action> {
        match b {
            b'[' => {
                self.state = State::CsiEntry;
                self.collector.clear();
                None
            }
            b'P' => self.start_string(StringKind::Dcs),
            b']' => self.start_string(StringKind::Osc),
            b'X' => self.start_string(StringKind::Sos),
            b'^' => self.start_string(StringKind::Pm),
            b'_' => self.start_string(StringKind::Apc),
            b'(' | b')' | b'*' | b'+' => {
                let slot = GraphicSlot::from_intermediate(b).expect("matched above");
                self.state = State::CharsetDesignate(slot);
                None
            }
            0x20..=0x2F => {
                self.collector.intermediates.push(b);
                self.state = State::EscapeIntermediate;
                None
            }
            b'D' => {
                self.state = State::Ground;
                Some(Action::Index)
            }
            b'E' => {
                self.state = State::Ground;
                Some(Action::NextLine)
            }
            b'H' => {
                self.state = State::Ground;
                Some(Action::SetTabStop)
            }
            b'M' => {
                self.state = State::Ground;
                Some(Action::ReverseIndex)
            }
            b'N' => {
                self.state = State::Ground;
                Some(Action::SingleShift2)
            }
            b'O' => {
                self.state = State::Ground;
                Some(Action::SingleShift3)
            }
            b'c' => {
                self.state = State::Ground;
                Some(Action::FullReset)
            }
            b'7' => {
                self.state = State::Ground;
                Some(Action::SaveCursor)
            }
            b'8' => {
                self.state = State::Ground;
                Some(Action::RestoreCursor)
            }
            b'=' => {
                self.state = State::Ground;
                Some(Action::ApplicationKeypad)
            }
            b'>' => {
                self.state = State::Ground;
                Some(Action::NormalKeypad)
            }
            b'<' => {
                self.state = State::Ground;
                Some(Action::ExitVt52)
            }
            0x30..=0x7E => {
                self.state = State::Ground;
                Some(Action::Unsupported(vec![0x1B, b]))
            }
            _ => {
                self.state = State::Ground;
                None
            }
        }
    }

    fn advance_escape_intermediate(&mut self, b: u8) -> Option<Action> {
        match b {
            0x20..=0x2F => {
                self.collector.intermediates.push(b);
                None
            }
            0x30..=0x7E => {
                let bytes = std::mem::take(&mut self.collector.intermediates);
                self.state = State::Ground;
                // `ESC SP F/G` (S7C1T/S8C1T) and similar intermediate forms
                // are accepted but carry no grid-visible effect; surface
                // them as `Unsupported` so a host that cares can observe it.
                let mut seq = vec![0x1B];
                seq.extend(bytes);
                seq.push(b);
                Some(Action::Unsupported(seq))
            }
            _ => {
                self.state = State::Ground;
                None
            }
        }
    }

    fn advance_charset_designate(&mut self, b: u8, slot: GraphicSlot) -> Option<Action> {
        self.state = State::Ground;
        Some(Action::DesignateCharset { slot, charset: Charset::from_final_byte(b) })
    }

    // ── CSI ─────────────────────────────────────────────────────────

    fn advance_csi_param(&mut self, b: u8) -> Option<Action> {
        match b {
            b'0'..=b'9' => {
                self.collector.push_digit(b - b'0');
                self.state = State::CsiParam;
                None
            }
            b':' => {
                self.collector.end_subparam();
                self.state = State::CsiParam;
                None
            }
            b';' => {
                self.collector.end_param();
                self.state = State::CsiParam;
                None
            }
            b'?' | b'>' | b'=' | b'<' if self.collector.private_marker.is_none() => {
                self.collector.private_marker = Some(b);
                self.state = State::CsiParam;
                None
            }
            0x20..=0x2F => {
                self.collector.intermediates.push(b);
                self.state = State::CsiIntermediate;
                None
            }
            0x40..=0x7E => {
                self.state = State::Ground;
                Some(self.finish_csi(b))
            }
            _ => {
                self.state = State::CsiIgnore;
                None
            }
        }
    }

    fn advance_csi_intermediate(&mut self, b: u8) -> Option<Action> {
        match b {
            0x20..=0x2F => {
                self.collector.intermediates.push(b);
                None
            }
            0x40..=0x7E => {
                self.state = State::Ground;
                Some(self.finish_csi(b))
            }
            _ => {
                self.state = State::CsiIgnore;
                None
            }
        }
    }

    fn advance_csi_ignore(&mut self, b: u8) -> Option<Action> {
        if (0x40..=0x7E).contains(&b) {
            self.state = State::Ground;
            self.collector.clear();
        }
        None
    }

    fn finish_csi(&mut self, final_byte: u8) -> Action {
        let private = self.collector.private_marker;
        let intermediates = std::mem::take(&mut self.collector.intermediates);
        match (private, intermediates.as_slice(), final_byte) {
            (None, [], b'A') => Action::CursorUp(self.collector.value_or(0, 1).max(1)),
            (None, [], b'B') => Action::CursorDown(self.collector.value_or(0, 1).max(1)),
            (None, [], b'C') => Action::CursorRight(self.collector.value_or(0, 1).max(1)),
            (None, [], b'D') => Action::CursorLeft(self.collector.value_or(0, 1).max(1)),
            (None, [], b'E') => Action::CursorNextLine(self.collector.value_or(0, 1).max(1)),
            (None, [], b'F') => Action::CursorPrevLine(self.collector.value_or(0, 1).max(1)),
            (None, [], b'G') | (None, [], b'`') => {
                Action::CursorColumn(self.collector.value_or(0, 1).saturating_sub(1))
            }
            (None, [], b'd') => Action::CursorRow(self.collector.value_or(0, 1).saturating_sub(1)),
            (None, [], b'H') | (None, [], b'f') => {
                let values = self.collector.values();
                let row = values.first().copied().filter(|&v| v != 0).unwrap_or(1);
                let col = values.get(1).copied().filter(|&v| v != 0).unwrap_or(1);
                Action::CursorPosition { row: row.saturating_sub(1), col: col.saturating_sub(1) }
            }
            (None, [], b'I') => Action::ForwardTab(self.collector.value_or(0, 1).max(1)),
            (None, [], b'Z') => Action::BackTab(self.collector.value_or(0, 1).max(1)),
            (None, [], b'J') => Action::EraseInDisplay(self.collector.value_or(0, 0)),
            (Some(b'?'), [], b'J') => Action::SelectiveEraseInDisplay(self.collector.value_or(0, 0)),
            (None, [], b'K') => Action::EraseInLine(self.collector.value_or(0, 0)),
            (Some(b'?'), [], b'K') => Action::SelectiveEraseInLine(self.collector.value_or(0, 0)),
            (None, [], b'L') => Action::InsertLines(self.collector.value_or(0, 1).max(1)),
            (None, [], b'M') => Action::DeleteLines(self.collector.value_or(0, 1).max(1)),
            (None, [], b'P') => Action::DeleteChars(self.collector.value_or(0, 1).max(1)),
            (None, [], b'@') => Action::InsertChars(self.collector.value_or(0, 1).max(1)),
            (None, [], b'X') => Action::EraseChars(self.collector.value_or(0, 1).max(1)),
            (None, [], b'S') => Action::ScrollUp(self.collector.value_or(0, 1).max(1)),
            (None, [], b'T') => Action::ScrollDown(self.collector.value_or(0, 1).max(1)),
            (None, [], b'b') => Action::RepeatChar(self.collector.value_or(0, 1).max(1)),
            (None, [], b'm') => Action::Sgr(self.collector.finish()),
            (Some(b'<'), [], b'm') | (Some(b'<'), [], b'M') => {
                Action::MouseEvent { params: self.collector.values(), final_byte }
            }
            (None, [], b'r') => {
                let values = self.collector.values();
                let top = values.first().copied().unwrap_or(0);
                let bottom = values.get(1).copied().unwrap_or(0);
                Action::SetScrollRegion { top: top.saturating_sub(1), bottom: bottom.saturating_sub(1) }
            }
            (None, [], b's') => {
                if self.collector.values().is_empty() {
                    Action::SaveCursor
                } else {
                    let values = self.collector.values();
                    Action::SetLeftRightMargin {
                        left: values.first().copied().unwrap_or(1).saturating_sub(1),
                        right: values.get(1).copied().unwrap_or(0).saturating_sub(1),
                    }
                }
            }
            (None, [], b'u') => Action::RestoreCursor,
            (None, [], b'c') => Action::DeviceAttributes,
            (Some(b'>'), [], b'c') => Action::DeviceAttributesSecondary,
            (Some(b'='), [], b'c') => Action::DeviceAttributesTertiary,
            (None, [], b'n') => Action::DeviceStatusReport { param: self.collector.value_or(0, 0), private: false },
            (Some(b'?'), [], b'n') => {
                Action::DeviceStatusReport { param: self.collector.value_or(0, 0), private: true }
            }
            (Some(b'?'), [], b'h') => Action::DecSet(self.collector.values()),
            (Some(b'?'), [], b'l') => Action::DecRst(self.collector.values()),
            (None, [], b'h') => Action::AnsiSet(self.collector.values()),
            (None, [], b'l') => Action::AnsiRst(self.collector.values()),
            (Some(b'?'), [b'$'], b'p') => {
                Action::RequestMode { param: self.collector.value_or(0, 0), private: true }
            }
            (None, [b'$'], b'p') => Action::RequestMode { param: self.collector.value_or(0, 0), private: false },
            (Some(b'!'), [], b'p') => Action::SoftReset,
            (None, [b'"'], b'q') => Action::SetProtection(self.collector.value_or(0, 0)),
            (None, [b' '], b'q') => Action::SetCursorShape(self.collector.value_or(0, 0)),
            (None, [], b'g') => Action::ClearTabStop(self.collector.value_or(0, 0)),
            (None, [b'$'], b'x') => Action::FillRectArea(self.collector.values()),
            (None, [b'$'], b'v') => Action::CopyRectArea(self.collector.values()),
            (None, [b'$'], b'r') => Action::ChangeAttrRect { params: self.collector.values(), reverse: false },
            (None, [b'$'], b't') => Action::ChangeAttrRect { params: self.collector.values(), reverse: true },
            (None, [b'#'], b'{') => Action::PushSgr(self.collector.values()),
            (None, [b'#'], b'}') => Action::PopSgr,
            (None, [b'$'], b'z') => Action::EraseRectArea(self.collector.values()),
            (None, [b'$'], b'{') => Action::SelectiveEraseRect(self.collector.values()),
            (None, [b'*'], b'y') => Action::RequestChecksumRect(self.collector.values()),
            _ => {
                self.collector.clear();
                let mut seq = vec![0x1B, b'['];
                if let Some(marker) = private {
                    seq.push(marker);
                }
                seq.extend(intermediates);
                seq.push(final_byte);
                Action::Unsupported(seq)
            }
        }
    }

    // ── DCS ─────────────────────────────────────────────────────────

    fn advance_dcs_param(&mut self, b: u8) -> Option<Action> {
        match b {
            b'0'..=b'9' => {
                self.collector.push_digit(b - b'0');
                self.state = State::DcsParam;
                None
            }
            b':' => {
                self.collector.end_subparam();
                None
            }
            b';' => {
                self.collector.end_param();
                self.state = State::DcsParam;
                None
            }
            b'?' | b'>' | b'=' | b'<' if self.collector.private_marker.is_none() => {
                self.collector.private_marker = Some(b);
                None
            }
            0x20..=0x2F => {
                self.collector.intermediates.push(b);
                self.state = State::DcsIntermediate;
                None
            }
            0x40..=0x7E => {
                self.begin_dcs_payload(b);
                None
            }
            _ => {
                self.state = State::DcsIgnore;
                None
            }
        }
    }

    fn advance_dcs_intermediate(&mut self, b: u8) -> Option<Action> {
        match b {
            0x20..=0x2F => {
                self.collector.intermediates.push(b);
                None
            }
            0x40..=0x7E => {
                self.begin_dcs_payload(b);
                None
            }
            _ => {
                self.state = State::DcsIgnore;
                None
            }
        }
    }

    fn begin_dcs_payload(&mut self, final_byte: u8) {
        self.string_kind = Some(StringKind::Dcs);
        self.string_body.clear();
        self.string_truncated = false;

        let values = self.collector.values();
        let mut prefix = Vec::new();
        if let Some(marker) = self.collector.private_marker {
            prefix.push(marker);
        }
        for (i, v) in values.iter().enumerate() {
            if i > 0 {
                prefix.push(b';');
            }
            prefix.extend(v.to_string().into_bytes());
        }
        prefix.extend(self.collector.intermediates.clone());
        prefix.push(final_byte);
        self.string_prefix = prefix;
        self.collector.clear();
        self.state = State::DcsPassthrough;
    }

    fn advance_dcs_passthrough(&mut self, b: u8) -> Option<Action> {
        match b {
            0x1B => {
                self.state = State::StWait;
                None
            }
            0x9C => self.finish_string(),
            _ => {
                self.push_string_byte(b);
                None
            }
        }
    }

    fn advance_dcs_ignore(&mut self, b: u8) -> Option<Action> {
        match b {
            0x1B => {
                self.state = State::StWait;
                None
            }
            0x9C => {
                self.state = State::Ground;
                self.clear_string();
                None
            }
            _ => None,
        }
    }

    // ── OSC / APC / PM / SOS string bodies ─────────────────────────

    fn advance_string(&mut self, b: u8) -> Option<Action> {
        match b {
            0x07 if matches!(self.state, State::OscString) => self.finish_string(),
            0x1B => {
                self.state = State::StWait;
                None
            }
            0x9C => self.finish_string(),
            _ => {
                self.push_string_byte(b);
                None
            }
        }
    }

    fn advance_st_wait(&mut self, b: u8) -> Option<Action> {
        if b == b'\\' {
            self.finish_string()
        } else {
            // The ESC wasn't introducing ST after all: fold it back into
            // the string body as data and reprocess `b` from the state it
            // came from.
            self.push_string_byte(0x1B);
            self.state = match self.string_kind {
                Some(StringKind::Dcs) => State::DcsPassthrough,
                Some(StringKind::Osc) => State::OscString,
                Some(StringKind::Apc) => State::ApcString,
                Some(StringKind::Pm) => State::PmString,
                Some(StringKind::Sos) => State::SosString,
                None => State::Ground,
            };
            self.advance(b)
        }
    }

    fn push_string_byte(&mut self, b: u8) {
        if self.string_body.len() < MAX_STRING_LEN {
            self.string_body.push(b);
        } else {
            self.string_truncated = true;
        }
    }

    fn finish_string(&mut self) -> Option<Action> {
        self.state = State::Ground;
        let kind = self.string_kind.take()?;
        let prefix = std::mem::take(&mut self.string_prefix);
        let body = std::mem::take(&mut self.string_body);
        let truncated = self.string_truncated;
        self.string_truncated = false;
        Some(Action::StringPayload(StringPayload { kind, prefix, body, truncated }))
    }

    // ── VT52 ────────────────────────────────────────────────────────

    fn advance_vt52(&mut self, b: u8) -> Option<Action> {
        match b {
            b'A' => {
                self.state = State::Ground;
                Some(Action::CursorUp(1))
            }
            b'B' => {
                self.state = State::Ground;
                Some(Action::CursorDown(1))
            }
            b'C' => {
                self.state = State::Ground;
                Some(Action::CursorRight(1))
            }
            b'D' => {
                self.state = State::Ground;
                Some(Action::CursorLeft(1))
            }
            b'H' => {
                self.state = State::Ground;
                Some(Action::Vt52CursorPosition { row: 0, col: 0 })
            }
            b'I' => {
                self.state = State::Ground;
                Some(Action::ReverseIndex)
            }
            b'J' => {
                self.state = State::Ground;
                Some(Action::EraseInDisplay(0))
            }
            b'K' => {
                self.state = State::Ground;
                Some(Action::EraseInLine(0))
            }
            b'Y' => {
                self.state = State::Vt52Y { row: None };
                None
            }
            b'Z' => {
                self.state = State::Ground;
                Some(Action::Vt52Identify)
            }
            b'=' => {
                self.state = State::Ground;
                Some(Action::ApplicationKeypad)
            }
            b'>' => {
                self.state = State::Ground;
                Some(Action::NormalKeypad)
            }
            b'<' => {
                self.state = State::Ground;
                Some(Action::ExitVt52)
            }
            _ => {
                self.state = State::Ground;
                None
            }
        }
    }

    fn advance_vt52_y(&mut self, b: u8, row: Option<u8>) -> Option<Action> {
        match row {
            None => {
                self.state = State::Vt52Y { row: Some(b) };
                None
            }
            Some(row) => {
                self.state = State::Ground;
                Some(Action::Vt52CursorPosition {
                    row: u16::from(row.saturating_sub(0x20)),
                    col: u16::from(b.saturating_sub(0x20)),
                })
            }
        }
    }
}
