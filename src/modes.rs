//! Mode register: ANSI (`SM`/`RM`) and DEC private (`DECSET`/`DECRST`) modes.
//!
//! Every mode the dispatcher can flip lives in one of two bitflag sets so
//! that `Modes::reset()` (RIS) and the DECSTR soft-reset subset (see
//! `dispatch::esc`) can be expressed as plain bitmask operations instead of
//! a long list of individual field assignments.

use bitflags::bitflags;

bitflags! {
    /// ANSI standard modes set via `CSI Pn h`/`CSI Pn l` (no `?` prefix).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct AnsiModes: u16 {
        /// IRM (mode 4): insert mode — new characters push existing ones right.
        const INSERT          = 1 << 0;
        /// LNM (mode 20): linefeed/newline — LF also performs a carriage return.
        const LINEFEED_NEWLINE = 1 << 1;
        /// KAM (mode 2): keyboard action mode — locks the keyboard.
        const KEYBOARD_LOCKED  = 1 << 2;
        /// SRM (mode 12): send/receive — local echo suppressed when set.
        const SEND_RECEIVE     = 1 << 3;
    }
}

bitflags! {
    /// DEC private modes set via `CSI ? Pn h`/`CSI ? Pn l`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct DecModes: u32 {
        /// DECCKM (1): cursor keys send SS3 application sequences.
        const APPLICATION_CURSOR_KEYS = 1 << 0;
        /// DECANM (2, inverted sense internally): ANSI vs VT52 mode.
        const VT52                    = 1 << 1;
        /// DECCOLM (3): 132-column mode.
        const COLUMN_132               = 1 << 2;
        /// DECSCLM (4): smooth (slow) scroll — cosmetic only, tracked for DECRQM.
        const SMOOTH_SCROLL            = 1 << 3;
        /// DECSCNM (5): reverse video screen.
        const REVERSE_VIDEO            = 1 << 4;
        /// DECOM (6): origin mode — cursor addressing relative to scroll region.
        const ORIGIN                   = 1 << 5;
        /// DECAWM (7): autowrap at the right margin.
        const AUTOWRAP                 = 1 << 6;
        /// DECARM (8): auto-repeat keys — shell-side concern, tracked for DECRQM.
        const AUTO_REPEAT              = 1 << 7;
        /// Mode 9: X10 mouse reporting (button-press only).
        const MOUSE_X10                = 1 << 8;
        /// DECTCEM (25): text cursor enable (visibility).
        const CURSOR_VISIBLE           = 1 << 9;
        /// Mode 47: alternate screen buffer (legacy, no cursor save/clear).
        const ALT_SCREEN_47            = 1 << 10;
        /// Mode 1000: VT200 mouse reporting (press+release).
        const MOUSE_VT200              = 1 << 11;
        /// Mode 1002: button-event mouse tracking (press/release/drag).
        const MOUSE_BUTTON_EVENT       = 1 << 12;
        /// Mode 1003: any-event mouse tracking (all motion).
        const MOUSE_ANY_EVENT          = 1 << 13;
        /// Mode 1005: UTF-8 mouse coordinate encoding.
        const MOUSE_UTF8                = 1 << 14;
        /// Mode 1006: SGR mouse coordinate encoding.
        const MOUSE_SGR                 = 1 << 15;
        /// Mode 1015: urxvt mouse coordinate encoding.
        const MOUSE_URXVT               = 1 << 16;
        /// Mode 1047: alternate screen buffer, clears on leave.
        const ALT_SCREEN_1047           = 1 << 17;
        /// Mode 1048: save/restore cursor only (paired with 1047 by convention).
        const ALT_SCREEN_CURSOR         = 1 << 18;
        /// Mode 1049: alternate screen buffer with save-cursor and clear-on-enter.
        const ALT_SCREEN_1049           = 1 << 19;
        /// Mode 1004: focus in/out event reporting.
        const FOCUS_EVENTS              = 1 << 20;
        /// Mode 2004: bracketed paste mode.
        const BRACKETED_PASTE           = 1 << 21;
        /// DECLRMM (69): left/right margin mode enables `DECSLRM`.
        const LEFT_RIGHT_MARGIN        = 1 << 22;
        /// DECNCSM (95): no-clear on DECCOLM column-mode switch.
        const NO_CLEAR_ON_COLM          = 1 << 23;
        /// DECBKM: backspace sends BS (set) vs DEL (reset).
        const BACKARROW_SENDS_BS        = 1 << 24;
        /// DECKBUM: keyboard usage mode, data vs typewriter numeric keypad.
        const KEYBOARD_USAGE_DATA       = 1 << 25;
        /// DECHDPXM: half-duplex mode (local echo of transmitted characters).
        const HALF_DUPLEX               = 1 << 26;
        /// DECESKM: enable secondary keyboard language shifts.
        const SECONDARY_KEYBOARD_LANG   = 1 << 27;
        /// DECXRLM: transmit-rate limiting — gates XON/XOFF backpressure synthesis.
        const XMIT_RATE_LIMIT           = 1 << 28;
        /// DECNKM: application keypad mode (vs numeric keypad).
        const APPLICATION_KEYPAD        = 1 << 29;
    }
}

impl Default for DecModes {
    /// VT420-family power-on defaults: autowrap and cursor visible are the
    /// only bits set by default; everything else starts reset.
    fn default() -> Self {
        DecModes::AUTOWRAP | DecModes::CURSOR_VISIBLE
    }
}

/// The terminal's combined ANSI + DEC private mode register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Modes {
    pub ansi: AnsiModes,
    pub dec: DecModes,
}

impl Modes {
    /// A fresh mode register at VT420-compatible power-on defaults.
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn origin_mode(&self) -> bool {
        self.dec.contains(DecModes::ORIGIN)
    }

    #[must_use]
    pub fn autowrap(&self) -> bool {
        self.dec.contains(DecModes::AUTOWRAP)
    }

    #[must_use]
    pub fn insert_mode(&self) -> bool {
        self.ansi.contains(AnsiModes::INSERT)
    }

    #[must_use]
    pub fn cursor_visible(&self) -> bool {
        self.dec.contains(DecModes::CURSOR_VISIBLE)
    }

    #[must_use]
    pub fn application_cursor_keys(&self) -> bool {
        self.dec.contains(DecModes::APPLICATION_CURSOR_KEYS)
    }

    #[must_use]
    pub fn application_keypad(&self) -> bool {
        self.dec.contains(DecModes::APPLICATION_KEYPAD)
    }

    #[must_use]
    pub fn left_right_margin_mode(&self) -> bool {
        self.dec.contains(DecModes::LEFT_RIGHT_MARGIN)
    }

    #[must_use]
    pub fn vt52(&self) -> bool {
        self.dec.contains(DecModes::VT52)
    }

    #[must_use]
    pub fn bracketed_paste(&self) -> bool {
        self.dec.contains(DecModes::BRACKETED_PASTE)
    }

    #[must_use]
    pub fn xmit_rate_limit(&self) -> bool {
        self.dec.contains(DecModes::XMIT_RATE_LIMIT)
    }

    /// Set or clear a DEC private mode by its numeric parameter (e.g. `1049`).
    ///
    /// Unknown parameters are ignored (matching xterm, which silently drops
    /// `DECSET`/`DECRST` for modes it doesn't implement).
    pub fn set_dec_mode(&mut self, param: u16, enabled: bool) {
        if let Some(bit) = dec_mode_bit(param) {
            self.dec.set(bit, enabled);
        }
    }

    /// Whether a DEC private mode parameter is currently set. Used by DECRQM.
    #[must_use]
    pub fn dec_mode(&self, param: u16) -> Option<bool> {
        dec_mode_bit(param).map(|bit| self.dec.contains(bit))
    }

    /// Set or clear an ANSI standard mode by its numeric parameter (e.g. `4`).
    pub fn set_ansi_mode(&mut self, param: u16, enabled: bool) {
        if let Some(bit) = ansi_mode_bit(param) {
            self.ansi.set(bit, enabled);
        }
    }

    #[must_use]
    pub fn ansi_mode(&self, param: u16) -> Option<bool> {
        ansi_mode_bit(param).map(|bit| self.ansi.contains(bit))
    }

    /// RIS: full reset to power-on defaults.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// DECSTR: soft reset. Clears a narrower subset than RIS — insert mode,
    /// origin mode, and autowrap per xterm's documented DECSTR behavior —
    /// while leaving mouse tracking, alt-screen selection, and bracketed
    /// paste untouched (those are shell/host negotiated, not terminal state).
    pub fn soft_reset(&mut self) {
        self.ansi.remove(AnsiModes::INSERT);
        self.dec.remove(DecModes::ORIGIN);
        self.dec.insert(DecModes::AUTOWRAP);
        self.dec.insert(DecModes::CURSOR_VISIBLE);
    }
}

fn dec_mode_bit(param: u16) -> Option<DecModes> {
    Some(match param {
        1 => DecModes::APPLICATION_CURSOR_KEYS,
        2 => DecModes::VT52, // DECANM reset -> VT52; handled specially by dispatcher
        3 => DecModes::COLUMN_132,
        4 => DecModes::SMOOTH_SCROLL,
        5 => DecModes::REVERSE_VIDEO,
        6 => DecModes::ORIGIN,
        7 => DecModes::AUTOWRAP,
        8 => DecModes::AUTO_REPEAT,
        9 => DecModes::MOUSE_X10,
        25 => DecModes::CURSOR_VISIBLE,
        47 => DecModes::ALT_SCREEN_47,
        69 => DecModes::LEFT_RIGHT_MARGIN,
        95 => DecModes::NO_CLEAR_ON_COLM,
        1000 => DecModes::MOUSE_VT200,
        1002 => DecModes::MOUSE_BUTTON_EVENT,
        1003 => DecModes::MOUSE_ANY_EVENT,
        1004 => DecModes::FOCUS_EVENTS,
        1005 => DecModes::MOUSE_UTF8,
        1006 => DecModes::MOUSE_SGR,
        1015 => DecModes::MOUSE_URXVT,
        1047 => DecModes::ALT_SCREEN_47,
        1048 => DecModes::ALT_SCREEN_CURSOR,
        1049 => DecModes::ALT_SCREEN_1049,
        2004 => DecModes::BRACKETED_PASTE,
        88 => DecModes::XMIT_RATE_LIMIT, // DECXRLM
        _ => return None,
    })
}

fn ansi_mode_bit(param: u16) -> Option<AnsiModes> {
    Some(match param {
        2 => AnsiModes::KEYBOARD_LOCKED,
        4 => AnsiModes::INSERT,
        12 => AnsiModes::SEND_RECEIVE,
        20 => AnsiModes::LINEFEED_NEWLINE,
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_has_autowrap_and_cursor_visible() {
        let modes = Modes::new();
        assert!(modes.autowrap());
        assert!(modes.cursor_visible());
        assert!(!modes.origin_mode());
        assert!(!modes.insert_mode());
    }

    #[test]
    fn set_dec_mode_origin() {
        let mut modes = Modes::new();
        modes.set_dec_mode(6, true);
        assert!(modes.origin_mode());
        modes.set_dec_mode(6, false);
        assert!(!modes.origin_mode());
    }

    #[test]
    fn set_ansi_mode_insert() {
        let mut modes = Modes::new();
        modes.set_ansi_mode(4, true);
        assert!(modes.insert_mode());
    }

    #[test]
    fn unknown_mode_params_are_ignored() {
        let mut modes = Modes::new();
        modes.set_dec_mode(99999, true);
        modes.set_ansi_mode(99999, true);
        assert_eq!(modes, Modes::new());
    }

    #[test]
    fn reset_restores_defaults() {
        let mut modes = Modes::new();
        modes.set_dec_mode(1049, true);
        modes.set_ansi_mode(4, true);
        modes.reset();
        assert_eq!(modes, Modes::new());
    }

    #[test]
    fn soft_reset_clears_insert_and_origin_but_keeps_mouse_tracking() {
        let mut modes = Modes::new();
        modes.set_ansi_mode(4, true);
        modes.set_dec_mode(6, true);
        modes.set_dec_mode(1000, true);
        modes.soft_reset();
        assert!(!modes.insert_mode());
        assert!(!modes.origin_mode());
        assert!(modes.dec.contains(DecModes::MOUSE_VT200));
    }

    #[test]
    fn linefeed_newline_flag() {
        let mut modes = Modes::new();
        assert!(!modes.ansi.contains(AnsiModes::LINEFEED_NEWLINE));
        modes.set_ansi_mode(20, true);
        assert!(modes.ansi.contains(AnsiModes::LINEFEED_NEWLINE));
    }

    #[test]
    fn dec_mode_query_round_trip() {
        let mut modes = Modes::new();
        assert_eq!(modes.dec_mode(6), Some(false));
        modes.set_dec_mode(6, true);
        assert_eq!(modes.dec_mode(6), Some(true));
        assert_eq!(modes.dec_mode(99999), None);
    }
}
