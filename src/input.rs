//! Input pipeline: encodes host-supplied key/mouse/paste events into the
//! escape sequences the connected application expects, honoring the
//! session's current mode register (DECCKM application cursor keys, mouse
//! tracking level, bracketed paste) rather than a fixed table.
//!
//! This module only encodes bytes — it does not own a queue. The bounded
//! FIFO it feeds is [`crate::response::ResponseSink`]: encoded bytes are
//! written there by [`crate::session::Session::push_input_event`] for the
//! host to drain alongside normal terminal replies.

use bitflags::bitflags;

use crate::modes::{DecModes, Modes};

bitflags! {
    /// Keyboard modifier state accompanying a key or mouse event.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Modifiers: u8 {
        const SHIFT   = 1 << 0;
        const ALT     = 1 << 1;
        const CONTROL = 1 << 2;
        const SUPER   = 1 << 3;
    }
}

/// Named (non-printable) keys and the printable-character case.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyCode {
    Char(char),
    Enter,
    Tab,
    Backspace,
    Escape,
    Up,
    Down,
    Left,
    Right,
    Home,
    End,
    PageUp,
    PageDown,
    Insert,
    Delete,
    /// Function key, 1-based (F1 = `F(1)`).
    F(u8),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MouseButton {
    Left,
    Middle,
    Right,
    None,
}

/// The event category; distinguishes key events from the four mouse event
/// shapes xterm-style mouse tracking reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKind {
    Key,
    MouseDown,
    MouseUp,
    MouseMove,
    MouseWheel,
}

/// A single host-originated input event, destined to become bytes written
/// toward the connected application.
#[derive(Debug, Clone, PartialEq)]
pub struct InputEvent {
    pub kind: InputKind,
    pub key_code: Option<KeyCode>,
    pub scancode: Option<u32>,
    pub modifiers: Modifiers,
    pub mouse_button: MouseButton,
    /// 0-based column/row, used for mouse events.
    pub x: u16,
    pub y: u16,
    /// Wheel delta: negative is "up"/away from the user, positive is "down".
    pub wheel: i8,
    /// A literal byte sequence the host has already resolved (IME composition,
    /// clipboard paste text, etc). When present, this bypasses all encoding
    /// below and is used verbatim save for bracketed-paste wrapping.
    pub sequence_literal: Option<Vec<u8>>,
    /// Set when `sequence_literal` is pasted text that should be wrapped in
    /// `ESC [ 2 0 0 ~` / `ESC [ 2 0 1 ~` if bracketed paste mode is active.
    pub is_paste: bool,
}

impl InputEvent {
    /// Convenience constructor for a plain key press with no modifiers.
    pub fn key(code: KeyCode) -> Self {
        Self {
            kind: InputKind::Key,
            key_code: Some(code),
            scancode: None,
            modifiers: Modifiers::empty(),
            mouse_button: MouseButton::None,
            x: 0,
            y: 0,
            wheel: 0,
            sequence_literal: None,
            is_paste: false,
        }
    }

    /// Convenience constructor for pasted text, wrapped if the session has
    /// bracketed paste enabled.
    pub fn paste(text: &[u8]) -> Self {
        Self {
            kind: InputKind::Key,
            key_code: None,
            scancode: None,
            modifiers: Modifiers::empty(),
            mouse_button: MouseButton::None,
            x: 0,
            y: 0,
            wheel: 0,
            sequence_literal: Some(text.to_vec()),
            is_paste: true,
        }
    }
}

fn modifier_code(m: Modifiers) -> u8 {
    let mut code = 1u8;
    if m.contains(Modifiers::SHIFT) {
        code += 1;
    }
    if m.contains(Modifiers::ALT) {
        code += 2;
    }
    if m.contains(Modifiers::CONTROL) {
        code += 4;
    }
    code
}

/// Encode one [`InputEvent`] into the bytes the connected application should
/// receive, given the session's current `modes`.
pub fn encode(event: &InputEvent, modes: &Modes) -> Vec<u8> {
    if let Some(literal) = &event.sequence_literal {
        if event.is_paste && modes.bracketed_paste() {
            let mut out = b"\x1b[200~".to_vec();
            out.extend_from_slice(literal);
            out.extend_from_slice(b"\x1b[201~");
            return out;
        }
        return literal.clone();
    }

    match event.kind {
        InputKind::Key => encode_key(event, modes),
        InputKind::MouseDown | InputKind::MouseUp | InputKind::MouseMove | InputKind::MouseWheel => {
            encode_mouse(event, modes)
        }
    }
}

fn cursor_key_seq(final_byte: u8, event: &InputEvent, modes: &Modes) -> Vec<u8> {
    if !event.modifiers.is_empty() {
        return format!("\x1b[1;{}{}", modifier_code(event.modifiers), final_byte as char).into_bytes();
    }
    if modes.application_cursor_keys() {
        vec![0x1b, b'O', final_byte]
    } else {
        vec![0x1b, b'[', final_byte]
    }
}

fn tilde_seq(code: u8, event: &InputEvent) -> Vec<u8> {
    if event.modifiers.is_empty() {
        format!("\x1b[{code}~").into_bytes()
    } else {
        format!("\x1b[{code};{}~", modifier_code(event.modifiers)).into_bytes()
    }
}

fn function_key_seq(n: u8, event: &InputEvent) -> Vec<u8> {
    match n {
        1..=4 => {
            let final_byte = [b'P', b'Q', b'R', b'S'][(n - 1) as usize];
            if event.modifiers.is_empty() {
                vec![0x1b, b'O', final_byte]
            } else {
                format!("\x1b[1;{}{}", modifier_code(event.modifiers), final_byte as char).into_bytes()
            }
        }
        5..=12 => {
            let codes = [15u8, 17, 18, 19, 20, 21, 23, 24];
            tilde_seq(codes[(n - 5) as usize], event)
        }
        _ => Vec::new(),
    }
}

fn encode_key(event: &InputEvent, modes: &Modes) -> Vec<u8> {
    let Some(key) = event.key_code else {
        return Vec::new();
    };
    match key {
        KeyCode::Char(c) => {
            if event.modifiers.contains(Modifiers::CONTROL) && c.is_ascii_alphabetic() {
                return vec![(c.to_ascii_uppercase() as u8) & 0x1f];
            }
            let mut buf = [0u8; 4];
            let encoded = c.encode_utf8(&mut buf).as_bytes().to_vec();
            if event.modifiers.contains(Modifiers::ALT) {
                let mut out = vec![0x1b];
                out.extend(encoded);
                out
            } else {
                encoded
            }
        }
        KeyCode::Enter => b"\r".to_vec(),
        KeyCode::Tab => {
            if event.modifiers.contains(Modifiers::SHIFT) {
                b"\x1b[Z".to_vec()
            } else {
                b"\t".to_vec()
            }
        }
        KeyCode::Backspace => vec![0x7f],
        KeyCode::Escape => vec![0x1b],
        KeyCode::Up => cursor_key_seq(b'A', event, modes),
        KeyCode::Down => cursor_key_seq(b'B', event, modes),
        KeyCode::Right => cursor_key_seq(b'C', event, modes),
        KeyCode::Left => cursor_key_seq(b'D', event, modes),
        KeyCode::Home => cursor_key_seq(b'H', event, modes),
        KeyCode::End => cursor_key_seq(b'F', event, modes),
        KeyCode::Insert => tilde_seq(2, event),
        KeyCode::Delete => tilde_seq(3, event),
        KeyCode::PageUp => tilde_seq(5, event),
        KeyCode::PageDown => tilde_seq(6, event),
        KeyCode::F(n) => function_key_seq(n, event),
    }
}

fn encode_mouse(event: &InputEvent, modes: &Modes) -> Vec<u8> {
    let tracking_active = modes.dec.intersects(
        DecModes::MOUSE_X10 | DecModes::MOUSE_VT200 | DecModes::MOUSE_BUTTON_EVENT | DecModes::MOUSE_ANY_EVENT,
    );
    if !tracking_active {
        return Vec::new();
    }
    if event.kind == InputKind::MouseMove
        && !modes.dec.intersects(DecModes::MOUSE_BUTTON_EVENT | DecModes::MOUSE_ANY_EVENT)
    {
        return Vec::new();
    }

    let mut cb: u16 = match event.mouse_button {
        MouseButton::Left => 0,
        MouseButton::Middle => 1,
        MouseButton::Right => 2,
        MouseButton::None => 3,
    };
    if event.modifiers.contains(Modifiers::SHIFT) {
        cb += 4;
    }
    if event.modifiers.contains(Modifiers::ALT) {
        cb += 8;
    }
    if event.modifiers.contains(Modifiers::CONTROL) {
        cb += 16;
    }
    if event.kind == InputKind::MouseMove {
        cb += 32;
    }
    if event.kind == InputKind::MouseWheel {
        cb = 64 + u16::from(event.wheel < 0);
    }

    if modes.dec.contains(DecModes::MOUSE_SGR) {
        let final_byte = if event.kind == InputKind::MouseUp { 'm' } else { 'M' };
        return format!("\x1b[<{};{};{}{}", cb, event.x + 1, event.y + 1, final_byte).into_bytes();
    }

    let cb = if event.kind == InputKind::MouseUp && !modes.dec.contains(DecModes::MOUSE_ANY_EVENT) {
        3
    } else {
        cb
    };
    let col = (event.x + 1).min(223) as u8;
    let row = (event.y + 1).min(223) as u8;
    vec![
        0x1b,
        b'[',
        b'M',
        32u8.saturating_add(cb.min(223) as u8),
        32u8.saturating_add(col),
        32u8.saturating_add(row),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_char_encodes_as_utf8() {
        let modes = Modes::new();
        let evt = InputEvent::key(KeyCode::Char('a'));
        assert_eq!(encode(&evt, &modes), b"a");
    }

    #[test]
    fn ctrl_letter_encodes_as_control_code() {
        let modes = Modes::new();
        let mut evt = InputEvent::key(KeyCode::Char('c'));
        evt.modifiers = Modifiers::CONTROL;
        assert_eq!(encode(&evt, &modes), vec![0x03]);
    }

    #[test]
    fn arrow_key_honors_application_cursor_keys() {
        let mut modes = Modes::new();
        let evt = InputEvent::key(KeyCode::Up);
        assert_eq!(encode(&evt, &modes), b"\x1b[A");
        modes.set_dec_mode(1, true);
        assert_eq!(encode(&evt, &modes), b"\x1bOA");
    }

    #[test]
    fn paste_wraps_in_bracketed_markers_when_enabled() {
        let mut modes = Modes::new();
        modes.set_dec_mode(2004, true);
        let evt = InputEvent::paste(b"hello");
        let mut expected = b"\x1b[200~".to_vec();
        expected.extend_from_slice(b"hello");
        expected.extend_from_slice(b"\x1b[201~");
        assert_eq!(encode(&evt, &modes), expected);
    }

    #[test]
    fn sgr_mouse_down_encodes_button_and_1based_coords() {
        let mut modes = Modes::new();
        modes.set_dec_mode(1006, true);
        modes.set_dec_mode(1000, true);
        let mut evt = InputEvent::key(KeyCode::Char(' '));
        evt.kind = InputKind::MouseDown;
        evt.mouse_button = MouseButton::Left;
        evt.x = 4;
        evt.y = 2;
        assert_eq!(encode(&evt, &modes), b"\x1b[<0;5;3M");
    }
}
