//! Gateway protocol: a DCS-wrapped out-of-band control channel,
//! `DCS GATE;Class;Id;Command[;Params] ST`. When `Class == "KTERM"`
//! the core handles the command itself; any other class is a
//! [`GatewayOutcome::Delegated`] payload for the host's own callback.
//!
//! `dispatch::dcs` recognizes the `GATE;` shape from a DCS string payload
//! (see that module's doc comment for the exact prefix/body reconstruction)
//! and hands the bytes to [`GatewayCommand::parse`]. This module only lexes
//! and structures the command — routing it to a session and producing a
//! reply lives in `dispatch::dcs`, which already owns the `Session`.

use crate::error::KTermError;

/// The one reserved class this core interprets itself.
pub const RESERVED_CLASS: &str = "KTERM";

/// The small token set this grammar needs: identifiers, numbers, quoted
/// strings, `=`, `;`, and `|`.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Ident(String),
    Number(i64),
    String(String),
    Equals,
    Semicolon,
    Pipe,
    Eof,
}

struct Lexer<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Lexer<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn next_token(&mut self) -> Token {
        self.skip_ws();
        let Some(&b) = self.bytes.get(self.pos) else {
            return Token::Eof;
        };
        match b {
            b';' => {
                self.pos += 1;
                Token::Semicolon
            }
            b'=' => {
                self.pos += 1;
                Token::Equals
            }
            b'|' => {
                self.pos += 1;
                Token::Pipe
            }
            b'"' => self.read_string(),
            b'-' | b'0'..=b'9' => self.read_number(),
            _ => self.read_ident(),
        }
    }

    fn skip_ws(&mut self) {
        while matches!(self.bytes.get(self.pos), Some(b' ') | Some(b'\t')) {
            self.pos += 1;
        }
    }

    fn read_string(&mut self) -> Token {
        self.pos += 1;
        let start = self.pos;
        while let Some(&b) = self.bytes.get(self.pos) {
            if b == b'"' {
                break;
            }
            self.pos += 1;
        }
        let s = String::from_utf8_lossy(&self.bytes[start..self.pos]).into_owned();
        if self.bytes.get(self.pos) == Some(&b'"') {
            self.pos += 1;
        }
        Token::String(s)
    }

    fn read_number(&mut self) -> Token {
        let start = self.pos;
        if self.bytes.get(self.pos) == Some(&b'-') {
            self.pos += 1;
        }
        while matches!(self.bytes.get(self.pos), Some(b'0'..=b'9')) {
            self.pos += 1;
        }
        let text = std::str::from_utf8(&self.bytes[start..self.pos]).unwrap_or("0");
        Token::Number(text.parse().unwrap_or(0))
    }

    fn read_ident(&mut self) -> Token {
        let start = self.pos;
        while let Some(&b) = self.bytes.get(self.pos) {
            if matches!(b, b';' | b'=' | b'|' | b' ' | b'\t') {
                break;
            }
            self.pos += 1;
        }
        let s = String::from_utf8_lossy(&self.bytes[start..self.pos]).into_owned();
        Token::Ident(s)
    }
}

/// The built-in verb set this protocol supports; anything else for class
/// `KTERM` is logged as "Unknown Gateway Command" by the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayVerb {
    Set,
    Get,
    Pipe,
    Init,
    Reset,
    Unknown(String),
}

/// A parsed `GATE;Class;Id;Command;Params` command.
#[derive(Debug, Clone, PartialEq)]
pub struct GatewayCommand {
    pub class: String,
    pub id: i32,
    pub verb: GatewayVerb,
    pub params: Vec<String>,
    /// Raw bytes following a `|` token, e.g. `PIPE;VT;B64|<payload>` — kept
    /// unparsed since a pipe payload may be arbitrary (possibly binary)
    /// data rather than a token stream.
    pub pipe_payload: Option<Vec<u8>>,
}

/// What a Gateway handler did with a command — an exception-for-control-flow
/// replacement: a plain return value instead of throwing past the caller.
#[derive(Debug, Clone, PartialEq)]
pub enum GatewayOutcome {
    Handled,
    Delegated(GatewayCommand),
}

impl GatewayCommand {
    /// Parse a `"GATE;...".as_bytes()` slice (the `GATE;` literal included).
    pub fn parse(bytes: &[u8]) -> Result<Self, KTermError> {
        const PREFIX: &[u8] = b"GATE;";
        if !bytes.starts_with(PREFIX) {
            return Err(KTermError::GatewayMalformedCommand {
                reason: "missing GATE; prefix".to_string(),
            });
        }
        let mut lexer = Lexer::new(&bytes[PREFIX.len()..]);

        let mut fields: Vec<Vec<Token>> = vec![Vec::new()];
        let mut pipe_payload = None;
        loop {
            let tok = lexer.next_token();
            match tok {
                Token::Eof => break,
                Token::Semicolon => fields.push(Vec::new()),
                Token::Pipe => {
                    pipe_payload = Some(lexer.bytes[lexer.pos..].to_vec());
                    break;
                }
                other => fields.last_mut().expect("always ≥1 field").push(other),
            }
        }

        let mut fields_iter = fields.into_iter();
        let class = ident_from_field(fields_iter.next(), "class")?;
        let id = number_from_field(fields_iter.next(), "id")?;
        let command_tokens = fields_iter.next().unwrap_or_default();
        let command_name = ident_from_tokens(&command_tokens, "command")?;
        let verb = match command_name.as_str() {
            "SET" => GatewayVerb::Set,
            "GET" => GatewayVerb::Get,
            "PIPE" => GatewayVerb::Pipe,
            "INIT" => GatewayVerb::Init,
            "RESET" => GatewayVerb::Reset,
            other => GatewayVerb::Unknown(other.to_string()),
        };
        let params = fields_iter.map(render_field).collect();

        Ok(GatewayCommand { class, id, verb, params, pipe_payload })
    }

    #[must_use]
    pub fn is_reserved_class(&self) -> bool {
        self.class == RESERVED_CLASS
    }

    /// Split a `KEY=VALUE`-shaped param into its halves; `None` if the param
    /// carries no `=`.
    #[must_use]
    pub fn param_kv(param: &str) -> Option<(&str, &str)> {
        param.split_once('=')
    }
}

fn render_field(tokens: Vec<Token>) -> String {
    let mut out = String::new();
    for tok in tokens {
        match tok {
            Token::Ident(s) | Token::String(s) => out.push_str(&s),
            Token::Number(n) => out.push_str(&n.to_string()),
            Token::Equals => out.push('='),
            Token::Semicolon | Token::Pipe | Token::Eof => {}
        }
    }
    out
}

fn ident_from_tokens(tokens: &[Token], what: &str) -> Result<String, KTermError> {
    match tokens.first() {
        Some(Token::Ident(s) | Token::String(s)) => Ok(s.clone()),
        _ => Err(KTermError::GatewayMalformedCommand {
            reason: format!("expected {what}"),
        }),
    }
}

fn ident_from_field(field: Option<Vec<Token>>, what: &str) -> Result<String, KTermError> {
    let tokens = field.ok_or_else(|| KTermError::GatewayMalformedCommand {
        reason: format!("missing {what}"),
    })?;
    ident_from_tokens(&tokens, what)
}

fn number_from_field(field: Option<Vec<Token>>, what: &str) -> Result<i32, KTermError> {
    let tokens = field.ok_or_else(|| KTermError::GatewayMalformedCommand {
        reason: format!("missing {what}"),
    })?;
    match tokens.first() {
        Some(Token::Number(n)) => Ok(*n as i32),
        Some(Token::Ident(s)) => s.parse().map_err(|_| KTermError::GatewayMalformedCommand {
            reason: format!("invalid {what} {s:?}"),
        }),
        _ => Err(KTermError::GatewayMalformedCommand {
            reason: format!("expected {what}"),
        }),
    }
}

/// Case-insensitive boolean parsing for Gateway `ATTR`/`GRID`/… values:
/// `ON|OFF|1|0|TRUE|FALSE`.
#[must_use]
pub fn parse_bool(s: &str) -> Option<bool> {
    match s.to_ascii_uppercase().as_str() {
        "ON" | "1" | "TRUE" => Some(true),
        "OFF" | "0" | "FALSE" => Some(false),
        _ => None,
    }
}

/// Build the reply bytes for a Gateway `GET` query: `DCS GATE;KTERM;Id;REPORT;KEY=VAL ST`.
#[must_use]
pub fn report_reply(id: i32, key: &str, value: &str) -> Vec<u8> {
    let mut out = vec![0x1b, b'P'];
    out.extend_from_slice(format!("GATE;KTERM;{id};REPORT;{key}={value}").as_bytes());
    out.push(0x1b);
    out.push(b'\\');
    out
}

/// Per-terminal Gateway routing state. `-1` addresses whichever session is
/// currently emitting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GatewayState {
    pub target_session: i32,
    pub regis_session: i32,
    pub tektronix_session: i32,
    pub kitty_session: i32,
    pub sixel_session: i32,
}

impl Default for GatewayState {
    fn default() -> Self {
        Self {
            target_session: -1,
            regis_session: -1,
            tektronix_session: -1,
            kitty_session: -1,
            sixel_session: -1,
        }
    }
}

impl GatewayState {
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// How a session's keyboard auto-repeat is driven, set by Gateway
/// `SET;KEYBOARD;REPEAT=...`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KeyRepeatSource {
    #[default]
    Host,
    Software,
}

/// Grid-overlay line color, set by Gateway `SET;GRID;ON|OFF;R=...;G=...;B=...;A=...`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridOverlay {
    pub enabled: bool,
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Default for GridOverlay {
    fn default() -> Self {
        Self { enabled: false, r: 0, g: 0, b: 0, a: 255 }
    }
}

/// Blink intervals (milliseconds), set by Gateway `SET;BLINK;FAST=...;SLOW=...;BG=...`.
/// The core never drives a timer itself — blinking is a read-only query an
/// outer shell polls on its own oscillator; these are the values it reads back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlinkRates {
    pub fast_ms: u32,
    pub slow_ms: u32,
    pub bg_ms: u32,
}

impl Default for BlinkRates {
    fn default() -> Self {
        Self { fast_ms: 250, slow_ms: 500, bg_ms: 500 }
    }
}

/// Keyboard behavior set by Gateway `SET;KEYBOARD;...`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyboardConfig {
    pub repeat: KeyRepeatSource,
    pub repeat_rate_ms: u32,
    pub delay_ms: u32,
}

impl Default for KeyboardConfig {
    fn default() -> Self {
        Self { repeat: KeyRepeatSource::Host, repeat_rate_ms: 30, delay_ms: 400 }
    }
}

/// The Gateway-settable overlay/keyboard/blink bundle a session carries
/// beyond its core VT state (the `ATTR`/`GRID`/`CONCEAL`/`BLINK`/`KEYBOARD`
/// verbs). Kept as one struct so `RESET;...` sub-forms can reset one field
/// group without touching the others.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct GatewaySettings {
    pub grid_overlay: GridOverlay,
    pub conceal_codepoint: Option<u32>,
    pub blink: BlinkRates,
    pub keyboard: KeyboardConfig,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_set_level_command() {
        let cmd = GatewayCommand::parse(b"GATE;KTERM;0;SET;LEVEL;525").unwrap();
        assert_eq!(cmd.class, "KTERM");
        assert_eq!(cmd.id, 0);
        assert_eq!(cmd.verb, GatewayVerb::Set);
        assert_eq!(cmd.params, vec!["LEVEL".to_string(), "525".to_string()]);
    }

    #[test]
    fn parses_key_value_attr_params() {
        let cmd = GatewayCommand::parse(b"GATE;KTERM;1;SET;ATTR;BOLD=ON;FG=5").unwrap();
        assert_eq!(cmd.params, vec!["ATTR", "BOLD=ON", "FG=5"]);
        assert_eq!(GatewayCommand::param_kv("BOLD=ON"), Some(("BOLD", "ON")));
    }

    #[test]
    fn non_kterm_class_is_delegatable() {
        let cmd = GatewayCommand::parse(b"GATE;REGIS;0;INIT").unwrap();
        assert!(!cmd.is_reserved_class());
    }

    #[test]
    fn pipe_payload_is_captured_raw() {
        let cmd = GatewayCommand::parse(b"GATE;KTERM;0;PIPE;VT;B64|aGVsbG8=").unwrap();
        assert_eq!(cmd.verb, GatewayVerb::Pipe);
        assert_eq!(cmd.params, vec!["VT".to_string()]);
        assert_eq!(cmd.pipe_payload.as_deref(), Some(b"aGVsbG8=".as_slice()));
    }

    #[test]
    fn missing_prefix_is_malformed() {
        assert!(GatewayCommand::parse(b"NOTGATE;KTERM;0;SET").is_err());
    }

    #[test]
    fn bool_parsing_is_case_insensitive() {
        assert_eq!(parse_bool("on"), Some(true));
        assert_eq!(parse_bool("Off"), Some(false));
        assert_eq!(parse_bool("maybe"), None);
    }
}
