//! Kitty graphics protocol parsing: `APC G ... ST` payloads.
//!
//! A command is `key=value` pairs, comma-separated, optionally followed by
//! `;` and a (possibly chunked, possibly base64) data payload. This module
//! only accumulates transfers and decodes payload bytes; placement and
//! rasterization belong to an outer shell.

#[cfg(feature = "tracing")]
use tracing::warn;

use base64::Engine;

/// Default cap on total bytes held across all open transfers before new
/// chunks are refused.
const DEFAULT_MEMORY_CAP: usize = 64 * 1024 * 1024;

/// The `a=` action key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KittyAction {
    Transmit,
    TransmitAndDisplay,
    Display,
    Delete,
    Query,
    Unknown,
}

impl KittyAction {
    fn from_str(s: &str) -> Self {
        match s {
            "t" => Self::Transmit,
            "T" => Self::TransmitAndDisplay,
            "p" => Self::Display,
            "d" => Self::Delete,
            "q" => Self::Query,
            _ => Self::Unknown,
        }
    }
}

/// One image transfer's control keys, parsed from the comma-separated
/// `key=value` control string.
#[derive(Debug, Clone, Default)]
pub struct KittyControl {
    pub action: Option<KittyAction>,
    pub image_id: Option<u32>,
    pub image_number: Option<u32>,
    pub placement_id: Option<u32>,
    pub format: Option<u32>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub more: bool,
    pub quiet: u8,
}

/// A single image transfer's accumulated bytes.
#[derive(Debug, Clone, Default)]
pub struct KittyFrame {
    pub format: u32,
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
    pub complete: bool,
}

/// Outcome of processing one `APC G ...` string, for the caller to act on
/// (emit a reply, schedule a placement, route a delete).
#[derive(Debug, Clone)]
pub enum KittyOutcome {
    /// Bytes appended to an in-progress transfer; more chunks expected.
    Chunk,
    /// A transfer finished; here is the assembled frame.
    Complete { id: u32, frame: KittyFrame },
    Delete { id: Option<u32> },
    Query { id: Option<u32> },
    /// Malformed control string or unmatched chunk continuation; discarded.
    Discarded,
}

/// Per-terminal Kitty graphics state: open transfers keyed by image id, and
/// the global memory budget they share.
#[derive(Debug, Clone)]
pub struct KittyState {
    frames: std::collections::HashMap<u32, KittyFrame>,
    current_id: Option<u32>,
    total_bytes: usize,
    cap_bytes: usize,
}

impl Default for KittyState {
    fn default() -> Self {
        Self::new()
    }
}

impl KittyState {
    pub fn new() -> Self {
        Self {
            frames: std::collections::HashMap::new(),
            current_id: None,
            total_bytes: 0,
            cap_bytes: DEFAULT_MEMORY_CAP,
        }
    }

    pub fn with_memory_cap(cap_bytes: usize) -> Self {
        Self { cap_bytes, ..Self::new() }
    }

    pub fn reset(&mut self) {
        let cap_bytes = self.cap_bytes;
        *self = Self::with_memory_cap(cap_bytes);
    }

    /// Process one full `APC G ... ST` body (without the `G` marker, which
    /// the dispatcher already stripped alongside the APC framing).
    pub fn feed(&mut self, body: &[u8]) -> KittyOutcome {
        let (control_bytes, payload) = match body.iter().position(|&b| b == b';') {
            Some(idx) => (&body[..idx], &body[idx + 1..]),
            None => (body, &body[0..0]),
        };
        let Ok(control_str) = std::str::from_utf8(control_bytes) else {
            return KittyOutcome::Discarded;
        };
        let control = parse_control(control_str);

        match control.action {
            Some(KittyAction::Delete) => return KittyOutcome::Delete { id: control.image_id },
            Some(KittyAction::Query) => return KittyOutcome::Query { id: control.image_id },
            _ => {}
        }

        let id = control.image_id.or(self.current_id).unwrap_or(0);
        if let Some(explicit) = control.image_id {
            if self.current_id.is_some_and(|cur| cur != explicit) && !self.frames.contains_key(&explicit) {
                #[cfg(feature = "tracing")]
                warn!(expected = self.current_id, got = explicit, "kitty chunk id mismatch, dropped");
                return KittyOutcome::Discarded;
            }
        } else if self.current_id.is_none() && control.more {
            #[cfg(feature = "tracing")]
            warn!("kitty continuation chunk with no open transfer, dropped");
            return KittyOutcome::Discarded;
        }

        let decoded = if control.format.unwrap_or(32) != 24 {
            match base64::engine::general_purpose::STANDARD.decode(payload) {
                Ok(bytes) => bytes,
                Err(_) => return KittyOutcome::Discarded,
            }
        } else {
            payload.to_vec()
        };

        if self.total_bytes + decoded.len() > self.cap_bytes {
            #[cfg(feature = "tracing")]
            warn!(cap = self.cap_bytes, "kitty graphics memory budget exceeded, chunk denied");
            self.frames.remove(&id);
            self.current_id = None;
            return KittyOutcome::Discarded;
        }

        let frame = self.frames.entry(id).or_insert_with(|| KittyFrame {
            format: control.format.unwrap_or(32),
            width: control.width.unwrap_or(0),
            height: control.height.unwrap_or(0),
            data: Vec::new(),
            complete: false,
        });
        self.total_bytes += decoded.len();
        frame.data.extend_from_slice(&decoded);

        if control.more {
            self.current_id = Some(id);
            KittyOutcome::Chunk
        } else {
            frame.complete = true;
            self.current_id = None;
            let frame = self.frames.remove(&id).unwrap_or_default();
            self.total_bytes = self.total_bytes.saturating_sub(frame.data.len());
            KittyOutcome::Complete { id, frame }
        }
    }

    #[must_use]
    pub fn total_bytes(&self) -> usize {
        self.total_bytes
    }

    #[must_use]
    pub fn open_transfer_count(&self) -> usize {
        self.frames.len()
    }
}

fn parse_control(s: &str) -> KittyControl {
    let mut control = KittyControl::default();
    for pair in s.split(',') {
        let Some((key, value)) = pair.split_once('=') else {
            continue;
        };
        match key {
            "a" => control.action = Some(KittyAction::from_str(value)),
            "i" => control.image_id = value.parse().ok(),
            "I" => control.image_number = value.parse().ok(),
            "p" => control.placement_id = value.parse().ok(),
            "f" => control.format = value.parse().ok(),
            "s" => control.width = value.parse().ok(),
            "v" => control.height = value.parse().ok(),
            "m" => control.more = value == "1",
            "q" => control.quiet = value.parse().unwrap_or(0),
            _ => {}
        }
    }
    control
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_chunk_transfer_completes_immediately() {
        let mut state = KittyState::new();
        let payload = base64::engine::general_purpose::STANDARD.encode(b"hello");
        let body = format!("a=T,f=32,s=1,v=1,i=7;{payload}");
        match state.feed(body.as_bytes()) {
            KittyOutcome::Complete { id, frame } => {
                assert_eq!(id, 7);
                assert_eq!(frame.data, b"hello");
            }
            other => panic!("expected Complete, got {other:?}"),
        }
        assert_eq!(state.open_transfer_count(), 0);
    }

    #[test]
    fn chunked_transfer_accumulates_across_calls() {
        let mut state = KittyState::new();
        let chunk1 = base64::engine::general_purpose::STANDARD.encode(b"ab");
        let chunk2 = base64::engine::general_purpose::STANDARD.encode(b"cd");
        assert!(matches!(state.feed(format!("a=t,i=1,m=1;{chunk1}").as_bytes()), KittyOutcome::Chunk));
        match state.feed(format!("i=1,m=0;{chunk2}").as_bytes()) {
            KittyOutcome::Complete { id, frame } => {
                assert_eq!(id, 1);
                assert_eq!(frame.data, b"abcd");
            }
            other => panic!("expected Complete, got {other:?}"),
        }
    }

    #[test]
    fn mismatched_continuation_id_is_discarded() {
        let mut state = KittyState::new();
        let chunk1 = base64::engine::general_purpose::STANDARD.encode(b"ab");
        assert!(matches!(state.feed(format!("a=t,i=1,m=1;{chunk1}").as_bytes()), KittyOutcome::Chunk));
        let chunk2 = base64::engine::general_purpose::STANDARD.encode(b"cd");
        assert!(matches!(
            state.feed(format!("i=2,m=0;{chunk2}").as_bytes()),
            KittyOutcome::Discarded
        ));
    }

    #[test]
    fn delete_action_is_routed_without_touching_frames() {
        let mut state = KittyState::new();
        assert!(matches!(state.feed(b"a=d,i=3"), KittyOutcome::Delete { id: Some(3) }));
    }

    #[test]
    fn memory_cap_denies_oversized_chunk() {
        let mut state = KittyState::with_memory_cap(4);
        let payload = base64::engine::general_purpose::STANDARD.encode(b"too much data");
        assert!(matches!(
            state.feed(format!("a=t,i=1;{payload}").as_bytes()),
            KittyOutcome::Discarded
        ));
    }
}
