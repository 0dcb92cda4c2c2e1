//! Response sink: where DSR/DA/DECRQSS/Gateway replies and other
//! host-bound bytes go. Two modes:
//!
//! - **Buffered**: replies accumulate in a bounded `Vec<u8>` that the host
//!   drains explicitly (polling model).
//! - **Sink**: replies are pushed immediately through a host-supplied
//!   callback (push model, e.g. writing straight back to a PTY master).
//!
//! Both modes are binary-safe — a reply can contain NUL or any other byte,
//! since Kitty/Sixel/Gateway payloads round-trip through here too.

#[cfg(feature = "tracing")]
use tracing::warn;

/// Default cap on the buffered-mode queue, in bytes, before new replies are
/// dropped (oldest-kept, newest-dropped — a confused host that never drains
/// responses should lose its most recent queries, not its identification
/// reply).
const DEFAULT_BUFFER_CAP: usize = 64 * 1024;

enum Mode {
    Buffered { queue: Vec<u8>, cap: usize },
    Sink { callback: Box<dyn FnMut(&[u8]) + Send> },
}

/// The channel through which the core writes bytes back to the host:
/// query replies, Gateway responses, and any other "terminal talks first"
/// output.
pub struct ResponseSink {
    mode: Mode,
}

impl std::fmt::Debug for ResponseSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.mode {
            Mode::Buffered { queue, cap } => f
                .debug_struct("ResponseSink::Buffered")
                .field("queued", &queue.len())
                .field("cap", cap)
                .finish(),
            Mode::Sink { .. } => f.debug_struct("ResponseSink::Sink").finish(),
        }
    }
}

impl Default for ResponseSink {
    fn default() -> Self {
        Self::buffered(DEFAULT_BUFFER_CAP)
    }
}

impl ResponseSink {
    /// A buffered sink with the given byte capacity.
    pub fn buffered(cap: usize) -> Self {
        Self {
            mode: Mode::Buffered { queue: Vec::new(), cap },
        }
    }

    /// A push-mode sink that calls `callback` immediately for every write.
    pub fn with_callback(callback: impl FnMut(&[u8]) + Send + 'static) -> Self {
        Self {
            mode: Mode::Sink { callback: Box::new(callback) },
        }
    }

    /// Write bytes to the sink: buffered mode appends (dropping the write
    /// entirely if it would exceed capacity); sink mode invokes the
    /// callback synchronously.
    pub fn write(&mut self, bytes: &[u8]) {
        match &mut self.mode {
            Mode::Buffered { queue, cap } => {
                if queue.len() + bytes.len() > *cap {
                    #[cfg(feature = "tracing")]
                    warn!(capacity = *cap, "response sink overflow, dropping reply");
                    return;
                }
                queue.extend_from_slice(bytes);
            }
            Mode::Sink { callback } => callback(bytes),
        }
    }

    /// Write a `&str` reply (the common case: CSI/DCS/OSC textual replies).
    pub fn write_str(&mut self, s: &str) {
        self.write(s.as_bytes());
    }

    /// Drain and return everything queued in buffered mode. Returns an empty
    /// `Vec` for sink mode (there is nothing to drain — bytes already went
    /// to the callback).
    pub fn drain(&mut self) -> Vec<u8> {
        match &mut self.mode {
            Mode::Buffered { queue, .. } => std::mem::take(queue),
            Mode::Sink { .. } => Vec::new(),
        }
    }

    /// Bytes currently queued (buffered mode only; always 0 in sink mode).
    #[must_use]
    pub fn queued_len(&self) -> usize {
        match &self.mode {
            Mode::Buffered { queue, .. } => queue.len(),
            Mode::Sink { .. } => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn buffered_write_and_drain() {
        let mut sink = ResponseSink::buffered(1024);
        sink.write_str("\x1b[?1;2c");
        assert_eq!(sink.queued_len(), 7);
        let drained = sink.drain();
        assert_eq!(drained, b"\x1b[?1;2c");
        assert_eq!(sink.queued_len(), 0);
    }

    #[test]
    fn buffered_overflow_drops_write() {
        let mut sink = ResponseSink::buffered(4);
        sink.write(b"12345");
        assert_eq!(sink.queued_len(), 0);
        sink.write(b"ab");
        assert_eq!(sink.queued_len(), 2);
    }

    #[test]
    fn binary_safe_with_nul_bytes() {
        let mut sink = ResponseSink::buffered(16);
        sink.write(&[0, 1, 0, 2]);
        assert_eq!(sink.drain(), vec![0, 1, 0, 2]);
    }

    #[test]
    fn callback_mode_invokes_immediately() {
        let received = Arc::new(Mutex::new(Vec::new()));
        let received_clone = received.clone();
        let mut sink = ResponseSink::with_callback(move |bytes| {
            received_clone.lock().unwrap().extend_from_slice(bytes);
        });
        sink.write(b"ping");
        assert_eq!(*received.lock().unwrap(), b"ping");
        assert_eq!(sink.drain(), Vec::<u8>::new());
    }
}
