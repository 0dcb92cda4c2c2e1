//! Single-producer/single-consumer byte ring buffer: the host's write path
//! feeds raw bytes in; the parser drains them on its own schedule. Backed by
//! a power-of-two capacity ring so index arithmetic is a mask, not a modulo.
//!
//! This is the input side of the crate's concurrency model: one writer
//! thread (the host, e.g. a PTY reader), one reader thread (this session's
//! parse/dispatch loop). Neither side blocks; overflow drops the newest
//! bytes and raises a one-shot warning rather than growing unbounded.

#[cfg(feature = "tracing")]
use tracing::warn;

/// High/low occupancy watermarks (as a fraction of capacity) at which
/// [`Pipeline::watermark_event`] reports a transition, driving DECXRLM
/// XON/XOFF synthesis in the dispatcher.
const HIGH_WATERMARK_NUM: usize = 9;
const HIGH_WATERMARK_DEN: usize = 10;
const LOW_WATERMARK_NUM: usize = 1;
const LOW_WATERMARK_DEN: usize = 10;

/// A watermark crossing the pipeline observed on the most recent [`Pipeline::push`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatermarkEvent {
    /// Occupancy rose above the high watermark: synthesize XOFF.
    CrossedHigh,
    /// Occupancy fell back below the low watermark: synthesize XON.
    CrossedLow,
    /// No watermark transition since the last observation.
    None,
}

/// SPSC byte ring buffer with backpressure watermarks.
#[derive(Debug, Clone)]
pub struct Pipeline {
    buf: Vec<u8>,
    mask: usize,
    head: usize, // next read position
    tail: usize, // next write position
    len: usize,
    was_above_high: bool,
    dropped_total: u64,
}

impl Pipeline {
    /// Create a pipeline with at least `capacity` bytes of room, rounded up
    /// to the next power of two (minimum 64).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(64).next_power_of_two();
        Self {
            buf: vec![0u8; capacity],
            mask: capacity - 1,
            head: 0,
            tail: 0,
            len: 0,
            was_above_high: false,
            dropped_total: 0,
        }
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[must_use]
    pub fn is_full(&self) -> bool {
        self.len == self.buf.len()
    }

    /// Total bytes dropped over this pipeline's lifetime due to overflow.
    #[must_use]
    pub fn dropped_total(&self) -> u64 {
        self.dropped_total
    }

    /// Push as many bytes from `data` as fit; bytes beyond capacity are
    /// dropped (newest-dropped policy: the pipeline never overwrites bytes
    /// already queued) and counted in [`Self::dropped_total`]. Returns the
    /// watermark transition this call caused, if any.
    #[allow(unused_variables)]
    pub fn push(&mut self, data: &[u8]) -> WatermarkEvent {
        let room = self.buf.len() - self.len;
        let to_copy = data.len().min(room);
        let dropped = data.len() - to_copy;
        if dropped > 0 {
            self.dropped_total += dropped as u64;
            #[cfg(feature = "tracing")]
            warn!(dropped, capacity = self.buf.len(), "pipeline overflow, dropping newest bytes");
        }

        for &byte in &data[..to_copy] {
            self.buf[self.tail] = byte;
            self.tail = (self.tail + 1) & self.mask;
        }
        self.len += to_copy;

        self.watermark_transition()
    }

    /// Drain up to `out.len()` bytes into `out`, returning the count copied.
    pub fn drain(&mut self, out: &mut [u8]) -> usize {
        let to_copy = out.len().min(self.len);
        for slot in out.iter_mut().take(to_copy) {
            *slot = self.buf[self.head];
            self.head = (self.head + 1) & self.mask;
        }
        self.len -= to_copy;
        to_copy
    }

    /// Drain everything currently queued into a fresh `Vec`.
    pub fn drain_all(&mut self) -> Vec<u8> {
        let mut out = vec![0u8; self.len];
        let copied = self.drain(&mut out);
        debug_assert_eq!(copied, out.len());
        out
    }

    /// Re-check the occupancy watermark without pushing or draining —
    /// used after a [`Self::drain`]/[`Self::drain_all`] call to detect a
    /// low-watermark crossing the consumer side caused.
    pub fn watermark_transition(&mut self) -> WatermarkEvent {
        let cap = self.buf.len();
        let above_high = self.len * HIGH_WATERMARK_DEN >= cap * HIGH_WATERMARK_NUM;
        let below_low = self.len * LOW_WATERMARK_DEN <= cap * LOW_WATERMARK_NUM;

        if above_high && !self.was_above_high {
            self.was_above_high = true;
            WatermarkEvent::CrossedHigh
        } else if below_low && self.was_above_high {
            self.was_above_high = false;
            WatermarkEvent::CrossedLow
        } else {
            WatermarkEvent::None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_push_drain() {
        let mut p = Pipeline::new(64);
        p.push(b"hello");
        let mut out = [0u8; 5];
        let n = p.drain(&mut out);
        assert_eq!(n, 5);
        assert_eq!(&out, b"hello");
        assert!(p.is_empty());
    }

    #[test]
    fn capacity_rounds_up_to_power_of_two() {
        let p = Pipeline::new(100);
        assert_eq!(p.capacity(), 128);
    }

    #[test]
    fn overflow_drops_newest_bytes() {
        let mut p = Pipeline::new(64);
        let data = vec![1u8; 200];
        p.push(&data);
        assert_eq!(p.len(), 64);
        assert_eq!(p.dropped_total(), 200 - 64);
    }

    #[test]
    fn wraparound_preserves_order() {
        let mut p = Pipeline::new(64);
        p.push(&[1, 2, 3, 4]);
        let mut out = [0u8; 2];
        p.drain(&mut out);
        p.push(&[5, 6, 7, 8]);
        let drained = p.drain_all();
        assert_eq!(drained, vec![3, 4, 5, 6, 7, 8]);
    }

    #[test]
    fn high_watermark_fires_once() {
        let mut p = Pipeline::new(64);
        let ev1 = p.push(&vec![0u8; 60]);
        assert_eq!(ev1, WatermarkEvent::CrossedHigh);
        let ev2 = p.push(&[0u8; 1]);
        assert_eq!(ev2, WatermarkEvent::None);
    }

    #[test]
    fn low_watermark_fires_after_drain() {
        let mut p = Pipeline::new(64);
        p.push(&vec![0u8; 60]);
        let mut out = vec![0u8; 55];
        p.drain(&mut out);
        let ev = p.watermark_transition();
        assert_eq!(ev, WatermarkEvent::CrossedLow);
    }
}
