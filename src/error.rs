//! Error types for contract violations and fatal conditions.
//!
//! Recoverable protocol errors and resource-exhaustion events are *not*
//! modeled here — those are silently-recovering state transitions plus a
//! `tracing` event (see `session` and `pipeline`). `KTermError` covers only
//! the two kinds of error that should surface to the caller as a
//! `Result::Err`: contract violations the host made, and fatal allocation
//! failures.

use std::fmt;

/// Errors returned by `kterm-core`'s public, fallible entry points.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KTermError {
    /// A session index was used that does not refer to a live session.
    UnknownSession { session: u32 },
    /// `Terminal::create` was called when the configured session bound was
    /// already reached.
    SessionLimitReached { limit: u32 },
    /// A requested grid size is degenerate (zero rows or columns) or
    /// otherwise cannot be allocated.
    InvalidDimensions { cols: u16, rows: u16 },
    /// Memory allocation for a grid/scrollback/graphics buffer failed.
    OutOfMemory { requested_bytes: usize },
    /// A Gateway command referenced a session that does not exist.
    GatewayUnknownSession { id: String },
    /// A Gateway command's verb is recognized but its grammar is malformed.
    GatewayMalformedCommand { reason: String },
}

impl fmt::Display for KTermError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KTermError::UnknownSession { session } => {
                write!(f, "no session with index {session}")
            }
            KTermError::SessionLimitReached { limit } => {
                write!(f, "session limit of {limit} already reached")
            }
            KTermError::InvalidDimensions { cols, rows } => {
                write!(f, "invalid grid dimensions {cols}x{rows}")
            }
            KTermError::OutOfMemory { requested_bytes } => {
                write!(f, "allocation of {requested_bytes} bytes failed")
            }
            KTermError::GatewayUnknownSession { id } => {
                write!(f, "gateway command referenced unknown session '{id}'")
            }
            KTermError::GatewayMalformedCommand { reason } => {
                write!(f, "malformed gateway command: {reason}")
            }
        }
    }
}

impl std::error::Error for KTermError {}
