#![forbid(unsafe_code)]

//! `kterm-core`: a single-header, embeddable VT/ANSI/VT52 terminal engine.
//!
//! This crate owns the escape-sequence state machine, the screen model
//! (grid, margins, scroll regions, alt screen), the deferred operation queue
//! that applies parsed commands to the grid, the concurrent input pipeline
//! and response sink a host drains for replies, the Gateway control-channel
//! protocol, and the Sixel/Kitty/DECDLD graphics sub-protocol parsers. It
//! does not render pixels, rasterize fonts, or own a window/input shell —
//! see the per-module docs for the exact boundary.
//!
//! # Primary responsibilities
//!
//! - **Grid**: 2D cell matrix representing the visible terminal viewport.
//! - **Cell**: character content + SGR attributes (colors, bold, italic, etc.).
//! - **Parser**: VT/ANSI/VT52 state machine (Paul Flo Williams model), emitting
//!   [`Action`]s that never touch the grid directly.
//! - **Dispatch**: turns parsed `Action`s into deferred [`Operation`]s plus the
//!   session-local side effects (modes, cursor, charsets, responses).
//! - **Ops**: the deferred operation queue and protected-cell-aware flush.
//! - **Cursor**: position, visibility, and origin/autowrap mode tracking.
//! - **Modes**: DEC private modes and ANSI standard modes.
//! - **Patch**: minimal diff / dirty-rect tracking between grid snapshots.
//! - **Scrollback**: ring buffer for lines scrolled off the top of the viewport.
//! - **Pipeline**: a bounded SPSC byte ring with watermark-driven backpressure.
//! - **Response**: the sink a host drains (or is called back on) for replies.
//! - **Gateway**: the DCS-wrapped out-of-band control channel.
//! - **Graphics**: Sixel, Kitty, and DECDLD soft-font sub-protocol parsers.
//! - **Session/Terminal**: ties the above into the programmatic API a host calls.
//!
//! # Design principles
//!
//! - **No I/O**: all types are pure data + logic; the host adapter supplies bytes.
//! - **Deterministic**: identical byte sequences always produce identical state.
//! - **`#![forbid(unsafe_code)]`**: safety enforced at compile time.

pub mod cell;
pub mod charset;
pub mod conformance;
pub mod cursor;
pub mod dispatch;
pub mod error;
pub mod gateway;
pub mod graphics;
pub mod grid;
pub mod input;
pub mod modes;
pub mod ops;
pub mod parser;
pub mod patch;
pub mod pipeline;
pub mod response;
pub mod scrollback;
pub mod selection;
pub mod session;

pub use cell::{Cell, CellFlags, Color, HyperlinkId, HyperlinkRegistry, SgrAttrs, SgrFlags};
pub use charset::{Charset, GraphicSlot, translate_charset};
pub use conformance::ConformanceLevel;
pub use cursor::{Cursor, SavedCursor, SingleShift};
pub use dispatch::{dispatch, DispatchOutcome};
pub use error::KTermError;
pub use gateway::{GatewayCommand, GatewayOutcome, GatewayVerb};
pub use graphics::{kitty::KittyState, sixel::SixelState, softfont::SoftFontState};
pub use grid::Grid;
pub use input::{InputEvent, InputKind, MouseButton};
pub use modes::{AnsiModes, DecModes, Modes};
pub use ops::{Operation, OpQueue, RowFlags};
pub use parser::{Action, Parser, StringKind, StringPayload};
pub use patch::{CellUpdate, ChangeRun, DirtySpan, DirtyTracker, GridDiff, Patch};
pub use pipeline::{Pipeline, WatermarkEvent};
pub use response::ResponseSink;
pub use scrollback::{Scrollback, ScrollbackLine, VirtualizedWindow};
pub use selection::{BufferPos, Selection};
pub use session::{Session, Terminal, TerminalConfig};
