//! Session/Terminal: the programmatic API a host embeds against.
//!
//! A [`Terminal`] owns a small, bounded vector of [`Session`] values; a
//! session never holds a reference back to its terminal (or to sibling
//! sessions) — Gateway routing that targets another session addresses it
//! by index through [`Terminal`], never by pointer, so sessions stay plain
//! values a host can move, snapshot, or drop independently.

use crate::cell::HyperlinkRegistry;
use crate::conformance::ConformanceLevel;
use crate::cursor::{Cursor, SavedCursor};
use crate::dispatch::{dispatch, DispatchOutcome};
use crate::error::KTermError;
use crate::gateway::{GatewayCommand, GatewaySettings, GatewayState};
use crate::graphics::{kitty::KittyState, sixel::SixelState, softfont::SoftFontState};
use crate::grid::Grid;
use crate::input::InputEvent;
use crate::ops::{OpQueue, RowFlags};
use crate::parser::Parser;
use crate::patch::DirtyTracker;
use crate::pipeline::Pipeline;
use crate::response::ResponseSink;
use crate::scrollback::Scrollback;

/// Host-tunable parameters for [`Terminal::create`]. Every field has a
/// VT100-compatible default; a host that only cares about conformance
/// level can use `TerminalConfig { level, ..Default::default() }`.
#[derive(Debug, Clone, PartialEq)]
pub struct TerminalConfig {
    pub cols: u16,
    pub rows: u16,
    pub level: ConformanceLevel,
    /// Upper bound on how many sessions a single `Terminal` may hold.
    pub max_sessions: u32,
    pub scrollback_capacity: usize,
    pub pipeline_capacity: usize,
    /// Buffered response-sink capacity in bytes; ignored once a host calls
    /// `Session::set_output_sink` to switch a session into push mode.
    pub response_buffer_capacity: usize,
}

impl Default for TerminalConfig {
    fn default() -> Self {
        Self {
            cols: 80,
            rows: 24,
            level: ConformanceLevel::default(),
            max_sessions: 4,
            scrollback_capacity: 2000,
            pipeline_capacity: 64 * 1024,
            response_buffer_capacity: 64 * 1024,
        }
    }
}

/// One terminal screen: primary + alternate grid, cursor and mode state,
/// the parser feeding it, and the graphics/gateway sub-protocol state that
/// hangs off a single screen rather than the whole `Terminal`.
pub struct Session {
    pub grid: Grid,
    pub alt_grid: Grid,
    pub using_alt_screen: bool,
    pub cursor: Cursor,
    pub saved_cursor: SavedCursor,
    /// `XTPUSHSGR`/`XTPOPSGR` rendition stack; bounded (xterm caps it at 10)
    /// since it's attacker-controlled depth, not a cursor-save slot.
    pub sgr_stack: Vec<crate::cell::SgrAttrs>,
    pub modes: crate::modes::Modes,
    pub scrollback: Scrollback,
    pub line_flags: Vec<RowFlags>,
    pub ops: OpQueue,
    pub tracker: DirtyTracker,
    pub parser: Parser,
    pub response: ResponseSink,
    pub pipeline: Pipeline,
    pub gateway: GatewayState,
    pub level: ConformanceLevel,
    pub hyperlinks: HyperlinkRegistry,
    pub current_hyperlink: crate::cell::HyperlinkId,
    pub pending_hyperlinks: Vec<(u16, u16, crate::cell::HyperlinkId)>,
    pub protected_pen: bool,
    pub pending_protected: Vec<(u16, u16)>,
    pub sixel: SixelState,
    pub kitty: KittyState,
    pub softfont: SoftFontState,
    pub last_char: Option<char>,
    /// Position of the last non-combining cell printed by [`dispatch_print`](crate::dispatch),
    /// so a following zero-width combining mark can attach to it rather than
    /// silently drop.
    pub last_print_pos: Option<(u16, u16)>,
    pub cols: u16,
    pub rows: u16,
    pub title: String,
    pub icon_title: String,
    pub cursor_shape: u16,
    pub font: Option<String>,
    /// `DECUDK` programmable function keys: key number -> the literal byte
    /// sequence the key transmits. `udk_locked` mirrors the DCS `Plock`
    /// parameter (locked keys can't be redefined without first clearing).
    pub udk: std::collections::BTreeMap<u16, Vec<u8>>,
    pub udk_locked: bool,
    pub gateway_settings: GatewaySettings,
    /// Free-form `SET;OUTPUT;...` value, reported back verbatim by `GET;OUTPUT`.
    pub gateway_output: String,
    pub gateway_debug: bool,
}

impl Session {
    fn new(cols: u16, rows: u16, level: ConformanceLevel, scrollback_capacity: usize, pipeline_capacity: usize) -> Self {
        Self {
            grid: Grid::new(cols, rows),
            alt_grid: Grid::new(cols, rows),
            using_alt_screen: false,
            cursor: Cursor::new(cols, rows),
            saved_cursor: SavedCursor::default(),
            sgr_stack: Vec::new(),
            modes: level.default_modes(),
            scrollback: Scrollback::new(scrollback_capacity),
            line_flags: vec![RowFlags::default(); rows as usize],
            ops: OpQueue::new(),
            tracker: DirtyTracker::new(cols, rows),
            parser: Parser::new(),
            response: ResponseSink::buffered(64 * 1024),
            pipeline: Pipeline::new(pipeline_capacity),
            gateway: GatewayState::default(),
            level,
            hyperlinks: HyperlinkRegistry::new(),
            current_hyperlink: 0,
            pending_hyperlinks: Vec::new(),
            protected_pen: false,
            pending_protected: Vec::new(),
            sixel: SixelState::new(),
            kitty: KittyState::new(),
            softfont: SoftFontState::new(),
            last_char: None,
            last_print_pos: None,
            cols,
            rows,
            title: String::new(),
            icon_title: String::new(),
            cursor_shape: 0,
            font: None,
            udk: std::collections::BTreeMap::new(),
            udk_locked: false,
            gateway_settings: GatewaySettings::default(),
            gateway_output: String::new(),
            gateway_debug: false,
        }
    }

    /// Feed raw application bytes through the input pipeline, then the
    /// parser and the dispatcher. Returns every Gateway command delegated
    /// to a non-`KTERM` class, in the order their owning control sequences
    /// were parsed.
    ///
    /// Bytes are pushed into [`Self::pipeline`] (so overflow and `DECXRLM`
    /// backpressure observe real occupancy) and then drained in full before
    /// parsing, since this core has no separate frame boundary between
    /// `write` and `update` for the byte-consumption step — only grid
    /// mutation is deferred to `flush_ops`.
    pub fn write(&mut self, bytes: &[u8]) -> Vec<GatewayCommand> {
        let push_event = self.pipeline.push(bytes);
        self.emit_watermark_event(push_event);

        let queued = self.pipeline.drain_all();
        let drain_event = self.pipeline.watermark_transition();
        self.emit_watermark_event(drain_event);

        let actions = self.parser.feed(&queued);
        let mut delegated = Vec::new();
        for action in actions {
            let DispatchOutcome { gateway_delegated, .. } = dispatch(action, self);
            if let Some(cmd) = gateway_delegated {
                delegated.push(cmd);
            }
        }
        delegated
    }

    /// Synthesize XOFF/XON into the response sink for a pipeline watermark
    /// crossing, gated on `DECXRLM` (mode 88).
    fn emit_watermark_event(&mut self, event: crate::pipeline::WatermarkEvent) {
        if !self.modes.xmit_rate_limit() {
            return;
        }
        match event {
            crate::pipeline::WatermarkEvent::CrossedHigh => self.response.write(&[0x13]),
            crate::pipeline::WatermarkEvent::CrossedLow => self.response.write(&[0x11]),
            crate::pipeline::WatermarkEvent::None => {}
        }
    }

    /// Encode a host input event against this session's current modes and
    /// queue the bytes for the connected application to receive, honoring
    /// `DECXRLM` backpressure via the pipeline's watermark.
    pub fn push_input_event(&mut self, event: &InputEvent) -> crate::pipeline::WatermarkEvent {
        let bytes = crate::input::encode(event, &self.modes);
        self.pipeline.push(&bytes)
    }

    /// Apply every operation enqueued by `write` since the last flush,
    /// then run the deferred hyperlink/protection cell stamping that
    /// `Operation::Write` itself doesn't carry.
    pub fn flush_ops(&mut self) {
        self.ops.flush(&mut self.grid, &mut self.line_flags, &mut self.tracker);
        for (row, col, id) in self.pending_hyperlinks.drain(..) {
            if let Some(cell) = self.grid.cell_mut(row, col) {
                cell.hyperlink = id;
            }
        }
        for (row, col) in self.pending_protected.drain(..) {
            if let Some(cell) = self.grid.cell_mut(row, col) {
                cell.set_protected(true);
            }
        }
    }

    /// Drain bytes queued in the response sink (buffered mode only; a
    /// session switched to callback mode via `set_output_sink` always
    /// drains empty, since its bytes already went straight to the host).
    pub fn drain_response(&mut self) -> Vec<u8> {
        self.response.drain()
    }

    /// Switch this session's response sink into push mode: `callback` is
    /// invoked synchronously, in place of buffering, for every reply byte.
    pub fn set_output_sink(&mut self, callback: impl FnMut(&[u8]) + Send + 'static) {
        self.response = ResponseSink::with_callback(callback);
    }

    /// Resize the session's grids, cursor, and tab stops, reflowing the
    /// primary screen through scrollback (the alternate screen simply
    /// truncates/extends per xterm).
    pub fn resize(&mut self, cols: u16, rows: u16) -> Result<(), KTermError> {
        if cols == 0 || rows == 0 {
            return Err(KTermError::InvalidDimensions { cols, rows });
        }
        let cursor_row = self.cursor.row;
        let new_row = self.grid.resize_with_scrollback(cols, rows, cursor_row, &mut self.scrollback);
        self.alt_grid.resize(cols, rows);
        self.cursor.resize(cols, rows);
        self.cursor.row = new_row.min(rows.saturating_sub(1));
        self.line_flags.resize(rows as usize, RowFlags::default());
        self.tracker.resize(cols, rows);
        self.cols = cols;
        self.rows = rows;
        Ok(())
    }

    /// Change this session's conformance level, resetting its mode
    /// register to that level's power-on defaults (matches the effect of
    /// a Gateway `SET;LEVEL` command or a host-level `CSI > level` hint).
    pub fn set_level(&mut self, level: ConformanceLevel) {
        self.level = level;
        self.modes = level.default_modes();
    }
}

/// Owns a bounded collection of [`Session`]s and the Gateway callback a
/// host installs for commands addressed to a class other than `KTERM`.
pub struct Terminal {
    sessions: Vec<Session>,
    active: usize,
    config: TerminalConfig,
    gateway_callback: Option<Box<dyn FnMut(GatewayCommand) + Send>>,
}

impl Terminal {
    /// Create a terminal with one initial session at `config`'s defaults.
    pub fn create(config: TerminalConfig) -> Result<Self, KTermError> {
        if config.cols == 0 || config.rows == 0 {
            return Err(KTermError::InvalidDimensions { cols: config.cols, rows: config.rows });
        }
        let session = Session::new(
            config.cols,
            config.rows,
            config.level,
            config.scrollback_capacity,
            config.pipeline_capacity,
        );
        Ok(Self { sessions: vec![session], active: 0, config, gateway_callback: None })
    }

    /// Add a new session at the terminal's configured dimensions/level,
    /// returning its index. Fails once `config.max_sessions` is reached.
    pub fn add_session(&mut self) -> Result<u32, KTermError> {
        if self.sessions.len() as u32 >= self.config.max_sessions {
            return Err(KTermError::SessionLimitReached { limit: self.config.max_sessions });
        }
        let session = Session::new(
            self.config.cols,
            self.config.rows,
            self.config.level,
            self.config.scrollback_capacity,
            self.config.pipeline_capacity,
        );
        self.sessions.push(session);
        Ok((self.sessions.len() - 1) as u32)
    }

    /// Drop a session by index. The active session index, if it pointed
    /// past the removed one, is clamped back onto a surviving session.
    pub fn destroy_session(&mut self, session: u32) -> Result<(), KTermError> {
        let idx = session as usize;
        if idx >= self.sessions.len() {
            return Err(KTermError::UnknownSession { session });
        }
        self.sessions.remove(idx);
        if self.sessions.is_empty() {
            self.active = 0;
        } else {
            self.active = self.active.min(self.sessions.len() - 1);
        }
        Ok(())
    }

    fn session_mut(&mut self, session: u32) -> Result<&mut Session, KTermError> {
        self.sessions.get_mut(session as usize).ok_or(KTermError::UnknownSession { session })
    }

    fn session(&self, session: u32) -> Result<&Session, KTermError> {
        self.sessions.get(session as usize).ok_or(KTermError::UnknownSession { session })
    }

    /// Feed bytes to `session`, routing any non-`KTERM` Gateway command
    /// through the installed callback (if any) rather than returning it.
    pub fn write(&mut self, session: u32, bytes: &[u8]) -> Result<(), KTermError> {
        let delegated = self.session_mut(session)?.write(bytes);
        for cmd in delegated {
            if let Some(callback) = &mut self.gateway_callback {
                callback(cmd);
            }
        }
        Ok(())
    }

    pub fn push_input_event(&mut self, session: u32, event: &InputEvent) -> Result<(), KTermError> {
        self.session_mut(session)?.push_input_event(event);
        Ok(())
    }

    /// Flush every session's operation queue. A host calls this once per
    /// frame/tick, after however many `write`/`push_input_event` calls it
    /// made since the last `update`.
    pub fn update(&mut self) {
        for session in &mut self.sessions {
            session.flush_ops();
        }
    }

    pub fn flush_ops(&mut self, session: u32) -> Result<(), KTermError> {
        self.session_mut(session)?.flush_ops();
        Ok(())
    }

    pub fn drain_response(&mut self, session: u32) -> Result<Vec<u8>, KTermError> {
        Ok(self.session_mut(session)?.drain_response())
    }

    pub fn set_output_sink(
        &mut self,
        session: u32,
        callback: impl FnMut(&[u8]) + Send + 'static,
    ) -> Result<(), KTermError> {
        self.session_mut(session)?.set_output_sink(callback);
        Ok(())
    }

    /// Resize every session to the new dimensions (a host's window resize
    /// applies uniformly; per-session `DECCOLM` switches are handled
    /// inside `dispatch` instead and don't go through this entry point).
    pub fn resize(&mut self, cols: u16, rows: u16) -> Result<(), KTermError> {
        if cols == 0 || rows == 0 {
            return Err(KTermError::InvalidDimensions { cols, rows });
        }
        self.config.cols = cols;
        self.config.rows = rows;
        for session in &mut self.sessions {
            session.resize(cols, rows)?;
        }
        Ok(())
    }

    pub fn set_level(&mut self, session: u32, level: ConformanceLevel) -> Result<(), KTermError> {
        self.session_mut(session)?.set_level(level);
        Ok(())
    }

    /// `Gateway SET;FONT` equivalent invoked directly by the host rather
    /// than over the control channel.
    pub fn set_font(&mut self, session: u32, name: &str) -> Result<(), KTermError> {
        self.session_mut(session)?.font = Some(name.to_string());
        Ok(())
    }

    /// Install the callback invoked for every Gateway command addressed to
    /// a class other than `KTERM` (the delegated-to-host outcome).
    pub fn set_gateway_callback(&mut self, callback: impl FnMut(GatewayCommand) + Send + 'static) {
        self.gateway_callback = Some(Box::new(callback));
    }

    /// Read-only accessor for a session's grid, cursor, and dimensions —
    /// the query half of the programmatic API, returned as a borrow rather
    /// than a copied snapshot since a host typically just wants to read
    /// cell content for the current frame.
    pub fn query(&self, session: u32) -> Result<&Session, KTermError> {
        self.session(session)
    }

    #[must_use]
    pub fn active_session(&self) -> u32 {
        self.active as u32
    }

    pub fn set_active_session(&mut self, session: u32) -> Result<(), KTermError> {
        if session as usize >= self.sessions.len() {
            return Err(KTermError::UnknownSession { session });
        }
        self.active = session as usize;
        Ok(())
    }

    #[must_use]
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }
}

/// Tear down a terminal. Plain-data types need no explicit destructor, but
/// this mirrors a `create`/`destroy` pairing so a host ported from a
/// C-shaped API has a direct call to make.
pub fn destroy(_terminal: Terminal) {}
