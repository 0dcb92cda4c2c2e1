//! Terminal cell: the fundamental unit of the grid.
//!
//! Each cell stores a character (or grapheme cluster) and its SGR attributes.
//! This is intentionally simpler than `ftui-render::Cell` — it models the
//! terminal's internal state rather than the rendering pipeline.

use bitflags::bitflags;
use std::collections::HashMap;
use unicode_width::UnicodeWidthChar;

bitflags! {
    /// SGR text attribute flags.
    ///
    /// Maps directly to the ECMA-48 / VT100 SGR parameter values.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct SgrFlags: u16 {
        const BOLD          = 1 << 0;
        const DIM           = 1 << 1;
        const ITALIC        = 1 << 2;
        const UNDERLINE     = 1 << 3;
        const BLINK         = 1 << 4;
        const INVERSE       = 1 << 5;
        const HIDDEN        = 1 << 6;
        const STRIKETHROUGH = 1 << 7;
        const DOUBLE_UNDERLINE = 1 << 8;
        const CURLY_UNDERLINE  = 1 << 9;
        const OVERLINE      = 1 << 10;
    }
}

bitflags! {
    /// Cell-level flags that are orthogonal to SGR attributes.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct CellFlags: u8 {
        /// This cell is the leading (left) cell of a wide (2-column) character.
        const WIDE_CHAR = 1 << 0;
        /// This cell is the trailing (right) continuation of a wide character.
        /// Its content is meaningless; rendering uses the leading cell.
        const WIDE_CONTINUATION = 1 << 1;
        /// Selective erase (DECSCA) protects this cell from DECSED/DECSEL/DECSERA.
        const PROTECTED = 1 << 2;
        /// This cell's base character has one or more zero-width combining
        /// marks attached to it (see [`Cell::push_combining`]); the marks
        /// render as part of this cell's grapheme rather than advancing the
        /// cursor or occupying a column of their own.
        const COMBINING = 1 << 3;
    }
}

/// Color representation for terminal cells.
///
/// Supports the standard terminal color model hierarchy:
/// default → 16 named → 256 indexed → 24-bit RGB.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Color {
    /// Terminal default (SGR 39 / SGR 49).
    #[default]
    Default,
    /// Named color index (0-15): standard 8 + bright 8.
    Named(u8),
    /// 256-color palette index (0-255).
    Indexed(u8),
    /// 24-bit true color.
    Rgb(u8, u8, u8),
}

/// SGR attributes for a cell: flags + foreground/background colors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct SgrAttrs {
    pub flags: SgrFlags,
    pub fg: Color,
    pub bg: Color,
    /// Underline color (SGR 58). `None` means use foreground.
    pub underline_color: Option<Color>,
    /// Strikethrough color. Not an ECMA-48 parameter; xterm has none, but the
    /// dispatcher accepts a non-standard `SGR 58`-shaped override for strike
    /// color when a host negotiates it. `None` means use foreground.
    pub strike_color: Option<Color>,
}

impl SgrAttrs {
    /// Reset all attributes to default (SGR 0).
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Apply one `CSI m` call's worth of parameters.
    ///
    /// Accepts both the legacy semicolon-separated extended color form
    /// (`38;5;Pn` / `38;2;Pr;Pg;Pb`, consuming following top-level params)
    /// and the ITU colon-subparameter form (`38:5:Pn`, `38:2::Pr:Pg:Pb`,
    /// with the components folded into [`SgrParam::sub`]). Unknown codes
    /// are ignored without aborting the remaining params in the list.
    pub fn apply_sgr_params(&mut self, params: &[SgrParam]) {
        if params.is_empty() {
            self.reset();
            return;
        }
        let mut i = 0;
        while i < params.len() {
            let p = &params[i];
            match p.value {
                0 => self.reset(),
                1 => self.flags.insert(SgrFlags::BOLD),
                2 => self.flags.insert(SgrFlags::DIM),
                3 => self.flags.insert(SgrFlags::ITALIC),
                4 => {
                    // Colon subparam selects underline style (4:0 none, 4:1
                    // single, 4:2 double, 4:3 curly); bare `4` is single.
                    match p.sub.first() {
                        Some(0) => {
                            self.flags.remove(SgrFlags::UNDERLINE);
                            self.flags.remove(SgrFlags::DOUBLE_UNDERLINE);
                            self.flags.remove(SgrFlags::CURLY_UNDERLINE);
                        }
                        Some(2) => self.flags.insert(SgrFlags::DOUBLE_UNDERLINE),
                        Some(3) => self.flags.insert(SgrFlags::CURLY_UNDERLINE),
                        _ => self.flags.insert(SgrFlags::UNDERLINE),
                    }
                }
                5 => self.flags.insert(SgrFlags::BLINK),
                6 => self.flags.insert(SgrFlags::BLINK),
                7 => self.flags.insert(SgrFlags::INVERSE),
                8 => self.flags.insert(SgrFlags::HIDDEN),
                9 => self.flags.insert(SgrFlags::STRIKETHROUGH),
                21 => self.flags.insert(SgrFlags::DOUBLE_UNDERLINE),
                22 => {
                    self.flags.remove(SgrFlags::BOLD);
                    self.flags.remove(SgrFlags::DIM);
                }
                23 => self.flags.remove(SgrFlags::ITALIC),
                24 => {
                    self.flags.remove(SgrFlags::UNDERLINE);
                    self.flags.remove(SgrFlags::DOUBLE_UNDERLINE);
                    self.flags.remove(SgrFlags::CURLY_UNDERLINE);
                }
                25 => self.flags.remove(SgrFlags::BLINK),
                27 => self.flags.remove(SgrFlags::INVERSE),
                28 => self.flags.remove(SgrFlags::HIDDEN),
                29 => self.flags.remove(SgrFlags::STRIKETHROUGH),
                30..=37 => self.fg = Color::Named(p.value as u8 - 30),
                38 => {
                    let (color, consumed) = parse_extended_color(p, &params[i + 1..]);
                    if let Some(color) = color {
                        self.fg = color;
                    }
                    i += consumed;
                }
                39 => self.fg = Color::Default,
                40..=47 => self.bg = Color::Named(p.value as u8 - 40),
                48 => {
                    let (color, consumed) = parse_extended_color(p, &params[i + 1..]);
                    if let Some(color) = color {
                        self.bg = color;
                    }
                    i += consumed;
                }
                49 => self.bg = Color::Default,
                53 => self.flags.insert(SgrFlags::OVERLINE),
                55 => self.flags.remove(SgrFlags::OVERLINE),
                58 => {
                    let (color, consumed) = parse_extended_color(p, &params[i + 1..]);
                    self.underline_color = color;
                    i += consumed;
                }
                59 => self.underline_color = None,
                90..=97 => self.fg = Color::Named(p.value as u8 - 90 + 8),
                100..=107 => self.bg = Color::Named(p.value as u8 - 100 + 8),
                _ => {}
            }
            i += 1;
        }
    }
}

/// Parse an extended-color SGR sub-sequence (`38`/`48`/`58`) in either the
/// colon (subparams already attached to `p`) or legacy semicolon (trailing
/// top-level params in `rest`) form.
///
/// Returns the resolved color (if any) and the number of *additional*
/// top-level params consumed from `rest` (0 for the colon form, since those
/// live in `p.sub`).
fn parse_extended_color(p: &SgrParam, rest: &[SgrParam]) -> (Option<Color>, usize) {
    if !p.sub.is_empty() {
        return (color_from_mode_and_components(p.sub[0], &p.sub[1..]), 0);
    }
    let Some(mode) = rest.first().map(|m| m.value) else {
        return (None, 0);
    };
    match mode {
        5 => {
            let Some(idx) = rest.get(1) else {
                return (None, 1);
            };
            (Some(Color::Indexed(idx.value as u8)), 2)
        }
        2 => {
            if rest.len() < 4 {
                return (None, rest.len());
            }
            (
                Some(Color::Rgb(
                    rest[1].value as u8,
                    rest[2].value as u8,
                    rest[3].value as u8,
                )),
                4,
            )
        }
        _ => (None, 1),
    }
}

fn color_from_mode_and_components(mode: u16, components: &[u16]) -> Option<Color> {
    match mode {
        5 => components.first().map(|&idx| Color::Indexed(idx as u8)),
        2 => {
            // ITU form is `38:2:Pi:Pr:Pg:Pb` (colorspace id optional/ignored);
            // accept both 3- and 4-component forms.
            let rgb = if components.len() >= 4 {
                &components[1..4]
            } else if components.len() >= 3 {
                &components[0..3]
            } else {
                return None;
            };
            Some(Color::Rgb(rgb[0] as u8, rgb[1] as u8, rgb[2] as u8))
        }
        _ => None,
    }
}

/// One `CSI m` parameter group: a leading value plus any colon-separated
/// subparameters (used by the ITU form of the extended 38/48/58 color
/// codes, and by the colon-subparam underline-style extension `4:3`).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SgrParam {
    pub value: u16,
    pub sub: Vec<u16>,
}

impl SgrParam {
    #[must_use]
    pub fn plain(value: u16) -> Self {
        Self { value, sub: Vec::new() }
    }
}

impl From<u16> for SgrParam {
    fn from(value: u16) -> Self {
        SgrParam::plain(value)
    }
}

/// Hyperlink identifier for OSC 8 links.
///
/// Zero means "no link". Non-zero values index into an external link registry
/// that maps IDs to URIs.
pub type HyperlinkId = u16;

/// Registry for OSC 8 hyperlink URIs.
///
/// Cells store compact `HyperlinkId`s instead of full URI strings. This
/// registry provides ID allocation, deduplication, and reference-counted
/// release so hosts can clear unused hyperlinks when content is dropped
/// (e.g., scrollback eviction).
#[derive(Debug, Clone)]
pub struct HyperlinkRegistry {
    /// Slots indexed by ID (0 reserved for "no link").
    slots: Vec<Option<HyperlinkSlot>>,
    /// URI -> ID lookup for deduplication.
    lookup: HashMap<String, HyperlinkId>,
    /// Reusable IDs from released hyperlinks.
    free_list: Vec<HyperlinkId>,
}

#[derive(Debug, Clone)]
struct HyperlinkSlot {
    uri: String,
    ref_count: u32,
}

impl HyperlinkRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self {
            slots: vec![None],
            lookup: HashMap::new(),
            free_list: Vec::new(),
        }
    }

    /// Intern a URI and return its hyperlink ID without changing refcounts.
    ///
    /// Empty URIs return 0 (interpreted as "no link").
    pub fn intern(&mut self, uri: &str) -> HyperlinkId {
        if uri.is_empty() {
            return 0;
        }
        if let Some(&id) = self.lookup.get(uri) {
            return id;
        }

        let id = if let Some(id) = self.free_list.pop() {
            id
        } else {
            let next = self.slots.len();
            if next > HyperlinkId::MAX as usize {
                return 0;
            }
            let id = next as HyperlinkId;
            self.slots.push(None);
            id
        };

        if id == 0 {
            return 0;
        }
        let idx = id as usize;
        if idx >= self.slots.len() {
            return 0;
        }

        self.slots[idx] = Some(HyperlinkSlot {
            uri: uri.to_string(),
            ref_count: 0,
        });
        self.lookup.insert(uri.to_string(), id);
        id
    }

    /// Convenience: intern a URI and increment its refcount once.
    pub fn acquire(&mut self, uri: &str) -> HyperlinkId {
        let id = self.intern(uri);
        self.acquire_id(id);
        id
    }

    /// Increment the refcount for an existing hyperlink ID.
    ///
    /// Invalid IDs and 0 are ignored.
    pub fn acquire_id(&mut self, id: HyperlinkId) {
        if id == 0 {
            return;
        }
        let Some(slot) = self.slots.get_mut(id as usize) else {
            return;
        };
        let Some(slot) = slot.as_mut() else {
            return;
        };
        slot.ref_count = slot.ref_count.saturating_add(1);
    }

    /// Decrement the refcount for an ID and release it when it reaches zero.
    ///
    /// Invalid IDs and 0 are ignored. Releasing an ID with refcount 0 is a no-op.
    pub fn release_id(&mut self, id: HyperlinkId) {
        if id == 0 {
            return;
        }
        let Some(entry) = self.slots.get_mut(id as usize) else {
            return;
        };

        let should_remove = match entry.as_mut() {
            Some(slot) if slot.ref_count > 0 => {
                slot.ref_count -= 1;
                slot.ref_count == 0
            }
            _ => false,
        };

        if should_remove && let Some(removed) = entry.take() {
            self.lookup.remove(&removed.uri);
            self.free_list.push(id);
        }
    }

    /// Release hyperlink references for all cells in the slice.
    ///
    /// Intended for use when dropping content (e.g., evicted scrollback lines).
    pub fn release_cells(&mut self, cells: &[Cell]) {
        for cell in cells {
            self.release_id(cell.hyperlink);
        }
    }

    /// Look up the URI for a hyperlink ID.
    pub fn get(&self, id: HyperlinkId) -> Option<&str> {
        self.slots
            .get(id as usize)
            .and_then(|slot| slot.as_ref())
            .map(|slot| slot.uri.as_str())
    }

    /// Clear all hyperlinks, resetting the registry to empty.
    pub fn clear(&mut self) {
        self.slots.clear();
        self.slots.push(None);
        self.lookup.clear();
        self.free_list.clear();
    }

    /// Number of currently registered hyperlinks.
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    /// Whether the registry has no hyperlinks.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether the registry contains the given ID.
    pub fn contains(&self, id: HyperlinkId) -> bool {
        self.get(id).is_some()
    }
}

impl Default for HyperlinkRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// A single cell in the terminal grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cell {
    /// The character content. A space for empty/erased cells.
    content: char,
    /// Display width of the content in terminal columns (1 or 2 for wide chars).
    width: u8,
    /// Zero-width combining marks attached after `content`, oldest first.
    /// Bounded rather than heap-allocated so `Cell` stays a fixed-size,
    /// `Copy` record; see [`Self::MAX_COMBINING`].
    combining: [char; Self::MAX_COMBINING],
    /// Number of valid entries in `combining` (0..=MAX_COMBINING).
    combining_len: u8,
    /// Cell-level flags (wide char, continuation, etc.).
    pub flags: CellFlags,
    /// SGR text attributes.
    pub attrs: SgrAttrs,
    /// Hyperlink ID (0 = no link).
    pub hyperlink: HyperlinkId,
}

impl Default for Cell {
    fn default() -> Self {
        Self {
            content: ' ',
            width: 1,
            combining: ['\0'; Self::MAX_COMBINING],
            combining_len: 0,
            flags: CellFlags::empty(),
            attrs: SgrAttrs::default(),
            hyperlink: 0,
        }
    }
}

impl Cell {
    /// Upper bound on combining marks a single cell tracks. A base
    /// character followed by more than this many marks silently drops the
    /// excess, same as the crate's other bounded buffers (pipeline, Kitty
    /// frames).
    pub const MAX_COMBINING: usize = 2;

    /// Create a new cell with the given character and default attributes.
    pub fn new(ch: char) -> Self {
        Self {
            content: ch,
            width: 1,
            combining: ['\0'; Self::MAX_COMBINING],
            combining_len: 0,
            flags: CellFlags::empty(),
            attrs: SgrAttrs::default(),
            hyperlink: 0,
        }
    }

    /// Create a new cell with the given character, width, and attributes.
    pub fn with_attrs(ch: char, width: u8, attrs: SgrAttrs) -> Self {
        Self {
            content: ch,
            width,
            combining: ['\0'; Self::MAX_COMBINING],
            combining_len: 0,
            flags: CellFlags::empty(),
            attrs,
            hyperlink: 0,
        }
    }

    /// Create a wide (2-column) character cell.
    ///
    /// Returns `(leading, continuation)` pair. The leading cell holds the
    /// character; the continuation cell is a placeholder.
    pub fn wide(ch: char, attrs: SgrAttrs) -> (Self, Self) {
        let leading = Self {
            content: ch,
            width: 2,
            combining: ['\0'; Self::MAX_COMBINING],
            combining_len: 0,
            flags: CellFlags::WIDE_CHAR,
            attrs,
            hyperlink: 0,
        };
        let continuation = Self {
            content: ' ',
            width: 0,
            combining: ['\0'; Self::MAX_COMBINING],
            combining_len: 0,
            flags: CellFlags::WIDE_CONTINUATION,
            attrs,
            hyperlink: 0,
        };
        (leading, continuation)
    }

    /// The character content of this cell.
    pub fn content(&self) -> char {
        self.content
    }

    /// The display width in terminal columns.
    pub fn width(&self) -> u8 {
        self.width
    }

    /// Whether this cell is the leading half of a wide character.
    pub fn is_wide(&self) -> bool {
        self.flags.contains(CellFlags::WIDE_CHAR)
    }

    /// Whether this cell is a continuation (trailing half) of a wide character.
    pub fn is_wide_continuation(&self) -> bool {
        self.flags.contains(CellFlags::WIDE_CONTINUATION)
    }

    /// Set the character content and display width.
    pub fn set_content(&mut self, ch: char, width: u8) {
        self.content = ch;
        self.width = width;
        // A new base character starts with no attached combining marks.
        self.combining_len = 0;
        // Clear wide flags when replacing content.
        self.flags
            .remove(CellFlags::WIDE_CHAR | CellFlags::WIDE_CONTINUATION | CellFlags::COMBINING);
    }

    /// Attach a zero-width combining mark to this cell's base character.
    ///
    /// Returns `false` (and drops the mark) once [`Self::MAX_COMBINING`]
    /// marks are already attached; returns `true` otherwise. Has no effect
    /// on this cell's display width or column occupancy — the combiner
    /// renders as part of the same cell as its base character.
    pub fn push_combining(&mut self, ch: char) -> bool {
        if self.combining_len as usize >= Self::MAX_COMBINING {
            return false;
        }
        self.combining[self.combining_len as usize] = ch;
        self.combining_len += 1;
        self.flags.insert(CellFlags::COMBINING);
        true
    }

    /// The combining marks attached to this cell's base character, oldest
    /// first. Empty unless [`CellFlags::COMBINING`] is set.
    pub fn combining_marks(&self) -> &[char] {
        &self.combining[..self.combining_len as usize]
    }

    /// Append this cell's full grapheme (base character plus any attached
    /// combining marks) onto `out`.
    pub fn push_grapheme_into(&self, out: &mut String) {
        out.push(self.content);
        for &mark in self.combining_marks() {
            out.push(mark);
        }
    }

    /// Reset this cell to a blank space with the given background attributes.
    ///
    /// Used by erase operations (ED, EL, ECH) which fill with the current
    /// background color but reset all other attributes.
    pub fn erase(&mut self, bg: Color) {
        self.content = ' ';
        self.width = 1;
        self.combining_len = 0;
        self.flags = CellFlags::empty();
        self.attrs = SgrAttrs {
            bg,
            ..SgrAttrs::default()
        };
        self.hyperlink = 0;
    }

    /// Reset this cell to a blank space with default attributes.
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// Whether this cell is protected from DECSED/DECSEL/DECSERA (DECSCA).
    pub fn is_protected(&self) -> bool {
        self.flags.contains(CellFlags::PROTECTED)
    }

    /// Set or clear the DECSCA protection flag without touching content.
    pub fn set_protected(&mut self, protected: bool) {
        self.flags.set(CellFlags::PROTECTED, protected);
    }

    /// Terminal display width of a Unicode scalar value, in columns.
    ///
    /// - `0` for combining marks, zero-width joiners/non-joiners, and other
    ///   non-spacing/format characters.
    /// - `1` for narrow characters (the common case).
    /// - `2` for wide (East Asian Wide/Fullwidth) characters and emoji.
    ///
    /// C0/C1 control characters also report width 0: callers dispatch them
    /// via the parser's control-character path, never through this function.
    pub fn display_width(ch: char) -> u8 {
        if ch.is_control() {
            return 0;
        }
        match ch.width() {
            Some(w) => w.min(2) as u8,
            // `unicode-width` returns `None` for most control characters;
            // anything else that slips through is treated as a combining
            // mark (zero width) rather than panicking or guessing narrow.
            None => 0,
        }
    }
}
