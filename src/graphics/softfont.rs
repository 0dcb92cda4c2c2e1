//! DECDLD soft-font parsing: `DCS Pfn;Pcn;Pe;Pcmw;Pss;Pt;Pcmh;Pcss { Dscs ... ST`.
//!
//! The payload designates a charset final byte (`Dscs`) and a grid of
//! sixel-encoded glyph columns; this module only builds the bitmap atlas.
//! Rasterizing it into a font a renderer can draw with is an outer shell's job.

/// The eight leading DCS parameters, before the `{` final byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DecdldParams {
    /// Pfn: font number (0 or 1, the two loadable slots).
    pub font_number: u16,
    /// Pcn: starting character code (offset from 0x20).
    pub start_char: u16,
    /// Pe: erase control (which existing characters get cleared first).
    pub erase_control: u16,
    /// Pcmw: character matrix width in pixels.
    pub cell_width: u16,
    /// Pss: font set size (94 or 96 characters).
    pub font_set_size: u16,
    /// Pt: font usage (text or full cell).
    pub font_type: u16,
    /// Pcmh: character matrix height in pixels.
    pub cell_height: u16,
    /// Pcss: character set size (94 or 96-charset numbering).
    pub charset_size: u16,
}

/// One glyph's pixel columns, one `u16` bitmask per pixel row (rows beyond
/// `cell_height` are unused).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GlyphBitmap {
    pub rows: Vec<u16>,
}

/// Accumulated soft-font atlas for one DECDLD session.
#[derive(Debug, Clone)]
pub struct SoftFontState {
    /// `Dscs`: the designator string this font answers to once loaded.
    pub designator: String,
    pub params: DecdldParams,
    /// Indexed by character code minus `params.start_char`.
    pub glyphs: Vec<GlyphBitmap>,
    pub dirty: bool,
}

impl Default for SoftFontState {
    fn default() -> Self {
        Self::new()
    }
}

impl SoftFontState {
    pub fn new() -> Self {
        Self {
            designator: String::new(),
            params: DecdldParams::default(),
            glyphs: Vec::new(),
            dirty: false,
        }
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Parse the eight leading numeric parameters from a DCS prefix such as
    /// `"1;0;0;5;0;1;10;1{"` (intermediates/final byte already stripped by
    /// the caller down to the semicolon-joined numbers).
    pub fn parse_prefix(prefix: &[u8]) -> DecdldParams {
        let text = prefix
            .iter()
            .take_while(|&&b| b != b'{')
            .copied()
            .collect::<Vec<u8>>();
        let text = String::from_utf8_lossy(&text);
        let mut fields = text.split(';').map(|s| s.parse::<u16>().unwrap_or(0));
        DecdldParams {
            font_number: fields.next().unwrap_or(0),
            start_char: fields.next().unwrap_or(0),
            erase_control: fields.next().unwrap_or(0),
            cell_width: fields.next().unwrap_or(0),
            font_set_size: fields.next().unwrap_or(0),
            font_type: fields.next().unwrap_or(0),
            cell_height: fields.next().unwrap_or(0),
            charset_size: fields.next().unwrap_or(0),
        }
    }

    /// Begin a new DECDLD load with the params parsed from the DCS prefix.
    pub fn begin(&mut self, params: DecdldParams) {
        self.params = params;
        self.glyphs.clear();
        self.designator.clear();
    }

    /// Feed the DCS string body: `Dscs` (the two-byte-or-fewer charset
    /// designator) followed by sixel-encoded glyph columns, `/` advancing to
    /// the next row-group and `;` advancing to the next glyph.
    pub fn feed(&mut self, body: &[u8]) {
        let mut i = 0;
        if self.designator.is_empty() {
            let start = i;
            while i < body.len() && matches!(body[i], 0x20..=0x2f) {
                i += 1;
            }
            if i < body.len() {
                i += 1; // the final designator byte, any value
            }
            self.designator = String::from_utf8_lossy(&body[start..i]).into_owned();
        }

        let mut glyph = GlyphBitmap::default();
        let mut row_group = 0usize;
        let mut col = 0u16;
        while i < body.len() {
            match body[i] {
                b' ' | b'\t' | b'\r' | b'\n' => {
                    i += 1;
                }
                b'/' => {
                    row_group += 1;
                    col = 0;
                    i += 1;
                }
                b';' => {
                    self.glyphs.push(std::mem::take(&mut glyph));
                    row_group = 0;
                    col = 0;
                    i += 1;
                }
                0x3f..=0x7e => {
                    let pattern = body[i] - 0x3f;
                    let base_row = row_group * 6;
                    for bit in 0..6usize {
                        if pattern & (1 << bit) != 0 {
                            let row = base_row + bit;
                            if glyph.rows.len() <= row {
                                glyph.rows.resize(row + 1, 0);
                            }
                            glyph.rows[row] |= 1 << col;
                        }
                    }
                    col += 1;
                    i += 1;
                }
                _ => i += 1,
            }
        }
        if !glyph.rows.is_empty() {
            self.glyphs.push(glyph);
        }
        self.dirty = true;
    }

    #[must_use]
    pub fn glyph(&self, char_code: u16) -> Option<&GlyphBitmap> {
        let index = char_code.checked_sub(self.params.start_char)?;
        self.glyphs.get(index as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_leading_decdld_parameters() {
        let params = SoftFontState::parse_prefix(b"1;0;0;5;0;1;10;1{");
        assert_eq!(params.font_number, 1);
        assert_eq!(params.cell_width, 5);
        assert_eq!(params.cell_height, 10);
    }

    #[test]
    fn begin_resets_accumulated_glyphs() {
        let mut state = SoftFontState::new();
        state.feed(b"A?");
        state.begin(DecdldParams { start_char: 0x20, ..Default::default() });
        assert!(state.glyphs.is_empty());
        assert!(state.designator.is_empty());
    }

    #[test]
    fn designator_is_captured_before_glyph_data() {
        let mut state = SoftFontState::new();
        state.begin(DecdldParams { start_char: 0x20, ..Default::default() });
        state.feed(b"A?");
        assert_eq!(state.designator, "A");
    }

    #[test]
    fn semicolon_advances_to_next_glyph() {
        let mut state = SoftFontState::new();
        state.begin(DecdldParams { start_char: 0x20, ..Default::default() });
        state.feed(b"A?;?");
        assert_eq!(state.glyphs.len(), 2);
    }

    #[test]
    fn glyph_lookup_honors_start_char_offset() {
        let mut state = SoftFontState::new();
        state.begin(DecdldParams { start_char: 0x20, ..Default::default() });
        state.feed(b"A?;~");
        assert!(state.glyph(0x20).is_some());
        assert!(state.glyph(0x21).is_some());
        assert!(state.glyph(0x1f).is_none());
    }
}
