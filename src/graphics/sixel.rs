//! Sixel graphics parsing: the body of a `DCS q` string.
//!
//! Only parsing and accumulation live here. The result is a strip array plus
//! a color palette; turning those into pixels is an outer shell's job.

use std::collections::HashMap;

/// One decoded sixel byte: a 6-bit vertical pattern paired with the color
/// register that was active when it was drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SixelCell {
    pub pattern: u8,
    pub color_index: u8,
}

/// One 6-pixel-tall horizontal strip, one cell per column.
#[derive(Debug, Clone, Default)]
pub struct Strip {
    pub cells: Vec<SixelCell>,
}

/// Raster attributes set by `" Pan;Pad;Ph;Pv` (pixel aspect ratio and the
/// image's advertised size, which may exceed what the data actually fills).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RasterAttrs {
    pub pan: u16,
    pub pad: u16,
    pub width: u16,
    pub height: u16,
}

/// Accumulated state of one Sixel image under construction.
#[derive(Debug, Clone)]
pub struct SixelState {
    pub palette: HashMap<u16, (u8, u8, u8)>,
    pub raster: Option<RasterAttrs>,
    pub strips: Vec<Strip>,
    current_color: u16,
    col: usize,
    row: usize,
    repeat: Option<u32>,
    /// Set whenever a strip or palette entry changes; a renderer clears it
    /// after consuming the image.
    pub dirty: bool,
}

impl Default for SixelState {
    fn default() -> Self {
        Self::new()
    }
}

impl SixelState {
    pub fn new() -> Self {
        Self {
            palette: default_palette(),
            raster: None,
            strips: Vec::new(),
            current_color: 0,
            col: 0,
            row: 0,
            repeat: None,
            dirty: false,
        }
    }

    /// Drop all accumulated strips and restore the factory palette, as RIS does.
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Feed one DCS string body (everything between the `q` final byte and
    /// ST) through the grammar.
    pub fn feed(&mut self, body: &[u8]) {
        let mut i = 0;
        while i < body.len() {
            match body[i] {
                b'"' => {
                    i += 1;
                    let (params, next) = read_params(body, i);
                    i = next;
                    let p = |idx: usize, default: i64| params.get(idx).copied().unwrap_or(default);
                    self.raster = Some(RasterAttrs {
                        pan: p(0, 1).max(0) as u16,
                        pad: p(1, 1).max(0) as u16,
                        width: p(2, 0).max(0) as u16,
                        height: p(3, 0).max(0) as u16,
                    });
                }
                b'#' => {
                    i += 1;
                    let (params, next) = read_params(body, i);
                    i = next;
                    if params.len() == 1 {
                        self.current_color = params[0].max(0) as u16;
                    } else if params.len() >= 5 {
                        let reg = params[0].max(0) as u16;
                        self.define_color(reg, params[1], params[2], params[3], params[4]);
                        self.current_color = reg;
                    }
                }
                b'!' => {
                    i += 1;
                    let (params, next) = read_params(body, i);
                    i = next;
                    let count = params.first().copied().unwrap_or(1).max(1) as u32;
                    self.repeat = Some(count);
                }
                b'$' => {
                    self.carriage_return();
                    i += 1;
                }
                b'-' => {
                    self.line_feed();
                    i += 1;
                }
                0x3f..=0x7e => {
                    self.put_pattern_byte(body[i]);
                    i += 1;
                }
                _ => i += 1,
            }
        }
    }

    fn define_color(&mut self, reg: u16, mode: i64, x: i64, y: i64, z: i64) {
        let rgb = match mode {
            1 => hls_to_rgb(x.clamp(0, 360) as u16, y.clamp(0, 100) as u8, z.clamp(0, 100) as u8),
            _ => (scale(x.clamp(0, 100) as u8), scale(y.clamp(0, 100) as u8), scale(z.clamp(0, 100) as u8)),
        };
        self.palette.insert(reg, rgb);
        self.dirty = true;
    }

    fn put_pattern_byte(&mut self, byte: u8) {
        let pattern = byte.wrapping_sub(0x3f) & 0x3f;
        let count = self.repeat.take().unwrap_or(1).max(1) as usize;
        while self.strips.len() <= self.row {
            self.strips.push(Strip::default());
        }
        let color_index = self.current_color as u8;
        let strip = &mut self.strips[self.row];
        if strip.cells.len() < self.col + count {
            strip.cells.resize(self.col + count, SixelCell::default());
        }
        for cell in &mut strip.cells[self.col..self.col + count] {
            *cell = SixelCell { pattern, color_index };
        }
        self.col += count;
        self.dirty = true;
    }

    pub fn carriage_return(&mut self) {
        self.col = 0;
    }

    pub fn line_feed(&mut self) {
        self.row += 1;
        self.col = 0;
    }

    #[must_use]
    pub fn strip_count(&self) -> usize {
        self.strips.len()
    }
}

fn read_params(body: &[u8], mut i: usize) -> (Vec<i64>, usize) {
    let mut params = Vec::new();
    let mut current = String::new();
    let mut saw_any = false;
    while i < body.len() {
        match body[i] {
            b'0'..=b'9' => {
                saw_any = true;
                current.push(body[i] as char);
                i += 1;
            }
            b';' => {
                saw_any = true;
                params.push(current.parse().unwrap_or(0));
                current.clear();
                i += 1;
            }
            _ => break,
        }
    }
    if saw_any {
        params.push(current.parse().unwrap_or(0));
    }
    (params, i)
}

fn scale(pct: u8) -> u8 {
    ((u16::from(pct.min(100)) * 255) / 100) as u8
}

fn hls_to_rgb(h: u16, l: u8, s: u8) -> (u8, u8, u8) {
    let l = f32::from(l) / 100.0;
    let s = f32::from(s) / 100.0;
    if s == 0.0 {
        let v = (l * 255.0).round() as u8;
        return (v, v, v);
    }
    let q = if l < 0.5 { l * (1.0 + s) } else { l + s - l * s };
    let p = 2.0 * l - q;
    let h = f32::from(h) / 360.0;
    let r = hue_to_rgb(p, q, h + 1.0 / 3.0);
    let g = hue_to_rgb(p, q, h);
    let b = hue_to_rgb(p, q, h - 1.0 / 3.0);
    ((r * 255.0).round() as u8, (g * 255.0).round() as u8, (b * 255.0).round() as u8)
}

fn hue_to_rgb(p: f32, q: f32, mut t: f32) -> f32 {
    if t < 0.0 {
        t += 1.0;
    }
    if t > 1.0 {
        t -= 1.0;
    }
    if t < 1.0 / 6.0 {
        return p + (q - p) * 6.0 * t;
    }
    if t < 1.0 / 2.0 {
        return q;
    }
    if t < 2.0 / 3.0 {
        return p + (q - p) * (2.0 / 3.0 - t) * 6.0;
    }
    p
}

/// The factory VT340 16-color sixel palette (percentages converted to 0..255).
fn default_palette() -> HashMap<u16, (u8, u8, u8)> {
    const ENTRIES: [(u16, u8, u8, u8); 16] = [
        (0, 0, 0, 0),
        (1, 20, 20, 80),
        (2, 80, 13, 13),
        (3, 20, 80, 20),
        (4, 80, 20, 80),
        (5, 20, 80, 80),
        (6, 80, 80, 20),
        (7, 53, 53, 53),
        (8, 26, 26, 26),
        (9, 33, 33, 60),
        (10, 60, 26, 26),
        (11, 33, 60, 33),
        (12, 60, 33, 60),
        (13, 33, 60, 60),
        (14, 60, 60, 33),
        (15, 100, 100, 100),
    ];
    ENTRIES.into_iter().map(|(n, r, g, b)| (n, (scale(r), scale(g), scale(b)))).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_pattern_byte_decodes_to_six_bit_pattern() {
        let mut s = SixelState::new();
        s.feed(b"?"); // 0x3f -> pattern 0
        assert_eq!(s.strips[0].cells[0], SixelCell { pattern: 0, color_index: 0 });
        s.feed(b"~"); // 0x7e -> pattern 0x3f
        assert_eq!(s.strips[0].cells[1], SixelCell { pattern: 0x3f, color_index: 0 });
    }

    #[test]
    fn repeat_expands_to_identical_strips() {
        let mut s = SixelState::new();
        s.feed(b"!3@");
        assert_eq!(s.strips[0].cells.len(), 3);
        assert!(s.strips[0].cells.iter().all(|c| c.pattern == b'@' - 0x3f));
    }

    #[test]
    fn carriage_return_resets_column_not_row() {
        let mut s = SixelState::new();
        s.feed(b"??$?");
        assert_eq!(s.strips[0].cells.len(), 2);
    }

    #[test]
    fn line_feed_advances_to_a_new_strip() {
        let mut s = SixelState::new();
        s.feed(b"?-?");
        assert_eq!(s.strip_count(), 2);
    }

    #[test]
    fn color_selection_tags_subsequent_cells() {
        let mut s = SixelState::new();
        s.feed(b"#3?");
        assert_eq!(s.strips[0].cells[0].color_index, 3);
    }

    #[test]
    fn color_definition_in_rgb_mode_populates_palette() {
        let mut s = SixelState::new();
        s.feed(b"#5;2;100;0;0?");
        assert_eq!(s.palette.get(&5), Some(&(255, 0, 0)));
        assert!(s.dirty);
    }

    #[test]
    fn raster_attributes_are_parsed() {
        let mut s = SixelState::new();
        s.feed(b"\"1;1;100;50");
        assert_eq!(s.raster, Some(RasterAttrs { pan: 1, pad: 1, width: 100, height: 50 }));
    }

    #[test]
    fn reset_drops_accumulated_state() {
        let mut s = SixelState::new();
        s.feed(b"#5;2;100;0;0?");
        s.reset();
        assert!(s.strips.is_empty());
        assert_eq!(s.palette.get(&5), None);
    }
}
