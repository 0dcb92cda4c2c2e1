//! Character-set designation and translation (SCS, SI/SO, SS2/SS3).
//!
//! VT100-family terminals keep four designated graphic sets (`G0`..`G3`),
//! shift between them with SI/SO (locking shift) and SS2/SS3 (single
//! shift), and translate the next byte/scalar accordingly. This module
//! models that translation layer; `Cursor` (see `cursor.rs`) owns the
//! actual G0-G3 table and the currently-locked/shifted slot.

/// One of the charsets this core recognizes via SCS (`ESC ( / ) / * / +` `<final>`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Charset {
    /// US ASCII (`B`). The default on every slot at reset.
    #[default]
    Ascii,
    /// DEC Special Graphics and Line Drawing (`0`): box-drawing glyphs.
    DecSpecialGraphics,
    /// United Kingdom (`A`): ASCII with `#` replaced by `£`.
    Uk,
    /// ISO Latin-1 supplemental (`<`, DEC's NRCS extension path).
    Latin1,
    /// UTF-8 is handled upstream by the parser itself; this variant marks a
    /// slot as "pass scalars through unmodified" for hosts that designate it
    /// explicitly (xterm's `%G`).
    Utf8,
}

impl Charset {
    /// Map an SCS final byte (following `ESC (`/`)`/`*`/`+`) to a charset.
    ///
    /// Unrecognized finals fall back to ASCII, matching xterm's behavior of
    /// silently ignoring SCS sequences it doesn't implement.
    pub fn from_final_byte(b: u8) -> Self {
        match b {
            b'0' => Charset::DecSpecialGraphics,
            b'A' => Charset::Uk,
            b'<' => Charset::Latin1,
            b'%' => Charset::Utf8, // caller also consumes the following `G`
            _ => Charset::Ascii,
        }
    }
}

/// Which of the four designation slots (G0-G3) a charset is assigned to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GraphicSlot {
    G0,
    G1,
    G2,
    G3,
}

impl GraphicSlot {
    /// Map the intermediate byte following `ESC` that selects a slot:
    /// `(` -> G0, `)` -> G1, `*` -> G2, `+` -> G3.
    pub fn from_intermediate(b: u8) -> Option<Self> {
        match b {
            b'(' => Some(GraphicSlot::G0),
            b')' => Some(GraphicSlot::G1),
            b'*' => Some(GraphicSlot::G2),
            b'+' => Some(GraphicSlot::G3),
            _ => None,
        }
    }

    pub fn index(self) -> usize {
        match self {
            GraphicSlot::G0 => 0,
            GraphicSlot::G1 => 1,
            GraphicSlot::G2 => 2,
            GraphicSlot::G3 => 3,
        }
    }
}

/// DEC Special Graphics mapping table (VT100 line-drawing set), keyed by the
/// ASCII scalar that the host sends while G-set `DecSpecialGraphics` is
/// selected. Covers the standard `0x5f..=0x7e` range; anything outside it
/// passes through unchanged.
fn dec_special_graphics(ch: char) -> char {
    match ch {
        '_' => '\u{00A0}', // blank
        '`' => '\u{2666}', // diamond
        'a' => '\u{2592}', // checkerboard
        'b' => '\u{2409}', // HT symbol
        'c' => '\u{240C}', // FF symbol
        'd' => '\u{240D}', // CR symbol
        'e' => '\u{240A}', // LF symbol
        'f' => '\u{00B0}', // degree
        'g' => '\u{00B1}', // plus/minus
        'h' => '\u{2424}', // NL symbol
        'i' => '\u{240B}', // VT symbol
        'j' => '\u{2518}', // bottom-right corner
        'k' => '\u{2510}', // top-right corner
        'l' => '\u{250C}', // top-left corner
        'm' => '\u{2514}', // bottom-left corner
        'n' => '\u{253C}', // crossing lines
        'o' => '\u{23BA}', // scan line 1
        'p' => '\u{23BB}', // scan line 3
        'q' => '\u{2500}', // horizontal line
        'r' => '\u{23BC}', // scan line 7
        's' => '\u{23BD}', // scan line 9
        't' => '\u{251C}', // left "T"
        'u' => '\u{2524}', // right "T"
        'v' => '\u{2534}', // bottom "T"
        'w' => '\u{252C}', // top "T"
        'x' => '\u{2502}', // vertical line
        'y' => '\u{2264}', // less-or-equal
        'z' => '\u{2265}', // greater-or-equal
        '{' => '\u{03C0}', // pi
        '|' => '\u{2260}', // not-equal
        '}' => '\u{00A3}', // pound sterling
        '~' => '\u{00B7}', // centered dot
        other => other,
    }
}

/// Translate a single printable scalar through the active charset.
///
/// Only `DecSpecialGraphics` and `Uk` actually remap anything; `Ascii`,
/// `Latin1`, and `Utf8` pass scalars through unchanged (Latin-1/UTF-8 input
/// is already correctly decoded upstream by the parser).
pub fn translate_charset(ch: char, charset: Charset) -> char {
    match charset {
        Charset::DecSpecialGraphics => dec_special_graphics(ch),
        Charset::Uk if ch == '#' => '\u{00A3}',
        _ => ch,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_final_byte_known_and_unknown() {
        assert_eq!(Charset::from_final_byte(b'0'), Charset::DecSpecialGraphics);
        assert_eq!(Charset::from_final_byte(b'A'), Charset::Uk);
        assert_eq!(Charset::from_final_byte(b'<'), Charset::Latin1);
        assert_eq!(Charset::from_final_byte(b'Z'), Charset::Ascii);
    }

    #[test]
    fn slot_from_intermediate() {
        assert_eq!(GraphicSlot::from_intermediate(b'('), Some(GraphicSlot::G0));
        assert_eq!(GraphicSlot::from_intermediate(b')'), Some(GraphicSlot::G1));
        assert_eq!(GraphicSlot::from_intermediate(b'*'), Some(GraphicSlot::G2));
        assert_eq!(GraphicSlot::from_intermediate(b'+'), Some(GraphicSlot::G3));
        assert_eq!(GraphicSlot::from_intermediate(b'Q'), None);
    }

    #[test]
    fn dec_special_graphics_box_drawing() {
        assert_eq!(
            translate_charset('q', Charset::DecSpecialGraphics),
            '\u{2500}'
        );
        assert_eq!(
            translate_charset('x', Charset::DecSpecialGraphics),
            '\u{2502}'
        );
        // Outside the mapped range, passes through.
        assert_eq!(translate_charset('A', Charset::DecSpecialGraphics), 'A');
    }

    #[test]
    fn uk_pound_sign() {
        assert_eq!(translate_charset('#', Charset::Uk), '\u{00A3}');
        assert_eq!(translate_charset('A', Charset::Uk), 'A');
    }

    #[test]
    fn ascii_passthrough() {
        assert_eq!(translate_charset('q', Charset::Ascii), 'q');
    }
}
