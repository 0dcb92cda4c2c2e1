//! Conformance levels: which feature set and mode defaults a session starts
//! with, and the DA1/DA2 identification strings it replies with.

use crate::modes::{DecModes, Modes};

/// The terminal conformance level a session emulates. Ordered roughly by
/// historical capability; `Xterm` and `AnsiSys` are feature supersets bolted
/// onto the VT line rather than points on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConformanceLevel {
    Vt52,
    Vt100,
    Vt220,
    Vt320,
    Vt420,
    Vt510,
    Vt525,
    Xterm,
    AnsiSys,
}

impl ConformanceLevel {
    /// The mode register a freshly-reset session at this level starts with.
    #[must_use]
    pub fn default_modes(self) -> Modes {
        let mut modes = Modes::new();
        if self == ConformanceLevel::Vt52 {
            modes.dec.insert(DecModes::VT52);
        }
        modes
    }

    /// Whether this level supports left/right margins (DECLRMM), available
    /// from VT420 onward.
    #[must_use]
    pub fn supports_left_right_margins(self) -> bool {
        matches!(
            self,
            ConformanceLevel::Vt420
                | ConformanceLevel::Vt510
                | ConformanceLevel::Vt525
                | ConformanceLevel::Xterm
        )
    }

    /// Whether this level supports rectangular area operations (DECFRA,
    /// DECCRA, DECCARA, DECRARA, DECSERA), available from VT420 onward.
    #[must_use]
    pub fn supports_rectangular_ops(self) -> bool {
        self.supports_left_right_margins()
    }

    /// Whether OSC 8 hyperlinks are recognized (xterm and xterm-compatible
    /// emulators only — not a DEC-defined feature).
    #[must_use]
    pub fn supports_hyperlinks(self) -> bool {
        matches!(self, ConformanceLevel::Xterm)
    }

    /// Whether Sixel/Kitty/DECDLD graphics sub-protocols are dispatched at
    /// all. Plain VT1xx/22x levels never saw graphics; xterm and VT3xx+
    /// (DEC's own sixel-capable terminals) do.
    #[must_use]
    pub fn supports_graphics(self) -> bool {
        !matches!(self, ConformanceLevel::Vt52 | ConformanceLevel::Vt100)
    }

    /// The primary Device Attributes (`DA1`, `CSI c`) reply, including the
    /// leading `CSI ?` and trailing `c` framing.
    #[must_use]
    pub fn da1_reply(self) -> &'static str {
        match self {
            ConformanceLevel::Vt52 => "", // VT52 has no DA1; ESC/Z is handled separately
            ConformanceLevel::Vt100 => "\x1b[?1;2c",
            ConformanceLevel::Vt220 => "\x1b[?62;1;6c",
            ConformanceLevel::Vt320 => "\x1b[?63;1;2;6c",
            ConformanceLevel::Vt420 | ConformanceLevel::Vt510 | ConformanceLevel::Vt525 => {
                "\x1b[?64;1;2;6;9;15;18;21;22c"
            }
            ConformanceLevel::Xterm => "\x1b[?64;1;2;6;9;15;18;21;22c",
            ConformanceLevel::AnsiSys => "\x1b[?6c",
        }
    }

    /// Secondary Device Attributes (`DA2`, `CSI > c`): `Pp;Pv;Pc` (terminal
    /// type; firmware version; ROM cartridge — `0` for a software core).
    #[must_use]
    pub fn da2_reply(self) -> &'static str {
        match self {
            ConformanceLevel::Vt100 => "\x1b[>0;10;0c",
            ConformanceLevel::Vt220 => "\x1b[>1;10;0c",
            ConformanceLevel::Vt320 => "\x1b[>24;10;0c",
            ConformanceLevel::Vt420 | ConformanceLevel::Vt510 | ConformanceLevel::Vt525 => {
                "\x1b[>41;10;0c"
            }
            ConformanceLevel::Xterm => "\x1b[>41;367;0c",
            ConformanceLevel::Vt52 | ConformanceLevel::AnsiSys => "",
        }
    }
}

impl Default for ConformanceLevel {
    /// VT420 is a reasonable default: broad enough to exercise every
    /// rectangular-operation / left-right-margin feature this core
    /// implements, without opting into xterm-only extensions (hyperlinks)
    /// unless a host explicitly asks for `Xterm`.
    fn default() -> Self {
        ConformanceLevel::Vt420
    }
}
