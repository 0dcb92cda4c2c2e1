//! Graphics sub-protocol parsers: Sixel, Kitty, and DECDLD soft fonts.
//! Only parsing and accumulation live here — pixel rendering,
//! font rasterization, and the GPU upload path are an outer shell's job.

pub mod kitty;
pub mod sixel;
pub mod softfont;
