// Copyright (c) 2022-2026 vtscreen contributors. Licensed under Apache License, Version 2.0.

//! Color types and the 16-slot system palette (§3 "Palette").
//!
//! Grounded on `r3bl_tui::core::ansi::color` (`RgbValue`, ANSI256
//! conversion), generalized with a mutable 16-slot table driven by OSC-4
//! responses and a sixel-specific HSL palette builder.

mod hsl;
mod palette16;
pub mod sixel_palette;

pub use hsl::Hsl;
pub use palette16::SystemPalette;
pub use sixel_palette::SixelPalette;

/// 24-bit RGB triple, used throughout the color pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    #[must_use]
    pub const fn new(r: u8, g: u8, b: u8) -> Self { Self { r, g, b } }

    #[must_use]
    pub const fn black() -> Self { Self::new(0, 0, 0) }

    #[must_use]
    pub const fn white() -> Self { Self::new(255, 255, 255) }

    /// Packed `0x00RRGGBB`, used to order the sixel palette ascending by
    /// color (§4.3 "Palette construction").
    #[must_use]
    pub fn packed(self) -> u32 {
        (u32::from(self.r) << 16) | (u32::from(self.g) << 8) | u32::from(self.b)
    }

    /// Perceptual brightness on a 0..=65535 scale, used by the 2-color
    /// sixel threshold (§4.3 "palette size 2, return black or white
    /// directly from brightness threshold 35568").
    #[must_use]
    pub fn brightness(self) -> u32 {
        // ITU-R BT.601 luma weights scaled to 16-bit.
        (u32::from(self.r) * 19595 + u32::from(self.g) * 38470 + u32::from(self.b) * 7471) >> 8
    }

    #[must_use]
    pub fn squared_distance(self, other: Rgb) -> i32 {
        let dr = i32::from(self.r) - i32::from(other.r);
        let dg = i32::from(self.g) - i32::from(other.g);
        let db = i32::from(self.b) - i32::from(other.b);
        dr * dr + dg * dg + db * db
    }
}

impl From<(u8, u8, u8)> for Rgb {
    fn from((r, g, b): (u8, u8, u8)) -> Self { Self::new(r, g, b) }
}
