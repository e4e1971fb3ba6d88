// Copyright (c) 2022-2026 vtscreen contributors. Licensed under Apache License, Version 2.0.

//! Driver configuration. See §6 of the design doc for the option table.
//!
//! Every field has a default; an invalid value supplied through
//! [`SixelPaletteSize::from_raw`] or [`JexerImageFormat::from_str_lossy`]
//! falls back to the default rather than raising (`ConfigInvalid`, §7).

use std::path::PathBuf;

/// Which sixel encoder implementation to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SixelEncoderKind {
    /// Full palette build + Floyd-Steinberg dither + transparent bottom row.
    #[default]
    Hq,
    /// Fixed small palette, no dithering, no transparency fallback.
    Legacy,
}

/// Supported sixel palette sizes (§3 "Sixel palette").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SixelPaletteSize {
    Two,
    #[default]
    TwoFiftySix,
    FiveTwelve,
    TenTwentyFour,
    TwentyFortyEight,
}

impl SixelPaletteSize {
    #[must_use]
    pub fn count(self) -> usize {
        match self {
            Self::Two => 2,
            Self::TwoFiftySix => 256,
            Self::FiveTwelve => 512,
            Self::TenTwentyFour => 1024,
            Self::TwentyFortyEight => 2048,
        }
    }

    /// Parses a raw palette-size request, falling back to the default for
    /// any value not in `{2, 256, 512, 1024, 2048}` (`ConfigInvalid`, §7).
    #[must_use]
    pub fn from_raw(n: usize) -> Self {
        match n {
            2 => Self::Two,
            256 => Self::TwoFiftySix,
            512 => Self::FiveTwelve,
            1024 => Self::TenTwentyFour,
            2048 => Self::TwentyFortyEight,
            _ => {
                tracing::debug!(requested = n, "invalid sixel palette size, using default");
                Self::default()
            }
        }
    }

    /// `(hue_bits, sat_bits, lum_bits)` used to build the HSL bucket grid.
    #[must_use]
    pub fn hsl_bits(self) -> (u32, u32, u32) {
        match self {
            Self::Two => (0, 0, 1),
            Self::TwoFiftySix => (4, 2, 2),
            Self::FiveTwelve => (4, 2, 3),
            Self::TenTwentyFour => (4, 3, 3),
            Self::TwentyFortyEight => (4, 3, 4),
        }
    }
}

/// Jexer image sub-format (`ESC ] 444 ; <fmt> ; ...`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JexerImageFormat {
    Disabled,
    #[default]
    Png,
    Jpg,
    Rgb,
}

impl JexerImageFormat {
    /// Parses a config string, falling back to the default on anything
    /// unrecognized rather than raising (`ConfigInvalid`, §7).
    #[must_use]
    pub fn from_str_lossy(s: &str) -> Self {
        match s {
            "disabled" => Self::Disabled,
            "jpg" | "jpeg" => Self::Jpg,
            "rgb" => Self::Rgb,
            "png" => Self::Png,
            other => {
                tracing::debug!(value = other, "invalid jexerImages value, using default");
                Self::default()
            }
        }
    }
}

/// All ANSI color overrides recognized by OSC-4 plus config defaults.
#[derive(Debug, Clone, Copy)]
pub struct ColorOverrides {
    pub colors: [Option<(u8, u8, u8)>; 16],
}

impl Default for ColorOverrides {
    fn default() -> Self {
        Self { colors: [None; 16] }
    }
}

/// Full driver configuration; see §6.
#[derive(Debug, Clone)]
pub struct DriverConfig {
    pub modify_other_keys: bool,
    pub rgb_color: bool,
    pub sixel: bool,
    pub sixel_encoder: SixelEncoderKind,
    pub sixel_fast_and_dirty: bool,
    pub sixel_shared_palette: Option<bool>,
    pub sixel_palette_size: SixelPaletteSize,
    pub wide_char_images: bool,
    pub iterm2_images: Option<bool>,
    pub jexer_images: JexerImageFormat,
    pub images_over_text: bool,
    pub image_thread_count: usize,
    pub color_overrides: ColorOverrides,
    pub image_cache_capacity: usize,
    pub debug_log_path: Option<PathBuf>,
    /// Kill-switch for the bottom-row transparent-sixel assumption that the
    /// receiving terminal honors DECSDM (§9 open question).
    pub allow_transparent_bottom_row: bool,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            modify_other_keys: false,
            rgb_color: false,
            sixel: true,
            sixel_encoder: SixelEncoderKind::Hq,
            sixel_fast_and_dirty: false,
            sixel_shared_palette: None,
            sixel_palette_size: SixelPaletteSize::default(),
            wide_char_images: true,
            iterm2_images: None,
            jexer_images: JexerImageFormat::Png,
            images_over_text: false,
            image_thread_count: 2,
            color_overrides: ColorOverrides::default(),
            image_cache_capacity: 128,
            debug_log_path: None,
            allow_transparent_bottom_row: true,
        }
    }
}

impl DriverConfig {
    /// Whether iTerm2-style images should be emitted, resolving the
    /// fingerprint-derived default (§4.5 "Fingerprinting") if the caller
    /// never set an explicit preference.
    #[must_use]
    pub fn resolve_iterm2_images(&self, fingerprinted_iterm2_like: bool) -> bool {
        self.iterm2_images.unwrap_or(fingerprinted_iterm2_like)
    }

    /// Whether to build one shared palette across all sixel runs in a
    /// flush vs. a private palette per run, resolving the derived default
    /// (shared once the palette has stabilized past the first few runs is
    /// an application-level policy; the driver's own default is "private
    /// unless the app opts in").
    #[must_use]
    pub fn resolve_sixel_shared_palette(&self) -> bool {
        self.sixel_shared_palette.unwrap_or(false)
    }
}
