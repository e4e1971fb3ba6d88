// Copyright (c) 2022-2026 vtscreen contributors. Licensed under Apache License, Version 2.0.

//! The `Cell`/`Attr` data model (§3).
//!
//! A `Cell` is the smallest renderable unit of the logical screen: either a
//! glyph cell (a Unicode scalar plus attributes) or an image cell (an opaque
//! bitmap reference). Grounded on `r3bl_tui::core::tui_style::TuiStyle`'s
//! attribute-flag layout, generalized to the spec's explicit SGR subfields.

use std::sync::Arc;

/// How many terminal columns a cell occupies.
///
/// A full-width glyph (e.g. CJK, most emoji) is stored as a `LEFT` cell
/// carrying the glyph, followed by a `RIGHT` cell that shares it. Invariant
/// (§3): "right-half of a full-width char has `width==RIGHT` and shares the
/// prior left cell's glyph."
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CellWidth {
    #[default]
    Single,
    Left,
    Right,
}

/// A 16-color palette index, as used by the non-truecolor SGR path.
pub type PaletteIndex = u8;

/// Foreground/background color for a cell: either an indexed palette slot
/// or, when `rgbColor` is enabled and the cell carries an override, a
/// 24-bit truecolor value. §4.1: "24-bit RGB takes precedence when the
/// cell carries a valid RGB value; otherwise the 16-color path is used."
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellColor {
    Indexed(PaletteIndex),
    Rgb(u8, u8, u8),
}

impl Default for CellColor {
    fn default() -> Self { Self::Indexed(7) }
}

/// SGR attribute subfields tracked per cell (§3 "Cell", §4.1 "SGR
/// minimization").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Attr {
    pub fg: CellColor,
    pub bg: CellColor,
    pub bold: bool,
    pub underline: bool,
    pub blink: bool,
    pub reverse: bool,
    /// Time-varying foreground; §4.1 "Pulse cells compute a time-dependent
    /// RGB each flush."
    pub pulse: bool,
}

/// An opaque bitmap reference borrowed from the application for the
/// duration of a single flush (§3 "Lifecycle"). The driver never inspects
/// pixel data directly outside the image-run encode path; this handle only
/// carries what the differential renderer needs: identity (for the cache
/// key) and a borrowed buffer.
#[derive(Clone)]
pub struct ImageRef {
    /// Content-addressed fingerprint of the bitmap this cell shows. Two
    /// cells with the same fingerprint are assumed to show the same pixels
    /// (§3 "ImageCache entry").
    pub fingerprint: u64,
    /// The pixel data, shared so multiple cells of the same run can borrow
    /// it without cloning pixels.
    pub pixels: Arc<crate::image::ImageBuffer>,
}

impl std::fmt::Debug for ImageRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageRef")
            .field("fingerprint", &self.fingerprint)
            .field("pixels", &format_args!("{}x{}", self.pixels.width, self.pixels.height))
            .finish()
    }
}

/// One cell of the logical or physical grid (§3 "Cell").
///
/// Invariant: a cell with `image.is_some()` always has `image == true`
/// conceptually - here that's just `image.is_some()`, there is no separate
/// boolean to get out of sync.
#[derive(Debug, Clone)]
pub struct Cell {
    pub ch: char,
    pub width: CellWidth,
    pub attr: Attr,
    pub image: Option<ImageRef>,
    pub inverted: bool,
    pub transparent: bool,
}

impl Default for Cell {
    fn default() -> Self {
        Self {
            ch: ' ',
            width: CellWidth::Single,
            attr: Attr::default(),
            image: None,
            inverted: false,
            transparent: false,
        }
    }
}

impl Cell {
    #[must_use]
    pub fn blank() -> Self { Self::default() }

    #[must_use]
    pub fn is_image(&self) -> bool { self.image.is_some() }

    /// Whether this cell differs from `other` in a way the renderer must
    /// re-emit: glyph, attribute, image identity, or pulse (which is
    /// time-varying and must always be considered "changed").
    #[must_use]
    pub fn differs_from(&self, other: &Cell) -> bool {
        if self.attr.pulse {
            return true;
        }
        match (&self.image, &other.image) {
            (Some(a), Some(b)) => a.fingerprint != b.fingerprint,
            (None, None) => self.ch != other.ch || self.width != other.width || self.attr != other.attr,
            _ => true,
        }
    }

    /// Whether this cell can be skipped by the `text_end` trailing-space
    /// scan: a plain space with no attributes worth re-painting. A space
    /// carrying a non-default background or any SGR flag is visually
    /// distinct and must not be treated as blank.
    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.image.is_none() && self.ch == ' ' && self.attr == Attr::default()
    }
}

/// Computes the display width class for `ch` using `unicode-width`,
/// matching the teacher's convention of deriving column width from the
/// grapheme's East-Asian-Width property rather than assuming 1.
#[must_use]
pub fn classify_width(ch: char) -> CellWidth {
    use unicode_width::UnicodeWidthChar;
    match UnicodeWidthChar::width(ch) {
        Some(2) => CellWidth::Left,
        _ => CellWidth::Single,
    }
}
