// Copyright (c) 2022-2026 vtscreen contributors. Licensed under Apache License, Version 2.0.

//! The 16-slot system color table, mutable through OSC-4 responses
//! (§3 "Palette", §4.5 "OSC 4 handling").

use super::Rgb;
use crate::config::ColorOverrides;

const DEFAULT_16: [Rgb; 16] = [
    Rgb::new(0, 0, 0),
    Rgb::new(205, 0, 0),
    Rgb::new(0, 205, 0),
    Rgb::new(205, 205, 0),
    Rgb::new(0, 0, 238),
    Rgb::new(205, 0, 205),
    Rgb::new(0, 205, 205),
    Rgb::new(229, 229, 229),
    Rgb::new(127, 127, 127),
    Rgb::new(255, 0, 0),
    Rgb::new(0, 255, 0),
    Rgb::new(255, 255, 0),
    Rgb::new(92, 92, 255),
    Rgb::new(255, 0, 255),
    Rgb::new(0, 255, 255),
    Rgb::new(255, 255, 255),
];

/// The 16 ANSI system colors, indexed `0..15`, each independently
/// overridable (§3 "16 system colors indexed 0..15, each mutable through
/// OSC-4 responses").
#[derive(Debug, Clone)]
pub struct SystemPalette {
    slots: [Rgb; 16],
}

impl Default for SystemPalette {
    fn default() -> Self { Self { slots: DEFAULT_16 } }
}

impl SystemPalette {
    #[must_use]
    pub fn with_overrides(overrides: &ColorOverrides) -> Self {
        let mut slots = DEFAULT_16;
        for (i, maybe) in overrides.colors.iter().enumerate() {
            if let Some((r, g, b)) = maybe {
                slots[i] = Rgb::new(*r, *g, *b);
            }
        }
        Self { slots }
    }

    #[must_use]
    pub fn get(&self, index: u8) -> Rgb { self.slots[usize::from(index) & 0x0F] }

    /// Installs a palette slot from an OSC-4 response. Returns `true` if
    /// the value actually changed, since a real change must force a full
    /// physical redraw (§4.5 "Any palette change triggers a full physical
    /// redraw").
    pub fn set(&mut self, index: u8, rgb: Rgb) -> bool {
        let slot = &mut self.slots[usize::from(index) & 0x0F];
        if *slot == rgb {
            false
        } else {
            *slot = rgb;
            true
        }
    }

    /// Lookup from a logical color + bold flag: bold brightens indices
    /// `0..=7` to their bright counterparts `8..=15`, matching how most
    /// VT emulators resolve "bold means bright" when `rgbColor` is off.
    #[must_use]
    pub fn lookup(&self, index: u8, bold: bool) -> Rgb {
        let effective = if bold && index < 8 { index + 8 } else { index };
        self.get(effective)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn osc4_override_changes_value_once() {
        let mut palette = SystemPalette::default();
        assert!(palette.set(1, Rgb::new(0xFF, 0, 0)));
        assert_eq!(palette.get(1), Rgb::new(0xFF, 0, 0));
        assert!(!palette.set(1, Rgb::new(0xFF, 0, 0)), "same value must not report a change");
    }

    #[test]
    fn bold_brightens_low_indices() {
        let palette = SystemPalette::default();
        assert_eq!(palette.lookup(1, true), palette.get(9));
        assert_eq!(palette.lookup(9, true), palette.get(9));
    }
}
