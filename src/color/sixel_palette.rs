// Copyright (c) 2022-2026 vtscreen contributors. Licensed under Apache License, Version 2.0.

//! The sixel-specific palette: an HSL bucket grid sized for up to N colors,
//! sorted and pinned so index 0 is pure black and index N-1 is pure white
//! (§3 "Sixel palette", §4.3 "Palette construction", "Nearest-color
//! lookup").

use rustc_hash::FxHashMap;

use super::{Hsl, Rgb};
use crate::config::SixelPaletteSize;

/// One entry of the built palette: its final RGB and the HSL bucket it was
/// generated from (used by the testable invariant in §8: "for all other i,
/// the stored RGB lies in the HSL bucket used to generate it").
#[derive(Debug, Clone, Copy)]
pub struct PaletteEntry {
    pub rgb: Rgb,
    pub hue_bucket: u32,
    pub sat_bucket: u32,
    pub lum_bucket: u32,
}

/// An ordered sixel color palette with O(log N) nearest-color queries via
/// bracketing hue/saturation buckets (§4.3 "Nearest-color lookup").
#[derive(Debug, Clone)]
pub struct SixelPalette {
    entries: Vec<PaletteEntry>,
    hue_bits: u32,
    sat_bits: u32,
    lum_bits: u32,
    /// Maps `(hue_bucket, sat_bucket, lum_bucket)` to its final sorted
    /// index, so nearest-color lookup only has to iterate the bracketing
    /// buckets instead of the whole palette.
    bucket_index: FxHashMap<(u32, u32, u32), Vec<usize>>,
    two_color: bool,
}

impl SixelPalette {
    /// Builds a private (non-shared) palette sized per `size` (§4.3
    /// "Palette construction (when not shared)").
    #[must_use]
    pub fn build(size: SixelPaletteSize) -> Self {
        if size.count() == 2 {
            return Self::two_color();
        }

        let (hue_bits, sat_bits, lum_bits) = size.hsl_bits();
        let hue_buckets = 1u32 << hue_bits.max(1);
        let sat_buckets = 1u32 << sat_bits.max(1);
        let lum_buckets = 1u32 << lum_bits.max(1);

        let mut raw = Vec::new();
        for hue_idx in 0..hue_buckets {
            for sat_idx in 0..sat_buckets {
                for lum_idx in 0..lum_buckets {
                    let rgb = Hsl::bucket_midpoint_rgb(
                        hue_idx, sat_idx, lum_idx, hue_bits, sat_bits, lum_bits,
                    );
                    raw.push(PaletteEntry {
                        rgb,
                        hue_bucket: hue_idx,
                        sat_bucket: sat_idx,
                        lum_bucket: lum_idx,
                    });
                }
            }
        }

        // Sort ascending by packed RGB (§4.3 "sort ascending by packed RGB").
        raw.sort_by_key(|entry| entry.rgb.packed());

        // Pin index 0 = pure black, index N-1 = pure white.
        let last = raw.len() - 1;
        raw[0].rgb = Rgb::black();
        raw[last].rgb = Rgb::white();

        let mut bucket_index: FxHashMap<(u32, u32, u32), Vec<usize>> = FxHashMap::default();
        for (i, entry) in raw.iter().enumerate() {
            bucket_index
                .entry((entry.hue_bucket, entry.sat_bucket, entry.lum_bucket))
                .or_default()
                .push(i);
        }

        Self { entries: raw, hue_bits, sat_bits, lum_bits, bucket_index, two_color: false }
    }

    fn two_color() -> Self {
        let entries = vec![
            PaletteEntry { rgb: Rgb::black(), hue_bucket: 0, sat_bucket: 0, lum_bucket: 0 },
            PaletteEntry { rgb: Rgb::white(), hue_bucket: 0, sat_bucket: 0, lum_bucket: 1 },
        ];
        Self { entries, hue_bits: 0, sat_bits: 0, lum_bits: 1, bucket_index: FxHashMap::default(), two_color: true }
    }

    #[must_use]
    pub fn len(&self) -> usize { self.entries.len() }

    #[must_use]
    pub fn is_empty(&self) -> bool { self.entries.is_empty() }

    #[must_use]
    pub fn entry(&self, index: usize) -> PaletteEntry { self.entries[index] }

    #[must_use]
    pub fn rgb(&self, index: usize) -> Rgb { self.entries[index].rgb }

    /// Nearest palette index for `target` (§4.3 "Nearest-color lookup
    /// (per pixel)"). For the 2-color palette this is the brightness
    /// threshold shortcut (35568); otherwise only the bracketing hue/sat
    /// buckets (plus true black/white) are scanned.
    #[must_use]
    pub fn nearest(&self, target: Rgb) -> usize {
        if self.two_color {
            return usize::from(target.brightness() >= 35568);
        }

        let hsl = Hsl::from_rgb(target);
        let hue_bucket = hsl.hue_bucket(self.hue_bits);
        let sat_bucket = hsl.sat_bucket(self.sat_bits);
        let lum_bucket = hsl.lum_bucket(self.lum_bits);

        let hue_buckets = 1u32 << self.hue_bits.max(1);
        let sat_buckets = 1u32 << self.sat_bits.max(1);
        let lum_buckets = 1u32 << self.lum_bits.max(1);

        let hue_neighbors = [hue_bucket, (hue_bucket + hue_buckets - 1) % hue_buckets, (hue_bucket + 1) % hue_buckets];
        let sat_neighbors = [sat_bucket, sat_bucket.saturating_sub(1), (sat_bucket + 1).min(sat_buckets - 1)];
        let lum_neighbors = [lum_bucket, lum_bucket.saturating_sub(1), (lum_bucket + 1).min(lum_buckets - 1)];

        let mut best_idx = 0usize;
        let mut best_dist = i32::MAX;

        // Always test true black and white (§4.3 "Always also test true
        // black and true white; return the minimum").
        for &fixed in &[0usize, self.entries.len() - 1] {
            let dist = target.squared_distance(self.entries[fixed].rgb);
            if dist < best_dist {
                best_dist = dist;
                best_idx = fixed;
            }
        }

        for &h in &hue_neighbors {
            for &s in &sat_neighbors {
                for &l in &lum_neighbors {
                    if let Some(candidates) = self.bucket_index.get(&(h, s, l)) {
                        for &idx in candidates {
                            let dist = target.squared_distance(self.entries[idx].rgb);
                            if dist < best_dist {
                                best_dist = dist;
                                best_idx = idx;
                            }
                        }
                    }
                }
            }
        }

        best_idx
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pinned_black_and_white() {
        let palette = SixelPalette::build(SixelPaletteSize::TwoFiftySix);
        assert_eq!(palette.rgb(0), Rgb::black());
        assert_eq!(palette.rgb(palette.len() - 1), Rgb::white());
    }

    #[test]
    fn two_color_threshold() {
        let palette = SixelPalette::build(SixelPaletteSize::Two);
        assert_eq!(palette.len(), 2);
        assert_eq!(palette.nearest(Rgb::new(10, 10, 10)), 0);
        assert_eq!(palette.nearest(Rgb::new(250, 250, 250)), 1);
    }

    #[test]
    fn nearest_returns_in_bounds_index() {
        let palette = SixelPalette::build(SixelPaletteSize::FiveTwelve);
        for rgb in [Rgb::new(255, 0, 0), Rgb::new(12, 200, 90), Rgb::new(1, 1, 1)] {
            let idx = palette.nearest(rgb);
            assert!(idx < palette.len());
        }
    }

    #[test]
    fn nearest_color_lies_in_generating_bucket_or_is_black_white_pin() {
        let palette = SixelPalette::build(SixelPaletteSize::TwoFiftySix);
        for i in 1..palette.len() - 1 {
            let entry = palette.entry(i);
            let hsl = Hsl::from_rgb(entry.rgb);
            assert_eq!(hsl.hue_bucket(palette.hue_bits), entry.hue_bucket);
        }
    }
}
