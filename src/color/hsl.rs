// Copyright (c) 2022-2026 vtscreen contributors. Licensed under Apache License, Version 2.0.

//! RGB↔HSL conversion for the sixel palette's nearest-color bucket grid
//! (§4.3).

use super::Rgb;

/// Hue in `[0, 360)`, saturation and lightness in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hsl {
    pub h: f32,
    pub s: f32,
    pub l: f32,
}

impl Hsl {
    #[must_use]
    pub fn from_rgb(rgb: Rgb) -> Self {
        let r = f32::from(rgb.r) / 255.0;
        let g = f32::from(rgb.g) / 255.0;
        let b = f32::from(rgb.b) / 255.0;

        let max = r.max(g).max(b);
        let min = r.min(g).min(b);
        let l = (max + min) / 2.0;

        if (max - min).abs() < f32::EPSILON {
            return Self { h: 0.0, s: 0.0, l };
        }

        let d = max - min;
        let s = if l > 0.5 { d / (2.0 - max - min) } else { d / (max + min) };

        let h = if (max - r).abs() < f32::EPSILON {
            (g - b) / d + if g < b { 6.0 } else { 0.0 }
        } else if (max - g).abs() < f32::EPSILON {
            (b - r) / d + 2.0
        } else {
            (r - g) / d + 4.0
        };

        Self { h: h * 60.0, s, l }
    }

    /// Bucket index for `bits` worth of resolution over this channel's
    /// range, used by [`super::SixelPalette`] to build the HSL grid.
    #[must_use]
    pub fn hue_bucket(self, bits: u32) -> u32 {
        if bits == 0 {
            return 0;
        }
        let buckets = 1u32 << bits;
        (((self.h / 360.0) * buckets as f32) as u32).min(buckets - 1)
    }

    #[must_use]
    pub fn sat_bucket(self, bits: u32) -> u32 {
        if bits == 0 {
            return 0;
        }
        let buckets = 1u32 << bits;
        ((self.s * buckets as f32) as u32).min(buckets - 1)
    }

    #[must_use]
    pub fn lum_bucket(self, bits: u32) -> u32 {
        if bits == 0 {
            return 0;
        }
        let buckets = 1u32 << bits;
        ((self.l * buckets as f32) as u32).min(buckets - 1)
    }

    /// Midpoint RGB of the HSL bucket `(hue_idx, sat_idx, lum_idx)` out of
    /// `(hue_bits, sat_bits, lum_bits)` resolution (§4.3 "for each HSL
    /// bucket compute the RGB midpoint").
    #[must_use]
    pub fn bucket_midpoint_rgb(
        hue_idx: u32,
        sat_idx: u32,
        lum_idx: u32,
        hue_bits: u32,
        sat_bits: u32,
        lum_bits: u32,
    ) -> Rgb {
        let hue_buckets = 1u32 << hue_bits.max(1);
        let sat_buckets = 1u32 << sat_bits.max(1);
        let lum_buckets = 1u32 << lum_bits.max(1);

        let h = (f32::from(hue_idx as u16) + 0.5) / hue_buckets as f32 * 360.0;
        let s = (f32::from(sat_idx as u16) + 0.5) / sat_buckets as f32;
        let l = (f32::from(lum_idx as u16) + 0.5) / lum_buckets as f32;

        hsl_to_rgb(h, s.min(1.0), l.min(1.0))
    }
}

fn hsl_to_rgb(h: f32, s: f32, l: f32) -> Rgb {
    if s.abs() < f32::EPSILON {
        let v = (l * 255.0).round() as u8;
        return Rgb::new(v, v, v);
    }

    let q = if l < 0.5 { l * (1.0 + s) } else { l + s - l * s };
    let p = 2.0 * l - q;
    let hk = h / 360.0;

    let r = hue_to_rgb(p, q, hk + 1.0 / 3.0);
    let g = hue_to_rgb(p, q, hk);
    let b = hue_to_rgb(p, q, hk - 1.0 / 3.0);

    Rgb::new(
        (r * 255.0).round() as u8,
        (g * 255.0).round() as u8,
        (b * 255.0).round() as u8,
    )
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
    if t < 0.5 {
        return q;
    }
    if t < 2.0 / 3.0 {
        return p + (q - p) * (2.0 / 3.0 - t) * 6.0;
    }
    p
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn black_and_white_roundtrip() {
        let black = Hsl::from_rgb(Rgb::black());
        assert_eq!(black.l, 0.0);
        let white = Hsl::from_rgb(Rgb::white());
        assert!((white.l - 1.0).abs() < 1e-4);
    }

    #[test]
    fn pure_red_hue_is_zero() {
        let hsl = Hsl::from_rgb(Rgb::new(255, 0, 0));
        assert!(hsl.h.abs() < 1e-3);
        assert!((hsl.s - 1.0).abs() < 1e-4);
    }
}
