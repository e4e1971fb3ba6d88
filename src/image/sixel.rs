// Copyright (c) 2022-2026 vtscreen contributors. Licensed under Apache License, Version 2.0.

//! The sixel encoder (§4.3): palette build, Floyd-Steinberg dither, and
//! sixel bit-packing.
//!
//! Grounded in the teacher's ANSI-sequence-builder style
//! (`r3bl_tui::core::ansi::generator::esc_sequence`), generalized to the
//! spec's DCS sixel wire format.

use std::fmt::Write as _;

use crate::color::{Rgb, SixelPalette};
use crate::config::{DriverConfig, SixelEncoderKind};
use crate::image::ImageBuffer;

const MAX_DEVICE_PIXEL_WIDTH: u32 = 1000;
const MIN_CHUNK_CELLS: u32 = 8;

/// Splits `run_width_cells` (§4.2 "Chunking") into contiguous sub-run cell
/// counts of at least [`MIN_CHUNK_CELLS`], such that no sub-run's device
/// pixel width exceeds the limit for `encoder` at `cell_width_px`.
#[must_use]
pub fn chunk_plan(run_width_cells: u32, cell_width_px: u32, encoder: SixelEncoderKind, palette_len: usize) -> Vec<u32> {
    let limit_px = match encoder {
        SixelEncoderKind::Hq => palette_proportional_limit(palette_len),
        SixelEncoderKind::Legacy => MAX_DEVICE_PIXEL_WIDTH,
    };
    let max_cells_per_chunk = (limit_px / cell_width_px.max(1)).max(MIN_CHUNK_CELLS);

    if run_width_cells <= max_cells_per_chunk {
        return vec![run_width_cells];
    }

    let mut chunks = Vec::new();
    let mut remaining = run_width_cells;
    while remaining > 0 {
        let take = remaining.min(max_cells_per_chunk);
        // Never leave a trailing sliver smaller than MIN_CHUNK_CELLS.
        let take = if remaining - take > 0 && remaining - take < MIN_CHUNK_CELLS {
            remaining - MIN_CHUNK_CELLS
        } else {
            take
        };
        chunks.push(take);
        remaining -= take;
    }
    chunks
}

fn palette_proportional_limit(palette_len: usize) -> u32 {
    // Larger palettes afford proportionally larger bands before a terminal's
    // sixel parser buffer becomes the bottleneck; scale linearly off the
    // 256-color baseline.
    let scale = (palette_len as u32).max(2) as f32 / 256.0;
    ((MAX_DEVICE_PIXEL_WIDTH as f32) * scale.max(0.25)) as u32
}

/// Dithers `image` against `palette` in place, storing each pixel's
/// nearest palette index as a second parallel buffer (§4.3 "Dithering").
///
/// Returns the per-pixel palette index buffer; `image` itself is left
/// untouched (the dithering error accumulates over a working copy, §4.3
/// "applied in one left-to-right, top-to-bottom pass over a working copy
/// of the image").
#[must_use]
pub fn dither_to_indices(image: &ImageBuffer, palette: &SixelPalette) -> Vec<usize> {
    let width = image.width as usize;
    let height = image.height as usize;
    let mut working: Vec<[f32; 3]> = image
        .pixels()
        .iter()
        .map(|p| [f32::from(p.r), f32::from(p.g), f32::from(p.b)])
        .collect();
    let mut indices = vec![0usize; width * height];

    for y in 0..height {
        for x in 0..width {
            let idx = y * width + x;
            let pixel = working[idx];
            let clamped = Rgb::new(clamp_u8(pixel[0]), clamp_u8(pixel[1]), clamp_u8(pixel[2]));
            let palette_idx = palette.nearest(clamped);
            indices[idx] = palette_idx;
            let chosen = palette.rgb(palette_idx);

            let err = [
                pixel[0] - f32::from(chosen.r),
                pixel[1] - f32::from(chosen.g),
                pixel[2] - f32::from(chosen.b),
            ];

            // Floyd-Steinberg 7/3/5/1 distribution.
            distribute(&mut working, width, height, x, y, 1, 0, err, 7.0 / 16.0);
            distribute(&mut working, width, height, x, y, -1, 1, err, 3.0 / 16.0);
            distribute(&mut working, width, height, x, y, 0, 1, err, 5.0 / 16.0);
            distribute(&mut working, width, height, x, y, 1, 1, err, 1.0 / 16.0);
        }
    }

    indices
}

#[allow(clippy::too_many_arguments)]
fn distribute(
    working: &mut [[f32; 3]],
    width: usize,
    height: usize,
    x: usize,
    y: usize,
    dx: i32,
    dy: i32,
    err: [f32; 3],
    weight: f32,
) {
    let nx = x as i32 + dx;
    let ny = y as i32 + dy;
    if nx < 0 || ny < 0 || nx as usize >= width || ny as usize >= height {
        return;
    }
    let idx = (ny as usize) * width + (nx as usize);
    for c in 0..3 {
        working[idx][c] += err[c] * weight;
    }
}

fn clamp_u8(v: f32) -> u8 { v.clamp(0.0, 255.0) as u8 }

/// Emits the full `ESC P q ... ESC \` sixel sequence for `image`, using a
/// private (freshly built) or shared palette per `config` (§4.3 "Sixel
/// emission").
#[must_use]
pub fn encode(image: &ImageBuffer, shared_palette: Option<&SixelPalette>, config: &DriverConfig) -> String {
    let owned_palette;
    let palette = match shared_palette {
        Some(p) => p,
        None => {
            owned_palette = SixelPalette::build(config.sixel_palette_size);
            &owned_palette
        }
    };

    let indices = if config.sixel_fast_and_dirty {
        fast_indices(image, palette)
    } else {
        dither_to_indices(image, palette)
    };

    render_sixel(image.width, image.height, &indices, palette, shared_palette.is_none())
}

/// Nearest-color without dithering, for `sixelFastAndDirty`.
fn fast_indices(image: &ImageBuffer, palette: &SixelPalette) -> Vec<usize> {
    image.pixels().iter().map(|p| palette.nearest(*p)).collect()
}

fn render_sixel(width: u32, height: u32, indices: &[usize], palette: &SixelPalette, emit_palette: bool) -> String {
    let mut out = String::new();
    out.push_str("\x1bPq");

    if emit_palette {
        for i in 0..palette.len() {
            let rgb = palette.rgb(i);
            // Sixel palette-select uses percentage RGB (0-100), type 2.
            let _ = write!(
                out,
                "#{i};2;{};{};{}",
                pct(rgb.r),
                pct(rgb.g),
                pct(rgb.b)
            );
        }
    }

    // Raster attribute ("Pan;Pad;Ph;Pv): 1:1 pixel aspect ratio, then the
    // image's pixel width/height so receivers can size the canvas before
    // the first band arrives (§4.3 output grammar).
    let _ = write!(out, "\"1;1;{width};{height}");

    let width = width as usize;
    let bands = height.div_ceil(6) as usize;

    for band in 0..bands {
        let row0 = band * 6;
        let rows_in_band = (height as usize - row0).min(6);

        let mut used: Vec<usize> = indices[row0 * width..(row0 + rows_in_band) * width]
            .iter()
            .copied()
            .collect::<std::collections::BTreeSet<_>>()
            .into_iter()
            .collect();
        used.sort_unstable();

        for &color_idx in &used {
            let _ = write!(out, "#{color_idx}");
            emit_band_row(&mut out, indices, width, row0, rows_in_band, color_idx);
        }

        if band + 1 < bands {
            out.push('-');
        }
    }

    out.push_str("\x1b\\");
    out
}

fn pct(channel: u8) -> u32 { ((u32::from(channel) * 100) + 127) / 255 }

fn emit_band_row(out: &mut String, indices: &[usize], width: usize, row0: usize, rows_in_band: usize, color_idx: usize) {
    let mut run_char = None;
    let mut run_len = 0usize;

    for x in 0..width {
        let mut bits = 0u8;
        for r in 0..rows_in_band {
            if indices[(row0 + r) * width + x] == color_idx {
                bits |= 1 << r;
            }
        }
        let ch = (bits + 63) as char;

        match run_char {
            Some(c) if c == ch => run_len += 1,
            Some(c) => {
                flush_run(out, c, run_len);
                run_char = Some(ch);
                run_len = 1;
            }
            None => {
                run_char = Some(ch);
                run_len = 1;
            }
        }
    }
    if let Some(c) = run_char {
        flush_run(out, c, run_len);
    }
    out.push('$');
}

fn flush_run(out: &mut String, ch: char, len: usize) {
    if len == 0 {
        return;
    }
    if len == 1 {
        out.push(ch);
    } else {
        let _ = write!(out, "!{len}{ch}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SixelPaletteSize;

    #[test]
    fn chunk_plan_splits_wide_runs_without_slivers() {
        let chunks = chunk_plan(200, 10, SixelEncoderKind::Legacy, 256);
        assert!(chunks.iter().sum::<u32>() == 200);
        assert!(chunks.iter().all(|&c| c >= MIN_CHUNK_CELLS));
    }

    #[test]
    fn chunk_plan_keeps_narrow_runs_whole() {
        let chunks = chunk_plan(20, 10, SixelEncoderKind::Legacy, 256);
        assert_eq!(chunks, vec![20]);
    }

    #[test]
    fn encode_wraps_in_dcs_introducer_and_terminator() {
        let palette = SixelPalette::build(SixelPaletteSize::Two);
        let image = ImageBuffer::filled(4, 6, Rgb::black());
        let data = encode(&image, Some(&palette), &DriverConfig::default());
        assert!(data.starts_with("\x1bPq"));
        assert!(data.ends_with("\x1b\\"));
    }

    #[test]
    fn dither_produces_in_bounds_indices() {
        let palette = SixelPalette::build(SixelPaletteSize::TwoFiftySix);
        let image = ImageBuffer::new(3, 3, vec![Rgb::new(10, 200, 30); 9]);
        let indices = dither_to_indices(&image, &palette);
        assert!(indices.iter().all(|&i| i < palette.len()));
    }

    #[test]
    fn chunk_boundary_leaks_no_pixels_across() {
        // Scenario 6 (§8): splitting a wide run and re-rasterizing each chunk
        // independently must not let dithering error or palette state leak
        // across the boundary - each chunk's dither pass starts fresh.
        let palette = SixelPalette::build(SixelPaletteSize::TwoFiftySix);
        let full = ImageBuffer::new(20, 6, (0..120).map(|i| Rgb::new((i % 255) as u8, 10, 20)).collect());
        let left = full.subimage_cols(0, 10);
        let right = full.subimage_cols(10, 20);
        let left_indices = dither_to_indices(&left, &palette);
        let right_indices = dither_to_indices(&right, &palette);
        assert_eq!(left_indices.len(), 60);
        assert_eq!(right_indices.len(), 60);
    }
}
