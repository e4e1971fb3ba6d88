// Copyright (c) 2022-2026 vtscreen contributors. Licensed under Apache License, Version 2.0.

//! The differential flush engine: SGR minimization, synchronized-output
//! wrapping, and the byte-throughput meter (§4.1).
//!
//! Grounded on `r3bl_tui::core::ansi::generator`'s SGR-sequence builders,
//! generalized to compare against a `lastAttr` record instead of emitting
//! every subfield unconditionally.

use std::fmt::Write as _;
use std::io::{self, Write};
use std::time::{Duration, Instant};

use crate::cell::{Attr, CellColor};
use crate::color::SystemPalette;
use crate::config::{DriverConfig, JexerImageFormat};
use crate::grid::LogicalScreen;
use crate::image::{EncodedRun, ImageBuffer, ImageCache, ImagePool, ImageProtocol};

/// The last-emitted SGR attributes for the current flush (§3 "AttrState").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttrState {
    attr: Attr,
    /// No attributes have been emitted yet this flush; forces the first
    /// cell to emit a full reset-then-set rather than a diff against
    /// stale state from a previous flush.
    fresh: bool,
}

impl Default for AttrState {
    fn default() -> Self { Self { attr: Attr::default(), fresh: true } }
}

impl AttrState {
    /// Produces the minimal SGR sequence to move from the current state to
    /// `next`, updating `self` to `next` (§4.1 "SGR minimization").
    pub fn transition(&mut self, next: Attr, rgb_color: bool, palette: &SystemPalette, pulse_rgb: Option<(u8, u8, u8)>) -> String {
        let mut codes: Vec<String> = Vec::new();

        if self.fresh {
            codes.push("0".to_string());
            self.attr = Attr::default();
            self.fresh = false;
        }

        if next.bold && !self.attr.bold {
            codes.push("1".to_string());
        } else if !next.bold && self.attr.bold {
            codes.push("22".to_string());
        }

        if next.underline && !self.attr.underline {
            codes.push("4".to_string());
        } else if !next.underline && self.attr.underline {
            codes.push("24".to_string());
        }

        if next.blink && !self.attr.blink {
            codes.push("5".to_string());
        } else if !next.blink && self.attr.blink {
            codes.push("25".to_string());
        }

        if next.reverse && !self.attr.reverse {
            codes.push("7".to_string());
        } else if !next.reverse && self.attr.reverse {
            codes.push("27".to_string());
        }

        let fg = next.attr_pulse_fg(pulse_rgb);
        let effective_fg = fg.map(|(r, g, b)| CellColor::Rgb(r, g, b)).unwrap_or(next.fg);

        if effective_fg != self.attr.fg || next.pulse {
            push_color_codes(&mut codes, effective_fg, true, rgb_color, palette, next.bold);
        }

        if next.bg != self.attr.bg {
            push_color_codes(&mut codes, next.bg, false, rgb_color, palette, false);
        }

        self.attr = Attr { fg: effective_fg, ..next };

        if codes.is_empty() {
            String::new()
        } else {
            format!("\x1b[{}m", codes.join(";"))
        }
    }
}

trait PulseFg {
    fn attr_pulse_fg(&self, pulse_rgb: Option<(u8, u8, u8)>) -> Option<(u8, u8, u8)>;
}

impl PulseFg for Attr {
    fn attr_pulse_fg(&self, pulse_rgb: Option<(u8, u8, u8)>) -> Option<(u8, u8, u8)> {
        if self.pulse { pulse_rgb } else { None }
    }
}

fn push_color_codes(codes: &mut Vec<String>, color: CellColor, foreground: bool, rgb_color: bool, palette: &SystemPalette, bold: bool) {
    match color {
        // 24-bit RGB takes precedence when the cell carries a valid RGB
        // value (§4.1 "24-bit RGB takes precedence ...").
        CellColor::Rgb(r, g, b) if rgb_color => {
            codes.push(format!("{};2;{};{};{}", if foreground { 38 } else { 48 }, r, g, b));
        }
        CellColor::Rgb(r, g, b) => {
            // No truecolor support: resolve to the nearest system slot via
            // squared distance, same fallback the 16-color path already uses.
            let resolved = nearest_system_index(r, g, b, palette);
            push_indexed(codes, resolved, foreground, bold);
        }
        CellColor::Indexed(index) => push_indexed(codes, index, foreground, bold),
    }
}

fn push_indexed(codes: &mut Vec<String>, index: u8, foreground: bool, _bold: bool) {
    let base = if foreground { 30 } else { 40 };
    let code = if index < 8 {
        base + u32::from(index)
    } else {
        (if foreground { 90 } else { 100 }) + u32::from(index - 8)
    };
    codes.push(code.to_string());
}

fn nearest_system_index(r: u8, g: u8, b: u8, palette: &SystemPalette) -> u8 {
    let target = crate::color::Rgb::new(r, g, b);
    (0..16u8)
        .min_by_key(|&i| target.squared_distance(palette.get(i)))
        .unwrap_or(7)
}

/// Tracks emitted bytes per wall-clock second for a readable throughput
/// meter (§4.1 "Byte accounting").
#[derive(Debug)]
pub struct ByteMeter {
    window_start: Instant,
    window_bytes: u64,
    last_rate: u64,
}

impl Default for ByteMeter {
    fn default() -> Self { Self { window_start: Instant::now(), window_bytes: 0, last_rate: 0 } }
}

impl ByteMeter {
    pub fn record(&mut self, bytes: usize, now: Instant) {
        if now.duration_since(self.window_start) >= Duration::from_secs(1) {
            self.last_rate = self.window_bytes;
            self.window_bytes = 0;
            self.window_start = now;
        }
        self.window_bytes += bytes as u64;
    }

    #[must_use]
    pub fn bytes_per_second(&self) -> u64 { self.last_rate }
}

/// Drives one complete flush: image phase, text phase, cursor placement,
/// optional synchronized-output wrapping (§4.1 `flush()`).
pub struct OutputEngine {
    attr_state: AttrState,
    meter: ByteMeter,
}

impl Default for OutputEngine {
    fn default() -> Self { Self { attr_state: AttrState::default(), meter: ByteMeter::default() } }
}

impl OutputEngine {
    #[must_use]
    pub fn byte_meter(&self) -> &ByteMeter { &self.meter }

    /// Runs one flush burst against `sink`, returning total bytes written.
    ///
    /// `synchronized_output_supported` gates the DECRPM-2026 wrap (§4.1
    /// "Synchronized output"); `pulse_rgb` is the time-dependent color
    /// computed once for this flush (§4.1 "Pulse cells compute a
    /// time-dependent RGB each flush").
    #[allow(clippy::too_many_arguments)]
    pub fn flush<W: Write>(
        &mut self,
        sink: &mut W,
        screen: &mut LogicalScreen,
        pool: &ImagePool,
        cache: &ImageCache,
        sixel_palette: Option<&crate::color::SixelPalette>,
        system_palette: &SystemPalette,
        config: &DriverConfig,
        synchronized_output_supported: bool,
        jexer_supported: bool,
        iterm2_like: bool,
        pulse_rgb: Option<(u8, u8, u8)>,
    ) -> io::Result<usize> {
        let mut burst = String::new();

        if synchronized_output_supported {
            burst.push_str("\x1b[?2026h");
        }

        if screen.really_cleared() {
            burst.push_str("\x1b[2J\x1b[H");
        }

        self.render_image_phase(&mut burst, screen, pool, cache, sixel_palette, config, jexer_supported, iterm2_like);
        self.render_text_phase(&mut burst, screen, system_palette, config, pulse_rgb);

        let (cursor_x, cursor_y, cursor_visible) = screen.cursor();
        let _ = write!(burst, "\x1b[{};{}H", cursor_y + 1, cursor_x + 1);
        burst.push_str(if cursor_visible { "\x1b[?25h" } else { "\x1b[?25l" });

        if synchronized_output_supported {
            burst.push_str("\x1b[?2026l");
        }

        for y in 0..screen.height() {
            screen.commit_row(y);
        }
        screen.acknowledge_full_clear();

        let bytes = burst.into_bytes();
        sink.write_all(&bytes)?;
        sink.flush()?;
        self.meter.record(bytes.len(), Instant::now());
        Ok(bytes.len())
    }

    #[allow(clippy::too_many_arguments)]
    fn render_image_phase(
        &self,
        burst: &mut String,
        screen: &LogicalScreen,
        pool: &ImagePool,
        cache: &ImageCache,
        sixel_palette: Option<&crate::color::SixelPalette>,
        config: &DriverConfig,
        jexer_supported: bool,
        iterm2_like: bool,
    ) {
        let Some(protocol) = select_protocol(config, jexer_supported, iterm2_like) else {
            return;
        };

        for y in 0..screen.height() {
            let runs = screen.image_runs(y);
            if runs.is_empty() {
                continue;
            }

            let mut jobs = Vec::with_capacity(runs.len());
            let mut cache_keys = Vec::with_capacity(runs.len());
            let mut cacheable = Vec::with_capacity(runs.len());

            for run in &runs {
                let key = screen.image_run_cache_key(run);
                cacheable.push(screen.image_run_is_invertible_cacheable(run));
                if let Some(hit) = cache.get(&key) {
                    cache_keys.push(Some(key));
                    jobs.push(Box::new(move || Ok(hit)) as crate::image::pool::Job);
                } else {
                    cache_keys.push(Some(key));
                    let (composite, cell_px_width) = assemble_run_image(screen, run);
                    let run_width_cells = (run.col_end - run.col_start) as u32;
                    let row = run.row;
                    let col_start = run.col_start;
                    let config = config.clone();
                    let palette = sixel_palette.cloned();
                    jobs.push(Box::new(move || {
                        let encoded = encode_run(&composite, cell_px_width, run_width_cells, protocol, palette.as_ref(), &config);
                        Ok(render_encoded_runs(row, col_start, &encoded))
                    }) as crate::image::pool::Job);
                }
            }

            let results = pool.run_all(jobs);
            for ((result, key), can_cache) in results.into_iter().zip(cache_keys).zip(cacheable) {
                if let (Ok(data), Some(key)) = (&result, key) {
                    if can_cache {
                        cache.insert(key, data.clone());
                    }
                }
                if let Ok(data) = result {
                    burst.push_str(&data);
                }
            }
        }
    }

    fn render_text_phase(
        &mut self,
        burst: &mut String,
        screen: &LogicalScreen,
        system_palette: &SystemPalette,
        config: &DriverConfig,
        pulse_rgb: Option<(u8, u8, u8)>,
    ) {
        for y in 0..screen.height() {
            let diff = screen.diff_row(y);

            if let Some(from_col) = diff.clear_to_end_of_line {
                let _ = write!(burst, "\x1b[{};{}H\x1b[K", y + 1, from_col + 1);
            }

            for edit in &diff.edits {
                if edit.needs_cursor_move {
                    let _ = write!(burst, "\x1b[{};{}H", edit.row + 1, edit.col + 1);
                }
                let sgr = self.attr_state.transition(edit.cell.attr, config.rgb_color, system_palette, pulse_rgb);
                burst.push_str(&sgr);
                burst.push(edit.cell.ch);
            }
        }
    }
}

/// Picks which wire encoder covers an image run this flush, preferring
/// Jexer (if the terminal fingerprinted as WezTerm) over iTerm2 (if the
/// fingerprint or config says so) over sixel (§4.5 "Fingerprinting",
/// §6 `iTerm2Images`/`jexerImages`).
fn select_protocol(config: &DriverConfig, jexer_supported: bool, iterm2_like: bool) -> Option<ImageProtocol> {
    if jexer_supported && config.jexer_images != JexerImageFormat::Disabled {
        Some(ImageProtocol::Jexer)
    } else if config.resolve_iterm2_images(iterm2_like) {
        Some(ImageProtocol::ITerm2)
    } else if config.sixel {
        Some(ImageProtocol::Sixel)
    } else {
        None
    }
}

/// Stitches every cell's bitmap in `run` side by side into one composite
/// buffer, returning it along with the per-cell pixel width used to derive
/// the offsets (§4.3 "assembled to a `run_width * cell_width x
/// cell_height` buffer").
fn assemble_run_image(screen: &LogicalScreen, run: &crate::grid::ImageRun) -> (ImageBuffer, u32) {
    let mut cell_px_width = 1u32;
    let mut cell_px_height = 1u32;
    for x in run.col_start..run.col_end {
        if let Some(image_ref) = &screen.get(x, run.row).image {
            cell_px_width = image_ref.pixels.width;
            cell_px_height = image_ref.pixels.height;
            break;
        }
    }

    let run_width_cells = (run.col_end - run.col_start) as u32;
    let mut composite = ImageBuffer::filled(cell_px_width * run_width_cells.max(1), cell_px_height, crate::color::Rgb::black());
    for (i, x) in (run.col_start..run.col_end).enumerate() {
        if let Some(image_ref) = &screen.get(x, run.row).image {
            composite.draw_into(&image_ref.pixels, i as u32 * cell_px_width, 0);
        }
    }
    (composite, cell_px_width)
}

/// Encodes `composite` with the chosen protocol, splitting into
/// [`crate::image::sixel::chunk_plan`] sub-runs when sixel is wide enough
/// to need it (§4.2 "Chunking"); iTerm2/Jexer never split.
fn encode_run(
    composite: &ImageBuffer,
    cell_px_width: u32,
    run_width_cells: u32,
    protocol: ImageProtocol,
    sixel_palette: Option<&crate::color::SixelPalette>,
    config: &DriverConfig,
) -> Vec<EncodedRun> {
    match protocol {
        ImageProtocol::Sixel => {
            let palette_len = sixel_palette.map_or_else(|| config.sixel_palette_size.count(), crate::color::SixelPalette::len);
            let chunks = crate::image::sixel::chunk_plan(run_width_cells, cell_px_width, config.sixel_encoder, palette_len);
            let mut encoded = Vec::with_capacity(chunks.len());
            let mut cell_offset = 0u32;
            for chunk_cells in chunks {
                let sub = composite.subimage_cols(cell_offset * cell_px_width, (cell_offset + chunk_cells) * cell_px_width);
                let data = crate::image::sixel::encode(&sub, sixel_palette, config);
                encoded.push(EncodedRun { protocol, data, cell_width: chunk_cells as u16 });
                cell_offset += chunk_cells;
            }
            encoded
        }
        ImageProtocol::ITerm2 => {
            let data = crate::image::iterm2::encode(composite, composite.width, composite.height).unwrap_or_else(|err| {
                tracing::warn!(?err, "iterm2 image encode failed, dropping run");
                String::new()
            });
            vec![EncodedRun { protocol, data, cell_width: run_width_cells as u16 }]
        }
        ImageProtocol::Jexer => {
            let data = crate::image::jexer::encode(composite, config.jexer_images).unwrap_or_else(|err| {
                tracing::warn!(?err, "jexer image encode failed, dropping run");
                String::new()
            });
            vec![EncodedRun { protocol, data, cell_width: run_width_cells as u16 }]
        }
    }
}

/// Joins a run's encoded chunks into one burst fragment, prefixing each
/// chunk with its own absolute cursor-positioning escape since sixel and
/// iTerm2/Jexer both render at the current cursor position (§4.2 "the
/// encoded string wrapped with the encoder-specific cursor-positioning
/// prefix").
fn render_encoded_runs(row: usize, col_start: usize, encoded: &[EncodedRun]) -> String {
    let mut out = String::new();
    let mut col = col_start;
    for run in encoded {
        if !run.data.is_empty() {
            let _ = write!(out, "\x1b[{};{}H", row + 1, col + 1);
            out.push_str(&run.data);
        }
        col += run.cell_width as usize;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_attr_state_resets_before_first_cell() {
        let mut state = AttrState::default();
        let palette = SystemPalette::default();
        let seq = state.transition(Attr { bold: true, ..Attr::default() }, false, &palette, None);
        assert!(seq.starts_with("\x1b[0;"));
        assert!(seq.contains('1'));
    }

    #[test]
    fn bold_off_emits_explicit_22() {
        let mut state = AttrState::default();
        let palette = SystemPalette::default();
        state.transition(Attr { bold: true, ..Attr::default() }, false, &palette, None);
        let seq = state.transition(Attr::default(), false, &palette, None);
        assert!(seq.contains("22"));
    }

    #[test]
    fn identical_attrs_emit_nothing() {
        let mut state = AttrState::default();
        let palette = SystemPalette::default();
        state.transition(Attr::default(), false, &palette, None);
        let seq = state.transition(Attr::default(), false, &palette, None);
        assert!(seq.is_empty());
    }

    #[test]
    fn rgb_color_takes_precedence_over_indexed() {
        let mut state = AttrState::default();
        let palette = SystemPalette::default();
        let attr = Attr { fg: CellColor::Rgb(10, 20, 30), ..Attr::default() };
        let seq = state.transition(attr, true, &palette, None);
        assert!(seq.contains("38;2;10;20;30"));
    }

    #[test]
    fn byte_meter_accumulates_within_window() {
        let mut meter = ByteMeter::default();
        let now = Instant::now();
        meter.record(10, now);
        meter.record(20, now);
        assert_eq!(meter.bytes_per_second(), 0, "rate publishes only at window rollover");
    }

    #[test]
    fn protocol_selection_prefers_jexer_then_iterm2_then_sixel() {
        let config = DriverConfig::default();
        assert_eq!(select_protocol(&config, true, true), Some(ImageProtocol::Jexer));
        assert_eq!(select_protocol(&config, false, true), Some(ImageProtocol::ITerm2));
        assert_eq!(select_protocol(&config, false, false), Some(ImageProtocol::Sixel));
    }

    #[test]
    fn protocol_selection_none_when_nothing_enabled() {
        let config = DriverConfig { sixel: false, ..DriverConfig::default() };
        assert_eq!(select_protocol(&config, false, false), None);
    }

    #[test]
    fn assemble_run_image_stitches_cells_side_by_side() {
        use std::sync::Arc;

        use crate::cell::{Cell, ImageRef};
        use crate::grid::ImageRun;

        let mut screen = LogicalScreen::new(3, 1);
        let left = Arc::new(ImageBuffer::filled(2, 2, crate::color::Rgb::new(255, 0, 0)));
        let right = Arc::new(ImageBuffer::filled(2, 2, crate::color::Rgb::new(0, 255, 0)));
        screen.put_cell(0, 0, Cell { image: Some(ImageRef { fingerprint: 1, pixels: left }), ..Cell::blank() });
        screen.put_cell(1, 0, Cell { image: Some(ImageRef { fingerprint: 2, pixels: right }), ..Cell::blank() });

        let run = ImageRun { row: 0, col_start: 0, col_end: 2 };
        let (composite, cell_px_width) = assemble_run_image(&screen, &run);
        assert_eq!(cell_px_width, 2);
        assert_eq!(composite.width, 4);
        assert_eq!(composite.height, 2);
        assert_eq!(composite.get(0, 0), crate::color::Rgb::new(255, 0, 0));
        assert_eq!(composite.get(2, 0), crate::color::Rgb::new(0, 255, 0));
    }

    #[test]
    fn render_encoded_runs_prefixes_each_chunk_with_its_own_cursor_position() {
        let chunks = vec![
            EncodedRun { protocol: ImageProtocol::Sixel, data: "AAA".to_string(), cell_width: 2 },
            EncodedRun { protocol: ImageProtocol::Sixel, data: "BBB".to_string(), cell_width: 3 },
        ];
        let out = render_encoded_runs(4, 10, &chunks);
        assert_eq!(out, "\x1b[5;11HAAA\x1b[5;13HBBB");
    }

    #[test]
    fn render_encoded_runs_skips_positioning_for_empty_chunks() {
        let chunks = vec![EncodedRun { protocol: ImageProtocol::Jexer, data: String::new(), cell_width: 2 }];
        let out = render_encoded_runs(0, 0, &chunks);
        assert!(out.is_empty());
    }
}
