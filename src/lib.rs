// Copyright (c) 2022-2026 vtscreen contributors. Licensed under Apache License, Version 2.0.

//! An ANSI/ECMA-48 terminal driver: a differential cell-grid renderer, a
//! cached multi-format image pipeline (sixel, iTerm2, Jexer), and an
//! incremental VT-input parser, fused behind one `TerminalDriver` facade.
//!
//! Module layout follows the teacher's `core` re-export convention
//! (`r3bl_tui::core::mod`): each subsystem is its own module, re-exported
//! flatly from the crate root so downstream code writes `vtscreen::Cell`
//! rather than `vtscreen::cell::Cell`.

pub mod cell;
pub mod color;
pub mod config;
pub mod error;
pub mod grid;
pub mod image;
pub mod input;
pub mod log;
pub mod output;
pub mod reader;
pub mod session;

pub use cell::{Attr, Cell, CellColor, CellWidth, ImageRef, PaletteIndex};
pub use color::{Hsl, Rgb, SixelPalette, SystemPalette};
pub use config::{ColorOverrides, DriverConfig, JexerImageFormat, SixelEncoderKind, SixelPaletteSize};
pub use error::{DriverError, DriverResult, EncodeError, SessionError};
pub use grid::LogicalScreen;
pub use image::{ImageBuffer, ImageCache, ImagePool, ImageProtocol};
pub use input::{Capability, Command, Event, InputParser, Key, Modifiers, MouseAction, MouseButton, MouseEvent};
pub use log::{init_tracing, LogGuard};
pub use output::{AttrState, ByteMeter, OutputEngine};
pub use reader::{ByteSource, EventQueue, FdByteSource, ReaderHandle};
pub use session::{Backend, GlyphMaker, SessionInfo, TerminalSession};

use std::io::Write;
use std::sync::Arc;

use crossbeam_channel::{Receiver, Sender};

/// The fused facade over the grid, output engine, image pipeline, parser,
/// and session lifecycle (§2 "Data flow").
///
/// A `TerminalDriver` owns exactly the state the spec assigns to a single
/// session: the logical/physical grid, the system and sixel palettes, the
/// image cache and worker pool, and the reader-published event queue. It
/// does not own the byte sink; callers pass one to [`TerminalDriver::flush`]
/// so the same driver can be reused against a mock sink in tests.
pub struct TerminalDriver {
    screen: LogicalScreen,
    output: OutputEngine,
    system_palette: SystemPalette,
    sixel_palette: Option<SixelPalette>,
    cache: ImageCache,
    pool: ImagePool,
    config: DriverConfig,
    session: TerminalSession,
    queue: Arc<EventQueue>,
    reader: Option<ReaderHandle>,
    side_effects_rx: Receiver<input::SideEffect>,
    side_effects_tx: Sender<input::SideEffect>,
    synchronized_output_supported: bool,
    jexer_images_supported: bool,
    iterm2_like_detected: bool,
}

impl TerminalDriver {
    #[must_use]
    pub fn new(width: usize, height: usize, config: DriverConfig) -> Self {
        let (side_effects_tx, side_effects_rx) = crossbeam_channel::unbounded();
        let system_palette = SystemPalette::with_overrides(&config.color_overrides);
        let sixel_palette = config
            .resolve_sixel_shared_palette()
            .then(|| SixelPalette::build(config.sixel_palette_size));
        let pool = ImagePool::new(config.image_thread_count);
        let cache = ImageCache::new(config.image_cache_capacity.max(1));

        Self {
            screen: LogicalScreen::new(width, height),
            output: OutputEngine::default(),
            system_palette,
            sixel_palette,
            cache,
            pool,
            config,
            session: TerminalSession::new(),
            queue: EventQueue::new(),
            reader: None,
            side_effects_rx,
            side_effects_tx,
            synchronized_output_supported: false,
            jexer_images_supported: false,
            iterm2_like_detected: false,
        }
    }

    /// Runs the startup escape-sequence burst and spins up the reader
    /// thread over `source` (§4.6 "Startup sequence").
    pub fn start<W: Write, S: ByteSource + 'static>(&mut self, sink: &mut W, source: S) -> DriverResult<()> {
        self.session.startup_sequence(sink, &self.config)?;
        self.reader = Some(reader::spawn(source, Arc::clone(&self.queue), self.side_effects_tx.clone()));
        Ok(())
    }

    /// Runs the teardown burst and stops the reader thread (§4.6
    /// "Shutdown").
    pub fn shutdown<W: Write>(&mut self, sink: &mut W) -> DriverResult<()> {
        if let Some(reader) = self.reader.take() {
            reader.stop()?;
        }
        self.session.shutdown_sequence(sink, &self.config)?;
        Ok(())
    }

    pub fn put_cell(&mut self, x: usize, y: usize, cell: Cell) { self.screen.put_cell(x, y, cell); }

    pub fn clear(&mut self) { self.screen.clear(); }

    pub fn resize(&mut self, width: usize, height: usize) { self.screen.resize(width, height); }

    /// Applies any palette/capability side effects the reader observed
    /// since the last flush, forcing a full redraw on palette change
    /// (§4.5 "Any palette change triggers a full physical redraw").
    pub fn apply_pending_side_effects(&mut self) {
        while let Ok(effect) = self.side_effects_rx.try_recv() {
            match effect {
                input::SideEffect::PaletteSlot { index, rgb } => {
                    if self.system_palette.set(index, rgb) {
                        self.screen.force_full_redraw();
                    }
                }
                input::SideEffect::Capability(input::Capability::SynchronizedOutput) => {
                    self.synchronized_output_supported = true;
                }
                input::SideEffect::Capability(input::Capability::JexerImages) => {
                    self.jexer_images_supported = true;
                }
                input::SideEffect::Capability(input::Capability::ITerm2Like) => {
                    self.iterm2_like_detected = true;
                }
                input::SideEffect::Capability(_) => {}
            }
        }
    }

    /// Drains queued input events without blocking (§5 "Application
    /// thread: calls `flush()` and drains events").
    #[must_use]
    pub fn drain_events(&self) -> Vec<Event> { self.queue.drain() }

    /// Runs one complete differential flush against `sink` (§4.1
    /// `flush()`).
    pub fn flush<W: Write>(&mut self, sink: &mut W, pulse_rgb: Option<(u8, u8, u8)>) -> std::io::Result<usize> {
        self.output.flush(
            sink,
            &mut self.screen,
            &self.pool,
            &self.cache,
            self.sixel_palette.as_ref(),
            &self.system_palette,
            &self.config,
            self.synchronized_output_supported,
            self.jexer_images_supported,
            self.iterm2_like_detected,
            pulse_rgb,
        )
    }

    #[must_use]
    pub fn config(&self) -> &DriverConfig { &self.config }

    #[must_use]
    pub fn screen(&self) -> &LogicalScreen { &self.screen }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn driver_flush_renders_a_single_written_cell() {
        let mut driver = TerminalDriver::new(10, 3, DriverConfig::default());
        driver.put_cell(2, 1, Cell { ch: 'x', ..Cell::blank() });

        let mut sink = Vec::new();
        let written = driver.flush(&mut sink, None).unwrap();
        assert!(written > 0);
        let text = String::from_utf8(sink).unwrap();
        assert!(text.contains('x'));
    }

    #[test]
    fn second_flush_of_unchanged_grid_is_small() {
        let mut driver = TerminalDriver::new(10, 3, DriverConfig::default());
        driver.put_cell(0, 0, Cell { ch: 'a', ..Cell::blank() });

        let mut first_sink = Vec::new();
        driver.flush(&mut first_sink, None).unwrap();

        let mut second_sink = Vec::new();
        let written = driver.flush(&mut second_sink, None).unwrap();
        // Scenario 5 (§8): only cursor positioning (and visibility) survive.
        assert!(written < first_sink.len());
    }

    #[test]
    fn palette_side_effect_forces_full_redraw() {
        let mut driver = TerminalDriver::new(4, 2, DriverConfig::default());
        driver.put_cell(0, 0, Cell { ch: 'z', ..Cell::blank() });
        let mut sink = Vec::new();
        driver.flush(&mut sink, None).unwrap();
        assert!(!driver.screen().really_cleared());

        driver.side_effects_tx.send(input::SideEffect::PaletteSlot { index: 1, rgb: Rgb::new(1, 2, 3) }).unwrap();
        driver.apply_pending_side_effects();
        assert!(driver.screen().really_cleared());
    }
}
