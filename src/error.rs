// Copyright (c) 2022-2026 vtscreen contributors. Licensed under Apache License, Version 2.0.

//! Crate-wide error types.
//!
//! Only [`DriverError`] ever crosses a public function boundary (see §7 of the
//! design doc: `Encoding`, `ParseAmbiguous`, `ConfigInvalid` and
//! `CapabilityMissing` are recovered locally and never raised). Internal
//! subsystems get their own `thiserror` enum so a `tracing::warn!` call site
//! can name the failure precisely; [`DriverError`] wraps whichever of those
//! actually escaped.

use miette::Diagnostic;
use thiserror::Error;

/// Errors that can escape the driver's public API.
///
/// Everything else described in §7 (`Encoding`, `ParseAmbiguous`,
/// `ConfigInvalid`, `CapabilityMissing`) is recovered internally and only
/// ever observed through `tracing` logs or a degraded capability.
#[derive(Debug, Error, Diagnostic)]
pub enum DriverError {
    /// The byte source or sink failed. The reader thread terminates and a
    /// disconnect [`crate::input::Event::Command`] is the only thing handed
    /// back to the application.
    #[error("terminal byte stream failed")]
    #[diagnostic(code(vtscreen::io))]
    Io(#[from] std::io::Error),

    /// Session setup/teardown failed (raw mode, handshake).
    #[error(transparent)]
    #[diagnostic(transparent)]
    Session(#[from] SessionError),
}

/// Failures from [`crate::session::TerminalSession`] setup/teardown.
#[derive(Debug, Error, Diagnostic)]
pub enum SessionError {
    #[error("failed to enter raw mode")]
    #[diagnostic(
        code(vtscreen::session::raw_mode_failed),
        help("the byte source is not the controlling terminal, or termios access was denied")
    )]
    RawMode(#[source] std::io::Error),

    #[error("worker pool failed to start ({workers} workers requested)")]
    #[diagnostic(code(vtscreen::session::pool_start_failed))]
    PoolStart { workers: usize },

    #[error("reader thread failed to join cleanly")]
    #[diagnostic(code(vtscreen::session::reader_join_failed))]
    ReaderJoin,
}

/// Image-encode failures. Never surfaced to the caller (§7 `Encoding`): a
/// run that fails to encode is dropped and blank cells are emitted in its
/// place instead.
#[derive(Debug, Error, Diagnostic, PartialEq, Eq)]
pub enum EncodeError {
    #[error("image buffer dimensions ({width}x{height}) do not match the cell run")]
    #[diagnostic(code(vtscreen::image::dimension_mismatch))]
    DimensionMismatch { width: u32, height: u32 },

    #[error("underlying image codec failed: {0}")]
    #[diagnostic(code(vtscreen::image::codec))]
    Codec(String),

    #[error("worker panicked while encoding a run")]
    #[diagnostic(code(vtscreen::image::worker_panic))]
    WorkerPanic,
}

pub type DriverResult<T> = Result<T, DriverError>;
