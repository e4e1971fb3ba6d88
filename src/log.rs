// Copyright (c) 2022-2026 vtscreen contributors. Licensed under Apache License, Version 2.0.

//! `tracing` wiring for the driver.
//!
//! Grounded on `r3bl_tui::core::log::tracing_init`: a rolling file appender
//! gated by a config flag, never a stdout/stderr sink (stdout is the
//! terminal's own display surface, so logging there would corrupt the
//! screen). Calling [`init_tracing`] more than once, or never at all, is
//! harmless - `tracing`'s global dispatcher is a best-effort `set_global_default`.

use std::path::PathBuf;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use crate::config::DriverConfig;

/// Holds the non-blocking writer's background-flush thread alive. Drop it
/// only at process shutdown or log lines in flight are lost.
#[must_use]
pub struct LogGuard(Option<WorkerGuard>);

/// Installs a `tracing` subscriber per `config.debug_log_path`.
///
/// When the path is `None` this installs a subscriber with an `EnvFilter`
/// that defaults to `off`, so the crate stays silent unless the embedding
/// binary sets `RUST_LOG`. Returns a guard that must be held for the
/// lifetime of the process.
pub fn init_tracing(config: &DriverConfig) -> LogGuard {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("off"));

    match &config.debug_log_path {
        Some(path) => {
            let guard = install_file_subscriber(path, filter);
            LogGuard(Some(guard))
        }
        None => {
            let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
            LogGuard(None)
        }
    }
}

fn install_file_subscriber(path: &std::path::Path, filter: EnvFilter) -> WorkerGuard {
    let dir = path.parent().unwrap_or_else(|| std::path::Path::new("."));
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "vtscreen.log".to_string());
    let appender = tracing_appender::rolling::never(dir, file_name);
    let (non_blocking, guard) = tracing_appender::non_blocking(appender);
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(non_blocking)
        .with_ansi(false)
        .try_init();
    guard
}

/// Default path suggestion used by `DriverConfig::default` when a caller
/// opts into file logging without naming a path.
#[must_use]
pub fn default_log_path() -> PathBuf {
    PathBuf::from("vtscreen.log")
}
