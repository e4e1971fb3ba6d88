// Copyright (c) 2022-2026 vtscreen contributors. Licensed under Apache License, Version 2.0.

//! Terminal session setup/teardown (§4.6) and the `SessionInfo`/`Backend`/
//! `GlyphMaker` collaborator traits (§6).
//!
//! Raw-mode toggling is grounded on `rustix::termios`, the way the teacher
//! avoids a full terminal-manipulation crate (`crossterm`/`termion`) in
//! favor of the narrow syscall wrapper it actually needs.

use std::io::Write;
use std::os::fd::{AsFd, BorrowedFd};

use rustix::termios::{self, Termios};

use crate::config::DriverConfig;
use crate::error::{DriverResult, SessionError};
use crate::image::ImageBuffer;

/// Window-size query collaborator (§6 `SessionInfo`).
pub trait SessionInfo {
    /// Re-queries the controlling terminal's current size; implementations
    /// typically call `TIOCGWINSZ` or an equivalent platform primitive.
    fn query_window_size(&mut self) -> DriverResult<()>;
    fn width(&self) -> u16;
    fn height(&self) -> u16;
}

/// Identifies the event source and whether it can accept writes (§6
/// `Backend`).
pub trait Backend {
    fn is_read_only(&self) -> bool;
    /// An opaque token carried on every event so applications with more
    /// than one backend can tell them apart (§6 "a token carried on every
    /// event so applications can identify origin").
    fn token(&self) -> u64;
}

/// Renders a fallback glyph bitmap for code points a font cannot shape
/// directly - legacy-computing block characters, braille patterns (§6
/// `GlyphMaker`).
pub trait GlyphMaker {
    fn make_glyph(&self, ch: char, cell_px_width: u32, cell_px_height: u32) -> Option<ImageBuffer>;
}

/// Saved termios state, restored on teardown.
struct RawModeGuard {
    original: Termios,
}

/// Owns the raw-mode lifecycle and setup/teardown escape-sequence bursts
/// for one terminal session (§4.6).
pub struct TerminalSession {
    raw_mode: Option<RawModeGuard>,
    started: bool,
}

impl Default for TerminalSession {
    fn default() -> Self { Self { raw_mode: None, started: false } }
}

impl TerminalSession {
    #[must_use]
    pub fn new() -> Self { Self::default() }

    /// Puts `fd` into raw mode, if it is the controlling terminal (§6
    /// "Raw-mode toggling is performed only when the byte source is the
    /// controlling terminal").
    pub fn enter_raw_mode(&mut self, fd: BorrowedFd<'_>) -> DriverResult<()> {
        if !termios::isatty(fd) {
            return Ok(());
        }

        let original = termios::tcgetattr(fd).map_err(|e| SessionError::RawMode(e.into()))?;
        let mut raw = original.clone();
        raw.make_raw();
        termios::tcsetattr(fd, termios::OptionalActions::Flush, &raw)
            .map_err(|e| SessionError::RawMode(e.into()))?;

        self.raw_mode = Some(RawModeGuard { original });
        Ok(())
    }

    /// Restores the saved termios state, if raw mode was entered (§4.6
    /// "Shutdown: ... if raw-mode was set, restore cooked mode").
    pub fn restore_cooked_mode(&mut self, fd: BorrowedFd<'_>) -> DriverResult<()> {
        if let Some(guard) = self.raw_mode.take() {
            termios::tcsetattr(fd, termios::OptionalActions::Flush, &guard.original)
                .map_err(|e| SessionError::RawMode(e.into()))?;
        }
        Ok(())
    }

    /// The exact-once startup burst (§4.6 "Startup sequence"): XTVERSION
    /// query, DA query, pixel-dimension queries, mouse enable + alternate
    /// screen + hide-pointer, meta-sends-escape, DECRQM probes, OSC-4
    /// queries for all 16 colors, then a clear-screen.
    pub fn startup_sequence<W: Write>(&mut self, sink: &mut W, config: &DriverConfig) -> std::io::Result<()> {
        let mut burst = String::new();
        burst.push_str("\x1b[>q"); // XTVERSION query (ESC [ > q == XTVERSION in recent xterm).
        burst.push_str("\x1b[c"); // DA query.
        burst.push_str("\x1b[14t"); // window pixel dimensions.
        burst.push_str("\x1b[16t"); // cell pixel dimensions.
        burst.push_str("\x1b[?1002;1003;1005;1006h"); // mouse tracking modes.
        burst.push_str("\x1b[?1049h"); // alternate screen.
        burst.push_str("\x1b[?1000h"); // vendor hide-pointer (best-effort).

        if config.modify_other_keys {
            burst.push_str("\x1b[>4;1m"); // modifyOtherKeys request.
        }

        burst.push_str("\x1b[?1036h"); // meta-sends-escape.
        burst.push_str("\x1b[?2026$p"); // DECRQM synchronized output.
        burst.push_str("\x1b[?1016$p"); // DECRQM pixel mouse.

        for i in 0..16u8 {
            let _ = write!(burst, "\x1b]4;{i};?\x1b\\");
        }

        burst.push_str("\x1b[2J\x1b[H");

        sink.write_all(burst.as_bytes())?;
        sink.flush()?;
        self.started = true;
        Ok(())
    }

    /// Best-effort teardown: disable mouse, show cursor, reset color,
    /// reset sixel settings, disable modifyOtherKeys, leave alternate
    /// screen (§4.6 "Shutdown").
    pub fn shutdown_sequence<W: Write>(&mut self, sink: &mut W, config: &DriverConfig) -> std::io::Result<()> {
        if !self.started {
            return Ok(());
        }
        let mut burst = String::new();
        burst.push_str("\x1b[?1002;1003;1005;1006l");
        burst.push_str("\x1b[?25h");
        burst.push_str("\x1b[39;49m");
        burst.push_str("\x1b[?80l");
        if config.modify_other_keys {
            burst.push_str("\x1b[>4;0m");
        }
        burst.push_str("\x1b[?1049l");
        sink.write_all(burst.as_bytes())?;
        sink.flush()?;
        self.started = false;
        Ok(())
    }
}

/// Enters raw mode for the process's own stdin, if it is a TTY.
///
/// Convenience wrapper for the common case where the byte source is the
/// controlling terminal itself.
pub fn enter_stdin_raw_mode(session: &mut TerminalSession) -> DriverResult<()> {
    let stdin = std::io::stdin();
    session.enter_raw_mode(stdin.as_fd())
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedSessionInfo {
        width: u16,
        height: u16,
    }

    impl SessionInfo for FixedSessionInfo {
        fn query_window_size(&mut self) -> DriverResult<()> { Ok(()) }
        fn width(&self) -> u16 { self.width }
        fn height(&self) -> u16 { self.height }
    }

    #[test]
    fn session_info_collaborator_reports_fixed_size() {
        let mut info = FixedSessionInfo { width: 80, height: 24 };
        info.query_window_size().unwrap();
        assert_eq!((info.width(), info.height()), (80, 24));
    }

    #[test]
    fn startup_sequence_writes_to_sink_without_tty() {
        let mut session = TerminalSession::new();
        let mut sink = Vec::new();
        session.startup_sequence(&mut sink, &DriverConfig::default()).unwrap();
        let text = String::from_utf8(sink).unwrap();
        assert!(text.contains("\x1b[?1049h"));
        assert!(text.contains("\x1b[2J\x1b[H"));
    }

    #[test]
    fn shutdown_sequence_is_noop_before_startup() {
        let mut session = TerminalSession::new();
        let mut sink = Vec::new();
        session.shutdown_sequence(&mut sink, &DriverConfig::default()).unwrap();
        assert!(sink.is_empty());
    }

    #[test]
    fn shutdown_after_startup_disables_alternate_screen() {
        let mut session = TerminalSession::new();
        let mut startup_sink = Vec::new();
        session.startup_sequence(&mut startup_sink, &DriverConfig::default()).unwrap();

        let mut shutdown_sink = Vec::new();
        session.shutdown_sequence(&mut shutdown_sink, &DriverConfig::default()).unwrap();
        let text = String::from_utf8(shutdown_sink).unwrap();
        assert!(text.contains("\x1b[?1049l"));
    }
}
