// Copyright (c) 2022-2026 vtscreen contributors. Licensed under Apache License, Version 2.0.

//! The incremental VT-input parser state machine (§3 "ParseState", §4.5).
//!
//! Unlike `r3bl_tui`'s buffer-lookahead `vt_100_terminal_input_parser`
//! (which re-scans a growing byte slice on every call), this parser is a
//! true byte-at-a-time state machine: `feed()` consumes exactly one byte
//! and returns at most one event, so it can disambiguate a bare `ESC`
//! keypress from the start of a CSI/OSC/DCS sequence with a bounded
//! timeout (§4.5 "Bare-escape timeout") instead of re-parsing the whole
//! buffer. The CSI terminator table, modifier decoding, and OSC-4/XTVERSION
//! handling are grounded on the teacher's `keyboard.rs`, `mouse.rs`, and
//! `vt_100_pty_output_parser` OSC shims, restructured into the explicit
//! `ParseState` enum the spec names.

use std::time::{Duration, Instant};

use crate::color::Rgb;
use crate::input::event::{Capability, Command, Event, Key, Modifiers, MouseAction, MouseButton, MouseEvent};

/// §3 "ParseState": `GROUND, ESCAPE, ESCAPE_INTERMEDIATE, CSI_ENTRY,
/// CSI_PARAM, XTVERSION, OSC, MOUSE, MOUSE_SGR`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseState {
    Ground,
    Escape,
    EscapeIntermediate,
    CsiEntry,
    CsiParam,
    XtVersion,
    Osc,
    Mouse,
    MouseSgr,
}

/// Idle-poll timeout (§5, §4.5): if still in `ESCAPE` after 100ms of no
/// further bytes, the next idle poll emits a true `Escape` key.
pub const BARE_ESCAPE_IDLE_POLL: Duration = Duration::from_millis(100);
/// Next-byte-check timeout (§4.5): an explicit upper bound even if the
/// idle poll is delayed.
pub const BARE_ESCAPE_NEXT_BYTE: Duration = Duration::from_millis(250);

/// A side effect the parser wants applied to shared session state that it
/// does not own directly (palette mutation, capability detection). The
/// caller (the reader thread) applies these and may fold them into the
/// returned [`Event`] stream as [`Command`] events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SideEffect {
    PaletteSlot { index: u8, rgb: Rgb },
    Capability(Capability),
}

/// Outcome of feeding one byte (or one timeout tick) to the parser.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StepOutcome {
    pub event: Option<Event>,
    pub side_effect: Option<SideEffect>,
}

impl StepOutcome {
    fn event(event: Event) -> Self { Self { event: Some(event), side_effect: None } }

    fn side_effect(effect: SideEffect) -> Self { Self { event: None, side_effect: Some(effect) } }

    fn none() -> Self { Self::default() }
}

/// The incremental input parser (§3 "ParseState"). Initial and terminal
/// state is [`ParseState::Ground`] (§8 "Parser reaches GROUND after every
/// event emission and after every bare-escape timeout").
pub struct InputParser {
    state: ParseState,
    params: Vec<String>,
    dec_private: bool,
    dec_dollar: bool,
    xtversion_query: bool,
    string_builder: String,
    escape_entered_at: Option<Instant>,
    utf8_pending: Vec<u8>,
    utf8_expected_len: usize,
    modify_other_keys: bool,
}

impl Default for InputParser {
    fn default() -> Self { Self::new() }
}

impl InputParser {
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: ParseState::Ground,
            params: Vec::new(),
            dec_private: false,
            dec_dollar: false,
            xtversion_query: false,
            string_builder: String::new(),
            escape_entered_at: None,
            utf8_pending: Vec::new(),
            utf8_expected_len: 0,
            modify_other_keys: false,
        }
    }

    #[must_use]
    pub fn state(&self) -> ParseState { self.state }

    /// Flags that the next `ESC P` should be treated as an XTVERSION reply
    /// rather than a generic DCS, set right after sending the XTVERSION
    /// query during session startup (§4.5 "ESCAPE: `P` with
    /// `xtversionQuery` one-shot").
    pub fn arm_xtversion_query(&mut self) { self.xtversion_query = true; }

    pub fn set_modify_other_keys(&mut self, enabled: bool) { self.modify_other_keys = enabled; }

    fn reset_to_ground(&mut self) {
        self.state = ParseState::Ground;
        self.params.clear();
        self.dec_private = false;
        self.dec_dollar = false;
        self.string_builder.clear();
        self.escape_entered_at = None;
    }

    /// Checks the bare-escape timeout (§4.5, §5 "100 ms/250 ms
    /// bare-escape"). Call this from the reader's idle-poll tick; returns
    /// a standalone `Escape` keypress if the parser has been stuck in
    /// `ESCAPE` too long.
    pub fn poll_timeout(&mut self, now: Instant) -> Option<Event> {
        if self.state != ParseState::Escape {
            return None;
        }
        let entered = self.escape_entered_at?;
        if now.duration_since(entered) >= BARE_ESCAPE_IDLE_POLL {
            self.reset_to_ground();
            return Some(Event::Keypress { key: Key::Escape, modifiers: Modifiers::default() });
        }
        None
    }

    /// Feeds one byte through the state machine (§4.5 "Byte-at-a-time
    /// consumption").
    pub fn feed(&mut self, byte: u8) -> StepOutcome {
        match self.state {
            ParseState::Ground => self.feed_ground(byte),
            ParseState::Escape => self.feed_escape(byte),
            ParseState::EscapeIntermediate => self.feed_escape_intermediate(byte),
            ParseState::CsiEntry | ParseState::CsiParam => self.feed_csi(byte),
            ParseState::XtVersion => self.feed_string_state(byte, StringKind::XtVersion),
            ParseState::Osc => self.feed_string_state(byte, StringKind::Osc),
            ParseState::Mouse => self.feed_mouse_x10(byte),
            ParseState::MouseSgr => self.feed_mouse_sgr(byte),
        }
    }

    fn feed_ground(&mut self, byte: u8) -> StepOutcome {
        if !self.utf8_pending.is_empty() {
            return self.feed_utf8_continuation(byte);
        }

        match byte {
            0x1B => {
                self.state = ParseState::Escape;
                self.escape_entered_at = Some(Instant::now());
                StepOutcome::none()
            }
            0x00..=0x1F => {
                self.reset_to_ground();
                StepOutcome::event(control_char_event(byte))
            }
            0x20..=0x7F => {
                self.reset_to_ground();
                StepOutcome::event(Event::Keypress {
                    key: Key::Char(byte as char),
                    modifiers: Modifiers::default(),
                })
            }
            _ => self.feed_utf8_start(byte),
        }
    }

    fn feed_utf8_start(&mut self, byte: u8) -> StepOutcome {
        let expected = utf8_sequence_len(byte);
        if expected <= 1 {
            // Invalid lead byte; drop it silently (ParseAmbiguous, §7).
            return StepOutcome::none();
        }
        self.utf8_pending = vec![byte];
        self.utf8_expected_len = expected;
        StepOutcome::none()
    }

    fn feed_utf8_continuation(&mut self, byte: u8) -> StepOutcome {
        if byte & 0xC0 != 0x80 {
            // Malformed sequence; drop what we had and reprocess this byte
            // as a fresh GROUND byte (ParseAmbiguous, §7).
            self.utf8_pending.clear();
            self.utf8_expected_len = 0;
            return self.feed_ground(byte);
        }

        self.utf8_pending.push(byte);
        if self.utf8_pending.len() < self.utf8_expected_len {
            return StepOutcome::none();
        }

        let outcome = match std::str::from_utf8(&self.utf8_pending) {
            Ok(s) => {
                let ch = s.chars().next().unwrap_or('\u{FFFD}');
                StepOutcome::event(Event::Keypress { key: Key::Char(ch), modifiers: Modifiers::default() })
            }
            Err(_) => StepOutcome::none(),
        };
        self.utf8_pending.clear();
        self.utf8_expected_len = 0;
        outcome
    }

    fn feed_escape(&mut self, byte: u8) -> StepOutcome {
        match byte {
            b'P' if self.xtversion_query => {
                self.xtversion_query = false;
                self.state = ParseState::XtVersion;
                self.string_builder.clear();
                StepOutcome::none()
            }
            b'P' => {
                // Generic DCS we don't otherwise special-case: treat like
                // OSC collection so we still find the ST terminator
                // (ParseAmbiguous path, §7) without corrupting later bytes.
                self.state = ParseState::Osc;
                self.string_builder.clear();
                StepOutcome::none()
            }
            b']' => {
                self.state = ParseState::Osc;
                self.string_builder.clear();
                StepOutcome::none()
            }
            0x00..=0x1F => {
                self.reset_to_ground();
                StepOutcome::event(Event::Keypress {
                    key: control_char_key(byte),
                    modifiers: Modifiers { alt: true, ..control_char_modifiers(byte) },
                })
            }
            b'O' => {
                self.state = ParseState::EscapeIntermediate;
                StepOutcome::none()
            }
            b'[' => {
                self.state = ParseState::CsiEntry;
                self.params = vec![String::new()];
                self.dec_private = false;
                self.dec_dollar = false;
                StepOutcome::none()
            }
            0x20..=0x7E => {
                self.reset_to_ground();
                let ch = (byte as char).to_ascii_lowercase();
                StepOutcome::event(Event::Keypress {
                    key: Key::Char(ch),
                    modifiers: Modifiers { alt: true, shift: byte.is_ascii_uppercase(), ctrl: false },
                })
            }
            _ => {
                self.reset_to_ground();
                StepOutcome::event(Event::Keypress { key: Key::Escape, modifiers: Modifiers::default() })
            }
        }
    }

    fn feed_escape_intermediate(&mut self, byte: u8) -> StepOutcome {
        self.reset_to_ground();
        match byte {
            b'P'..=b'S' => StepOutcome::event(Event::Keypress {
                key: Key::Function(byte - b'P' + 1),
                modifiers: Modifiers::default(),
            }),
            _ => StepOutcome::none(),
        }
    }

    fn feed_csi(&mut self, byte: u8) -> StepOutcome {
        self.state = ParseState::CsiParam;
        match byte {
            b'0'..=b'9' => {
                if let Some(last) = self.params.last_mut() {
                    last.push(byte as char);
                } else {
                    self.params.push((byte as char).to_string());
                }
                StepOutcome::none()
            }
            b';' => {
                self.params.push(String::new());
                StepOutcome::none()
            }
            b'?' => {
                self.dec_private = true;
                StepOutcome::none()
            }
            b'$' => {
                self.dec_dollar = true;
                StepOutcome::none()
            }
            b'<' => {
                self.state = ParseState::MouseSgr;
                self.string_builder.clear();
                StepOutcome::none()
            }
            b'M' if self.params == [String::new()] && !self.dec_private => {
                self.state = ParseState::Mouse;
                self.string_builder.clear();
                StepOutcome::none()
            }
            0x40..=0x7E => {
                let params = std::mem::take(&mut self.params);
                let dec_private = self.dec_private;
                let dec_dollar = self.dec_dollar;
                self.reset_to_ground();
                dispatch_csi_terminator(byte, &params, dec_private, dec_dollar, self.modify_other_keys)
            }
            _ => StepOutcome::none(),
        }
    }

    fn feed_string_state(&mut self, byte: u8, kind: StringKind) -> StepOutcome {
        match byte {
            0x07 if kind == StringKind::Osc => {
                let body = std::mem::take(&mut self.string_builder);
                self.reset_to_ground();
                dispatch_string_terminator(kind, &body)
            }
            0x1B => {
                // Expect `ESC \` (ST); buffer the ESC and wait for `\`.
                self.string_builder.push('\x1B');
                StepOutcome::none()
            }
            b'\\' if self.string_builder.ends_with('\x1B') => {
                self.string_builder.pop();
                let body = std::mem::take(&mut self.string_builder);
                self.reset_to_ground();
                dispatch_string_terminator(kind, &body)
            }
            _ => {
                self.string_builder.push(byte as char);
                StepOutcome::none()
            }
        }
    }

    fn feed_mouse_x10(&mut self, byte: u8) -> StepOutcome {
        self.string_builder.push(byte as char);
        if self.string_builder.len() < 3 {
            return StepOutcome::none();
        }
        let bytes: Vec<u8> = self.string_builder.chars().map(|c| c as u8).collect();
        self.reset_to_ground();
        StepOutcome::event(decode_x10_mouse(bytes[0], bytes[1], bytes[2]))
    }

    fn feed_mouse_sgr(&mut self, byte: u8) -> StepOutcome {
        match byte {
            b'M' | b'm' => {
                let body = std::mem::take(&mut self.string_builder);
                let pressed = byte == b'M';
                self.reset_to_ground();
                match decode_sgr_mouse(&body, pressed) {
                    Some(event) => StepOutcome::event(event),
                    None => StepOutcome::none(),
                }
            }
            _ => {
                self.string_builder.push(byte as char);
                StepOutcome::none()
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StringKind {
    XtVersion,
    Osc,
}

fn utf8_sequence_len(lead: u8) -> usize {
    if lead & 0xE0 == 0xC0 {
        2
    } else if lead & 0xF0 == 0xE0 {
        3
    } else if lead & 0xF8 == 0xF0 {
        4
    } else {
        1
    }
}

fn control_char_event(byte: u8) -> Event {
    Event::Keypress { key: control_char_key(byte), modifiers: control_char_modifiers(byte) }
}

fn control_char_key(byte: u8) -> Key {
    match byte {
        0x09 => Key::Tab,
        0x0D => Key::Enter,
        0x7F => Key::Backspace,
        0x01..=0x1A => Key::Char((b'a' + (byte - 1)) as char),
        _ => Key::Char('\0'),
    }
}

fn control_char_modifiers(byte: u8) -> Modifiers {
    match byte {
        0x01..=0x1A => Modifiers { ctrl: true, ..Modifiers::default() },
        _ => Modifiers::default(),
    }
}

fn parse_param(params: &[String], idx: usize, default: u16) -> u16 {
    params.get(idx).and_then(|s| s.parse().ok()).unwrap_or(default)
}

/// CSI terminator table (§4.5 "CSI terminator table (Pm... CC)").
fn dispatch_csi_terminator(
    terminator: u8,
    params: &[String],
    dec_private: bool,
    dec_dollar: bool,
    modify_other_keys: bool,
) -> StepOutcome {
    let modifiers = Modifiers::from_csi_param(parse_param(params, 1, 1));

    match terminator {
        b'A' => StepOutcome::event(Event::Keypress { key: Key::Up, modifiers }),
        b'B' => StepOutcome::event(Event::Keypress { key: Key::Down, modifiers }),
        b'C' => StepOutcome::event(Event::Keypress { key: Key::Right, modifiers }),
        b'D' => StepOutcome::event(Event::Keypress { key: Key::Left, modifiers }),
        b'H' => StepOutcome::event(Event::Keypress { key: Key::Home, modifiers }),
        b'F' => StepOutcome::event(Event::Keypress { key: Key::End, modifiers }),
        b'Z' => StepOutcome::event(Event::Keypress { key: Key::BackTab, modifiers: Modifiers::default() }),
        b'~' => dispatch_tilde(params, modify_other_keys),
        b'c' if dec_private => dispatch_da_response(params),
        b't' => dispatch_window_ops(params),
        b'S' if dec_dollar => {
            let n = parse_param(params, 0, 0);
            StepOutcome::side_effect(SideEffect::Capability(Capability::GraphicsPaletteRegisters(u32::from(n))))
        }
        b'y' => dispatch_decrpm(params),
        _ => StepOutcome::none(),
    }
}

/// `~` terminator: Home/Ins/Del/End/PgUp/PgDn/F5..F12, or a
/// modifyOtherKeys payload (`CSI 27 ; mod ; code ~`).
fn dispatch_tilde(params: &[String], modify_other_keys: bool) -> StepOutcome {
    let pn = parse_param(params, 0, 1);

    if pn == 27 && modify_other_keys {
        let modifier_param = parse_param(params, 1, 1);
        let code = parse_param(params, 2, 0);
        let modifiers = Modifiers::from_csi_param(modifier_param);
        if let Some(ch) = char::from_u32(u32::from(code)) {
            let ch = if modifiers.shift { ch.to_ascii_uppercase() } else { ch };
            return StepOutcome::event(Event::Keypress { key: Key::Char(ch), modifiers });
        }
        return StepOutcome::none();
    }

    let modifiers = Modifiers::from_csi_param(parse_param(params, 1, 1));
    let key = match pn {
        1 => Key::Home,
        2 => Key::Insert,
        3 => Key::Delete,
        4 => Key::End,
        5 => Key::PageUp,
        6 => Key::PageDown,
        15 => Key::Function(5),
        17 => Key::Function(6),
        18 => Key::Function(7),
        19 => Key::Function(8),
        20 => Key::Function(9),
        21 => Key::Function(10),
        23 => Key::Function(11),
        24 => Key::Function(12),
        _ => return StepOutcome::none(),
    };
    StepOutcome::event(Event::Keypress { key, modifiers })
}

/// DA response: `CSI ? Pm c`; recognize `4` (sixel) and `444` (Jexer).
fn dispatch_da_response(params: &[String]) -> StepOutcome {
    for param in params {
        match param.as_str() {
            "4" => return StepOutcome::side_effect(SideEffect::Capability(Capability::Sixel)),
            "444" => return StepOutcome::side_effect(SideEffect::Capability(Capability::JexerImages)),
            _ => {}
        }
    }
    StepOutcome::none()
}

/// `t` windowOps: `4` = window pixel dimensions, `6` = cell pixel
/// dimensions, both reported as `CSI 4 ; height ; width t`.
fn dispatch_window_ops(params: &[String]) -> StepOutcome {
    let kind = parse_param(params, 0, 0);
    let height = parse_param(params, 1, 0);
    let width = parse_param(params, 2, 0);
    match kind {
        4 => StepOutcome::side_effect(SideEffect::Capability(Capability::WindowOpsPixels(width, height))),
        6 => StepOutcome::side_effect(SideEffect::Capability(Capability::WindowOpsCells(width, height))),
        _ => StepOutcome::none(),
    }
}

/// DECRPM: `CSI ? Ps ; Pm $ y`. `1016` => pixel mouse, `2026` =>
/// synchronized output.
fn dispatch_decrpm(params: &[String]) -> StepOutcome {
    let mode = parse_param(params, 0, 0);
    let state = parse_param(params, 1, 0);
    if state == 0 {
        return StepOutcome::none();
    }
    match mode {
        1016 => StepOutcome::side_effect(SideEffect::Capability(Capability::PixelMouse)),
        2026 => StepOutcome::side_effect(SideEffect::Capability(Capability::SynchronizedOutput)),
        _ => StepOutcome::none(),
    }
}

fn decode_x10_mouse(cb: u8, cx: u8, cy: u8) -> Event {
    let col = u16::from(cx.saturating_sub(32));
    let row = u16::from(cy.saturating_sub(32));
    let modifiers = Modifiers {
        shift: cb & 4 != 0,
        alt: cb & 8 != 0,
        ctrl: cb & 16 != 0,
    };
    let motion = cb & 32 != 0;
    let button = match cb & 0x03 {
        0 => MouseButton::Left,
        1 => MouseButton::Middle,
        2 => MouseButton::Right,
        _ => MouseButton::None,
    };
    let action = if motion {
        MouseAction::Motion
    } else if button == MouseButton::None {
        MouseAction::Up
    } else {
        MouseAction::Down
    };
    Event::Mouse(MouseEvent {
        action,
        button,
        cell_x: col,
        cell_y: row,
        pixel_x: 0,
        pixel_y: 0,
        modifiers,
    })
}

/// Decodes the SGR mouse protocol body (`Cb;Cx;Cy`), given the press/release
/// terminator already consumed (§4.5 "MOUSE_SGR: numeric params; `M`/`m`
/// terminate as press/release.", §8 scenario 3).
fn decode_sgr_mouse(body: &str, pressed: bool) -> Option<Event> {
    let mut parts = body.split(';');
    let cb: u16 = parts.next()?.parse().ok()?;
    let cx: u16 = parts.next()?.parse().ok()?;
    let cy: u16 = parts.next()?.parse().ok()?;

    let modifiers = Modifiers {
        shift: cb & 4 != 0,
        alt: cb & 8 != 0,
        ctrl: cb & 16 != 0,
    };
    let motion = cb & 32 != 0;
    let low = cb & 0x03;

    let (button, action) = if cb & 0x40 != 0 {
        let button = if low == 0 { MouseButton::WheelUp } else { MouseButton::WheelDown };
        (button, MouseAction::Down)
    } else {
        let button = match low {
            0 => MouseButton::Left,
            1 => MouseButton::Middle,
            2 => MouseButton::Right,
            _ => MouseButton::None,
        };
        let action = if motion {
            MouseAction::Motion
        } else if pressed {
            MouseAction::Down
        } else {
            MouseAction::Up
        };
        (button, action)
    };

    Some(Event::Mouse(MouseEvent {
        action,
        button,
        cell_x: cx.saturating_sub(1),
        cell_y: cy.saturating_sub(1),
        pixel_x: 0,
        pixel_y: 0,
        modifiers,
    }))
}

fn dispatch_string_terminator(kind: StringKind, body: &str) -> StepOutcome {
    match kind {
        StringKind::XtVersion => dispatch_xtversion(body),
        StringKind::Osc => dispatch_osc(body),
    }
}

/// Fingerprinting (§4.5 "Fingerprinting (XTVERSION body)"): substring
/// match enables iTerm2 image assumption and, for WezTerm, bottom-row
/// image emission.
fn dispatch_xtversion(body: &str) -> StepOutcome {
    if body.contains("WezTerm") {
        return StepOutcome::side_effect(SideEffect::Capability(Capability::JexerImages));
    }
    if body.contains("mintty") || body.contains("iTerm2") {
        return StepOutcome::side_effect(SideEffect::Capability(Capability::ITerm2Like));
    }
    StepOutcome::none()
}

/// OSC dispatcher. Currently handles OSC-4 palette responses (§4.5 "OSC 4
/// handling"); anything else is a silent `ParseAmbiguous` reset (§7).
fn dispatch_osc(body: &str) -> StepOutcome {
    let mut parts = body.splitn(3, ';');
    match parts.next() {
        Some("4") => {
            let Some(index_str) = parts.next() else { return StepOutcome::none() };
            let Some(color_spec) = parts.next() else { return StepOutcome::none() };
            let Ok(index) = index_str.parse::<u8>() else { return StepOutcome::none() };
            match parse_osc4_rgb(color_spec) {
                Some(rgb) => StepOutcome::side_effect(SideEffect::PaletteSlot { index, rgb }),
                None => StepOutcome::none(),
            }
        }
        _ => StepOutcome::none(),
    }
}

/// Parses `rgb:RR[RR]/GG[GG]/BB[BB]`, right-shifting 4-hex-digit channels
/// by 8 (§4.5 "4-hex-digit channels are right-shifted by 8").
fn parse_osc4_rgb(spec: &str) -> Option<Rgb> {
    let spec = spec.strip_prefix("rgb:")?;
    let mut channels = spec.split('/');
    let r = parse_osc4_channel(channels.next()?)?;
    let g = parse_osc4_channel(channels.next()?)?;
    let b = parse_osc4_channel(channels.next()?)?;
    Some(Rgb::new(r, g, b))
}

fn parse_osc4_channel(hex: &str) -> Option<u8> {
    match hex.len() {
        2 => u8::from_str_radix(hex, 16).ok(),
        4 => u16::from_str_radix(hex, 16).ok().map(|v| (v >> 8) as u8),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed_str(parser: &mut InputParser, s: &str) -> Vec<StepOutcome> {
        s.bytes().map(|b| parser.feed(b)).collect()
    }

    /// Scenario 1 (§8): `ESC [ 1 ; 5 A` ⇒ Keypress(Up, ctrl=true).
    #[test]
    fn scenario_1_ctrl_up() {
        let mut parser = InputParser::new();
        let outcomes = feed_str(&mut parser, "\x1b[1;5A");
        let event = outcomes.into_iter().find_map(|o| o.event).unwrap();
        assert_eq!(
            event,
            Event::Keypress { key: Key::Up, modifiers: Modifiers { ctrl: true, alt: false, shift: false } }
        );
        assert_eq!(parser.state(), ParseState::Ground);
    }

    /// Scenario 2 (§8): `ESC [ 2 7 ; 6 ; 9 7 ~` ⇒ Keypress('a',
    /// ctrl=true, shift=true), uppercased per modifyOtherKeys rule -
    /// 97 is lowercase 'a', and shift uppercases it to 'A'.
    #[test]
    fn scenario_2_modify_other_keys_uppercases() {
        let mut parser = InputParser::new();
        parser.set_modify_other_keys(true);
        let outcomes = feed_str(&mut parser, "\x1b[27;6;97~");
        let event = outcomes.into_iter().find_map(|o| o.event).unwrap();
        assert_eq!(
            event,
            Event::Keypress { key: Key::Char('A'), modifiers: Modifiers { ctrl: true, alt: false, shift: true } }
        );
    }

    /// Scenario 3 (§8): SGR mouse down then up.
    #[test]
    fn scenario_3_sgr_mouse_down_up() {
        let mut parser = InputParser::new();
        let down = feed_str(&mut parser, "\x1b[<0;10;20M").into_iter().find_map(|o| o.event).unwrap();
        assert_eq!(
            down,
            Event::Mouse(MouseEvent {
                action: MouseAction::Down,
                button: MouseButton::Left,
                cell_x: 9,
                cell_y: 19,
                pixel_x: 0,
                pixel_y: 0,
                modifiers: Modifiers::default(),
            })
        );
        let up = feed_str(&mut parser, "\x1b[<0;10;20m").into_iter().find_map(|o| o.event).unwrap();
        assert_eq!(
            up,
            Event::Mouse(MouseEvent {
                action: MouseAction::Up,
                button: MouseButton::Left,
                cell_x: 9,
                cell_y: 19,
                pixel_x: 0,
                pixel_y: 0,
                modifiers: Modifiers::default(),
            })
        );
    }

    /// Scenario 4 (§8): OSC 4 palette update.
    #[test]
    fn scenario_4_osc4_palette_update() {
        let mut parser = InputParser::new();
        let outcomes = feed_str(&mut parser, "\x1b]4;1;rgb:ff/00/00\x1b\\");
        let side_effect = outcomes.into_iter().find_map(|o| o.side_effect).unwrap();
        assert_eq!(side_effect, SideEffect::PaletteSlot { index: 1, rgb: Rgb::new(0xFF, 0, 0) });
    }

    #[test]
    fn bare_escape_standalone_key() {
        let mut parser = InputParser::new();
        let outcome = parser.feed(0x1B);
        assert!(outcome.event.is_none());
        assert_eq!(parser.state(), ParseState::Escape);

        let event = parser.poll_timeout(Instant::now() + BARE_ESCAPE_IDLE_POLL);
        assert_eq!(event, Some(Event::Keypress { key: Key::Escape, modifiers: Modifiers::default() }));
        assert_eq!(parser.state(), ParseState::Ground);
    }

    #[test]
    fn unknown_esc_sequence_falls_back_to_escape_key() {
        let mut parser = InputParser::new();
        parser.feed(0x1B);
        let outcome = parser.feed(0x01); // ESC + Ctrl+A-range byte: Alt+Ctrl path.
        assert!(outcome.event.is_some());
        assert_eq!(parser.state(), ParseState::Ground);
    }

    #[test]
    fn modifier_decode_table() {
        for p in 1u16..=8 {
            let m = Modifiers::from_csi_param(p);
            assert_eq!(m.shift, matches!(p, 2 | 4 | 6 | 8));
            assert_eq!(m.alt, matches!(p, 3 | 4 | 7 | 8));
            assert_eq!(m.ctrl, matches!(p, 5 | 6 | 7 | 8));
        }
    }

    #[test]
    fn multi_byte_utf8_character() {
        let mut parser = InputParser::new();
        let bytes = "é".as_bytes();
        let mut event = None;
        for &b in bytes {
            let outcome = parser.feed(b);
            if outcome.event.is_some() {
                event = outcome.event;
            }
        }
        assert_eq!(event, Some(Event::Keypress { key: Key::Char('é'), modifiers: Modifiers::default() }));
        assert_eq!(parser.state(), ParseState::Ground);
    }

    #[test]
    fn plain_character_resets_to_ground() {
        let mut parser = InputParser::new();
        let outcome = parser.feed(b'H');
        assert_eq!(outcome.event, Some(Event::Keypress { key: Key::Char('H'), modifiers: Modifiers::default() }));
        assert_eq!(parser.state(), ParseState::Ground);
    }

    #[test]
    fn control_character_ctrl_a() {
        let mut parser = InputParser::new();
        let outcome = parser.feed(0x01);
        assert_eq!(
            outcome.event,
            Some(Event::Keypress { key: Key::Char('a'), modifiers: Modifiers { ctrl: true, alt: false, shift: false } })
        );
    }

    #[test]
    fn ss3_f1_key() {
        let mut parser = InputParser::new();
        feed_str(&mut parser, "\x1bO");
        let outcome = parser.feed(b'P');
        assert_eq!(outcome.event, Some(Event::Keypress { key: Key::Function(1), modifiers: Modifiers::default() }));
    }

    #[test]
    fn da_response_detects_sixel() {
        let mut parser = InputParser::new();
        let outcomes = feed_str(&mut parser, "\x1b[?4;4c");
        assert!(outcomes
            .into_iter()
            .any(|o| o.side_effect == Some(SideEffect::Capability(Capability::Sixel))));
    }

    #[test]
    fn decrpm_synchronized_output() {
        let mut parser = InputParser::new();
        let outcomes = feed_str(&mut parser, "\x1b[?2026;1$y");
        assert!(outcomes
            .into_iter()
            .any(|o| o.side_effect == Some(SideEffect::Capability(Capability::SynchronizedOutput))));
    }
}
