// Copyright (c) 2022-2026 vtscreen contributors. Licensed under Apache License, Version 2.0.

//! VT input parsing: the public [`Event`] vocabulary and the incremental
//! state-machine [`parser::InputParser`] that produces it (§3, §4.5).
//!
//! The CSI terminator table, SGR/X10 mouse decoding, and OSC-4/XTVERSION
//! dispatch live directly in `parser` rather than split into separate
//! `keyboard.rs`/`mouse.rs`/`osc.rs` files: each is a handful of match arms
//! reached only from inside the state machine's own transition table, and
//! the teacher's own `vt_100_terminal_input_parser` module similarly keeps
//! CSI final-byte dispatch next to the state enum rather than behind a
//! separate public module boundary.

pub mod event;
pub mod parser;

pub use event::{Capability, Command, Event, Key, Modifiers, MouseAction, MouseButton, MouseEvent};
pub use parser::{InputParser, ParseState, SideEffect, StepOutcome};
