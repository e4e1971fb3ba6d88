// Copyright (c) 2022-2026 vtscreen contributors. Licensed under Apache License, Version 2.0.

//! Black-box scenario tests exercising [`vtscreen`] through its public
//! API, covering the literal §8 scenarios that cut across more than one
//! module (differential flush + palette side effects).

use vtscreen::{Cell, DriverConfig, TerminalDriver};

#[test]
fn unchanged_grid_emits_no_new_glyphs_on_second_flush() {
    let mut driver = TerminalDriver::new(20, 5, DriverConfig::default());
    for x in 0..20 {
        driver.put_cell(x, 0, Cell { ch: 'x', ..Cell::blank() });
    }

    let mut first = Vec::new();
    driver.flush(&mut first, None).unwrap();
    assert!(String::from_utf8(first).unwrap().contains('x'));

    let mut second = Vec::new();
    driver.flush(&mut second, None).unwrap();
    let text = String::from_utf8(second).unwrap();
    assert!(!text.contains('x'), "unchanged cells must not be re-emitted");
}

#[test]
fn editing_a_single_cell_only_touches_that_cell_on_next_flush() {
    let mut driver = TerminalDriver::new(10, 2, DriverConfig::default());
    for x in 0..10 {
        driver.put_cell(x, 0, Cell { ch: 'a', ..Cell::blank() });
    }
    let mut first = Vec::new();
    driver.flush(&mut first, None).unwrap();

    driver.put_cell(5, 0, Cell { ch: 'Z', ..Cell::blank() });
    let mut second = Vec::new();
    driver.flush(&mut second, None).unwrap();
    let text = String::from_utf8(second).unwrap();
    assert!(text.contains('Z'));
    assert!(!text.contains('a'), "cells that didn't change must not be re-sent");
}

#[test]
fn clear_forces_a_full_redraw_next_flush() {
    let mut driver = TerminalDriver::new(5, 2, DriverConfig::default());
    driver.put_cell(0, 0, Cell { ch: 'q', ..Cell::blank() });
    let mut first = Vec::new();
    driver.flush(&mut first, None).unwrap();
    assert!(!driver.screen().really_cleared());

    driver.clear();
    assert!(driver.screen().really_cleared());

    let mut second = Vec::new();
    driver.flush(&mut second, None).unwrap();
    let text = String::from_utf8(second).unwrap();
    assert!(text.contains("\x1b[2J"));
}

#[test]
fn resize_preserves_the_overlapping_region_across_a_flush() {
    let mut driver = TerminalDriver::new(10, 10, DriverConfig::default());
    driver.put_cell(0, 0, Cell { ch: 'k', ..Cell::blank() });
    driver.resize(4, 4);
    assert_eq!(driver.screen().get(0, 0).ch, 'k');
}
