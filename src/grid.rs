// Copyright (c) 2022-2026 vtscreen contributors. Licensed under Apache License, Version 2.0.

//! The logical/physical grid double-buffer and line-differential scan
//! (§3 "Grid", §4.1 "Logical screen and differential flush").
//!
//! Grounded on `r3bl_tui::core::graphemes`/`OffscreenBuffer`'s two-buffer
//! diff approach, generalized to the spec's explicit textEnd/adjacency
//! cursor rule and image-run detection.

use crate::cell::{Cell, CellWidth};

/// One contiguous run of image cells found while scanning a row for the
/// image phase of a flush (§4.2 "Image run detection").
#[derive(Debug, Clone)]
pub struct ImageRun {
    pub row: usize,
    pub col_start: usize,
    pub col_end: usize,
}

/// A single cell emitted by the text differential pass, tagged with
/// whether the renderer needs to reposition the cursor before it
/// (§4.1 "if the previous emitted position was not adjacent, emit
/// absolute cursor positioning").
#[derive(Debug, Clone)]
pub struct TextEdit {
    pub row: usize,
    pub col: usize,
    pub needs_cursor_move: bool,
    pub cell: Cell,
}

/// Output of scanning one row for the differential text pass.
#[derive(Debug, Default)]
pub struct RowDiff {
    pub edits: Vec<TextEdit>,
    /// Set when the row has content but everything past `textEnd` in
    /// physical must be wiped with a single clear-to-end-of-line
    /// sequence (§4.1 "a single clear-to-end-of-line sequence replaces
    /// further writes").
    pub clear_to_end_of_line: Option<usize>,
}

/// The logical/physical cell-grid double-buffer (§3 "Grid").
///
/// Invariant: `physical` always reflects what has been emitted to the
/// device; `logical` is what the application requested; the diff driving
/// a flush is the set of cells where the two disagree.
pub struct LogicalScreen {
    width: usize,
    height: usize,
    logical: Vec<Cell>,
    physical: Vec<Cell>,
    really_cleared: bool,
    cursor_visible: bool,
    cursor_x: usize,
    cursor_y: usize,
}

impl LogicalScreen {
    #[must_use]
    pub fn new(width: usize, height: usize) -> Self {
        let size = width * height;
        Self {
            width,
            height,
            logical: vec_of_blanks(size),
            physical: vec_of_blanks(size),
            really_cleared: true,
            cursor_visible: true,
            cursor_x: 0,
            cursor_y: 0,
        }
    }

    #[must_use]
    pub fn width(&self) -> usize { self.width }

    #[must_use]
    pub fn height(&self) -> usize { self.height }

    #[must_use]
    pub fn really_cleared(&self) -> bool { self.really_cleared }

    pub fn set_cursor(&mut self, x: usize, y: usize, visible: bool) {
        self.cursor_x = x;
        self.cursor_y = y;
        self.cursor_visible = visible;
    }

    #[must_use]
    pub fn cursor(&self) -> (usize, usize, bool) { (self.cursor_x, self.cursor_y, self.cursor_visible) }

    fn index(&self, x: usize, y: usize) -> usize { y * self.width + x }

    /// Writes `cell` into the logical grid at `(x, y)` (§4.1 `putCell`).
    pub fn put_cell(&mut self, x: usize, y: usize, cell: Cell) {
        if x >= self.width || y >= self.height {
            return;
        }
        let idx = self.index(x, y);
        self.logical[idx] = cell;
    }

    #[must_use]
    pub fn get(&self, x: usize, y: usize) -> &Cell { &self.logical[self.index(x, y)] }

    /// Blanks the logical grid and forces the next flush to emit a
    /// whole-screen clear (§4.1 `clear()`).
    pub fn clear(&mut self) {
        for cell in &mut self.logical {
            *cell = Cell::blank();
        }
        self.really_cleared = true;
    }

    /// Resizes both buffers, preserving the overlapping top-left region
    /// (§4.1 `resize(w,h)`).
    pub fn resize(&mut self, width: usize, height: usize) {
        let mut new_logical = vec_of_blanks(width * height);
        let mut new_physical = vec_of_blanks(width * height);
        for y in 0..self.height.min(height) {
            for x in 0..self.width.min(width) {
                let src = self.index(x, y);
                let dst = y * width + x;
                new_logical[dst] = self.logical[src].clone();
                new_physical[dst] = self.physical[src].clone();
            }
        }
        self.width = width;
        self.height = height;
        self.logical = new_logical;
        self.physical = new_physical;
        self.really_cleared = true;
    }

    /// Forces the next flush to treat every cell as changed, e.g. after a
    /// palette mutation (§4.5 "Any palette change triggers a full physical
    /// redraw").
    pub fn force_full_redraw(&mut self) { self.really_cleared = true; }

    /// Finds every contiguous run of image cells in row `y` that differ
    /// from physical (§4.2 "greedily extend as long as adjacent cells are
    /// images that differ from physical").
    #[must_use]
    pub fn image_runs(&self, y: usize) -> Vec<ImageRun> {
        let mut runs = Vec::new();
        let mut x = 0;
        while x < self.width {
            let idx = self.index(x, y);
            let cell = &self.logical[idx];
            let changed = self.really_cleared || cell.differs_from(&self.physical[idx]);
            if cell.is_image() && changed {
                let start = x;
                while x < self.width {
                    let idx = self.index(x, y);
                    let cell = &self.logical[idx];
                    let changed = self.really_cleared || cell.differs_from(&self.physical[idx]);
                    if cell.is_image() && changed {
                        x += 1;
                    } else {
                        break;
                    }
                }
                runs.push(ImageRun { row: y, col_start: start, col_end: x });
            } else {
                x += 1;
            }
        }
        runs
    }

    /// Computes the cache key for an image run: the concatenation of
    /// per-cell content fingerprints (§3 "ImageCache entry", §4.2 "compute
    /// its cache key as the concatenation of per-cell content
    /// fingerprints").
    #[must_use]
    pub fn image_run_cache_key(&self, run: &ImageRun) -> String {
        let mut key = String::new();
        for x in run.col_start..run.col_end {
            let idx = self.index(x, run.row);
            if let Some(image) = &self.logical[idx].image {
                key.push_str(&format!("{:016x}", image.fingerprint));
            }
        }
        key
    }

    /// Whether any cell in the run is marked inverted, which disables
    /// cache insertion for the encoded result (§4.2 "unless any cell is
    /// inverted, in which case the result is emitted but not stored").
    #[must_use]
    pub fn image_run_is_invertible_cacheable(&self, run: &ImageRun) -> bool {
        (run.col_start..run.col_end).all(|x| !self.logical[self.index(x, run.row)].inverted)
    }

    /// Scans row `y` for the differential text pass, skipping image cells
    /// (drawn separately in the image phase, §4.1 "Image cells are
    /// skipped by the text pass ... but the physical copy is still
    /// updated").
    #[must_use]
    pub fn diff_row(&self, y: usize) -> RowDiff {
        let mut diff = RowDiff::default();

        let mut text_end = None;
        for x in (0..self.width).rev() {
            let cell = &self.logical[self.index(x, y)];
            if !cell.is_blank() || cell.is_image() {
                text_end = Some(x);
                break;
            }
        }

        let Some(text_end) = text_end else {
            // Entire row is blank logically; if physical has content, clear it.
            let physical_has_content =
                (0..self.width).any(|x| !self.physical[self.index(x, y)].is_blank());
            if physical_has_content || self.really_cleared {
                diff.clear_to_end_of_line = Some(0);
            }
            return diff;
        };

        let physical_tail_dirty =
            (text_end + 1..self.width).any(|x| !self.physical[self.index(x, y)].is_blank());
        if physical_tail_dirty || self.really_cleared {
            diff.clear_to_end_of_line = Some(text_end + 1);
        }

        let mut last_emitted_col: Option<usize> = None;
        for x in 0..=text_end {
            let idx = self.index(x, y);
            let cell = &self.logical[idx];
            if cell.is_image() {
                continue;
            }
            let changed = self.really_cleared || cell.attr.pulse || cell.differs_from(&self.physical[idx]);
            if !changed {
                continue;
            }
            let needs_cursor_move = match last_emitted_col {
                Some(prev) => x != prev + 1,
                None => true,
            };
            diff.edits.push(TextEdit { row: y, col: x, needs_cursor_move, cell: cell.clone() });
            last_emitted_col = Some(x);
        }

        diff
    }

    /// After the renderer has emitted a row's diff (and drawn its image
    /// runs), copies the logical row into physical so the next flush
    /// compares against what is now actually on the device.
    pub fn commit_row(&mut self, y: usize) {
        for x in 0..self.width {
            let idx = self.index(x, y);
            self.physical[idx] = self.logical[idx].clone();
        }
    }

    /// Call once after a flush has committed every row, to clear the
    /// whole-screen-clear flag (§4.1 "an optional whole-screen clear if
    /// `reallyCleared`").
    pub fn acknowledge_full_clear(&mut self) { self.really_cleared = false; }
}

fn vec_of_blanks(size: usize) -> Vec<Cell> { (0..size).map(|_| Cell::blank()).collect() }

/// Whether `ch`/width pairing for a full-width glyph's right half is
/// internally consistent (§3 invariant: "right-half of a full-width char
/// has `width==RIGHT` and shares the prior left cell's glyph").
#[must_use]
pub fn is_valid_wide_pair(left: &Cell, right: &Cell) -> bool {
    left.width == CellWidth::Left && right.width == CellWidth::Right && right.ch == left.ch
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::Attr;
    use pretty_assertions::assert_eq;

    #[test]
    fn fresh_screen_starts_really_cleared() {
        let screen = LogicalScreen::new(10, 4);
        assert!(screen.really_cleared());
    }

    #[test]
    fn put_cell_outside_bounds_is_ignored() {
        let mut screen = LogicalScreen::new(4, 4);
        screen.put_cell(100, 100, Cell { ch: 'x', ..Cell::blank() });
    }

    #[test]
    fn unchanged_flush_has_no_edits_after_commit() {
        let mut screen = LogicalScreen::new(5, 1);
        screen.put_cell(0, 0, Cell { ch: 'h', ..Cell::blank() });
        screen.put_cell(1, 0, Cell { ch: 'i', ..Cell::blank() });
        let diff = screen.diff_row(0);
        assert!(!diff.edits.is_empty());
        screen.commit_row(0);
        screen.acknowledge_full_clear();

        // Scenario 5 (§8): a second flush of an unchanged grid emits
        // nothing further.
        let second = screen.diff_row(0);
        assert!(second.edits.is_empty());
        assert!(second.clear_to_end_of_line.is_none());
    }

    #[test]
    fn resize_preserves_overlap() {
        let mut screen = LogicalScreen::new(4, 4);
        screen.put_cell(0, 0, Cell { ch: 'z', ..Cell::blank() });
        screen.resize(2, 2);
        assert_eq!(screen.get(0, 0).ch, 'z');
        assert_eq!(screen.width(), 2);
        assert_eq!(screen.height(), 2);
    }

    #[test]
    fn pulse_cell_is_always_diffed() {
        let mut screen = LogicalScreen::new(3, 1);
        let pulsing = Cell { ch: 'p', attr: Attr { pulse: true, ..Attr::default() }, ..Cell::blank() };
        screen.put_cell(0, 0, pulsing);
        screen.diff_row(0);
        screen.commit_row(0);
        screen.acknowledge_full_clear();

        let diff = screen.diff_row(0);
        assert_eq!(diff.edits.len(), 1, "pulse cells must re-emit every flush");
    }

    #[test]
    fn image_run_detection_groups_adjacent_changed_image_cells() {
        use std::sync::Arc;

        use crate::cell::ImageRef;
        use crate::image::ImageBuffer;

        let mut screen = LogicalScreen::new(5, 1);
        let pixels = Arc::new(ImageBuffer::filled(1, 1, crate::color::Rgb::black()));
        for x in 1..3 {
            screen.put_cell(
                x,
                0,
                Cell { image: Some(ImageRef { fingerprint: 42, pixels: pixels.clone() }), ..Cell::blank() },
            );
        }
        let runs = screen.image_runs(0);
        assert_eq!(runs.len(), 1);
        assert_eq!((runs[0].col_start, runs[0].col_end), (1, 3));
    }

    #[test]
    fn image_run_cache_key_concatenates_fingerprints() {
        use std::sync::Arc;

        use crate::cell::ImageRef;
        use crate::image::ImageBuffer;

        let mut screen = LogicalScreen::new(2, 1);
        let pixels = Arc::new(ImageBuffer::filled(1, 1, crate::color::Rgb::black()));
        screen.put_cell(0, 0, Cell { image: Some(ImageRef { fingerprint: 1, pixels: pixels.clone() }), ..Cell::blank() });
        screen.put_cell(1, 0, Cell { image: Some(ImageRef { fingerprint: 2, pixels }), ..Cell::blank() });
        let run = ImageRun { row: 0, col_start: 0, col_end: 2 };
        let key = screen.image_run_cache_key(&run);
        assert_eq!(key, format!("{:016x}{:016x}", 1u64, 2u64));
    }
}
