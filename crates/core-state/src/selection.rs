//! Visual selection geometry.
//!
//! A selection is an anchor (where visual mode started) and a head (the live
//! cursor) plus a mode. Every geometric query works on the normalised pair, so
//! anchor/head order never matters. Character-mode ranges include the head
//! column; block mode is the column rectangle `[min col, max col]` on every
//! row regardless of how long each row is.

use core_text::{Buffer, Position, YankContent};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SelectionMode {
    #[default]
    Character,
    Line,
    Block,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VisualSelection {
    mode: SelectionMode,
    anchor: Position,
    head: Position,
}

impl VisualSelection {
    /// Enter visual mode at `cursor`; both endpoints start there.
    pub fn start(mode: SelectionMode, cursor: Position) -> Self {
        Self {
            mode,
            anchor: cursor,
            head: cursor,
        }
    }

    /// Move the head to the live cursor.
    pub fn update(&mut self, cursor: Position) {
        self.head = cursor;
    }

    /// Switch mode keeping both endpoints.
    pub fn set_mode(&mut self, mode: SelectionMode) {
        self.mode = mode;
    }

    pub fn mode(&self) -> SelectionMode {
        self.mode
    }
    pub fn anchor(&self) -> Position {
        self.anchor
    }
    pub fn head(&self) -> Position {
        self.head
    }

    /// Endpoints in document order.
    pub fn normalize(&self) -> (Position, Position) {
        if self.anchor <= self.head {
            (self.anchor, self.head)
        } else {
            (self.head, self.anchor)
        }
    }

    /// Inclusive row span.
    pub fn rows(&self) -> (usize, usize) {
        let (s, e) = self.normalize();
        (s.line, e.line)
    }

    /// Inclusive column span used by block mode.
    pub fn block_cols(&self) -> (usize, usize) {
        let a = self.anchor.col;
        let b = self.head.col;
        (a.min(b), a.max(b))
    }

    pub fn contains(&self, line: usize, col: usize) -> bool {
        let (s, e) = self.normalize();
        if line < s.line || line > e.line {
            return false;
        }
        match self.mode {
            SelectionMode::Line => true,
            SelectionMode::Block => {
                let (lo, hi) = self.block_cols();
                (lo..=hi).contains(&col)
            }
            SelectionMode::Character => {
                if s.line == e.line {
                    (s.col..=e.col).contains(&col)
                } else if line == s.line {
                    col >= s.col
                } else if line == e.line {
                    col <= e.col
                } else {
                    true
                }
            }
        }
    }

    /// Selected text as yank content.
    pub fn extract_text(&self, buf: &Buffer) -> YankContent {
        let (s, e) = self.clamped(buf);
        match self.mode {
            SelectionMode::Line => buf.yank_lines(s.line, e.line - s.line + 1),
            SelectionMode::Character => {
                let end = inclusive_end(buf, e);
                YankContent {
                    lines: buf.slice(s, end).split('\n').map(str::to_string).collect(),
                    line_mode: false,
                }
            }
            SelectionMode::Block => {
                let (lo, hi) = self.block_cols();
                let lines = (s.line..=e.line)
                    .map(|row| {
                        let text = buf.line(row).unwrap_or_default();
                        text.chars().skip(lo).take(hi - lo + 1).collect()
                    })
                    .collect();
                YankContent {
                    lines,
                    line_mode: false,
                }
            }
        }
    }

    /// Delete the selected text and return it. The cursor moves to the
    /// normalised start (column 0 in line mode, left column in block mode).
    pub fn delete(&self, buf: &mut Buffer) -> YankContent {
        let removed = self.extract_text(buf);
        let (s, e) = self.clamped(buf);
        match self.mode {
            SelectionMode::Line => {
                buf.delete_lines(s.line, e.line + 1);
            }
            SelectionMode::Character => {
                let end = inclusive_end(buf, e);
                buf.delete_range(s, end);
            }
            SelectionMode::Block => {
                let (lo, hi) = self.block_cols();
                for row in s.line..=e.line {
                    let text = buf.line(row).unwrap_or_default();
                    if text.chars().count() <= lo {
                        continue;
                    }
                    let kept: String = text
                        .chars()
                        .take(lo)
                        .chain(text.chars().skip(hi + 1))
                        .collect();
                    buf.replace_line(row, &kept);
                }
                buf.set_cursor(Position::new(s.line, lo));
            }
        }
        debug!(target: "state.selection", mode = ?self.mode, start = s.line, end = e.line, "selection_delete");
        removed
    }

    /// Prefix every selected row with `unit`. Returns rows changed.
    pub fn indent(&self, buf: &mut Buffer, unit: &str) -> usize {
        let (s, e) = self.clamped(buf);
        let mut changed = 0;
        for row in s.line..=e.line {
            let text = buf.line(row).unwrap_or_default();
            buf.replace_line(row, &format!("{unit}{text}"));
            changed += 1;
        }
        debug!(target: "state.selection", rows = changed, "selection_indent");
        changed
    }

    /// Remove one `unit` (or failing that a single leading tab) from each
    /// selected row. Returns rows changed.
    pub fn unindent(&self, buf: &mut Buffer, unit: &str) -> usize {
        let (s, e) = self.clamped(buf);
        let mut changed = 0;
        for row in s.line..=e.line {
            let text = buf.line(row).unwrap_or_default();
            let stripped = if !unit.is_empty() && text.starts_with(unit) {
                &text[unit.len()..]
            } else if let Some(rest) = text.strip_prefix('\t') {
                rest
            } else {
                continue;
            };
            buf.replace_line(row, stripped);
            changed += 1;
        }
        debug!(target: "state.selection", rows = changed, "selection_unindent");
        changed
    }

    fn clamped(&self, buf: &Buffer) -> (Position, Position) {
        let (s, e) = self.normalize();
        let last = buf.line_count() - 1;
        (
            Position::new(s.line.min(last), s.col),
            Position::new(e.line.min(last), e.col),
        )
    }
}

/// Exclusive end for a character-mode selection whose head column is inclusive.
fn inclusive_end(buf: &Buffer, e: Position) -> Position {
    Position::new(e.line, (e.col + 1).min(buf.line_len(e.line)))
}
