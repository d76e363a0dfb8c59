//! Yank/paste content exchanged with the register subsystem.

use crate::{Buffer, Position};
use tracing::trace;

/// Ordered text lines plus a line-mode flag.
///
/// Line-mode content is whole lines; character-mode content is joined with
/// newlines when spliced into a line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct YankContent {
    pub lines: Vec<String>,
    pub line_mode: bool,
}

impl YankContent {
    pub fn lines(lines: Vec<String>) -> Self {
        Self {
            lines,
            line_mode: true,
        }
    }

    pub fn chars(text: &str) -> Self {
        Self {
            lines: text.split('\n').map(str::to_string).collect(),
            line_mode: false,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Content joined with LF.
    pub fn text(&self) -> String {
        self.lines.join("\n")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PastePlacement {
    /// `p`: below the row (line mode) or after the cursor char.
    After,
    /// `P`: above the row (line mode) or at the cursor.
    Before,
}

impl Buffer {
    /// Copy `count` whole lines starting at `row` (clamped) as line-mode content.
    pub fn yank_lines(&self, row: usize, count: usize) -> YankContent {
        let start = row.min(self.line_count() - 1);
        let end = start.saturating_add(count.max(1)).min(self.line_count());
        YankContent::lines((start..end).filter_map(|l| self.line(l)).collect())
    }

    /// Paste content relative to the cursor. Returns false when there is nothing to paste.
    pub fn paste(&mut self, content: &YankContent, placement: PastePlacement) -> bool {
        if content.is_empty() {
            return false;
        }
        let cur = self.cursor();
        let text = content.text();
        if content.line_mode {
            match placement {
                PastePlacement::After => {
                    let eol = Position::new(cur.line, self.line_len(cur.line));
                    self.insert_text(eol, &format!("\n{text}"));
                    self.set_cursor(Position::new(cur.line + 1, 0));
                }
                PastePlacement::Before => {
                    self.insert_text(Position::new(cur.line, 0), &format!("{text}\n"));
                    self.set_cursor(Position::new(cur.line, 0));
                }
            }
        } else {
            let at = match placement {
                PastePlacement::After if self.line_len(cur.line) > 0 => {
                    Position::new(cur.line, (cur.col + 1).min(self.line_len(cur.line)))
                }
                _ => cur,
            };
            if text.is_empty() {
                return false;
            }
            let end = self.insert_text(at, &text);
            // Land on the last pasted char, not after it.
            let last = if end.col > 0 {
                Position::new(end.line, end.col - 1)
            } else {
                end
            };
            self.set_cursor(last);
        }
        trace!(target: "text.buffer", line_mode = content.line_mode, lines = content.lines.len(), "paste");
        true
    }
}
