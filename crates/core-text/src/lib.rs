//! Rope-backed line buffer: text, cursor, marks, jump history and file identity.
//!
//! The rope is built with LF as its only line separator (see the workspace
//! `ropey` feature selection), so `rope.len_lines()` is exactly the number of
//! editor lines and an empty rope is a single empty line. That gives the
//! "never empty" invariant for free: there is no representation of a buffer
//! with zero lines.
//!
//! Invariants (hold after every public call):
//! * `line_count() >= 1`.
//! * `cursor.line < line_count()` and `cursor.col <= line_len(cursor.line)`.
//!   Columns count Unicode scalar values; `col == line_len` means "after the
//!   last character".
//! * Every content mutation sets `modified` and bumps `generation`.
//!
//! Marks and jump-list entries are stored raw and only clamped when used,
//! since intervening edits may have shortened the target line or buffer.

use ropey::Rope;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::trace;

pub mod format;
pub mod jumplist;
pub mod motion;
pub mod yank;

pub use format::{
    LineEnding, NormalizedText, TextEncoding, UnencodableChar, decode_with_fallback, denormalize,
    normalize_line_endings,
};
pub use jumplist::{JUMPLIST_MAX, JumpList};
pub use yank::{PastePlacement, YankContent};

/// A position inside a buffer expressed as (line index, char column).
///
/// Ordering is document order (line first, then column).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Position {
    pub line: usize,
    pub col: usize,
}

impl Position {
    pub fn new(line: usize, col: usize) -> Self {
        Self { line, col }
    }
    pub fn origin() -> Self {
        Self { line: 0, col: 0 }
    }
    pub fn clamp_to<F>(&mut self, line_count: usize, mut line_len_fn: F)
    where
        F: FnMut(usize) -> usize,
    {
        if line_count == 0 {
            self.line = 0;
            self.col = 0;
            return;
        }
        if self.line >= line_count {
            self.line = line_count - 1;
        }
        let max_len = line_len_fn(self.line);
        if self.col > max_len {
            self.col = max_len;
        }
    }
}

/// Backing-file metadata carried by a buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileIdentity {
    /// Absent for unsaved / new buffers.
    pub path: Option<PathBuf>,
    pub encoding: TextEncoding,
    pub line_ending: LineEnding,
    /// Whether the file ended with a line terminator (restored on save).
    pub trailing_newline: bool,
    pub mixed_line_endings: bool,
}

impl Default for FileIdentity {
    fn default() -> Self {
        Self {
            path: None,
            encoding: TextEncoding::Utf8,
            line_ending: LineEnding::Lf,
            trailing_newline: true,
            mixed_line_endings: false,
        }
    }
}

/// Immutable copy of buffer content and cursor used by undo history.
///
/// Cloning a rope shares structure copy-on-write, so a snapshot is cheap to
/// take and can never be mutated through the live buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct TextSnapshot {
    rope: Rope,
    cursor: Position,
}

impl TextSnapshot {
    /// Rebuild a snapshot from plain lines (used when loading persisted history).
    pub fn from_lines(lines: &[String], cursor: Position) -> Self {
        let rope = Rope::from_str(&lines.join("\n"));
        Self { rope, cursor }
    }
    pub fn cursor(&self) -> Position {
        self.cursor
    }
    pub fn line_count(&self) -> usize {
        self.rope.len_lines()
    }
    pub fn lines(&self) -> Vec<String> {
        rope_lines(&self.rope)
    }
    /// Full content joined with LF.
    pub fn text(&self) -> String {
        self.rope.to_string()
    }
}

/// A text buffer backed by a `ropey::Rope`.
#[derive(Debug, Clone)]
pub struct Buffer {
    rope: Rope,
    pub name: String,
    cursor: Position,
    /// Scroll anchor used to seed windows that start showing this buffer.
    pub viewport: Position,
    marks: BTreeMap<char, Position>,
    jumps: JumpList,
    file: FileIdentity,
    modified: bool,
    generation: u64,
}

impl Buffer {
    /// Empty buffer (one empty line).
    pub fn new(name: impl Into<String>) -> Self {
        Self::from_text(name, "")
    }

    /// Construct a buffer from LF-normalized text. The buffer starts unmodified.
    pub fn from_text(name: impl Into<String>, content: &str) -> Self {
        Self {
            rope: Rope::from_str(content),
            name: name.into(),
            cursor: Position::origin(),
            viewport: Position::origin(),
            marks: BTreeMap::new(),
            jumps: JumpList::new(),
            file: FileIdentity::default(),
            modified: false,
            generation: 0,
        }
    }

    // -- Queries ---------------------------------------------------------------

    /// Total number of lines in the buffer (always >= 1).
    pub fn line_count(&self) -> usize {
        self.rope.len_lines()
    }

    /// Return the requested line without its line terminator.
    pub fn line(&self, idx: usize) -> Option<String> {
        if idx < self.rope.len_lines() {
            let mut s = self.rope.line(idx).to_string();
            if s.ends_with('\n') {
                s.pop();
            }
            Some(s)
        } else {
            None
        }
    }

    /// Length of a line in chars (excluding the terminator). Zero when out of range.
    pub fn line_len(&self, idx: usize) -> usize {
        if idx >= self.rope.len_lines() {
            return 0;
        }
        let line = self.rope.line(idx);
        let n = line.len_chars();
        if n > 0 && line.char(n - 1) == '\n' {
            n - 1
        } else {
            n
        }
    }

    pub fn current_line(&self) -> String {
        self.line(self.cursor.line).unwrap_or_default()
    }

    /// All lines as owned strings.
    pub fn lines(&self) -> Vec<String> {
        rope_lines(&self.rope)
    }

    /// Full content joined with LF.
    pub fn text(&self) -> String {
        self.rope.to_string()
    }

    pub fn cursor(&self) -> Position {
        self.cursor
    }

    pub fn is_modified(&self) -> bool {
        self.modified
    }

    pub fn set_modified(&mut self, modified: bool) {
        self.modified = modified;
    }

    /// Monotonic edit counter; changes whenever content changes.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn file(&self) -> &FileIdentity {
        &self.file
    }

    pub fn file_mut(&mut self) -> &mut FileIdentity {
        &mut self.file
    }

    pub fn path(&self) -> Option<&Path> {
        self.file.path.as_deref()
    }

    /// Clamp an arbitrary position into the current bounds.
    pub fn clamp(&self, mut pos: Position) -> Position {
        pos.clamp_to(self.line_count(), |l| self.line_len(l));
        pos
    }

    // -- Snapshots ---------------------------------------------------------------

    pub fn capture(&self) -> TextSnapshot {
        TextSnapshot {
            rope: self.rope.clone(),
            cursor: self.cursor,
        }
    }

    /// Replace live content and cursor with a snapshot. Does not touch the
    /// modified flag; the undo manager derives it from its save point.
    pub fn restore(&mut self, snapshot: TextSnapshot) {
        self.rope = snapshot.rope;
        self.cursor = snapshot.cursor;
        self.generation += 1;
        self.clamp_cursor();
        trace!(target: "text.buffer", op = "restore", generation = self.generation, lines = self.line_count(), "mutate");
    }

    // -- Cursor ------------------------------------------------------------------

    pub fn set_cursor(&mut self, pos: Position) {
        self.cursor = self.clamp(pos);
    }

    /// Move by a relative offset; vertical first, then horizontal, each clamped.
    pub fn move_cursor(&mut self, dline: isize, dcol: isize) {
        let line = self
            .cursor
            .line
            .saturating_add_signed(dline)
            .min(self.line_count() - 1);
        let col = self
            .cursor
            .col
            .saturating_add_signed(dcol)
            .min(self.line_len(line));
        self.cursor = Position::new(line, col);
    }

    /// Go to a 1-based line number, column 0.
    pub fn goto_line(&mut self, line_number: usize) {
        let line = line_number.saturating_sub(1).min(self.line_count() - 1);
        self.cursor = Position::new(line, 0);
    }

    pub fn goto_first_line(&mut self) {
        self.cursor = Position::origin();
    }

    pub fn goto_last_line(&mut self) {
        self.cursor = Position::new(self.line_count() - 1, 0);
    }

    pub fn goto_line_start(&mut self) {
        self.cursor.col = 0;
    }

    pub fn goto_line_end(&mut self) {
        self.cursor.col = self.line_len(self.cursor.line);
    }

    /// Move to the first non-whitespace character of the line (end of line if blank).
    pub fn goto_first_non_blank(&mut self) {
        let line = self.current_line();
        let first = line.chars().position(|c| !c.is_whitespace());
        self.cursor.col = first.unwrap_or_else(|| line.chars().count());
    }

    pub fn move_word_forward(&mut self) {
        self.cursor = motion::next_word_start(self, self.cursor);
    }

    pub fn move_word_backward(&mut self) {
        self.cursor = motion::prev_word_start(self, self.cursor);
    }

    fn clamp_cursor(&mut self) {
        self.cursor = self.clamp(self.cursor);
    }

    // -- Marks & jumps -----------------------------------------------------------

    /// Record the cursor under a single-character mark name (overwrites).
    pub fn set_mark(&mut self, name: char) {
        self.marks.insert(name, self.cursor);
        trace!(target: "text.buffer", mark = %name, line = self.cursor.line, col = self.cursor.col, "mark_set");
    }

    /// Raw stored mark position (not clamped).
    pub fn mark(&self, name: char) -> Option<Position> {
        self.marks.get(&name).copied()
    }

    /// Move the cursor to a mark, clamped against current bounds. False when unset.
    pub fn goto_mark(&mut self, name: char) -> bool {
        match self.marks.get(&name).copied() {
            Some(pos) => {
                self.cursor = self.clamp(pos);
                true
            }
            None => false,
        }
    }

    pub fn jumps(&self) -> &JumpList {
        &self.jumps
    }

    /// Record the current cursor in the jump list (call before a jump motion).
    pub fn push_jump(&mut self) {
        let pos = self.cursor;
        self.jumps.push(pos);
    }

    /// `Ctrl-O`: returns false when there is no older entry.
    pub fn jump_back(&mut self) -> bool {
        match self.jumps.back(self.cursor) {
            Some(pos) => {
                self.cursor = self.clamp(pos);
                true
            }
            None => false,
        }
    }

    /// `Ctrl-I`: returns false when already at the newest entry.
    pub fn jump_forward(&mut self) -> bool {
        match self.jumps.forward() {
            Some(pos) => {
                self.cursor = self.clamp(pos);
                true
            }
            None => false,
        }
    }

    // -- Mutations ---------------------------------------------------------------

    fn touch(&mut self, op: &'static str) {
        self.modified = true;
        self.generation += 1;
        self.clamp_cursor();
        trace!(target: "text.buffer", op, generation = self.generation, lines = self.line_count(), "mutate");
    }

    fn char_index(&self, pos: Position) -> usize {
        let pos = self.clamp(pos);
        self.rope.line_to_char(pos.line) + pos.col
    }

    fn position_of_char(&self, idx: usize) -> Position {
        let idx = idx.min(self.rope.len_chars());
        let line = self.rope.char_to_line(idx);
        Position::new(line, idx - self.rope.line_to_char(line))
    }

    /// Insert a single character at the cursor.
    pub fn insert_char(&mut self, ch: char) {
        let mut tmp = [0u8; 4];
        self.insert_str(ch.encode_utf8(&mut tmp));
    }

    /// Insert text at the cursor; the cursor ends up after the inserted text.
    pub fn insert_str(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        let idx = self.char_index(self.cursor);
        self.rope.insert(idx, text);
        self.cursor = self.position_of_char(idx + text.chars().count());
        self.touch("insert");
    }

    /// Split the line at the cursor. With `auto_indent` the new line inherits
    /// the leading whitespace of the text before the cursor.
    pub fn insert_newline(&mut self, auto_indent: bool) {
        let line = self.current_line();
        let indent: String = if auto_indent {
            line.chars()
                .take(self.cursor.col)
                .take_while(|c| c.is_whitespace())
                .collect()
        } else {
            String::new()
        };
        let idx = self.char_index(self.cursor);
        self.rope.insert(idx, &format!("\n{indent}"));
        self.cursor = Position::new(self.cursor.line + 1, indent.chars().count());
        self.touch("newline");
    }

    /// Delete the grapheme cluster before the cursor; at column 0 joins with the
    /// previous line. Returns false at the very start of the buffer.
    pub fn backspace(&mut self) -> bool {
        let Position { line, col } = self.cursor;
        if line == 0 && col == 0 {
            return false;
        }
        if col == 0 {
            let prev_len = self.line_len(line - 1);
            let newline = self.rope.line_to_char(line) - 1;
            self.rope.remove(newline..newline + 1);
            self.cursor = Position::new(line - 1, prev_len);
        } else {
            let text = self.current_line();
            let byte = grapheme::byte_of_col(&text, col);
            let prev = grapheme::prev_boundary(&text, byte);
            let width = text[prev..byte].chars().count().max(1);
            let end = self.char_index(self.cursor);
            self.rope.remove(end - width..end);
            self.cursor.col = col - width;
        }
        self.touch("backspace");
        true
    }

    /// Delete the grapheme cluster under the cursor; at end of line joins the
    /// next line upward. No-op (false) at the end of the last line.
    pub fn delete_forward(&mut self) -> bool {
        let Position { line, col } = self.cursor;
        let len = self.line_len(line);
        let idx = self.char_index(self.cursor);
        if col < len {
            let text = self.current_line();
            let byte = grapheme::byte_of_col(&text, col);
            let next = grapheme::next_boundary(&text, byte);
            let width = text[byte..next].chars().count().max(1);
            self.rope.remove(idx..idx + width);
        } else if line + 1 < self.line_count() {
            self.rope.remove(idx..idx + 1);
        } else {
            return false;
        }
        self.touch("delete_forward");
        true
    }

    /// Open an empty line below (or above) the cursor line; cursor moves onto it.
    pub fn insert_line(&mut self, below: bool) {
        let line = self.cursor.line;
        if below {
            let end = self.rope.line_to_char(line) + self.line_len(line);
            self.rope.insert(end, "\n");
            self.cursor = Position::new(line + 1, 0);
        } else {
            let start = self.rope.line_to_char(line);
            self.rope.insert(start, "\n");
            self.cursor = Position::new(line, 0);
        }
        self.touch("insert_line");
    }

    /// Delete the cursor line, returning its text. Deleting the only line
    /// leaves a single empty line.
    pub fn delete_line(&mut self) -> String {
        let line = self.cursor.line;
        self.delete_lines(line, line + 1)
            .into_iter()
            .next()
            .unwrap_or_default()
    }

    /// Delete whole lines `[start, end)` (clamped), returning them. Cursor moves
    /// to column 0 of the first surviving line at or after `start`.
    pub fn delete_lines(&mut self, start: usize, end: usize) -> Vec<String> {
        let count = self.line_count();
        let start = start.min(count - 1);
        let end = end.clamp(start + 1, count);
        let removed: Vec<String> = (start..end).filter_map(|l| self.line(l)).collect();
        if start == 0 && end == count {
            self.rope = Rope::new();
        } else if end < count {
            let from = self.rope.line_to_char(start);
            let to = self.rope.line_to_char(end);
            self.rope.remove(from..to);
        } else {
            // Trailing block: also drop the terminator of the line before it.
            let from = self.rope.line_to_char(start) - 1;
            let to = self.rope.len_chars();
            self.rope.remove(from..to);
        }
        self.cursor = Position::new(start.min(self.line_count() - 1), 0);
        self.touch("delete_lines");
        removed
    }

    /// Replace the content of one line. Out-of-range rows are ignored (false).
    pub fn replace_line(&mut self, idx: usize, text: &str) -> bool {
        if idx >= self.line_count() {
            return false;
        }
        let start = self.rope.line_to_char(idx);
        let len = self.line_len(idx);
        self.rope.remove(start..start + len);
        self.rope.insert(start, text);
        self.touch("replace_line");
        true
    }

    /// Insert (possibly multi-line) text at `pos` without moving the cursor
    /// beyond clamping. Returns the position just after the inserted text.
    pub fn insert_text(&mut self, pos: Position, text: &str) -> Position {
        let idx = self.char_index(pos);
        if text.is_empty() {
            return self.position_of_char(idx);
        }
        self.rope.insert(idx, text);
        let end = self.position_of_char(idx + text.chars().count());
        self.touch("insert_text");
        end
    }

    /// Delete the text between two positions (end exclusive, order-insensitive,
    /// both clamped) and return it. Multi-row ranges splice the start row prefix
    /// with the end row suffix. The cursor moves to the range start.
    pub fn delete_range(&mut self, a: Position, b: Position) -> String {
        let (start, end) = if a <= b { (a, b) } else { (b, a) };
        let from = self.char_index(start);
        let to = self.char_index(end);
        if from == to {
            return String::new();
        }
        let removed = self.rope.slice(from..to).to_string();
        self.rope.remove(from..to);
        self.cursor = self.position_of_char(from);
        self.touch("delete_range");
        removed
    }

    /// Text between two positions (end exclusive) without mutating.
    pub fn slice(&self, a: Position, b: Position) -> String {
        let (start, end) = if a <= b { (a, b) } else { (b, a) };
        let from = self.char_index(start);
        let to = self.char_index(end);
        self.rope.slice(from..to).to_string()
    }

    /// Replace the whole content (LF-normalized).
    pub fn set_content(&mut self, text: &str) {
        self.rope = Rope::from_str(text);
        self.touch("set_content");
    }
}

fn rope_lines(rope: &Rope) -> Vec<String> {
    rope.lines()
        .map(|l| {
            let mut s = l.to_string();
            if s.ends_with('\n') {
                s.pop();
            }
            s
        })
        .collect()
}

/// Grapheme and width utilities. Pure helpers operating on a single line.
pub mod grapheme {
    use unicode_segmentation::UnicodeSegmentation;
    use unicode_width::UnicodeWidthStr;

    /// Byte offset of a char column (line length in bytes when past the end).
    pub fn byte_of_col(line: &str, col: usize) -> usize {
        line.char_indices()
            .nth(col)
            .map(|(b, _)| b)
            .unwrap_or(line.len())
    }

    /// Char column of a byte offset (assumed on a char boundary).
    pub fn col_of_byte(line: &str, byte: usize) -> usize {
        line[..byte.min(line.len())].chars().count()
    }

    /// Previous grapheme boundary (returns 0 if already at or below 1st boundary).
    pub fn prev_boundary(line: &str, byte: usize) -> usize {
        if byte == 0 || byte > line.len() {
            return 0;
        }
        let mut last = 0;
        for (idx, _) in line.grapheme_indices(true) {
            if idx >= byte {
                break;
            }
            last = idx;
        }
        last
    }

    /// Next grapheme boundary (returns line.len() if at or beyond end).
    pub fn next_boundary(line: &str, byte: usize) -> usize {
        if byte >= line.len() {
            return line.len();
        }
        for (idx, _) in line.grapheme_indices(true) {
            if idx > byte {
                return idx;
            }
        }
        line.len()
    }

    /// Display column (terminal cells) of a char column.
    pub fn visual_col(line: &str, col: usize) -> usize {
        let byte = byte_of_col(line, col);
        line[..byte].width()
    }

    /// Word classification: alphanumeric or underscore.
    pub fn is_word(c: char) -> bool {
        c == '_' || c.is_alphanumeric()
    }
}
