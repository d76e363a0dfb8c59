//! Word and bracket motions.
//!
//! Pure functions over a `Buffer` + `Position` pair; none of them mutate.
//! Word characters are alphanumerics and `_` (see [`grapheme::is_word`]).

use crate::{Buffer, Position, grapheme::is_word};

/// Start of the next word: skip the current word run, then separators. When the
/// line is exhausted the motion lands on column 0 of the next line; on the last
/// line it stops at the line end.
pub fn next_word_start(buf: &Buffer, pos: Position) -> Position {
    let pos = buf.clamp(pos);
    let chars: Vec<char> = buf.line(pos.line).unwrap_or_default().chars().collect();
    let mut x = pos.col;
    while x < chars.len() && is_word(chars[x]) {
        x += 1;
    }
    while x < chars.len() && !is_word(chars[x]) {
        x += 1;
    }
    if x < chars.len() {
        Position::new(pos.line, x)
    } else if pos.line + 1 < buf.line_count() {
        Position::new(pos.line + 1, 0)
    } else {
        Position::new(pos.line, chars.len())
    }
}

/// Start of the previous word. At column 0 moves to the end of the previous
/// line; at the buffer origin stays put.
pub fn prev_word_start(buf: &Buffer, pos: Position) -> Position {
    let pos = buf.clamp(pos);
    if pos.col == 0 {
        if pos.line == 0 {
            return pos;
        }
        return Position::new(pos.line - 1, buf.line_len(pos.line - 1));
    }
    let chars: Vec<char> = buf.line(pos.line).unwrap_or_default().chars().collect();
    let mut x = pos.col - 1;
    while x > 0 && !is_word(chars[x]) {
        x -= 1;
    }
    while x > 0 && is_word(chars[x - 1]) {
        x -= 1;
    }
    Position::new(pos.line, x)
}

/// Word under (or touching) a position: `(word, start_col, end_col_exclusive)`.
/// A position immediately after a word still selects it.
pub fn word_at(buf: &Buffer, pos: Position) -> Option<(String, usize, usize)> {
    let pos = buf.clamp(pos);
    let chars: Vec<char> = buf.line(pos.line)?.chars().collect();
    let mut anchor = pos.col;
    if anchor >= chars.len() || !is_word(chars[anchor]) {
        if anchor > 0 && anchor <= chars.len() && is_word(chars[anchor - 1]) {
            anchor -= 1;
        } else {
            return None;
        }
    }
    let mut start = anchor;
    while start > 0 && is_word(chars[start - 1]) {
        start -= 1;
    }
    let mut end = anchor;
    while end < chars.len() && is_word(chars[end]) {
        end += 1;
    }
    Some((chars[start..end].iter().collect(), start, end))
}

const BRACKETS: [(char, char); 3] = [('(', ')'), ('[', ']'), ('{', '}')];

/// Partner of the bracket under `pos`, searching across lines with nesting.
/// `None` when the position is not on a bracket or the bracket is unbalanced.
pub fn matching_bracket(buf: &Buffer, pos: Position) -> Option<Position> {
    let pos = buf.clamp(pos);
    let line = buf.line(pos.line)?;
    let ch = line.chars().nth(pos.col)?;
    let (open, close, forward) = BRACKETS.iter().find_map(|&(o, c)| {
        if ch == o {
            Some((o, c, true))
        } else if ch == c {
            Some((o, c, false))
        } else {
            None
        }
    })?;
    let mut depth = 0usize;
    if forward {
        for row in pos.line..buf.line_count() {
            let chars: Vec<char> = buf.line(row)?.chars().collect();
            let from = if row == pos.line { pos.col } else { 0 };
            for (col, &c) in chars.iter().enumerate().skip(from) {
                if c == open {
                    depth += 1;
                } else if c == close {
                    depth -= 1;
                    if depth == 0 {
                        return Some(Position::new(row, col));
                    }
                }
            }
        }
    } else {
        for row in (0..=pos.line).rev() {
            let chars: Vec<char> = buf.line(row)?.chars().collect();
            let upto = if row == pos.line { pos.col + 1 } else { chars.len() };
            for col in (0..upto).rev() {
                let c = chars[col];
                if c == close {
                    depth += 1;
                } else if c == open {
                    depth -= 1;
                    if depth == 0 {
                        return Some(Position::new(row, col));
                    }
                }
            }
        }
    }
    None
}
