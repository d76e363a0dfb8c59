//! Pattern search and substitution over a buffer.
//!
//! A search builds the full ordered match set for the buffer and picks the
//! active match relative to the cursor. The set is tagged with the buffer id
//! and edit generation it was computed against; navigating a stale set
//! (different buffer, or the buffer changed since) re-runs the last search.

use std::collections::VecDeque;
use std::ops::RangeInclusive;

use bitflags::bitflags;
use core_text::{Buffer, Position, grapheme::col_of_byte};
use regex::{Regex, RegexBuilder};
use tracing::{debug, trace};

use crate::{BufferId, EditorError, Result};

pub const SEARCH_HISTORY_MAX: usize = 50;
pub const REPLACE_HISTORY_MAX: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SearchDirection {
    #[default]
    Forward,
    Backward,
}

/// One match; columns are char indices, `end` exclusive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchMatch {
    pub line: usize,
    pub start: usize,
    pub end: usize,
    pub text: String,
}

impl SearchMatch {
    pub fn position(&self) -> Position {
        Position::new(self.line, self.start)
    }
}

/// Engine-wide matching options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchOptions {
    pub ignore_case: bool,
    /// Treat patterns as regular expressions instead of literal text.
    pub regex: bool,
    pub whole_word: bool,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            ignore_case: true,
            regex: false,
            whole_word: false,
        }
    }
}

bitflags! {
    /// Substitute flags (`:s/pat/rep/gic`).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct SubstituteFlags: u8 {
        /// Replace every match on a line, not only the first.
        const GLOBAL = 1 << 0;
        const IGNORE_CASE = 1 << 1;
        /// Confirmation requested; surfaced to the caller, not acted on here.
        const CONFIRM = 1 << 2;
    }
}

impl SubstituteFlags {
    pub fn parse(flags: &str) -> Result<Self> {
        flags.chars().try_fold(Self::empty(), |acc, c| match c {
            'g' => Ok(acc | Self::GLOBAL),
            'i' => Ok(acc | Self::IGNORE_CASE),
            'c' => Ok(acc | Self::CONFIRM),
            other => Err(EditorError::InvalidFlag(other)),
        })
    }
}

/// Outcome of a substitution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReplaceReport {
    pub substitutions: usize,
    pub lines: usize,
    pub confirm_requested: bool,
}

#[derive(Debug, Default)]
pub struct SearchEngine {
    pub options: SearchOptions,
    last_pattern: Option<String>,
    last_direction: SearchDirection,
    matches: Vec<SearchMatch>,
    current: Option<usize>,
    computed_for: Option<(BufferId, u64)>,
    search_history: VecDeque<String>,
    replace_history: VecDeque<(String, String)>,
}

impl SearchEngine {
    pub fn new(options: SearchOptions) -> Self {
        Self {
            options,
            ..Self::default()
        }
    }

    pub fn matches(&self) -> &[SearchMatch] {
        &self.matches
    }
    pub fn current_index(&self) -> Option<usize> {
        self.current
    }
    pub fn current_match(&self) -> Option<&SearchMatch> {
        self.current.and_then(|i| self.matches.get(i))
    }
    pub fn last_pattern(&self) -> Option<&str> {
        self.last_pattern.as_deref()
    }
    pub fn last_direction(&self) -> SearchDirection {
        self.last_direction
    }
    /// Most recent last.
    pub fn search_history(&self) -> impl Iterator<Item = &str> {
        self.search_history.iter().map(String::as_str)
    }
    pub fn replace_history(&self) -> impl Iterator<Item = (&str, &str)> {
        self.replace_history
            .iter()
            .map(|(p, r)| (p.as_str(), r.as_str()))
    }

    /// Whether the match set was computed against this exact buffer state.
    pub fn is_current_for(&self, id: BufferId, buf: &Buffer) -> bool {
        self.computed_for == Some((id, buf.generation()))
    }

    pub fn clear(&mut self) {
        self.matches.clear();
        self.current = None;
        self.computed_for = None;
    }

    /// Compile a search pattern under the current options.
    fn compile(&self, pattern: &str) -> Result<Regex> {
        let mut source = if self.options.regex {
            pattern.to_string()
        } else {
            regex::escape(pattern)
        };
        if self.options.whole_word {
            source = format!(r"\b(?:{source})\b");
        }
        Ok(RegexBuilder::new(&source)
            .case_insensitive(self.options.ignore_case)
            .build()?)
    }

    /// Search `buf` for `pattern` and activate the match nearest the cursor
    /// in `direction`, wrapping around the buffer ends. An empty pattern
    /// reuses the last one. Returns the active match, if any.
    pub fn search(
        &mut self,
        id: BufferId,
        buf: &Buffer,
        pattern: &str,
        direction: SearchDirection,
    ) -> Result<Option<SearchMatch>> {
        let pattern = if pattern.is_empty() {
            match &self.last_pattern {
                Some(p) => p.clone(),
                None => return Ok(None),
            }
        } else {
            pattern.to_string()
        };
        let re = self.compile(&pattern)?;
        self.matches = collect_matches(&re, buf);
        self.computed_for = Some((id, buf.generation()));
        self.last_direction = direction;
        push_bounded(&mut self.search_history, pattern.clone(), SEARCH_HISTORY_MAX);
        self.last_pattern = Some(pattern);

        let cursor = buf.cursor();
        self.current = match direction {
            SearchDirection::Forward => self
                .matches
                .iter()
                .position(|m| m.position() > cursor)
                .or(if self.matches.is_empty() { None } else { Some(0) }),
            SearchDirection::Backward => self
                .matches
                .iter()
                .rposition(|m| m.position() < cursor)
                .or(self.matches.len().checked_sub(1)),
        };
        debug!(target: "state.search", buffer = %id, matches = self.matches.len(), ?direction, "search");
        Ok(self.current_match().cloned())
    }

    /// Advance to the next match (wrapping). Re-searches when the set is
    /// empty or stale.
    pub fn find_next(&mut self, id: BufferId, buf: &Buffer) -> Result<Option<SearchMatch>> {
        self.step(id, buf, SearchDirection::Forward)
    }

    /// Step back to the previous match (wrapping).
    pub fn find_previous(&mut self, id: BufferId, buf: &Buffer) -> Result<Option<SearchMatch>> {
        self.step(id, buf, SearchDirection::Backward)
    }

    fn step(
        &mut self,
        id: BufferId,
        buf: &Buffer,
        direction: SearchDirection,
    ) -> Result<Option<SearchMatch>> {
        if self.matches.is_empty() || !self.is_current_for(id, buf) {
            let Some(pattern) = self.last_pattern.clone() else {
                return Ok(None);
            };
            trace!(target: "state.search", buffer = %id, "stale_match_set_research");
            return self.search(id, buf, &pattern, direction);
        }
        let len = self.matches.len();
        let next = match (self.current, direction) {
            (None, SearchDirection::Forward) => 0,
            (None, SearchDirection::Backward) => len - 1,
            (Some(i), SearchDirection::Forward) => (i + 1) % len,
            (Some(i), SearchDirection::Backward) => (i + len - 1) % len,
        };
        self.current = Some(next);
        Ok(self.current_match().cloned())
    }

    /// Substitute `pattern` (always a regular expression) with `replacement`
    /// on `rows` (default: every line). Nothing is mutated if the pattern is
    /// malformed.
    pub fn replace(
        &mut self,
        buf: &mut Buffer,
        pattern: &str,
        replacement: &str,
        flags: SubstituteFlags,
        rows: Option<RangeInclusive<usize>>,
    ) -> Result<ReplaceReport> {
        let ignore_case = flags.contains(SubstituteFlags::IGNORE_CASE) || self.options.ignore_case;
        let re = RegexBuilder::new(pattern)
            .case_insensitive(ignore_case)
            .build()?;
        push_bounded(
            &mut self.replace_history,
            (pattern.to_string(), replacement.to_string()),
            REPLACE_HISTORY_MAX,
        );
        let last = buf.line_count() - 1;
        let rows = rows.unwrap_or(0..=last);
        let (from, to) = (*rows.start(), (*rows.end()).min(last));
        let mut report = ReplaceReport {
            confirm_requested: flags.contains(SubstituteFlags::CONFIRM),
            ..ReplaceReport::default()
        };
        for row in from..=to {
            let Some(text) = buf.line(row) else { continue };
            let (count, replaced) = if flags.contains(SubstituteFlags::GLOBAL) {
                let n = re.find_iter(&text).count();
                (n, re.replace_all(&text, replacement))
            } else {
                let n = usize::from(re.is_match(&text));
                (n, re.replacen(&text, 1, replacement))
            };
            if count == 0 {
                continue;
            }
            report.substitutions += count;
            report.lines += 1;
            if replaced != text {
                buf.replace_line(row, &replaced);
            }
        }
        if report.substitutions > 0 {
            buf.set_modified(true);
        }
        debug!(target: "state.search", substitutions = report.substitutions, lines = report.lines, "replace");
        Ok(report)
    }
}

fn collect_matches(re: &Regex, buf: &Buffer) -> Vec<SearchMatch> {
    let mut out = Vec::new();
    for (line, text) in buf.lines().iter().enumerate() {
        for m in re.find_iter(text) {
            if m.start() == m.end() {
                continue;
            }
            out.push(SearchMatch {
                line,
                start: col_of_byte(text, m.start()),
                end: col_of_byte(text, m.end()),
                text: m.as_str().to_string(),
            });
        }
    }
    out
}

fn push_bounded<T: PartialEq>(history: &mut VecDeque<T>, item: T, max: usize) {
    history.retain(|h| *h != item);
    history.push_back(item);
    while history.len() > max {
        history.pop_front();
    }
}
