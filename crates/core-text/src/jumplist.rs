//! Jump list: cursor history for `Ctrl-O` / `Ctrl-I` navigation.
//!
//! Jump motions (`gg`, `G`, search, marks, bracket match) push the pre-jump
//! cursor. The index points at the entry the user is "on"; `None` only while
//! the list is empty. Pushing while navigating mid-list discards the newer
//! entries first (browser-history style).

use crate::Position;
use tracing::trace;

/// Maximum number of retained entries.
pub const JUMPLIST_MAX: usize = 100;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JumpList {
    entries: Vec<Position>,
    index: Option<usize>,
}

impl JumpList {
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
            index: None,
        }
    }

    /// Record a position. Equal-to-previous entries are not duplicated.
    pub fn push(&mut self, pos: Position) {
        if let Some(idx) = self.index
            && idx + 1 < self.entries.len()
        {
            self.entries.truncate(idx + 1);
        }
        if self.entries.last() != Some(&pos) {
            self.entries.push(pos);
            if self.entries.len() > JUMPLIST_MAX {
                self.entries.remove(0);
            }
        }
        self.index = Some(self.entries.len() - 1);
        trace!(target: "text.jump", line = pos.line, col = pos.col, len = self.entries.len(), "jump_push");
    }

    /// Step to an older entry. Leaving the tip records `live` so `forward`
    /// can come back to it.
    pub fn back(&mut self, live: Position) -> Option<Position> {
        let mut idx = self.index?;
        if idx + 1 == self.entries.len() && self.entries[idx] != live {
            self.entries.push(live);
            if self.entries.len() > JUMPLIST_MAX {
                self.entries.remove(0);
            }
            idx = self.entries.len() - 1;
        }
        if idx == 0 {
            self.index = Some(idx);
            return None;
        }
        idx -= 1;
        self.index = Some(idx);
        Some(self.entries[idx])
    }

    /// Step to a newer entry; `None` at the tip.
    pub fn forward(&mut self) -> Option<Position> {
        let idx = self.index?;
        if idx + 1 >= self.entries.len() {
            return None;
        }
        self.index = Some(idx + 1);
        Some(self.entries[idx + 1])
    }

    pub fn index(&self) -> Option<usize> {
        self.index
    }

    pub fn entries(&self) -> &[Position] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
