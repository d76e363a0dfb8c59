//! Buffer switching history and the `:ls`-style listing.

use std::fmt;

use core_state::BufferId;

/// Maximum number of entries kept in the switch history.
pub const BUFFER_HISTORY_LEN: usize = 100;

/// Which buffers were current, oldest first. Consecutive repeats collapse.
#[derive(Debug, Clone, Default)]
pub struct BufferHistory {
    entries: Vec<BufferId>,
}

impl BufferHistory {
    pub fn new(initial: BufferId) -> Self {
        Self {
            entries: vec![initial],
        }
    }

    /// Note that `id` became current.
    pub fn record(&mut self, id: BufferId) {
        if self.entries.last() == Some(&id) {
            return;
        }
        self.entries.push(id);
        if self.entries.len() > BUFFER_HISTORY_LEN {
            let excess = self.entries.len() - BUFFER_HISTORY_LEN;
            self.entries.drain(..excess);
        }
    }

    /// Forget a closed buffer.
    pub fn remove(&mut self, id: BufferId) {
        self.entries.retain(|e| *e != id);
        self.entries.dedup();
    }

    /// The buffer that was current before the present one.
    pub fn alternate(&self) -> Option<BufferId> {
        self.entries.len().checked_sub(2).map(|i| self.entries[i])
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// One row of the buffer list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BufferListEntry {
    /// 1-based position in registry order.
    pub number: usize,
    pub id: BufferId,
    pub name: String,
    pub current: bool,
    pub modified: bool,
}

impl fmt::Display for BufferListEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let current = if self.current { '>' } else { ' ' };
        let modified = if self.modified { '+' } else { ' ' };
        write!(f, "{current} {} {} {modified}", self.number, self.name)
    }
}
