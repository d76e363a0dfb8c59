//! Snapshot-based undo/redo history for one buffer.
//!
//! `save_state` is called *before* a mutation and records the pre-image. Each
//! distinct buffer state carries a monotonic id; the save point remembers the
//! id of the state that was last written, so eviction of old entries never
//! desynchronises modified tracking.
//!
//! Insert coalescing: a contiguous run of insert-mode edits is captured by a
//! single snapshot taken lazily at the first mutation of the run. Leaving
//! insert mode or inserting a newline closes the run.

use core_text::{Buffer, TextSnapshot};
use std::collections::hash_map::DefaultHasher;
use std::hash::Hasher;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Instant, SystemTime};
use tracing::{debug, trace};

/// Default maximum number of snapshots retained in undo history.
pub const UNDO_LEVELS_DEFAULT: usize = 1000;

/// One entry of undo or redo history.
#[derive(Clone, Debug)]
pub struct UndoState {
    pub snapshot: TextSnapshot,
    pub timestamp: SystemTime,
    pub description: String,
    /// Id of the buffer state this snapshot represents.
    pub id: u64,
    hash: u64,
}

impl UndoState {
    fn capture(buffer: &Buffer, description: &str, id: u64) -> Self {
        let snapshot = buffer.capture();
        let hash = content_hash(&snapshot.text());
        Self {
            snapshot,
            timestamp: SystemTime::now(),
            description: description.to_string(),
            id,
            hash,
        }
    }

    pub(crate) fn restored(
        snapshot: TextSnapshot,
        timestamp: SystemTime,
        description: String,
        id: u64,
    ) -> Self {
        let hash = content_hash(&snapshot.text());
        Self {
            snapshot,
            timestamp,
            description,
            id,
            hash,
        }
    }
}

/// Insert run state tracking.
#[derive(Debug, Clone)]
pub enum InsertRun {
    Inactive,
    Active {
        started_at: Instant,
        edits: u32,
        /// Buffer generation when the run began.
        generation: u64,
        pending: PendingEdit,
    },
}

/// Returned by `save_state`; hand it to `cancel` when the guarded edit
/// turned out to change nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingEdit {
    pushed: bool,
    prior_live: u64,
}

impl PendingEdit {
    /// False when the pre-image duplicated the undo top and was not pushed.
    pub fn pushed(&self) -> bool {
        self.pushed
    }
}

#[derive(Debug)]
pub struct UndoManager {
    undo_stack: Vec<UndoState>,
    redo_stack: Vec<UndoState>,
    max_levels: usize,
    live_id: u64,
    next_id: u64,
    save_point: Option<u64>,
    insert_run: InsertRun,
    /// Count of snapshots skipped because the pre-image equalled the undo top.
    snapshots_skipped: AtomicU64,
}

impl Default for UndoManager {
    fn default() -> Self {
        Self::new(UNDO_LEVELS_DEFAULT)
    }
}

impl UndoManager {
    /// A fresh history whose live state is also the save point.
    pub fn new(max_levels: usize) -> Self {
        Self {
            undo_stack: Vec::new(),
            redo_stack: Vec::new(),
            max_levels: max_levels.max(1),
            live_id: 0,
            next_id: 1,
            save_point: Some(0),
            insert_run: InsertRun::Inactive,
            snapshots_skipped: AtomicU64::new(0),
        }
    }

    pub fn undo_depth(&self) -> usize {
        self.undo_stack.len()
    }
    pub fn redo_depth(&self) -> usize {
        self.redo_stack.len()
    }
    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }
    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }
    pub fn max_levels(&self) -> usize {
        self.max_levels
    }
    pub fn insert_run(&self) -> &InsertRun {
        &self.insert_run
    }
    pub fn snapshots_skipped(&self) -> u64 {
        self.snapshots_skipped.load(Ordering::Relaxed)
    }
    /// Undo entries, oldest first.
    pub fn history(&self) -> &[UndoState] {
        &self.undo_stack
    }
    pub fn live_id(&self) -> u64 {
        self.live_id
    }
    pub fn save_point(&self) -> Option<u64> {
        self.save_point
    }

    /// Record the pre-image of an edit about to happen and clear redo.
    /// The post-edit state always gets a fresh id, even when the pre-image
    /// duplicated the undo top and no snapshot was pushed.
    pub fn save_state(&mut self, buffer: &Buffer, description: &str) -> PendingEdit {
        let prior_live = self.live_id;
        let state = UndoState::capture(buffer, description, self.live_id);
        self.redo_stack.clear();
        self.live_id = self.next_id;
        self.next_id += 1;
        if let Some(top) = self.undo_stack.last()
            && top.hash == state.hash
            && top.snapshot == state.snapshot
        {
            self.snapshots_skipped.fetch_add(1, Ordering::Relaxed);
            trace!(target: "state.undo", undo_depth = self.undo_stack.len(), hash = state.hash, "snapshot_dedupe_skip");
            return PendingEdit {
                pushed: false,
                prior_live,
            };
        }
        let hash = state.hash;
        self.undo_stack.push(state);
        trace!(target: "state.undo", undo_depth = self.undo_stack.len(), lines = buffer.line_count(), hash, description, "push_snapshot");
        if self.undo_stack.len() > self.max_levels {
            let evicted = self.undo_stack.len() - self.max_levels;
            self.undo_stack.drain(..evicted);
            trace!(target: "state.undo", evicted, "undo_stack_trimmed");
        }
        PendingEdit {
            pushed: true,
            prior_live,
        }
    }

    /// Undo the bookkeeping of `save_state` for an edit that changed nothing:
    /// drop its snapshot (if one was pushed) and return to the prior live id.
    pub fn cancel(&mut self, pending: PendingEdit) {
        if pending.pushed {
            self.undo_stack.pop();
        }
        self.live_id = pending.prior_live;
        trace!(target: "state.undo", undo_depth = self.undo_stack.len(), pushed = pending.pushed, "snapshot_cancelled");
    }

    /// Begin (or continue) an insert run. Only the first call of a run
    /// captures a snapshot.
    pub fn begin_insert_run(&mut self, buffer: &Buffer) {
        if let InsertRun::Inactive = self.insert_run {
            let pending = self.save_state(buffer, "insert");
            self.insert_run = InsertRun::Active {
                started_at: Instant::now(),
                edits: 0,
                generation: buffer.generation(),
                pending,
            };
        }
    }

    pub fn note_insert_edit(&mut self) {
        if let InsertRun::Active { edits, .. } = &mut self.insert_run {
            *edits += 1;
        }
    }

    /// Close the current run. A run that left `buffer` untouched leaves no
    /// history behind.
    pub fn end_insert_run(&mut self, buffer: &Buffer) {
        if let InsertRun::Active {
            started_at,
            edits,
            generation,
            pending,
        } = self.insert_run
        {
            self.insert_run = InsertRun::Inactive;
            if buffer.generation() == generation {
                self.cancel(pending);
            }
            trace!(target: "state.undo", edits, elapsed_ms = started_at.elapsed().as_millis() as u64, "insert_run_end");
        }
    }

    /// Restore the previous state. False when there is nothing to undo.
    pub fn undo(&mut self, buffer: &mut Buffer) -> bool {
        self.end_insert_run(buffer);
        let Some(prev) = self.undo_stack.pop() else {
            return false;
        };
        let current = UndoState::capture(buffer, &prev.description, self.live_id);
        self.redo_stack.push(current);
        self.live_id = prev.id;
        buffer.restore(prev.snapshot);
        buffer.set_modified(self.is_modified());
        debug!(target: "state.undo", undo_depth = self.undo_stack.len(), redo_depth = self.redo_stack.len(), description = %prev.description, "undo");
        true
    }

    /// Re-apply the most recently undone state. False when redo is empty.
    pub fn redo(&mut self, buffer: &mut Buffer) -> bool {
        self.end_insert_run(buffer);
        let Some(next) = self.redo_stack.pop() else {
            return false;
        };
        let current = UndoState::capture(buffer, &next.description, self.live_id);
        self.undo_stack.push(current);
        self.live_id = next.id;
        buffer.restore(next.snapshot);
        buffer.set_modified(self.is_modified());
        debug!(target: "state.undo", undo_depth = self.undo_stack.len(), redo_depth = self.redo_stack.len(), description = %next.description, "redo");
        true
    }

    /// Mark the live state as the one on disk.
    pub fn mark_save_point(&mut self) {
        self.save_point = Some(self.live_id);
        trace!(target: "state.undo", id = self.live_id, "save_point");
    }

    /// Whether the live state differs from the save point.
    pub fn is_modified(&self) -> bool {
        self.save_point != Some(self.live_id)
    }

    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
        self.insert_run = InsertRun::Inactive;
    }

    /// Replace history with entries loaded from disk. The live state becomes
    /// `live_id` and is treated as saved.
    pub(crate) fn seed(&mut self, mut entries: Vec<UndoState>, live_id: u64) {
        if entries.len() > self.max_levels {
            let excess = entries.len() - self.max_levels;
            entries.drain(..excess);
        }
        let max_id = entries.iter().map(|e| e.id).max().unwrap_or(0).max(live_id);
        self.undo_stack = entries;
        self.redo_stack.clear();
        self.live_id = live_id;
        self.next_id = max_id + 1;
        self.save_point = Some(live_id);
        self.insert_run = InsertRun::Inactive;
    }
}

/// In-process hash of full buffer content, used for snapshot dedupe only.
/// Never persisted; see `undo_store::content_digest` for the on-disk check.
pub fn content_hash(text: &str) -> u64 {
    let mut h = DefaultHasher::new();
    h.write(text.as_bytes());
    h.finish()
}
