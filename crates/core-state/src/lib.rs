//! Editor state: buffer registry, per-buffer undo history, visual selection,
//! and the shared search engine.
//!
//! There is no global "current buffer". Every operation names its target by
//! `BufferId`; the window layer (`core-model`) decides which buffer is active.
//!
//! Undo discipline:
//! - Discrete edits go through [`EditorState::apply_edit`], which captures the
//!   pre-image, runs the mutation and drops the snapshot again if the buffer
//!   did not change.
//! - Typing (`type_char`, `type_backspace`) coalesces into one snapshot per
//!   insert run. `type_newline` and `end_insert` close the run.
//! - After undo/redo the buffer's `modified` flag is re-derived from the save
//!   point, so undoing back to the saved text clears it.

use std::collections::BTreeMap;
use std::fmt;
use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};

use core_text::{Buffer, PastePlacement, YankContent};
use tracing::{debug, info, warn};

pub mod error;
pub mod io;
pub mod search;
pub mod selection;
pub mod undo;
pub mod undo_store;

pub use error::{EditorError, Result};
pub use io::{FileOptions, SaveReport};
pub use search::{
    ReplaceReport, SearchDirection, SearchEngine, SearchMatch, SearchOptions, SubstituteFlags,
};
pub use selection::{SelectionMode, VisualSelection};
pub use undo::{InsertRun, PendingEdit, UNDO_LEVELS_DEFAULT, UndoManager, UndoState};
pub use undo_store::PERSIST_LEVELS_DEFAULT;

/// Stable identifier of a buffer in the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BufferId(pub u64);

impl fmt::Display for BufferId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Undo persistence settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UndoOptions {
    pub levels: usize,
    pub persist: bool,
    pub persist_levels: usize,
    pub dir: Option<PathBuf>,
}

impl Default for UndoOptions {
    fn default() -> Self {
        Self {
            levels: UNDO_LEVELS_DEFAULT,
            persist: false,
            persist_levels: PERSIST_LEVELS_DEFAULT,
            dir: None,
        }
    }
}

/// Editing behaviour knobs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditOptions {
    /// Unit used by indent/unindent.
    pub indent: String,
    pub auto_indent: bool,
}

impl Default for EditOptions {
    fn default() -> Self {
        Self {
            indent: "    ".to_string(),
            auto_indent: true,
        }
    }
}

/// Everything the state layer reads from configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StateOptions {
    pub undo: UndoOptions,
    pub edit: EditOptions,
    pub file: FileOptions,
    pub search: SearchOptions,
}

#[derive(Debug)]
struct BufferEntry {
    buffer: Buffer,
    undo: UndoManager,
}

/// Top-level editor state container.
#[derive(Debug)]
pub struct EditorState {
    buffers: BTreeMap<BufferId, BufferEntry>,
    next_id: u64,
    unnamed_count: u64,
    pub search: SearchEngine,
    pub options: StateOptions,
    visual: Option<(BufferId, VisualSelection)>,
}

impl Default for EditorState {
    fn default() -> Self {
        Self::new(StateOptions::default())
    }
}

impl EditorState {
    pub fn new(options: StateOptions) -> Self {
        Self {
            buffers: BTreeMap::new(),
            next_id: 1,
            unnamed_count: 0,
            search: SearchEngine::new(options.search),
            options,
            visual: None,
        }
    }

    // -- Registry ----------------------------------------------------------------

    /// Register an existing buffer and return its id.
    pub fn insert_buffer(&mut self, buffer: Buffer) -> BufferId {
        let id = BufferId(self.next_id);
        self.next_id += 1;
        debug!(target: "state.registry", buffer = %id, name = %buffer.name, "buffer_added");
        let undo = UndoManager::new(self.options.undo.levels);
        self.buffers.insert(id, BufferEntry { buffer, undo });
        id
    }

    /// Create an empty unnamed buffer (`[No Name N]`).
    pub fn new_buffer(&mut self) -> BufferId {
        self.unnamed_count += 1;
        let name = format!("[No Name {}]", self.unnamed_count);
        self.insert_buffer(Buffer::new(name))
    }

    /// Open `path`, reusing an existing buffer bound to the same file.
    pub fn open(&mut self, path: &Path) -> Result<BufferId> {
        if let Some(id) = self.find_by_path(path) {
            debug!(target: "state.registry", buffer = %id, "buffer_reused");
            return Ok(id);
        }
        let buffer = io::load_file(path, &self.options.file)?;
        let text = buffer.text();
        let id = self.insert_buffer(buffer);
        if self.options.undo.persist
            && let Some(dir) = self.options.undo.dir.clone()
            && let Some(entry) = self.buffers.get_mut(&id)
        {
            match undo_store::load(&dir, path, &mut entry.undo, &text) {
                Ok(n) if n > 0 => info!(target: "state.undo.store", buffer = %id, entries = n, "undo_history_restored"),
                Ok(_) => {}
                Err(e) => warn!(target: "state.undo.store", buffer = %id, error = %e, "undo_history_load_failed"),
            }
        }
        Ok(id)
    }

    fn find_by_path(&self, path: &Path) -> Option<BufferId> {
        let wanted = std::path::absolute(path).ok()?;
        self.buffers.iter().find_map(|(id, e)| {
            let p = e.buffer.path()?;
            (std::path::absolute(p).ok()? == wanted).then_some(*id)
        })
    }

    /// Remove a buffer from the registry, returning it. Callers that display
    /// buffers must check for live windows first.
    pub fn close_buffer(&mut self, id: BufferId) -> Result<Buffer> {
        let entry = self
            .buffers
            .remove(&id)
            .ok_or(EditorError::UnknownBuffer(id))?;
        if matches!(self.visual, Some((v, _)) if v == id) {
            self.visual = None;
        }
        debug!(target: "state.registry", buffer = %id, "buffer_closed");
        Ok(entry.buffer)
    }

    pub fn contains(&self, id: BufferId) -> bool {
        self.buffers.contains_key(&id)
    }

    pub fn buffer_ids(&self) -> impl Iterator<Item = BufferId> + '_ {
        self.buffers.keys().copied()
    }

    pub fn buffer_count(&self) -> usize {
        self.buffers.len()
    }

    pub fn buffer(&self, id: BufferId) -> Result<&Buffer> {
        self.buffers
            .get(&id)
            .map(|e| &e.buffer)
            .ok_or(EditorError::UnknownBuffer(id))
    }

    /// Direct mutable access for cursor motion, marks and jumps. Content
    /// changes should go through `apply_edit` so they are undoable.
    pub fn buffer_mut(&mut self, id: BufferId) -> Result<&mut Buffer> {
        self.buffers
            .get_mut(&id)
            .map(|e| &mut e.buffer)
            .ok_or(EditorError::UnknownBuffer(id))
    }

    pub fn undo_manager(&self, id: BufferId) -> Result<&UndoManager> {
        self.buffers
            .get(&id)
            .map(|e| &e.undo)
            .ok_or(EditorError::UnknownBuffer(id))
    }

    fn entry_mut(&mut self, id: BufferId) -> Result<&mut BufferEntry> {
        self.buffers
            .get_mut(&id)
            .ok_or(EditorError::UnknownBuffer(id))
    }

    // -- Undoable editing --------------------------------------------------------

    /// Run a discrete, undoable mutation against a buffer.
    pub fn apply_edit<R>(
        &mut self,
        id: BufferId,
        description: &str,
        edit: impl FnOnce(&mut Buffer) -> R,
    ) -> Result<R> {
        let entry = self.entry_mut(id)?;
        entry.undo.end_insert_run(&entry.buffer);
        let generation = entry.buffer.generation();
        let pending = entry.undo.save_state(&entry.buffer, description);
        let out = edit(&mut entry.buffer);
        if entry.buffer.generation() == generation {
            entry.undo.cancel(pending);
        }
        Ok(out)
    }

    /// Insert-mode character; coalesced with the rest of the run.
    pub fn type_char(&mut self, id: BufferId, ch: char) -> Result<()> {
        let entry = self.entry_mut(id)?;
        entry.undo.begin_insert_run(&entry.buffer);
        entry.buffer.insert_char(ch);
        entry.undo.note_insert_edit();
        Ok(())
    }

    /// Insert-mode backspace; part of the current run.
    pub fn type_backspace(&mut self, id: BufferId) -> Result<bool> {
        let entry = self.entry_mut(id)?;
        entry.undo.begin_insert_run(&entry.buffer);
        let changed = entry.buffer.backspace();
        entry.undo.note_insert_edit();
        Ok(changed)
    }

    /// Insert-mode Enter: joins the current run, then closes it.
    pub fn type_newline(&mut self, id: BufferId) -> Result<()> {
        let auto_indent = self.options.edit.auto_indent;
        let entry = self.entry_mut(id)?;
        entry.undo.begin_insert_run(&entry.buffer);
        entry.buffer.insert_newline(auto_indent);
        entry.undo.end_insert_run(&entry.buffer);
        Ok(())
    }

    /// Leave insert mode.
    pub fn end_insert(&mut self, id: BufferId) -> Result<()> {
        let entry = self.entry_mut(id)?;
        entry.undo.end_insert_run(&entry.buffer);
        Ok(())
    }

    pub fn undo(&mut self, id: BufferId) -> Result<bool> {
        let entry = self.entry_mut(id)?;
        Ok(entry.undo.undo(&mut entry.buffer))
    }

    pub fn redo(&mut self, id: BufferId) -> Result<bool> {
        let entry = self.entry_mut(id)?;
        Ok(entry.undo.redo(&mut entry.buffer))
    }

    pub fn paste(
        &mut self,
        id: BufferId,
        content: &YankContent,
        placement: PastePlacement,
    ) -> Result<bool> {
        self.apply_edit(id, "paste", |b| b.paste(content, placement))
    }

    /// Write a buffer to disk (its own path, or `target` for "save as"),
    /// update the save point and persist undo history when enabled.
    pub fn save(&mut self, id: BufferId, target: Option<&Path>) -> Result<SaveReport> {
        let backup = self.options.file.backup;
        let undo_opts = self.options.undo.clone();
        let entry = self.entry_mut(id)?;
        let report = io::save_buffer(&mut entry.buffer, target, backup)?;
        entry.undo.mark_save_point();
        if undo_opts.persist
            && let Some(dir) = undo_opts.dir.as_deref()
        {
            let text = entry.buffer.text();
            if let Err(e) =
                undo_store::save(dir, &report.path, &entry.undo, &text, undo_opts.persist_levels)
            {
                warn!(target: "state.undo.store", buffer = %id, error = %e, "undo_history_save_failed");
            }
        }
        Ok(report)
    }

    // -- Search ------------------------------------------------------------------

    /// Search and move the cursor to the chosen match (recording a jump).
    pub fn search(
        &mut self,
        id: BufferId,
        pattern: &str,
        direction: SearchDirection,
    ) -> Result<Option<SearchMatch>> {
        let entry = self.buffers.get_mut(&id).ok_or(EditorError::UnknownBuffer(id))?;
        let found = self.search.search(id, &entry.buffer, pattern, direction)?;
        jump_to_match(&mut entry.buffer, found.as_ref());
        Ok(found)
    }

    pub fn find_next(&mut self, id: BufferId) -> Result<Option<SearchMatch>> {
        let entry = self.buffers.get_mut(&id).ok_or(EditorError::UnknownBuffer(id))?;
        let found = self.search.find_next(id, &entry.buffer)?;
        jump_to_match(&mut entry.buffer, found.as_ref());
        Ok(found)
    }

    pub fn find_previous(&mut self, id: BufferId) -> Result<Option<SearchMatch>> {
        let entry = self.buffers.get_mut(&id).ok_or(EditorError::UnknownBuffer(id))?;
        let found = self.search.find_previous(id, &entry.buffer)?;
        jump_to_match(&mut entry.buffer, found.as_ref());
        Ok(found)
    }

    /// Undoable substitution over `rows` (default whole buffer).
    pub fn replace(
        &mut self,
        id: BufferId,
        pattern: &str,
        replacement: &str,
        flags: SubstituteFlags,
        rows: Option<RangeInclusive<usize>>,
    ) -> Result<ReplaceReport> {
        let entry = self.buffers.get_mut(&id).ok_or(EditorError::UnknownBuffer(id))?;
        entry.undo.end_insert_run(&entry.buffer);
        let generation = entry.buffer.generation();
        let pending = entry.undo.save_state(&entry.buffer, "substitute");
        let report = self
            .search
            .replace(&mut entry.buffer, pattern, replacement, flags, rows);
        if !matches!(&report, Ok(r) if r.substitutions > 0)
            || entry.buffer.generation() == generation
        {
            entry.undo.cancel(pending);
        }
        report
    }

    // -- Visual selection --------------------------------------------------------

    /// Enter visual mode anchored at the buffer cursor.
    pub fn enter_visual(&mut self, id: BufferId, mode: SelectionMode) -> Result<VisualSelection> {
        let cursor = self.buffer(id)?.cursor();
        let sel = VisualSelection::start(mode, cursor);
        self.visual = Some((id, sel));
        debug!(target: "state.selection", buffer = %id, ?mode, "visual_enter");
        Ok(sel)
    }

    /// Follow the buffer cursor with the selection head.
    pub fn update_visual(&mut self) -> Option<VisualSelection> {
        let (id, mut sel) = self.visual?;
        let cursor = self.buffers.get(&id)?.buffer.cursor();
        sel.update(cursor);
        self.visual = Some((id, sel));
        Some(sel)
    }

    pub fn set_visual_mode(&mut self, mode: SelectionMode) {
        if let Some((_, sel)) = self.visual.as_mut() {
            sel.set_mode(mode);
        }
    }

    pub fn visual(&self) -> Option<(BufferId, VisualSelection)> {
        self.visual
    }

    pub fn exit_visual(&mut self) {
        self.visual = None;
    }

    /// Yank the selection and leave visual mode.
    pub fn visual_yank(&mut self) -> Option<YankContent> {
        let (id, sel) = self.visual.take()?;
        Some(sel.extract_text(&self.buffers.get(&id)?.buffer))
    }

    /// Delete the selection (undoable) and leave visual mode.
    pub fn visual_delete(&mut self) -> Result<Option<YankContent>> {
        let Some((id, sel)) = self.visual.take() else {
            return Ok(None);
        };
        self.apply_edit(id, "visual delete", |b| sel.delete(b)).map(Some)
    }

    /// Indent the selected rows (undoable) and leave visual mode.
    pub fn visual_indent(&mut self) -> Result<usize> {
        let Some((id, sel)) = self.visual.take() else {
            return Ok(0);
        };
        let unit = self.options.edit.indent.clone();
        self.apply_edit(id, "indent", |b| sel.indent(b, &unit))
    }

    /// Unindent the selected rows (undoable) and leave visual mode.
    pub fn visual_unindent(&mut self) -> Result<usize> {
        let Some((id, sel)) = self.visual.take() else {
            return Ok(0);
        };
        let unit = self.options.edit.indent.clone();
        self.apply_edit(id, "unindent", |b| sel.unindent(b, &unit))
    }
}

fn jump_to_match(buf: &mut Buffer, found: Option<&SearchMatch>) {
    if let Some(m) = found {
        buf.push_jump();
        buf.set_cursor(m.position());
    }
}
