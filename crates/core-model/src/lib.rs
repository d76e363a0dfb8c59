//! Editor model: buffers plus the windows looking at them.
//!
//! `EditorModel` pairs the buffer registry (`core_state::EditorState`) with a
//! `WindowManager`. Windows reference buffers by `BufferId`; several windows
//! may show the same buffer, each with its own scroll offsets.
//!
//! Cursor ownership:
//! * the buffer cursor is authoritative and is what edits move;
//! * a window stores a cursor only while unfocused (`saved_cursor`); focus
//!   changes write the outgoing cursor into the old window and restore the
//!   incoming window's saved cursor (clamped) into its buffer.
//!
//! The current buffer is whatever the active window shows. Buffer navigation
//! (`next_buffer`, `previous_buffer`, `switch_to_buffer`, `alternate_buffer`)
//! retargets the active window and records the switch in a bounded history.
//!
//! Scrolling is recomputed on demand with `auto_scroll`, vertically via
//! `compute_scroll_intent` and horizontally with the same rule applied to
//! display columns (wide characters count double, tabs expand to the next
//! tab stop).

use std::ops::Range;
use std::path::Path;

use core_config::Config;
use core_state::{BufferId, EditorError, EditorState, Result};
use core_text::{Buffer, Position};
use tracing::{debug, trace};
use unicode_width::UnicodeWidthChar;

mod buffer_list;
mod layout;
mod window;
pub use buffer_list::{BUFFER_HISTORY_LEN, BufferHistory, BufferListEntry};
pub use layout::{LayoutNode, Rect, SplitAxis};
pub use window::{Window, WindowId, WindowManager};

/// Scroll behaviour derived from configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScrollSettings {
    pub vertical_margin: usize,
    pub horizontal_margin: usize,
    pub tab_width: usize,
}

impl Default for ScrollSettings {
    fn default() -> Self {
        Self {
            vertical_margin: 0,
            horizontal_margin: 0,
            tab_width: 4,
        }
    }
}

impl ScrollSettings {
    /// Uses the already clamped vertical margin (`Config::apply_context`).
    pub fn from_config(config: &Config) -> Self {
        Self {
            vertical_margin: usize::from(config.effective_vertical_margin),
            horizontal_margin: usize::from(config.horizontal_margin()),
            tab_width: config.tab_width(),
        }
    }
}

#[derive(Debug)]
pub struct EditorModel {
    state: EditorState,
    windows: WindowManager,
    scroll: ScrollSettings,
    history: BufferHistory,
}

impl EditorModel {
    /// One full-area window showing `buffer`, which must be registered.
    pub fn new(
        state: EditorState,
        buffer: BufferId,
        area: Rect,
        scroll: ScrollSettings,
    ) -> Result<Self> {
        let anchor = state.buffer(buffer)?.viewport;
        let mut windows = WindowManager::new(area, buffer);
        windows.active_mut().scroll_line = anchor.line;
        windows.active_mut().scroll_col = anchor.col;
        Ok(Self {
            state,
            windows,
            scroll,
            history: BufferHistory::new(buffer),
        })
    }

    pub fn state(&self) -> &EditorState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut EditorState {
        &mut self.state
    }

    pub fn windows(&self) -> &WindowManager {
        &self.windows
    }

    pub fn scroll_settings(&self) -> ScrollSettings {
        self.scroll
    }

    pub fn set_scroll_settings(&mut self, scroll: ScrollSettings) {
        self.scroll = scroll;
    }

    pub fn active_window(&self) -> &Window {
        self.windows.active()
    }

    pub fn active_buffer_id(&self) -> BufferId {
        self.windows.active().buffer
    }

    pub fn active_buffer(&self) -> Result<&Buffer> {
        self.state.buffer(self.active_buffer_id())
    }

    pub fn active_buffer_mut(&mut self) -> Result<&mut Buffer> {
        let id = self.active_buffer_id();
        self.state.buffer_mut(id)
    }

    pub fn window(&self, id: WindowId) -> Result<&Window> {
        self.windows.window(id).ok_or(EditorError::UnknownWindow(id.0))
    }

    // -- Window lifecycle --------------------------------------------------------

    /// Split the active window; `Ok(None)` when it is too small to divide.
    pub fn split(&mut self, axis: SplitAxis) -> Result<Option<WindowId>> {
        let cursor = self.active_buffer()?.cursor();
        Ok(self.windows.split(axis, cursor))
    }

    /// Close the active window. `Ok(false)` when it is the last one.
    pub fn close_window(&mut self) -> Result<bool> {
        if self.windows.close().is_none() {
            return Ok(false);
        }
        self.restore_active_cursor()?;
        self.history.record(self.active_buffer_id());
        Ok(true)
    }

    pub fn next_window(&mut self) -> Result<WindowId> {
        self.change_focus(|w| {
            w.next();
            true
        })?;
        Ok(self.windows.active().id)
    }

    pub fn previous_window(&mut self) -> Result<WindowId> {
        self.change_focus(|w| {
            w.previous();
            true
        })?;
        Ok(self.windows.active().id)
    }

    pub fn focus(&mut self, id: WindowId) -> Result<()> {
        if self.windows.window(id).is_none() {
            return Err(EditorError::UnknownWindow(id.0));
        }
        if self.windows.active().id == id {
            return Ok(());
        }
        self.change_focus(|w| w.focus(id))?;
        Ok(())
    }

    fn change_focus<F>(&mut self, f: F) -> Result<bool>
    where
        F: FnOnce(&mut WindowManager) -> bool,
    {
        let cursor = self.active_buffer()?.cursor();
        let before = self.windows.active().id;
        self.windows.active_mut().saved_cursor = Some(cursor);
        if !f(&mut self.windows) {
            self.windows.active_mut().saved_cursor = None;
            return Ok(false);
        }
        self.restore_active_cursor()?;
        self.history.record(self.active_buffer_id());
        debug!(target: "model.window", from = before.0, to = self.windows.active().id.0, "focus_changed");
        Ok(true)
    }

    fn restore_active_cursor(&mut self) -> Result<()> {
        let buffer = self.windows.active().buffer;
        if let Some(saved) = self.windows.active_mut().saved_cursor.take() {
            let buf = self.state.buffer_mut(buffer)?;
            let pos = buf.clamp(saved);
            buf.set_cursor(pos);
        }
        Ok(())
    }

    pub fn resize(&mut self, width: u16, height: u16) {
        self.windows.resize(width, height);
    }

    // -- Buffers -----------------------------------------------------------------

    /// Show `buffer` in `window`, seeding its scroll from the buffer's anchor.
    pub fn set_window_buffer(&mut self, window: WindowId, buffer: BufferId) -> Result<()> {
        if self.windows.window(window).is_none() {
            return Err(EditorError::UnknownWindow(window.0));
        }
        let anchor = self.state.buffer(buffer)?.viewport;
        self.windows.set_buffer(window, buffer, anchor);
        if self.windows.active().id == window {
            self.history.record(buffer);
        }
        Ok(())
    }

    /// Open (or reuse) `path` and show it in the active window.
    pub fn open_in_active(&mut self, path: &Path) -> Result<BufferId> {
        let id = self.state.open(path)?;
        let window = self.windows.active().id;
        self.set_window_buffer(window, id)?;
        Ok(id)
    }

    /// Remove a buffer that no window displays.
    pub fn close_buffer(&mut self, id: BufferId) -> Result<Buffer> {
        let showing = self.windows.windows_showing(id);
        if !showing.is_empty() {
            debug!(target: "model.window", buffer = %id, windows = showing.len(), "close_buffer_refused_in_use");
            return Err(EditorError::BufferInUse(id));
        }
        let buffer = self.state.close_buffer(id)?;
        self.history.remove(id);
        Ok(buffer)
    }

    // -- Buffer navigation -------------------------------------------------------

    /// Show the buffer after the current one (registry order, wrapping).
    pub fn next_buffer(&mut self) -> Result<BufferId> {
        self.cycle_buffer(1)
    }

    /// Show the buffer before the current one (registry order, wrapping).
    pub fn previous_buffer(&mut self) -> Result<BufferId> {
        self.cycle_buffer(-1)
    }

    fn cycle_buffer(&mut self, step: isize) -> Result<BufferId> {
        let ids: Vec<BufferId> = self.state.buffer_ids().collect();
        let current = self.active_buffer_id();
        let pos = ids
            .iter()
            .position(|id| *id == current)
            .ok_or(EditorError::UnknownBuffer(current))?;
        let target = ids[(pos as isize + step).rem_euclid(ids.len() as isize) as usize];
        self.switch_to_buffer(target)?;
        Ok(target)
    }

    /// Show `id` in the active window.
    pub fn switch_to_buffer(&mut self, id: BufferId) -> Result<()> {
        let window = self.windows.active().id;
        let from = self.active_buffer_id();
        self.set_window_buffer(window, id)?;
        debug!(target: "model.window", window = window.0, from = %from, to = %id, "buffer_switched");
        Ok(())
    }

    /// Return to the previously current buffer. `Ok(None)` when there is none.
    pub fn alternate_buffer(&mut self) -> Result<Option<BufferId>> {
        let Some(id) = self.history.alternate() else {
            return Ok(None);
        };
        self.switch_to_buffer(id)?;
        Ok(Some(id))
    }

    pub fn buffer_history(&self) -> &BufferHistory {
        &self.history
    }

    /// Every registered buffer in registry order, marking the current one
    /// and those with unsaved changes.
    pub fn buffer_list(&self) -> Result<Vec<BufferListEntry>> {
        let current = self.active_buffer_id();
        self.state
            .buffer_ids()
            .enumerate()
            .map(|(i, id)| -> Result<BufferListEntry> {
                let buf = self.state.buffer(id)?;
                Ok(BufferListEntry {
                    number: i + 1,
                    id,
                    name: buf.name.clone(),
                    current: id == current,
                    modified: buf.is_modified(),
                })
            })
            .collect()
    }

    // -- Scrolling ---------------------------------------------------------------

    /// Scroll the active window so its buffer cursor stays inside the margins.
    /// Records the resulting offsets as the buffer's viewport anchor. Returns
    /// true when either offset changed.
    pub fn auto_scroll(&mut self) -> Result<bool> {
        let scroll = self.scroll;
        let buffer = self.windows.active().buffer;
        let buf = self.state.buffer_mut(buffer)?;
        let win = self.windows.active_mut();
        let cursor = buf.cursor();

        let mut changed = false;
        if let Some(first) = compute_scroll_intent(
            win.scroll_line,
            cursor.line,
            win.text_height(),
            scroll.vertical_margin,
        ) {
            win.scroll_line = first;
            changed = true;
        }
        let line = buf.current_line();
        let cell = display_col(&line, cursor.col, scroll.tab_width);
        if let Some(first) = compute_scroll_intent(
            win.scroll_col,
            cell,
            win.text_width(),
            scroll.horizontal_margin,
        ) {
            win.scroll_col = first;
            changed = true;
        }
        buf.viewport = Position::new(win.scroll_line, win.scroll_col);
        if changed {
            trace!(target: "model.window", window = win.id.0, line = win.scroll_line, col = win.scroll_col, "scrolled");
        }
        Ok(changed)
    }

    /// Row range of `window`'s buffer currently on screen.
    pub fn visible_range(&self, window: WindowId) -> Result<Range<usize>> {
        let win = self.window(window)?;
        let buf = self.state.buffer(win.buffer)?;
        Ok(win.visible_lines(buf.line_count()))
    }

    /// Text of the visible rows of `window`, unclipped horizontally.
    pub fn visible_lines(&self, window: WindowId) -> Result<Vec<String>> {
        let win = self.window(window)?;
        let buf = self.state.buffer(win.buffer)?;
        Ok(win
            .visible_lines(buf.line_count())
            .filter_map(|row| buf.line(row))
            .collect())
    }
}

/// Compute a new first visible line such that the cursor stays within a
/// margin band inside the viewport.
///
/// - first: current first visible line (top of viewport)
/// - cursor_line: current cursor line (0-based)
/// - text_height: number of text rows available
/// - margin: desired margin in rows, clamped to `(text_height - 1) / 2` so
///   the top and bottom bands never overlap
///
/// Returns `Some(new_first)` if a scroll is needed, else `None`. The same
/// rule serves horizontal scrolling with display columns and widths.
pub fn compute_scroll_intent(
    first: usize,
    cursor_line: usize,
    text_height: usize,
    margin: usize,
) -> Option<usize> {
    if text_height == 0 {
        return None;
    }
    let m = margin.min((text_height - 1) / 2);
    let top = first;
    let bottom = first + text_height;
    if cursor_line < top + m {
        let new_first = cursor_line.saturating_sub(m);
        if new_first != first {
            return Some(new_first);
        }
    } else if cursor_line + m >= bottom {
        let new_first = cursor_line + m + 1 - text_height;
        if new_first != first {
            return Some(new_first);
        }
    }
    None
}

/// Terminal cell offset of char column `col`. Tabs advance to the next
/// multiple of `tab_width`; control characters take no cells.
pub fn display_col(line: &str, col: usize, tab_width: usize) -> usize {
    let tab = tab_width.max(1);
    line.chars().take(col).fold(0, |cells, ch| {
        if ch == '\t' {
            cells + tab - cells % tab
        } else {
            cells + ch.width().unwrap_or(0)
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn model(text: &str, height: u16, margin: usize) -> EditorModel {
        let mut st = EditorState::default();
        let id = st.insert_buffer(Buffer::from_text("test", text));
        EditorModel::new(
            st,
            id,
            Rect::new(0, 0, 20, height),
            ScrollSettings {
                vertical_margin: margin,
                ..ScrollSettings::default()
            },
        )
        .unwrap()
    }

    fn ten_lines() -> String {
        (0..10).map(|i| i.to_string()).collect::<Vec<_>>().join("\n")
    }

    fn goto(m: &mut EditorModel, line: usize) {
        m.active_buffer_mut()
            .unwrap()
            .set_cursor(Position::new(line, 0));
    }

    #[test]
    fn single_window_initialized() {
        let m = model("hello", 5, 0);
        assert_eq!(m.windows().len(), 1);
        assert_eq!(m.active_window().id, WindowId(0));
        assert_eq!(m.active_window().scroll_line, 0);
    }

    #[test]
    fn new_rejects_unknown_buffer() {
        let err = EditorModel::new(
            EditorState::default(),
            BufferId(9),
            Rect::new(0, 0, 10, 10),
            ScrollSettings::default(),
        )
        .unwrap_err();
        assert!(matches!(err, EditorError::UnknownBuffer(BufferId(9))));
    }

    #[test]
    fn auto_scroll_down_and_up() {
        let mut m = model(&ten_lines(), 5, 0);
        assert!(!m.auto_scroll().unwrap());
        goto(&mut m, 4);
        assert!(!m.auto_scroll().unwrap());
        goto(&mut m, 5);
        assert!(m.auto_scroll().unwrap());
        assert_eq!(m.active_window().scroll_line, 1);
        goto(&mut m, 9);
        assert!(m.auto_scroll().unwrap());
        assert_eq!(m.active_window().scroll_line, 5);
        goto(&mut m, 3);
        assert!(m.auto_scroll().unwrap());
        assert_eq!(m.active_window().scroll_line, 3);
        assert_eq!(m.active_buffer().unwrap().viewport, Position::new(3, 0));
    }

    #[test]
    fn auto_scroll_with_margin_scrolls_earlier() {
        let mut m = model(&ten_lines(), 6, 2);
        goto(&mut m, 4);
        m.auto_scroll().unwrap();
        assert_eq!(m.active_window().scroll_line, 1);
        goto(&mut m, 5);
        m.auto_scroll().unwrap();
        assert_eq!(m.active_window().scroll_line, 2);
    }

    #[test]
    fn auto_scroll_margin_small_viewport_disables_excess_margin() {
        let mut m = model("0\n1\n2\n3\n4", 3, 10);
        goto(&mut m, 2);
        m.auto_scroll().unwrap();
        assert_eq!(m.active_window().scroll_line, 1);
    }

    #[test]
    fn horizontal_scroll_uses_display_columns() {
        let mut m = model(&"界".repeat(30), 3, 0);
        // char 12 sits at cell 24; width 20 -> first = 24 + 1 - 20
        m.active_buffer_mut()
            .unwrap()
            .set_cursor(Position::new(0, 12));
        assert!(m.auto_scroll().unwrap());
        assert_eq!(m.active_window().scroll_col, 5);
        m.active_buffer_mut().unwrap().set_cursor(Position::new(0, 0));
        assert!(m.auto_scroll().unwrap());
        assert_eq!(m.active_window().scroll_col, 0);
    }

    #[test]
    fn display_col_expands_tabs_and_wide_chars() {
        assert_eq!(display_col("\tab", 1, 4), 4);
        assert_eq!(display_col("a\tb", 2, 4), 4);
        assert_eq!(display_col("界x", 1, 4), 2);
        assert_eq!(display_col("abc", 10, 4), 3);
    }

    #[test]
    fn focus_change_saves_and_restores_cursor() {
        let mut m = model(&ten_lines(), 24, 0);
        goto(&mut m, 2);
        let second = m.split(SplitAxis::Horizontal).unwrap().unwrap();
        goto(&mut m, 8);
        m.focus(second).unwrap();
        // the new window starts at the cursor copied during the split
        assert_eq!(m.active_buffer().unwrap().cursor(), Position::new(2, 0));
        goto(&mut m, 5);
        m.previous_window().unwrap();
        assert_eq!(m.active_buffer().unwrap().cursor(), Position::new(8, 0));
        m.next_window().unwrap();
        assert_eq!(m.active_buffer().unwrap().cursor(), Position::new(5, 0));
    }

    #[test]
    fn saved_cursor_is_clamped_on_restore() {
        let mut m = model(&ten_lines(), 24, 0);
        goto(&mut m, 9);
        m.split(SplitAxis::Vertical).unwrap().unwrap();
        let id = m.active_buffer_id();
        m.state_mut().buffer_mut(id).unwrap().set_content("short");
        m.next_window().unwrap();
        assert_eq!(m.active_buffer().unwrap().cursor(), Position::new(0, 0));
    }

    #[test]
    fn focus_unknown_window_is_an_error() {
        let mut m = model("x", 5, 0);
        assert!(matches!(
            m.focus(WindowId(3)),
            Err(EditorError::UnknownWindow(3))
        ));
    }

    #[test]
    fn close_buffer_refuses_displayed_buffer() {
        let mut m = model("x", 5, 0);
        let shown = m.active_buffer_id();
        let other = m.state_mut().new_buffer();
        assert!(matches!(
            m.close_buffer(shown),
            Err(EditorError::BufferInUse(id)) if id == shown
        ));
        assert!(m.close_buffer(other).is_ok());
    }

    #[test]
    fn retarget_seeds_scroll_from_buffer_anchor() {
        let mut m = model("x", 5, 0);
        let mut other = Buffer::from_text("o", &ten_lines());
        other.viewport = Position::new(4, 0);
        let other = m.state_mut().insert_buffer(other);
        let win = m.active_window().id;
        m.set_window_buffer(win, other).unwrap();
        assert_eq!(m.active_window().scroll_line, 4);
        assert_eq!(m.visible_range(win).unwrap(), 4..9);
        assert_eq!(m.visible_lines(win).unwrap()[0], "4");
    }

    #[test]
    fn compute_scroll_intent_basic_noop_when_inside_band() {
        assert_eq!(compute_scroll_intent(0, 5, 10, 2), None);
    }

    #[test]
    fn compute_scroll_intent_scrolls_up_when_above_top_margin() {
        assert_eq!(compute_scroll_intent(10, 11, 6, 2), Some(9));
        assert_eq!(compute_scroll_intent(10, 10, 6, 2), Some(8));
        assert_eq!(compute_scroll_intent(10, 9, 6, 2), Some(7));
    }

    #[test]
    fn compute_scroll_intent_scrolls_down_when_below_bottom_margin() {
        assert_eq!(compute_scroll_intent(0, 3, 5, 1), None);
        assert_eq!(compute_scroll_intent(0, 4, 5, 1), Some(1));
        assert_eq!(compute_scroll_intent(1, 4, 5, 1), None);
    }

    #[test]
    fn compute_scroll_intent_clamps_margin_to_half_height() {
        // height 4 leaves a margin of 1
        assert_eq!(compute_scroll_intent(0, 2, 4, 10), None);
        assert_eq!(compute_scroll_intent(0, 3, 4, 10), Some(1));
        assert_eq!(compute_scroll_intent(1, 3, 4, 10), None);
    }

    #[test]
    fn compute_scroll_intent_even_height_reaches_fixed_point() {
        for height in [2usize, 4, 6, 12] {
            for cursor in 0..30 {
                let mut first = 0;
                if let Some(f) = compute_scroll_intent(first, cursor, height, 100) {
                    first = f;
                }
                assert_eq!(
                    compute_scroll_intent(first, cursor, height, 100),
                    None,
                    "height {height} cursor {cursor}"
                );
            }
        }
    }

    #[test]
    fn compute_scroll_intent_zero_height_never_scrolls() {
        assert_eq!(compute_scroll_intent(3, 100, 0, 0), None);
    }
}
