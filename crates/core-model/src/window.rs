//! Windows and the window manager.
//!
//! A `Window` is a viewport onto one buffer: a rectangle, its own scroll
//! offsets, and a cursor remembered while it is not focused. The buffer's
//! cursor stays the only live cursor; `EditorModel` moves it in and out of
//! `saved_cursor` on focus changes.
//!
//! Invariants:
//! * at least one window exists and `active < windows.len()`;
//! * `windows` is kept in layout (in-order leaf) order;
//! * every window's `rect` is the one produced by the last layout pass.

use std::ops::Range;

use core_state::BufferId;
use core_text::Position;
use tracing::{debug, trace};

use crate::layout::{LayoutNode, Rect, SplitAxis};

/// Stable window identifier. Never reused within a manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct WindowId(pub usize);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Window {
    pub id: WindowId,
    pub buffer: BufferId,
    pub rect: Rect,
    /// First visible line.
    pub scroll_line: usize,
    /// First visible display column.
    pub scroll_col: usize,
    pub saved_cursor: Option<Position>,
}

impl Window {
    pub fn new(id: WindowId, buffer: BufferId, rect: Rect) -> Self {
        Self {
            id,
            buffer,
            rect,
            scroll_line: 0,
            scroll_col: 0,
            saved_cursor: None,
        }
    }

    pub fn text_height(&self) -> usize {
        usize::from(self.rect.height)
    }

    pub fn text_width(&self) -> usize {
        usize::from(self.rect.width)
    }

    /// Rows shown for a buffer of `line_count` lines.
    pub fn visible_lines(&self, line_count: usize) -> Range<usize> {
        let start = self.scroll_line.min(line_count);
        let end = (self.scroll_line + self.text_height()).min(line_count);
        start..end
    }
}

#[derive(Debug)]
pub struct WindowManager {
    root: LayoutNode,
    windows: Vec<Window>,
    active: usize,
    area: Rect,
    next_id: usize,
}

impl WindowManager {
    pub fn new(area: Rect, buffer: BufferId) -> Self {
        let id = WindowId(0);
        debug!(target: "model.window", window = id.0, buffer = %buffer, width = area.width, height = area.height, "window_manager_created");
        Self {
            root: LayoutNode::Leaf(id),
            windows: vec![Window::new(id, buffer, area)],
            active: 0,
            area,
            next_id: 1,
        }
    }

    pub fn area(&self) -> Rect {
        self.area
    }

    pub fn layout_tree(&self) -> &LayoutNode {
        &self.root
    }

    pub fn windows(&self) -> &[Window] {
        &self.windows
    }

    pub fn len(&self) -> usize {
        self.windows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }

    pub fn active_index(&self) -> usize {
        self.active
    }

    pub fn active(&self) -> &Window {
        debug_assert!(self.active < self.windows.len(), "active index in range");
        &self.windows[self.active]
    }

    pub fn active_mut(&mut self) -> &mut Window {
        debug_assert!(self.active < self.windows.len(), "active index in range");
        &mut self.windows[self.active]
    }

    pub fn window(&self, id: WindowId) -> Option<&Window> {
        self.windows.iter().find(|w| w.id == id)
    }

    pub fn window_mut(&mut self, id: WindowId) -> Option<&mut Window> {
        self.windows.iter_mut().find(|w| w.id == id)
    }

    pub fn windows_showing(&self, buffer: BufferId) -> Vec<WindowId> {
        self.windows
            .iter()
            .filter(|w| w.buffer == buffer)
            .map(|w| w.id)
            .collect()
    }

    /// Split the active window. The new window shows the same buffer, copies
    /// scroll offsets and `cursor`, and is placed right after the active one;
    /// focus does not move. `None` when the rectangle is too small.
    pub fn split(&mut self, axis: SplitAxis, cursor: Position) -> Option<WindowId> {
        let current = self.active().clone();
        if current.rect.extent(axis) < 2 {
            debug!(target: "model.window", window = current.id.0, ?axis, "split_refused_too_small");
            return None;
        }
        let id = WindowId(self.next_id);
        if !self.root.split(current.id, axis, id) {
            return None;
        }
        self.next_id += 1;
        let new = Window {
            id,
            buffer: current.buffer,
            rect: current.rect,
            scroll_line: current.scroll_line,
            scroll_col: current.scroll_col,
            saved_cursor: Some(cursor),
        };
        self.windows.insert(self.active + 1, new);
        self.relayout();
        debug!(target: "model.window", from = current.id.0, window = id.0, ?axis, count = self.windows.len(), "window_split");
        Some(id)
    }

    /// Close the active window. Refused (returns `None`) for the last one.
    pub fn close(&mut self) -> Option<Window> {
        if self.windows.len() <= 1 {
            debug!(target: "model.window", "close_refused_last_window");
            return None;
        }
        let id = self.active().id;
        if !self.root.remove(id) {
            return None;
        }
        let closed = self.windows.remove(self.active);
        self.active = self.active.min(self.windows.len() - 1);
        self.relayout();
        debug!(target: "model.window", window = id.0, active = self.active().id.0, count = self.windows.len(), "window_closed");
        Some(closed)
    }

    pub fn next(&mut self) -> WindowId {
        self.active = (self.active + 1) % self.windows.len();
        trace!(target: "model.window", active = self.active().id.0, "focus_next");
        self.active().id
    }

    pub fn previous(&mut self) -> WindowId {
        let n = self.windows.len();
        self.active = (self.active + n - 1) % n;
        trace!(target: "model.window", active = self.active().id.0, "focus_previous");
        self.active().id
    }

    pub fn focus(&mut self, id: WindowId) -> bool {
        match self.windows.iter().position(|w| w.id == id) {
            Some(idx) => {
                self.active = idx;
                trace!(target: "model.window", active = id.0, "focus");
                true
            }
            None => false,
        }
    }

    /// Point `window` at `buffer`, resetting its view state to `anchor`.
    pub fn set_buffer(&mut self, window: WindowId, buffer: BufferId, anchor: Position) -> bool {
        let Some(w) = self.window_mut(window) else {
            return false;
        };
        w.buffer = buffer;
        w.scroll_line = anchor.line;
        w.scroll_col = anchor.col;
        w.saved_cursor = None;
        debug!(target: "model.window", window = window.0, buffer = %buffer, "window_retargeted");
        true
    }

    pub fn resize(&mut self, width: u16, height: u16) {
        self.area = Rect::new(self.area.x, self.area.y, width, height);
        self.relayout();
        debug!(target: "model.layout", width, height, "resized");
    }

    fn relayout(&mut self) {
        let rects = self.root.layout(self.area);
        debug_assert_eq!(rects.len(), self.windows.len(), "tree and window list agree");
        for (id, rect) in rects {
            if let Some(w) = self.windows.iter_mut().find(|w| w.id == id) {
                w.rect = rect;
                trace!(target: "model.layout", window = id.0, x = rect.x, y = rect.y, width = rect.width, height = rect.height, "window_rect");
            }
        }
    }
}
