use std::io::Write;
use std::sync::{Arc, Mutex, MutexGuard};

use core_config::{Config, ConfigContext};
use core_model::{EditorModel, Rect, ScrollSettings, SplitAxis, WindowId};
use core_state::{EditorState, StateOptions};
use core_text::{Buffer, Position};
use pretty_assertions::assert_eq;
use tracing::Level;
use tracing::subscriber::with_default;
use tracing_subscriber::fmt::MakeWriter;

fn numbered(n: usize) -> String {
    (0..n)
        .map(|i| format!("line {i}"))
        .collect::<Vec<_>>()
        .join("\n")
}

fn model_with(text: &str, area: Rect) -> EditorModel {
    let mut state = EditorState::new(StateOptions::default());
    let id = state.insert_buffer(Buffer::from_text("doc", text));
    EditorModel::new(state, id, area, ScrollSettings::default()).unwrap()
}

#[test]
fn horizontal_split_of_24_rows_tiles_exactly() {
    let mut m = model_with(&numbered(100), Rect::new(0, 0, 80, 24));
    let buffer = m.active_buffer_id();
    let second = m.split(SplitAxis::Horizontal).unwrap().unwrap();
    let heights: u16 = m.windows().windows().iter().map(|w| w.rect.height).sum();
    assert_eq!(heights, 24);
    assert_eq!(m.window(second).unwrap().buffer, buffer);
    assert_eq!(m.active_window().buffer, buffer);
}

#[test]
fn windows_on_one_buffer_scroll_independently() {
    let mut m = model_with(&numbered(100), Rect::new(0, 0, 80, 24));
    let top = m.active_window().id;
    let bottom = m.split(SplitAxis::Horizontal).unwrap().unwrap();

    m.active_buffer_mut()
        .unwrap()
        .set_cursor(Position::new(60, 0));
    m.auto_scroll().unwrap();
    let top_scroll = m.window(top).unwrap().scroll_line;
    assert!(top_scroll > 0);
    assert_eq!(m.window(bottom).unwrap().scroll_line, 0);

    m.focus(bottom).unwrap();
    m.auto_scroll().unwrap();
    assert_eq!(m.window(bottom).unwrap().scroll_line, 0);
    assert_eq!(m.window(top).unwrap().scroll_line, top_scroll);
    assert_eq!(m.visible_lines(bottom).unwrap()[0], "line 0");

    // edits through either window land in the shared buffer
    let id = m.active_buffer_id();
    m.state_mut().type_char(id, '#').unwrap();
    m.state_mut().end_insert(id).unwrap();
    assert_eq!(m.visible_lines(bottom).unwrap()[0], "#line 0");
}

#[test]
fn close_promotes_sibling_into_parent_rect() {
    let mut m = model_with("x", Rect::new(0, 0, 80, 24));
    m.split(SplitAxis::Vertical).unwrap().unwrap();
    let right = m.next_window().unwrap();
    m.split(SplitAxis::Horizontal).unwrap().unwrap();
    // [left | right-top / right-bottom]; close the left window
    m.focus(WindowId(0)).unwrap();
    assert!(m.close_window().unwrap());
    let rects: Vec<(WindowId, Rect)> = m
        .windows()
        .windows()
        .iter()
        .map(|w| (w.id, w.rect))
        .collect();
    assert_eq!(
        rects,
        vec![
            (right, Rect::new(0, 0, 80, 12)),
            (WindowId(2), Rect::new(0, 12, 80, 12)),
        ]
    );
    assert_eq!(m.active_window().id, right);
}

#[test]
fn last_window_cannot_close() {
    let mut m = model_with("x", Rect::new(0, 0, 10, 10));
    assert!(!m.close_window().unwrap());
    assert_eq!(m.windows().len(), 1);
}

#[test]
fn open_in_active_reuses_buffer_for_same_path() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("notes.txt");
    std::fs::write(&path, "alpha\nbeta\n").unwrap();
    let mut m = model_with("x", Rect::new(0, 0, 40, 10));
    let first = m.open_in_active(&path).unwrap();
    m.split(SplitAxis::Vertical).unwrap().unwrap();
    let again = m.open_in_active(&path).unwrap();
    assert_eq!(first, again);
    assert_eq!(m.windows().windows_showing(first).len(), 2);
    assert_eq!(m.visible_lines(m.active_window().id).unwrap(), vec!["alpha", "beta"]);
}

#[test]
fn configured_margin_is_clamped_before_use() {
    let mut cfg = Config::default();
    cfg.file.scroll.margin.vertical = 50;
    cfg.apply_context(ConfigContext::new(80, 12, 2));
    let settings = ScrollSettings::from_config(&cfg);
    assert_eq!(settings.vertical_margin, 4);

    let mut state = EditorState::new(cfg.state_options());
    let id = state.insert_buffer(Buffer::from_text("doc", &numbered(50)));
    let mut m = EditorModel::new(state, id, Rect::new(0, 0, 80, 10), settings).unwrap();
    m.active_buffer_mut().unwrap().set_cursor(Position::new(6, 0));
    assert!(m.auto_scroll().unwrap());
    // 6 + 4 + 1 - 10
    assert_eq!(m.active_window().scroll_line, 1);
}

#[test]
fn oversized_margin_in_split_window_does_not_oscillate() {
    let mut m = model_with(&numbered(100), Rect::new(0, 0, 80, 24));
    m.set_scroll_settings(ScrollSettings {
        vertical_margin: 11,
        ..ScrollSettings::default()
    });
    m.split(SplitAxis::Horizontal).unwrap().unwrap();
    assert_eq!(m.active_window().text_height(), 12);

    m.active_buffer_mut()
        .unwrap()
        .set_cursor(Position::new(6, 0));
    for _ in 0..4 {
        assert!(!m.auto_scroll().unwrap());
        assert_eq!(m.active_window().scroll_line, 0);
    }

    // 11 + 5 + 1 - 12
    m.active_buffer_mut()
        .unwrap()
        .set_cursor(Position::new(11, 0));
    assert!(m.auto_scroll().unwrap());
    assert_eq!(m.active_window().scroll_line, 5);
    for _ in 0..3 {
        assert!(!m.auto_scroll().unwrap());
        assert_eq!(m.active_window().scroll_line, 5);
    }
}

#[derive(Clone)]
struct BufferWriter {
    inner: Arc<Mutex<Vec<u8>>>,
}

struct LockedWriter<'a> {
    guard: MutexGuard<'a, Vec<u8>>,
}

impl Write for LockedWriter<'_> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.guard.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for BufferWriter {
    type Writer = LockedWriter<'a>;

    fn make_writer(&'a self) -> Self::Writer {
        LockedWriter {
            guard: self.inner.lock().expect("log buffer poisoned"),
        }
    }
}

#[test]
fn window_lifecycle_logs_model_targets() {
    let buffer = Arc::new(Mutex::new(Vec::new()));
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(Level::TRACE)
        .with_target(true)
        .with_ansi(false)
        .without_time()
        .with_writer(BufferWriter {
            inner: buffer.clone(),
        })
        .finish();

    with_default(subscriber, || {
        let mut m = model_with("x", Rect::new(0, 0, 80, 24));
        m.split(SplitAxis::Horizontal).unwrap().unwrap();
        m.next_window().unwrap();
        m.resize(100, 30);
        m.close_window().unwrap();
    });

    let out = String::from_utf8(buffer.lock().unwrap().clone()).unwrap();
    assert!(out.contains(" model.window:"));
    assert!(out.contains("window_split"));
    assert!(out.contains("focus_changed"));
    assert!(out.contains("window_closed"));
    assert!(out.contains(" model.layout:"));
    assert!(out.contains("resized"));
}
