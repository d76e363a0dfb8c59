//! Structured log events are emitted on the documented targets.

use std::io::Write;
use std::sync::{Arc, Mutex, MutexGuard};

use core_state::{EditorState, SearchDirection};
use core_text::Buffer;
use tracing::Level;
use tracing::subscriber::with_default;
use tracing_subscriber::fmt::MakeWriter;

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

fn capture(f: impl FnOnce()) -> String {
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
    with_default(subscriber, f);
    let bytes = buffer.lock().expect("log buffer poisoned").clone();
    String::from_utf8(bytes).expect("utf8 log output")
}

#[test]
fn edit_undo_and_search_log_on_their_targets() {
    let output = capture(|| {
        let mut st = EditorState::default();
        let id = st.insert_buffer(Buffer::from_text("log", "secret text"));
        st.apply_edit(id, "insert", |b| b.insert_str("x")).unwrap();
        st.undo(id).unwrap();
        st.search(id, "text", SearchDirection::Forward).unwrap();
    });
    assert!(output.contains("state.registry"), "{output}");
    assert!(output.contains("text.buffer"), "{output}");
    assert!(output.contains("state.undo"), "{output}");
    assert!(output.contains("push_snapshot"), "{output}");
    assert!(output.contains("state.search"), "{output}");
    // Buffer content never reaches the log.
    assert!(!output.contains("secret"), "{output}");
}

#[test]
fn file_io_logs_on_io_target() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("f.txt");
    std::fs::write(&path, "a\n").unwrap();
    let output = capture(|| {
        let mut st = EditorState::default();
        let id = st.open(&path).unwrap();
        st.save(id, None).unwrap();
    });
    assert!(output.contains("file_loaded"), "{output}");
    assert!(output.contains("file_written"), "{output}");
    assert!(output.contains(" io:"), "{output}");
}
