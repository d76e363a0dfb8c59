//! Optional on-disk undo history, one JSON file per edited file.
//!
//! Files live at `<dir>/<sanitised absolute path>.undo.json`, where path
//! separators and drive colons become `%`. A stored history is only used when
//! its recorded SHA-256 content digest matches the file as loaded now; anything
//! else is ignored so stale history can never be replayed onto different text.

use std::path::{Path, PathBuf};
use std::time::{Duration, UNIX_EPOCH};

use core_text::{Position, TextSnapshot};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::undo::{UndoManager, UndoState};
use crate::{EditorError, Result};

/// Default number of entries written to the side-store.
pub const PERSIST_LEVELS_DEFAULT: usize = 100;

const FORMAT_VERSION: u32 = 2;

#[derive(Debug, Serialize, Deserialize)]
struct StoredHistory {
    version: u32,
    content_digest: String,
    live_id: u64,
    entries: Vec<StoredState>,
}

/// Just the version, read before committing to a layout.
#[derive(Debug, Deserialize)]
struct StoredHeader {
    version: u32,
}

#[derive(Debug, Serialize, Deserialize)]
struct StoredState {
    id: u64,
    lines: Vec<String>,
    cursor: (usize, usize),
    timestamp_secs: u64,
    description: String,
}

/// Lowercase hex SHA-256 of `text`; identical across builds and platforms.
pub fn content_digest(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    hasher
        .finalize()
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}

/// Side-store location for `file`.
pub fn store_path(dir: &Path, file: &Path) -> PathBuf {
    let absolute = std::path::absolute(file).unwrap_or_else(|_| file.to_path_buf());
    let sanitised: String = absolute
        .to_string_lossy()
        .chars()
        .map(|c| if matches!(c, '/' | '\\' | ':') { '%' } else { c })
        .collect();
    dir.join(format!("{sanitised}.undo.json"))
}

/// Write the most recent `levels` undo entries for `file`. `text` is the
/// content just written to disk.
pub fn save(
    dir: &Path,
    file: &Path,
    manager: &UndoManager,
    text: &str,
    levels: usize,
) -> Result<PathBuf> {
    let history = manager.history();
    let skip = history.len().saturating_sub(levels);
    let stored = StoredHistory {
        version: FORMAT_VERSION,
        content_digest: content_digest(text),
        live_id: manager.live_id(),
        entries: history[skip..]
            .iter()
            .map(|s| StoredState {
                id: s.id,
                lines: s.snapshot.lines(),
                cursor: (s.snapshot.cursor().line, s.snapshot.cursor().col),
                timestamp_secs: s
                    .timestamp
                    .duration_since(UNIX_EPOCH)
                    .map(|d| d.as_secs())
                    .unwrap_or(0),
                description: s.description.clone(),
            })
            .collect(),
    };
    std::fs::create_dir_all(dir).map_err(|e| EditorError::io(dir, e))?;
    let path = store_path(dir, file);
    let json = serde_json::to_vec(&stored)?;
    std::fs::write(&path, json).map_err(|e| EditorError::io(&path, e))?;
    debug!(target: "state.undo.store", entries = stored.entries.len(), path = %path.display(), "undo_history_saved");
    Ok(path)
}

/// Seed `manager` from the side-store when a matching history exists.
/// Returns the number of entries restored (0 when absent or stale).
pub fn load(dir: &Path, file: &Path, manager: &mut UndoManager, text: &str) -> Result<usize> {
    let path = store_path(dir, file);
    let bytes = match std::fs::read(&path) {
        Ok(b) => b,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(EditorError::io(&path, e)),
    };
    let header: StoredHeader = serde_json::from_slice(&bytes)?;
    if header.version != FORMAT_VERSION {
        warn!(target: "state.undo.store", version = header.version, "undo_history_version_mismatch");
        return Ok(0);
    }
    let stored: StoredHistory = serde_json::from_slice(&bytes)?;
    if stored.content_digest != content_digest(text) {
        debug!(target: "state.undo.store", path = %path.display(), "undo_history_stale");
        return Ok(0);
    }
    let entries: Vec<UndoState> = stored
        .entries
        .into_iter()
        .map(|s| {
            UndoState::restored(
                TextSnapshot::from_lines(&s.lines, Position::new(s.cursor.0, s.cursor.1)),
                UNIX_EPOCH + Duration::from_secs(s.timestamp_secs),
                s.description,
                s.id,
            )
        })
        .collect();
    let count = entries.len();
    manager.seed(entries, stored.live_id);
    debug!(target: "state.undo.store", entries = count, "undo_history_loaded");
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_text::Buffer;

    #[test]
    fn store_path_sanitises_separators() {
        let p = store_path(Path::new("/tmp/undo"), Path::new("/home/u/notes.txt"));
        assert_eq!(
            p,
            PathBuf::from("/tmp/undo/%home%u%notes.txt.undo.json")
        );
    }

    #[test]
    fn history_round_trips_through_side_store() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("doc.txt");
        let mut buf = Buffer::from_text("doc", "one");
        let mut undo = UndoManager::default();
        undo.save_state(&buf, "insert");
        buf.insert_str("two ");
        undo.mark_save_point();
        save(dir.path(), &file, &undo, &buf.text(), PERSIST_LEVELS_DEFAULT).unwrap();

        let mut fresh = UndoManager::default();
        let mut reopened = Buffer::from_text("doc", &buf.text());
        let n = load(dir.path(), &file, &mut fresh, &reopened.text()).unwrap();
        assert_eq!(n, 1);
        assert!(!fresh.is_modified());
        assert!(fresh.undo(&mut reopened));
        assert_eq!(reopened.lines(), vec!["one"]);
        assert!(reopened.is_modified());
    }

    #[test]
    fn stale_history_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("doc.txt");
        let mut buf = Buffer::from_text("doc", "a");
        let mut undo = UndoManager::default();
        undo.save_state(&buf, "insert");
        buf.insert_str("b");
        save(dir.path(), &file, &undo, &buf.text(), 10).unwrap();
        let mut fresh = UndoManager::default();
        assert_eq!(load(dir.path(), &file, &mut fresh, "edited elsewhere").unwrap(), 0);
        assert_eq!(fresh.undo_depth(), 0);
    }

    #[test]
    fn content_digest_is_fixed_sha256() {
        assert_eq!(
            content_digest(""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
        assert_eq!(
            content_digest("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn stored_file_records_digest_of_written_text() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("doc.txt");
        let mut buf = Buffer::from_text("doc", "");
        let mut undo = UndoManager::default();
        undo.save_state(&buf, "insert");
        buf.insert_str("abc");
        let path = save(dir.path(), &file, &undo, &buf.text(), 10).unwrap();
        let json: serde_json::Value =
            serde_json::from_slice(&std::fs::read(path).unwrap()).unwrap();
        assert_eq!(json["version"], 2);
        assert_eq!(
            json["content_digest"],
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn older_format_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("doc.txt");
        std::fs::write(
            store_path(dir.path(), &file),
            r#"{"version":1,"content_hash":1234,"live_id":0,"entries":[]}"#,
        )
        .unwrap();
        let mut undo = UndoManager::default();
        assert_eq!(load(dir.path(), &file, &mut undo, "").unwrap(), 0);
    }

    #[test]
    fn missing_store_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut undo = UndoManager::default();
        assert_eq!(load(dir.path(), Path::new("/nope.txt"), &mut undo, "").unwrap(), 0);
    }

    #[test]
    fn only_recent_levels_are_written() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("doc.txt");
        let mut buf = Buffer::new("doc");
        let mut undo = UndoManager::default();
        for ch in ["a", "b", "c", "d"] {
            undo.save_state(&buf, "insert");
            buf.insert_str(ch);
        }
        save(dir.path(), &file, &undo, &buf.text(), 2).unwrap();
        let mut fresh = UndoManager::default();
        assert_eq!(load(dir.path(), &file, &mut fresh, &buf.text()).unwrap(), 2);
    }
}
