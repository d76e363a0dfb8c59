//! Flat-file load/save.
//!
//! Loading tries each configured encoding in order, detects the line-ending
//! style and normalises to LF, and strips exactly one trailing terminator
//! (remembered on the buffer and written back on save). Saving re-applies
//! encoding and line ending and, when enabled, first copies the existing file
//! to `<name>~`.

use std::path::{Path, PathBuf};

use core_text::{Buffer, TextEncoding, decode_with_fallback, denormalize, normalize_line_endings};
use tracing::{debug, info, warn};

use crate::{EditorError, Result};

/// File handling settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileOptions {
    /// Decode attempts in priority order.
    pub encodings: Vec<TextEncoding>,
    pub backup: bool,
}

impl Default for FileOptions {
    fn default() -> Self {
        Self {
            encodings: vec![TextEncoding::Utf8, TextEncoding::Latin1],
            backup: true,
        }
    }
}

/// Result of a successful write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveReport {
    pub path: PathBuf,
    pub bytes: usize,
    pub lines: usize,
    pub backup: Option<PathBuf>,
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Read `path` into a new buffer. A path that does not exist yet yields an
/// empty buffer bound to it.
pub fn load_file(path: &Path, options: &FileOptions) -> Result<Buffer> {
    let bytes = match std::fs::read(path) {
        Ok(b) => b,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(target: "io", path = %path.display(), "new_file");
            let mut buf = Buffer::new(display_name(path));
            buf.file_mut().path = Some(path.to_path_buf());
            return Ok(buf);
        }
        Err(e) => {
            warn!(target: "io", path = %path.display(), error = %e, "file_open_error");
            return Err(EditorError::io(path, e));
        }
    };
    let Some((text, encoding)) = decode_with_fallback(&bytes, &options.encodings) else {
        warn!(target: "io", path = %path.display(), "decode_failed");
        return Err(EditorError::Decode {
            path: path.to_path_buf(),
        });
    };
    let norm = normalize_line_endings(&text);
    let mut content = norm.normalized;
    if norm.had_trailing_newline {
        content.pop();
    }
    let mut buf = Buffer::from_text(display_name(path), &content);
    let file = buf.file_mut();
    file.path = Some(path.to_path_buf());
    file.encoding = encoding;
    file.line_ending = norm.original;
    file.trailing_newline = norm.had_trailing_newline;
    file.mixed_line_endings = norm.mixed;
    info!(
        target: "io",
        path = %path.display(),
        bytes = bytes.len(),
        lines = buf.line_count(),
        encoding = %encoding,
        line_ending = norm.original.label(),
        mixed = norm.mixed,
        "file_loaded"
    );
    Ok(buf)
}

/// Serialise `buf` to `target` (or its own path) using its file identity.
/// A successful save binds the buffer to the path and clears `modified`.
pub fn save_buffer(buf: &mut Buffer, target: Option<&Path>, backup: bool) -> Result<SaveReport> {
    let path = match target.or(buf.path()) {
        Some(p) => p.to_path_buf(),
        None => return Err(EditorError::NoFileName),
    };
    let file = buf.file().clone();
    let mut text = buf.text();
    if file.trailing_newline {
        text.push('\n');
    }
    let text = denormalize(&text, file.line_ending);
    let bytes = file
        .encoding
        .encode(&text)
        .map_err(|source| EditorError::Encode {
            path: path.clone(),
            source,
        })?;

    let backup_path = if backup && path.exists() {
        let mut name = path.as_os_str().to_os_string();
        name.push("~");
        let candidate = PathBuf::from(name);
        match std::fs::copy(&path, &candidate) {
            Ok(_) => Some(candidate),
            Err(e) => {
                warn!(target: "io", path = %candidate.display(), error = %e, "backup_failed");
                None
            }
        }
    } else {
        None
    };

    std::fs::write(&path, &bytes).map_err(|e| {
        warn!(target: "io", path = %path.display(), error = %e, "file_write_error");
        EditorError::io(&path, e)
    })?;
    if target.is_some() {
        buf.file_mut().path = Some(path.clone());
        buf.name = display_name(&path);
    }
    buf.set_modified(false);
    info!(target: "io", path = %path.display(), bytes = bytes.len(), lines = buf.line_count(), "file_written");
    Ok(SaveReport {
        path,
        bytes: bytes.len(),
        lines: buf.line_count(),
        backup: backup_path,
    })
}
