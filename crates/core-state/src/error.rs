//! Error type shared by the state layer and its consumers.

use std::path::PathBuf;

use crate::BufferId;

#[derive(Debug, thiserror::Error)]
pub enum EditorError {
    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{}: no configured encoding could decode the file", path.display())]
    Decode { path: PathBuf },
    #[error("{}: {source}", path.display())]
    Encode {
        path: PathBuf,
        #[source]
        source: core_text::UnencodableChar,
    },
    #[error("no file name")]
    NoFileName,
    #[error("invalid pattern: {0}")]
    InvalidPattern(#[from] regex::Error),
    #[error("invalid substitute flag '{0}'")]
    InvalidFlag(char),
    #[error("undo history: {0}")]
    UndoHistory(#[from] serde_json::Error),
    #[error("unknown buffer {0}")]
    UnknownBuffer(BufferId),
    #[error("unknown window {0}")]
    UnknownWindow(usize),
    #[error("buffer {0} is still displayed")]
    BufferInUse(BufferId),
}

impl EditorError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, EditorError>;
