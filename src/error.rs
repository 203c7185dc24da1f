use std::io;
use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ComixError>;

/// Everything that can stop a document from being opened.
///
/// Per-page problems (a member that failed to extract, an image that does not
/// decode) never surface here; they are recovered where they happen.
#[derive(Error, Debug)]
pub enum ComixError {
    #[error("Could not open {}: Unsupported archive format ({reason}).", .path.display())]
    UnsupportedFormat { path: PathBuf, reason: String },

    #[error("Could not open {}: Corrupt archive ({reason}).", .path.display())]
    CorruptArchive { path: PathBuf, reason: String },

    #[error("Could not open {}: Permission denied.", .0.display())]
    PermissionDenied(PathBuf),

    #[error("Could not open {}: No such file.", .0.display())]
    NotFound(PathBuf),

    #[error("Could not open {}: Unknown file type.", .0.display())]
    UnknownFileType(PathBuf),

    #[error("No images or subarchives in '{0}'")]
    EmptyArchive(String),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl ComixError {
    pub(crate) fn corrupt(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        ComixError::CorruptArchive {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn unsupported(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        ComixError::UnsupportedFormat {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}
