//! Error types for sync-content.

use std::path::PathBuf;

use sync_types::ErrorKind;
use thiserror::Error;

/// Errors that can occur while touching the local synchronization root.
#[derive(Error, Debug)]
pub enum ContentError {
    /// A wire path would resolve outside the root, or is not a usable
    /// relative path at all.
    #[error("path {path:?} rejected: {reason}")]
    PathEscape {
        /// The offending wire path.
        path: String,
        /// Which rule it broke.
        reason: &'static str,
    },

    /// The file does not exist or is not a regular file.
    #[error("not a regular file: {}", .0.display())]
    NotFound(PathBuf),

    /// Any other filesystem failure.
    #[error("{}: {source}", path.display())]
    Io {
        /// Path being accessed.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
}

impl ContentError {
    /// Failure class for reports.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ContentError::PathEscape { .. } => ErrorKind::PathEscape,
            ContentError::NotFound(_) => ErrorKind::FileNotFound,
            ContentError::Io { .. } => ErrorKind::Io,
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        if source.kind() == std::io::ErrorKind::NotFound {
            ContentError::NotFound(path)
        } else {
            ContentError::Io { path, source }
        }
    }
}
