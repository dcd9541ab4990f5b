//! Error types for sync-server.

use sync_content::ContentError;
use sync_tls::TlsError;
use sync_types::{ErrorKind, SyncError};

/// Main error type for sync-server operations.
///
/// Errors inside a connection are logged by the accept loop and never
/// stop it.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Framing, timeout or stream failure during an exchange.
    #[error("wire error: {0}")]
    Wire(#[from] SyncError),

    /// Local filesystem failure, including rejected paths.
    #[error(transparent)]
    Content(#[from] ContentError),

    /// A pushed payload ended early.
    #[error("push of {path} incomplete: received {received} of {expected} bytes")]
    TransferIncomplete {
        /// Wire path of the file.
        path: String,
        /// Bytes that arrived.
        received: u64,
        /// Bytes the header declared.
        expected: u64,
    },

    /// The TLS handshake with a connecting client failed.
    #[error("tls handshake failed: {source}")]
    Handshake {
        /// `Handshake` or `Certificate`.
        kind: ErrorKind,
        /// Error reported by the TLS layer.
        #[source]
        source: std::io::Error,
    },

    /// The TLS handshake did not finish within the I/O deadline.
    #[error("tls handshake timed out")]
    HandshakeTimeout,

    /// TLS material could not be prepared.
    #[error(transparent)]
    Tls(#[from] TlsError),

    /// Listener failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A blocking task panicked or was cancelled.
    #[error("background task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl ServerError {
    /// Failure class for logs.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ServerError::Wire(e) => e.kind(),
            ServerError::Content(e) => e.kind(),
            ServerError::TransferIncomplete { .. } => ErrorKind::TransferIncomplete,
            ServerError::Handshake { kind, .. } => *kind,
            ServerError::HandshakeTimeout => ErrorKind::Timeout,
            ServerError::Tls(e) => e.kind(),
            ServerError::Io(_) | ServerError::Join(_) => ErrorKind::Io,
        }
    }
}

/// Result type alias for server operations.
pub type Result<T> = std::result::Result<T, ServerError>;
