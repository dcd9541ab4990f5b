//! Error types for peersync.

use thiserror::Error;

/// Machine-distinguishable classification of every failure in peersync.
///
/// Each crate has its own error enum; all of them map onto one of these
/// kinds via a `kind()` method so callers (and reports) can branch on the
/// failure class without matching on crate-specific variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Malformed, oversized or truncated message.
    Framing,
    /// Transport authentication failed during the TLS handshake.
    Handshake,
    /// Certificate material missing, unreadable, or rejected by the peer.
    Certificate,
    /// An I/O deadline was exceeded.
    Timeout,
    /// The source file vanished or shrank during a push.
    LocalFileUnavailable,
    /// Fewer payload bytes arrived than were declared.
    TransferIncomplete,
    /// Pull of a path that does not exist on the remote side.
    FileNotFound,
    /// A path resolved outside the synchronization root.
    PathEscape,
    /// Unexpected message type for the current exchange.
    ProtocolViolation,
    /// The peer answered with an `error` message.
    Remote,
    /// Any other I/O failure.
    Io,
    /// Invalid or unreadable settings.
    Config,
}

impl ErrorKind {
    /// Stable snake_case name, used in logs and reports.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Framing => "framing_error",
            ErrorKind::Handshake => "handshake_error",
            ErrorKind::Certificate => "certificate_error",
            ErrorKind::Timeout => "timeout",
            ErrorKind::LocalFileUnavailable => "local_file_unavailable",
            ErrorKind::TransferIncomplete => "transfer_incomplete",
            ErrorKind::FileNotFound => "file_not_found",
            ErrorKind::PathEscape => "path_escape",
            ErrorKind::ProtocolViolation => "protocol_violation",
            ErrorKind::Remote => "remote_error",
            ErrorKind::Io => "io_error",
            ErrorKind::Config => "config_error",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors raised by the wire codec.
#[derive(Debug, Error)]
pub enum SyncError {
    /// MessagePack serialization failed
    #[error("serialization failed: {0}")]
    Serialization(#[source] rmp_serde::encode::Error),

    /// MessagePack deserialization failed
    #[error("deserialization failed: {0}")]
    Deserialization(#[source] rmp_serde::decode::Error),

    /// Stream closed mid-frame or frame is structurally invalid
    #[error("framing error: {0}")]
    Framing(String),

    /// Declared frame length exceeds the configured maximum
    #[error("message too large: {size} bytes (max {max})")]
    MessageTooLarge {
        /// Declared or encoded size.
        size: usize,
        /// Configured maximum.
        max: usize,
    },

    /// I/O deadline exceeded
    #[error("operation timed out")]
    Timeout,

    /// Underlying stream failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl SyncError {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            SyncError::Serialization(_)
            | SyncError::Deserialization(_)
            | SyncError::Framing(_)
            | SyncError::MessageTooLarge { .. } => ErrorKind::Framing,
            SyncError::Timeout => ErrorKind::Timeout,
            SyncError::Io(_) => ErrorKind::Io,
        }
    }
}
