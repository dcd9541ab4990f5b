//! SyncClient - the transfer executor.
//!
//! Each operation opens a fresh channel through the [`Connector`], performs
//! exactly one exchange and closes it:
//!
//! ```text
//! list_remote:  list ─────────────────────────►  ◄── list_response
//! push_file:    push{size} + size raw bytes ──►  ◄── ack | error
//! pull_file:    pull ─────────────────────────►  ◄── pull_response{size} + size raw bytes
//! ```
//!
//! No retries happen here; the session decides what a failure means.
//!
//! # Example
//!
//! ```ignore
//! use peersync_client::{SyncClient, TlsTransport};
//!
//! let transport = TlsTransport::from_settings(&settings)?;
//! let client = SyncClient::new(transport, settings.frame_config());
//!
//! let remote = client.list_remote().await?;
//! client.push_file(Path::new("/data/a.txt"), "a.txt").await?;
//! client.pull_file("b.txt", Path::new("/data/b.txt")).await?;
//! ```

use std::path::{Path, PathBuf};

use sync_content::{ContentError, PartialFile, SourceFile};
use sync_types::{
    reasons, ErrorKind, ErrorMessage, FileEntry, FrameConfig, FramedStream, Message, PullRequest,
    PushRequest, SyncError,
};
use thiserror::Error;

use crate::transport::{BoxedStream, Connector, TransportError};

/// Client errors.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Channel could not be opened.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Framing, timeout or stream failure during an exchange.
    #[error("wire error: {0}")]
    Wire(#[from] SyncError),

    /// The local source vanished before the push or shrank during it.
    #[error("local file unavailable: {}: {reason}", path.display())]
    LocalFileUnavailable {
        /// Local file being pushed.
        path: PathBuf,
        /// What went wrong.
        reason: String,
    },

    /// Fewer payload bytes arrived than the header declared.
    #[error("transfer incomplete for {path}: {detail}")]
    TransferIncomplete {
        /// Wire path of the file.
        path: String,
        /// What went wrong.
        detail: String,
    },

    /// The peer has no such file.
    #[error("remote file not found: {0}")]
    FileNotFound(String),

    /// The peer answered with an `error` message.
    #[error("peer reported error: {0}")]
    Remote(String),

    /// The peer answered with the wrong message type.
    #[error("protocol violation: expected {expected}, got {got}")]
    ProtocolViolation {
        /// Message type the exchange called for.
        expected: &'static str,
        /// Message type that arrived.
        got: &'static str,
    },

    /// Local filesystem failure while receiving or resolving paths.
    #[error(transparent)]
    Content(#[from] ContentError),

    /// A blocking task panicked or was cancelled.
    #[error("background task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl ClientError {
    /// Failure class for reports.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ClientError::Transport(e) => e.kind(),
            ClientError::Wire(SyncError::Io(e)) => {
                // A TLS 1.3 certificate rejection arrives on the first read.
                sync_tls::rustls_error_kind(e).unwrap_or(ErrorKind::Io)
            }
            ClientError::Wire(e) => e.kind(),
            ClientError::LocalFileUnavailable { .. } => ErrorKind::LocalFileUnavailable,
            ClientError::TransferIncomplete { .. } => ErrorKind::TransferIncomplete,
            ClientError::FileNotFound(_) => ErrorKind::FileNotFound,
            ClientError::Remote(_) => ErrorKind::Remote,
            ClientError::ProtocolViolation { .. } => ErrorKind::ProtocolViolation,
            ClientError::Content(e) => e.kind(),
            ClientError::Join(_) => ErrorKind::Io,
        }
    }
}

/// Transfer executor: list, push and pull against one peer.
pub struct SyncClient<C> {
    connector: C,
    frame: FrameConfig,
}

impl<C: Connector> SyncClient<C> {
    /// Create a client that opens channels with `connector`.
    pub fn new(connector: C, frame: FrameConfig) -> Self {
        Self { connector, frame }
    }

    /// Get the connector (for testing).
    pub fn connector(&self) -> &C {
        &self.connector
    }

    /// Limits applied to every exchange.
    pub fn frame_config(&self) -> FrameConfig {
        self.frame
    }

    async fn open(&self) -> Result<FramedStream<BoxedStream>, ClientError> {
        let stream = self.connector.connect().await?;
        Ok(FramedStream::new(stream, self.frame))
    }

    /// Fetch the peer's inventory.
    pub async fn list_remote(&self) -> Result<Vec<FileEntry>, ClientError> {
        let mut stream = self.open().await?;
        stream.send(&Message::ListRequest).await?;
        let reply = stream.recv().await?;
        stream.shutdown().await;

        match reply {
            Message::ListResponse(list) => {
                tracing::debug!("peer lists {} files", list.files.len());
                Ok(list.files)
            }
            Message::Error(ErrorMessage { message }) => Err(ClientError::Remote(message)),
            other => Err(ClientError::ProtocolViolation {
                expected: "list_response",
                got: other.type_name(),
            }),
        }
    }

    /// Upload `local_path` to the peer as `remote_path`.
    ///
    /// Size and mtime come from the open handle, so the header always
    /// describes the bytes that follow. Returns the number of bytes sent.
    pub async fn push_file(
        &self,
        local_path: &Path,
        remote_path: &str,
    ) -> Result<u64, ClientError> {
        let mut source = match SourceFile::open(local_path).await {
            Ok(source) => source,
            Err(e @ ContentError::NotFound(_)) => {
                return Err(ClientError::LocalFileUnavailable {
                    path: local_path.to_path_buf(),
                    reason: e.to_string(),
                })
            }
            // Present but unreadable is a real failure, not a vanished file.
            Err(e) => return Err(e.into()),
        };

        let mut stream = self.open().await?;
        stream
            .send(&Message::PushRequest(PushRequest {
                path: remote_path.to_string(),
                size: source.size,
                mtime: source.mtime,
            }))
            .await?;

        let sent = match stream.write_payload(&mut source.file, source.size).await {
            Ok(sent) => sent,
            Err(e) => {
                // The peer may have refused the push and closed; its reason
                // beats a broken pipe.
                return Err(match stream.recv().await {
                    Ok(Message::Error(err)) => push_rejected(remote_path, err),
                    _ => e.into(),
                });
            }
        };

        if sent < source.size {
            stream.shutdown().await;
            return Err(ClientError::LocalFileUnavailable {
                path: local_path.to_path_buf(),
                reason: format!(
                    "file shrank to {} of {} bytes during push",
                    sent, source.size
                ),
            });
        }

        let reply = stream.recv().await?;
        stream.shutdown().await;

        match reply {
            Message::Ack(ack) if ack.is_ok() => Ok(sent),
            Message::Ack(ack) => Err(ClientError::Remote(
                ack.message.unwrap_or_else(|| format!("ack status {}", ack.status)),
            )),
            Message::Error(err) => Err(push_rejected(remote_path, err)),
            other => Err(ClientError::ProtocolViolation {
                expected: "ack",
                got: other.type_name(),
            }),
        }
    }

    /// Download `remote_path` from the peer into `local_path`.
    ///
    /// The destination is replaced atomically; on any failure it is left
    /// untouched and no temp file remains. Returns the number of bytes
    /// received.
    pub async fn pull_file(
        &self,
        remote_path: &str,
        local_path: &Path,
    ) -> Result<u64, ClientError> {
        let mut stream = self.open().await?;
        stream
            .send(&Message::PullRequest(PullRequest {
                path: remote_path.to_string(),
            }))
            .await?;

        let header = match stream.recv().await? {
            Message::PullResponse(header) => header,
            Message::Error(ErrorMessage { message }) if message == reasons::FILE_NOT_FOUND => {
                return Err(ClientError::FileNotFound(remote_path.to_string()))
            }
            Message::Error(ErrorMessage { message }) => return Err(ClientError::Remote(message)),
            other => {
                return Err(ClientError::ProtocolViolation {
                    expected: "pull_response",
                    got: other.type_name(),
                })
            }
        };

        let mut partial = PartialFile::create(local_path).await?;
        let received = match stream.read_payload(&mut partial, header.size).await {
            Ok(received) => received,
            Err(e) => {
                partial.discard().await;
                return Err(e.into());
            }
        };
        stream.shutdown().await;

        if received < header.size {
            partial.discard().await;
            return Err(ClientError::TransferIncomplete {
                path: remote_path.to_string(),
                detail: format!("received {} of {} bytes", received, header.size),
            });
        }

        partial.commit(header.mtime).await?;
        Ok(received)
    }
}

fn push_rejected(remote_path: &str, err: ErrorMessage) -> ClientError {
    if err.message == reasons::SIZE_MISMATCH {
        ClientError::TransferIncomplete {
            path: remote_path.to_string(),
            detail: "peer received fewer bytes than declared".to_string(),
        }
    } else {
        ClientError::Remote(err.message)
    }
}
