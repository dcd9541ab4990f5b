//! Transport abstraction for peersync.
//!
//! Every protocol exchange runs over its own freshly opened channel, so the
//! transport is a factory of byte streams rather than a long-lived
//! connection:
//!
//! ```text
//! SyncClient ──connect()──► Connector ──► BoxedStream (one exchange, then dropped)
//! ```
//!
//! [`TlsTransport`] is the real connector (TCP + mutual TLS).
//! [`MockConnector`] hands out in-memory pipes whose far end runs a
//! scripted peer, for tests.

mod mock;
mod tls;

pub use mock::MockConnector;
pub use tls::TlsTransport;

use std::sync::Arc;

use async_trait::async_trait;
use sync_types::ErrorKind;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite};

/// A bidirectional byte stream carrying one exchange.
pub trait SecureStream: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T: AsyncRead + AsyncWrite + Unpin + Send> SecureStream for T {}

/// Type-erased stream handed out by a [`Connector`].
pub type BoxedStream = Box<dyn SecureStream>;

/// Transport errors.
#[derive(Debug, Error)]
pub enum TransportError {
    /// TCP connection could not be established.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// TLS handshake failed.
    #[error("tls handshake failed: {source}")]
    Handshake {
        /// `Handshake` or `Certificate`.
        kind: ErrorKind,
        /// Error reported by the TLS layer.
        #[source]
        source: std::io::Error,
    },

    /// Connect or handshake exceeded the I/O deadline.
    #[error("connection timeout")]
    Timeout,

    /// TLS material could not be prepared.
    #[error(transparent)]
    Tls(#[from] sync_tls::TlsError),
}

impl TransportError {
    /// Failure class for reports.
    pub fn kind(&self) -> ErrorKind {
        match self {
            TransportError::ConnectionFailed(_) => ErrorKind::Io,
            TransportError::Handshake { kind, .. } => *kind,
            TransportError::Timeout => ErrorKind::Timeout,
            TransportError::Tls(e) => e.kind(),
        }
    }
}

/// Opens a new secure channel to the peer.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Establish one channel. Each call yields an independent stream.
    async fn connect(&self) -> Result<BoxedStream, TransportError>;
}

#[async_trait]
impl<C: Connector + ?Sized> Connector for Arc<C> {
    async fn connect(&self) -> Result<BoxedStream, TransportError> {
        (**self).connect().await
    }
}
