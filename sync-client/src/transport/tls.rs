//! TCP + mutual TLS connector.

use std::time::Duration;

use async_trait::async_trait;
use sync_core::Settings;
use sync_tls::{handshake_error_kind, server_name, ServerName, TlsConnector, TlsMaterial};
use tokio::net::TcpStream;

use super::{BoxedStream, Connector, TransportError};

/// Connects to one fixed peer address over TLS.
///
/// Both the TCP connect and the handshake are bounded by the I/O timeout.
pub struct TlsTransport {
    address: String,
    server_name: ServerName<'static>,
    connector: TlsConnector,
    timeout: Duration,
}

impl TlsTransport {
    /// Transport to `host:port` presenting and pinning `material`.
    pub fn new(
        host: &str,
        port: u16,
        material: &TlsMaterial,
        timeout: Duration,
    ) -> Result<Self, TransportError> {
        Ok(Self {
            address: format!("{}:{}", host, port),
            server_name: server_name(host)?,
            connector: material.connector()?,
            timeout,
        })
    }

    /// Transport to the configured peer, loading the configured certificates.
    pub fn from_settings(settings: &Settings) -> Result<Self, TransportError> {
        let material = TlsMaterial::load(
            &settings.certs.cert,
            &settings.certs.key,
            &settings.certs.peer_cert,
        )?;
        Self::new(
            &settings.peer.host,
            settings.peer.port,
            &material,
            settings.io_timeout(),
        )
    }

    /// `host:port` this transport dials.
    pub fn address(&self) -> &str {
        &self.address
    }
}

impl std::fmt::Debug for TlsTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TlsTransport")
            .field("address", &self.address)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Connector for TlsTransport {
    async fn connect(&self) -> Result<BoxedStream, TransportError> {
        let tcp = match tokio::time::timeout(self.timeout, TcpStream::connect(&self.address)).await
        {
            Ok(Ok(tcp)) => tcp,
            Ok(Err(e)) => {
                return Err(TransportError::ConnectionFailed(format!(
                    "{}: {}",
                    self.address, e
                )))
            }
            Err(_) => return Err(TransportError::Timeout),
        };
        if let Err(e) = tcp.set_nodelay(true) {
            tracing::trace!("set_nodelay failed: {}", e);
        }

        let handshake = self.connector.connect(self.server_name.clone(), tcp);
        let tls = match tokio::time::timeout(self.timeout, handshake).await {
            Ok(Ok(tls)) => tls,
            Ok(Err(e)) => {
                return Err(TransportError::Handshake {
                    kind: handshake_error_kind(&e),
                    source: e,
                })
            }
            Err(_) => return Err(TransportError::Timeout),
        };

        tracing::debug!("secure channel open to {}", self.address);
        Ok(Box::new(tls))
    }
}
