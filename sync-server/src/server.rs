//! Accept loop.
//!
//! One task per accepted connection; the TLS handshake runs inside that
//! task so a slow client never stalls the loop. A semaphore caps the number
//! of connections being handled at once.

use std::future::Future;
use std::sync::Arc;

use sync_core::Settings;
use sync_tls::{handshake_error_kind, TlsAcceptor, TlsMaterial};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Semaphore;

use crate::error::{Result, ServerError};
use crate::handler::{handle_connection, ServerContext};
use crate::metrics::ServerMetrics;

/// Main sync server.
pub struct SyncServer {
    ctx: Arc<ServerContext>,
    acceptor: TlsAcceptor,
    max_concurrency: usize,
}

impl std::fmt::Debug for SyncServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncServer")
            .field("ctx", &self.ctx)
            .field("max_concurrency", &self.max_concurrency)
            .finish_non_exhaustive()
    }
}

impl SyncServer {
    /// Create a server over `ctx`, terminating TLS with `acceptor`.
    pub fn new(ctx: ServerContext, acceptor: TlsAcceptor, max_concurrency: usize) -> Self {
        Self {
            ctx: Arc::new(ctx),
            acceptor,
            max_concurrency: max_concurrency.max(1),
        }
    }

    /// Server for `settings`, loading the configured certificates.
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let material = TlsMaterial::load(
            &settings.certs.cert,
            &settings.certs.key,
            &settings.certs.peer_cert,
        )?;
        Ok(Self::new(
            ServerContext::from_settings(settings),
            material.acceptor()?,
            settings.max_concurrency,
        ))
    }

    /// Shared context (root, limits, metrics).
    pub fn context(&self) -> &Arc<ServerContext> {
        &self.ctx
    }

    /// Bind `settings.server_address()`.
    pub async fn bind(settings: &Settings) -> Result<TcpListener> {
        Ok(TcpListener::bind(settings.server_address()).await?)
    }

    /// Accept connections until `shutdown` resolves.
    ///
    /// Connections already being handled finish on their own.
    pub async fn serve<F>(&self, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let semaphore = Arc::new(Semaphore::new(self.max_concurrency));
        tokio::pin!(shutdown);

        tracing::info!(
            "serving {} on {}",
            self.ctx.root().display(),
            listener.local_addr()?
        );

        loop {
            let permit = tokio::select! {
                _ = &mut shutdown => break,
                permit = Arc::clone(&semaphore).acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
            };

            let (tcp, peer) = tokio::select! {
                _ = &mut shutdown => break,
                accepted = listener.accept() => match accepted {
                    Ok(accepted) => accepted,
                    Err(e) => {
                        tracing::warn!("accept failed: {}", e);
                        continue;
                    }
                },
            };
            ServerMetrics::incr(&self.ctx.metrics().connections_total);
            tracing::debug!("connection from {}", peer);

            let ctx = Arc::clone(&self.ctx);
            let acceptor = self.acceptor.clone();
            tokio::spawn(async move {
                let _permit = permit;
                if let Err(e) = serve_connection(&ctx, &acceptor, tcp).await {
                    tracing::warn!("connection from {} failed ({}): {}", peer, e.kind(), e);
                }
            });
        }

        let stats = self.ctx.metrics().snapshot();
        tracing::info!(
            "stopped accepting: {} connections, {} pushes, {} pulls, {} errors",
            stats.connections_total,
            stats.pushes_total,
            stats.pulls_total,
            stats.errors_total
        );
        Ok(())
    }
}

async fn serve_connection(
    ctx: &ServerContext,
    acceptor: &TlsAcceptor,
    tcp: TcpStream,
) -> Result<()> {
    let limit = ctx.frame_config().io_timeout;
    let tls = match tokio::time::timeout(limit, acceptor.accept(tcp)).await {
        Ok(Ok(tls)) => tls,
        Ok(Err(e)) => {
            ServerMetrics::incr(&ctx.metrics().errors_total);
            return Err(ServerError::Handshake {
                kind: handshake_error_kind(&e),
                source: e,
            });
        }
        Err(_) => {
            ServerMetrics::incr(&ctx.metrics().errors_total);
            return Err(ServerError::HandshakeTimeout);
        }
    };
    handle_connection(ctx, tls).await
}
