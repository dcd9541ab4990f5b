//! Mock connector for testing.
//!
//! Each `connect()` creates an in-memory pipe, hands one end to the caller
//! and spawns the scripted peer on the other end.

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use tokio::io::DuplexStream;

use super::{BoxedStream, Connector, TransportError};

/// Buffer size of each in-memory pipe.
const PIPE_CAPACITY: usize = 64 * 1024;

type PeerFuture = Pin<Box<dyn Future<Output = ()> + Send>>;
type PeerScript = dyn Fn(DuplexStream) -> PeerFuture + Send + Sync;

/// Mock connector for testing.
///
/// Clones share the connection counter and failure injection.
#[derive(Clone)]
pub struct MockConnector {
    inner: Arc<Mutex<MockConnectorInner>>,
    peer: Arc<PeerScript>,
}

#[derive(Debug, Default)]
struct MockConnectorInner {
    connections: usize,
    fail_next_connect: Option<String>,
}

impl MockConnector {
    /// Create a connector whose far end runs `peer` for every connection.
    pub fn new<F, Fut>(peer: F) -> Self
    where
        F: Fn(DuplexStream) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        Self {
            inner: Arc::default(),
            peer: Arc::new(move |stream: DuplexStream| Box::pin(peer(stream)) as PeerFuture),
        }
    }

    /// Number of successful `connect()` calls so far.
    pub fn connections(&self) -> usize {
        self.lock().connections
    }

    /// Cause the next `connect()` to fail with the given error.
    pub fn fail_next_connect(&self, error: &str) {
        self.lock().fail_next_connect = Some(error.to_string());
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MockConnectorInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for MockConnector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockConnector")
            .field("inner", &*self.lock())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn connect(&self) -> Result<BoxedStream, TransportError> {
        {
            let mut inner = self.lock();
            if let Some(error) = inner.fail_next_connect.take() {
                return Err(TransportError::ConnectionFailed(error));
            }
            inner.connections += 1;
        }

        let (ours, theirs) = tokio::io::duplex(PIPE_CAPACITY);
        tokio::spawn((self.peer)(theirs));
        Ok(Box::new(ours))
    }
}
