//! # sync-server
//!
//! Server role of peersync: answers `list`, `push` and `pull` requests
//! against one synchronization root.
//!
//! ## Architecture
//!
//! ```text
//! TcpListener ──accept──► task ──TLS handshake──► handle_connection ──► one exchange, close
//!      │                   (one per connection, bounded by a semaphore)
//!      └── stops on the shutdown future
//! ```
//!
//! [`handle_connection`] is generic over the stream, so tests and the
//! client's mock connector drive it over in-memory pipes.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod handler;
pub mod metrics;
pub mod server;

pub use error::{Result, ServerError};
pub use handler::{handle_connection, ServerContext};
pub use metrics::{MetricsSnapshot, ServerMetrics};
pub use server::SyncServer;
