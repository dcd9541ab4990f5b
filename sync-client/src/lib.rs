//! # sync-client
//!
//! Client role of peersync: the side that decides what to transfer.
//!
//! ## Features
//!
//! - **Transfer executor**: [`SyncClient`] lists, pushes and pulls, one
//!   fresh channel per exchange
//! - **Session runner**: [`SyncSession`] / [`run_sync`] perform a full pass
//!   and return a [`SyncReport`]
//! - **Transport abstraction**: [`Connector`] with a TLS implementation and
//!   an in-memory mock
//!
//! ## Example
//!
//! ```ignore
//! use peersync_client::{run_sync, TlsTransport};
//!
//! let transport = TlsTransport::from_settings(&settings)?;
//! let report = run_sync(&settings, transport).await?;
//! println!("{} pushed, {} pulled", report.pushed.len(), report.pulled.len());
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod client;
pub mod session;
pub mod transport;

pub use client::{ClientError, SyncClient};
pub use session::{run_sync, PassPlan, SyncReport, SyncSession, TransferFailure};
pub use transport::{
    BoxedStream, Connector, MockConnector, SecureStream, TlsTransport, TransportError,
};
