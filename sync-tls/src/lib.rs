//! # sync-tls
//!
//! Mutually authenticated TLS for peersync.
//!
//! Two hosts, two self-signed certificates, each pinning the other's:
//!
//! ```text
//!   local.crt + local.key ──present──►  peer verifies against its peer.crt
//!   peer.crt (pinned)     ◄──verify───  peer presents its own certificate
//! ```
//!
//! [`TlsMaterial`] loads the three PEM files and builds the rustls client
//! and server configs around a [`PinnedCertVerifier`].

#![warn(missing_docs)]
#![warn(clippy::all)]

mod error;
mod material;
mod verifier;

pub use error::{handshake_error_kind, rustls_error_kind, TlsError};
pub use material::{server_name, TlsMaterial};
pub use verifier::PinnedCertVerifier;

pub use tokio_rustls::rustls::pki_types::ServerName;
pub use tokio_rustls::{client, server, TlsAcceptor, TlsConnector};
