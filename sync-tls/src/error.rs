//! Error types for sync-tls.

use std::path::PathBuf;

use sync_types::ErrorKind;
use thiserror::Error;
use tokio_rustls::rustls;

/// Errors that can occur while preparing TLS material or configs.
#[derive(Error, Debug)]
pub enum TlsError {
    /// A PEM file could not be read.
    #[error("failed to read {}: {source}", path.display())]
    Read {
        /// File being read.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The PEM source held no certificate.
    #[error("no certificate found in {0}")]
    NoCertificate(String),

    /// The PEM source held no private key.
    #[error("no private key found in {0}")]
    NoPrivateKey(String),

    /// The host cannot be used as a TLS server name.
    #[error("invalid server name: {0}")]
    ServerName(String),

    /// rustls rejected the material while building a config.
    #[error("tls config rejected: {0}")]
    Config(#[from] rustls::Error),
}

impl TlsError {
    /// Failure class for reports.
    ///
    /// Everything here is a problem with local certificate material.
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::Certificate
    }
}

/// Classify an error returned by a TLS handshake.
///
/// tokio-rustls reports handshake failures as `io::Error`s wrapping the
/// `rustls::Error`. Certificate rejections (ours or the peer's, via alert)
/// are [`ErrorKind::Certificate`]; everything else is
/// [`ErrorKind::Handshake`].
pub fn handshake_error_kind(err: &std::io::Error) -> ErrorKind {
    rustls_error_kind(err).unwrap_or(ErrorKind::Handshake)
}

/// Classify an `io::Error` that carries a `rustls::Error`.
///
/// With TLS 1.3 the server checks the client certificate after the client
/// considers the handshake done, so a rejection can surface on the first
/// read instead. `None` for I/O errors that did not come from rustls.
pub fn rustls_error_kind(err: &std::io::Error) -> Option<ErrorKind> {
    let inner = err.get_ref()?.downcast_ref::<rustls::Error>()?;
    let kind = match inner {
        rustls::Error::InvalidCertificate(_) | rustls::Error::NoCertificatesPresented => {
            ErrorKind::Certificate
        }
        rustls::Error::AlertReceived(alert) => match alert {
            rustls::AlertDescription::BadCertificate
            | rustls::AlertDescription::UnsupportedCertificate
            | rustls::AlertDescription::CertificateRevoked
            | rustls::AlertDescription::CertificateExpired
            | rustls::AlertDescription::CertificateUnknown
            | rustls::AlertDescription::UnknownCA
            | rustls::AlertDescription::CertificateRequired
            | rustls::AlertDescription::AccessDenied => ErrorKind::Certificate,
            _ => ErrorKind::Handshake,
        },
        _ => ErrorKind::Handshake,
    };
    Some(kind)
}
