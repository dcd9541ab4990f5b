//! Certificate and key material, and the rustls configs built from it.

use std::io::BufRead;
use std::path::Path;
use std::sync::Arc;

use tokio_rustls::rustls::{
    self,
    crypto::CryptoProvider,
    pki_types::{CertificateDer, PrivateKeyDer, ServerName},
    ClientConfig, ServerConfig,
};
use tokio_rustls::{TlsAcceptor, TlsConnector};

use crate::{PinnedCertVerifier, TlsError};

/// Everything one side needs for a mutually authenticated session.
#[derive(Debug)]
pub struct TlsMaterial {
    /// Our certificate chain, leaf first.
    pub certs: Vec<CertificateDer<'static>>,
    /// Our private key.
    pub key: PrivateKeyDer<'static>,
    /// The one certificate we trust.
    pub peer_cert: CertificateDer<'static>,
}

impl Clone for TlsMaterial {
    fn clone(&self) -> Self {
        Self {
            certs: self.certs.clone(),
            key: self.key.clone_key(),
            peer_cert: self.peer_cert.clone(),
        }
    }
}

impl TlsMaterial {
    /// Load PEM files: our chain, our key, and the pinned peer certificate.
    pub fn load(cert: &Path, key: &Path, peer_cert: &Path) -> Result<Self, TlsError> {
        let certs = read_certs(&mut open(cert)?, &cert.display().to_string())?;
        let key_der = read_key(&mut open(key)?, &key.display().to_string())?;
        let peer = read_certs(&mut open(peer_cert)?, &peer_cert.display().to_string())?;

        tracing::debug!(
            "loaded tls material: chain of {} from {}, pinned peer from {}",
            certs.len(),
            cert.display(),
            peer_cert.display()
        );
        Self::assemble(certs, key_der, peer)
    }

    /// Parse in-memory PEM data.
    pub fn from_pem(cert: &[u8], key: &[u8], peer_cert: &[u8]) -> Result<Self, TlsError> {
        let certs = read_certs(&mut &cert[..], "certificate PEM")?;
        let key_der = read_key(&mut &key[..], "key PEM")?;
        let peer = read_certs(&mut &peer_cert[..], "peer certificate PEM")?;
        Self::assemble(certs, key_der, peer)
    }

    fn assemble(
        certs: Vec<CertificateDer<'static>>,
        key: PrivateKeyDer<'static>,
        peer: Vec<CertificateDer<'static>>,
    ) -> Result<Self, TlsError> {
        let peer_cert = peer
            .into_iter()
            .next()
            .ok_or_else(|| TlsError::NoCertificate("peer certificate".into()))?;
        Ok(Self {
            certs,
            key,
            peer_cert,
        })
    }

    /// Client-side config: present our chain, accept only the pinned peer.
    pub fn client_config(&self) -> Result<ClientConfig, TlsError> {
        let provider = provider();
        let verifier = Arc::new(PinnedCertVerifier::new(self.peer_cert.clone(), &provider));
        let config = ClientConfig::builder_with_provider(provider)
            .with_safe_default_protocol_versions()?
            .dangerous()
            .with_custom_certificate_verifier(verifier)
            .with_client_auth_cert(self.certs.clone(), self.key.clone_key())?;
        Ok(config)
    }

    /// Server-side config: require a client certificate equal to the pin.
    pub fn server_config(&self) -> Result<ServerConfig, TlsError> {
        let provider = provider();
        let verifier = Arc::new(PinnedCertVerifier::new(self.peer_cert.clone(), &provider));
        let config = ServerConfig::builder_with_provider(provider)
            .with_safe_default_protocol_versions()?
            .with_client_cert_verifier(verifier)
            .with_single_cert(self.certs.clone(), self.key.clone_key())?;
        Ok(config)
    }

    /// [`TlsConnector`] over [`Self::client_config`].
    pub fn connector(&self) -> Result<TlsConnector, TlsError> {
        Ok(TlsConnector::from(Arc::new(self.client_config()?)))
    }

    /// [`TlsAcceptor`] over [`Self::server_config`].
    pub fn acceptor(&self) -> Result<TlsAcceptor, TlsError> {
        Ok(TlsAcceptor::from(Arc::new(self.server_config()?)))
    }
}

/// TLS server name for `host`. The name is not checked against the
/// peer's certificate, but rustls needs one for SNI.
pub fn server_name(host: &str) -> Result<ServerName<'static>, TlsError> {
    ServerName::try_from(host.to_string()).map_err(|_| TlsError::ServerName(host.to_string()))
}

fn provider() -> Arc<CryptoProvider> {
    Arc::new(rustls::crypto::ring::default_provider())
}

fn open(path: &Path) -> Result<std::io::BufReader<std::fs::File>, TlsError> {
    std::fs::File::open(path)
        .map(std::io::BufReader::new)
        .map_err(|e| TlsError::Read {
            path: path.to_path_buf(),
            source: e,
        })
}

fn read_certs(
    reader: &mut dyn BufRead,
    what: &str,
) -> Result<Vec<CertificateDer<'static>>, TlsError> {
    let certs = rustls_pemfile::certs(reader)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|_| TlsError::NoCertificate(what.to_string()))?;
    if certs.is_empty() {
        return Err(TlsError::NoCertificate(what.to_string()));
    }
    Ok(certs)
}

fn read_key(reader: &mut dyn BufRead, what: &str) -> Result<PrivateKeyDer<'static>, TlsError> {
    rustls_pemfile::private_key(reader)
        .ok()
        .flatten()
        .ok_or_else(|| TlsError::NoPrivateKey(what.to_string()))
}
