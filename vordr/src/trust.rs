use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;
use vordr_rpc::rpc::server::ServerCredentials;
use vordr_rpc::rustls::{
    self, RootCertStore,
    pki_types::{CertificateDer, PrivateKeyDer},
    server::{WebPkiClientVerifier, danger::ClientCertVerifier},
};

use crate::config::ServiceConfig;

/// Errors while assembling the transport trust at startup.
#[derive(Debug, Error)]
pub enum TrustError {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("no certificates found in {}", .0.display())]
    EmptyBundle(PathBuf),
    #[error("no private key found in {}", .0.display())]
    MissingKey(PathBuf),
    #[error("rejected certificate in {}: {source}", path.display())]
    InvalidCertificate {
        path: PathBuf,
        #[source]
        source: rustls::Error,
    },
    #[error("failed to build client verifier: {0}")]
    Verifier(String),
}

/// Loads the certificate and key presented on the listen socket.
///
/// Read once at startup. Rotating these requires a restart, unlike the
/// signing CA which is read per call.
pub fn load_server_credentials(config: &ServiceConfig) -> Result<ServerCredentials, TrustError> {
    let cert_chain = read_cert_file(&config.server_cert)?;
    let key = read_key_file(&config.server_key)?;

    Ok(ServerCredentials { cert_chain, key })
}

/// Builds the handshake verifier which requires client certificates to
/// chain up to one of the accepted CAs.
pub fn load_client_verifier(
    config: &ServiceConfig,
) -> Result<Arc<dyn ClientCertVerifier>, TrustError> {
    let accepted = read_cert_file(&config.accepted_cas)?;

    let mut roots = RootCertStore::empty();
    for cert in accepted {
        roots
            .add(cert)
            .map_err(|source| TrustError::InvalidCertificate {
                path: config.accepted_cas.clone(),
                source,
            })?;
    }

    WebPkiClientVerifier::builder(Arc::new(roots))
        .build()
        .map_err(|err| TrustError::Verifier(err.to_string()))
}

fn read_cert_file(path: &Path) -> Result<Vec<CertificateDer<'static>>, TrustError> {
    let pem = read_file(path)?;

    let certs = rustls_pemfile::certs(&mut pem.as_slice())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|source| TrustError::Read {
            path: path.to_owned(),
            source,
        })?;

    if certs.is_empty() {
        return Err(TrustError::EmptyBundle(path.to_owned()));
    }

    Ok(certs)
}

fn read_key_file(path: &Path) -> Result<PrivateKeyDer<'static>, TrustError> {
    let pem = read_file(path)?;

    rustls_pemfile::private_key(&mut pem.as_slice())
        .map_err(|source| TrustError::Read {
            path: path.to_owned(),
            source,
        })?
        .ok_or_else(|| TrustError::MissingKey(path.to_owned()))
}

fn read_file(path: &Path) -> Result<Vec<u8>, TrustError> {
    std::fs::read(path).map_err(|source| TrustError::Read {
        path: path.to_owned(),
        source,
    })
}
