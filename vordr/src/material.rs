use thiserror::Error;
use vordr_pki::{Credential, LoadCredentialError};

use crate::config::ServiceConfig;

/// CA material for one signing operation.
#[derive(Debug)]
pub struct CaMaterial {
    /// The CA which signs issued certificates.
    pub credential: Credential,
    /// The accepted-CA bundle handed back to clients verbatim.
    pub bundle: Vec<u8>,
}

#[derive(Debug, Error)]
pub enum MaterialError {
    #[error("failed to load CA certificate: {0}")]
    Credential(#[from] LoadCaError),
    #[error("failed to load accepted CAs: {0}")]
    Bundle(#[source] std::io::Error),
}

#[derive(Debug, Error)]
pub enum LoadCaError {
    #[error("failed to read CA certificate: {0}")]
    ReadCert(#[source] std::io::Error),
    #[error("failed to read CA key: {0}")]
    ReadKey(#[source] std::io::Error),
    #[error(transparent)]
    Parse(#[from] LoadCredentialError),
}

/// Reads the CA certificate, CA key and accepted-CA bundle from disk.
///
/// Called for every signing operation, never cached. Swapping the files
/// on disk changes what the next call signs with, without a restart.
pub async fn load_ca_material(config: &ServiceConfig) -> Result<CaMaterial, MaterialError> {
    let ca_cert = tokio::fs::read_to_string(&config.ca_cert)
        .await
        .map_err(|err| MaterialError::Credential(LoadCaError::ReadCert(err)))?;

    let ca_key = tokio::fs::read_to_string(&config.ca_key)
        .await
        .map_err(|err| MaterialError::Credential(LoadCaError::ReadKey(err)))?;

    let credential = Credential::from_pem(&ca_cert, &ca_key).map_err(LoadCaError::Parse)?;

    let bundle = tokio::fs::read(&config.accepted_cas)
        .await
        .map_err(MaterialError::Bundle)?;

    Ok(CaMaterial { credential, bundle })
}
