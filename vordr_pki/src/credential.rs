use std::fmt::Debug;
use std::sync::Arc;

use thiserror::Error;
use tracing::debug;

use crate::certificate::{Certificate, ParseCertificateError};
use crate::keypair::{KeyPair, ParseKeyPairError};
use crate::request::CertificateRequest;

#[derive(Debug)]
struct CredentialData {
    keypair: KeyPair,
    certificate: Certificate,
}

/// A certificate together with its private key.
///
/// Used both as the identity of this service and as the authority which
/// signs incoming certificate requests.
#[derive(Clone)]
pub struct Credential {
    data: Arc<CredentialData>,
}

impl Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("certificate", &self.data.certificate)
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum LoadCredentialError {
    #[error("error parsing certificate: {0}")]
    ParseCertificateError(#[from] ParseCertificateError),
    #[error("error parsing keypair: {0}")]
    ParseKeyPairError(#[from] ParseKeyPairError),
}

#[derive(Debug, Error)]
pub enum SignRequestError {
    #[error("error creating ca-certificate params: {0}")]
    CreateCaParamsError(rcgen::Error),
    #[error("error creating ca-certificate: {0}")]
    CreateCaError(rcgen::Error),
    #[error("error signing certificate: {0}")]
    SignCertError(rcgen::Error),
    #[error("error parsing new certificate: {0}")]
    ParseNewCertError(ParseCertificateError),
}

/// Result of signing a request: the certificate in both the form handed
/// back to the requester and the parsed form used for logging.
pub struct IssuedCertificate {
    pem: String,
    certificate: Certificate,
}

impl IssuedCertificate {
    pub fn pem(&self) -> &str {
        &self.pem
    }

    pub fn certificate(&self) -> &Certificate {
        &self.certificate
    }
}

impl Credential {
    pub fn new(certificate: Certificate, keypair: KeyPair) -> Self {
        Self {
            data: Arc::new(CredentialData {
                keypair,
                certificate,
            }),
        }
    }

    pub fn from_pem(cert_pem: &str, key_pem: &str) -> Result<Self, LoadCredentialError> {
        let certificate = Certificate::from_pem(cert_pem.as_bytes())?;
        let keypair = KeyPair::from_pem(key_pem)?;

        Ok(Self::new(certificate, keypair))
    }

    pub fn certificate(&self) -> &Certificate {
        &self.data.certificate
    }

    pub fn keypair(&self) -> &KeyPair {
        &self.data.keypair
    }

    /// Signs the request with this credential acting as the CA.
    ///
    /// The request is consumed since its parameters were already rewritten
    /// by the policy and must not be signed twice.
    pub fn sign_request(
        &self,
        request: CertificateRequest,
    ) -> Result<IssuedCertificate, SignRequestError> {
        debug!("signing certificate request for {}", request.subject());

        let ca_params =
            rcgen::CertificateParams::from_ca_cert_der(&self.data.certificate.as_der().into())
                .map_err(SignRequestError::CreateCaParamsError)?;

        let ca = ca_params
            .self_signed(self.data.keypair.rcgen())
            .map_err(SignRequestError::CreateCaError)?;

        let rcgen_cert = request
            .csr
            .signed_by(&ca, self.data.keypair.rcgen())
            .map_err(SignRequestError::SignCertError)?;

        let certificate = Certificate::from_der(rcgen_cert.der().to_vec())
            .map_err(SignRequestError::ParseNewCertError)?;

        debug!("issued certificate {}", certificate.subject());

        Ok(IssuedCertificate {
            pem: rcgen_cert.pem(),
            certificate,
        })
    }
}
