use std::fmt::Debug;
use std::net::IpAddr;
use std::ops::Deref;
use std::sync::Arc;

use thiserror::Error;
use time::OffsetDateTime;
use x509_parser::certificate::X509Certificate;
use x509_parser::error::X509Error;
use x509_parser::extensions::GeneralName;
use x509_parser::oid_registry::asn1_rs::FromDer;

#[derive(Error, Debug)]
pub enum ParseCertificateError {
    #[error("no pem block found")]
    InvalidPem,
    #[error("X509 Parser Error: {0}")]
    X509ParserError(#[from] x509_parser::nom::Err<X509Error>),
    #[error("X509 Error: {0}")]
    X509Error(#[from] X509Error),
}

#[derive(Error, Debug)]
pub enum SignatureVerificationError {
    #[error("X509 Parser Error: {0}")]
    X509ParserError(#[from] x509_parser::nom::Err<X509Error>),
    #[error("Verification Error: {0}")]
    X509VerificationError(#[from] X509Error),
}

/// Owned summary of an X.509 certificate.
///
/// All fields the service ever reads are extracted up front so the raw DER
/// does not need to be reparsed on access.
#[derive(Debug)]
pub struct CertificateData {
    der: Vec<u8>,
    subject: String,
    common_name: Option<String>,
    organization: Vec<String>,
    san_dns: Vec<String>,
    san_ips: Vec<IpAddr>,
    not_before: OffsetDateTime,
    not_after: OffsetDateTime,
}

#[derive(Clone)]
pub struct Certificate {
    data: Arc<CertificateData>,
}

impl Deref for Certificate {
    type Target = CertificateData;

    fn deref(&self) -> &Self::Target {
        &self.data
    }
}

impl Debug for Certificate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Certificate")
            .field("subject", &self.data.subject)
            .finish()
    }
}

impl Certificate {
    pub fn from_der(der: Vec<u8>) -> Result<Self, ParseCertificateError> {
        let (_, cert) = X509Certificate::from_der(der.as_ref())?;

        let subject = cert.subject().to_string();

        let common_name = cert
            .subject()
            .iter_common_name()
            .next()
            .map(|attr| attr.as_str())
            .transpose()?
            .map(str::to_string);

        let organization = cert
            .subject()
            .iter_organization()
            .map(|attr| attr.as_str().map(str::to_string))
            .collect::<Result<Vec<_>, _>>()?;

        let mut san_dns = Vec::new();
        let mut san_ips = Vec::new();

        if let Some(san) = cert.subject_alternative_name()? {
            for name in &san.value.general_names {
                match name {
                    GeneralName::DNSName(dns) => san_dns.push(dns.to_string()),
                    GeneralName::IPAddress(bytes) => {
                        if let Some(ip) = ip_from_bytes(bytes) {
                            san_ips.push(ip);
                        }
                    }
                    _ => (),
                }
            }
        }

        let validity = cert.validity();
        let not_before = validity.not_before.to_datetime();
        let not_after = validity.not_after.to_datetime();

        Ok(Self {
            data: Arc::new(CertificateData {
                der,
                subject,
                common_name,
                organization,
                san_dns,
                san_ips,
                not_before,
                not_after,
            }),
        })
    }

    pub fn from_pem(pem: &[u8]) -> Result<Self, ParseCertificateError> {
        let (_, pem) = x509_parser::pem::parse_x509_pem(pem)
            .map_err(|_| ParseCertificateError::InvalidPem)?;

        Self::from_der(pem.contents)
    }

    /// Checks that this certificate carries a valid signature made by the
    /// given issuer.
    pub fn verify_signed_by(
        &self,
        issuer: &Certificate,
    ) -> Result<(), SignatureVerificationError> {
        let (_, cert) = X509Certificate::from_der(self.as_der())?;
        let (_, issuer_cert) = X509Certificate::from_der(issuer.as_der())?;

        cert.verify_signature(Some(issuer_cert.public_key()))?;

        Ok(())
    }
}

impl CertificateData {
    pub fn as_der(&self) -> &[u8] {
        &self.der
    }

    /// Full subject rendered in the usual `CN=..., O=...` form.
    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn common_name(&self) -> Option<&str> {
        self.common_name.as_deref()
    }

    pub fn organization(&self) -> &[String] {
        &self.organization
    }

    pub fn san_dns(&self) -> &[String] {
        &self.san_dns
    }

    pub fn san_ips(&self) -> &[IpAddr] {
        &self.san_ips
    }

    pub fn not_before(&self) -> OffsetDateTime {
        self.not_before
    }

    pub fn not_after(&self) -> OffsetDateTime {
        self.not_after
    }
}

impl PartialEq for Certificate {
    fn eq(&self, other: &Self) -> bool {
        self.as_der() == other.as_der()
    }
}

impl Eq for Certificate {}

pub(crate) fn ip_from_bytes(bytes: &[u8]) -> Option<IpAddr> {
    match bytes.len() {
        4 => {
            let octets: [u8; 4] = bytes.try_into().ok()?;
            Some(IpAddr::from(octets))
        }
        16 => {
            let octets: [u8; 16] = bytes.try_into().ok()?;
            Some(IpAddr::from(octets))
        }
        _ => None,
    }
}
