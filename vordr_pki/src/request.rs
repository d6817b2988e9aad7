use std::fmt::Debug;
use std::net::IpAddr;

use rcgen::CertificateSigningRequestParams;
use thiserror::Error;
use x509_parser::certification_request::X509CertificationRequest;
use x509_parser::error::X509Error;
use x509_parser::extensions::{GeneralName, ParsedExtension};
use x509_parser::oid_registry::asn1_rs::FromDer;
use x509_parser::pem::parse_x509_pem;

use crate::certificate::ip_from_bytes;

#[derive(Error, Debug)]
pub enum ParseRequestError {
    /// The input is not a decodable PEM block at all.
    #[error("no pem block found")]
    Decode,
    #[error("{0}")]
    ParseError(rcgen::Error),
    #[error("{0}")]
    X509ParserError(#[from] x509_parser::nom::Err<X509Error>),
    #[error("{0}")]
    X509Error(#[from] X509Error),
}

/// A parsed certificate signing request.
///
/// Wraps the rcgen parameters used for signing together with an owned
/// summary of what the requester asked for.
pub struct CertificateRequest {
    pub(crate) csr: CertificateSigningRequestParams,
    subject: String,
    common_name: Option<String>,
    organization: Vec<String>,
    san_dns: Vec<String>,
    san_ips: Vec<IpAddr>,
}

impl Debug for CertificateRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CertificateRequest")
            .field("subject", &self.subject)
            .finish()
    }
}

impl CertificateRequest {
    /// Parses a PEM encoded CSR and verifies its inner signature.
    ///
    /// A [`ParseRequestError::Decode`] means the input was not even PEM,
    /// every other variant means the PEM block did not hold a valid CSR.
    pub fn from_pem(pem: &[u8]) -> Result<Self, ParseRequestError> {
        let pem_string = std::str::from_utf8(pem).map_err(|_| ParseRequestError::Decode)?;

        let (_, decoded) = parse_x509_pem(pem).map_err(|_| ParseRequestError::Decode)?;

        // Signature verification happens inside rcgen.
        let csr = CertificateSigningRequestParams::from_pem(pem_string)
            .map_err(ParseRequestError::ParseError)?;

        let (_, info) = X509CertificationRequest::from_der(&decoded.contents)?;

        let subject = info.certification_request_info.subject.to_string();

        let common_name = info
            .certification_request_info
            .subject
            .iter_common_name()
            .next()
            .map(|attr| attr.as_str())
            .transpose()?
            .map(str::to_string);

        let organization = info
            .certification_request_info
            .subject
            .iter_organization()
            .map(|attr| attr.as_str().map(str::to_string))
            .collect::<Result<Vec<_>, _>>()?;

        let mut san_dns = Vec::new();
        let mut san_ips = Vec::new();

        if let Some(extensions) = info.requested_extensions() {
            for extension in extensions {
                if let ParsedExtension::SubjectAlternativeName(san) = extension {
                    for name in &san.general_names {
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
            }
        }

        Ok(Self {
            csr,
            subject,
            common_name,
            organization,
            san_dns,
            san_ips,
        })
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn common_name(&self) -> Option<&str> {
        self.common_name.as_deref()
    }

    /// Organization values as they appeared in the request, even after
    /// a signing policy rewrote the subject.
    pub fn organization(&self) -> &[String] {
        &self.organization
    }

    pub fn san_dns(&self) -> &[String] {
        &self.san_dns
    }

    pub fn san_ips(&self) -> &[IpAddr] {
        &self.san_ips
    }
}
