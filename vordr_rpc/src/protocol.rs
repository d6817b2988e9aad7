use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertificateRequest {
    /// PEM encoded certificate signing request.
    pub csr: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertificateResponse {
    /// PEM bundle of the CAs the server currently accepts.
    pub ca: Vec<u8>,
    /// PEM encoded certificate issued for the request.
    pub crt: Vec<u8>,
}

/// Every request payload the server understands. Adding a method means
/// adding a variant here, which forces a decision on how its payload gets
/// rendered in the logs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum RequestPayload {
    Certificate(CertificateRequest),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ResponsePayload {
    Certificate(CertificateResponse),
}

impl RequestPayload {
    /// Rendering used at payload level logging. Each variant prints only
    /// the fields which are safe to show.
    pub fn render(&self) -> String {
        match self {
            RequestPayload::Certificate(request) => {
                format!("csr:\n{}", String::from_utf8_lossy(&request.csr))
            }
        }
    }
}

impl ResponsePayload {
    pub fn render(&self) -> String {
        match self {
            ResponsePayload::Certificate(response) => {
                format!(
                    "ca:\n{}crt:\n{}",
                    String::from_utf8_lossy(&response.ca),
                    String::from_utf8_lossy(&response.crt)
                )
            }
        }
    }
}
