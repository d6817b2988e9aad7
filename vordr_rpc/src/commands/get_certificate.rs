use async_trait::async_trait;

use crate::protocol::{CertificateRequest, CertificateResponse, RequestPayload, ResponsePayload};
use crate::rpc::command::dispatcher::{CommandDispatcher, DispatchError};
use crate::rpc::session::Session;
use crate::status::Status;

pub const CERTIFICATE_METHOD: &str = "certificate";

/// Client side of the certificate method. Sends a pem encoded CSR and
/// returns the signed certificate together with the CA bundle.
pub struct GetCertificate {
    pub csr: Vec<u8>,
}

#[async_trait]
impl CommandDispatcher for GetCertificate {
    type Output = CertificateResponse;

    fn key(&self) -> String {
        CERTIFICATE_METHOD.to_string()
    }

    async fn dispatch(self, session: &mut Session) -> Result<Self::Output, DispatchError> {
        session
            .write_object(&RequestPayload::Certificate(CertificateRequest {
                csr: self.csr,
            }))
            .await?;

        let result: Result<ResponsePayload, Status> = session.read_object().await?;

        match result? {
            ResponsePayload::Certificate(response) => Ok(response),
        }
    }
}
