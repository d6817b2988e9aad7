use std::sync::Arc;

use async_trait::async_trait;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tracing::info;
use vordr_pki::{CertificateRequest, ParseRequestError, SigningPolicy};
use vordr_rpc::commands::get_certificate::CERTIFICATE_METHOD;
use vordr_rpc::protocol::{CertificateResponse, RequestPayload, ResponsePayload};
use vordr_rpc::rpc::command::handler::CommandHandler;
use vordr_rpc::rpc::session::CallContext;
use vordr_rpc::status::Status;

use crate::config::ServiceConfig;
use crate::material;

/// Handler of the certificate method.
///
/// Validates the CSR, applies the signing policy and returns a
/// certificate signed by the on-disk CA together with the accepted-CA
/// bundle. The CA material is read per call, so a rotated CA is picked
/// up without a restart.
pub struct CertificateHandler {
    config: Arc<ServiceConfig>,
    policy: SigningPolicy,
}

impl CertificateHandler {
    pub fn new(config: Arc<ServiceConfig>) -> Self {
        Self {
            config,
            policy: SigningPolicy::default(),
        }
    }
}

#[async_trait]
impl CommandHandler for CertificateHandler {
    fn key(&self) -> String {
        CERTIFICATE_METHOD.to_string()
    }

    async fn handle(
        &self,
        context: &CallContext,
        request: RequestPayload,
    ) -> Result<ResponsePayload, Status> {
        let RequestPayload::Certificate(request) = request;

        let Some(peer) = context.peer().verified() else {
            return Err(Status::permission_denied("peer not found"));
        };

        let mut csr = CertificateRequest::from_pem(&request.csr).map_err(|err| match err {
            ParseRequestError::Decode => Status::invalid_argument("failed to decode CSR"),
            other => Status::invalid_argument(format!("failed to parse CSR: {other}")),
        })?;

        info!(
            "received CSR from {}: subject {} dns {:?} ips {:?}",
            peer.address(),
            csr.subject(),
            csr.san_dns(),
            csr.san_ips()
        );

        let outcome = self.policy.enforce(&mut csr);

        if !outcome.removed_organization.is_empty() {
            info!(
                "removing client auth organization from CSR: {:?}",
                outcome.removed_organization
            );
        }

        // TODO: verify that the addresses in the CSR match the peer address
        let material = material::load_ca_material(&self.config)
            .await
            .map_err(|err| Status::internal(err.to_string()))?;

        let issued = material
            .credential
            .sign_request(csr)
            .map_err(|err| Status::internal(format!("failed to sign CSR: {err}")))?;

        let certificate = issued.certificate();

        info!(
            "issued certificate for {} to {}: notBefore={} notAfter={} sanDNS={:?} sanIP={:?}",
            certificate.subject(),
            peer.address(),
            rfc3339(certificate.not_before()),
            rfc3339(certificate.not_after()),
            certificate.san_dns(),
            certificate.san_ips()
        );

        Ok(ResponsePayload::Certificate(CertificateResponse {
            ca: material.bundle,
            crt: issued.pem().as_bytes().to_vec(),
        }))
    }
}

fn rfc3339(datetime: OffsetDateTime) -> String {
    datetime
        .format(&Rfc3339)
        .unwrap_or_else(|_| datetime.to_string())
}
