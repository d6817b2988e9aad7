use std::{collections::BTreeMap, net::SocketAddr, sync::Arc, time::Duration};

use async_trait::async_trait;
use quinn::rustls::pki_types::PrivateKeyDer;
use test_log::test;
use tokio_util::{sync::CancellationToken, task::TaskTracker};
use tracing::debug;

use crate::{
    commands::get_certificate::{CERTIFICATE_METHOD, GetCertificate},
    protocol::{CertificateResponse, RequestPayload, ResponsePayload},
    rpc::{
        client::RpcClient,
        command::{
            dispatcher::{CommandDispatcher, DispatchError},
            handler::{CommandHandler, HandlerCollection},
        },
        server::{RpcServer, ServerCredentials},
        session::{CallContext, Session},
    },
    stages::{StageChain, audit::AuditStage, token::TokenAuthStage},
    status::{Status, StatusCode},
    verbosity::Verbosity,
    verifiers::skip_verify::{SkipClientVerification, SkipServerVerification},
};

const TEST_TOKEN: &str = "test-token";

fn test_server_credentials() -> ServerCredentials {
    let keypair = rcgen::KeyPair::generate_for(&rcgen::PKCS_ED25519).unwrap();

    let mut params = rcgen::CertificateParams::new(vec![]).unwrap();
    params
        .distinguished_name
        .push(rcgen::DnType::CommonName, "test-rpc-server");

    let cert = params.self_signed(&keypair).unwrap();

    ServerCredentials {
        cert_chain: vec![cert.der().clone()],
        key: PrivateKeyDer::try_from(keypair.serialize_der()).unwrap(),
    }
}

struct StubCertificateHandler;

#[async_trait]
impl CommandHandler for StubCertificateHandler {
    fn key(&self) -> String {
        CERTIFICATE_METHOD.to_string()
    }

    async fn handle(
        &self,
        _context: &CallContext,
        request: RequestPayload,
    ) -> Result<ResponsePayload, Status> {
        let RequestPayload::Certificate(request) = request;

        Ok(ResponsePayload::Certificate(CertificateResponse {
            ca: b"stub-ca".to_vec(),
            crt: request.csr,
        }))
    }
}

struct BogusMethod;

#[async_trait]
impl CommandDispatcher for BogusMethod {
    type Output = ();

    fn key(&self) -> String {
        "bogus".to_string()
    }

    async fn dispatch(self, _session: &mut Session) -> Result<Self::Output, DispatchError> {
        Ok(())
    }
}

async fn start_test_server(
    port: u16,
    cancel: CancellationToken,
    tasks: TaskTracker,
) -> Arc<RpcServer> {
    let stages = StageChain::new(vec![
        Arc::new(AuditStage::new(Verbosity::Payload)),
        Arc::new(TokenAuthStage::new(
            TEST_TOKEN.to_string(),
            Verbosity::Payload,
        )),
    ]);

    let commands = HandlerCollection::new(stages);
    commands.chain().await.add(StubCertificateHandler);

    let address: SocketAddr = format!("127.0.0.1:{port}").parse().unwrap();
    let socket = RpcServer::create_socket(address).unwrap();

    RpcServer::build()
        .credentials(test_server_credentials())
        .client_cert_verifier(SkipClientVerification::new())
        .commands(commands)
        .verbosity(Verbosity::Payload)
        .cancellation_token(cancel)
        .task_tracker(tasks)
        .start_server(socket)
        .unwrap()
}

async fn connect_test_client(port: u16, metadata: Option<BTreeMap<String, String>>) -> RpcClient {
    let address: SocketAddr = format!("127.0.0.1:{port}").parse().unwrap();

    RpcClient::connect(
        address,
        "localhost",
        None,
        SkipServerVerification::new(),
        metadata,
    )
    .await
    .unwrap()
}

fn token_metadata(token: &str) -> BTreeMap<String, String> {
    let mut metadata = BTreeMap::new();
    metadata.insert("token".to_string(), token.to_string());
    metadata
}

#[test(tokio::test)]
async fn test_certificate_roundtrip() {
    let cancel = CancellationToken::new();
    let tasks = TaskTracker::new();

    let server = start_test_server(1240, cancel.clone(), tasks.clone()).await;

    let client = connect_test_client(1240, Some(token_metadata(TEST_TOKEN))).await;

    debug!("client connected");

    let connection = client.upstream_connection().unwrap();

    let response = connection
        .dispatch(GetCertificate {
            csr: b"fake csr".to_vec(),
        })
        .await
        .unwrap();

    assert_eq!(response.ca, b"stub-ca");
    assert_eq!(response.crt, b"fake csr");

    client.close();
    server.close(Duration::from_secs(5)).await.unwrap();

    tasks.close();
    tasks.wait().await;
}

#[test(tokio::test)]
async fn test_invalid_token_is_rejected() {
    let cancel = CancellationToken::new();
    let tasks = TaskTracker::new();

    let server = start_test_server(1241, cancel.clone(), tasks.clone()).await;

    let client = connect_test_client(1241, Some(token_metadata("wrong"))).await;

    let connection = client.upstream_connection().unwrap();

    let err = connection
        .dispatch(GetCertificate {
            csr: b"fake csr".to_vec(),
        })
        .await
        .unwrap_err();

    match err {
        DispatchError::Status(status) => {
            assert_eq!(status.code(), StatusCode::Unauthenticated);
            assert_eq!(status.message(), "invalid token");
        }
        other => panic!("unexpected error: {other}"),
    }

    client.close();
    server.close(Duration::from_secs(5)).await.unwrap();
}

#[test(tokio::test)]
async fn test_missing_metadata_is_rejected() {
    let cancel = CancellationToken::new();
    let tasks = TaskTracker::new();

    let server = start_test_server(1242, cancel.clone(), tasks.clone()).await;

    let client = connect_test_client(1242, None).await;

    let connection = client.upstream_connection().unwrap();

    let err = connection
        .dispatch(GetCertificate {
            csr: b"fake csr".to_vec(),
        })
        .await
        .unwrap_err();

    match err {
        DispatchError::Status(status) => {
            assert_eq!(status.code(), StatusCode::Unauthenticated);
            assert_eq!(status.message(), "missing metadata");
        }
        other => panic!("unexpected error: {other}"),
    }

    client.close();
    server.close(Duration::from_secs(5)).await.unwrap();
}

#[test(tokio::test)]
async fn test_unknown_method_is_declined() {
    let cancel = CancellationToken::new();
    let tasks = TaskTracker::new();

    let server = start_test_server(1243, cancel.clone(), tasks.clone()).await;

    // no metadata on purpose, the method check runs before any stage
    let client = connect_test_client(1243, None).await;

    let connection = client.upstream_connection().unwrap();

    let err = connection.dispatch(BogusMethod).await.unwrap_err();

    match err {
        DispatchError::Status(status) => {
            assert_eq!(status.code(), StatusCode::Unimplemented);
            assert_eq!(status.message(), "unknown method bogus");
        }
        other => panic!("unexpected error: {other}"),
    }

    client.close();
    server.close(Duration::from_secs(5)).await.unwrap();
}
