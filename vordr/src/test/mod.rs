use std::collections::BTreeMap;
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use rcgen::{
    BasicConstraints, CertificateParams, DnType, ExtendedKeyUsagePurpose, Ia5String, IsCa, KeyPair,
    KeyUsagePurpose, SanType,
};
use tempfile::TempDir;
use test_log::test;
use tokio_util::sync::CancellationToken;
use vordr_pki::{Certificate, Credential};
use vordr_rpc::commands::get_certificate::GetCertificate;
use vordr_rpc::rpc::client::RpcClient;
use vordr_rpc::rpc::command::dispatcher::DispatchError;
use vordr_rpc::rpc::peer::{Peer, VerifiedPeer};
use vordr_rpc::rpc::session::CallContext;
use vordr_rpc::status::StatusCode;
use vordr_rpc::verbosity::Verbosity;
use vordr_rpc::verifiers::skip_verify::SkipServerVerification;
use x509_parser::certificate::X509Certificate;
use x509_parser::oid_registry::asn1_rs::FromDer;

use crate::config::ServiceConfig;
use crate::server::Server;

/// On-disk pki in the layout the daemon is pointed at: signing CA,
/// listener certificate, the accepted-CA bundle and a client credential
/// chaining up to that bundle.
pub(crate) struct TestPki {
    dir: TempDir,
    ca: Certificate,
    client: Credential,
}

impl TestPki {
    pub fn generate() -> Self {
        let ca_keypair = KeyPair::generate_for(&rcgen::PKCS_ED25519).unwrap();

        let mut ca_params = CertificateParams::default();
        ca_params
            .distinguished_name
            .push(DnType::OrganizationName, "test-ca");
        ca_params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
        ca_params.key_usages = vec![
            KeyUsagePurpose::KeyCertSign,
            KeyUsagePurpose::DigitalSignature,
            KeyUsagePurpose::CrlSign,
        ];
        let ca_cert = ca_params.self_signed(&ca_keypair).unwrap();

        let server_keypair = KeyPair::generate_for(&rcgen::PKCS_ED25519).unwrap();
        let mut server_params = CertificateParams::new(vec!["localhost".to_string()]).unwrap();
        server_params
            .distinguished_name
            .push(DnType::CommonName, "vordr-test");
        let server_cert = server_params.self_signed(&server_keypair).unwrap();

        let client_keypair = KeyPair::generate_for(&rcgen::PKCS_ED25519).unwrap();
        let mut client_params = CertificateParams::default();
        client_params
            .distinguished_name
            .push(DnType::CommonName, "test-node");
        client_params.key_usages = vec![KeyUsagePurpose::DigitalSignature];
        client_params.extended_key_usages = vec![ExtendedKeyUsagePurpose::ClientAuth];
        let client_cert = client_params
            .signed_by(&client_keypair, &ca_cert, &ca_keypair)
            .unwrap();

        let dir = tempfile::tempdir().unwrap();

        let write = |name: &str, content: &str| {
            std::fs::write(dir.path().join(name), content).unwrap();
        };

        write("ca.crt", &ca_cert.pem());
        write("ca.key", &ca_keypair.serialize_pem());
        write("server.crt", &server_cert.pem());
        write("server.key", &server_keypair.serialize_pem());
        // the bundle is the signing CA itself, responses return these
        // bytes verbatim
        write("accepted.crt", &ca_cert.pem());

        Self {
            dir,
            ca: Certificate::from_pem(ca_cert.pem().as_bytes()).unwrap(),
            client: Credential::from_pem(&client_cert.pem(), &client_keypair.serialize_pem())
                .unwrap(),
        }
    }

    pub fn dir(&self) -> &Path {
        self.dir.path()
    }

    pub fn accepted_cas(&self) -> PathBuf {
        self.dir.path().join("accepted.crt")
    }

    pub fn ca_certificate(&self) -> Certificate {
        self.ca.clone()
    }

    pub fn client_credential(&self) -> &Credential {
        &self.client
    }

    /// Swaps the signing CA on disk. The accepted bundle stays as it is,
    /// rotation only changes what signs.
    pub fn rotate_ca(&self) -> Certificate {
        let keypair = KeyPair::generate_for(&rcgen::PKCS_ED25519).unwrap();

        let mut params = CertificateParams::default();
        params
            .distinguished_name
            .push(DnType::OrganizationName, "rotated-ca");
        params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
        params.key_usages = vec![
            KeyUsagePurpose::KeyCertSign,
            KeyUsagePurpose::DigitalSignature,
            KeyUsagePurpose::CrlSign,
        ];
        let cert = params.self_signed(&keypair).unwrap();

        std::fs::write(self.dir.path().join("ca.crt"), cert.pem()).unwrap();
        std::fs::write(self.dir.path().join("ca.key"), keypair.serialize_pem()).unwrap();

        Certificate::from_pem(cert.pem().as_bytes()).unwrap()
    }

    pub fn service_config(&self, token: &str) -> ServiceConfig {
        ServiceConfig {
            port: 0,
            ca_cert: self.dir.path().join("ca.crt"),
            ca_key: self.dir.path().join("ca.key"),
            server_cert: self.dir.path().join("server.crt"),
            server_key: self.dir.path().join("server.key"),
            accepted_cas: self.accepted_cas(),
            auth_token: token.to_string(),
            debug_port: 0,
            verbosity: Verbosity::Payload,
        }
    }
}

/// CSR in the shape a node submits for itself.
pub(crate) fn test_csr_pem() -> String {
    let keypair = KeyPair::generate_for(&rcgen::PKCS_ED25519).unwrap();

    let mut params = CertificateParams::default();
    params
        .distinguished_name
        .push(DnType::CommonName, "test-node");
    params.subject_alt_names = vec![SanType::DnsName(Ia5String::try_from("test-node").unwrap())];

    params.serialize_request(&keypair).unwrap().pem().unwrap()
}

pub(crate) fn verified_context(pki: &TestPki) -> CallContext {
    let peer = VerifiedPeer::new(
        "10.5.0.4:50000".parse().unwrap(),
        pki.client_credential().certificate().clone(),
    );

    CallContext::new(Peer::Verified(peer), None, "certificate".to_string())
}

pub(crate) fn server_csr_pem(organization: Option<&str>) -> String {
    let keypair = KeyPair::generate_for(&rcgen::PKCS_ED25519).unwrap();

    let mut params = CertificateParams::default();
    params
        .distinguished_name
        .push(DnType::CommonName, "test-server");
    if let Some(organization) = organization {
        params
            .distinguished_name
            .push(DnType::OrganizationName, organization);
    }
    params.subject_alt_names = vec![
        SanType::DnsName(Ia5String::try_from("test-server").unwrap()),
        SanType::IpAddress("10.5.0.4".parse().unwrap()),
    ];

    params.serialize_request(&keypair).unwrap().pem().unwrap()
}

async fn start_server(pki: &TestPki, port: u16, cancel: CancellationToken) -> Server {
    let mut config = pki.service_config("sesame");
    config.port = port;

    Server::start(Arc::new(config), cancel).await.unwrap()
}

fn token_metadata(token: &str) -> BTreeMap<String, String> {
    let mut metadata = BTreeMap::new();
    metadata.insert("token".to_string(), token.to_string());
    metadata
}

async fn connect(pki: &TestPki, port: u16, token: &str) -> RpcClient {
    RpcClient::connect(
        format!("127.0.0.1:{port}").parse().unwrap(),
        "localhost",
        Some(pki.client_credential()),
        SkipServerVerification::new(),
        Some(token_metadata(token)),
    )
    .await
    .unwrap()
}

/// Issued certificates carry exactly digitalSignature and serverAuth,
/// whatever the CSR asked for.
fn assert_issued_usages(certificate: &Certificate) {
    let (_, parsed) = X509Certificate::from_der(certificate.as_der()).unwrap();

    let key_usage = parsed.key_usage().unwrap().unwrap().value;
    assert!(key_usage.digital_signature());
    assert!(!key_usage.non_repudiation());
    assert!(!key_usage.key_encipherment());
    assert!(!key_usage.data_encipherment());
    assert!(!key_usage.key_agreement());
    assert!(!key_usage.key_cert_sign());
    assert!(!key_usage.crl_sign());

    let eku = parsed.extended_key_usage().unwrap().unwrap().value;
    assert!(eku.server_auth);
    assert!(!eku.any);
    assert!(!eku.client_auth);
    assert!(!eku.code_signing);
    assert!(!eku.email_protection);
    assert!(!eku.time_stamping);
    assert!(!eku.ocsp_signing);
    assert!(eku.other.is_empty());
}

#[test(tokio::test)]
async fn test_node_receives_signed_certificate() {
    let pki = TestPki::generate();
    let cancel = CancellationToken::new();

    let server = start_server(&pki, 1250, cancel.clone()).await;
    let client = connect(&pki, 1250, "sesame").await;

    let connection = client.upstream_connection().unwrap();

    let response = connection
        .dispatch(GetCertificate {
            csr: server_csr_pem(None).into_bytes(),
        })
        .await
        .unwrap();

    assert_eq!(response.ca, std::fs::read(pki.accepted_cas()).unwrap());

    let issued = Certificate::from_pem(&response.crt).unwrap();
    issued.verify_signed_by(&pki.ca_certificate()).unwrap();

    assert_eq!(issued.common_name(), Some("test-server"));
    assert!(issued.organization().is_empty());
    assert_eq!(issued.san_dns(), ["test-server"]);
    assert_eq!(issued.san_ips(), ["10.5.0.4".parse::<IpAddr>().unwrap()]);
    assert_eq!(
        issued.not_after() - issued.not_before(),
        time::Duration::days(365)
    );
    assert_issued_usages(&issued);

    client.close();
    server.close(Duration::from_secs(5)).await.unwrap();
}

#[test(tokio::test)]
async fn test_client_auth_organization_is_stripped() {
    let pki = TestPki::generate();
    let cancel = CancellationToken::new();

    let server = start_server(&pki, 1251, cancel.clone()).await;
    let client = connect(&pki, 1251, "sesame").await;

    let connection = client.upstream_connection().unwrap();

    let response = connection
        .dispatch(GetCertificate {
            csr: server_csr_pem(Some("client-auth")).into_bytes(),
        })
        .await
        .unwrap();

    let issued = Certificate::from_pem(&response.crt).unwrap();
    issued.verify_signed_by(&pki.ca_certificate()).unwrap();

    assert_eq!(issued.common_name(), Some("test-server"));
    assert!(issued.organization().is_empty());
    assert_eq!(issued.san_dns(), ["test-server"]);
    assert_issued_usages(&issued);

    client.close();
    server.close(Duration::from_secs(5)).await.unwrap();
}

#[test(tokio::test)]
async fn test_wrong_token_is_rejected() {
    let pki = TestPki::generate();
    let cancel = CancellationToken::new();

    let server = start_server(&pki, 1252, cancel.clone()).await;
    let client = connect(&pki, 1252, "wrong").await;

    let connection = client.upstream_connection().unwrap();

    let err = connection
        .dispatch(GetCertificate {
            csr: server_csr_pem(None).into_bytes(),
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
async fn test_connection_without_client_certificate_fails() {
    let pki = TestPki::generate();
    let cancel = CancellationToken::new();

    let server = start_server(&pki, 1253, cancel.clone()).await;

    // depending on timing the tls alert surfaces at connect or on the
    // first call
    let result = async {
        let client = RpcClient::connect(
            "127.0.0.1:1253".parse().unwrap(),
            "localhost",
            None,
            SkipServerVerification::new(),
            Some(token_metadata("sesame")),
        )
        .await?;

        let response = client
            .upstream_connection()?
            .dispatch(GetCertificate {
                csr: server_csr_pem(None).into_bytes(),
            })
            .await?;

        anyhow::Ok(response)
    }
    .await;

    assert!(result.is_err());

    server.close(Duration::from_secs(5)).await.unwrap();
}

#[test(tokio::test)]
async fn test_start_reports_missing_trust_material() {
    let pki = TestPki::generate();
    let mut config = pki.service_config("sesame");
    config.server_cert = pki.dir().join("missing.crt");

    let err = Server::start(Arc::new(config), CancellationToken::new())
        .await
        .unwrap_err();

    assert_eq!(err.to_string(), "failed to create TLS configuration");
}
