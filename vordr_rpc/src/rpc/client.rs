use std::{collections::BTreeMap, net::SocketAddr, sync::Arc, time::Duration};

use anyhow::{Context, Result, anyhow};
use quinn::{TransportConfig, VarInt, crypto::rustls::QuicClientConfig};
use vordr_pki::Credential;

use crate::rpc::connection::direct_connection::DirectConnection;
use crate::rustls;

/// Connects to an rpc server and hands out connections to it.
///
/// Metadata given here is attached to every call dispatched through
/// [`RpcClient::upstream_connection`].
pub struct RpcClient {
    connection: quinn::Connection,
    metadata: Option<BTreeMap<String, String>>,
}

impl RpcClient {
    pub async fn connect(
        address: SocketAddr,
        host: &str,
        identity: Option<&Credential>,
        verifier: Arc<dyn rustls::client::danger::ServerCertVerifier>,
        metadata: Option<BTreeMap<String, String>>,
    ) -> Result<RpcClient> {
        let mut endpoint = quinn::Endpoint::client("0.0.0.0:0".parse()?)?;

        let builder = rustls::ClientConfig::builder()
            .dangerous()
            .with_custom_certificate_verifier(verifier);

        let rustls_conf = match identity {
            Some(identity) => builder.with_client_auth_cert(
                vec![rustls::pki_types::CertificateDer::from(
                    identity.certificate().as_der().to_owned(),
                )],
                identity.keypair().rustls_private_key(),
            )?,
            None => builder.with_no_client_auth(),
        };

        let mut transport_config = TransportConfig::default();
        transport_config.max_idle_timeout(Some(VarInt::from_u32(10_000).into()));
        transport_config.keep_alive_interval(Some(Duration::from_secs(5)));

        let mut client_config =
            quinn::ClientConfig::new(Arc::new(QuicClientConfig::try_from(rustls_conf).map_err(
                |err| anyhow!("failed to build quic client config: {err}"),
            )?));
        client_config.transport_config(Arc::new(transport_config));

        endpoint.set_default_client_config(client_config);

        let connection = endpoint
            .connect(address, host)?
            .await
            .context("failed to establish connection")?;

        Ok(Self {
            connection,
            metadata,
        })
    }

    pub fn upstream_connection(&self) -> Result<DirectConnection> {
        DirectConnection::new(self.connection.clone(), self.metadata.clone())
    }

    pub fn close(&self) {
        self.connection.close(0u32.into(), b"");
    }
}
