use std::time::Duration;
use std::{net::SocketAddr, sync::Arc};

use anyhow::{Context, Result, anyhow};
use quinn::EndpointConfig;
use quinn::crypto::rustls::QuicServerConfig;
use quinn::rustls::crypto::CryptoProvider;
use thiserror::Error;
use tokio::select;
use tokio::sync::Mutex;
use tokio::time::error::Elapsed;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info};
use vordr_pki::Credential;

use crate::rpc::command::handler::HandlerCollection;
use crate::rustls::{
    self,
    pki_types::{CertificateDer, PrivateKeyDer},
    server::danger::ClientCertVerifier,
};
use crate::verbosity::Verbosity;

use super::connection::direct_connection::DirectConnection;

pub mod config_builder;
use config_builder::RpcServerConfigBuilder;

/// Certificate chain and key the server presents during the handshake.
#[derive(Debug)]
pub struct ServerCredentials {
    pub cert_chain: Vec<CertificateDer<'static>>,
    pub key: PrivateKeyDer<'static>,
}

impl From<&Credential> for ServerCredentials {
    fn from(credential: &Credential) -> Self {
        Self {
            cert_chain: vec![CertificateDer::from(
                credential.certificate().as_der().to_owned(),
            )],
            key: credential.keypair().rustls_private_key(),
        }
    }
}

#[derive(Debug)]
pub struct RpcServer {
    config: RpcServerConfig,
    endpoint: quinn::Endpoint,
    tasks: TaskTracker,
    serve_error: Mutex<Option<ServeError>>,
}

#[derive(Debug)]
struct RpcServerConfig {
    credentials: ServerCredentials,
    client_cert_verifier: Arc<dyn ClientCertVerifier>,
    verbosity: Verbosity,
    cancellation_token: CancellationToken,
}

#[derive(Debug, Error)]
pub enum ServeError {
    #[error("server endpoint closed unexpectedly")]
    EndpointClosed,
}

#[derive(Debug, Error)]
pub enum CloseError {
    #[error("timed out waiting for open calls to finish")]
    DrainTimeout(#[source] Elapsed),
    #[error(transparent)]
    Serve(#[from] ServeError),
}

#[derive(Debug, Clone)]
pub struct Socket(Arc<dyn quinn::AsyncUdpSocket>);

impl RpcServer {
    pub fn build() -> RpcServerConfigBuilder<(), (), (), (), (), ()> {
        RpcServerConfigBuilder::new()
    }

    pub fn create_socket(addr: SocketAddr) -> std::io::Result<Socket> {
        let std_socket = std::net::UdpSocket::bind(addr)?;
        let runtime = quinn::default_runtime().ok_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::Other, "no async runtime found")
        })?;

        let socket = runtime.wrap_udp_socket(std_socket)?;

        Ok(Socket(socket))
    }

    fn run(
        socket: Socket,
        config: RpcServerConfig,
        commands: HandlerCollection,
        master_tracker: TaskTracker,
    ) -> Result<Arc<Self>> {
        let server = Self::create(socket, config, master_tracker)?;

        server.tasks.spawn(server.clone().serve(commands));

        let cancel_token = server.config.cancellation_token.clone();
        let tasks = server.tasks.clone();
        let endpoint = server.endpoint.clone();

        tokio::spawn(async move {
            // fallback in case the close method is never called
            cancel_token.cancelled().await;
            tasks.close();
            tasks.wait().await;

            endpoint.close(0u32.into(), b"graceful shutdown, goodbye");
        });

        Ok(server)
    }

    fn create(
        socket: Socket,
        config: RpcServerConfig,
        master_tracker: TaskTracker,
    ) -> Result<Arc<Self>> {
        if CryptoProvider::get_default().is_none() {
            let _ = quinn::rustls::crypto::ring::default_provider().install_default();
        }

        let endpoint =
            RpcServer::create_endpoint(socket, &config).context("failed to create rpc endpoint")?;

        let tasks = TaskTracker::new();
        let tasks2 = tasks.clone();

        master_tracker.spawn(async move {
            tasks2.wait().await;
        });

        Ok(Arc::new(Self {
            endpoint,
            config,
            tasks,
            serve_error: Mutex::new(None),
        }))
    }

    fn create_endpoint(socket: Socket, config: &RpcServerConfig) -> Result<quinn::Endpoint> {
        let crypto = rustls::ServerConfig::builder()
            .with_client_cert_verifier(config.client_cert_verifier.clone())
            .with_single_cert(
                config.credentials.cert_chain.clone(),
                config.credentials.key.clone_key(),
            )?;

        let server_config = quinn::ServerConfig::with_crypto(Arc::new(
            QuicServerConfig::try_from(crypto).map_err(|err| anyhow!(err))?,
        ));

        let runtime = quinn::default_runtime().ok_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::Other, "no async runtime found")
        })?;

        let endpoint = quinn::Endpoint::new_with_abstract_socket(
            EndpointConfig::default(),
            Some(server_config),
            socket.0,
            runtime,
        )?;

        Ok(endpoint)
    }

    async fn serve(self: Arc<Self>, commands: HandlerCollection) {
        debug!("starting rpc server");

        loop {
            select! {
                _ = self.config.cancellation_token.cancelled() => {
                    debug!("canceling rpc accept loop");
                    break;
                }
                incoming = self.endpoint.accept() => {
                    match incoming {
                        None => {
                            if !self.config.cancellation_token.is_cancelled() {
                                *self.serve_error.lock().await = Some(ServeError::EndpointClosed);
                            }
                            break;
                        },
                        Some(incoming) => {
                            let serve_connection_future = self.clone().serve_connection(incoming, commands.clone());
                            self.tasks.spawn(serve_connection_future);
                        }
                    }
                }
            }
        }
    }

    async fn serve_connection(
        self: Arc<Self>,
        incoming: quinn::Incoming,
        commands: HandlerCollection,
    ) {
        let remote = incoming.remote_address();

        if let Err(err) = self.serve_connection_inner(incoming, commands).await {
            error!("error serving connection from {remote}: {err:?}");
        }
    }

    async fn serve_connection_inner(
        self: Arc<Self>,
        incoming: quinn::Incoming,
        commands: HandlerCollection,
    ) -> Result<()> {
        let remote = incoming.remote_address();

        let conn = incoming
            .await
            .context("error when awaiting connection establishment")?;

        if self.config.verbosity >= Verbosity::Connections {
            info!("connection accepted from {remote}");
        }

        // the client certificate was already checked by the configured verifier
        let conn = DirectConnection::new(conn, None)?;

        conn.serve(commands, self.config.cancellation_token.child_token())
            .await;

        if self.config.verbosity >= Verbosity::Connections {
            info!("connection closed from {remote}");
        }

        Ok(())
    }

    /// Stops accepting connections and waits for open calls to finish.
    ///
    /// Errors recorded by the accept loop while the server was running
    /// surface here.
    pub async fn close(&self, timeout_duration: Duration) -> Result<(), CloseError> {
        self.config.cancellation_token.cancel();
        self.tasks.close();

        let result = timeout(timeout_duration, self.tasks.wait()).await;

        self.endpoint
            .close(0u32.into(), b"graceful shutdown, goodbye");

        result.map_err(CloseError::DrainTimeout)?;

        match self.serve_error.lock().await.take() {
            Some(err) => Err(CloseError::Serve(err)),
            None => Ok(()),
        }
    }
}
