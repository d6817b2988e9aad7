use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::info;
use vordr_rpc::rpc::command::handler::HandlerCollection;
use vordr_rpc::rpc::server::{CloseError, RpcServer};
use vordr_rpc::stages::StageChain;
use vordr_rpc::stages::audit::AuditStage;
use vordr_rpc::stages::token::TokenAuthStage;

use crate::config::ServiceConfig;
use crate::issuer::CertificateHandler;
use crate::trust;

mod debug;

/// The assembled service: rpc server, call stages, the certificate
/// handler and the debug stub.
#[derive(Debug)]
pub struct Server {
    rpc: Arc<RpcServer>,
    tasks: TaskTracker,
}

impl Server {
    /// Loads the transport trust, binds the listen socket and starts
    /// serving certificate requests.
    ///
    /// The stage order is fixed: every call is audited first, then
    /// authenticated, then handled.
    pub async fn start(config: Arc<ServiceConfig>, cancel: CancellationToken) -> Result<Server> {
        let credentials = trust::load_server_credentials(&config)
            .context("failed to create TLS configuration")?;
        let client_verifier =
            trust::load_client_verifier(&config).context("failed to create TLS configuration")?;

        let stages = StageChain::new(vec![
            Arc::new(AuditStage::new(config.verbosity)),
            Arc::new(TokenAuthStage::new(
                config.auth_token.clone(),
                config.verbosity,
            )),
        ]);

        let commands = HandlerCollection::new(stages);
        commands
            .chain()
            .await
            .add(CertificateHandler::new(config.clone()));

        let address = config.listen_address();
        let socket = RpcServer::create_socket(address)
            .with_context(|| format!("failed to listen on {address}"))?;

        let tasks = TaskTracker::new();

        let rpc = RpcServer::build()
            .credentials(credentials)
            .client_cert_verifier(client_verifier)
            .commands(commands)
            .verbosity(config.verbosity)
            .cancellation_token(cancel.clone())
            .task_tracker(tasks.clone())
            .start_server(socket)?;

        tasks.spawn(debug::run_debug_stub(
            config.debug_port,
            config.verbosity,
            cancel,
        ));

        info!("starting vordr on port {}", config.port);

        Ok(Self { rpc, tasks })
    }

    /// Stops accepting connections and drains in-flight calls for at most
    /// the given duration.
    ///
    /// An error the serve loop recorded while running surfaces here as
    /// the final outcome.
    pub async fn close(&self, drain: Duration) -> Result<(), CloseError> {
        let result = self.rpc.close(drain).await;

        // Closing the endpoint above unblocks everything still running.
        self.tasks.close();
        self.tasks.wait().await;

        result
    }
}
