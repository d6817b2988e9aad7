use std::sync::Arc;

use anyhow::Result;
use quinn::rustls::server::danger::ClientCertVerifier;
use tokio_util::{sync::CancellationToken, task::TaskTracker};

use crate::rpc::command::handler::HandlerCollection;
use crate::verbosity::Verbosity;

use super::{RpcServer, RpcServerConfig, ServerCredentials, Socket};

/// Builder which only allows starting the server once every part of the
/// configuration has been provided.
pub struct RpcServerConfigBuilder<A, B, C, D, E, F> {
    credentials: A,
    client_cert_verifier: B,
    commands: C,
    verbosity: D,
    cancellation_token: E,
    task_tracker: F,
}

impl RpcServerConfigBuilder<(), (), (), (), (), ()> {
    pub fn new() -> RpcServerConfigBuilder<(), (), (), (), (), ()> {
        RpcServerConfigBuilder {
            credentials: (),
            client_cert_verifier: (),
            commands: (),
            verbosity: (),
            cancellation_token: (),
            task_tracker: (),
        }
    }
}

impl<A, B, C, D, E, F> RpcServerConfigBuilder<A, B, C, D, E, F> {
    pub fn credentials(
        self,
        credentials: ServerCredentials,
    ) -> RpcServerConfigBuilder<ServerCredentials, B, C, D, E, F> {
        RpcServerConfigBuilder {
            credentials,
            client_cert_verifier: self.client_cert_verifier,
            commands: self.commands,
            verbosity: self.verbosity,
            cancellation_token: self.cancellation_token,
            task_tracker: self.task_tracker,
        }
    }

    pub fn client_cert_verifier(
        self,
        client_cert_verifier: Arc<dyn ClientCertVerifier>,
    ) -> RpcServerConfigBuilder<A, Arc<dyn ClientCertVerifier>, C, D, E, F> {
        RpcServerConfigBuilder {
            credentials: self.credentials,
            client_cert_verifier,
            commands: self.commands,
            verbosity: self.verbosity,
            cancellation_token: self.cancellation_token,
            task_tracker: self.task_tracker,
        }
    }

    pub fn commands(
        self,
        commands: HandlerCollection,
    ) -> RpcServerConfigBuilder<A, B, HandlerCollection, D, E, F> {
        RpcServerConfigBuilder {
            credentials: self.credentials,
            client_cert_verifier: self.client_cert_verifier,
            commands,
            verbosity: self.verbosity,
            cancellation_token: self.cancellation_token,
            task_tracker: self.task_tracker,
        }
    }

    pub fn verbosity(
        self,
        verbosity: Verbosity,
    ) -> RpcServerConfigBuilder<A, B, C, Verbosity, E, F> {
        RpcServerConfigBuilder {
            credentials: self.credentials,
            client_cert_verifier: self.client_cert_verifier,
            commands: self.commands,
            verbosity,
            cancellation_token: self.cancellation_token,
            task_tracker: self.task_tracker,
        }
    }

    pub fn cancellation_token(
        self,
        cancellation_token: CancellationToken,
    ) -> RpcServerConfigBuilder<A, B, C, D, CancellationToken, F> {
        RpcServerConfigBuilder {
            credentials: self.credentials,
            client_cert_verifier: self.client_cert_verifier,
            commands: self.commands,
            verbosity: self.verbosity,
            cancellation_token,
            task_tracker: self.task_tracker,
        }
    }

    pub fn task_tracker(
        self,
        task_tracker: TaskTracker,
    ) -> RpcServerConfigBuilder<A, B, C, D, E, TaskTracker> {
        RpcServerConfigBuilder {
            credentials: self.credentials,
            client_cert_verifier: self.client_cert_verifier,
            commands: self.commands,
            verbosity: self.verbosity,
            cancellation_token: self.cancellation_token,
            task_tracker,
        }
    }
}

impl
    RpcServerConfigBuilder<
        ServerCredentials,
        Arc<dyn ClientCertVerifier>,
        HandlerCollection,
        Verbosity,
        CancellationToken,
        TaskTracker,
    >
{
    pub fn start_server(self, socket: Socket) -> Result<Arc<RpcServer>> {
        let config = RpcServerConfig {
            credentials: self.credentials,
            client_cert_verifier: self.client_cert_verifier,
            verbosity: self.verbosity,
            cancellation_token: self.cancellation_token,
        };

        RpcServer::run(socket, config, self.commands, self.task_tracker)
    }
}
