use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;
use thiserror::Error;
use vordr_rpc::verbosity::Verbosity;

/// Command line surface of the daemon.
#[derive(Debug, Parser)]
#[clap(name = "vordr", version)]
pub struct Args {
    /// Port to listen on
    #[clap(long, default_value_t = 50001)]
    pub port: u16,

    /// Path to the CA certificate issued certificates are signed with
    #[clap(long)]
    pub ca_cert: PathBuf,

    /// Path to the CA key issued certificates are signed with
    #[clap(long)]
    pub ca_key: PathBuf,

    /// Path to the certificate presented on the listen socket
    #[clap(long)]
    pub server_cert: PathBuf,

    /// Path to the key belonging to the listen socket certificate
    #[clap(long)]
    pub server_key: PathBuf,

    /// Path to the CA bundle client certificates are checked against
    #[clap(long)]
    pub accepted_cas: PathBuf,

    /// Shared token clients have to present on every call
    #[clap(long)]
    pub auth_token: String,

    /// Port announced for debugging, no listener is bound there
    #[clap(long, default_value_t = 9983)]
    pub debug_port: u16,

    /// Log verbosity, 0 to 3
    #[clap(short, default_value_t = 2)]
    pub verbosity: u8,
}

/// Everything the service needs to run. Built once in main and handed
/// around by reference, nothing else reads flags or global state.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub port: u16,
    pub ca_cert: PathBuf,
    pub ca_key: PathBuf,
    pub server_cert: PathBuf,
    pub server_key: PathBuf,
    pub accepted_cas: PathBuf,
    pub auth_token: String,
    pub debug_port: u16,
    pub verbosity: Verbosity,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("auth token must not be empty")]
    EmptyToken,
}

impl ServiceConfig {
    pub fn from_args(args: Args) -> Result<Self, ConfigError> {
        if args.auth_token.is_empty() {
            return Err(ConfigError::EmptyToken);
        }

        Ok(Self {
            port: args.port,
            ca_cert: args.ca_cert,
            ca_key: args.ca_key,
            server_cert: args.server_cert,
            server_key: args.server_key,
            accepted_cas: args.accepted_cas,
            auth_token: args.auth_token,
            debug_port: args.debug_port,
            verbosity: Verbosity::from_level(args.verbosity),
        })
    }

    pub fn listen_address(&self) -> SocketAddr {
        SocketAddr::from(([0, 0, 0, 0], self.port))
    }
}
