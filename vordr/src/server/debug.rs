use tokio_util::sync::CancellationToken;
use tracing::info;
use vordr_rpc::verbosity::Verbosity;

/// Placeholder for the debug surface.
///
/// Announces the configured port and parks until shutdown. No socket is
/// bound, the port stays reserved for a future debug listener.
pub(super) async fn run_debug_stub(port: u16, verbosity: Verbosity, cancel: CancellationToken) {
    if verbosity >= Verbosity::Connections {
        info!("debug server would start on port {port}");
    }

    cancel.cancelled().await;
}
