use std::time::Instant;

use async_trait::async_trait;
use tracing::info;

use crate::protocol::{RequestPayload, ResponsePayload};
use crate::rpc::session::CallContext;
use crate::stages::{CallStage, Next};
use crate::status::Status;
use crate::verbosity::Verbosity;

/// Logs every call with its outcome and latency.
///
/// The outcome line is written regardless of verbosity. Higher levels add
/// a line when the call starts and render the payloads themselves.
pub struct AuditStage {
    verbosity: Verbosity,
}

impl AuditStage {
    pub fn new(verbosity: Verbosity) -> Self {
        Self { verbosity }
    }
}

#[async_trait]
impl CallStage for AuditStage {
    async fn call(
        &self,
        context: &CallContext,
        request: RequestPayload,
        next: Next<'_>,
    ) -> Result<ResponsePayload, Status> {
        if self.verbosity >= Verbosity::Rpc {
            let keys = match context.metadata() {
                Some(metadata) => metadata
                    .keys()
                    .map(String::as_str)
                    .collect::<Vec<_>>()
                    .join(","),
                None => String::new(),
            };

            info!(
                "rpc {} from {} metadata=[{}]",
                context.method(),
                context.peer(),
                keys
            );
        }

        if self.verbosity >= Verbosity::Payload {
            info!("rpc {} request {}", context.method(), request.render());
        }

        let started = Instant::now();
        let result = next.run(context, request).await;
        let elapsed = started.elapsed();

        match &result {
            Ok(response) => {
                info!(
                    "rpc {} from {} ok in {:?}",
                    context.method(),
                    context.peer(),
                    elapsed
                );

                if self.verbosity >= Verbosity::Payload {
                    info!("rpc {} response {}", context.method(), response.render());
                }
            }
            Err(status) => {
                info!(
                    "rpc {} from {} failed with {} in {:?}",
                    context.method(),
                    context.peer(),
                    status,
                    elapsed
                );
            }
        }

        result
    }
}
