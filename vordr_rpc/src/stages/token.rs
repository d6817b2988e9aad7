use async_trait::async_trait;
use subtle::ConstantTimeEq;
use tracing::info;

use crate::protocol::{RequestPayload, ResponsePayload};
use crate::rpc::session::CallContext;
use crate::stages::{CallStage, Next};
use crate::status::Status;
use crate::verbosity::Verbosity;

/// Rejects calls whose metadata does not carry the configured bearer token.
///
/// The comparison runs in constant time so the token cannot be probed
/// byte by byte. Failures are logged with the peer address, never with
/// the presented token.
pub struct TokenAuthStage {
    token: String,
    verbosity: Verbosity,
}

impl TokenAuthStage {
    pub fn new(token: String, verbosity: Verbosity) -> Self {
        Self { token, verbosity }
    }

    fn reject(&self, context: &CallContext, reason: &'static str) -> Status {
        if self.verbosity >= Verbosity::Rpc {
            info!(
                "auth failed for {} from {}: {reason}",
                context.method(),
                context.peer()
            );
        }

        Status::unauthenticated(reason)
    }
}

#[async_trait]
impl CallStage for TokenAuthStage {
    async fn call(
        &self,
        context: &CallContext,
        request: RequestPayload,
        next: Next<'_>,
    ) -> Result<ResponsePayload, Status> {
        let metadata = match context.metadata() {
            Some(metadata) => metadata,
            None => {
                info!(
                    "auth failed for {} from {}: missing metadata",
                    context.method(),
                    context.peer()
                );
                return Err(Status::unauthenticated("missing metadata"));
            }
        };

        let provided = match metadata.get("token") {
            Some(provided) => provided,
            None => return Err(self.reject(context, "missing token header")),
        };

        if !bool::from(provided.as_bytes().ct_eq(self.token.as_bytes())) {
            return Err(self.reject(context, "invalid token"));
        }

        next.run(context, request).await
    }
}
