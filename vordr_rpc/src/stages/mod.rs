use std::sync::Arc;

use async_trait::async_trait;

use crate::protocol::{RequestPayload, ResponsePayload};
use crate::rpc::command::handler::CommandHandler;
use crate::rpc::session::CallContext;
use crate::status::Status;

pub mod audit;
pub mod token;

/// A processing step every call passes through before its handler.
///
/// A stage either rejects the call by returning a status, or continues it
/// by running [`Next`].
#[async_trait]
pub trait CallStage: Send + Sync {
    async fn call(
        &self,
        context: &CallContext,
        request: RequestPayload,
        next: Next<'_>,
    ) -> Result<ResponsePayload, Status>;
}

/// The stages of a server in the order calls run through them. Composed
/// once at startup, shared by every call.
#[derive(Clone)]
pub struct StageChain {
    stages: Arc<[Arc<dyn CallStage>]>,
}

impl StageChain {
    pub fn new(stages: Vec<Arc<dyn CallStage>>) -> Self {
        Self {
            stages: stages.into(),
        }
    }

    pub(crate) async fn run(
        &self,
        context: &CallContext,
        request: RequestPayload,
        handler: &dyn CommandHandler,
    ) -> Result<ResponsePayload, Status> {
        Next {
            stages: &self.stages,
            handler,
        }
        .run(context, request)
        .await
    }
}

/// Continuation handed to a stage. Running it executes the remaining
/// stages and finally the handler itself.
pub struct Next<'a> {
    stages: &'a [Arc<dyn CallStage>],
    handler: &'a dyn CommandHandler,
}

impl Next<'_> {
    pub async fn run(
        self,
        context: &CallContext,
        request: RequestPayload,
    ) -> Result<ResponsePayload, Status> {
        match self.stages.split_first() {
            Some((stage, rest)) => {
                stage
                    .call(
                        context,
                        request,
                        Next {
                            stages: rest,
                            handler: self.handler,
                        },
                    )
                    .await
            }
            None => self.handler.handle(context, request).await,
        }
    }
}
