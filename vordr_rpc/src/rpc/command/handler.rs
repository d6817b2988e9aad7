use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{RwLock, RwLockWriteGuard};

use crate::protocol::{RequestPayload, ResponsePayload};
use crate::rpc::session::CallContext;
use crate::stages::StageChain;
use crate::status::Status;

/// Server side logic of a single method.
#[async_trait]
pub trait CommandHandler: Send + Sync {
    fn key(&self) -> String;

    async fn handle(
        &self,
        context: &CallContext,
        request: RequestPayload,
    ) -> Result<ResponsePayload, Status>;
}

/// The methods a server exposes together with the stage chain every call
/// runs through before reaching its handler.
pub struct HandlerCollection {
    commands: Arc<RwLock<HashMap<String, Arc<dyn CommandHandler>>>>,
    stages: StageChain,
}

impl Debug for HandlerCollection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerCollection").finish()
    }
}

impl Clone for HandlerCollection {
    fn clone(&self) -> Self {
        Self {
            commands: self.commands.clone(),
            stages: self.stages.clone(),
        }
    }
}

impl HandlerCollection {
    pub fn new(stages: StageChain) -> Self {
        Self {
            commands: Arc::new(RwLock::new(HashMap::new())),
            stages,
        }
    }

    pub async fn chain(&self) -> ChainCommandAdder<'_> {
        let lock = self.commands.write().await;

        ChainCommandAdder { lock }
    }

    pub(crate) async fn get(&self, key: &str) -> Option<Arc<dyn CommandHandler>> {
        self.commands.read().await.get(key).cloned()
    }

    pub(crate) fn stages(&self) -> &StageChain {
        &self.stages
    }
}

/// Helper to register multiple handlers with method chaining.
pub struct ChainCommandAdder<'a> {
    lock: RwLockWriteGuard<'a, HashMap<String, Arc<dyn CommandHandler>>>,
}

impl ChainCommandAdder<'_> {
    pub fn add<T>(&mut self, command: T) -> &mut Self
    where
        T: CommandHandler + 'static,
    {
        self.lock.insert(command.key(), Arc::new(command));

        self
    }
}
