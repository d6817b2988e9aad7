use async_trait::async_trait;
use thiserror::Error;

use crate::rpc::session::Session;
use crate::status::Status;
use crate::transport::object_transport::{ReadObjectError, WriteObjectError};

#[derive(Debug, Error)]
pub enum DispatchError {
    /// The server answered the call with an error status.
    #[error("call failed with {0}")]
    Status(#[from] Status),
    #[error("failed to open stream: {0}")]
    Connection(#[from] quinn::ConnectionError),
    #[error("failed to read from session: {0}")]
    Read(#[from] ReadObjectError),
    #[error("failed to write to session: {0}")]
    Write(#[from] WriteObjectError),
}

/// Client side counterpart of a command handler. Implementations know the
/// method key and how to talk through an accepted session.
#[async_trait]
pub trait CommandDispatcher: Send + Sync {
    type Output: Send;

    fn key(&self) -> String;

    async fn dispatch(self, session: &mut Session) -> Result<Self::Output, DispatchError>;
}
