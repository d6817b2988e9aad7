use std::collections::BTreeMap;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use tracing::debug;

use crate::protocol::RequestPayload;
use crate::rpc::command::dispatcher::{CommandDispatcher, DispatchError};
use crate::rpc::command::handler::HandlerCollection;
use crate::rpc::peer::Peer;
use crate::status::Status;
use crate::transport::object_transport::{
    ObjectReader, ObjectWriter, ReadObjectError, WriteObjectError,
};
use crate::transport::session_transport::{SessionTransportReader, SessionTransportWriter};

/// First object on every stream, names the method and carries the call
/// metadata.
#[derive(Serialize, Deserialize)]
pub(crate) struct CallHeader {
    pub method: String,
    pub metadata: Option<BTreeMap<String, String>>,
}

#[derive(Serialize, Deserialize)]
pub(crate) enum CallResponseHeader {
    Accept,
    Decline(Status),
}

/// A single bidirectional stream carrying one call.
pub struct Session {
    read: ObjectReader,
    write: ObjectWriter,
    peer: Peer,
}

/// Everything about a call except the payload itself, handed to stages
/// and handlers alongside the request.
#[derive(Debug, Clone)]
pub struct CallContext {
    peer: Peer,
    metadata: Option<BTreeMap<String, String>>,
    method: String,
}

impl CallContext {
    pub fn new(peer: Peer, metadata: Option<BTreeMap<String, String>>, method: String) -> Self {
        Self {
            peer,
            metadata,
            method,
        }
    }

    pub fn peer(&self) -> &Peer {
        &self.peer
    }

    pub fn metadata(&self) -> Option<&BTreeMap<String, String>> {
        self.metadata.as_ref()
    }

    pub fn method(&self) -> &str {
        &self.method
    }
}

impl Session {
    pub(crate) fn new(
        read: Box<dyn SessionTransportReader>,
        write: Box<dyn SessionTransportWriter>,
        peer: Peer,
    ) -> Self {
        Self {
            read: ObjectReader::new(read),
            write: ObjectWriter::new(write),
            peer,
        }
    }

    /// Server side of a session: read the header, run the call through
    /// the stage chain and the handler, write the result back.
    pub(crate) async fn serve(mut self, commands: &HandlerCollection) -> Result<()> {
        let header: CallHeader = self
            .read
            .read_object()
            .await
            .context("failed to read call header")?;

        debug!("session requested method: {}", header.method);

        let Some(handler) = commands.get(&header.method).await else {
            self.write
                .write_object(&CallResponseHeader::Decline(Status::unimplemented(
                    format!("unknown method {}", header.method),
                )))
                .await
                .context("failed to decline session")?;

            self.shutdown().await;
            return Ok(());
        };

        self.write
            .write_object(&CallResponseHeader::Accept)
            .await
            .context("failed to accept session")?;

        let request: RequestPayload = self
            .read
            .read_object()
            .await
            .context("failed to read request payload")?;

        let context = CallContext::new(self.peer.clone(), header.metadata, header.method);

        let result = commands
            .stages()
            .run(&context, request, handler.as_ref())
            .await;

        self.write
            .write_object(&result)
            .await
            .context("failed to write call result")?;

        self.shutdown().await;

        Ok(())
    }

    /// Client side of a session: request the method, then hand the open
    /// session to the dispatcher.
    pub(crate) async fn dispatch<D: CommandDispatcher>(
        mut self,
        metadata: Option<BTreeMap<String, String>>,
        dispatcher: D,
    ) -> Result<D::Output, DispatchError> {
        self.write
            .write_object(&CallHeader {
                method: dispatcher.key(),
                metadata,
            })
            .await?;

        let response: CallResponseHeader = self.read.read_object().await?;

        match response {
            CallResponseHeader::Decline(status) => Err(DispatchError::Status(status)),
            CallResponseHeader::Accept => {
                let output = dispatcher.dispatch(&mut self).await?;
                self.shutdown().await;
                Ok(output)
            }
        }
    }

    pub async fn read_object<W: DeserializeOwned>(&mut self) -> Result<W, ReadObjectError> {
        self.read.read_object().await
    }

    pub async fn write_object<W: Serialize>(&mut self, object: &W) -> Result<(), WriteObjectError> {
        self.write.write_object(object).await
    }

    async fn shutdown(&mut self) {
        if let Err(err) = self.write.shutdown().await {
            debug!("error shutting down session stream: {err}");
        }
    }
}
