use std::collections::BTreeMap;

use anyhow::{anyhow, Result};
use quinn::{rustls::pki_types::CertificateDer, VarInt};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};
use vordr_pki::Certificate;

use crate::rpc::command::dispatcher::{CommandDispatcher, DispatchError};
use crate::rpc::command::handler::HandlerCollection;
use crate::rpc::peer::{Peer, VerifiedPeer};
use crate::rpc::session::Session;

/// A single quic connection, usable from both ends.
///
/// The peer is fixed when the connection is established. A client which
/// presented a certificate during the handshake stays [`Peer::Verified`]
/// for every call on this connection.
#[derive(Debug, Clone)]
pub struct DirectConnection {
    conn: quinn::Connection,
    peer: Peer,
    metadata: Option<BTreeMap<String, String>>,
}

impl DirectConnection {
    pub(crate) fn new(
        conn: quinn::Connection,
        metadata: Option<BTreeMap<String, String>>,
    ) -> Result<Self> {
        let peer_cert = match conn.peer_identity() {
            None => None,
            Some(identity) => {
                Some(
                    identity
                        .downcast::<Vec<CertificateDer>>()
                        .map_err(|uncasted| {
                            anyhow!(
                                "failed to downcast peer identity of actual type {}",
                                std::any::type_name_of_val(&*uncasted)
                            )
                        })?,
                )
            }
        };

        let peer = match peer_cert {
            None => Peer::Anonymous,
            Some(der_list) => {
                let der = der_list
                    .first()
                    .ok_or_else(|| anyhow!("peer identity present but certificate list empty"))?;
                let certificate = Certificate::from_der(der.to_vec())?;
                Peer::Verified(VerifiedPeer::new(conn.remote_address(), certificate))
            }
        };

        debug!("connection with peer: {peer}");

        Ok(DirectConnection {
            conn,
            peer,
            metadata,
        })
    }

    pub fn peer(&self) -> &Peer {
        &self.peer
    }

    pub async fn dispatch<D: CommandDispatcher>(
        &self,
        dispatcher: D,
    ) -> Result<D::Output, DispatchError> {
        let (send, recv) = self.conn.open_bi().await?;

        let session = Session::new(Box::new(recv), Box::new(send), self.peer.clone());

        session.dispatch(self.metadata.clone(), dispatcher).await
    }

    /// Accepts streams and serves one call per stream until the connection
    /// closes or the token fires. Open calls are drained before returning.
    pub(crate) async fn serve(&self, commands: HandlerCollection, cancel: CancellationToken) {
        let mut open_sessions = JoinSet::<()>::new();

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                stream = self.conn.accept_bi() => match stream {
                    Ok((send, recv)) => {
                        let session = Session::new(Box::new(recv), Box::new(send), self.peer.clone());

                        let commands = commands.clone();
                        open_sessions.spawn(async move {
                            if let Err(err) = session.serve(&commands).await {
                                error!("error while serving call: {err:?}");
                            }
                        });
                    }
                    Err(_) => break,
                },
            }
        }

        while open_sessions.join_next().await.is_some() {}
    }

    pub fn close(&self, error_code: VarInt, reason: &[u8]) {
        self.conn.close(error_code, reason)
    }
}
