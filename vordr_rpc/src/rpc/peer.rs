use std::fmt::Display;
use std::net::SocketAddr;

use vordr_pki::Certificate;

/// Who is on the other end of a connection.
#[derive(Debug, Clone)]
pub enum Peer {
    /// The handshake presented no client certificate.
    Anonymous,
    /// The handshake presented a certificate which the configured client
    /// verifier accepted.
    Verified(VerifiedPeer),
}

#[derive(Debug, Clone)]
pub struct VerifiedPeer {
    address: SocketAddr,
    certificate: Certificate,
}

impl VerifiedPeer {
    pub fn new(address: SocketAddr, certificate: Certificate) -> Self {
        Self {
            address,
            certificate,
        }
    }

    pub fn address(&self) -> SocketAddr {
        self.address
    }

    pub fn certificate(&self) -> &Certificate {
        &self.certificate
    }
}

impl Peer {
    pub fn verified(&self) -> Option<&VerifiedPeer> {
        match self {
            Peer::Anonymous => None,
            Peer::Verified(peer) => Some(peer),
        }
    }
}

impl Display for Peer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Peer::Anonymous => write!(f, "anonymous"),
            Peer::Verified(peer) => write!(f, "{}", peer.address),
        }
    }
}
