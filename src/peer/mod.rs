use std::net::SocketAddrV4;

mod address;
mod connect;
mod error;
mod handshake;
mod state;

use crate::message::{InfoHash, MessageCodec, PeerId};
pub use error::PeerError;
pub use state::PeerState;
use tokio::net::TcpStream;
use tokio_util::codec::Framed;

#[derive(Debug, Clone, PartialEq, Default)]
pub struct PeerAddresses(pub Vec<SocketAddrV4>);

// To make it more readable
impl PeerAddresses {
    pub fn iter(&self) -> std::slice::Iter<'_, SocketAddrV4> {
        self.0.iter()
    }
}

/// One remote peer and, once connected, the framed TCP stream to it.
#[derive(Debug)]
pub struct Peer {
    addr: SocketAddrV4,
    state: PeerState,
    info_hash: InfoHash,
    peer_id: PeerId,
    remote_id: Option<PeerId>,
    tcp_stream: Option<Framed<TcpStream, MessageCodec>>,
}

impl Peer {
    pub fn new(address: SocketAddrV4, info_hash: InfoHash, peer_id: PeerId) -> Self {
        Self {
            addr: address,
            state: PeerState::new(),
            info_hash,
            peer_id,
            remote_id: None,
            tcp_stream: None,
        }
    }

    pub fn address(&self) -> SocketAddrV4 {
        self.addr
    }

    /// Peer id the remote sent in its handshake.
    pub fn remote_id(&self) -> Option<PeerId> {
        self.remote_id
    }

    pub fn state(&self) -> &PeerState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut PeerState {
        &mut self.state
    }

    pub fn is_connected(&self) -> bool {
        self.tcp_stream.is_some()
    }
}
