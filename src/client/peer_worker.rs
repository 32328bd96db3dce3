use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::message::{Bitfield, InfoHash, PeerId, PeerMessage};
use crate::peer::{Peer, PeerError};

use super::config::ClientConfig;
use super::state::SharedState;

/// One slot of the connection pool.
///
/// Takes an address from the queue, downloads from that peer until the connection ends,
/// then goes back for the next address. Runs until the token is cancelled.
pub struct PeerWorker {
    slot: usize,
    info_hash: InfoHash,
    peer_id: PeerId,
    state: Arc<SharedState>,
    config: ClientConfig,
    cancel: CancellationToken,
}

impl PeerWorker {
    pub fn new(
        slot: usize,
        info_hash: InfoHash,
        peer_id: PeerId,
        state: Arc<SharedState>,
        config: ClientConfig,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            slot,
            info_hash,
            peer_id,
            state,
            config,
            cancel,
        }
    }

    pub async fn run(self) {
        loop {
            let addr = tokio::select! {
                _ = self.cancel.cancelled() => break,
                addr = self.state.peers.acquire() => addr,
            };

            let mut peer = Peer::new(addr, self.info_hash, self.peer_id);
            let result = tokio::select! {
                _ = self.cancel.cancelled() => Ok(()),
                result = self.serve(&mut peer) => result,
            };

            peer.close().await;
            if let Some(remote_id) = peer.remote_id() {
                self.state.piece_manager.lock().await.remove_peer(&remote_id);
            }
            self.state.peers.task_done();

            match result {
                Ok(()) => debug!(slot = self.slot, peer = %addr, "Connection closed"),
                Err(e) if e.is_protocol() => {
                    warn!(slot = self.slot, peer = %addr, "Protocol error: {}", e)
                }
                Err(e) if e.is_transport() => {
                    info!(slot = self.slot, peer = %addr, "Unable to talk to peer: {}", e)
                }
                Err(e) => error!(slot = self.slot, peer = %addr, "Unexpected error: {}", e),
            }

            if self.cancel.is_cancelled() {
                break;
            }
        }

        debug!(slot = self.slot, "Worker stopped");
    }

    #[instrument(skip_all, fields(slot = self.slot, peer = %peer.address()))]
    async fn serve(&self, peer: &mut Peer) -> Result<(), PeerError> {
        peer.connect(&self.config).await?;
        let remote_id = peer.remote_id().ok_or(PeerError::NotConnected)?;

        peer.send_interested().await?;

        loop {
            let Some(message) = peer.receive_message(self.config.read_timeout).await? else {
                return Ok(());
            };

            self.handle_message(peer, &remote_id, message).await;

            if peer.state().can_request() {
                self.request_next(peer, &remote_id).await?;
            }
        }
    }

    async fn handle_message(&self, peer: &mut Peer, remote_id: &PeerId, message: PeerMessage) {
        match message {
            PeerMessage::Bitfield(bytes) => {
                let mut pm = self.state.piece_manager.lock().await;
                pm.add_peer(*remote_id, Bitfield::from_bytes(bytes));
            }
            PeerMessage::Have(index) => {
                let mut pm = self.state.piece_manager.lock().await;
                pm.update_peer(remote_id, index);
            }
            PeerMessage::Interested => peer.state_mut().set_remote_interested(true),
            PeerMessage::NotInterested => peer.state_mut().set_remote_interested(false),
            PeerMessage::Choke => {
                debug!("Choked");
                peer.state_mut().choke();
            }
            PeerMessage::Unchoke => {
                debug!("Unchoked");
                peer.state_mut().unchoke();
            }
            PeerMessage::Piece {
                index,
                begin,
                block,
            } => {
                peer.state_mut().set_pending_request(false);
                self.state
                    .block_retrieved(remote_id, index, begin, block)
                    .await;
            }
            PeerMessage::Request { index, begin, .. } | PeerMessage::Cancel { index, begin, .. } => {
                debug!(piece = index, offset = begin, "Ignoring upload traffic");
            }
            PeerMessage::KeepAlive => {}
        }
    }

    async fn request_next(&self, peer: &mut Peer, remote_id: &PeerId) -> Result<(), PeerError> {
        let Some(block) = self.state.next_request(remote_id).await else {
            return Ok(());
        };

        debug!(
            piece = block.piece_index,
            offset = block.offset,
            length = block.length,
            "Requesting block"
        );
        peer.request_block(block).await?;
        peer.state_mut().set_pending_request(true);

        Ok(())
    }
}
