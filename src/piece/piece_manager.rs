use std::collections::HashMap;
use std::time::{Duration, Instant};

use tracing::{debug, error, info, warn};

use super::{BlockInfo, Piece, PieceLayout};
use crate::file::FileManager;
use crate::message::{Bitfield, PeerId, PieceIndex};

/// How long a block request may stay unanswered before another peer is asked for it.
pub const DEFAULT_MAX_PENDING_TIME: Duration = Duration::from_millis(300_000);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PieceState {
    Missing,
    Ongoing,
    Have,
}

// Block issued to some peer, kept so it can be re-issued once it goes stale
#[derive(Debug, Clone, Copy)]
struct PendingRequest {
    block: BlockInfo,
    issued: Instant,
}

/// Decides which block to request from which peer and assembles what comes back.
///
/// Every piece index sits in exactly one of `missing`, `ongoing` or `have`. Pieces move
/// `missing -> ongoing` when first selected and `ongoing -> have` once their hash checks
/// out; a corrupt piece is reset in place and stays `ongoing`.
pub struct PieceManager {
    pieces: Vec<Piece>,
    missing: Vec<PieceIndex>,
    ongoing: Vec<PieceIndex>,
    have: Vec<PieceIndex>,
    pending_blocks: Vec<PendingRequest>,
    peers: HashMap<PeerId, Bitfield>,
    max_pending_time: Duration,
    piece_length: u32,
    total_size: u64,
    storage: Box<dyn FileManager>,
}

impl PieceManager {
    pub fn new(layout: PieceLayout, storage: Box<dyn FileManager>) -> Self {
        let pieces: Vec<Piece> = layout
            .hashes
            .iter()
            .enumerate()
            .map(|(index, hash)| {
                let index = index as PieceIndex;
                Piece::new(index, layout.piece_size(index), *hash)
            })
            .collect();

        Self {
            missing: (0..pieces.len() as PieceIndex).collect(),
            pieces,
            ongoing: Vec::new(),
            have: Vec::new(),
            pending_blocks: Vec::new(),
            peers: HashMap::new(),
            max_pending_time: DEFAULT_MAX_PENDING_TIME,
            piece_length: layout.piece_length,
            total_size: layout.total_size,
            storage,
        }
    }

    pub fn with_max_pending_time(mut self, max_pending_time: Duration) -> Self {
        self.max_pending_time = max_pending_time;
        self
    }

    /// Registers the pieces a peer announced in its bitfield, replacing any earlier entry.
    pub fn add_peer(&mut self, peer_id: PeerId, bitfield: Bitfield) {
        self.peers.insert(peer_id, bitfield);
    }

    /// Records a `Have` from a peer. Unknown peers and indexes past the last piece are
    /// ignored.
    pub fn update_peer(&mut self, peer_id: &PeerId, index: PieceIndex) {
        if index as usize >= self.pieces.len() {
            warn!(
                peer = %hex::encode(peer_id),
                piece = index,
                "Ignoring Have for a piece this torrent does not have"
            );
            return;
        }
        if let Some(bitfield) = self.peers.get_mut(peer_id) {
            bitfield.set_piece(index as usize);
        }
    }

    /// Forgets a disconnected peer. Requests issued on its behalf are left to expire.
    pub fn remove_peer(&mut self, peer_id: &PeerId) {
        self.peers.remove(peer_id);
    }

    /// Picks the next block to request from `peer_id`.
    ///
    /// In order: a stale pending request the peer can serve, the next missing block of
    /// an ongoing piece, or the first block of the rarest missing piece the peer has.
    pub fn next_request(&mut self, peer_id: &PeerId) -> Option<BlockInfo> {
        let Self {
            pieces,
            missing,
            ongoing,
            pending_blocks,
            peers,
            max_pending_time,
            ..
        } = self;
        let bitfield = peers.get(peer_id)?;

        if let Some(block) = expired_request(pending_blocks, bitfield, *max_pending_time) {
            return Some(block);
        }

        let block = next_ongoing(ongoing, pieces, bitfield).or_else(|| {
            let position = rarest_piece(missing, peers, bitfield)?;
            let index = missing.remove(position);
            ongoing.push(index);
            debug!(piece = index, "Starting new piece");
            pieces[index as usize].next_request_block()
        })?;

        pending_blocks.push(PendingRequest {
            block,
            issued: Instant::now(),
        });
        Some(block)
    }

    /// Stores a block sent by a peer, and verifies and persists its piece once complete.
    pub fn block_received(
        &mut self,
        peer_id: &PeerId,
        piece_index: PieceIndex,
        offset: u32,
        data: Vec<u8>,
    ) {
        debug!(
            peer = %hex::encode(peer_id),
            piece = piece_index,
            offset,
            "Received block"
        );

        if let Some(position) = self
            .pending_blocks
            .iter()
            .position(|r| r.block.piece_index == piece_index && r.block.offset == offset)
        {
            self.pending_blocks.remove(position);
        }

        let Some(position) = self.ongoing.iter().position(|&i| i == piece_index) else {
            warn!(piece = piece_index, "Trying to update piece that is not ongoing");
            return;
        };

        let piece = &mut self.pieces[piece_index as usize];
        if !piece.block_received(offset, data) || !piece.is_complete() {
            return;
        }

        if !piece.is_hash_matching() {
            info!(piece = piece_index, "Discarding corrupt piece");
            self.reset_piece(piece_index);
            return;
        }

        let start = piece_index as u64 * self.piece_length as u64;
        if let Err(e) = self.storage.write_at(start, &piece.data()) {
            error!(piece = piece_index, "Failed to write piece: {:#}", e);
            self.reset_piece(piece_index);
            return;
        }

        self.ongoing.remove(position);
        self.have.push(piece_index);

        let (complete, total) = self.progress();
        info!(
            "{} / {} pieces downloaded {:.3} %",
            complete,
            total,
            complete as f64 / total as f64 * 100.0
        );
    }

    fn reset_piece(&mut self, piece_index: PieceIndex) {
        self.pieces[piece_index as usize].reset();
        self.pending_blocks
            .retain(|r| r.block.piece_index != piece_index);
    }

    /// Check if all pieces have been downloaded
    pub fn complete(&self) -> bool {
        self.have.len() == self.pieces.len()
    }

    pub fn bytes_downloaded(&self) -> u64 {
        self.have.len() as u64 * self.piece_length as u64
    }

    // This client never serves blocks
    pub fn bytes_uploaded(&self) -> u64 {
        0
    }

    pub fn bytes_left(&self) -> u64 {
        self.total_size.saturating_sub(self.bytes_downloaded())
    }

    /// Get download progress as (completed, total)
    pub fn progress(&self) -> (usize, usize) {
        (self.have.len(), self.pieces.len())
    }

    pub fn total_pieces(&self) -> usize {
        self.pieces.len()
    }

    pub fn piece(&self, index: PieceIndex) -> Option<&Piece> {
        self.pieces.get(index as usize)
    }

    pub fn piece_state(&self, index: PieceIndex) -> Option<PieceState> {
        if self.missing.contains(&index) {
            Some(PieceState::Missing)
        } else if self.ongoing.contains(&index) {
            Some(PieceState::Ongoing)
        } else if self.have.contains(&index) {
            Some(PieceState::Have)
        } else {
            None
        }
    }

    pub fn pending_requests(&self) -> usize {
        self.pending_blocks.len()
    }

    pub fn known_peers(&self) -> usize {
        self.peers.len()
    }

    /// Flushes the output file. The file handle itself goes away with the manager.
    pub fn close(&mut self) -> anyhow::Result<()> {
        self.storage.flush()
    }
}

fn expired_request(
    pending_blocks: &mut [PendingRequest],
    bitfield: &Bitfield,
    max_pending_time: Duration,
) -> Option<BlockInfo> {
    let now = Instant::now();
    let request = pending_blocks.iter_mut().find(|r| {
        bitfield.has_piece(r.block.piece_index as usize)
            && now.duration_since(r.issued) > max_pending_time
    })?;

    info!(
        piece = request.block.piece_index,
        offset = request.block.offset,
        "Re-requesting expired block"
    );
    request.issued = now;
    Some(request.block)
}

fn next_ongoing(
    ongoing: &[PieceIndex],
    pieces: &mut [Piece],
    bitfield: &Bitfield,
) -> Option<BlockInfo> {
    ongoing
        .iter()
        .filter(|&&index| bitfield.has_piece(index as usize))
        .find_map(|&index| pieces[index as usize].next_request_block())
}

// Position in `missing` of the piece the fewest known peers have. `missing` keeps
// ascending index order, so ties go to the lowest index.
fn rarest_piece(
    missing: &[PieceIndex],
    peers: &HashMap<PeerId, Bitfield>,
    bitfield: &Bitfield,
) -> Option<usize> {
    missing
        .iter()
        .enumerate()
        .filter(|(_, &index)| bitfield.has_piece(index as usize))
        .min_by_key(|(_, &index)| {
            peers
                .values()
                .filter(|bf| bf.has_piece(index as usize))
                .count()
        })
        .map(|(position, _)| position)
}
