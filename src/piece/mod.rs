use crate::message::PieceIndex;

// 16 KB standard block size from https://wiki.theory.org/BitTorrentSpecification#Peer_wire_protocol_.28TCP.29
pub const REQUEST_SIZE: u32 = 16384;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlockInfo {
    pub piece_index: PieceIndex,
    pub offset: u32,
    pub length: u32,
}

/// Piece geometry of a torrent, as handed over by the metadata parser.
#[derive(Debug, Clone)]
pub struct PieceLayout {
    /// Standard piece size (last piece may be smaller)
    pub piece_length: u32,
    pub total_size: u64,
    pub hashes: Vec<[u8; 20]>,
}

impl PieceLayout {
    pub fn piece_count(&self) -> usize {
        self.hashes.len()
    }

    /// Size of a specific piece: `piece_length` for all but the last one, which holds the
    /// remainder of `total_size`.
    pub fn piece_size(&self, piece_index: PieceIndex) -> u32 {
        let start = piece_index as u64 * self.piece_length as u64;
        let remaining = self.total_size.saturating_sub(start);
        remaining.min(self.piece_length as u64) as u32
    }
}

mod model;
pub mod piece_manager;
mod verify;

pub use model::{Block, BlockStatus, Piece};
pub use piece_manager::{PieceManager, PieceState, DEFAULT_MAX_PENDING_TIME};
pub use verify::verify_piece;
