use tracing::warn;

use super::{verify_piece, BlockInfo, REQUEST_SIZE};
use crate::message::PieceIndex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockStatus {
    Missing,
    Pending,
    Retrieved,
}

/// A `REQUEST_SIZE` slice of a piece, the unit actually requested from peers.
#[derive(Debug, Clone)]
pub struct Block {
    info: BlockInfo,
    status: BlockStatus,
    data: Option<Vec<u8>>,
}

impl Block {
    fn new(piece_index: PieceIndex, offset: u32, length: u32) -> Self {
        Self {
            info: BlockInfo {
                piece_index,
                offset,
                length,
            },
            status: BlockStatus::Missing,
            data: None,
        }
    }

    pub fn info(&self) -> BlockInfo {
        self.info
    }

    pub fn status(&self) -> BlockStatus {
        self.status
    }

    pub fn data(&self) -> Option<&[u8]> {
        self.data.as_deref()
    }
}

#[derive(Debug, Clone)]
pub struct Piece {
    index: PieceIndex,
    // Ordered by offset
    blocks: Vec<Block>,
    hash: [u8; 20],
}

impl Piece {
    /// Splits `piece_size` bytes into blocks of `REQUEST_SIZE`, the last one taking
    /// whatever is left.
    pub fn new(index: PieceIndex, piece_size: u32, hash: [u8; 20]) -> Self {
        let num_blocks = piece_size.div_ceil(REQUEST_SIZE);
        let blocks = (0..num_blocks)
            .map(|i| {
                let offset = i * REQUEST_SIZE;
                let length = std::cmp::min(REQUEST_SIZE, piece_size - offset);
                Block::new(index, offset, length)
            })
            .collect();

        Self {
            index,
            blocks,
            hash,
        }
    }

    pub fn index(&self) -> PieceIndex {
        self.index
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn len(&self) -> u32 {
        self.blocks.iter().map(|b| b.info.length).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Hands out the first missing block and marks it pending.
    pub fn next_request_block(&mut self) -> Option<BlockInfo> {
        let block = self
            .blocks
            .iter_mut()
            .find(|b| b.status == BlockStatus::Missing)?;
        block.status = BlockStatus::Pending;
        Some(block.info)
    }

    /// Stores the payload of the block at `offset`. Returns false if no block starts there.
    pub fn block_received(&mut self, offset: u32, data: Vec<u8>) -> bool {
        match self.blocks.iter_mut().find(|b| b.info.offset == offset) {
            Some(block) => {
                block.status = BlockStatus::Retrieved;
                block.data = Some(data);
                true
            }
            None => {
                warn!(
                    piece = self.index,
                    offset, "Trying to complete a non-existing block"
                );
                false
            }
        }
    }

    pub fn is_complete(&self) -> bool {
        self.blocks
            .iter()
            .all(|b| b.status == BlockStatus::Retrieved)
    }

    /// Concatenation of the block payloads in offset order.
    pub fn data(&self) -> Vec<u8> {
        let mut data = Vec::with_capacity(self.len() as usize);
        for block in &self.blocks {
            if let Some(bytes) = &block.data {
                data.extend_from_slice(bytes);
            }
        }
        data
    }

    pub fn is_hash_matching(&self) -> bool {
        verify_piece(&self.data(), &self.hash)
    }

    /// Sends every block back to `Missing` so the whole piece is fetched again.
    pub fn reset(&mut self) {
        for block in &mut self.blocks {
            block.status = BlockStatus::Missing;
            block.data = None;
        }
    }
}
