use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;

use super::queue::PeerQueue;
use crate::message::{PeerId, PieceIndex};
use crate::piece::{BlockInfo, PieceManager};

/// Everything the worker pool and the session share.
pub struct SharedState {
    /// Block selection and piece assembly; every call runs to completion under the lock
    pub piece_manager: Mutex<PieceManager>,
    /// Addresses from the latest tracker response
    pub peers: PeerQueue,
    /// Download statistics
    pub stats: DownloadStats,
}

impl SharedState {
    pub fn new(piece_manager: PieceManager) -> Arc<Self> {
        let total_pieces = piece_manager.total_pieces() as u64;
        Arc::new(Self {
            piece_manager: Mutex::new(piece_manager),
            peers: PeerQueue::new(),
            stats: DownloadStats::new(total_pieces),
        })
    }

    /// Called by a worker for every block a peer delivers.
    pub async fn block_retrieved(
        &self,
        peer_id: &PeerId,
        piece_index: PieceIndex,
        offset: u32,
        data: Vec<u8>,
    ) {
        self.stats.add_downloaded(data.len() as u64);

        let mut pm = self.piece_manager.lock().await;
        pm.block_received(peer_id, piece_index, offset, data);
        self.stats.set_pieces_completed(pm.progress().0 as u64);
    }

    pub async fn next_request(&self, peer_id: &PeerId) -> Option<BlockInfo> {
        self.piece_manager.lock().await.next_request(peer_id)
    }

    pub async fn is_complete(&self) -> bool {
        self.piece_manager.lock().await.complete()
    }
}

/// Atomic counters for download statistics.
pub struct DownloadStats {
    /// Block payload bytes received, including blocks later discarded
    downloaded_bytes: AtomicU64,
    pieces_completed: AtomicU64,
    total_pieces: u64,
    start_time: Instant,
}

impl DownloadStats {
    pub fn new(total_pieces: u64) -> Self {
        Self {
            downloaded_bytes: AtomicU64::new(0),
            pieces_completed: AtomicU64::new(0),
            total_pieces,
            start_time: Instant::now(),
        }
    }

    pub fn add_downloaded(&self, bytes: u64) {
        self.downloaded_bytes.fetch_add(bytes, Ordering::Relaxed);
    }

    pub fn set_pieces_completed(&self, pieces: u64) {
        self.pieces_completed.store(pieces, Ordering::Relaxed);
    }

    pub fn downloaded_bytes(&self) -> u64 {
        self.downloaded_bytes.load(Ordering::Relaxed)
    }

    pub fn pieces_completed(&self) -> u64 {
        self.pieces_completed.load(Ordering::Relaxed)
    }

    pub fn total_pieces(&self) -> u64 {
        self.total_pieces
    }

    pub fn progress_percent(&self) -> f64 {
        if self.total_pieces == 0 {
            return 100.0;
        }
        (self.pieces_completed() as f64 / self.total_pieces as f64) * 100.0
    }

    /// Returns download speed in bytes per second.
    pub fn download_speed(&self) -> f64 {
        let elapsed = self.start_time.elapsed().as_secs_f64();
        if elapsed < 0.001 {
            return 0.0;
        }
        self.downloaded_bytes() as f64 / elapsed
    }
}
