use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use tokio::task::JoinSet;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::file::DiskFileManager;
use crate::message::PeerId;
use crate::piece::PieceManager;
use crate::torrent::Torrent;
use crate::tracker::{generate_peer_id, Tracker};

use super::config::ClientConfig;
use super::peer_worker::PeerWorker;
use super::state::SharedState;

/// Main session coordinator for downloading a torrent.
pub struct TorrentSession {
    torrent: Torrent,
    config: ClientConfig,
    peer_id: PeerId,
    cancel: CancellationToken,
}

/// What a finished or stopped session got done.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSummary {
    pub pieces_completed: usize,
    pub total_pieces: usize,
    pub downloaded_bytes: u64,
    pub complete: bool,
}

impl TorrentSession {
    /// Create a new session for downloading a torrent file.
    pub async fn new(
        torrent_path: impl AsRef<Path> + std::fmt::Debug,
        config: ClientConfig,
    ) -> Result<Self> {
        let torrent = Torrent::open(torrent_path)
            .await
            .context("Failed to open torrent file")?;

        Ok(Self::from_torrent(torrent, config))
    }

    pub fn from_torrent(torrent: Torrent, config: ClientConfig) -> Self {
        Self {
            torrent,
            config,
            peer_id: generate_peer_id(),
            cancel: CancellationToken::new(),
        }
    }

    /// Cancelling the returned token stops the session and every worker.
    pub fn stop_handle(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn torrent(&self) -> &Torrent {
        &self.torrent
    }

    /// Downloads until every piece is on disk or the session is stopped.
    pub async fn start(self) -> Result<SessionSummary> {
        let layout = self.torrent.layout();
        let total_length = layout.total_size;
        let total_pieces = layout.piece_count();

        if self.torrent.is_multi_file() {
            warn!(
                name = %self.torrent.info.name,
                "Multi-file torrent, writing all files into a single output file"
            );
        }

        std::fs::create_dir_all(&self.config.download_path).with_context(|| {
            format!(
                "Failed to create download directory {}",
                self.config.download_path.display()
            )
        })?;
        let output = self.torrent.output_path(&self.config.download_path);
        let storage = DiskFileManager::create(&output, total_length)
            .context("Failed to create output file")?;

        let piece_manager = PieceManager::new(layout, Box::new(storage))
            .with_max_pending_time(self.config.request_timeout);
        let state = SharedState::new(piece_manager);

        println!("Torrent: {}", self.torrent.info.name);
        println!(
            "Size:    {} ({} pieces)",
            format_bytes(total_length),
            total_pieces
        );
        println!("Tracker: {}", self.torrent.announce);
        println!("Output:  {}", output.display());
        println!();

        let mut workers = JoinSet::new();
        for slot in 0..self.config.max_peers {
            let worker = PeerWorker::new(
                slot,
                self.torrent.info_hash,
                self.peer_id,
                Arc::clone(&state),
                self.config.clone(),
                self.cancel.clone(),
            );
            workers.spawn(worker.run());
        }

        let pb = if self.config.show_progress {
            ProgressBar::new(total_pieces as u64)
        } else {
            ProgressBar::hidden()
        };
        pb.set_style(
            ProgressStyle::with_template("{bar:40.cyan/blue} {pos}/{len} pieces  {msg}")
                .context("Invalid progress bar template")?
                .progress_chars("##-"),
        );

        self.announce_loop(&state, &pb).await;

        self.cancel.cancel();
        while let Some(result) = workers.join_next().await {
            if let Err(e) = result {
                error!("Peer worker failed: {}", e);
            }
        }

        let mut pm = state.piece_manager.lock().await;
        pm.close().context("Failed to close output file")?;

        let (pieces_completed, total_pieces) = pm.progress();
        let summary = SessionSummary {
            pieces_completed,
            total_pieces,
            downloaded_bytes: state.stats.downloaded_bytes(),
            complete: pm.complete(),
        };

        if summary.complete {
            pb.finish_with_message(format!("{}  done!", format_bytes(total_length)));
            println!(
                "\nDownload complete: {}/{} pieces",
                summary.pieces_completed, summary.total_pieces,
            );
        } else {
            pb.finish_and_clear();
            println!(
                "Stopped after {}/{} pieces ({})",
                summary.pieces_completed,
                summary.total_pieces,
                format_bytes(summary.downloaded_bytes),
            );
        }

        Ok(summary)
    }

    // Announces right away and then whenever the tracker's interval has passed,
    // checking for completion every poll interval.
    async fn announce_loop(&self, state: &SharedState, pb: &ProgressBar) {
        let tracker = Tracker::new(&self.torrent, self.peer_id, self.config.listen_port);
        let mut first = true;
        let mut next_announce = Instant::now();

        loop {
            if state.is_complete().await {
                info!("All pieces downloaded");
                break;
            }

            if Instant::now() >= next_announce {
                let (uploaded, downloaded) = {
                    let pm = state.piece_manager.lock().await;
                    (pm.bytes_uploaded(), pm.bytes_downloaded())
                };

                match tracker.connect(first, uploaded, downloaded).await {
                    Ok(response) => {
                        first = false;
                        info!(
                            peers = response.peer_addresses.0.len(),
                            interval = response.interval,
                            "Tracker announce succeeded"
                        );
                        state.peers.replace(response.peer_addresses.0).await;
                        next_announce = Instant::now() + Duration::from_secs(response.interval);
                    }
                    Err(e) => {
                        warn!("Tracker announce failed: {:#}", e);
                        next_announce = Instant::now() + self.config.poll_interval;
                    }
                }
            }

            let stats = &state.stats;
            pb.set_position(stats.pieces_completed());
            pb.set_message(format!(
                "{}  {}/s",
                format_bytes(stats.downloaded_bytes()),
                format_bytes(stats.download_speed() as u64),
            ));

            tokio::select! {
                _ = self.cancel.cancelled() => {
                    info!("Stopping session");
                    break;
                }
                _ = tokio::time::sleep(self.config.poll_interval) => {}
            }
        }
    }
}

/// Format byte count as human-readable string (e.g. "631.0 MB").
fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = 1024 * KB;
    const GB: u64 = 1024 * MB;

    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}
