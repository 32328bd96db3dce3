mod config;
mod peer_worker;
mod queue;
mod session;
mod state;

pub use config::ClientConfig;
pub use peer_worker::PeerWorker;
pub use queue::PeerQueue;
pub use session::{SessionSummary, TorrentSession};
pub use state::{DownloadStats, SharedState};
