use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use piecewise::client::{ClientConfig, TorrentSession};

#[derive(Parser, Debug)]
#[command(name = "piecewise")]
#[command(about = "Download a single torrent from its swarm")]
struct Cli {
    /// Path to the .torrent file
    torrent: PathBuf,

    /// Log at info level instead of warn
    #[arg(short, long)]
    verbose: bool,

    /// Directory the downloaded file is written to
    #[arg(short, long, default_value = ".")]
    output: PathBuf,

    /// Number of concurrent peer connections
    #[arg(long, default_value_t = 40)]
    max_peers: usize,

    /// Port reported to the tracker
    #[arg(long, default_value_t = 6881)]
    port: u16,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { "info" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = ClientConfig::default()
        .with_download_path(cli.output)
        .with_max_peers(cli.max_peers)
        .with_listen_port(cli.port);

    let session = TorrentSession::new(&cli.torrent, config)
        .await
        .with_context(|| format!("Failed to load {}", cli.torrent.display()))?;

    let stop = session.stop_handle();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Ctrl-C received, shutting down");
                stop.cancel();
            }
            Err(e) => warn!("Unable to listen for Ctrl-C: {}", e),
        }
    });

    let summary = session.start().await?;
    if !summary.complete {
        eprintln!("Download incomplete");
    }

    Ok(())
}
