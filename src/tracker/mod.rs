use std::time::Duration;

use anyhow::{bail, Context};
use rand::{distributions::Alphanumeric, Rng};
use serde_derive::{Deserialize, Serialize};
use tracing::{info, instrument};

use crate::message::{InfoHash, PeerId};
use crate::peer::PeerAddresses;
use crate::torrent::Torrent;

const PEER_ID_PREFIX: &[u8; 8] = b"-PW0001-";
const ANNOUNCE_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Deserialize)]
pub struct TrackerResponse {
    /// Human readable reason the announce was refused; nothing else is present then.
    #[serde(rename = "failure reason")]
    failure_reason: Option<String>,

    /// An integer, indicating how often your client should make a request to the tracker in seconds.
    #[serde(default)]
    pub interval: u64,

    /// Peers that your client can connect to, usually in the compact 6 byte form.
    #[serde(rename = "peers", default)]
    pub peer_addresses: PeerAddresses,
}

#[derive(Debug, Clone, Serialize)]
struct TrackerRequest {
    /// The port your client is listening on.
    port: u16,

    /// The total amount uploaded so far.
    uploaded: u64,

    /// The total amount downloaded so far
    downloaded: u64,

    /// The number of bytes left to download.
    left: u64,

    /// Whether the peer list should use the compact representation
    compact: u8,

    /// `started` on the first announce of a session
    #[serde(skip_serializing_if = "Option::is_none")]
    event: Option<&'static str>,
}

/// HTTP tracker for a single torrent.
#[derive(Debug, Clone)]
pub struct Tracker {
    announce: String,
    info_hash: InfoHash,
    peer_id: PeerId,
    port: u16,
    total_length: u64,
    client: reqwest::Client,
}

impl Tracker {
    pub fn new(torrent: &Torrent, peer_id: PeerId, port: u16) -> Self {
        Self {
            announce: torrent.announce.clone(),
            info_hash: torrent.info_hash,
            peer_id,
            port,
            total_length: torrent.length(),
            client: reqwest::Client::new(),
        }
    }

    /// Announces our progress and returns the tracker's peer list.
    #[instrument(skip(self), fields(tracker = %self.announce))]
    pub async fn connect(
        &self,
        first: bool,
        uploaded: u64,
        downloaded: u64,
    ) -> anyhow::Result<TrackerResponse> {
        let request = TrackerRequest {
            port: self.port,
            uploaded,
            downloaded,
            left: self.total_length.saturating_sub(downloaded),
            compact: 1,
            event: first.then_some("started"),
        };
        let params = serde_urlencoded::to_string(&request)
            .context("Failed to encode tracker url params!")?;

        let separator = if self.announce.contains('?') { '&' } else { '?' };
        let tracker_url = format!(
            "{}{}{}&info_hash={}&peer_id={}",
            self.announce,
            separator,
            params,
            urlencode_bytes(&self.info_hash),
            urlencode_bytes(&self.peer_id),
        );

        let response = self
            .client
            .get(tracker_url)
            .timeout(ANNOUNCE_TIMEOUT)
            .send()
            .await
            .context("Failed to make GET request to tracker server!")?
            .error_for_status()
            .context("Tracker answered with an error status")?;
        let response = response
            .bytes()
            .await
            .context("Failed converting tracker response into bytes!")?;

        let response: TrackerResponse = serde_bencode::from_bytes(&response)
            .context("Failed to deserialize tracker response!")?;

        if let Some(reason) = response.failure_reason {
            bail!("Tracker refused announce: {}", reason);
        }

        info!(
            peers = response.peer_addresses.0.len(),
            "Successfully retrieved peers from tracker"
        );

        Ok(response)
    }
}

fn urlencode_bytes(bytes: &[u8]) -> String {
    let mut encoded = String::with_capacity(bytes.len() * 3);
    bytes.iter().for_each(|byte| {
        encoded.push('%');
        encoded.push_str(&format!("{:02X}", byte));
    });
    encoded
}

/// `-PW0001-` followed by 12 random alphanumerics.
pub fn generate_peer_id() -> PeerId {
    let mut rng = rand::thread_rng();
    let mut peer_id = [0u8; 20];
    peer_id[..PEER_ID_PREFIX.len()].copy_from_slice(PEER_ID_PREFIX);
    for byte in peer_id[PEER_ID_PREFIX.len()..].iter_mut() {
        *byte = rng.sample(Alphanumeric);
    }
    peer_id
}
