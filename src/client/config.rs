use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Directory where downloaded files will be saved
    pub download_path: PathBuf,
    /// Port reported to the tracker
    pub listen_port: u16,
    /// Number of concurrent peer connections
    pub max_peers: usize,
    /// Timeout for establishing peer connections and for each handshake read
    pub connection_timeout: Duration,
    /// How long a connection may stay silent before it is dropped
    pub read_timeout: Duration,
    /// Age after which an unanswered block request is handed out again
    pub request_timeout: Duration,
    /// Reads allowed while waiting for a complete handshake
    pub handshake_read_attempts: usize,
    /// How often the session checks for completion between tracker announces
    pub poll_interval: Duration,
    /// Draw a progress bar on stderr
    pub show_progress: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            download_path: PathBuf::from("."),
            listen_port: 6881,
            max_peers: 40,
            connection_timeout: Duration::from_secs(10),
            read_timeout: Duration::from_secs(120),
            request_timeout: Duration::from_secs(300),
            handshake_read_attempts: 10,
            poll_interval: Duration::from_secs(5),
            show_progress: true,
        }
    }
}

impl ClientConfig {
    pub fn with_download_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.download_path = path.into();
        self
    }

    pub fn with_max_peers(mut self, max: usize) -> Self {
        self.max_peers = max;
        self
    }

    pub fn with_listen_port(mut self, port: u16) -> Self {
        self.listen_port = port;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.max_peers, 40);
        assert_eq!(config.read_timeout, Duration::from_secs(120));
        assert_eq!(config.request_timeout, Duration::from_secs(300));
        assert_eq!(config.handshake_read_attempts, 10);
    }

    #[test]
    fn test_builders() {
        let config = ClientConfig::default()
            .with_download_path("/tmp/out")
            .with_max_peers(3)
            .with_poll_interval(Duration::from_millis(50))
            .with_progress(false);

        assert_eq!(config.download_path, PathBuf::from("/tmp/out"));
        assert_eq!(config.max_peers, 3);
        assert_eq!(config.poll_interval, Duration::from_millis(50));
        assert!(!config.show_progress);
    }
}
