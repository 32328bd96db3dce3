use bytes::BytesMut;
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::TcpStream,
    time::timeout,
};
use tracing::{debug, info};

use super::{Peer, PeerError};
use crate::client::ClientConfig;
use crate::message::{Handshake, HANDSHAKE_LENGTH};

impl Peer {
    /// Exchanges handshakes over a fresh connection.
    ///
    /// Returns whatever the peer sent after its 68 handshake bytes; those bytes belong
    /// to the first framed messages.
    pub(super) async fn handshake(
        &mut self,
        tcp_stream: &mut TcpStream,
        config: &ClientConfig,
    ) -> Result<BytesMut, PeerError> {
        let handshake_message = Handshake::new(self.info_hash, self.peer_id);
        tcp_stream.write_all(&handshake_message.to_bytes()).await?;

        let mut buffer = BytesMut::with_capacity(HANDSHAKE_LENGTH * 2);
        let mut attempts = 0;
        while buffer.len() < HANDSHAKE_LENGTH && attempts < config.handshake_read_attempts {
            attempts += 1;
            let read = timeout(config.connection_timeout, tcp_stream.read_buf(&mut buffer))
                .await
                .map_err(|_| PeerError::Timeout("handshake read"))??;
            if read == 0 {
                debug!(peer = %self.addr, "Connection closed during handshake");
                break;
            }
        }

        let response = Handshake::decode(&buffer)?;
        if response.info_hash != self.info_hash {
            return Err(PeerError::InfoHashMismatch);
        }

        self.remote_id = Some(response.peer_id);
        info!(
            peer = %self.addr,
            remote_id = %String::from_utf8_lossy(&response.peer_id),
            "Handshake with peer was successful"
        );

        Ok(buffer.split_off(HANDSHAKE_LENGTH))
    }
}
