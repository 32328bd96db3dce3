use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::{io::AsyncWriteExt, net::TcpStream, time::timeout};
use tokio_util::codec::{Framed, FramedParts};
use tracing::{debug, instrument};

use super::{Peer, PeerError};
use crate::{
    client::ClientConfig,
    message::{MessageCodec, PeerMessage},
    piece::BlockInfo,
};

impl Peer {
    /// Opens the TCP connection, handshakes and switches the stream to framed messages.
    #[instrument(skip(self, config), fields(peer = %self.addr))]
    pub async fn connect(&mut self, config: &ClientConfig) -> Result<(), PeerError> {
        let mut tcp_stream = timeout(config.connection_timeout, TcpStream::connect(self.addr))
            .await
            .map_err(|_| PeerError::Timeout("connect"))??;

        let leftover = self.handshake(&mut tcp_stream, config).await?;

        let mut parts = FramedParts::new::<PeerMessage>(tcp_stream, MessageCodec);
        parts.read_buf = leftover;
        self.tcp_stream = Some(Framed::from_parts(parts));

        Ok(())
    }

    pub async fn send_message(&mut self, msg: PeerMessage) -> Result<(), PeerError> {
        self.tcp_stream
            .as_mut()
            .ok_or(PeerError::NotConnected)?
            .send(msg)
            .await?;

        Ok(())
    }

    pub async fn send_interested(&mut self) -> Result<(), PeerError> {
        self.send_message(PeerMessage::Interested).await?;
        self.state.set_interested(true);
        Ok(())
    }

    pub async fn request_block(&mut self, block_info: BlockInfo) -> Result<(), PeerError> {
        self.send_message(PeerMessage::Request {
            index: block_info.piece_index,
            begin: block_info.offset,
            length: block_info.length,
        })
        .await
    }

    /// Waits up to `read_timeout` for the next message.
    /// Returns None once the peer has closed or reset the connection.
    pub async fn receive_message(
        &mut self,
        read_timeout: Duration,
    ) -> Result<Option<PeerMessage>, PeerError> {
        let stream = self.tcp_stream.as_mut().ok_or(PeerError::NotConnected)?;

        match timeout(read_timeout, stream.next()).await {
            Err(_) => Err(PeerError::Timeout("read")),
            Ok(None) => Ok(None),
            Ok(Some(Ok(message))) => Ok(Some(message)),
            Ok(Some(Err(e))) if e.is_reset() => {
                debug!(peer = %self.addr, error = %e, "Connection reset by peer");
                Ok(None)
            }
            Ok(Some(Err(e))) => Err(e.into()),
        }
    }

    /// Shuts the connection down. Safe to call more than once.
    pub async fn close(&mut self) {
        if let Some(framed) = self.tcp_stream.take() {
            let mut tcp_stream = framed.into_inner();
            if let Err(e) = tcp_stream.shutdown().await {
                debug!(peer = %self.addr, error = %e, "Error while shutting down connection");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{Handshake, HANDSHAKE_LENGTH};
    use std::net::SocketAddrV4;
    use tokio::{io::AsyncReadExt, net::TcpListener};

    const INFO_HASH: [u8; 20] = [3; 20];

    async fn seeder(trailing: Vec<u8>) -> SocketAddrV4 {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = match listener.local_addr().unwrap() {
            std::net::SocketAddr::V4(addr) => addr,
            _ => unreachable!(),
        };
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut theirs = [0u8; HANDSHAKE_LENGTH];
            socket.read_exact(&mut theirs).await.unwrap();

            let mut reply = Handshake::new(INFO_HASH, [b's'; 20]).to_bytes();
            reply.extend_from_slice(&trailing);
            socket.write_all(&reply).await.unwrap();

            // Expect interested followed by a single request
            let mut incoming = vec![0u8; 5 + 17];
            socket.read_exact(&mut incoming).await.unwrap();
            assert_eq!(&incoming[..5], &[0, 0, 0, 1, 2]);
            assert_eq!(incoming[9], 6);

            socket.write_all(&[0, 0, 0, 1, 1]).await.unwrap();
        });
        addr
    }

    #[tokio::test]
    async fn test_connect_and_exchange() {
        // A bitfield glued to the end of the handshake reply
        let addr = seeder(vec![0, 0, 0, 2, 5, 0b1100_0000]).await;
        let mut peer = Peer::new(addr, INFO_HASH, [b'l'; 20]);
        let config = ClientConfig::default();

        peer.connect(&config).await.unwrap();
        assert!(peer.is_connected());

        let first = peer.receive_message(config.read_timeout).await.unwrap();
        assert_eq!(first, Some(PeerMessage::Bitfield(vec![0b1100_0000])));

        peer.send_interested().await.unwrap();
        assert!(peer.state().is_interested());
        peer.request_block(BlockInfo {
            piece_index: 0,
            offset: 0,
            length: 16384,
        })
        .await
        .unwrap();

        let unchoke = peer.receive_message(config.read_timeout).await.unwrap();
        assert_eq!(unchoke, Some(PeerMessage::Unchoke));

        // Seeder task has finished and dropped its socket
        let end = peer.receive_message(config.read_timeout).await.unwrap();
        assert_eq!(end, None);

        peer.close().await;
        peer.close().await;
        assert!(!peer.is_connected());
    }

    #[tokio::test]
    async fn test_not_connected() {
        let addr = "127.0.0.1:1".parse().unwrap();
        let mut peer = Peer::new(addr, INFO_HASH, [b'l'; 20]);

        assert!(matches!(
            peer.send_interested().await,
            Err(PeerError::NotConnected)
        ));
        assert!(matches!(
            peer.receive_message(Duration::from_millis(10)).await,
            Err(PeerError::NotConnected)
        ));
        assert!(!peer.state().is_interested());
    }

    #[tokio::test]
    async fn test_read_timeout() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = match listener.local_addr().unwrap() {
            std::net::SocketAddr::V4(addr) => addr,
            _ => unreachable!(),
        };
        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut theirs = [0u8; HANDSHAKE_LENGTH];
            socket.read_exact(&mut theirs).await.unwrap();
            let reply = Handshake::new(INFO_HASH, [b's'; 20]).to_bytes();
            socket.write_all(&reply).await.unwrap();
            tokio::time::sleep(Duration::from_millis(500)).await;
        });

        let mut peer = Peer::new(addr, INFO_HASH, [b'l'; 20]);
        peer.connect(&ClientConfig::default()).await.unwrap();

        let result = peer.receive_message(Duration::from_millis(50)).await;
        assert!(matches!(result, Err(PeerError::Timeout("read"))));

        peer.close().await;
        server.abort();
    }
}
