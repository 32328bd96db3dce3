#![allow(dead_code)]

use std::net::SocketAddrV4;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use futures::{SinkExt, StreamExt};
use sha1::{Digest, Sha1};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio_util::codec::Framed;

use piecewise::message::{
    Bitfield, Handshake, InfoHash, MessageCodec, PeerMessage, HANDSHAKE_LENGTH,
};

/// Deterministic payload of `len` bytes.
pub fn payload(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

/// Bencoded single-file metainfo for `data`.
pub fn torrent_bytes(announce: &str, name: &str, piece_length: usize, data: &[u8]) -> Vec<u8> {
    let pieces: Vec<u8> = data
        .chunks(piece_length)
        .flat_map(|chunk| <[u8; 20]>::from(Sha1::digest(chunk)))
        .collect();

    let mut bytes = Vec::new();
    bytes.extend_from_slice(format!("d8:announce{}:{}", announce.len(), announce).as_bytes());
    bytes.extend_from_slice(b"4:infod");
    bytes.extend_from_slice(format!("6:lengthi{}e", data.len()).as_bytes());
    bytes.extend_from_slice(format!("4:name{}:{}", name.len(), name).as_bytes());
    bytes.extend_from_slice(format!("12:piece lengthi{}e", piece_length).as_bytes());
    bytes.extend_from_slice(format!("6:pieces{}:", pieces.len()).as_bytes());
    bytes.extend_from_slice(&pieces);
    bytes.extend_from_slice(b"ee");
    bytes
}

/// Bencoded tracker response listing a single compact peer.
pub fn tracker_body(interval: u64, peer: SocketAddrV4) -> Vec<u8> {
    let mut body = format!("d8:intervali{}e5:peers6:", interval).into_bytes();
    body.extend_from_slice(&peer.ip().octets());
    body.extend_from_slice(&peer.port().to_be_bytes());
    body.push(b'e');
    body
}

/// A peer that has every piece and answers one request at a time.
pub struct Seeder {
    pub addr: SocketAddrV4,
    /// Blocks served so far, including corrupt ones
    pub served: Arc<AtomicUsize>,
}

impl Seeder {
    /// Starts serving `data`. With `corrupt_first` the very first block sent has its
    /// bytes flipped.
    pub async fn start(
        info_hash: InfoHash,
        piece_length: usize,
        data: Vec<u8>,
        corrupt_first: bool,
    ) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = match listener.local_addr().unwrap() {
            std::net::SocketAddr::V4(addr) => addr,
            _ => unreachable!(),
        };

        let data = Arc::new(data);
        let served = Arc::new(AtomicUsize::new(0));
        let corrupt = Arc::new(AtomicBool::new(corrupt_first));

        let task_served = Arc::clone(&served);
        tokio::spawn(async move {
            while let Ok((socket, _)) = listener.accept().await {
                tokio::spawn(serve(
                    socket,
                    info_hash,
                    piece_length,
                    Arc::clone(&data),
                    Arc::clone(&task_served),
                    Arc::clone(&corrupt),
                ));
            }
        });

        Self { addr, served }
    }

    pub fn served(&self) -> usize {
        self.served.load(Ordering::SeqCst)
    }
}

async fn serve(
    mut socket: tokio::net::TcpStream,
    info_hash: InfoHash,
    piece_length: usize,
    data: Arc<Vec<u8>>,
    served: Arc<AtomicUsize>,
    corrupt: Arc<AtomicBool>,
) {
    let mut theirs = [0u8; HANDSHAKE_LENGTH];
    if socket.read_exact(&mut theirs).await.is_err() {
        return;
    }
    let ours = Handshake::new(info_hash, *b"-SD0001-seederseeder");
    if socket.write_all(&ours.to_bytes()).await.is_err() {
        return;
    }

    let piece_count = data.len().div_ceil(piece_length);
    let mut framed = Framed::new(socket, MessageCodec);
    let bitfield = Bitfield::from_pieces(0..piece_count);
    if framed
        .send(PeerMessage::Bitfield(bitfield.as_bytes().to_vec()))
        .await
        .is_err()
    {
        return;
    }

    while let Some(Ok(message)) = framed.next().await {
        let reply = match message {
            PeerMessage::Interested => PeerMessage::Unchoke,
            PeerMessage::Request {
                index,
                begin,
                length,
            } => {
                let start = index as usize * piece_length + begin as usize;
                let mut block = data[start..start + length as usize].to_vec();
                if corrupt.swap(false, Ordering::SeqCst) {
                    block.iter_mut().for_each(|b| *b = !*b);
                }
                served.fetch_add(1, Ordering::SeqCst);
                PeerMessage::Piece {
                    index,
                    begin,
                    block,
                }
            }
            _ => continue,
        };

        if framed.send(reply).await.is_err() {
            return;
        }
    }
}
