//! Peer wire messages exchanged after the handshake.
//!
//! Every message except the keep-alive is framed as
//! `<u32 length of id + payload><u8 id><payload>`, all integers big-endian.

use bytes::{Buf, BufMut, BytesMut};

mod bitfield;
mod codec;
mod error;
mod handshake;

pub use bitfield::Bitfield;
pub use codec::MessageCodec;
pub use error::WireError;
pub use handshake::{Handshake, InfoHash, PeerId, HANDSHAKE_LENGTH};

pub type PieceIndex = u32;

/// Size of the big-endian length prefix in front of every frame.
pub const LENGTH_PREFIX: usize = 4;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PeerMessage {
    KeepAlive,
    Choke,
    Unchoke,
    Interested,
    NotInterested,
    Have(PieceIndex),
    Bitfield(Vec<u8>),
    Request {
        index: PieceIndex,
        begin: u32,
        length: u32,
    },
    Piece {
        index: PieceIndex,
        begin: u32,
        block: Vec<u8>,
    },
    Cancel {
        index: PieceIndex,
        begin: u32,
        length: u32,
    },
}

impl PeerMessage {
    pub fn message_id(&self) -> Option<u8> {
        match self {
            PeerMessage::KeepAlive => None, // KeepAlive has no ID
            PeerMessage::Choke => Some(0),
            PeerMessage::Unchoke => Some(1),
            PeerMessage::Interested => Some(2),
            PeerMessage::NotInterested => Some(3),
            PeerMessage::Have(_) => Some(4),
            PeerMessage::Bitfield(_) => Some(5),
            PeerMessage::Request { .. } => Some(6),
            PeerMessage::Piece { .. } => Some(7),
            PeerMessage::Cancel { .. } => Some(8),
        }
    }

    fn payload_len(&self) -> usize {
        match self {
            PeerMessage::KeepAlive
            | PeerMessage::Choke
            | PeerMessage::Unchoke
            | PeerMessage::Interested
            | PeerMessage::NotInterested => 0,
            PeerMessage::Have(_) => 4,
            PeerMessage::Bitfield(bits) => bits.len(),
            PeerMessage::Request { .. } | PeerMessage::Cancel { .. } => 12,
            PeerMessage::Piece { block, .. } => 8 + block.len(),
        }
    }

    /// Appends the full frame, length prefix included, to `dst`.
    pub fn encode_into(&self, dst: &mut BytesMut) {
        let Some(id) = self.message_id() else {
            dst.put_u32(0);
            return;
        };

        let payload_len = self.payload_len();
        dst.reserve(LENGTH_PREFIX + 1 + payload_len);
        dst.put_u32(1 + payload_len as u32);
        dst.put_u8(id);

        match self {
            PeerMessage::Have(index) => dst.put_u32(*index),
            PeerMessage::Bitfield(bits) => dst.put_slice(bits),
            PeerMessage::Request {
                index,
                begin,
                length,
            }
            | PeerMessage::Cancel {
                index,
                begin,
                length,
            } => {
                dst.put_u32(*index);
                dst.put_u32(*begin);
                dst.put_u32(*length);
            }
            PeerMessage::Piece {
                index,
                begin,
                block,
            } => {
                dst.put_u32(*index);
                dst.put_u32(*begin);
                dst.put_slice(block);
            }
            _ => {}
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut buf = BytesMut::new();
        self.encode_into(&mut buf);
        buf.to_vec()
    }

    /// Decodes exactly one complete frame.
    ///
    /// Returns `Ok(None)` when the frame carries an id this client does not know about;
    /// the caller is expected to drop the frame and carry on.
    pub fn decode(frame: &[u8]) -> Result<Option<Self>, WireError> {
        if frame.len() < LENGTH_PREFIX {
            return Err(WireError::Truncated {
                expected: LENGTH_PREFIX,
                actual: frame.len(),
            });
        }

        let mut body = &frame[LENGTH_PREFIX..];
        let length = u32::from_be_bytes([frame[0], frame[1], frame[2], frame[3]]) as usize;
        if length == 0 {
            return Ok(Some(PeerMessage::KeepAlive));
        }
        if body.len() < length {
            return Err(WireError::Truncated {
                expected: LENGTH_PREFIX + length,
                actual: frame.len(),
            });
        }
        body = &body[..length];

        let id = body.get_u8();
        let payload = body;
        let malformed = || WireError::Malformed {
            id,
            length: payload.len(),
        };
        let expect_len = |wanted: usize| {
            if payload.len() == wanted {
                Ok(())
            } else {
                Err(malformed())
            }
        };

        let mut payload_buf = payload;
        let message = match id {
            0 => expect_len(0).map(|_| PeerMessage::Choke)?,
            1 => expect_len(0).map(|_| PeerMessage::Unchoke)?,
            2 => expect_len(0).map(|_| PeerMessage::Interested)?,
            3 => expect_len(0).map(|_| PeerMessage::NotInterested)?,
            4 => {
                expect_len(4)?;
                PeerMessage::Have(payload_buf.get_u32())
            }
            5 => PeerMessage::Bitfield(payload.to_vec()),
            6 | 8 => {
                expect_len(12)?;
                let index = payload_buf.get_u32();
                let begin = payload_buf.get_u32();
                let length = payload_buf.get_u32();
                if id == 6 {
                    PeerMessage::Request {
                        index,
                        begin,
                        length,
                    }
                } else {
                    PeerMessage::Cancel {
                        index,
                        begin,
                        length,
                    }
                }
            }
            7 => {
                if payload.len() < 8 {
                    return Err(malformed());
                }
                let index = payload_buf.get_u32();
                let begin = payload_buf.get_u32();
                PeerMessage::Piece {
                    index,
                    begin,
                    block: payload_buf.to_vec(),
                }
            }
            _ => return Ok(None),
        };

        Ok(Some(message))
    }
}
