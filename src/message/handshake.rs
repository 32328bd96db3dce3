use super::WireError;

const PROTOCOL_IDENTIFIER_LENGTH: u8 = 19;
const PROTOCOL_IDENTIFIER: [u8; 19] = *b"BitTorrent protocol";
pub const HANDSHAKE_LENGTH: usize = 68;

pub type InfoHash = [u8; 20];
pub type PeerId = [u8; 20];

/// The fixed 68 byte greeting sent by both sides before any framed message.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Handshake {
    length: u8,
    pstr: [u8; PROTOCOL_IDENTIFIER_LENGTH as usize],
    reserved: [u8; 8],
    pub info_hash: InfoHash,
    pub peer_id: PeerId,
}

impl Handshake {
    pub fn new(info_hash: InfoHash, peer_id: PeerId) -> Self {
        Self {
            length: PROTOCOL_IDENTIFIER_LENGTH,
            pstr: PROTOCOL_IDENTIFIER,
            reserved: [0; 8],
            info_hash,
            peer_id,
        }
    }

    pub fn to_bytes(self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(HANDSHAKE_LENGTH);
        bytes.push(self.length);
        bytes.extend_from_slice(&self.pstr);
        bytes.extend_from_slice(&self.reserved);
        bytes.extend_from_slice(&self.info_hash);
        bytes.extend_from_slice(&self.peer_id);
        bytes
    }

    /// Parses the first [`HANDSHAKE_LENGTH`] bytes of `data`; anything after is ignored.
    pub fn decode(data: &[u8]) -> Result<Self, WireError> {
        if data.len() < HANDSHAKE_LENGTH {
            return Err(WireError::InvalidHandshake("frame is shorter than 68 bytes"));
        }

        if data[0] != PROTOCOL_IDENTIFIER_LENGTH || data[1..20] != PROTOCOL_IDENTIFIER {
            return Err(WireError::InvalidHandshake("unknown protocol identifier"));
        }

        let mut reserved = [0u8; 8];
        reserved.copy_from_slice(&data[20..28]);
        let mut info_hash = [0u8; 20];
        info_hash.copy_from_slice(&data[28..48]);
        let mut peer_id = [0u8; 20];
        peer_id.copy_from_slice(&data[48..68]);

        Ok(Self {
            length: PROTOCOL_IDENTIFIER_LENGTH,
            pstr: PROTOCOL_IDENTIFIER,
            reserved,
            info_hash,
            peer_id,
        })
    }
}
