use bytes::{Buf, BytesMut};
use tokio_util::codec::{Decoder, Encoder};
use tracing::{debug, warn};

use super::{PeerMessage, WireError, LENGTH_PREFIX};

// DDoS Protection
const MAX_MESSAGE_SIZE: usize = 16 * 1024 * 1024; // 16 MB

/// Reassembles length-prefixed frames out of the socket byte stream.
///
/// Wrapped in a `Framed`, it yields one decoded [`PeerMessage`] at a time and consumes
/// exactly the bytes of each frame it returns.
#[derive(Debug, Default, Clone, Copy)]
pub struct MessageCodec;

impl Decoder for MessageCodec {
    type Item = PeerMessage;

    type Error = WireError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        loop {
            if src.len() < LENGTH_PREFIX {
                // Length prefix is 4 bytes
                return Ok(None);
            }

            let length = u32::from_be_bytes([src[0], src[1], src[2], src[3]]) as usize;
            if length == 0 {
                src.advance(LENGTH_PREFIX);
                return Ok(Some(PeerMessage::KeepAlive));
            }

            if length > MAX_MESSAGE_SIZE {
                return Err(WireError::FrameTooLarge(length));
            }

            // Not full frame is received, wait for more
            let frame_len = LENGTH_PREFIX + length;
            if src.len() < frame_len {
                src.reserve(frame_len - src.len());
                return Ok(None);
            }

            let frame = src.split_to(frame_len);
            match PeerMessage::decode(&frame)? {
                Some(message) => return Ok(Some(message)),
                None => warn!(id = frame[LENGTH_PREFIX], "Discarding unsupported message"),
            }
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match self.decode(src)? {
            Some(message) => Ok(Some(message)),
            None => {
                if !src.is_empty() {
                    debug!(
                        remaining = src.len(),
                        "Stream ended with a partial frame buffered"
                    );
                    src.clear();
                }
                Ok(None)
            }
        }
    }
}

impl Encoder<PeerMessage> for MessageCodec {
    type Error = WireError;

    fn encode(&mut self, item: PeerMessage, dst: &mut BytesMut) -> Result<(), Self::Error> {
        item.encode_into(dst);
        Ok(())
    }
}
