/// Pieces a remote peer claims to have, one bit per piece.
///
/// Bits are numbered from the high bit of the first byte.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Bitfield {
    data: Vec<u8>,
}

impl Bitfield {
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self { data: bytes }
    }

    /// Builds a bitfield with exactly the given pieces set.
    pub fn from_pieces(pieces: impl IntoIterator<Item = usize>) -> Self {
        let mut bitfield = Self::default();
        for index in pieces {
            bitfield.set_piece(index);
        }
        bitfield
    }

    pub fn has_piece(&self, index: usize) -> bool {
        let byte_index = index / 8;
        let bit_index = index % 8;

        // Out of bounds check, usize can't be negative
        if byte_index >= self.data.len() {
            return false;
        }

        // Big endian bit ordering
        self.data[byte_index] & (1 << (7 - bit_index)) != 0
    }

    /// Marks a piece as present, growing the field when a peer announces an index past
    /// the end of the bitfield it sent earlier.
    pub fn set_piece(&mut self, index: usize) {
        let byte_index = index / 8;
        if byte_index >= self.data.len() {
            self.data.resize(byte_index + 1, 0);
        }
        self.data[byte_index] |= 1 << (7 - index % 8);
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }
}
