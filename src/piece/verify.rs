use sha1::{Digest, Sha1};

/// True when an assembled piece hashes to its entry in the metainfo `pieces` list.
pub fn verify_piece(data: &[u8], expected_hash: &[u8; 20]) -> bool {
    let actual: [u8; 20] = Sha1::digest(data).into();
    actual == *expected_hash
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_digest() {
        let expected = hex::decode("0a0a9f2a6772942557ab5355d76af442f8f65e01").unwrap();
        let expected: [u8; 20] = expected.try_into().unwrap();

        assert!(verify_piece(b"Hello, World!", &expected));
    }

    #[test]
    fn test_single_flipped_bit_fails() {
        let mut piece = vec![0xAB; 16384 * 2];
        let expected: [u8; 20] = Sha1::digest(&piece).into();
        assert!(verify_piece(&piece, &expected));

        piece[16384] ^= 0x01;
        assert!(!verify_piece(&piece, &expected));
    }

    #[test]
    fn test_truncated_piece_fails() {
        let piece = b"abcdefg";
        let expected: [u8; 20] = Sha1::digest(piece).into();

        assert!(!verify_piece(&piece[..6], &expected));
    }
}
