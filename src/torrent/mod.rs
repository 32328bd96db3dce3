use anyhow::{bail, Context};
use core::fmt;
use serde_bencode::value::Value;
use serde_derive::{Deserialize, Serialize};
use sha1::{Digest, Sha1};
use std::path::{Path, PathBuf};

mod hashes;

pub use hashes::Hashes;

use crate::message::InfoHash;
use crate::piece::PieceLayout;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Torrent {
    /// The URL of the tracker.
    pub announce: String,
    pub info: Info,
    /// SHA-1 of the bencoded info dictionary as it appears in the file.
    #[serde(skip)]
    pub info_hash: InfoHash,
}

impl Torrent {
    pub fn from_bytes(bytes: &[u8]) -> anyhow::Result<Self> {
        let mut torrent: Torrent =
            serde_bencode::from_bytes(bytes).context("Failed parsing torrent file")?;
        torrent.info_hash = raw_info_hash(bytes).context("Failed to get info hash")?;

        if torrent.info.piece_length == 0 {
            bail!("Piece length is zero");
        }
        let expected = torrent.length().div_ceil(torrent.info.piece_length as u64);
        if expected != torrent.info.pieces.0.len() as u64 {
            bail!(
                "Torrent lists {} piece hashes but its length needs {}",
                torrent.info.pieces.0.len(),
                expected
            );
        }

        Ok(torrent)
    }

    #[tracing::instrument]
    pub async fn open(file: impl AsRef<Path> + fmt::Debug) -> anyhow::Result<Self> {
        let bytes = tokio::fs::read(file)
            .await
            .context("Failed opening torrent file")?;
        let torrent = Self::from_bytes(&bytes)?;

        tracing::info!("Successfully opened {}", torrent.info.name);
        Ok(torrent)
    }

    pub fn length(&self) -> u64 {
        match &self.info.keys {
            Keys::SingleFile { length } => *length as u64,
            Keys::MultiFile { files } => files.iter().map(|file| file.length as u64).sum(),
        }
    }

    pub fn is_multi_file(&self) -> bool {
        matches!(self.info.keys, Keys::MultiFile { .. })
    }

    pub fn layout(&self) -> PieceLayout {
        PieceLayout {
            piece_length: self.info.piece_length as u32,
            total_size: self.length(),
            hashes: self.info.pieces.0.clone(),
        }
    }

    /// Where the payload is written: `info.name` inside `download_dir`.
    ///
    /// Only the last path component of the name is used so a crafted name cannot
    /// escape the download directory.
    pub fn output_path(&self, download_dir: &Path) -> PathBuf {
        let name = Path::new(&self.info.name)
            .file_name()
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(hex::encode(self.info_hash)));
        download_dir.join(name)
    }
}

fn raw_info_hash(bytes: &[u8]) -> anyhow::Result<InfoHash> {
    let value: Value = serde_bencode::from_bytes(bytes).context("Torrent is not bencoded")?;
    let Value::Dict(mut root) = value else {
        bail!("Torrent file is not a dictionary");
    };
    let info = root
        .remove(&b"info"[..])
        .context("Torrent file has no info dictionary")?;

    let encoded = serde_bencode::to_bytes(&info).context("Failed to re-encode info torrent")?;
    Ok(Sha1::digest(&encoded).into())
}

// Structure mainly from https://github.com/jonhoo/codecrafters-bittorrent-rust/blob/master/src/torrent.rs

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Info {
    /// The suggested name to save the file (or directory) as. It is purely advisory.
    ///
    /// In the single file case, the name key is the name of a file, in the muliple file case, it's
    /// the name of a directory.
    pub name: String,

    /// The number of bytes in each piece the file is split into.
    ///
    /// For the purposes of transfer, files are split into fixed-size pieces which are all the same
    /// length except for possibly the last one which may be truncated.
    #[serde(rename = "piece length")]
    pub piece_length: usize,

    /// Each entry of `pieces` is the SHA1 hash of the piece at the corresponding index.
    pub pieces: Hashes,

    #[serde(flatten)]
    pub keys: Keys,
}

/// There is a key `length` or a key `files`, but not both or neither.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum Keys {
    /// If `length` is present then the download represents a single file.
    SingleFile {
        /// The length of the file in bytes.
        length: usize,
    },
    /// Otherwise it represents a set of files which go in a directory structure.
    ///
    /// For the purposes of the other keys in `Info`, the multi-file case is treated as only having
    /// a single file by concatenating the files in the order they appear in the files list.
    MultiFile { files: Vec<File> },
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct File {
    /// The length of the file, in bytes.
    pub length: usize,

    /// Subdirectory names for this file, the last of which is the actual file name
    /// (a zero length list is an error case).
    pub path: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn single_file(extra_info: &str) -> Vec<u8> {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(b"d8:announce28:http://tracker.test/announce4:infod");
        bytes.extend_from_slice(extra_info.as_bytes());
        bytes.extend_from_slice(b"6:lengthi6e4:name8:data.bin12:piece lengthi4e6:pieces40:");
        bytes.extend_from_slice(&[1u8; 20]);
        bytes.extend_from_slice(&[2u8; 20]);
        bytes.extend_from_slice(b"ee");
        bytes
    }

    #[test]
    fn test_parse_single_file() {
        let torrent = Torrent::from_bytes(&single_file("")).unwrap();

        assert_eq!(torrent.announce, "http://tracker.test/announce");
        assert_eq!(torrent.info.name, "data.bin");
        assert_eq!(torrent.length(), 6);
        assert!(!torrent.is_multi_file());

        let layout = torrent.layout();
        assert_eq!(layout.piece_count(), 2);
        assert_eq!(layout.piece_size(1), 2);
        assert_eq!(layout.hashes[1], [2u8; 20]);
    }

    #[test]
    fn test_info_hash_covers_unknown_keys() {
        let plain = Torrent::from_bytes(&single_file("")).unwrap();
        let private = Torrent::from_bytes(&single_file("7:privatei1e")).unwrap();

        assert_ne!(plain.info_hash, private.info_hash);
    }

    #[test]
    fn test_info_hash_is_sha1_of_info_dict() {
        let bytes = single_file("");
        let start = b"d8:announce28:http://tracker.test/announce4:info".len();
        let info = &bytes[start..bytes.len() - 1];

        let torrent = Torrent::from_bytes(&bytes).unwrap();
        let expected: [u8; 20] = Sha1::digest(info).into();
        assert_eq!(torrent.info_hash, expected);
    }

    #[test]
    fn test_multi_file_length() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(b"d8:announce3:url4:infod5:filesl");
        bytes.extend_from_slice(b"d6:lengthi3e4:pathl1:aeed6:lengthi5e4:pathl3:sub1:beee");
        bytes.extend_from_slice(b"4:name3:dir12:piece lengthi4e6:pieces40:");
        bytes.extend_from_slice(&[0u8; 40]);
        bytes.extend_from_slice(b"ee");

        let torrent = Torrent::from_bytes(&bytes).unwrap();
        assert!(torrent.is_multi_file());
        assert_eq!(torrent.length(), 8);
        assert_eq!(
            torrent.output_path(Path::new("/downloads")),
            PathBuf::from("/downloads/dir")
        );
    }

    #[test]
    fn test_hash_count_mismatch() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(b"d8:announce3:url4:infod6:lengthi9e4:name1:x");
        bytes.extend_from_slice(b"12:piece lengthi4e6:pieces20:");
        bytes.extend_from_slice(&[0u8; 20]);
        bytes.extend_from_slice(b"ee");

        assert!(Torrent::from_bytes(&bytes).is_err());
    }

    #[test]
    fn test_output_path_strips_directories() {
        let mut torrent = Torrent::from_bytes(&single_file("")).unwrap();
        torrent.info.name = "../../etc/passwd".to_string();

        assert_eq!(
            torrent.output_path(Path::new("out")),
            PathBuf::from("out/passwd")
        );
    }
}
