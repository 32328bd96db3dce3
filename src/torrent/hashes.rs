use serde::de::{self, Deserialize, Deserializer};
use serde::ser::{Serialize, Serializer};
use serde_bytes::ByteBuf;

/// The `pieces` string of the info dictionary, split into one SHA-1 per piece.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hashes(pub Vec<[u8; 20]>);

impl<'de> Deserialize<'de> for Hashes {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let bytes = ByteBuf::deserialize(deserializer)?;
        if bytes.len() % 20 != 0 {
            return Err(de::Error::custom(format!(
                "pieces length {} is not a multiple of 20",
                bytes.len()
            )));
        }

        Ok(Hashes(
            bytes
                .chunks_exact(20)
                .map(|chunk| {
                    let mut hash = [0u8; 20];
                    hash.copy_from_slice(chunk);
                    hash
                })
                .collect(),
        ))
    }
}

impl Serialize for Hashes {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let joined = self.0.concat();
        serializer.serialize_bytes(&joined)
    }
}
