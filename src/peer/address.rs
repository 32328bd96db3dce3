use crate::peer::PeerAddresses;

use serde::de::{self, Deserialize, Deserializer, SeqAccess, Visitor};
use serde::ser::{Serialize, Serializer};
use serde_derive::Deserialize;
use std::fmt;
use std::net::{Ipv4Addr, SocketAddrV4};
use tracing::debug;

/// Dictionary form of a tracker peer entry; the peer id is not needed to dial.
#[derive(Deserialize)]
struct PeerEntry {
    ip: String,
    port: u16,
}

struct PeerAddressesVisitor;

impl<'de> Visitor<'de> for PeerAddressesVisitor {
    type Value = PeerAddresses;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str(
            "a compact string of 6 byte entries or a list of dictionaries with ip and port",
        )
    }

    fn visit_bytes<E>(self, v: &[u8]) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        if v.len() % 6 != 0 {
            return Err(E::custom(format!("compact peers length is {}", v.len())));
        }
        Ok(PeerAddresses(
            v.chunks_exact(6)
                .map(|entry| {
                    SocketAddrV4::new(
                        Ipv4Addr::new(entry[0], entry[1], entry[2], entry[3]),
                        u16::from_be_bytes([entry[4], entry[5]]),
                    )
                })
                .collect(),
        ))
    }

    fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
    where
        A: SeqAccess<'de>,
    {
        let mut addresses = Vec::with_capacity(seq.size_hint().unwrap_or(0));
        while let Some(entry) = seq.next_element::<PeerEntry>()? {
            match entry.ip.parse::<Ipv4Addr>() {
                Ok(ip) => addresses.push(SocketAddrV4::new(ip, entry.port)),
                Err(_) => debug!(ip = %entry.ip, "Skipping non IPv4 peer"),
            }
        }
        Ok(PeerAddresses(addresses))
    }
}

impl<'de> Deserialize<'de> for PeerAddresses {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_any(PeerAddressesVisitor)
    }
}

impl Serialize for PeerAddresses {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut compact = Vec::with_capacity(6 * self.0.len());
        for peer in &self.0 {
            compact.extend(peer.ip().octets());
            compact.extend(peer.port().to_be_bytes());
        }
        serializer.serialize_bytes(&compact)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compact_peers() {
        let encoded = b"12:\x7f\x00\x00\x01\x1a\xe1\x0a\x00\x00\x02\x00\x50";
        let peers: PeerAddresses = serde_bencode::from_bytes(encoded).unwrap();

        assert_eq!(
            peers.0,
            vec![
                "127.0.0.1:6881".parse::<SocketAddrV4>().unwrap(),
                "10.0.0.2:80".parse().unwrap(),
            ]
        );
    }

    #[test]
    fn test_compact_peers_bad_length() {
        let encoded = b"5:\x7f\x00\x00\x01\x1a";
        assert!(serde_bencode::from_bytes::<PeerAddresses>(encoded).is_err());
    }

    #[test]
    fn test_dictionary_peers() {
        let encoded = b"ld2:ip9:127.0.0.17:peer id20:aaaaaaaaaaaaaaaaaaaa4:porti6881eed2:ip3:::14:porti80eee";
        let peers: PeerAddresses = serde_bencode::from_bytes(encoded).unwrap();

        assert_eq!(peers.0, vec!["127.0.0.1:6881".parse().unwrap()]);
    }

    #[test]
    fn test_serialize_compact() {
        let peers = PeerAddresses(vec!["127.0.0.1:6881".parse().unwrap()]);
        let encoded = serde_bencode::to_bytes(&peers).unwrap();

        assert_eq!(encoded, b"6:\x7f\x00\x00\x01\x1a\xe1");
    }
}
