use std::convert::TryInto;
use std::fmt;
use std::str::FromStr;

use blake2::{Blake2b512, Digest};
use ed25519_dalek::PublicKey;
use serde::{Deserialize, Serialize};

/// Length in bytes of a `NodeId`.
pub const NODE_ID_LENGTH: usize = 20;

/// Cryptographic identity of a node: the truncated hash of its ed25519 public key.
#[derive(Hash, Eq, PartialEq, Ord, PartialOrd, Copy, Clone, Serialize, Deserialize, Default)]
pub struct NodeId(pub [u8; NODE_ID_LENGTH]);

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl FromStr for NodeId {
    type Err = crate::Error;

    /// Converts a hex encoded string to the bytes of a `NodeId`
    fn from_str(id_str: &str) -> Result<Self, crate::Error> {
        let bytes = hex::decode(id_str).map_err(|_| crate::Error::TryFromStringError)?;
        let bytes: [u8; NODE_ID_LENGTH] =
            bytes.as_slice().try_into().map_err(|_| crate::Error::TryFromStringError)?;
        Ok(NodeId(bytes))
    }
}

impl NodeId {
    /// Derives the id of the node owning `public_key`.
    pub fn from_public_key(public_key: &PublicKey) -> NodeId {
        NodeId::new(public_key.as_bytes())
    }

    /// Hashes an arbitrary byte slice into an id
    pub fn new(bytes: &[u8]) -> NodeId {
        NodeId(hash(bytes))
    }

    /// Returns a slice to the contained byte array
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

fn hash(input: &[u8]) -> [u8; NODE_ID_LENGTH] {
    let digest = Blake2b512::digest(input);
    let mut buf = [0u8; NODE_ID_LENGTH];
    buf.copy_from_slice(&digest[..NODE_ID_LENGTH]);
    buf
}

#[cfg(test)]
mod tests {
    use super::*;

    use ed25519_dalek::SecretKey;

    #[test]
    fn test_from_public_key_is_stable() {
        let secret = SecretKey::from_bytes(&[7u8; 32]).unwrap();
        let public: PublicKey = (&secret).into();
        let id1 = NodeId::from_public_key(&public);
        let id2 = NodeId::from_public_key(&public);
        assert_eq!(id1, id2);
        assert_ne!(id1, NodeId::default());
    }

    #[test]
    fn test_display_parse() {
        let id = NodeId::new(b"node-1");
        let s = id.to_string();
        assert_eq!(s.len(), NODE_ID_LENGTH * 2);
        let parsed: NodeId = s.parse().unwrap();
        assert_eq!(parsed, id);
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        assert!("not-hex".parse::<NodeId>().is_err());
        assert!("abcd".parse::<NodeId>().is_err());
    }
}
