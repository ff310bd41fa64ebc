use serde_with::serde_as;
use serde_with::Bytes;

use serde::{Deserialize, Serialize};

/// Size of a BLAKE3 digest in bytes
pub const HASH_SIZE: usize = 32;

/// A BLAKE3 content hash
///
/// Blocks are addressed by the hash of their stored (post-encryption)
/// bytes, so hashes are stable and safe to share with untrusted stores.
#[serde_as]
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
pub struct Hash(#[serde_as(as = "Bytes")] [u8; HASH_SIZE]);

impl Hash {
    /// Hash a byte slice with BLAKE3
    pub fn compute(data: &[u8]) -> Self {
        Hash(*blake3::hash(data).as_bytes())
    }

    pub fn from_bytes(bytes: [u8; HASH_SIZE]) -> Self {
        Hash(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; HASH_SIZE] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse a hash from a hexadecimal string
    ///
    /// Accepts both plain hex and "0x"-prefixed hex strings.
    pub fn from_hex(hex_str: &str) -> Result<Self, hex::FromHexError> {
        let hex_str = hex_str.strip_prefix("0x").unwrap_or(hex_str);
        let mut buff = [0; HASH_SIZE];
        hex::decode_to_slice(hex_str, &mut buff)?;
        Ok(Hash(buff))
    }
}

impl From<[u8; HASH_SIZE]> for Hash {
    fn from(bytes: [u8; HASH_SIZE]) -> Self {
        Hash(bytes)
    }
}

impl std::fmt::Display for Hash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}
