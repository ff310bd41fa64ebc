use cid::Cid;
use multihash::Multihash;
use serde::{Deserialize, Serialize};

use super::codec::CodecError;
use super::hash::{Hash, HASH_SIZE};

/// Multicodec for raw (encrypted) blocks
pub const LD_RAW_CODEC: u64 = 0x55;
/// Multicodec for DAG-CBOR blocks
pub const LD_DAG_CBOR_CODEC: u64 = 0x71;
/// Multihash code for BLAKE3
pub const BLAKE3_MH_CODE: u64 = 0x1e;

/// A codec-tagged pointer to a content-addressed block.
///
/// Serialized as a CIDv1 (BLAKE3 multihash), so links survive round-trips
/// through any IPLD-aware store. Encrypted blocks always carry
/// [`LD_RAW_CODEC`] since their contents are opaque ciphertext.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Link {
    codec: u64,
    hash: Hash,
}

impl Link {
    pub fn new(codec: u64, hash: Hash) -> Self {
        Link { codec, hash }
    }

    pub fn codec(&self) -> u64 {
        self.codec
    }

    pub fn hash(&self) -> Hash {
        self.hash
    }

    pub fn to_cid(&self) -> Result<Cid, CodecError> {
        let mh = Multihash::<64>::wrap(BLAKE3_MH_CODE, self.hash.as_bytes())
            .map_err(|e| CodecError::Multihash(e.to_string()))?;
        Ok(Cid::new_v1(self.codec, mh))
    }

    pub fn from_cid(cid: &Cid) -> Result<Self, CodecError> {
        let mh = cid.hash();
        if mh.code() != BLAKE3_MH_CODE || mh.digest().len() != HASH_SIZE {
            return Err(CodecError::Multihash(format!(
                "unsupported multihash: code {:#x}, {} byte digest",
                mh.code(),
                mh.digest().len()
            )));
        }
        let mut bytes = [0u8; HASH_SIZE];
        bytes.copy_from_slice(mh.digest());
        Ok(Link {
            codec: cid.codec(),
            hash: Hash::from_bytes(bytes),
        })
    }
}

impl Serialize for Link {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let cid = self.to_cid().map_err(serde::ser::Error::custom)?;
        cid.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Link {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let cid = Cid::deserialize(deserializer)?;
        Link::from_cid(&cid).map_err(serde::de::Error::custom)
    }
}

impl std::fmt::Display for Link {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.to_cid() {
            Ok(cid) => write!(f, "{}", cid),
            Err(_) => write!(f, "{:#x}:{}", self.codec, self.hash),
        }
    }
}
