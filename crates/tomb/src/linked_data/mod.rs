//! Content addressing primitives.
//!
//! Everything the engine persists is an immutable block addressed by the
//! BLAKE3 hash of its bytes:
//!
//! - **[`Hash`]**: a 32-byte BLAKE3 digest
//! - **[`Link`]**: a codec-tagged pointer to a block, interoperable with CIDs
//! - **[`BlockEncoded`]**: DAG-CBOR encode/decode for block types
//!
//! Encrypted blocks (nodes, file data) are stored under [`LD_RAW_CODEC`]
//! since their plaintext structure is not visible to the store. Manifests
//! are stored unencrypted under [`LD_DAG_CBOR_CODEC`].

mod codec;
mod hash;
mod link;

pub use codec::{BlockEncoded, CodecError, DagCborCodec};
pub use hash::{Hash, HASH_SIZE};
pub use link::{Link, BLAKE3_MH_CODE, LD_DAG_CBOR_CODEC, LD_RAW_CODEC};

/// Arbitrary IPLD values carried in node metadata maps.
pub type LinkedData = ipld_core::ipld::Ipld;
