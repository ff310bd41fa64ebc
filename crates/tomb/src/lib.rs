/**
 * Client surface for driving an account:
 *  bucket lifecycle, device keys, grants,
 *  snapshots, and usage.
 */
pub mod client;
/**
 * Cryptographic types and operations.
 *  - Ed25519 device keys (PEM on the wire)
 *  - Per-block symmetric secrets
 *  - Key-to-key secret sharing
 */
pub mod crypto;
/**
 * Content-addressed block primitives:
 *  BLAKE3 hashes, CID-compatible links, and
 *  the DAG-CBOR block codec.
 */
pub mod linked_data;
/**
 * The encrypted file tree and the mount
 *  session that reads and versions it.
 */
pub mod mount;
/**
 * The remote store boundary: content blocks
 *  and the account control plane, plus the
 *  in-memory implementations.
 */
pub mod store;

pub mod prelude {
    pub use crate::client::{ClientError, TombClient};
    pub use crate::crypto::{PublicKey, Secret, SecretKey, SecretShare};
    pub use crate::linked_data::{Hash, Link};
    pub use crate::mount::{FsNode, Manifest, Mount, MountError, NodeKind};
    pub use crate::store::{
        Bucket, BucketType, Remote, Snapshot, StorageClass, UserKey,
    };
}
