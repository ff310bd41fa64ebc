use async_trait::async_trait;
use bytes::Bytes;

use crate::linked_data::Hash;

#[derive(Debug, thiserror::Error)]
pub enum ContentStoreError {
    #[error("block not found: {0}")]
    NotFound(Hash),
    #[error("remote content store failure: {0}")]
    Remote(String),
}

/// Content-addressed block storage.
///
/// The store never sees plaintext tree structure: nodes and file data are
/// encrypted before `put`, and blocks are immutable once written (the
/// address is the hash of the stored bytes). Garbage collection of
/// unreferenced blocks is a store-side concern.
#[async_trait]
pub trait ContentStore: Send + Sync + std::fmt::Debug + 'static {
    /// Store a block, returning its content address.
    async fn put(&self, data: Vec<u8>) -> Result<Hash, ContentStoreError>;

    /// Fetch a block by address.
    async fn get(&self, hash: &Hash) -> Result<Bytes, ContentStoreError>;

    /// Check whether a block is present.
    async fn has(&self, hash: &Hash) -> Result<bool, ContentStoreError>;
}
