//! Remote store boundary.
//!
//! The engine talks to two narrow remote dependencies:
//!
//! - **[`ContentStore`]**: opaque block storage, addressed by BLAKE3 hash.
//!   Holds encrypted nodes, encrypted file data, and plaintext manifests.
//! - **[`MetadataStore`]**: the account-scoped control plane. Owns bucket
//!   records, the append-only version log per bucket, snapshots, device
//!   keys and access grants, and usage counters.
//!
//! Both are trait objects so callers can plug in an HTTP client, a database,
//! or the in-memory implementations shipped here for tests and tooling.
//! The engine performs no retries of its own; transient failures surface as
//! `Remote` errors and retry policy belongs to the caller.

mod content;
mod memory;
mod metadata;

pub use content::{ContentStore, ContentStoreError};
pub use memory::{MemoryContentStore, MemoryMetadataStore};
pub use metadata::{
    Bucket, BucketType, MetadataStore, MetadataStoreError, Snapshot, StorageClass, UserKey,
};

use std::sync::Arc;

/// Handle to the pair of remote stores backing an account session.
///
/// This is the "endpoint" a [`TombClient`](crate::client::TombClient) is
/// constructed against.
#[derive(Clone, Debug)]
pub struct Remote {
    metadata: Arc<dyn MetadataStore>,
    content: Arc<dyn ContentStore>,
}

impl Remote {
    pub fn new(metadata: Arc<dyn MetadataStore>, content: Arc<dyn ContentStore>) -> Self {
        Self { metadata, content }
    }

    /// An entirely in-memory remote, for tests and local tooling.
    pub fn memory() -> Self {
        Self {
            metadata: Arc::new(MemoryMetadataStore::new()),
            content: Arc::new(MemoryContentStore::new()),
        }
    }

    pub fn metadata(&self) -> Arc<dyn MetadataStore> {
        self.metadata.clone()
    }

    pub fn content(&self) -> Arc<dyn ContentStore> {
        self.content.clone()
    }
}
