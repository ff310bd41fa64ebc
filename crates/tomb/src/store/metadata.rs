use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::crypto::PublicKey;
use crate::linked_data::Link;

/// How a bucket is driven: interactively edited or written by backup jobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BucketType {
    Interactive,
    Backup,
}

/// Storage tier the bucket's content blocks are provisioned on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageClass {
    Hot,
    Warm,
    Cold,
}

impl std::fmt::Display for StorageClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageClass::Hot => write!(f, "hot"),
            StorageClass::Warm => write!(f, "warm"),
            StorageClass::Cold => write!(f, "cold"),
        }
    }
}

/// Lightweight bucket record, as returned by `list_buckets`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bucket {
    pub id: Uuid,
    pub name: String,
    pub bucket_type: BucketType,
    pub storage_class: StorageClass,
}

/// An immutable reference to one historical tree version of a bucket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub id: Uuid,
    pub bucket_id: Uuid,
    /// The metadata version (manifest link) this snapshot pins.
    pub link: Link,
    pub created_at: DateTime<Utc>,
    /// Total plaintext bytes of file content in the snapshotted tree.
    pub size: u64,
}

/// A device key registered with the account, optionally granted on buckets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserKey {
    pub name: String,
    pub fingerprint: String,
    pub public_key: PublicKey,
    pub approved: bool,
}

impl UserKey {
    pub fn new(name: String, public_key: PublicKey, approved: bool) -> Self {
        Self {
            name,
            fingerprint: public_key.fingerprint(),
            public_key,
            approved,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum MetadataStoreError {
    #[error("account not found: {0}")]
    AccountNotFound(Uuid),
    #[error("bucket not found: {0}")]
    BucketNotFound(Uuid),
    #[error("bucket name already in use: {0}")]
    NameConflict(String),
    #[error("snapshot not found: {0}")]
    SnapshotNotFound(Uuid),
    #[error("key not found: {0}")]
    KeyNotFound(String),
    #[error("key is not authorized on this bucket: {0}")]
    AccessRevoked(String),
    #[error("version conflict at height {0}")]
    Conflict(u64),
    #[error("invalid append: {0} at height {1}")]
    InvalidAppend(Link, u64),
    #[error("head not found for bucket {0}")]
    HeadNotFound(Uuid),
    #[error("remote metadata store failure: {0}")]
    Remote(String),
}

/// The account-scoped control plane.
///
/// The version log per bucket is append-only: each entry links a new
/// manifest to its parent at `height - 1`, and the store validates chain
/// structure on `append` (same link at the same height is a `Conflict`,
/// a missing parent is an `InvalidAppend`). The store also authorizes
/// each append against the bucket's access grants, which is how revoked
/// keys and deleted buckets surface as terminal `Locked` errors in the
/// mount layer.
#[async_trait]
pub trait MetadataStore: Send + Sync + std::fmt::Debug + 'static {
    // accounts

    async fn account_exists(&self, account_id: Uuid) -> Result<bool, MetadataStoreError>;

    /// Aggregate stored bytes for the account, maintained by the store.
    async fn usage(&self, account_id: Uuid) -> Result<u64, MetadataStoreError>;

    async fn usage_limit(&self, account_id: Uuid) -> Result<u64, MetadataStoreError>;

    /// Adjust the usage counter after a successful write or delete.
    async fn add_usage(&self, account_id: Uuid, delta: i64) -> Result<(), MetadataStoreError>;

    // bucket records

    async fn create_bucket(
        &self,
        account_id: Uuid,
        bucket: Bucket,
    ) -> Result<(), MetadataStoreError>;

    async fn list_buckets(&self, account_id: Uuid) -> Result<Vec<Bucket>, MetadataStoreError>;

    async fn get_bucket(&self, bucket_id: Uuid) -> Result<Bucket, MetadataStoreError>;

    async fn rename_bucket(&self, bucket_id: Uuid, name: String)
        -> Result<(), MetadataStoreError>;

    /// Irreversibly drop the bucket record, its version log, snapshots,
    /// and access grants.
    async fn delete_bucket(&self, bucket_id: Uuid) -> Result<(), MetadataStoreError>;

    // version log

    /// Append a new version to a bucket's log.
    ///
    /// `author` is the fingerprint of the key pushing the version; it must
    /// hold an approved grant on the bucket. `previous` may only be `None`
    /// for the genesis entry at height 0.
    async fn append(
        &self,
        bucket_id: Uuid,
        author: &str,
        current: Link,
        previous: Option<Link>,
        height: u64,
    ) -> Result<(), MetadataStoreError>;

    /// The current head of the bucket's version log.
    async fn head(&self, bucket_id: Uuid) -> Result<(Link, u64), MetadataStoreError>;

    /// Heights at which a link appears in the bucket's log.
    async fn has(&self, bucket_id: Uuid, link: &Link) -> Result<Vec<u64>, MetadataStoreError>;

    // snapshots

    async fn put_snapshot(&self, snapshot: Snapshot) -> Result<(), MetadataStoreError>;

    async fn get_snapshot(
        &self,
        bucket_id: Uuid,
        snapshot_id: Uuid,
    ) -> Result<Snapshot, MetadataStoreError>;

    async fn list_snapshots(&self, bucket_id: Uuid) -> Result<Vec<Snapshot>, MetadataStoreError>;

    // device keys and access grants

    async fn create_user_key(
        &self,
        account_id: Uuid,
        key: UserKey,
    ) -> Result<(), MetadataStoreError>;

    async fn rename_user_key(
        &self,
        account_id: Uuid,
        fingerprint: &str,
        name: String,
    ) -> Result<(), MetadataStoreError>;

    async fn approve_user_key(
        &self,
        account_id: Uuid,
        fingerprint: &str,
    ) -> Result<(), MetadataStoreError>;

    async fn list_user_keys(&self, account_id: Uuid) -> Result<Vec<UserKey>, MetadataStoreError>;

    async fn get_user_key(
        &self,
        account_id: Uuid,
        fingerprint: &str,
    ) -> Result<UserKey, MetadataStoreError>;

    async fn grant_bucket_access(
        &self,
        bucket_id: Uuid,
        key: UserKey,
    ) -> Result<(), MetadataStoreError>;

    async fn revoke_bucket_access(
        &self,
        bucket_id: Uuid,
        fingerprint: &str,
    ) -> Result<(), MetadataStoreError>;

    async fn list_bucket_access(&self, bucket_id: Uuid)
        -> Result<Vec<UserKey>, MetadataStoreError>;
}
