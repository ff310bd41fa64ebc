use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::RwLock;
use uuid::Uuid;

use crate::linked_data::{Hash, Link};

use super::content::{ContentStore, ContentStoreError};
use super::metadata::{Bucket, MetadataStore, MetadataStoreError, Snapshot, UserKey};

/// In-memory content store, for tests and local tooling.
#[derive(Debug, Clone, Default)]
pub struct MemoryContentStore {
    inner: Arc<RwLock<HashMap<Hash, Bytes>>>,
}

impl MemoryContentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of blocks currently held.
    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }
}

#[async_trait]
impl ContentStore for MemoryContentStore {
    async fn put(&self, data: Vec<u8>) -> Result<Hash, ContentStoreError> {
        let hash = Hash::compute(&data);
        self.inner.write().insert(hash, Bytes::from(data));
        Ok(hash)
    }

    async fn get(&self, hash: &Hash) -> Result<Bytes, ContentStoreError> {
        self.inner
            .read()
            .get(hash)
            .cloned()
            .ok_or(ContentStoreError::NotFound(*hash))
    }

    async fn has(&self, hash: &Hash) -> Result<bool, ContentStoreError> {
        Ok(self.inner.read().contains_key(hash))
    }
}

#[derive(Debug, Default)]
struct AccountRecord {
    usage: u64,
    usage_limit: u64,
    keys: BTreeMap<String, UserKey>,
}

#[derive(Debug)]
struct BucketRecord {
    account_id: Uuid,
    bucket: Bucket,
    /// height -> links appended at that height (forks keep multiple)
    entries: HashMap<u64, Vec<Link>>,
    max_height: Option<u64>,
    link_index: HashMap<Link, Vec<u64>>,
    access: BTreeMap<String, UserKey>,
    snapshots: BTreeMap<Uuid, Snapshot>,
}

impl BucketRecord {
    fn new(account_id: Uuid, bucket: Bucket) -> Self {
        Self {
            account_id,
            bucket,
            entries: HashMap::new(),
            max_height: None,
            link_index: HashMap::new(),
            access: BTreeMap::new(),
            snapshots: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Default)]
struct MemoryMetadataStoreInner {
    accounts: HashMap<Uuid, AccountRecord>,
    buckets: HashMap<Uuid, BucketRecord>,
}

/// In-memory metadata store.
///
/// Implements the full control-plane contract, including version-chain
/// validation and append authorization, so the mount layer can be
/// exercised end to end without a network.
#[derive(Debug, Clone, Default)]
pub struct MemoryMetadataStore {
    inner: Arc<RwLock<MemoryMetadataStoreInner>>,
}

impl MemoryMetadataStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Provision an account. Real deployments create accounts out of band;
    /// tests call this before constructing a client.
    pub fn register_account(&self, account_id: Uuid, usage_limit: u64) {
        let mut inner = self.inner.write();
        inner.accounts.entry(account_id).or_insert(AccountRecord {
            usage: 0,
            usage_limit,
            keys: BTreeMap::new(),
        });
    }
}

impl MemoryMetadataStoreInner {
    fn account(&self, id: Uuid) -> Result<&AccountRecord, MetadataStoreError> {
        self.accounts
            .get(&id)
            .ok_or(MetadataStoreError::AccountNotFound(id))
    }

    fn account_mut(&mut self, id: Uuid) -> Result<&mut AccountRecord, MetadataStoreError> {
        self.accounts
            .get_mut(&id)
            .ok_or(MetadataStoreError::AccountNotFound(id))
    }

    fn bucket(&self, id: Uuid) -> Result<&BucketRecord, MetadataStoreError> {
        self.buckets
            .get(&id)
            .ok_or(MetadataStoreError::BucketNotFound(id))
    }

    fn bucket_mut(&mut self, id: Uuid) -> Result<&mut BucketRecord, MetadataStoreError> {
        self.buckets
            .get_mut(&id)
            .ok_or(MetadataStoreError::BucketNotFound(id))
    }

    /// Case-sensitive, per-account name uniqueness.
    fn name_taken(&self, account_id: Uuid, name: &str, ignore: Option<Uuid>) -> bool {
        self.buckets.values().any(|r| {
            r.account_id == account_id && r.bucket.name == name && Some(r.bucket.id) != ignore
        })
    }
}

#[async_trait]
impl MetadataStore for MemoryMetadataStore {
    async fn account_exists(&self, account_id: Uuid) -> Result<bool, MetadataStoreError> {
        Ok(self.inner.read().accounts.contains_key(&account_id))
    }

    async fn usage(&self, account_id: Uuid) -> Result<u64, MetadataStoreError> {
        Ok(self.inner.read().account(account_id)?.usage)
    }

    async fn usage_limit(&self, account_id: Uuid) -> Result<u64, MetadataStoreError> {
        Ok(self.inner.read().account(account_id)?.usage_limit)
    }

    async fn add_usage(&self, account_id: Uuid, delta: i64) -> Result<(), MetadataStoreError> {
        let mut inner = self.inner.write();
        let account = inner.account_mut(account_id)?;
        account.usage = if delta >= 0 {
            account.usage.saturating_add(delta as u64)
        } else {
            account.usage.saturating_sub(delta.unsigned_abs())
        };
        Ok(())
    }

    async fn create_bucket(
        &self,
        account_id: Uuid,
        bucket: Bucket,
    ) -> Result<(), MetadataStoreError> {
        let mut inner = self.inner.write();
        inner.account(account_id)?;
        if inner.name_taken(account_id, &bucket.name, None) {
            return Err(MetadataStoreError::NameConflict(bucket.name));
        }
        inner
            .buckets
            .insert(bucket.id, BucketRecord::new(account_id, bucket));
        Ok(())
    }

    async fn list_buckets(&self, account_id: Uuid) -> Result<Vec<Bucket>, MetadataStoreError> {
        let inner = self.inner.read();
        let mut buckets: Vec<Bucket> = inner
            .buckets
            .values()
            .filter(|r| r.account_id == account_id)
            .map(|r| r.bucket.clone())
            .collect();
        buckets.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(buckets)
    }

    async fn get_bucket(&self, bucket_id: Uuid) -> Result<Bucket, MetadataStoreError> {
        Ok(self.inner.read().bucket(bucket_id)?.bucket.clone())
    }

    async fn rename_bucket(
        &self,
        bucket_id: Uuid,
        name: String,
    ) -> Result<(), MetadataStoreError> {
        let mut inner = self.inner.write();
        let account_id = inner.bucket(bucket_id)?.account_id;
        if inner.name_taken(account_id, &name, Some(bucket_id)) {
            return Err(MetadataStoreError::NameConflict(name));
        }
        inner.bucket_mut(bucket_id)?.bucket.name = name;
        Ok(())
    }

    async fn delete_bucket(&self, bucket_id: Uuid) -> Result<(), MetadataStoreError> {
        let mut inner = self.inner.write();
        inner
            .buckets
            .remove(&bucket_id)
            .map(|_| ())
            .ok_or(MetadataStoreError::BucketNotFound(bucket_id))
    }

    async fn append(
        &self,
        bucket_id: Uuid,
        author: &str,
        current: Link,
        previous: Option<Link>,
        height: u64,
    ) -> Result<(), MetadataStoreError> {
        let mut inner = self.inner.write();
        let record = inner.bucket_mut(bucket_id)?;

        let authorized = record
            .access
            .get(author)
            .map(|key| key.approved)
            .unwrap_or(false);
        if !authorized {
            return Err(MetadataStoreError::AccessRevoked(author.to_string()));
        }

        if let Some(existing) = record.entries.get(&height) {
            if existing.contains(&current) {
                return Err(MetadataStoreError::Conflict(height));
            }
        }

        match &previous {
            Some(prev) => {
                if height == 0 {
                    return Err(MetadataStoreError::InvalidAppend(current, height));
                }
                let parent_exists = record
                    .entries
                    .get(&(height - 1))
                    .map(|links| links.contains(prev))
                    .unwrap_or(false);
                if !parent_exists {
                    return Err(MetadataStoreError::InvalidAppend(current, height));
                }
            }
            None => {
                // only genesis may be parentless
                if height != 0 {
                    return Err(MetadataStoreError::InvalidAppend(current, height));
                }
            }
        }

        record.entries.entry(height).or_default().push(current.clone());
        if record.max_height.map(|h| height > h).unwrap_or(true) {
            record.max_height = Some(height);
        }
        record.link_index.entry(current).or_default().push(height);
        Ok(())
    }

    async fn head(&self, bucket_id: Uuid) -> Result<(Link, u64), MetadataStoreError> {
        let inner = self.inner.read();
        let record = inner.bucket(bucket_id)?;
        let height = record
            .max_height
            .ok_or(MetadataStoreError::HeadNotFound(bucket_id))?;
        let link = record
            .entries
            .get(&height)
            .and_then(|links| links.iter().max().cloned())
            .ok_or(MetadataStoreError::HeadNotFound(bucket_id))?;
        Ok((link, height))
    }

    async fn has(&self, bucket_id: Uuid, link: &Link) -> Result<Vec<u64>, MetadataStoreError> {
        let inner = self.inner.read();
        Ok(inner
            .bucket(bucket_id)?
            .link_index
            .get(link)
            .cloned()
            .unwrap_or_default())
    }

    async fn put_snapshot(&self, snapshot: Snapshot) -> Result<(), MetadataStoreError> {
        let mut inner = self.inner.write();
        let record = inner.bucket_mut(snapshot.bucket_id)?;
        record.snapshots.insert(snapshot.id, snapshot);
        Ok(())
    }

    async fn get_snapshot(
        &self,
        bucket_id: Uuid,
        snapshot_id: Uuid,
    ) -> Result<Snapshot, MetadataStoreError> {
        let inner = self.inner.read();
        inner
            .bucket(bucket_id)?
            .snapshots
            .get(&snapshot_id)
            .cloned()
            .ok_or(MetadataStoreError::SnapshotNotFound(snapshot_id))
    }

    async fn list_snapshots(&self, bucket_id: Uuid) -> Result<Vec<Snapshot>, MetadataStoreError> {
        let inner = self.inner.read();
        let mut snapshots: Vec<Snapshot> =
            inner.bucket(bucket_id)?.snapshots.values().cloned().collect();
        snapshots.sort_by_key(|s| s.created_at);
        Ok(snapshots)
    }

    async fn create_user_key(
        &self,
        account_id: Uuid,
        key: UserKey,
    ) -> Result<(), MetadataStoreError> {
        let mut inner = self.inner.write();
        let account = inner.account_mut(account_id)?;
        account.keys.insert(key.fingerprint.clone(), key);
        Ok(())
    }

    async fn rename_user_key(
        &self,
        account_id: Uuid,
        fingerprint: &str,
        name: String,
    ) -> Result<(), MetadataStoreError> {
        let mut inner = self.inner.write();
        let account = inner.account_mut(account_id)?;
        let key = account
            .keys
            .get_mut(fingerprint)
            .ok_or_else(|| MetadataStoreError::KeyNotFound(fingerprint.to_string()))?;
        key.name = name;
        Ok(())
    }

    async fn approve_user_key(
        &self,
        account_id: Uuid,
        fingerprint: &str,
    ) -> Result<(), MetadataStoreError> {
        let mut inner = self.inner.write();
        let account = inner.account_mut(account_id)?;
        let key = account
            .keys
            .get_mut(fingerprint)
            .ok_or_else(|| MetadataStoreError::KeyNotFound(fingerprint.to_string()))?;
        key.approved = true;
        Ok(())
    }

    async fn list_user_keys(&self, account_id: Uuid) -> Result<Vec<UserKey>, MetadataStoreError> {
        let inner = self.inner.read();
        Ok(inner.account(account_id)?.keys.values().cloned().collect())
    }

    async fn get_user_key(
        &self,
        account_id: Uuid,
        fingerprint: &str,
    ) -> Result<UserKey, MetadataStoreError> {
        let inner = self.inner.read();
        inner
            .account(account_id)?
            .keys
            .get(fingerprint)
            .cloned()
            .ok_or_else(|| MetadataStoreError::KeyNotFound(fingerprint.to_string()))
    }

    async fn grant_bucket_access(
        &self,
        bucket_id: Uuid,
        key: UserKey,
    ) -> Result<(), MetadataStoreError> {
        let mut inner = self.inner.write();
        let record = inner.bucket_mut(bucket_id)?;
        record.access.insert(key.fingerprint.clone(), key);
        Ok(())
    }

    async fn revoke_bucket_access(
        &self,
        bucket_id: Uuid,
        fingerprint: &str,
    ) -> Result<(), MetadataStoreError> {
        let mut inner = self.inner.write();
        let record = inner.bucket_mut(bucket_id)?;
        record
            .access
            .remove(fingerprint)
            .map(|_| ())
            .ok_or_else(|| MetadataStoreError::KeyNotFound(fingerprint.to_string()))
    }

    async fn list_bucket_access(
        &self,
        bucket_id: Uuid,
    ) -> Result<Vec<UserKey>, MetadataStoreError> {
        let inner = self.inner.read();
        Ok(inner.bucket(bucket_id)?.access.values().cloned().collect())
    }
}
