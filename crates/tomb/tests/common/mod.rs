//! Shared test utilities for mount integration tests
#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Once};

use async_trait::async_trait;
use uuid::Uuid;

use tomb::client::TombClient;
use tomb::crypto::SecretKey;
use tomb::linked_data::Link;
use tomb::mount::Mount;
use tomb::store::{
    Bucket, BucketType, MemoryContentStore, MemoryMetadataStore, MetadataStore,
    MetadataStoreError, Remote, Snapshot, StorageClass, UserKey,
};

pub const USAGE_LIMIT: u64 = 1024 * 1024;

static TRACING: Once = Once::new();

/// Route engine tracing through the test harness, honoring `RUST_LOG`.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

pub struct TestEnv {
    pub remote: Remote,
    pub metadata: MemoryMetadataStore,
    pub client: TombClient,
    pub account_id: Uuid,
    pub bucket_id: Uuid,
    pub bucket_key: SecretKey,
    pub mount: Mount,
}

/// An account with one bucket mounted, against in-memory stores.
pub async fn setup() -> TestEnv {
    setup_with_limit(USAGE_LIMIT).await
}

pub async fn setup_with_limit(usage_limit: u64) -> TestEnv {
    init_tracing();
    let metadata = MemoryMetadataStore::new();
    let account_id = Uuid::new_v4();
    metadata.register_account(account_id, usage_limit);
    let remote = Remote::new(
        Arc::new(metadata.clone()),
        Arc::new(MemoryContentStore::new()),
    );

    let session_key = SecretKey::generate();
    let client = TombClient::new(&session_key.to_pem(), account_id, remote.clone())
        .await
        .unwrap();

    let bucket_key = SecretKey::generate();
    let (bucket, mount) = client
        .create_bucket_and_mount(
            "test",
            StorageClass::Hot,
            BucketType::Interactive,
            &bucket_key.to_pem(),
            &bucket_key.public().to_pem(),
        )
        .await
        .unwrap();

    TestEnv {
        remote,
        metadata,
        client,
        account_id,
        bucket_id: bucket.id,
        bucket_key,
        mount,
    }
}

/// Wraps the memory store and drops usage-counter updates on demand,
/// simulating a control plane whose usage service fails while the version
/// log stays up.
#[derive(Debug, Clone)]
pub struct FlakyMetadataStore {
    inner: MemoryMetadataStore,
    fail_add_usage: Arc<AtomicBool>,
}

impl FlakyMetadataStore {
    pub fn new(inner: MemoryMetadataStore) -> Self {
        Self {
            inner,
            fail_add_usage: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn fail_add_usage(&self, fail: bool) {
        self.fail_add_usage.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl MetadataStore for FlakyMetadataStore {
    async fn account_exists(&self, account_id: Uuid) -> Result<bool, MetadataStoreError> {
        self.inner.account_exists(account_id).await
    }

    async fn usage(&self, account_id: Uuid) -> Result<u64, MetadataStoreError> {
        self.inner.usage(account_id).await
    }

    async fn usage_limit(&self, account_id: Uuid) -> Result<u64, MetadataStoreError> {
        self.inner.usage_limit(account_id).await
    }

    async fn add_usage(&self, account_id: Uuid, delta: i64) -> Result<(), MetadataStoreError> {
        if self.fail_add_usage.load(Ordering::SeqCst) {
            return Err(MetadataStoreError::Remote(
                "usage service unavailable".to_string(),
            ));
        }
        self.inner.add_usage(account_id, delta).await
    }

    async fn create_bucket(
        &self,
        account_id: Uuid,
        bucket: Bucket,
    ) -> Result<(), MetadataStoreError> {
        self.inner.create_bucket(account_id, bucket).await
    }

    async fn list_buckets(&self, account_id: Uuid) -> Result<Vec<Bucket>, MetadataStoreError> {
        self.inner.list_buckets(account_id).await
    }

    async fn get_bucket(&self, bucket_id: Uuid) -> Result<Bucket, MetadataStoreError> {
        self.inner.get_bucket(bucket_id).await
    }

    async fn rename_bucket(
        &self,
        bucket_id: Uuid,
        name: String,
    ) -> Result<(), MetadataStoreError> {
        self.inner.rename_bucket(bucket_id, name).await
    }

    async fn delete_bucket(&self, bucket_id: Uuid) -> Result<(), MetadataStoreError> {
        self.inner.delete_bucket(bucket_id).await
    }

    async fn append(
        &self,
        bucket_id: Uuid,
        author: &str,
        current: Link,
        previous: Option<Link>,
        height: u64,
    ) -> Result<(), MetadataStoreError> {
        self.inner
            .append(bucket_id, author, current, previous, height)
            .await
    }

    async fn head(&self, bucket_id: Uuid) -> Result<(Link, u64), MetadataStoreError> {
        self.inner.head(bucket_id).await
    }

    async fn has(&self, bucket_id: Uuid, link: &Link) -> Result<Vec<u64>, MetadataStoreError> {
        self.inner.has(bucket_id, link).await
    }

    async fn put_snapshot(&self, snapshot: Snapshot) -> Result<(), MetadataStoreError> {
        self.inner.put_snapshot(snapshot).await
    }

    async fn get_snapshot(
        &self,
        bucket_id: Uuid,
        snapshot_id: Uuid,
    ) -> Result<Snapshot, MetadataStoreError> {
        self.inner.get_snapshot(bucket_id, snapshot_id).await
    }

    async fn list_snapshots(&self, bucket_id: Uuid) -> Result<Vec<Snapshot>, MetadataStoreError> {
        self.inner.list_snapshots(bucket_id).await
    }

    async fn create_user_key(
        &self,
        account_id: Uuid,
        key: UserKey,
    ) -> Result<(), MetadataStoreError> {
        self.inner.create_user_key(account_id, key).await
    }

    async fn rename_user_key(
        &self,
        account_id: Uuid,
        fingerprint: &str,
        name: String,
    ) -> Result<(), MetadataStoreError> {
        self.inner.rename_user_key(account_id, fingerprint, name).await
    }

    async fn approve_user_key(
        &self,
        account_id: Uuid,
        fingerprint: &str,
    ) -> Result<(), MetadataStoreError> {
        self.inner.approve_user_key(account_id, fingerprint).await
    }

    async fn list_user_keys(&self, account_id: Uuid) -> Result<Vec<UserKey>, MetadataStoreError> {
        self.inner.list_user_keys(account_id).await
    }

    async fn get_user_key(
        &self,
        account_id: Uuid,
        fingerprint: &str,
    ) -> Result<UserKey, MetadataStoreError> {
        self.inner.get_user_key(account_id, fingerprint).await
    }

    async fn grant_bucket_access(
        &self,
        bucket_id: Uuid,
        key: UserKey,
    ) -> Result<(), MetadataStoreError> {
        self.inner.grant_bucket_access(bucket_id, key).await
    }

    async fn revoke_bucket_access(
        &self,
        bucket_id: Uuid,
        fingerprint: &str,
    ) -> Result<(), MetadataStoreError> {
        self.inner.revoke_bucket_access(bucket_id, fingerprint).await
    }

    async fn list_bucket_access(
        &self,
        bucket_id: Uuid,
    ) -> Result<Vec<UserKey>, MetadataStoreError> {
        self.inner.list_bucket_access(bucket_id).await
    }
}

/// Register, approve, and grant a second device key on the test bucket,
/// and share the tree with it. Returns the new key.
pub async fn add_device(env: &TestEnv) -> SecretKey {
    let key = SecretKey::generate();
    env.client
        .create_user_key("laptop", &key.public().to_pem())
        .await
        .unwrap();
    env.client
        .approve_device_key(&key.public().fingerprint())
        .await
        .unwrap();
    env.client
        .grant_bucket_access(env.bucket_id, &key.public().fingerprint())
        .await
        .unwrap();
    env.mount.share_with(&key.public()).await.unwrap();
    key
}
