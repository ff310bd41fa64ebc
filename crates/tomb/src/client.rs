//! The account-scoped entry point.
//!
//! A [`TombClient`] binds a signing key to an account against a pair of
//! remote stores. It owns the control-plane surface (bucket records,
//! device keys, grants, snapshots, usage) and hands out [`Mount`]s for the
//! data plane.

use uuid::Uuid;

use crate::crypto::{PublicKey, SecretKey};
use crate::mount::{Mount, MountError};
use crate::store::{
    Bucket, BucketType, MetadataStoreError, Remote, Snapshot, StorageClass, UserKey,
};

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The signing key could not be parsed or the account is unknown.
    #[error("authentication failed")]
    Auth,
    /// A provided key does not match what it was checked against.
    #[error("key mismatch")]
    KeyMismatch,
    #[error("bucket not found: {0}")]
    BucketNotFound(Uuid),
    #[error("bucket name already in use: {0}")]
    NameConflict(String),
    #[error("key not found: {0}")]
    KeyNotFound(String),
    #[error("cannot revoke the last approved key on a bucket")]
    LastKey,
    #[error("mount error: {0}")]
    Mount(#[from] MountError),
    #[error("remote error: {0}")]
    Remote(String),
}

impl From<MetadataStoreError> for ClientError {
    fn from(e: MetadataStoreError) -> Self {
        match e {
            MetadataStoreError::BucketNotFound(id) => ClientError::BucketNotFound(id),
            MetadataStoreError::NameConflict(name) => ClientError::NameConflict(name),
            MetadataStoreError::KeyNotFound(fp) => ClientError::KeyNotFound(fp),
            other => ClientError::Remote(other.to_string()),
        }
    }
}

/// A session on one account.
#[derive(Clone)]
pub struct TombClient {
    key: SecretKey,
    account_id: Uuid,
    remote: Remote,
}

impl TombClient {
    /// Authenticate against an account with a PEM-encoded signing key.
    pub async fn new(
        signing_key_pem: &str,
        account_id: Uuid,
        remote: Remote,
    ) -> Result<Self, ClientError> {
        let key = SecretKey::from_pem(signing_key_pem).map_err(|_| ClientError::Auth)?;
        let exists = remote
            .metadata()
            .account_exists(account_id)
            .await
            .map_err(|e| ClientError::Remote(e.to_string()))?;
        if !exists {
            return Err(ClientError::Auth);
        }
        tracing::debug!(account_id = %account_id, fingerprint = %key.public().fingerprint(), "client session opened");
        Ok(Self {
            key,
            account_id,
            remote,
        })
    }

    pub fn account_id(&self) -> Uuid {
        self.account_id
    }

    pub fn fingerprint(&self) -> String {
        self.key.public().fingerprint()
    }

    pub fn remote(&self) -> &Remote {
        &self.remote
    }

    // buckets

    pub async fn list_buckets(&self) -> Result<Vec<Bucket>, ClientError> {
        Ok(self.remote.metadata().list_buckets(self.account_id).await?)
    }

    /// Create a bucket and mount its genesis version in one step.
    ///
    /// The bucket gets its own keypair, supplied as a PEM pair: the public
    /// half is registered (pre-approved) as a device key and granted on
    /// the bucket, the private half signs the genesis append and stays
    /// with the returned mount.
    pub async fn create_bucket_and_mount(
        &self,
        name: &str,
        storage_class: StorageClass,
        bucket_type: BucketType,
        private_pem: &str,
        public_pem: &str,
    ) -> Result<(Bucket, Mount), ClientError> {
        let key = SecretKey::from_pem(private_pem).map_err(|_| ClientError::KeyMismatch)?;
        let public = PublicKey::from_pem(public_pem).map_err(|_| ClientError::KeyMismatch)?;
        if key.public() != public {
            return Err(ClientError::KeyMismatch);
        }

        let metadata = self.remote.metadata();
        let bucket = Bucket {
            id: Uuid::new_v4(),
            name: name.to_string(),
            bucket_type,
            storage_class,
        };
        metadata.create_bucket(self.account_id, bucket.clone()).await?;

        let user_key = UserKey::new(name.to_string(), public, true);
        metadata
            .create_user_key(self.account_id, user_key.clone())
            .await?;
        metadata.grant_bucket_access(bucket.id, user_key).await?;

        let mount = Mount::init(
            bucket.id,
            self.account_id,
            bucket.name.clone(),
            key,
            &self.remote,
        )
        .await?;
        tracing::debug!(bucket_id = %bucket.id, name = %bucket.name, "created bucket");
        Ok((bucket, mount))
    }

    /// Mount an existing bucket with the bucket key's private PEM.
    ///
    /// A syntactically valid key that holds no share on the current head
    /// still mounts, but comes up locked.
    pub async fn mount(&self, bucket_id: Uuid, key_pem: &str) -> Result<Mount, ClientError> {
        let key = SecretKey::from_pem(key_pem).map_err(|_| ClientError::KeyMismatch)?;
        // surface a missing bucket before a confusing head lookup failure
        self.remote.metadata().get_bucket(bucket_id).await?;
        Ok(Mount::pull(bucket_id, self.account_id, key, &self.remote).await?)
    }

    pub async fn rename_bucket(&self, bucket_id: Uuid, name: &str) -> Result<(), ClientError> {
        Ok(self
            .remote
            .metadata()
            .rename_bucket(bucket_id, name.to_string())
            .await?)
    }

    /// Delete a bucket irreversibly. Open mounts on it lock on their next
    /// mutation.
    pub async fn delete_bucket(&self, bucket_id: Uuid) -> Result<(), ClientError> {
        self.remote.metadata().delete_bucket(bucket_id).await?;
        tracing::debug!(bucket_id = %bucket_id, "deleted bucket");
        Ok(())
    }

    // snapshots

    pub async fn list_bucket_snapshots(
        &self,
        bucket_id: Uuid,
    ) -> Result<Vec<Snapshot>, ClientError> {
        Ok(self.remote.metadata().list_snapshots(bucket_id).await?)
    }

    // device keys and grants

    /// Register a device key (unapproved) under this account.
    pub async fn create_user_key(
        &self,
        name: &str,
        public_pem: &str,
    ) -> Result<UserKey, ClientError> {
        let public = PublicKey::from_pem(public_pem).map_err(|_| ClientError::KeyMismatch)?;
        let key = UserKey::new(name.to_string(), public, false);
        self.remote
            .metadata()
            .create_user_key(self.account_id, key.clone())
            .await?;
        Ok(key)
    }

    pub async fn rename_user_key(&self, fingerprint: &str, name: &str) -> Result<(), ClientError> {
        Ok(self
            .remote
            .metadata()
            .rename_user_key(self.account_id, fingerprint, name.to_string())
            .await?)
    }

    /// Approve a registered device key so it can hold grants.
    pub async fn approve_device_key(&self, fingerprint: &str) -> Result<(), ClientError> {
        Ok(self
            .remote
            .metadata()
            .approve_user_key(self.account_id, fingerprint)
            .await?)
    }

    pub async fn list_user_keys(&self) -> Result<Vec<UserKey>, ClientError> {
        Ok(self
            .remote
            .metadata()
            .list_user_keys(self.account_id)
            .await?)
    }

    /// Grant an approved device key write access to a bucket.
    ///
    /// This is the control-plane half of sharing; pair it with
    /// [`Mount::share_with`](crate::mount::Mount::share_with) so the key
    /// can also decrypt.
    pub async fn grant_bucket_access(
        &self,
        bucket_id: Uuid,
        fingerprint: &str,
    ) -> Result<(), ClientError> {
        let metadata = self.remote.metadata();
        let key = metadata.get_user_key(self.account_id, fingerprint).await?;
        if !key.approved {
            return Err(ClientError::KeyNotFound(fingerprint.to_string()));
        }
        Ok(metadata.grant_bucket_access(bucket_id, key).await?)
    }

    /// Revoke a device key's grant on a bucket.
    ///
    /// A bucket must always keep at least one approved grant, otherwise it
    /// would become permanently unwritable; revoking the last one fails
    /// with [`ClientError::LastKey`].
    pub async fn revoke_bucket_access(
        &self,
        bucket_id: Uuid,
        fingerprint: &str,
    ) -> Result<(), ClientError> {
        let metadata = self.remote.metadata();
        let grants = metadata.list_bucket_access(bucket_id).await?;
        let remaining_approved = grants
            .iter()
            .filter(|k| k.approved && k.fingerprint != fingerprint)
            .count();
        if remaining_approved == 0 {
            return Err(ClientError::LastKey);
        }
        Ok(metadata.revoke_bucket_access(bucket_id, fingerprint).await?)
    }

    pub async fn list_bucket_access(&self, bucket_id: Uuid) -> Result<Vec<UserKey>, ClientError> {
        Ok(self.remote.metadata().list_bucket_access(bucket_id).await?)
    }

    // usage

    pub async fn get_usage(&self) -> Result<u64, ClientError> {
        Ok(self.remote.metadata().usage(self.account_id).await?)
    }

    pub async fn get_usage_limit(&self) -> Result<u64, ClientError> {
        Ok(self.remote.metadata().usage_limit(self.account_id).await?)
    }
}
