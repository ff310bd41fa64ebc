use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::crypto::{PublicKey, Secret, SecretError, SecretKey, SecretShareError};
use crate::linked_data::{BlockEncoded, CodecError, Hash, Link, LD_RAW_CODEC};
use crate::store::{
    ContentStore, ContentStoreError, MetadataStore, MetadataStoreError, Remote, Snapshot,
};

use super::manifest::{Manifest, Share};
use super::node::{DirInfo, FileInfo, FsNode, Node, NodeLink};

/// Normalize an absolute path into the relative form used inside the tree.
///
/// Rejects relative paths and any `.` / `..` components; the engine never
/// interprets paths against a working directory.
pub fn clean_path(path: &Path) -> Result<PathBuf, MountError> {
    if !path.is_absolute() {
        return Err(MountError::InvalidPath(path.to_path_buf()));
    }
    let mut clean = PathBuf::new();
    for component in path.components().skip(1) {
        match component {
            std::path::Component::Normal(part) => clean.push(part),
            _ => return Err(MountError::InvalidPath(path.to_path_buf())),
        }
    }
    Ok(clean)
}

fn abs(rel: &Path) -> PathBuf {
    Path::new("/").join(rel)
}

/// Split a relative path into its parent and final component.
fn split_parent(rel: &Path) -> Result<(&Path, String), MountError> {
    let name = rel
        .file_name()
        .ok_or_else(|| MountError::InvalidPath(abs(rel)))?
        .to_string_lossy()
        .to_string();
    Ok((rel.parent().unwrap_or(Path::new("")), name))
}

#[derive(Debug, thiserror::Error)]
pub enum MountError {
    /// The mount can no longer write: the bucket was deleted or this key's
    /// grant was revoked. Terminal; the caller must re-mount.
    #[error("mount is locked")]
    Locked,
    #[error("path not found: {0}")]
    PathNotFound(PathBuf),
    #[error("path already exists: {0}")]
    PathAlreadyExists(PathBuf),
    #[error("path is not a directory: {0}")]
    PathNotNode(PathBuf),
    #[error("invalid path: {0}")]
    InvalidPath(PathBuf),
    #[error("cannot move '{from}' to '{to}': destination is inside source")]
    MoveIntoSelf { from: PathBuf, to: PathBuf },
    #[error("no share for this key on the mounted version")]
    ShareNotFound,
    #[error("write of {needed} bytes exceeds storage limit of {limit}")]
    QuotaExceeded { needed: u64, limit: u64 },
    #[error("snapshot not found: {0}")]
    SnapshotNotFound(Uuid),
    #[error("bucket name already in use: {0}")]
    NameConflict(String),
    #[error("invalid share token")]
    InvalidShareToken,
    #[error("remote store failure: {0}")]
    Remote(String),
    #[error("content store error: {0}")]
    Content(#[from] ContentStoreError),
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),
    #[error("secret error: {0}")]
    Secret(#[from] SecretError),
    #[error("share error: {0}")]
    Share(#[from] SecretShareError),
    #[error("{0}")]
    Default(#[from] anyhow::Error),
}

struct MountInner {
    bucket_id: Uuid,
    account_id: Uuid,
    /// Link to the manifest of the mounted version.
    link: Link,
    manifest: Manifest,
    /// The decrypted root node. Empty placeholder when locked.
    entry: Node,
    /// The root secret of the mounted version.
    secret: Secret,
    height: u64,
    /// A mutation is in flight (or failed terminally before commit).
    dirty: bool,
    /// Terminal: set when the control plane rejects us.
    locked: bool,
    key: SecretKey,
}

/// A decrypted, writable session on one bucket.
///
/// All state sits behind a single async mutex, so operations on clones of
/// the same mount serialize. Every mutation is synchronous to durability:
/// it returns only after the new version is appended to the metadata store,
/// or fails without changing what subsequent reads see.
#[derive(Clone)]
pub struct Mount {
    inner: Arc<Mutex<MountInner>>,
    metadata: Arc<dyn MetadataStore>,
    content: Arc<dyn ContentStore>,
}

impl Mount {
    /// Create the genesis version of a bucket: an empty tree with a single
    /// share for `key`, appended to the version log at height 0.
    pub async fn init(
        bucket_id: Uuid,
        account_id: Uuid,
        name: String,
        key: SecretKey,
        remote: &Remote,
    ) -> Result<Self, MountError> {
        let metadata = remote.metadata();
        let content = remote.content();

        let entry = Node::new();
        let secret = Secret::generate();
        let entry_link = Self::put_node(&content, &entry, &secret).await?;
        let manifest = Manifest::new(bucket_id, name, key.public(), &secret, entry_link)?;
        let link = Self::put_manifest(&content, &manifest).await?;

        let fingerprint = key.public().fingerprint();
        match metadata
            .append(bucket_id, &fingerprint, link.clone(), None, 0)
            .await
        {
            Ok(()) => {}
            Err(MetadataStoreError::BucketNotFound(_))
            | Err(MetadataStoreError::AccessRevoked(_)) => return Err(MountError::Locked),
            Err(e) => return Err(MountError::Remote(e.to_string())),
        }
        tracing::debug!(bucket_id = %bucket_id, link = %link, "initialized bucket");

        Ok(Mount {
            inner: Arc::new(Mutex::new(MountInner {
                bucket_id,
                account_id,
                link,
                manifest,
                entry,
                secret,
                height: 0,
                dirty: false,
                locked: false,
                key,
            })),
            metadata,
            content,
        })
    }

    /// Mount the current head version of a bucket.
    ///
    /// If the head manifest carries no share for `key`, the mount comes up
    /// locked: the caller holds a valid key but cannot decrypt this bucket.
    pub async fn pull(
        bucket_id: Uuid,
        account_id: Uuid,
        key: SecretKey,
        remote: &Remote,
    ) -> Result<Self, MountError> {
        let metadata = remote.metadata();
        let content = remote.content();

        let (link, height) = metadata
            .head(bucket_id)
            .await
            .map_err(|e| MountError::Remote(e.to_string()))?;
        let manifest = Self::get_manifest(&content, &link).await?;

        let fingerprint = key.public().fingerprint();
        let (entry, secret, locked) = match manifest.get_share(&fingerprint) {
            Some(share) => {
                let secret = share.recover(&key)?;
                let entry = Self::get_node(&content, manifest.entry(), &secret).await?;
                (entry, secret, false)
            }
            None => (Node::new(), Secret::default(), true),
        };

        Ok(Mount {
            inner: Arc::new(Mutex::new(MountInner {
                bucket_id,
                account_id,
                link,
                manifest,
                entry,
                secret,
                height,
                dirty: false,
                locked,
                key,
            })),
            metadata,
            content,
        })
    }

    pub async fn bucket_id(&self) -> Uuid {
        self.inner.lock().await.bucket_id
    }

    /// Link to the manifest of the mounted version.
    pub async fn link(&self) -> Link {
        self.inner.lock().await.link.clone()
    }

    pub async fn height(&self) -> u64 {
        self.inner.lock().await.height
    }

    pub async fn name(&self) -> String {
        self.inner.lock().await.manifest.name().to_string()
    }

    pub async fn dirty(&self) -> bool {
        self.inner.lock().await.dirty
    }

    pub async fn locked(&self) -> bool {
        self.inner.lock().await.locked
    }

    /// Heights at which the mounted version appears in the bucket's log.
    pub async fn has_version(&self, link: &Link) -> Result<Vec<u64>, MountError> {
        let bucket_id = self.inner.lock().await.bucket_id;
        self.metadata
            .has(bucket_id, link)
            .await
            .map_err(|e| MountError::Remote(e.to_string()))
    }

    /// Whether any snapshot has been recorded for this bucket.
    pub async fn has_snapshot(&self) -> Result<bool, MountError> {
        let bucket_id = self.inner.lock().await.bucket_id;
        let snapshots = self
            .metadata
            .list_snapshots(bucket_id)
            .await
            .map_err(|e| MountError::Remote(e.to_string()))?;
        Ok(!snapshots.is_empty())
    }

    // reads

    /// List one level of a directory.
    ///
    /// Entries come back name-ordered; insertion order is not preserved.
    pub async fn ls(&self, path: &Path) -> Result<Vec<FsNode>, MountError> {
        let rel = clean_path(path)?;
        let entry = {
            let inner = self.inner.lock().await;
            if inner.locked {
                return Err(MountError::Locked);
            }
            inner.entry.clone()
        };

        let node = self.node_at(&entry, &rel).await?;
        Ok(node
            .get_links()
            .iter()
            .map(|(name, link)| FsNode::from_link(name, link))
            .collect())
    }

    /// Recursively list everything under a directory.
    ///
    /// Paths in the result are relative to `path`, name-ordered within each
    /// directory, parents before children.
    pub async fn ls_deep(&self, path: &Path) -> Result<Vec<(PathBuf, FsNode)>, MountError> {
        let rel = clean_path(path)?;
        let entry = {
            let inner = self.inner.lock().await;
            if inner.locked {
                return Err(MountError::Locked);
            }
            inner.entry.clone()
        };

        let root = self.node_at(&entry, &rel).await?;
        let mut items = Vec::new();
        let mut stack = vec![(PathBuf::new(), root)];
        while let Some((prefix, node)) = stack.pop() {
            for (name, link) in node.get_links() {
                let item_path = prefix.join(name);
                items.push((item_path.clone(), FsNode::from_link(name, link)));
                if let NodeLink::Dir(link, secret, _) = link {
                    let child = Self::get_node(&self.content, link, secret).await?;
                    stack.push((item_path, child));
                }
            }
        }
        items.sort_by(|(a, _), (b, _)| a.cmp(b));
        Ok(items)
    }

    /// Read a file's full plaintext contents.
    pub async fn read(&self, path: &Path) -> Result<Vec<u8>, MountError> {
        let rel = clean_path(path)?;
        let entry = {
            let inner = self.inner.lock().await;
            if inner.locked {
                return Err(MountError::Locked);
            }
            inner.entry.clone()
        };
        self.read_from(&entry, &rel).await
    }

    /// Read a file as it existed at a historical version of the bucket.
    ///
    /// The key mounted here must hold a share on that version's manifest.
    pub async fn read_version(&self, path: &Path, version: &Link) -> Result<Vec<u8>, MountError> {
        let rel = clean_path(path)?;
        let (key, locked) = {
            let inner = self.inner.lock().await;
            (inner.key.clone(), inner.locked)
        };
        if locked {
            return Err(MountError::Locked);
        }

        let manifest = Self::get_manifest(&self.content, version).await?;
        let share = manifest
            .get_share(&key.public().fingerprint())
            .ok_or(MountError::ShareNotFound)?;
        let secret = share.recover(&key)?;
        let entry = Self::get_node(&self.content, manifest.entry(), &secret).await?;
        self.read_from(&entry, &rel).await
    }

    async fn read_from(&self, entry: &Node, rel: &Path) -> Result<Vec<u8>, MountError> {
        let (parent, name) = split_parent(rel)?;
        let parent_node = self.node_at(entry, parent).await?;
        match parent_node.get_link(&name) {
            Some(NodeLink::Data(link, secret, _)) => {
                let blob = self.content.get(&link.hash()).await?;
                Ok(secret.decrypt(&blob)?)
            }
            Some(NodeLink::Dir(..)) => Err(MountError::PathNotNode(abs(rel))),
            None => Err(MountError::PathNotFound(abs(rel))),
        }
    }

    // mutations

    /// Create an empty directory. The parent must already exist.
    pub async fn mkdir(&self, path: &Path) -> Result<(), MountError> {
        let rel = clean_path(path)?;
        let (parent, name) = split_parent(&rel)?;

        let mut inner = self.inner.lock().await;
        if inner.locked {
            return Err(MountError::Locked);
        }

        let dir_secret = Secret::generate();
        let dir_link = Self::put_node(&self.content, &Node::new(), &dir_secret).await?;

        let entry = inner.entry.clone();
        let new_entry = self
            .edit_parent(entry, parent, |node| {
                if node.contains(&name) {
                    return Err(MountError::PathAlreadyExists(abs(&rel)));
                }
                node.insert(name.clone(), NodeLink::Dir(dir_link, dir_secret, DirInfo::new()));
                Ok(())
            })
            .await?;

        self.commit(&mut inner, new_entry, None, 0).await
    }

    /// Write a file, replacing any existing file at the path.
    ///
    /// The parent directory must exist; writing over a directory is an
    /// error. Fails with [`MountError::QuotaExceeded`] before any version
    /// is produced if the account would exceed its storage limit.
    pub async fn write(&self, path: &Path, data: &[u8]) -> Result<(), MountError> {
        let rel = clean_path(path)?;
        let (parent, name) = split_parent(&rel)?;

        let mut inner = self.inner.lock().await;
        if inner.locked {
            return Err(MountError::Locked);
        }
        let entry = inner.entry.clone();
        let account_id = inner.account_id;

        let existing = self.peek(&entry, &rel).await?;
        let old_size = match &existing {
            Some(NodeLink::Data(_, _, info)) => info.size,
            Some(NodeLink::Dir(..)) => return Err(MountError::PathAlreadyExists(abs(&rel))),
            None => 0,
        };
        let delta = data.len() as i64 - old_size as i64;

        if delta > 0 {
            let usage = self
                .metadata
                .usage(account_id)
                .await
                .map_err(|e| MountError::Remote(e.to_string()))?;
            let limit = self
                .metadata
                .usage_limit(account_id)
                .await
                .map_err(|e| MountError::Remote(e.to_string()))?;
            let needed = usage.saturating_add(delta as u64);
            if needed > limit {
                return Err(MountError::QuotaExceeded { needed, limit });
            }
        }

        let secret = Secret::generate();
        let blob = secret.encrypt(data)?;
        let hash = self.content.put(blob).await?;
        let link = Link::new(LD_RAW_CODEC, hash);

        let info = match existing {
            Some(NodeLink::Data(_, _, info)) => info.updated(data.len() as u64),
            _ => FileInfo::new(path, data.len() as u64),
        };
        let node_link = NodeLink::Data(link, secret, info);

        let new_entry = self
            .edit_parent(entry, parent, |node| {
                node.insert(name.clone(), node_link);
                Ok(())
            })
            .await?;

        self.commit(&mut inner, new_entry, None, delta).await
    }

    /// Move or rename a file or directory.
    ///
    /// The moved subtree is not re-encrypted; only the tree structure
    /// changes, so moves cost the depth of the paths, not the size of the
    /// subtree.
    pub async fn mv(&self, from: &Path, to: &Path) -> Result<(), MountError> {
        let from_rel = clean_path(from)?;
        let to_rel = clean_path(to)?;
        if to_rel.starts_with(&from_rel) {
            return Err(MountError::MoveIntoSelf {
                from: abs(&from_rel),
                to: abs(&to_rel),
            });
        }
        let (from_parent, from_name) = split_parent(&from_rel)?;
        let (to_parent, to_name) = split_parent(&to_rel)?;

        let mut inner = self.inner.lock().await;
        if inner.locked {
            return Err(MountError::Locked);
        }
        let entry = inner.entry.clone();

        let node_link = self
            .peek(&entry, &from_rel)
            .await?
            .ok_or_else(|| MountError::PathNotFound(abs(&from_rel)))?;
        if self.peek(&entry, &to_rel).await?.is_some() {
            return Err(MountError::PathAlreadyExists(abs(&to_rel)));
        }

        let detached = self
            .edit_parent(entry, from_parent, |node| {
                node.del(&from_name);
                Ok(())
            })
            .await?;
        let new_entry = self
            .edit_parent(detached, to_parent, |node| {
                node.insert(to_name.clone(), node_link);
                Ok(())
            })
            .await?;

        self.commit(&mut inner, new_entry, None, 0).await
    }

    /// Remove a file or directory. Directories are removed recursively.
    ///
    /// The released bytes are returned to the account's usage counter;
    /// the underlying blocks stay in the content store until snapshots and
    /// history referencing them are gone.
    pub async fn rm(&self, path: &Path) -> Result<(), MountError> {
        let rel = clean_path(path)?;
        let (parent, name) = split_parent(&rel)?;

        let mut inner = self.inner.lock().await;
        if inner.locked {
            return Err(MountError::Locked);
        }
        let entry = inner.entry.clone();

        let link = self
            .peek(&entry, &rel)
            .await?
            .ok_or_else(|| MountError::PathNotFound(abs(&rel)))?;
        let released = self.subtree_size(&link).await?;

        let new_entry = self
            .edit_parent(entry, parent, |node| {
                node.del(&name);
                Ok(())
            })
            .await?;

        self.commit(&mut inner, new_entry, None, -(released as i64))
            .await
    }

    /// Pin the mounted version as a snapshot.
    pub async fn snapshot(&self) -> Result<Snapshot, MountError> {
        let inner = self.inner.lock().await;
        if inner.locked {
            return Err(MountError::Locked);
        }

        let mut size = 0u64;
        for link in inner.entry.get_links().values() {
            size += self.subtree_size(link).await?;
        }

        let snapshot = Snapshot {
            id: Uuid::new_v4(),
            bucket_id: inner.bucket_id,
            link: inner.link.clone(),
            created_at: Utc::now(),
            size,
        };
        self.metadata
            .put_snapshot(snapshot.clone())
            .await
            .map_err(|e| MountError::Remote(e.to_string()))?;
        tracing::debug!(snapshot_id = %snapshot.id, link = %snapshot.link, "created snapshot");
        Ok(snapshot)
    }

    /// Restore the tree from a snapshot, as a new version.
    ///
    /// Restoring never rewrites history: the restored tree is appended on
    /// top of the current head, so the versions in between stay reachable.
    pub async fn restore(&self, snapshot_id: Uuid) -> Result<(), MountError> {
        let mut inner = self.inner.lock().await;
        if inner.locked {
            return Err(MountError::Locked);
        }

        let snapshot = match self.metadata.get_snapshot(inner.bucket_id, snapshot_id).await {
            Ok(snapshot) => snapshot,
            Err(MetadataStoreError::SnapshotNotFound(id)) => {
                return Err(MountError::SnapshotNotFound(id))
            }
            Err(e) => return Err(MountError::Remote(e.to_string())),
        };

        let manifest = Self::get_manifest(&self.content, &snapshot.link).await?;
        let share = manifest
            .get_share(&inner.key.public().fingerprint())
            .ok_or(MountError::ShareNotFound)?;
        let secret = share.recover(&inner.key)?;
        let restored = Self::get_node(&self.content, manifest.entry(), &secret).await?;

        let mut current_size = 0i64;
        for link in inner.entry.get_links().values() {
            current_size += self.subtree_size(link).await? as i64;
        }
        let delta = snapshot.size as i64 - current_size;

        self.commit(&mut inner, restored, None, delta).await
    }

    /// Grant another device key access to the bucket's contents.
    ///
    /// The new share takes effect from the next version onward, which this
    /// call produces immediately.
    pub async fn share_with(&self, public_key: &PublicKey) -> Result<(), MountError> {
        let mut inner = self.inner.lock().await;
        if inner.locked {
            return Err(MountError::Locked);
        }

        let mut manifest = inner.manifest.clone();
        manifest.add_share(Share::new(&inner.secret, *public_key)?);
        let entry = inner.entry.clone();
        self.commit(&mut inner, entry, Some(manifest), 0).await
    }

    /// Rename the bucket, in the metadata store's record and in the
    /// manifest of the next version.
    pub async fn rename(&self, name: String) -> Result<(), MountError> {
        let mut inner = self.inner.lock().await;
        if inner.locked {
            return Err(MountError::Locked);
        }

        match self
            .metadata
            .rename_bucket(inner.bucket_id, name.clone())
            .await
        {
            Ok(()) => {}
            Err(MetadataStoreError::BucketNotFound(_)) => {
                inner.locked = true;
                return Err(MountError::Locked);
            }
            Err(MetadataStoreError::NameConflict(name)) => {
                return Err(MountError::NameConflict(name))
            }
            Err(e) => return Err(MountError::Remote(e.to_string())),
        }

        let mut manifest = inner.manifest.clone();
        manifest.set_name(name);
        let entry = inner.entry.clone();
        self.commit(&mut inner, entry, Some(manifest), 0).await
    }

    /// Produce a share token for a single file.
    ///
    /// The token pairs the file's content address with its own secret, so
    /// the holder can fetch and decrypt exactly that file and nothing else.
    pub async fn share_file(&self, path: &Path) -> Result<String, MountError> {
        let rel = clean_path(path)?;
        let entry = {
            let inner = self.inner.lock().await;
            if inner.locked {
                return Err(MountError::Locked);
            }
            inner.entry.clone()
        };

        match self.link_at(&entry, &rel).await? {
            NodeLink::Data(link, secret, _) => {
                Ok(format!("{}.{}", link.hash().to_hex(), secret.to_hex()))
            }
            NodeLink::Dir(..) => Err(MountError::PathNotNode(abs(&rel))),
        }
    }

    /// Fetch and decrypt a file from a token minted by [`Mount::share_file`].
    ///
    /// Needs no mount and no bucket access, only the content store.
    pub async fn read_shared(remote: &Remote, token: &str) -> Result<Vec<u8>, MountError> {
        let (hash_hex, secret_hex) = token.split_once('.').ok_or(MountError::InvalidShareToken)?;
        let hash = Hash::from_hex(hash_hex).map_err(|_| MountError::InvalidShareToken)?;
        let secret = Secret::from_hex(secret_hex).map_err(|_| MountError::InvalidShareToken)?;
        let blob = remote.content().get(&hash).await?;
        Ok(secret.decrypt(&blob)?)
    }

    // tree plumbing

    /// Walk to the directory node at a relative path (read semantics:
    /// anything missing is `PathNotFound`).
    async fn node_at(&self, entry: &Node, rel: &Path) -> Result<Node, MountError> {
        let mut current = entry.clone();
        let mut consumed = PathBuf::new();
        for part in rel.iter() {
            let name = part.to_string_lossy().to_string();
            consumed.push(&name);
            match current.get_link(&name) {
                Some(NodeLink::Dir(link, secret, _)) => {
                    current = Self::get_node(&self.content, link, secret).await?;
                }
                Some(NodeLink::Data(..)) => return Err(MountError::PathNotNode(abs(&consumed))),
                None => return Err(MountError::PathNotFound(abs(&consumed))),
            }
        }
        Ok(current)
    }

    /// The link at a relative path (read semantics).
    async fn link_at(&self, entry: &Node, rel: &Path) -> Result<NodeLink, MountError> {
        let (parent, name) = split_parent(rel)?;
        let parent_node = self.node_at(entry, parent).await?;
        parent_node
            .get_link(&name)
            .cloned()
            .ok_or_else(|| MountError::PathNotFound(abs(rel)))
    }

    /// The link at a relative path, if any (mutation semantics: a missing
    /// intermediate directory is `InvalidPath`, a missing leaf is `None`).
    async fn peek(&self, entry: &Node, rel: &Path) -> Result<Option<NodeLink>, MountError> {
        let (parent, name) = split_parent(rel)?;
        let mut current = entry.clone();
        let mut consumed = PathBuf::new();
        for part in parent.iter() {
            let part = part.to_string_lossy().to_string();
            consumed.push(&part);
            match current.get_link(&part) {
                Some(NodeLink::Dir(link, secret, _)) => {
                    current = Self::get_node(&self.content, link, secret).await?;
                }
                Some(NodeLink::Data(..)) => return Err(MountError::PathNotNode(abs(&consumed))),
                None => return Err(MountError::InvalidPath(abs(rel))),
            }
        }
        Ok(current.get_link(&name).cloned())
    }

    /// Apply an edit to the node at `parent` and rebuild the ancestor chain
    /// bottom-up: every node on the way back to the root is re-encrypted
    /// under a fresh secret and stored, producing a new root node.
    async fn edit_parent<F>(&self, entry: Node, parent: &Path, edit: F) -> Result<Node, MountError>
    where
        F: FnOnce(&mut Node) -> Result<(), MountError>,
    {
        if parent == Path::new("") {
            let mut root = entry;
            edit(&mut root)?;
            return Ok(root);
        }

        // walk down, remembering each node and its place in its parent
        let mut chain: Vec<(String, DirInfo, Node)> = Vec::new();
        let mut current = entry.clone();
        let mut consumed = PathBuf::new();
        for part in parent.iter() {
            let name = part.to_string_lossy().to_string();
            consumed.push(&name);
            match current.get_link(&name) {
                Some(NodeLink::Dir(link, secret, info)) => {
                    let child = Self::get_node(&self.content, link, secret).await?;
                    chain.push((name, info.clone(), child.clone()));
                    current = child;
                }
                Some(NodeLink::Data(..)) => return Err(MountError::PathNotNode(abs(&consumed))),
                None => return Err(MountError::InvalidPath(abs(&consumed))),
            }
        }

        if let Some((_, _, deepest)) = chain.last_mut() {
            edit(deepest)?;
        }

        // fold back up, re-encrypting each edited node
        let mut rebuilt: Option<(String, NodeLink)> = None;
        for (name, info, mut node) in chain.into_iter().rev() {
            if let Some((child_name, child_link)) = rebuilt.take() {
                node.insert(child_name, child_link);
            }
            let secret = Secret::generate();
            let link = Self::put_node(&self.content, &node, &secret).await?;
            rebuilt = Some((name, NodeLink::Dir(link, secret, info.touched())));
        }

        let mut root = entry;
        if let Some((name, link)) = rebuilt {
            root.insert(name, link);
        }
        Ok(root)
    }

    /// Total plaintext bytes of file content under a link.
    async fn subtree_size(&self, link: &NodeLink) -> Result<u64, MountError> {
        match link {
            NodeLink::Data(_, _, info) => Ok(info.size),
            NodeLink::Dir(link, secret, _) => {
                let node = Self::get_node(&self.content, link, secret).await?;
                let mut total = 0u64;
                for child in node.get_links().values() {
                    total += Box::pin(self.subtree_size(child)).await?;
                }
                Ok(total)
            }
        }
    }

    /// Make a new tree state durable as the next version of the bucket.
    ///
    /// Encrypts the new root under a fresh secret, re-wraps all shares,
    /// writes the new manifest, and appends it to the version log. Only
    /// after the append succeeds is the in-memory state swapped; on a
    /// transient failure nothing the caller can observe has changed. A
    /// rejected append (bucket gone, grant revoked) locks the mount for
    /// good.
    async fn commit(
        &self,
        inner: &mut MountInner,
        new_entry: Node,
        manifest_override: Option<Manifest>,
        usage_delta: i64,
    ) -> Result<(), MountError> {
        inner.dirty = true;

        let result = self
            .commit_inner(inner, new_entry, manifest_override, usage_delta)
            .await;
        match &result {
            Ok(()) => inner.dirty = false,
            Err(MountError::Locked) => {
                inner.locked = true;
            }
            // nothing was applied, the mount is still at the old version
            Err(_) => inner.dirty = false,
        }
        result
    }

    async fn commit_inner(
        &self,
        inner: &mut MountInner,
        new_entry: Node,
        manifest_override: Option<Manifest>,
        usage_delta: i64,
    ) -> Result<(), MountError> {
        let secret = Secret::generate();
        let entry_link = Self::put_node(&self.content, &new_entry, &secret).await?;

        let mut manifest = manifest_override.unwrap_or_else(|| inner.manifest.clone());
        manifest.rewrap_shares(&secret)?;
        manifest.set_entry(entry_link);
        manifest.set_previous(inner.link.clone());
        let height = inner.height + 1;
        manifest.set_height(height);

        let link = Self::put_manifest(&self.content, &manifest).await?;

        let fingerprint = inner.key.public().fingerprint();
        match self
            .metadata
            .append(
                inner.bucket_id,
                &fingerprint,
                link.clone(),
                Some(inner.link.clone()),
                height,
            )
            .await
        {
            Ok(()) => {}
            Err(MetadataStoreError::BucketNotFound(_))
            | Err(MetadataStoreError::AccessRevoked(_)) => return Err(MountError::Locked),
            Err(e) => return Err(MountError::Remote(e.to_string())),
        }

        tracing::debug!(bucket_id = %inner.bucket_id, height, link = %link, "committed version");

        inner.entry = new_entry;
        inner.secret = secret;
        inner.manifest = manifest;
        inner.link = link;
        inner.height = height;

        // the append above is the durability point; once it lands, the
        // version exists and this call must report success. A failed usage
        // update only skews the counter, it cannot be allowed to leave the
        // mount behind the remote head.
        if usage_delta != 0 {
            if let Err(e) = self.metadata.add_usage(inner.account_id, usage_delta).await {
                tracing::warn!(
                    account_id = %inner.account_id,
                    delta = usage_delta,
                    error = %e,
                    "usage update failed after append"
                );
            }
        }

        Ok(())
    }

    // block plumbing

    async fn get_node(
        content: &Arc<dyn ContentStore>,
        link: &Link,
        secret: &Secret,
    ) -> Result<Node, MountError> {
        let blob = content.get(&link.hash()).await?;
        let data = secret.decrypt(&blob)?;
        Ok(Node::decode(&data)?)
    }

    async fn put_node(
        content: &Arc<dyn ContentStore>,
        node: &Node,
        secret: &Secret,
    ) -> Result<Link, MountError> {
        let data = node.encode()?;
        let blob = secret.encrypt(&data)?;
        let hash = content.put(blob).await?;
        // encrypted blocks are always raw, the codec describes the ciphertext
        Ok(Link::new(LD_RAW_CODEC, hash))
    }

    async fn get_manifest(
        content: &Arc<dyn ContentStore>,
        link: &Link,
    ) -> Result<Manifest, MountError> {
        let blob = content.get(&link.hash()).await?;
        Ok(Manifest::decode(&blob)?)
    }

    async fn put_manifest(
        content: &Arc<dyn ContentStore>,
        manifest: &Manifest,
    ) -> Result<Link, MountError> {
        let data = manifest.encode()?;
        let hash = content.put(data).await?;
        // manifests are plaintext and keep their dag-cbor codec
        Ok(Link::new(manifest.codec(), hash))
    }
}
