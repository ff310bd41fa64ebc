//! The manifest is the root metadata block for one version of a bucket.
//!
//! It is stored as plaintext DAG-CBOR (the tree beneath it is what gets
//! encrypted) and carries:
//!
//! - the bucket's id and display name
//! - the share map: one wrapped copy of the root secret per device key
//! - a link to the encrypted entry node of the tree
//! - the version chain: previous manifest link and height
//!
//! Every mutation writes a fresh manifest whose `previous` points at the
//! manifest it replaced and whose `height` is one greater. The manifest's
//! link is the version identifier used throughout the metadata store.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::crypto::{PublicKey, Secret, SecretKey, SecretShare, SecretShareError};
use crate::linked_data::{BlockEncoded, DagCborCodec, Link};

/// One device key's access to the bucket: its public key (needed to
/// re-wrap on every new version) and the root secret wrapped for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Share {
    public_key: PublicKey,
    share: SecretShare,
}

impl Share {
    pub fn new(secret: &Secret, public_key: PublicKey) -> Result<Self, SecretShareError> {
        Ok(Self {
            public_key,
            share: SecretShare::new(secret, &public_key)?,
        })
    }

    pub fn public_key(&self) -> &PublicKey {
        &self.public_key
    }

    pub fn recover(&self, key: &SecretKey) -> Result<Secret, SecretShareError> {
        self.share.recover(key)
    }
}

/// Map of device-key fingerprints (hex) to shares.
///
/// Keyed by fingerprint rather than raw public key so lookups line up with
/// the control plane, which names keys by fingerprint everywhere.
pub type Shares = BTreeMap<String, Share>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    id: Uuid,
    name: String,
    shares: Shares,
    /// Link to the encrypted root [`Node`](super::Node) of the tree.
    entry: Link,
    /// Link to the previous manifest version, `None` only at height 0.
    previous: Option<Link>,
    height: u64,
}

impl BlockEncoded<DagCborCodec> for Manifest {}

impl Manifest {
    /// A genesis manifest with a single share for the creating key.
    pub fn new(
        id: Uuid,
        name: String,
        owner: PublicKey,
        secret: &Secret,
        entry: Link,
    ) -> Result<Self, SecretShareError> {
        Ok(Manifest {
            id,
            name,
            shares: BTreeMap::from([(owner.fingerprint(), Share::new(secret, owner)?)]),
            entry,
            previous: None,
            height: 0,
        })
    }

    pub fn id(&self) -> &Uuid {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: String) {
        self.name = name;
    }

    pub fn shares(&self) -> &Shares {
        &self.shares
    }

    pub fn get_share(&self, fingerprint: &str) -> Option<&Share> {
        self.shares.get(fingerprint)
    }

    pub fn add_share(&mut self, share: Share) {
        self.shares.insert(share.public_key().fingerprint(), share);
    }

    pub fn remove_share(&mut self, fingerprint: &str) -> Option<Share> {
        self.shares.remove(fingerprint)
    }

    /// Re-wrap every share under a fresh root secret. Called on each save,
    /// since the root node is re-encrypted under a new secret every time.
    pub fn rewrap_shares(&mut self, secret: &Secret) -> Result<(), SecretShareError> {
        for share in self.shares.values_mut() {
            *share = Share::new(secret, *share.public_key())?;
        }
        Ok(())
    }

    pub fn entry(&self) -> &Link {
        &self.entry
    }

    pub fn set_entry(&mut self, entry: Link) {
        self.entry = entry;
    }

    pub fn previous(&self) -> Option<&Link> {
        self.previous.as_ref()
    }

    pub fn set_previous(&mut self, previous: Link) {
        self.previous = Some(previous);
    }

    pub fn height(&self) -> u64 {
        self.height
    }

    pub fn set_height(&mut self, height: u64) {
        self.height = height;
    }
}
