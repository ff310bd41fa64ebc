use std::collections::BTreeMap;
use std::path::Path;

use chrono::{DateTime, Utc};
use mime::Mime;
use serde::{Deserialize, Serialize};

use crate::crypto::Secret;
use crate::linked_data::{BlockEncoded, DagCborCodec, Link, LinkedData};

use super::maybe_mime::MaybeMime;

/// Attributes carried on a file link.
///
/// These live in the *parent* node, next to the link and secret, so that
/// listing a directory never has to fetch or decrypt the children.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileInfo {
    pub created: DateTime<Utc>,
    pub modified: DateTime<Utc>,
    /// Plaintext size in bytes.
    pub size: u64,
    pub mime: MaybeMime,
    /// Free-form structured metadata attached by callers.
    pub metadata: Option<BTreeMap<String, LinkedData>>,
}

impl FileInfo {
    /// Attributes for new content written at `path`, with the MIME type
    /// guessed from the extension.
    pub fn new(path: &Path, size: u64) -> Self {
        let now = Utc::now();
        Self {
            created: now,
            modified: now,
            size,
            mime: MaybeMime::from_path(path),
            metadata: None,
        }
    }

    /// Attributes after an overwrite: `created` survives, everything else
    /// reflects the new content.
    pub fn updated(&self, size: u64) -> Self {
        Self {
            created: self.created,
            modified: Utc::now(),
            size,
            mime: self.mime.clone(),
            metadata: self.metadata.clone(),
        }
    }

    pub fn mime(&self) -> Option<&Mime> {
        self.mime.0.as_ref()
    }

    pub fn set_metadata(&mut self, key: String, value: LinkedData) {
        self.metadata
            .get_or_insert_with(BTreeMap::new)
            .insert(key, value);
    }
}

/// Attributes carried on a directory link.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DirInfo {
    pub created: DateTime<Utc>,
    pub modified: DateTime<Utc>,
}

impl DirInfo {
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            created: now,
            modified: now,
        }
    }

    pub fn touched(&self) -> Self {
        Self {
            created: self.created,
            modified: Utc::now(),
        }
    }
}

impl Default for DirInfo {
    fn default() -> Self {
        Self::new()
    }
}

/// A named edge out of a directory node.
///
/// Every edge carries the link to the child block and the secret that
/// decrypts it. Holding a node therefore suffices to read its entire
/// subtree; nothing outside the tree ever sees a child secret.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum NodeLink {
    Data(Link, Secret, FileInfo),
    Dir(Link, Secret, DirInfo),
}

impl NodeLink {
    pub fn link(&self) -> &Link {
        match self {
            NodeLink::Data(link, _, _) => link,
            NodeLink::Dir(link, _, _) => link,
        }
    }

    pub fn secret(&self) -> &Secret {
        match self {
            NodeLink::Data(_, secret, _) => secret,
            NodeLink::Dir(_, secret, _) => secret,
        }
    }

    pub fn file_info(&self) -> Option<&FileInfo> {
        match self {
            NodeLink::Data(_, _, info) => Some(info),
            NodeLink::Dir(_, _, _) => None,
        }
    }

    pub fn is_dir(&self) -> bool {
        matches!(self, NodeLink::Dir(_, _, _))
    }

    pub fn is_data(&self) -> bool {
        matches!(self, NodeLink::Data(_, _, _))
    }
}

/// One directory in the tree: an ordered map of child name to link.
///
/// Paths are resolved by splitting on `/` and walking these maps from the
/// entry node. Nodes are DAG-CBOR encoded, then encrypted under the secret
/// stored next to their link in the parent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Node {
    links: BTreeMap<String, NodeLink>,
}

impl BlockEncoded<DagCborCodec> for Node {}

impl Node {
    pub fn new() -> Self {
        Node::default()
    }

    pub fn get_link(&self, name: &str) -> Option<&NodeLink> {
        self.links.get(name)
    }

    pub fn insert(&mut self, name: String, link: NodeLink) -> Option<NodeLink> {
        self.links.insert(name, link)
    }

    pub fn del(&mut self, name: &str) -> Option<NodeLink> {
        self.links.remove(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.links.contains_key(name)
    }

    pub fn get_links(&self) -> &BTreeMap<String, NodeLink> {
        &self.links
    }

    pub fn size(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }
}

/// Whether a listing entry is a file or a directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    File,
    Dir,
}

/// One entry in a directory listing, as returned by `ls`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FsNode {
    pub name: String,
    pub kind: NodeKind,
    pub created: DateTime<Utc>,
    pub modified: DateTime<Utc>,
    /// Plaintext size in bytes; zero for directories.
    pub size: u64,
    pub mime: Option<String>,
    pub metadata: Option<BTreeMap<String, LinkedData>>,
}

impl FsNode {
    pub(crate) fn from_link(name: &str, link: &NodeLink) -> Self {
        match link {
            NodeLink::Data(_, _, info) => Self {
                name: name.to_string(),
                kind: NodeKind::File,
                created: info.created,
                modified: info.modified,
                size: info.size,
                mime: info.mime().map(|m| m.to_string()),
                metadata: info.metadata.clone(),
            },
            NodeLink::Dir(_, _, info) => Self {
                name: name.to_string(),
                kind: NodeKind::Dir,
                created: info.created,
                modified: info.modified,
                size: 0,
                mime: None,
                metadata: None,
            },
        }
    }

    pub fn is_dir(&self) -> bool {
        self.kind == NodeKind::Dir
    }
}
