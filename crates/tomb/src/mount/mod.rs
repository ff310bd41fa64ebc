//! Encrypted file trees and the mount session that drives them.
//!
//! A bucket's content is a DAG of [`Node`]s: each directory is a map of
//! child names to links, each link pairs a content address with the secret
//! that decrypts the child. The root of the tree hangs off a plaintext
//! [`Manifest`], which also carries the share map and the version chain.
//!
//! [`Mount`] is the working handle: it holds the decrypted root in memory
//! and turns every mutation into a new durable version before returning.

mod dedup;
mod manifest;
mod maybe_mime;
mod mount;
mod node;

pub use dedup::{copy_name, unique_name};
pub use manifest::{Manifest, Share, Shares};
pub use maybe_mime::MaybeMime;
pub use mount::{clean_path, Mount, MountError};
pub use node::{DirInfo, FileInfo, FsNode, Node, NodeKind, NodeLink};
