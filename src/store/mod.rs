//! Item Store
//!
//! Abstract capability over the external store that holds the items a fragment
//! describes (local filesystem, cloud drive). The store has no metadata model of
//! its own; fragments are persisted into it as ordinary leaves.

pub mod local;
pub mod memory;

pub use local::LocalItemStore;
pub use memory::{MemoryItemStore, StoreOp};

use crate::error::StoreError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// One child of a container as reported by [`ItemStore::list`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreEntry {
    /// Display name of the item within its container
    pub name: String,
    pub is_container: bool,
    /// Store-relative path of the item
    pub path: String,
}

impl StoreEntry {
    pub fn leaf(parent: &str, name: &str) -> Self {
        Self {
            name: name.to_string(),
            is_container: false,
            path: join_path(parent, name),
        }
    }

    pub fn container(parent: &str, name: &str) -> Self {
        Self {
            name: name.to_string(),
            is_container: true,
            path: join_path(parent, name),
        }
    }
}

/// Item store capability.
///
/// Paths are `/`-separated and relative to the store root; `""` and `"."`
/// name the root itself. Every call may fail independently; implementations
/// may retry internally, callers in this crate never do.
#[async_trait]
pub trait ItemStore: Send + Sync {
    /// Children of a container, in the store's listing order
    async fn list(&self, path: &str) -> Result<Vec<StoreEntry>, StoreError>;

    async fn create_container(&self, path: &str) -> Result<(), StoreError>;

    /// Create or overwrite a leaf
    async fn create_leaf(&self, path: &str, bytes: &[u8]) -> Result<(), StoreError>;

    async fn read_leaf(&self, path: &str) -> Result<Vec<u8>, StoreError>;

    /// Remove a container and everything below it
    async fn delete_container(&self, path: &str) -> Result<(), StoreError>;

    async fn delete_leaf(&self, path: &str) -> Result<(), StoreError>;

    async fn move_item(&self, from: &str, to: &str) -> Result<(), StoreError>;

    async fn exists(&self, path: &str) -> Result<bool, StoreError>;

    /// Publicly reachable URL for an item, when the store has such a notion
    async fn public_url(&self, _path: &str) -> Result<Option<String>, StoreError> {
        Ok(None)
    }
}

/// Join a container path and a child name
pub fn join_path(parent: &str, name: &str) -> String {
    let parent = parent.trim_end_matches('/');
    if parent.is_empty() || parent == "." {
        name.to_string()
    } else {
        format!("{}/{}", parent, name)
    }
}

/// Suffix of the sibling file a leaf is staged in before it replaces the target
const STAGING_SUFFIX: &str = ".fragsync-tmp";

/// Hidden sibling name a leaf called `name` is written to before the rename
pub fn staging_name(name: &str) -> String {
    format!(".{}{}", name, STAGING_SUFFIX)
}

/// True for names produced by [`staging_name`]. An interrupted write can leave
/// such a file behind.
pub fn is_staging_name(name: &str) -> bool {
    name.len() > 1 + STAGING_SUFFIX.len() && name.starts_with('.') && name.ends_with(STAGING_SUFFIX)
}

/// Split a store path into its segments, rejecting anything that leaves the root.
///
/// `""` and `"."` yield no segments. Only `/` separates segments; a `\` is an
/// ordinary name character.
pub fn path_segments(path: &str) -> Result<Vec<&str>, StoreError> {
    let mut segments = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => continue,
            ".." => return Err(StoreError::InvalidPath(path.to_string())),
            s => segments.push(s),
        }
    }
    Ok(segments)
}
