//! Local filesystem item store
//!
//! Items live under a root directory. Store paths are resolved segment by
//! segment below the root; `..` is rejected so no call can reach outside it.

use crate::error::StoreError;
use crate::store::{path_segments, staging_name, ItemStore, StoreEntry};
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Item store backed by a directory tree
#[derive(Debug, Clone)]
pub struct LocalItemStore {
    root: PathBuf,
}

impl LocalItemStore {
    /// Open a store rooted at an existing directory
    pub fn new<P: AsRef<Path>>(root: P) -> Result<Self, StoreError> {
        let root = dunce::canonicalize(root.as_ref()).map_err(|e| {
            StoreError::InvalidPath(format!(
                "Failed to canonicalize store root {:?}: {}",
                root.as_ref(),
                e
            ))
        })?;
        if !root.is_dir() {
            return Err(StoreError::NotAContainer(root.display().to_string()));
        }
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Absolute filesystem path for a store path
    pub fn resolve(&self, path: &str) -> Result<PathBuf, StoreError> {
        let mut resolved = self.root.clone();
        for segment in path_segments(path)? {
            // Windows treats `\` as a separator
            if cfg!(windows) && segment.contains('\\') {
                return Err(StoreError::InvalidPath(path.to_string()));
            }
            resolved.push(segment);
        }
        Ok(resolved)
    }
}

fn map_io(path: &str, err: std::io::Error) -> StoreError {
    match err.kind() {
        ErrorKind::NotFound => StoreError::NotFound(path.to_string()),
        ErrorKind::AlreadyExists => StoreError::AlreadyExists(path.to_string()),
        _ => StoreError::Io(err),
    }
}

/// Depth-1 listing sorted by name. Symlinks and names that are not valid
/// UTF-8 are skipped.
fn list_dir(dir: &Path, parent: &str) -> Result<Vec<StoreEntry>, StoreError> {
    let mut entries = Vec::new();
    let walker = WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .follow_links(false)
        .sort_by_file_name();

    for entry in walker {
        let entry = entry.map_err(|e| {
            StoreError::Io(std::io::Error::new(
                ErrorKind::Other,
                format!("Failed to list {:?}: {}", dir, e),
            ))
        })?;
        let name = match entry.file_name().to_str() {
            Some(name) => name.to_string(),
            None => {
                warn!(path = ?entry.path(), "Skipping entry with a non-UTF-8 name");
                continue;
            }
        };
        let file_type = entry.file_type();
        if file_type.is_dir() {
            entries.push(StoreEntry::container(parent, &name));
        } else if file_type.is_file() {
            entries.push(StoreEntry::leaf(parent, &name));
        }
    }
    Ok(entries)
}

#[async_trait]
impl ItemStore for LocalItemStore {
    async fn list(&self, path: &str) -> Result<Vec<StoreEntry>, StoreError> {
        let dir = self.resolve(path)?;
        let metadata = tokio::fs::metadata(&dir).await.map_err(|e| map_io(path, e))?;
        if !metadata.is_dir() {
            return Err(StoreError::NotAContainer(path.to_string()));
        }

        let parent = path.to_string();
        tokio::task::spawn_blocking(move || list_dir(&dir, &parent))
            .await
            .map_err(|e| StoreError::Io(std::io::Error::new(ErrorKind::Other, e.to_string())))?
    }

    async fn create_container(&self, path: &str) -> Result<(), StoreError> {
        let dir = self.resolve(path)?;
        tokio::fs::create_dir(&dir).await.map_err(|e| map_io(path, e))?;
        debug!(path, "Created container");
        Ok(())
    }

    async fn create_leaf(&self, path: &str, bytes: &[u8]) -> Result<(), StoreError> {
        let target = self.resolve(path)?;
        let file_name = target
            .file_name()
            .ok_or_else(|| StoreError::InvalidPath(path.to_string()))?
            .to_string_lossy()
            .to_string();
        if tokio::fs::metadata(&target)
            .await
            .map(|m| m.is_dir())
            .unwrap_or(false)
        {
            return Err(StoreError::AlreadyExists(path.to_string()));
        }

        // Write to a sibling temp file, then rename into place
        let temp_path = target.with_file_name(staging_name(&file_name));
        tokio::fs::write(&temp_path, bytes)
            .await
            .map_err(|e| map_io(path, e))?;
        if let Err(e) = tokio::fs::rename(&temp_path, &target).await {
            let _ = tokio::fs::remove_file(&temp_path).await;
            return Err(map_io(path, e));
        }
        debug!(path, bytes = bytes.len(), "Wrote leaf");
        Ok(())
    }

    async fn read_leaf(&self, path: &str) -> Result<Vec<u8>, StoreError> {
        let target = self.resolve(path)?;
        tokio::fs::read(&target).await.map_err(|e| map_io(path, e))
    }

    async fn delete_container(&self, path: &str) -> Result<(), StoreError> {
        let dir = self.resolve(path)?;
        if dir == self.root {
            return Err(StoreError::InvalidPath("cannot delete the store root".to_string()));
        }
        let metadata = tokio::fs::metadata(&dir).await.map_err(|e| map_io(path, e))?;
        if !metadata.is_dir() {
            return Err(StoreError::NotAContainer(path.to_string()));
        }
        tokio::fs::remove_dir_all(&dir)
            .await
            .map_err(|e| map_io(path, e))?;
        debug!(path, "Deleted container");
        Ok(())
    }

    async fn delete_leaf(&self, path: &str) -> Result<(), StoreError> {
        let target = self.resolve(path)?;
        tokio::fs::remove_file(&target)
            .await
            .map_err(|e| map_io(path, e))?;
        debug!(path, "Deleted leaf");
        Ok(())
    }

    async fn move_item(&self, from: &str, to: &str) -> Result<(), StoreError> {
        let source = self.resolve(from)?;
        let target = self.resolve(to)?;
        if tokio::fs::try_exists(&target).await.map_err(|e| map_io(to, e))? {
            return Err(StoreError::AlreadyExists(to.to_string()));
        }
        tokio::fs::rename(&source, &target)
            .await
            .map_err(|e| map_io(from, e))?;
        debug!(from, to, "Moved item");
        Ok(())
    }

    async fn exists(&self, path: &str) -> Result<bool, StoreError> {
        let target = self.resolve(path)?;
        tokio::fs::try_exists(&target)
            .await
            .map_err(|e| map_io(path, e))
    }

    async fn public_url(&self, path: &str) -> Result<Option<String>, StoreError> {
        let target = self.resolve(path)?;
        Ok(Some(format!("file://{}", target.display())))
    }
}
