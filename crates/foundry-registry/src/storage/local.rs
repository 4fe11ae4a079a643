//! Local filesystem storage backend.
//!
//! Keys map directly onto paths under a root directory, so the on-disk
//! layout mirrors the key layout:
//!
//! ```text
//! root/
//! └── plugins/
//!     └── my-plugin/
//!         └── 1.0.0/
//!             ├── plugin.py
//!             ├── manifest.json
//!             └── README.md
//! ```
//!
//! Object metadata has no filesystem representation and is dropped on
//! write.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::fs;

use super::{BackendKind, BlobStorage, ObjectMetadata, StorageError};

pub struct LocalStorage {
    root: PathBuf,
}

impl LocalStorage {
    /// Create a local backend rooted at the given directory, creating it
    /// if needed.
    pub async fn new(root: impl AsRef<Path>) -> Result<Self, StorageError> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)
            .await
            .map_err(|e| io_error("create storage root", root.display().to_string().as_str(), e))?;
        Ok(Self { root })
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StorageError> {
        if key.is_empty() {
            return Err(StorageError::InvalidKey("key cannot be empty".into()));
        }
        if key.starts_with('/') || key.contains("..") || key.contains('\0') {
            return Err(StorageError::InvalidKey(format!(
                "key {:?} is not a relative path",
                key
            )));
        }
        Ok(self.root.join(key))
    }

    async fn collect_keys(
        &self,
        dir: &Path,
        keys: &mut Vec<String>,
    ) -> Result<(), StorageError> {
        let mut entries = fs::read_dir(dir)
            .await
            .map_err(|e| io_error("read dir", &dir.display().to_string(), e))?;

        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| io_error("read dir entry", &dir.display().to_string(), e))?
        {
            let path = entry.path();
            if path.is_dir() {
                // Use Box::pin for recursive call
                Box::pin(self.collect_keys(&path, keys)).await?;
            } else if let Ok(rel) = path.strip_prefix(&self.root) {
                if let Some(rel_str) = rel.to_str() {
                    // Normalize to forward slashes so keys match on every
                    // platform.
                    keys.push(rel_str.replace('\\', "/"));
                }
            }
        }

        Ok(())
    }
}

/// Map an io error to the storage taxonomy. Missing files are NotFound,
/// transient conditions are retryable, everything else is fatal.
fn io_error(op: &str, target: &str, err: std::io::Error) -> StorageError {
    use std::io::ErrorKind;

    match err.kind() {
        ErrorKind::NotFound => StorageError::NotFound(target.to_string()),
        ErrorKind::TimedOut | ErrorKind::Interrupted | ErrorKind::WouldBlock => {
            StorageError::Unavailable(format!("{} '{}': {}", op, target, err))
        }
        _ => StorageError::Backend(format!("{} '{}': {}", op, target, err)),
    }
}

#[async_trait]
impl BlobStorage for LocalStorage {
    fn kind(&self) -> BackendKind {
        BackendKind::Local
    }

    async fn put(
        &self,
        key: &str,
        data: Vec<u8>,
        _metadata: &ObjectMetadata,
    ) -> Result<(), StorageError> {
        let path = self.path_for(key)?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| io_error("create dir", key, e))?;
        }

        fs::write(&path, data)
            .await
            .map_err(|e| io_error("write", key, e))?;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        let path = self.path_for(key)?;
        fs::read(&path).await.map_err(|e| io_error("read", key, e))
    }

    async fn exists(&self, key: &str) -> Result<bool, StorageError> {
        let path = self.path_for(key)?;
        match fs::metadata(&path).await {
            Ok(meta) => Ok(meta.is_file()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(io_error("stat", key, e)),
        }
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        let path = self.path_for(key)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(io_error("delete", key, e)),
        }
    }

    async fn list_keys(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        // The prefix may name a directory or a partial file name; walk the
        // deepest existing directory and filter on the full prefix.
        let start = {
            let candidate = self.root.join(prefix);
            if candidate.is_dir() {
                candidate
            } else {
                match candidate.parent() {
                    Some(parent) if parent.starts_with(&self.root) && parent.is_dir() => {
                        parent.to_path_buf()
                    }
                    _ => return Ok(Vec::new()),
                }
            }
        };

        let mut keys = Vec::new();
        self.collect_keys(&start, &mut keys).await?;
        keys.retain(|k| k.starts_with(prefix));
        keys.sort();
        Ok(keys)
    }

    fn physical_path(&self, key: &str) -> Option<PathBuf> {
        self.path_for(key).ok()
    }

    async fn presigned_get_url(
        &self,
        _key: &str,
        _expiry: Duration,
    ) -> Result<Option<String>, StorageError> {
        Ok(None)
    }

    async fn last_modified(&self, key: &str) -> Result<OffsetDateTime, StorageError> {
        let path = self.path_for(key)?;
        let meta = fs::metadata(&path)
            .await
            .map_err(|e| io_error("stat", key, e))?;
        let modified = meta.modified().map_err(|e| io_error("stat", key, e))?;
        Ok(OffsetDateTime::from(modified))
    }
}
