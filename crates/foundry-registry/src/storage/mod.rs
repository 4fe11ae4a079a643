//! Blob storage abstraction for plugin artifacts.
//!
//! The registry talks to exactly one backend, chosen once at startup via
//! [`connect`]. Keys handed to a backend are always backend-relative
//! (`plugins/{name}/{version}/{file}`); any bucket root prefix is the
//! backend's own concern.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use time::OffsetDateTime;

use crate::error::RegistryError;

pub mod local;
#[cfg(feature = "s3")]
pub mod s3;

pub use local::LocalStorage;

/// User-defined metadata attached to an object at upload time.
///
/// Ordered so that serialized forms and test assertions are stable.
pub type ObjectMetadata = BTreeMap<String, String>;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Key not found: {0}")]
    NotFound(String),

    #[error("Invalid key format: {0}")]
    InvalidKey(String),

    /// Transient backend failure. Retrying the same request may succeed.
    #[error("Storage backend unavailable: {0}")]
    Unavailable(String),

    /// Non-transient backend failure.
    #[error("Storage backend error: {0}")]
    Backend(String),
}

impl StorageError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, StorageError::Unavailable(_))
    }
}

/// Which family of backend is serving requests. Decides whether downloads
/// can be satisfied by redirecting the client instead of streaming.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    /// Local filesystem; objects have a physical path on this host.
    Local,
    /// S3-compatible object store; objects may be fronted by a CDN.
    ObjectStore,
}

/// Abstraction over artifact blob backends.
#[async_trait]
pub trait BlobStorage: Send + Sync {
    fn kind(&self) -> BackendKind;

    /// Store data at the given key, attaching user metadata where the
    /// backend supports it.
    async fn put(
        &self,
        key: &str,
        data: Vec<u8>,
        metadata: &ObjectMetadata,
    ) -> Result<(), StorageError>;

    /// Retrieve data by key.
    async fn get(&self, key: &str) -> Result<Vec<u8>, StorageError>;

    /// Check if key exists.
    async fn exists(&self, key: &str) -> Result<bool, StorageError>;

    /// Delete data by key. Deleting a missing key is not an error.
    async fn delete(&self, key: &str) -> Result<(), StorageError>;

    /// List all keys under a prefix, backend-relative.
    async fn list_keys(&self, prefix: &str) -> Result<Vec<String>, StorageError>;

    /// Best-effort bulk delete, used to unwind partial uploads.
    async fn delete_all(&self, keys: &[String]) -> Result<(), StorageError> {
        for key in keys {
            self.delete(key).await?;
        }
        Ok(())
    }

    /// Path of the object on the local filesystem, when the backend has
    /// one. Lets bulk reads skip a copy through the trait.
    fn physical_path(&self, _key: &str) -> Option<PathBuf> {
        None
    }

    /// Time-limited direct download URL, for backends that can mint one.
    async fn presigned_get_url(
        &self,
        _key: &str,
        _expiry: Duration,
    ) -> Result<Option<String>, StorageError> {
        Ok(None)
    }

    /// Content type inferred from the key's file name extension.
    fn mime_type(&self, key: &str) -> Option<&'static str> {
        Some(content_type_for(key))
    }

    /// When the object at this key was last written.
    async fn last_modified(&self, key: &str) -> Result<OffsetDateTime, StorageError>;
}

/// Guess a Content-Type from a file name extension.
pub fn content_type_for(filename: &str) -> &'static str {
    let extension = filename
        .rsplit_once('.')
        .map(|(_, ext)| ext)
        .unwrap_or_default();

    match extension.to_ascii_lowercase().as_str() {
        "py" => "text/x-python",
        "json" => "application/json",
        "txt" => "text/plain",
        "md" => "text/markdown",
        "zip" => "application/zip",
        "tar" => "application/x-tar",
        "gz" => "application/gzip",
        "sig" => "application/pgp-signature",
        _ => "application/octet-stream",
    }
}

/// Which backend implementation to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StorageDriver {
    #[default]
    Local,
    S3,
}

impl FromStr for StorageDriver {
    type Err = RegistryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "local" => Ok(StorageDriver::Local),
            "s3" => Ok(StorageDriver::S3),
            other => Err(RegistryError::Config(format!(
                "unknown storage driver {:?} (expected \"local\" or \"s3\")",
                other
            ))),
        }
    }
}

/// Backend selection and connection settings, resolved before startup.
#[derive(Debug, Clone, Default)]
pub struct StorageConfig {
    pub driver: StorageDriver,
    /// Root directory for the local driver.
    pub local_root: Option<PathBuf>,
    pub bucket: Option<String>,
    pub region: Option<String>,
    pub endpoint: Option<String>,
    pub access_key: Option<String>,
    pub secret_key: Option<String>,
    /// Key prefix prepended to every object inside the bucket.
    pub root_prefix: Option<String>,
    /// Use path-style addressing (required by MinIO and most
    /// self-hosted S3 implementations).
    pub path_style: bool,
}

/// Build the configured backend. Called once at startup; a misconfigured
/// or unreachable backend is a hard error, never a silent fallback.
pub async fn connect(config: &StorageConfig) -> Result<Arc<dyn BlobStorage>, RegistryError> {
    match config.driver {
        StorageDriver::Local => {
            let root = config
                .local_root
                .clone()
                .unwrap_or_else(|| PathBuf::from("./data/storage"));
            let storage = LocalStorage::new(root).await?;
            Ok(Arc::new(storage))
        }
        #[cfg(feature = "s3")]
        StorageDriver::S3 => {
            let storage = s3::S3Storage::from_config(config)?;
            storage.ensure_bucket().await?;
            Ok(Arc::new(storage))
        }
        #[cfg(not(feature = "s3"))]
        StorageDriver::S3 => Err(RegistryError::Config(
            "storage driver \"s3\" requires the s3 feature".to_string(),
        )),
    }
}

/// One stored object: content, metadata, and write time.
type MemoryEntry = (Vec<u8>, ObjectMetadata, OffsetDateTime);

/// In-memory storage implementation for testing
#[derive(Debug, Default)]
pub struct MemoryStorage {
    data: std::sync::Mutex<std::collections::HashMap<String, MemoryEntry>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get all stored keys (useful for testing)
    pub fn keys(&self) -> Vec<String> {
        self.data.lock().unwrap().keys().cloned().collect()
    }

    /// Metadata recorded for a key (useful for testing)
    pub fn metadata(&self, key: &str) -> Option<ObjectMetadata> {
        self.data.lock().unwrap().get(key).map(|(_, m, _)| m.clone())
    }

    /// Clear all data (useful for testing)
    pub fn clear(&self) {
        self.data.lock().unwrap().clear();
    }

    /// Get number of stored items
    pub fn len(&self) -> usize {
        self.data.lock().unwrap().len()
    }

    /// Check if storage is empty
    pub fn is_empty(&self) -> bool {
        self.data.lock().unwrap().is_empty()
    }
}

#[async_trait]
impl BlobStorage for MemoryStorage {
    fn kind(&self) -> BackendKind {
        BackendKind::Local
    }

    async fn put(
        &self,
        key: &str,
        data: Vec<u8>,
        metadata: &ObjectMetadata,
    ) -> Result<(), StorageError> {
        let mut storage = self
            .data
            .lock()
            .map_err(|_| StorageError::Backend("Lock poisoned".into()))?;

        storage.insert(
            key.to_string(),
            (data, metadata.clone(), OffsetDateTime::now_utc()),
        );
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        let storage = self
            .data
            .lock()
            .map_err(|_| StorageError::Backend("Lock poisoned".into()))?;

        storage
            .get(key)
            .map(|(data, _, _)| data.clone())
            .ok_or_else(|| StorageError::NotFound(key.to_string()))
    }

    async fn exists(&self, key: &str) -> Result<bool, StorageError> {
        let storage = self
            .data
            .lock()
            .map_err(|_| StorageError::Backend("Lock poisoned".into()))?;

        Ok(storage.contains_key(key))
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        let mut storage = self
            .data
            .lock()
            .map_err(|_| StorageError::Backend("Lock poisoned".into()))?;

        storage.remove(key);
        Ok(())
    }

    async fn list_keys(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        let storage = self
            .data
            .lock()
            .map_err(|_| StorageError::Backend("Lock poisoned".into()))?;

        let mut keys: Vec<String> = storage
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect();
        keys.sort();
        Ok(keys)
    }

    async fn last_modified(&self, key: &str) -> Result<OffsetDateTime, StorageError> {
        let storage = self
            .data
            .lock()
            .map_err(|_| StorageError::Backend("Lock poisoned".into()))?;

        storage
            .get(key)
            .map(|(_, _, written_at)| *written_at)
            .ok_or_else(|| StorageError::NotFound(key.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_storage_basic_operations() {
        let storage = MemoryStorage::new();
        let key = "plugins/demo/1.0.0/plugin.py";
        let data = b"print('hello')".to_vec();

        storage
            .put(key, data.clone(), &ObjectMetadata::new())
            .await
            .unwrap();
        let retrieved = storage.get(key).await.unwrap();
        assert_eq!(data, retrieved);

        assert!(storage.exists(key).await.unwrap());
        assert!(!storage.exists("nonexistent").await.unwrap());

        storage.delete(key).await.unwrap();
        assert!(!storage.exists(key).await.unwrap());
        assert!(storage.get(key).await.is_err());
    }

    #[tokio::test]
    async fn test_memory_storage_not_found() {
        let storage = MemoryStorage::new();
        let result = storage.get("nonexistent").await;

        match result {
            Err(StorageError::NotFound(key)) => assert_eq!(key, "nonexistent"),
            _ => panic!("Expected NotFound error"),
        }
    }

    #[tokio::test]
    async fn test_memory_storage_metadata() {
        let storage = MemoryStorage::new();
        let mut metadata = ObjectMetadata::new();
        metadata.insert("plugin-name".to_string(), "demo".to_string());

        storage
            .put("plugins/demo/1.0.0/plugin.py", b"x".to_vec(), &metadata)
            .await
            .unwrap();

        let recorded = storage.metadata("plugins/demo/1.0.0/plugin.py").unwrap();
        assert_eq!(recorded.get("plugin-name").map(String::as_str), Some("demo"));
    }

    #[tokio::test]
    async fn test_memory_storage_list_keys() {
        let storage = MemoryStorage::new();
        let empty = ObjectMetadata::new();

        storage
            .put("plugins/a/1.0.0/plugin.py", b"1".to_vec(), &empty)
            .await
            .unwrap();
        storage
            .put("plugins/a/1.0.0/manifest.json", b"2".to_vec(), &empty)
            .await
            .unwrap();
        storage
            .put("plugins/b/1.0.0/plugin.py", b"3".to_vec(), &empty)
            .await
            .unwrap();

        let keys = storage.list_keys("plugins/a/").await.unwrap();
        assert_eq!(
            keys,
            vec![
                "plugins/a/1.0.0/manifest.json".to_string(),
                "plugins/a/1.0.0/plugin.py".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_delete_all_unwinds_keys() {
        let storage = MemoryStorage::new();
        let empty = ObjectMetadata::new();

        storage.put("a", b"1".to_vec(), &empty).await.unwrap();
        storage.put("b", b"2".to_vec(), &empty).await.unwrap();

        storage
            .delete_all(&["a".to_string(), "b".to_string(), "missing".to_string()])
            .await
            .unwrap();
        assert!(storage.is_empty());
    }

    #[tokio::test]
    async fn test_memory_storage_last_modified() {
        let storage = MemoryStorage::new();
        let before = OffsetDateTime::now_utc();

        storage
            .put("key", b"x".to_vec(), &ObjectMetadata::new())
            .await
            .unwrap();

        let written_at = storage.last_modified("key").await.unwrap();
        assert!(written_at >= before);
        assert!(matches!(
            storage.last_modified("missing").await,
            Err(StorageError::NotFound(_))
        ));
    }

    #[test]
    fn test_content_type_for() {
        assert_eq!(content_type_for("plugin.py"), "text/x-python");
        assert_eq!(content_type_for("manifest.json"), "application/json");
        assert_eq!(content_type_for("README.md"), "text/markdown");
        assert_eq!(content_type_for("bundle.ZIP"), "application/zip");
        assert_eq!(content_type_for("release.sig"), "application/pgp-signature");
        assert_eq!(content_type_for("data.bin"), "application/octet-stream");
        assert_eq!(content_type_for("no_extension"), "application/octet-stream");
    }

    #[test]
    fn test_storage_driver_from_str() {
        assert_eq!("local".parse::<StorageDriver>().unwrap(), StorageDriver::Local);
        assert_eq!("S3".parse::<StorageDriver>().unwrap(), StorageDriver::S3);
        assert!("gcs".parse::<StorageDriver>().is_err());
    }
}
