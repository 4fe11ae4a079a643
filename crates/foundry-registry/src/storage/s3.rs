//! S3-compatible storage backend using the MinIO client.
//!
//! Works with AWS S3, MinIO, and any S3-compatible object storage. A
//! configurable root prefix is prepended to every key inside the bucket,
//! so the rest of the registry only ever sees backend-relative keys.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use time::OffsetDateTime;
use futures_util::StreamExt;
use minio::s3::{
    client::Client,
    creds::StaticProvider,
    http::BaseUrl,
    multimap::Multimap,
    segmented_bytes::SegmentedBytes,
    types::{S3Api, ToStream},
};

use super::{
    BackendKind, BlobStorage, ObjectMetadata, StorageConfig, StorageError, content_type_for,
};
use crate::error::RegistryError;

const DEFAULT_ENDPOINT: &str = "https://s3.amazonaws.com";

/// S3-compatible storage backed by the MinIO client.
pub struct S3Storage {
    client: Client,
    bucket: String,
    root_prefix: String,
}

impl S3Storage {
    /// Create a new S3 storage instance. The root prefix may be empty.
    pub fn new(client: Client, bucket: impl Into<String>, root_prefix: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
            root_prefix: root_prefix.into().trim_matches('/').to_string(),
        }
    }

    /// Build a client from resolved configuration. A missing bucket is a
    /// configuration error, not a runtime storage error.
    pub fn from_config(config: &StorageConfig) -> Result<Self, RegistryError> {
        let bucket = config
            .bucket
            .clone()
            .ok_or_else(|| RegistryError::Config("S3 driver requires a bucket".to_string()))?;

        let endpoint = config.endpoint.as_deref().unwrap_or(DEFAULT_ENDPOINT);
        let mut base_url = BaseUrl::from_str(endpoint)
            .map_err(|e| RegistryError::Config(format!("invalid S3 endpoint URL: {}", e)))?;
        if let Some(region) = &config.region {
            base_url.region = region.clone();
        }
        if config.path_style {
            base_url.virtual_style = false;
        }

        let provider: Option<Box<dyn minio::s3::creds::Provider + Send + Sync>> =
            match (&config.access_key, &config.secret_key) {
                (Some(access_key), Some(secret_key)) => {
                    Some(Box::new(StaticProvider::new(access_key, secret_key, None)))
                }
                (None, None) => None,
                _ => {
                    return Err(RegistryError::Config(
                        "S3 access key and secret key must be set together".to_string(),
                    ));
                }
            };

        let client = Client::new(base_url, provider, None, None)
            .map_err(|e| RegistryError::Config(format!("failed to create S3 client: {}", e)))?;

        Ok(Self::new(
            client,
            bucket,
            config.root_prefix.clone().unwrap_or_default(),
        ))
    }

    /// Ensure bucket exists (create if it doesn't)
    pub async fn ensure_bucket(&self) -> Result<(), StorageError> {
        match self.client.bucket_exists(&self.bucket).send().await {
            Ok(response) => {
                if response.exists {
                    Ok(())
                } else {
                    match self.client.create_bucket(&self.bucket).send().await {
                        Ok(_) => Ok(()),
                        Err(e) => Err(StorageError::Backend(format!(
                            "Failed to create bucket '{}': {}",
                            self.bucket, e
                        ))),
                    }
                }
            }
            Err(e) => Err(StorageError::Unavailable(format!(
                "Failed to check bucket '{}': {}",
                self.bucket, e
            ))),
        }
    }

    /// Prepend the root prefix with exactly one slash between segments.
    fn full_key(&self, key: &str) -> String {
        let key = key.trim_start_matches('/');
        if self.root_prefix.is_empty() {
            key.to_string()
        } else {
            format!("{}/{}", self.root_prefix, key)
        }
    }

    /// Validate S3 key format
    fn validate_key(&self, key: &str) -> Result<(), StorageError> {
        if key.is_empty() || key.len() > 1024 {
            return Err(StorageError::InvalidKey(
                "Key must be between 1 and 1024 characters".into(),
            ));
        }

        if key.starts_with('/') || key.ends_with('/') {
            return Err(StorageError::InvalidKey(
                "Key cannot start or end with '/'".into(),
            ));
        }

        Ok(())
    }

    /// Classify a client error by its message. Missing objects map to
    /// NotFound; connection-level failures are retryable.
    fn classify(op: &str, key: &str, err: impl std::fmt::Display) -> StorageError {
        let message = err.to_string();
        if message.contains("NoSuchKey") || message.contains("404") {
            StorageError::NotFound(key.to_string())
        } else if message.contains("timed out")
            || message.contains("connection")
            || message.contains("Connection")
            || message.contains("503")
        {
            StorageError::Unavailable(format!("Failed to {} '{}': {}", op, key, message))
        } else {
            StorageError::Backend(format!("Failed to {} '{}': {}", op, key, message))
        }
    }
}

#[async_trait]
impl BlobStorage for S3Storage {
    fn kind(&self) -> BackendKind {
        BackendKind::ObjectStore
    }

    async fn put(
        &self,
        key: &str,
        data: Vec<u8>,
        metadata: &ObjectMetadata,
    ) -> Result<(), StorageError> {
        self.validate_key(key)?;
        let full_key = self.full_key(key);

        let mut headers = Multimap::new();
        headers.insert(
            "Content-Type".to_string(),
            content_type_for(key).to_string(),
        );
        headers.insert(
            "x-amz-server-side-encryption".to_string(),
            "AES256".to_string(),
        );
        for (name, value) in metadata {
            headers.insert(format!("x-amz-meta-{}", name), value.clone());
        }

        let bytes = SegmentedBytes::from(Bytes::from(data));

        self.client
            .put_object(&self.bucket, &full_key, bytes)
            .extra_headers(Some(headers))
            .send()
            .await
            .map_err(|e| Self::classify("put file", key, e))?;

        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        self.validate_key(key)?;
        let full_key = self.full_key(key);

        let response = self
            .client
            .get_object(&self.bucket, &full_key)
            .send()
            .await
            .map_err(|e| Self::classify("get file", key, e))?;

        let content = response.content.to_segmented_bytes().await.map_err(|e| {
            StorageError::Backend(format!("Failed to read file '{}' content: {}", key, e))
        })?;

        Ok(content.to_bytes().to_vec())
    }

    async fn exists(&self, key: &str) -> Result<bool, StorageError> {
        self.validate_key(key)?;
        let full_key = self.full_key(key);

        match self.client.stat_object(&self.bucket, &full_key).send().await {
            Ok(_) => Ok(true),
            Err(e) => match Self::classify("stat file", key, e) {
                StorageError::NotFound(_) => Ok(false),
                other => Err(other),
            },
        }
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        self.validate_key(key)?;
        let full_key = self.full_key(key);

        match self
            .client
            .delete_object(&self.bucket, &full_key)
            .send()
            .await
        {
            Ok(_) => Ok(()),
            Err(e) => match Self::classify("delete file", key, e) {
                StorageError::NotFound(_) => Ok(()),
                other => Err(other),
            },
        }
    }

    async fn list_keys(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        let full_prefix = self.full_key(prefix);

        let mut keys = Vec::new();
        let mut stream = self
            .client
            .list_objects(&self.bucket)
            .prefix(Some(full_prefix))
            .recursive(true)
            .to_stream()
            .await;

        while let Some(result) = stream.next().await {
            match result {
                Ok(response) => {
                    for entry in response.contents {
                        // Strip the root prefix so results stay
                        // backend-relative.
                        let name = if self.root_prefix.is_empty() {
                            entry.name
                        } else {
                            match entry.name.strip_prefix(&format!("{}/", self.root_prefix)) {
                                Some(rest) => rest.to_string(),
                                None => continue,
                            }
                        };
                        keys.push(name);
                    }
                }
                Err(e) => {
                    return Err(Self::classify("list files under", prefix, e));
                }
            }
        }

        keys.sort();
        Ok(keys)
    }

    fn physical_path(&self, _key: &str) -> Option<PathBuf> {
        None
    }

    async fn presigned_get_url(
        &self,
        key: &str,
        expiry: Duration,
    ) -> Result<Option<String>, StorageError> {
        self.validate_key(key)?;
        let full_key = self.full_key(key);

        let response = self
            .client
            .get_presigned_object_url(&self.bucket, &full_key, http::Method::GET)
            .expiry_seconds(expiry.as_secs() as u32)
            .send()
            .await
            .map_err(|e| Self::classify("presign url for", key, e))?;

        Ok(Some(response.url))
    }

    async fn last_modified(&self, key: &str) -> Result<OffsetDateTime, StorageError> {
        self.validate_key(key)?;
        let full_key = self.full_key(key);

        let response = self
            .client
            .stat_object(&self.bucket, &full_key)
            .send()
            .await
            .map_err(|e| Self::classify("stat file", key, e))?;

        // The client reports chrono timestamps; convert through the epoch.
        let modified = response.last_modified.ok_or_else(|| {
            StorageError::Backend(format!("No last-modified time for file '{}'", key))
        })?;
        OffsetDateTime::from_unix_timestamp(modified.timestamp()).map_err(|e| {
            StorageError::Backend(format!(
                "Invalid last-modified time for file '{}': {}",
                key, e
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_storage(root_prefix: &str) -> S3Storage {
        let client = Client::new(
            BaseUrl::from_str("http://localhost:9000").unwrap(),
            None,
            None,
            None,
        )
        .unwrap();
        S3Storage::new(client, "test-bucket", root_prefix)
    }

    #[test]
    fn test_full_key_joins_with_single_slash() {
        let storage = test_storage("registry");
        assert_eq!(
            storage.full_key("plugins/demo/1.0.0/plugin.py"),
            "registry/plugins/demo/1.0.0/plugin.py"
        );

        // Stray slashes on either side collapse to one.
        let storage = test_storage("registry/");
        assert_eq!(
            storage.full_key("/plugins/demo/1.0.0/plugin.py"),
            "registry/plugins/demo/1.0.0/plugin.py"
        );
    }

    #[test]
    fn test_full_key_without_prefix() {
        let storage = test_storage("");
        assert_eq!(
            storage.full_key("plugins/demo/1.0.0/plugin.py"),
            "plugins/demo/1.0.0/plugin.py"
        );
    }

    #[test]
    fn test_key_validation() {
        let storage = test_storage("");

        assert!(storage.validate_key("plugins/demo/1.0.0/plugin.py").is_ok());

        assert!(storage.validate_key("").is_err());
        assert!(storage.validate_key("/starts-with-slash").is_err());
        assert!(storage.validate_key("ends-with-slash/").is_err());
        assert!(storage.validate_key(&"x".repeat(1025)).is_err());
    }

    #[test]
    fn test_error_classification() {
        assert!(matches!(
            S3Storage::classify("get file", "k", "NoSuchKey: not there"),
            StorageError::NotFound(_)
        ));
        assert!(matches!(
            S3Storage::classify("get file", "k", "connection refused"),
            StorageError::Unavailable(_)
        ));
        assert!(matches!(
            S3Storage::classify("get file", "k", "AccessDenied"),
            StorageError::Backend(_)
        ));
    }

    #[test]
    fn test_missing_bucket_is_config_error() {
        let config = StorageConfig {
            driver: crate::storage::StorageDriver::S3,
            ..StorageConfig::default()
        };

        match S3Storage::from_config(&config) {
            Err(RegistryError::Config(msg)) => assert!(msg.contains("bucket")),
            _ => panic!("Expected Config error for missing bucket"),
        }
    }
}
