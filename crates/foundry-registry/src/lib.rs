//! # Foundry Registry
//!
//! Core library for a plugin package registry:
//! - Versioned plugin artifacts (code file, manifest, auxiliary files) on a
//!   pluggable blob store (local filesystem or S3-compatible object store)
//! - SQLite metadata with atomic, all-or-nothing version publication
//! - Semantic-version ordering for "latest" resolution and listings
//! - Download, archive-on-demand, and CDN redirect workflows
//!
//! ## Core Concepts
//!
//! - **Plugins** are created lazily on first publish and own their versions
//! - **Versions** are immutable once published; a duplicate version is a
//!   conflict, never an overwrite
//! - **Latest** is recomputed from the full version set on every publish, so
//!   out-of-order publishes stay consistent
//! - **Artifacts** live under `plugins/{name}/{version}/{filename}` on
//!   whichever backend was configured at startup
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use foundry_registry::{Database, Registry, RegistryConfig};
//! use foundry_registry::registry::{FileUpload, PublishRequest};
//! use foundry_registry::storage::MemoryStorage;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let db = Database::new("sqlite::memory:").await?;
//! let registry = Registry::new(db, Arc::new(MemoryStorage::new()), RegistryConfig::default());
//!
//! let receipt = registry
//!     .publish(PublishRequest {
//!         plugin_file: FileUpload {
//!             file_name: "plugin.py".into(),
//!             content: b"print('hello')".to_vec(),
//!         },
//!         name: Some("hello".into()),
//!         version: Some("1.0.0".into()),
//!         ..PublishRequest::default()
//!     })
//!     .await?;
//!
//! println!("published {} {}", receipt.plugin_name, receipt.version);
//! # Ok(())
//! # }
//! ```

pub mod db;
pub mod entities;
pub mod error;
pub mod key;
pub mod manifest;
pub mod registry;
pub mod semver;
pub mod storage;

pub use db::Database;
pub use error::{RegistryError, Result};
pub use registry::{Registry, RegistryConfig};
pub use storage::{BlobStorage, LocalStorage, MemoryStorage, StorageConfig, StorageDriver};

#[cfg(feature = "s3")]
pub use storage::s3::S3Storage;
