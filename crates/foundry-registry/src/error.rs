//! Error types for the foundry registry

use thiserror::Error;

use crate::storage::StorageError;

/// Registry-specific errors
#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("version {version} of plugin {plugin} already exists")]
    Conflict { plugin: String, version: String },

    #[error("plugin not found: {0}")]
    PluginNotFound(String),

    #[error("version {version} not found for plugin {plugin}")]
    VersionNotFound { plugin: String, version: String },

    #[error("file {file} not found in {plugin} {version}")]
    FileNotFound {
        plugin: String,
        version: String,
        file: String,
    },

    /// A committed metadata row references a blob the backend no longer
    /// has. Surfaced as a server-side fault so operators can detect drift,
    /// never as a client 404.
    #[error("stored metadata references a missing blob: {0}")]
    Inconsistent(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("timestamp parse error: {0}")]
    Time(#[from] time::error::Parse),

    #[error("timestamp format error: {0}")]
    TimeFormat(#[from] time::error::Format),
}

impl RegistryError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Whether retrying the same request unchanged may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, RegistryError::Storage(e) if e.is_retryable())
    }
}

/// Result type for registry operations
pub type Result<T> = std::result::Result<T, RegistryError>;
