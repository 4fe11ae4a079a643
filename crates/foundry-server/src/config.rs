//! Server configuration management

use std::path::PathBuf;

use foundry_registry::RegistryConfig;
use foundry_registry::storage::{StorageConfig, StorageDriver};

use crate::error::{ApiError, Result};

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,

    /// Port to bind to
    pub port: u16,

    /// SQLite connection string
    pub database_url: String,

    /// Blob backend selection and credentials
    pub storage: StorageConfig,

    /// CDN base URL fronting the object store
    pub cdn_url: Option<String>,

    /// External base URL of this server, for absolute links
    pub public_url: Option<String>,

    /// Upper bound on multipart upload size in bytes
    pub max_upload_bytes: usize,
}

impl ServerConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let driver: StorageDriver = std::env::var("STORAGE_DRIVER")
            .unwrap_or_else(|_| "local".to_string())
            .parse()?;

        let storage = StorageConfig {
            driver,
            local_root: env_opt("STORAGE_ROOT").map(PathBuf::from),
            bucket: env_opt("S3_BUCKET"),
            region: env_opt("S3_REGION"),
            endpoint: env_opt("S3_ENDPOINT_URL"),
            access_key: env_opt("S3_ACCESS_KEY_ID"),
            secret_key: env_opt("S3_SECRET_ACCESS_KEY"),
            root_prefix: env_opt("S3_ROOT_PREFIX"),
            path_style: std::env::var("S3_USE_PATH_STYLE")
                .map(|s| s.to_lowercase() == "true")
                .unwrap_or(false),
        };

        Ok(Self {
            host: std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "8089".to_string())
                .parse()
                .map_err(|_| ApiError::Config("Invalid PORT value".to_string()))?,
            database_url: std::env::var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite:./data/foundry.db".to_string()),
            storage,
            cdn_url: env_opt("CDN_URL"),
            public_url: env_opt("PUBLIC_URL"),
            max_upload_bytes: std::env::var("MAX_UPLOAD_BYTES")
                .unwrap_or_else(|_| (50 * 1024 * 1024).to_string())
                .parse()
                .map_err(|_| ApiError::Config("Invalid MAX_UPLOAD_BYTES value".to_string()))?,
        })
    }

    /// Settings the registry layer needs.
    pub fn registry_config(&self) -> RegistryConfig {
        RegistryConfig {
            cdn_url: self.cdn_url.clone(),
            public_url: self.public_url.clone(),
        }
    }
}

fn env_opt(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|s| !s.trim().is_empty())
}
