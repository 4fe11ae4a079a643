//! Persistent metadata records.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::OffsetDateTime;

/// A named plugin. Created lazily on first publish and shared by all of
/// its versions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Plugin {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub author: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// One immutable published version of a plugin.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginVersion {
    pub id: i64,
    pub plugin_id: i64,
    pub version: String,
    /// Full manifest document, stored as submitted (or synthesized).
    pub manifest: Value,
    /// Backend-relative key of the primary code artifact.
    pub plugin_file_path: String,
    /// Backend-relative key of the stored manifest, when one was written.
    pub manifest_file_path: Option<String>,
    /// Size in bytes of the primary code artifact.
    pub file_size: i64,
    /// Hex-encoded SHA-256 of the primary code artifact.
    pub checksum: String,
    pub is_latest: bool,
    pub download_count: i64,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// An auxiliary file stored alongside a version's primary artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginFile {
    pub id: i64,
    pub plugin_version_id: i64,
    pub file_name: String,
    /// Backend-relative key.
    pub file_path: String,
    pub file_size: i64,
    pub mime_type: String,
}

/// A dependency declared by a version's manifest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginDependency {
    pub id: i64,
    pub plugin_version_id: i64,
    pub dependency_name: String,
    /// Constraint exactly as the manifest declared it.
    pub version_constraint: String,
}
