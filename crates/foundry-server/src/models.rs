//! API models for requests and responses

use foundry_registry::entities::{Plugin, PluginDependency, PluginFile, PluginVersion};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::OffsetDateTime;

/// Standard API response wrapper
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn new(data: T) -> Self {
        Self {
            data,
            message: None,
        }
    }

    pub fn with_message(data: T, message: impl Into<String>) -> Self {
        Self {
            data,
            message: Some(message.into()),
        }
    }
}

/// Page-numbered pagination response
#[derive(Debug, Serialize)]
pub struct Paginated<T> {
    pub data: Vec<T>,
    pub current_page: i64,
    pub per_page: i64,
    pub total: i64,
    pub last_page: i64,
}

impl<T> Paginated<T> {
    pub fn new(data: Vec<T>, page: i64, per_page: i64, total: i64) -> Self {
        Self {
            data,
            current_page: page,
            per_page,
            total,
            last_page: (total.max(0) + per_page - 1) / per_page.max(1),
        }
    }
}

fn default_page() -> i64 {
    1
}

fn default_per_page() -> i64 {
    20
}

/// Query parameters for the plugin listing
#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub search: Option<String>,
    pub author: Option<String>,
    #[serde(default = "default_page")]
    pub page: i64,
    #[serde(default = "default_per_page")]
    pub per_page: i64,
}

/// Query parameters for the search endpoint
#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub q: String,
    /// Column to match: name, description, author, or all.
    pub field: Option<String>,
    #[serde(default = "default_page")]
    pub page: i64,
    #[serde(default = "default_per_page")]
    pub per_page: i64,
}

/// Query parameters for download endpoints
#[derive(Debug, Deserialize)]
pub struct DownloadQuery {
    /// "zip" (default) or "json".
    pub format: Option<String>,
}

/// One plugin in a listing
#[derive(Debug, Serialize)]
pub struct PluginSummary {
    pub name: String,
    pub description: String,
    pub author: String,
    pub latest_version: Option<String>,
    pub version_count: i64,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl PluginSummary {
    pub fn from_plugin(plugin: Plugin, latest_version: Option<String>, version_count: i64) -> Self {
        Self {
            name: plugin.name,
            description: plugin.description,
            author: plugin.author,
            latest_version,
            version_count,
            created_at: plugin.created_at,
            updated_at: plugin.updated_at,
        }
    }
}

/// One version in a plugin's detail view
#[derive(Debug, Serialize)]
pub struct VersionSummary {
    pub version: String,
    pub is_latest: bool,
    pub file_size: i64,
    pub checksum: String,
    pub download_count: i64,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl From<PluginVersion> for VersionSummary {
    fn from(version: PluginVersion) -> Self {
        Self {
            version: version.version,
            is_latest: version.is_latest,
            file_size: version.file_size,
            checksum: version.checksum,
            download_count: version.download_count,
            created_at: version.created_at,
        }
    }
}

/// A plugin with all of its versions
#[derive(Debug, Serialize)]
pub struct PluginDetails {
    pub name: String,
    pub description: String,
    pub author: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
    pub versions: Vec<VersionSummary>,
}

impl PluginDetails {
    pub fn new(plugin: Plugin, versions: Vec<PluginVersion>) -> Self {
        Self {
            name: plugin.name,
            description: plugin.description,
            author: plugin.author,
            created_at: plugin.created_at,
            updated_at: plugin.updated_at,
            versions: versions.into_iter().map(VersionSummary::from).collect(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct FileInfo {
    pub file_name: String,
    pub file_size: i64,
    pub mime_type: String,
}

impl From<PluginFile> for FileInfo {
    fn from(file: PluginFile) -> Self {
        Self {
            file_name: file.file_name,
            file_size: file.file_size,
            mime_type: file.mime_type,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct DependencyInfo {
    pub name: String,
    pub constraint: String,
}

impl From<PluginDependency> for DependencyInfo {
    fn from(dep: PluginDependency) -> Self {
        Self {
            name: dep.dependency_name,
            constraint: dep.version_constraint,
        }
    }
}

/// Everything recorded about one version
#[derive(Debug, Serialize)]
pub struct VersionDetails {
    pub plugin: String,
    pub version: String,
    pub manifest: Value,
    pub file_size: i64,
    pub checksum: String,
    pub is_latest: bool,
    pub download_count: i64,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    pub files: Vec<FileInfo>,
    pub dependencies: Vec<DependencyInfo>,
}

impl VersionDetails {
    pub fn new(
        plugin: Plugin,
        version: PluginVersion,
        files: Vec<PluginFile>,
        dependencies: Vec<PluginDependency>,
    ) -> Self {
        Self {
            plugin: plugin.name,
            version: version.version,
            manifest: version.manifest,
            file_size: version.file_size,
            checksum: version.checksum,
            is_latest: version.is_latest,
            download_count: version.download_count,
            created_at: version.created_at,
            files: files.into_iter().map(FileInfo::from).collect(),
            dependencies: dependencies.into_iter().map(DependencyInfo::from).collect(),
        }
    }
}

/// Response body for a successful publication
#[derive(Debug, Serialize)]
pub struct PublishResponse {
    pub plugin: String,
    pub version: String,
    pub checksum: String,
    pub is_latest: bool,
    pub download_url: String,
}
