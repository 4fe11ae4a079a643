//! Publication and retrieval workflows.
//!
//! [`Registry`] ties the metadata store and the blob backend together.
//! Publication is all-or-nothing: blobs are uploaded first, metadata rows
//! are committed last, and a failed publication rolls the rows back and
//! best-effort deletes the blobs it already uploaded.

use std::collections::BTreeMap;
use std::io::Write;
use std::sync::Arc;

use serde::Serialize;
use sha2::{Digest, Sha256};
use tempfile::NamedTempFile;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use crate::db::{Database, NewVersion, SearchField};
use crate::entities::{Plugin, PluginDependency, PluginFile, PluginVersion};
use crate::error::{RegistryError, Result};
use crate::key::{
    MANIFEST_FILE_NAME, PLUGIN_FILE_NAME, build_key, validate_file_name, validate_plugin_name,
};
use crate::manifest;
use crate::semver::SemVer;
use crate::storage::{BackendKind, BlobStorage, ObjectMetadata, content_type_for};

/// Version assigned when neither the request nor the manifest names one.
pub const DEFAULT_VERSION: &str = "0.1.0";

const LATEST: &str = "latest";

/// Deployment-level settings injected at construction.
#[derive(Debug, Clone, Default)]
pub struct RegistryConfig {
    /// CDN base fronting the object store. When set, object-store
    /// downloads redirect here instead of streaming.
    pub cdn_url: Option<String>,
    /// External base URL of this server, used to build absolute links in
    /// file listings.
    pub public_url: Option<String>,
}

/// A file received from a publisher, already read into memory.
#[derive(Debug, Clone, Default)]
pub struct FileUpload {
    pub file_name: String,
    pub content: Vec<u8>,
}

/// Everything a publisher submits for one version.
#[derive(Debug, Clone, Default)]
pub struct PublishRequest {
    /// The primary code artifact. Required.
    pub plugin_file: FileUpload,
    /// Manifest document; synthesized when absent.
    pub manifest_file: Option<FileUpload>,
    pub additional_files: Vec<FileUpload>,
    /// Overrides the manifest's name.
    pub name: Option<String>,
    /// Overrides the manifest's version.
    pub version: Option<String>,
    pub description: Option<String>,
    pub author: Option<String>,
}

/// What a successful publication produced.
#[derive(Debug, Clone, Serialize)]
pub struct PublishReceipt {
    pub plugin_name: String,
    pub version: String,
    pub version_id: i64,
    pub checksum: String,
    pub is_latest: bool,
}

/// How a single-file download should be satisfied.
#[derive(Debug)]
pub enum FileDelivery {
    /// Client should follow this URL to the CDN.
    Redirect(String),
    /// Serve the bytes directly.
    Stream {
        content: Vec<u8>,
        content_type: &'static str,
        file_name: String,
    },
}

/// A ZIP bundle of every file in a version, staged in a temp file that is
/// removed when this value drops.
pub struct ArchiveDownload {
    pub file_name: String,
    pub archive: NamedTempFile,
}

/// One entry in a version's file listing.
#[derive(Debug, Clone, Serialize)]
pub struct FileEntry {
    pub name: String,
    pub url: String,
    pub size: i64,
    pub checksum: String,
}

/// Download-manifest view of a version.
#[derive(Debug, Clone, Serialize)]
pub struct VersionFiles {
    pub plugin_name: String,
    pub version: String,
    pub files: Vec<FileEntry>,
    pub archive_url: String,
}

/// Per-plugin entry in the full registry index.
#[derive(Debug, Clone, Serialize)]
pub struct IndexEntry {
    /// All versions, newest first.
    pub versions: Vec<String>,
    pub latest: Option<String>,
}

pub struct Registry {
    db: Database,
    storage: Arc<dyn BlobStorage>,
    config: RegistryConfig,
}

impl Registry {
    pub fn new(db: Database, storage: Arc<dyn BlobStorage>, config: RegistryConfig) -> Self {
        Self {
            db,
            storage,
            config,
        }
    }

    /// Publish one version of a plugin.
    ///
    /// Name and version come from the request when given, falling back to
    /// the manifest, then (for the version) to [`DEFAULT_VERSION`]. The
    /// plugin row is created on first publish; a duplicate version is a
    /// conflict and leaves existing data untouched.
    pub async fn publish(&self, request: PublishRequest) -> Result<PublishReceipt> {
        if request.plugin_file.content.is_empty() {
            return Err(RegistryError::validation("plugin file is empty"));
        }

        // Parse the manifest up front so a malformed one fails the whole
        // publication before anything is written.
        let submitted_manifest = request
            .manifest_file
            .as_ref()
            .map(|upload| manifest::parse(&upload.content))
            .transpose()?;

        let name = request
            .name
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .or_else(|| {
                submitted_manifest
                    .as_ref()
                    .and_then(|m| manifest::str_field(m, "name"))
            })
            .ok_or_else(|| {
                RegistryError::validation("plugin name missing from both request and manifest")
            })?
            .to_string();
        validate_plugin_name(&name)?;

        let version = request
            .version
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .or_else(|| {
                submitted_manifest
                    .as_ref()
                    .and_then(|m| manifest::str_field(m, "version"))
            })
            .unwrap_or(DEFAULT_VERSION)
            .to_string();
        if !SemVer::is_valid(&version) {
            return Err(RegistryError::validation(format!(
                "version {:?} is not of the form major.minor.patch",
                version
            )));
        }

        if !request.plugin_file.file_name.is_empty() {
            validate_file_name(&request.plugin_file.file_name)?;
        }
        for upload in &request.additional_files {
            validate_file_name(&upload.file_name)?;
        }

        let mut tx = self.db.begin().await?;

        let description = request
            .description
            .as_deref()
            .or_else(|| {
                submitted_manifest
                    .as_ref()
                    .and_then(|m| manifest::str_field(m, "description"))
            })
            .unwrap_or("")
            .to_string();
        let author = request
            .author
            .as_deref()
            .or_else(|| {
                submitted_manifest
                    .as_ref()
                    .and_then(|m| manifest::str_field(m, "author"))
            })
            .unwrap_or("unknown")
            .to_string();

        let plugin = self
            .db
            .get_or_create_plugin(&mut tx, &name, &description, &author)
            .await?;
        self.db
            .update_plugin(
                &mut tx,
                plugin.id,
                request.description.as_deref(),
                request.author.as_deref(),
            )
            .await?;

        if self.db.version_exists(&mut tx, plugin.id, &version).await? {
            return Err(RegistryError::Conflict {
                plugin: name,
                version,
            });
        }

        // Blobs go out before rows are committed; a rollback can only
        // orphan blobs, never leave rows pointing at nothing.
        let result = self
            .upload_and_record(
                &mut tx,
                &plugin,
                &version,
                &request,
                submitted_manifest,
                &description,
                &author,
            )
            .await;

        let version_id = match result {
            Ok(id) => id,
            Err(e) => {
                drop(tx);
                self.unwind_uploads(&name, &version).await;
                return Err(e);
            }
        };

        // Recompute the latest flag from the full version set so
        // out-of-order publishes resolve correctly.
        let mut versions = self.db.list_version_strings(&mut tx, plugin.id).await?;
        versions.sort_by(|a, b| SemVer::compare(b, a));
        let newest = versions.first().cloned().unwrap_or_else(|| version.clone());
        self.db.reset_latest(&mut tx, plugin.id).await?;
        self.db.mark_latest(&mut tx, plugin.id, &newest).await?;

        if let Err(e) = tx.commit().await {
            self.unwind_uploads(&name, &version).await;
            return Err(e.into());
        }

        let checksum = sha256_hex(&request.plugin_file.content);
        let is_latest = newest == version;
        tracing::info!(plugin = %name, %version, is_latest, "published plugin version");

        Ok(PublishReceipt {
            plugin_name: name,
            version,
            version_id,
            checksum,
            is_latest,
        })
    }

    #[allow(clippy::too_many_arguments)]
    async fn upload_and_record(
        &self,
        tx: &mut sqlx::Transaction<'static, sqlx::Sqlite>,
        plugin: &Plugin,
        version: &str,
        request: &PublishRequest,
        submitted_manifest: Option<serde_json::Value>,
        description: &str,
        author: &str,
    ) -> Result<i64> {
        let uploaded_at = OffsetDateTime::now_utc().format(&Rfc3339)?;
        let mut metadata = ObjectMetadata::new();
        metadata.insert("plugin-name".to_string(), plugin.name.clone());
        metadata.insert("version".to_string(), version.to_string());
        metadata.insert("author".to_string(), author.to_string());
        metadata.insert("uploaded-at".to_string(), uploaded_at);

        // The primary artifact keeps the name it was uploaded under; the
        // canonical plugin.py name maps onto it at retrieval.
        let primary_name = match request.plugin_file.file_name.as_str() {
            "" => PLUGIN_FILE_NAME,
            submitted => submitted,
        };
        let plugin_key = build_key(&plugin.name, version, primary_name);
        let checksum = sha256_hex(&request.plugin_file.content);
        self.storage
            .put(&plugin_key, request.plugin_file.content.clone(), &metadata)
            .await?;

        // Store the manifest exactly as submitted; synthesize a minimal
        // one otherwise so every version carries a manifest.json.
        let (manifest_value, manifest_bytes) = match (&request.manifest_file, submitted_manifest) {
            (Some(upload), Some(value)) => (value, upload.content.clone()),
            _ => {
                let value = manifest::synthesize(&plugin.name, version, description, author);
                let bytes = serde_json::to_vec_pretty(&value)?;
                (value, bytes)
            }
        };
        let manifest_key = build_key(&plugin.name, version, MANIFEST_FILE_NAME);
        self.storage
            .put(&manifest_key, manifest_bytes, &metadata)
            .await?;

        let version_id = self
            .db
            .insert_version(
                tx,
                &NewVersion {
                    plugin_id: plugin.id,
                    version: version.to_string(),
                    manifest: manifest_value.clone(),
                    plugin_file_path: plugin_key,
                    manifest_file_path: Some(manifest_key),
                    file_size: request.plugin_file.content.len() as i64,
                    checksum,
                },
            )
            .await?;

        for upload in &request.additional_files {
            let key = build_key(&plugin.name, version, &upload.file_name);
            self.storage
                .put(&key, upload.content.clone(), &metadata)
                .await?;

            self.db
                .insert_file(
                    tx,
                    version_id,
                    &upload.file_name,
                    &key,
                    upload.content.len() as i64,
                    content_type_for(&upload.file_name),
                )
                .await?;
        }

        for (dep_name, constraint) in manifest::dependencies(&manifest_value) {
            self.db
                .insert_dependency(tx, version_id, &dep_name, &constraint)
                .await?;
        }

        Ok(version_id)
    }

    /// Best-effort removal of everything an aborted publication wrote.
    /// The duplicate check ran before any upload, so the version prefix
    /// can only contain this publication's blobs.
    async fn unwind_uploads(&self, plugin_name: &str, version: &str) {
        // Trailing slash keeps "1.0.0" from matching "1.0.01".
        let prefix = format!("{}/", build_key(plugin_name, version, ""));
        let result = match self.storage.list_keys(&prefix).await {
            Ok(keys) => self.storage.delete_all(&keys).await,
            Err(e) => Err(e),
        };
        if let Err(e) = result {
            tracing::warn!(error = %e, "failed to clean up blobs from aborted publication");
        }
    }

    /// Resolve a plugin and a version reference, where the reference is a
    /// concrete version string or `latest`.
    pub async fn resolve_version(
        &self,
        plugin_name: &str,
        version_ref: &str,
    ) -> Result<(Plugin, PluginVersion)> {
        let plugin = self
            .db
            .get_plugin(plugin_name)
            .await?
            .ok_or_else(|| RegistryError::PluginNotFound(plugin_name.to_string()))?;

        let version = if version_ref == LATEST {
            match self.db.latest_version(plugin.id).await? {
                Some(v) => Some(v),
                // Flag missing: fall back to sorting what exists.
                None => {
                    let mut versions = self.db.list_versions(plugin.id).await?;
                    versions.sort_by(|a, b| SemVer::compare(&b.version, &a.version));
                    versions.into_iter().next()
                }
            }
        } else {
            self.db.get_version(plugin.id, version_ref).await?
        };

        let version = version.ok_or_else(|| RegistryError::VersionNotFound {
            plugin: plugin_name.to_string(),
            version: version_ref.to_string(),
        })?;

        Ok((plugin, version))
    }

    /// Fetch one file of a version, as a CDN redirect when one fronts the
    /// object store and a byte stream otherwise.
    pub async fn get_file(
        &self,
        plugin_name: &str,
        version_ref: &str,
        file_name: &str,
    ) -> Result<FileDelivery> {
        validate_file_name(file_name)?;
        let (plugin, version) = self.resolve_version(plugin_name, version_ref).await?;

        let key = self.file_key(&plugin, &version, file_name).await?;

        if !self.storage.exists(&key).await? {
            return Err(RegistryError::Inconsistent(format!(
                "blob {} is recorded but missing from storage",
                key
            )));
        }

        self.db.increment_download_count(version.id).await?;

        if self.storage.kind() == BackendKind::ObjectStore {
            if let Some(cdn) = &self.config.cdn_url {
                return Ok(FileDelivery::Redirect(join_url(cdn, &key)));
            }
        }

        let content = self.storage.get(&key).await?;
        Ok(FileDelivery::Stream {
            content,
            content_type: self
                .storage
                .mime_type(file_name)
                .unwrap_or("application/octet-stream"),
            file_name: file_name.to_string(),
        })
    }

    /// Bundle every file of a version into a ZIP staged on disk.
    pub async fn get_archive(
        &self,
        plugin_name: &str,
        version_ref: &str,
    ) -> Result<ArchiveDownload> {
        let (plugin, version) = self.resolve_version(plugin_name, version_ref).await?;

        let mut entries: Vec<(String, Vec<u8>)> = Vec::new();
        entries.push((
            PLUGIN_FILE_NAME.to_string(),
            self.read_blob(&version.plugin_file_path).await?,
        ));
        if let Some(manifest_key) = &version.manifest_file_path {
            entries.push((
                MANIFEST_FILE_NAME.to_string(),
                self.read_blob(manifest_key).await?,
            ));
        }
        for file in self.db.list_files(version.id).await? {
            entries.push((file.file_name.clone(), self.read_blob(&file.file_path).await?));
        }

        let archive = tokio::task::spawn_blocking(move || write_archive(entries))
            .await
            .map_err(std::io::Error::other)??;

        self.db.increment_download_count(version.id).await?;

        Ok(ArchiveDownload {
            file_name: format!("{}-{}.zip", plugin.name, version.version),
            archive,
        })
    }

    /// List a version's files with direct download URLs, for clients that
    /// fetch files themselves instead of taking the ZIP.
    pub async fn get_version_files(
        &self,
        plugin_name: &str,
        version_ref: &str,
    ) -> Result<VersionFiles> {
        let (plugin, version) = self.resolve_version(plugin_name, version_ref).await?;

        let mut files = Vec::new();
        files.push(FileEntry {
            name: PLUGIN_FILE_NAME.to_string(),
            url: self
                .download_url(&plugin.name, &version.version, PLUGIN_FILE_NAME, &version.plugin_file_path)
                .await?,
            size: version.file_size,
            checksum: version.checksum.clone(),
        });

        if let Some(manifest_key) = &version.manifest_file_path {
            let content = self.read_blob(manifest_key).await?;
            files.push(FileEntry {
                name: MANIFEST_FILE_NAME.to_string(),
                url: self
                    .download_url(&plugin.name, &version.version, MANIFEST_FILE_NAME, manifest_key)
                    .await?,
                size: content.len() as i64,
                checksum: sha256_hex(&content),
            });
        }

        for file in self.db.list_files(version.id).await? {
            let content = self.read_blob(&file.file_path).await?;
            files.push(FileEntry {
                name: file.file_name.clone(),
                url: self
                    .download_url(&plugin.name, &version.version, &file.file_name, &file.file_path)
                    .await?,
                size: file.file_size,
                checksum: sha256_hex(&content),
            });
        }

        self.db.increment_download_count(version.id).await?;

        let archive_url = self.absolute(&format!(
            "/api/v1/plugins/{}/versions/{}/download?format=zip",
            plugin.name, version.version
        ));

        Ok(VersionFiles {
            plugin_name: plugin.name,
            version: version.version,
            files,
            archive_url,
        })
    }

    /// The full registry index: every plugin with its versions newest
    /// first and the resolved latest.
    pub async fn list_index(&self) -> Result<BTreeMap<String, IndexEntry>> {
        let mut index: BTreeMap<String, (Vec<String>, Option<String>)> = BTreeMap::new();

        for (name, version, is_latest) in self.db.all_version_rows().await? {
            let entry = index.entry(name).or_default();
            if is_latest {
                entry.1 = Some(version.clone());
            }
            entry.0.push(version);
        }

        Ok(index
            .into_iter()
            .map(|(name, (mut versions, latest))| {
                versions.sort_by(|a, b| SemVer::compare(b, a));
                let latest = latest.or_else(|| versions.first().cloned());
                (name, IndexEntry { versions, latest })
            })
            .collect())
    }

    /// Paginated plugin listing with optional substring search.
    pub async fn list_plugins(
        &self,
        query: Option<&str>,
        field: SearchField,
        author: Option<&str>,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<Plugin>, i64)> {
        self.db
            .search_plugins(query, field, author, limit, offset)
            .await
    }

    pub async fn get_plugin(&self, plugin_name: &str) -> Result<Plugin> {
        self.db
            .get_plugin(plugin_name)
            .await?
            .ok_or_else(|| RegistryError::PluginNotFound(plugin_name.to_string()))
    }

    /// A plugin and all of its versions, newest first.
    pub async fn get_plugin_versions(
        &self,
        plugin_name: &str,
    ) -> Result<(Plugin, Vec<PluginVersion>)> {
        let plugin = self.get_plugin(plugin_name).await?;
        let mut versions = self.db.list_versions(plugin.id).await?;
        versions.sort_by(|a, b| SemVer::compare(&b.version, &a.version));
        Ok((plugin, versions))
    }

    /// Everything recorded about one version.
    pub async fn get_version_details(
        &self,
        plugin_name: &str,
        version_ref: &str,
    ) -> Result<(Plugin, PluginVersion, Vec<PluginFile>, Vec<PluginDependency>)> {
        let (plugin, version) = self.resolve_version(plugin_name, version_ref).await?;
        let files = self.db.list_files(version.id).await?;
        let dependencies = self.db.list_dependencies(version.id).await?;
        Ok((plugin, version, files, dependencies))
    }

    async fn file_key(
        &self,
        plugin: &Plugin,
        version: &PluginVersion,
        file_name: &str,
    ) -> Result<String> {
        if file_name == PLUGIN_FILE_NAME {
            return Ok(version.plugin_file_path.clone());
        }
        if file_name == MANIFEST_FILE_NAME {
            return version
                .manifest_file_path
                .clone()
                .ok_or_else(|| self.file_not_found(plugin, version, file_name));
        }

        let files = self.db.list_files(version.id).await?;
        files
            .into_iter()
            .find(|f| f.file_name == file_name)
            .map(|f| f.file_path)
            .ok_or_else(|| self.file_not_found(plugin, version, file_name))
    }

    fn file_not_found(
        &self,
        plugin: &Plugin,
        version: &PluginVersion,
        file_name: &str,
    ) -> RegistryError {
        RegistryError::FileNotFound {
            plugin: plugin.name.clone(),
            version: version.version.clone(),
            file: file_name.to_string(),
        }
    }

    /// Read a recorded blob, surfacing drift between rows and storage.
    async fn read_blob(&self, key: &str) -> Result<Vec<u8>> {
        // Local backends expose a path; skip the extra copy through the
        // trait object.
        if let Some(path) = self.storage.physical_path(key) {
            return match tokio::fs::read(&path).await {
                Ok(content) => Ok(content),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    Err(RegistryError::Inconsistent(format!(
                        "blob {} is recorded but missing from storage",
                        key
                    )))
                }
                Err(e) => Err(e.into()),
            };
        }

        match self.storage.get(key).await {
            Ok(content) => Ok(content),
            Err(crate::storage::StorageError::NotFound(_)) => {
                Err(RegistryError::Inconsistent(format!(
                    "blob {} is recorded but missing from storage",
                    key
                )))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Direct URL for one file: the CDN when one fronts the object store,
    /// otherwise this server's own file route.
    async fn download_url(
        &self,
        plugin_name: &str,
        version: &str,
        file_name: &str,
        key: &str,
    ) -> Result<String> {
        if self.storage.kind() == BackendKind::ObjectStore {
            if let Some(cdn) = &self.config.cdn_url {
                return Ok(join_url(cdn, key));
            }
        }

        Ok(self.absolute(&format!(
            "/api/v1/plugins/{}/versions/{}/files/{}",
            plugin_name, version, file_name
        )))
    }

    fn absolute(&self, path: &str) -> String {
        match &self.config.public_url {
            Some(base) => join_url(base, path),
            None => path.to_string(),
        }
    }
}

fn write_archive(entries: Vec<(String, Vec<u8>)>) -> std::io::Result<NamedTempFile> {
    let mut tmp = NamedTempFile::new()?;

    {
        let mut archive = zip::ZipWriter::new(tmp.as_file_mut());
        let options = zip::write::SimpleFileOptions::default()
            .compression_method(zip::CompressionMethod::Deflated);

        for (name, content) in entries {
            archive
                .start_file(name, options)
                .map_err(std::io::Error::other)?;
            archive.write_all(&content)?;
        }
        archive.finish().map_err(std::io::Error::other)?;
    }

    Ok(tmp)
}

/// Hex-encoded SHA-256 digest.
pub fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}

/// Join a base URL and a path with exactly one slash between them.
fn join_url(base: &str, path: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha256_hex() {
        assert_eq!(
            sha256_hex(b"hello"),
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
    }

    #[test]
    fn test_join_url() {
        assert_eq!(
            join_url("https://cdn.example.com/", "/plugins/a/1.0.0/plugin.py"),
            "https://cdn.example.com/plugins/a/1.0.0/plugin.py"
        );
        assert_eq!(
            join_url("https://cdn.example.com", "plugins/a/1.0.0/plugin.py"),
            "https://cdn.example.com/plugins/a/1.0.0/plugin.py"
        );
    }

    #[test]
    fn test_write_archive_produces_readable_zip() {
        let tmp = write_archive(vec![
            ("plugin.py".to_string(), b"print('hi')".to_vec()),
            ("manifest.json".to_string(), b"{}".to_vec()),
        ])
        .unwrap();

        let file = std::fs::File::open(tmp.path()).unwrap();
        let mut archive = zip::ZipArchive::new(file).unwrap();
        let names: Vec<String> = (0..archive.len())
            .map(|i| archive.by_index(i).unwrap().name().to_string())
            .collect();
        assert_eq!(names, vec!["plugin.py", "manifest.json"]);
    }
}
