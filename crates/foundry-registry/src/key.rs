//! Deterministic storage keys for plugin artifacts.
//!
//! The layout `plugins/{name}/{version}/{filename}` is a stable wire
//! contract shared with clients and CDN configuration; keys are never
//! encoded or otherwise transformed here.

use crate::error::{RegistryError, Result};

/// Conventional name of the primary code artifact.
pub const PLUGIN_FILE_NAME: &str = "plugin.py";

/// Conventional name of the manifest artifact.
pub const MANIFEST_FILE_NAME: &str = "manifest.json";

/// Map (plugin, version, filename) to its backend-relative key.
///
/// An empty filename yields the bare version prefix
/// `plugins/{name}/{version}`, used for prefix listings and bulk deletes.
pub fn build_key(plugin_name: &str, version: &str, filename: &str) -> String {
    if filename.is_empty() {
        format!("plugins/{}/{}", plugin_name, version)
    } else {
        format!("plugins/{}/{}/{}", plugin_name, version, filename)
    }
}

/// Reject file names that could escape the per-version directory. Runs
/// before any key is built; `build_key` itself never sanitizes.
pub fn validate_file_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(RegistryError::validation("file name cannot be empty"));
    }
    if name.contains('/') || name.contains('\\') || name.contains("..") || name.contains('\0') {
        return Err(RegistryError::validation(format!(
            "file name {:?} contains path traversal characters",
            name
        )));
    }
    Ok(())
}

/// Plugin names become a key segment, so the same traversal rules apply.
pub fn validate_plugin_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(RegistryError::validation("plugin name cannot be empty"));
    }
    if name.contains('/') || name.contains('\\') || name.contains("..") || name.contains('\0') {
        return Err(RegistryError::validation(format!(
            "plugin name {:?} contains path traversal characters",
            name
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_key() {
        assert_eq!(
            build_key("foo", "1.0.0", "plugin.py"),
            "plugins/foo/1.0.0/plugin.py"
        );
        assert_eq!(
            build_key("foo", "1.0.0", "manifest.json"),
            "plugins/foo/1.0.0/manifest.json"
        );
    }

    #[test]
    fn test_empty_filename_yields_prefix() {
        assert_eq!(build_key("foo", "1.0.0", ""), "plugins/foo/1.0.0");
    }

    #[test]
    fn test_no_transformation() {
        // Callers are responsible for rejecting bad names first.
        assert_eq!(
            build_key("My Plugin", "1.0.0", "some file.txt"),
            "plugins/My Plugin/1.0.0/some file.txt"
        );
    }

    #[test]
    fn test_validate_file_name() {
        assert!(validate_file_name("plugin.py").is_ok());
        assert!(validate_file_name("README.md").is_ok());

        assert!(validate_file_name("").is_err());
        assert!(validate_file_name("   ").is_err());
        assert!(validate_file_name("../escape.py").is_err());
        assert!(validate_file_name("dir/nested.py").is_err());
        assert!(validate_file_name("back\\slash.py").is_err());
        assert!(validate_file_name("nul\0byte").is_err());
    }

    #[test]
    fn test_validate_plugin_name() {
        assert!(validate_plugin_name("my-plugin").is_ok());
        assert!(validate_plugin_name("..").is_err());
        assert!(validate_plugin_name("a/b").is_err());
        assert!(validate_plugin_name("").is_err());
    }
}
