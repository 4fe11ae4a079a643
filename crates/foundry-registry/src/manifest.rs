//! Plugin manifest handling.
//!
//! A manifest is an arbitrary JSON object; the registry only interprets a
//! handful of well-known string fields (`name`, `version`, `description`,
//! `author`) plus the `dependencies` map, and stores the rest verbatim.

use serde_json::{Value, json};

use crate::error::{RegistryError, Result};

/// Parse submitted manifest bytes. Malformed JSON is a client error and
/// fails the whole publication.
pub fn parse(bytes: &[u8]) -> Result<Value> {
    serde_json::from_slice(bytes)
        .map_err(|e| RegistryError::validation(format!("manifest is not valid JSON: {}", e)))
}

/// Non-empty string field lookup; anything else reads as absent.
pub fn str_field<'a>(manifest: &'a Value, field: &str) -> Option<&'a str> {
    manifest
        .get(field)
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
}

/// Build a minimal manifest for uploads that did not include one, so every
/// stored version has a `manifest.json` alongside its code file.
pub fn synthesize(name: &str, version: &str, description: &str, author: &str) -> Value {
    json!({
        "name": name,
        "version": version,
        "description": description,
        "author": author,
        "dependencies": {},
    })
}

/// Extract declared dependencies as (name, constraint) pairs.
///
/// String constraints are taken verbatim; structured constraints are kept
/// as their JSON serialization so nothing the publisher wrote is lost.
pub fn dependencies(manifest: &Value) -> Vec<(String, String)> {
    let Some(deps) = manifest.get("dependencies").and_then(Value::as_object) else {
        return Vec::new();
    };

    deps.iter()
        .map(|(name, constraint)| {
            let constraint = match constraint {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            (name.clone(), constraint)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_rejects_malformed_json() {
        assert!(parse(b"{\"name\": \"demo\"}").is_ok());

        match parse(b"{not valid json") {
            Err(RegistryError::Validation(msg)) => assert!(msg.contains("JSON")),
            other => panic!("Expected Validation error, got {:?}", other.err()),
        }
    }

    #[test]
    fn test_str_field_ignores_blank_and_non_string() {
        let manifest = json!({
            "name": "demo",
            "version": 100,
            "description": "   ",
        });

        assert_eq!(str_field(&manifest, "name"), Some("demo"));
        assert_eq!(str_field(&manifest, "version"), None);
        assert_eq!(str_field(&manifest, "description"), None);
        assert_eq!(str_field(&manifest, "author"), None);
    }

    #[test]
    fn test_synthesize_shape() {
        let manifest = synthesize("demo", "1.0.0", "", "unknown");

        assert_eq!(str_field(&manifest, "name"), Some("demo"));
        assert_eq!(str_field(&manifest, "version"), Some("1.0.0"));
        assert_eq!(manifest["author"], "unknown");
        assert!(manifest["dependencies"].as_object().unwrap().is_empty());
    }

    #[test]
    fn test_dependencies_keep_constraints_verbatim() {
        let manifest = json!({
            "dependencies": {
                "requests": ">=2.0",
                "numpy": {"min": "1.20", "max": "2.0"},
            }
        });

        let mut deps = dependencies(&manifest);
        deps.sort();
        assert_eq!(
            deps,
            vec![
                // serde_json objects serialize with sorted keys
                (
                    "numpy".to_string(),
                    "{\"max\":\"2.0\",\"min\":\"1.20\"}".to_string()
                ),
                ("requests".to_string(), ">=2.0".to_string()),
            ]
        );
    }

    #[test]
    fn test_dependencies_absent_or_wrong_type() {
        assert!(dependencies(&json!({})).is_empty());
        assert!(dependencies(&json!({"dependencies": ["requests"]})).is_empty());
    }
}
