// src/package/loader.rs

//! Manifest loader
//!
//! Reads a `datapackage.json` descriptor from a file, a directory or a URL,
//! resolves schema references and expands every schema and dialect so the
//! sync engine never sees a partially described resource.

use super::{MANIFEST_NAME, Package};
use crate::error::{Error, Result};
use serde_json::Value;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Load a package from a manifest path, a package directory or a URL
pub fn load(source: &str) -> Result<Package> {
    if source.starts_with("http://") || source.starts_with("https://") {
        return load_from_url(source);
    }

    let mut manifest_path = PathBuf::from(source);
    if manifest_path.is_dir() {
        manifest_path = manifest_path.join(MANIFEST_NAME);
    }

    info!("Loading data package from {}", manifest_path.display());

    let bytes = fs::read(&manifest_path).map_err(|e| {
        Error::IoError(format!(
            "Failed to read manifest {}: {}",
            manifest_path.display(),
            e
        ))
    })?;

    let basepath = manifest_path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_default();

    load_from_slice(&bytes, basepath)
}

fn load_from_url(url: &str) -> Result<Package> {
    info!("Loading data package from {}", url);

    let response = reqwest::blocking::get(url)
        .map_err(|e| Error::DownloadError(format!("Failed to download {}: {}", url, e)))?;

    if !response.status().is_success() {
        return Err(Error::DownloadError(format!(
            "Failed to download {}: HTTP {}",
            url,
            response.status()
        )));
    }

    let bytes = response
        .bytes()
        .map_err(|e| Error::DownloadError(format!("Failed to read response: {}", e)))?;

    // Relative resource paths of a remote manifest cannot be read locally
    load_from_slice(&bytes, PathBuf::new())
}

/// Parse a manifest document and expand it against `basepath`
pub fn load_from_slice(bytes: &[u8], basepath: PathBuf) -> Result<Package> {
    let mut descriptor: Value = serde_json::from_slice(bytes)
        .map_err(|e| Error::ParseError(format!("Invalid manifest JSON: {}", e)))?;

    check_resource_paths(&descriptor)?;
    resolve_schema_references(&mut descriptor, &basepath)?;

    let mut package: Package = serde_json::from_value(descriptor)
        .map_err(|e| Error::ParseError(format!("Invalid data package descriptor: {}", e)))?;
    package.basepath = basepath;

    for resource in &mut package.resources {
        resource.expand();
    }

    validate(&package)?;

    debug!(
        "Loaded package {} with {} resources",
        package.name,
        package.resources.len()
    );
    Ok(package)
}

/// Only resources backed by a single file or URL can be synced
fn check_resource_paths(descriptor: &Value) -> Result<()> {
    let Some(resources) = descriptor.get("resources").and_then(Value::as_array) else {
        return Ok(());
    };

    for (index, resource) in resources.iter().enumerate() {
        let name = resource
            .get("name")
            .and_then(Value::as_str)
            .map_or_else(|| format!("#{}", index), str::to_string);

        match resource.get("path") {
            Some(Value::String(_)) => {}
            Some(Value::Array(_)) => {
                return Err(Error::InvalidPackage(format!(
                    "resource '{}' has a multi-part path; only single-path resources are supported",
                    name
                )));
            }
            Some(_) => {
                return Err(Error::InvalidPackage(format!(
                    "resource '{}' path must be a string",
                    name
                )));
            }
            None if resource.get("data").is_some() => {
                return Err(Error::InvalidPackage(format!(
                    "resource '{}' carries inline data; only single-path resources are supported",
                    name
                )));
            }
            None => {
                return Err(Error::InvalidPackage(format!(
                    "resource '{}' has no path",
                    name
                )));
            }
        }
    }

    Ok(())
}

/// Replace `"schema": "path/to/schema.json"` with the referenced document
fn resolve_schema_references(descriptor: &mut Value, basepath: &Path) -> Result<()> {
    let Some(resources) = descriptor
        .get_mut("resources")
        .and_then(Value::as_array_mut)
    else {
        return Ok(());
    };

    for resource in resources {
        let Some(reference) = resource.get("schema").and_then(Value::as_str) else {
            continue;
        };

        let schema_path = if basepath.as_os_str().is_empty() {
            PathBuf::from(reference)
        } else {
            basepath.join(reference)
        };
        debug!("Resolving schema reference {}", schema_path.display());

        let content = fs::read(&schema_path).map_err(|e| {
            Error::IoError(format!(
                "Failed to read schema {}: {}",
                schema_path.display(),
                e
            ))
        })?;
        let schema: Value = serde_json::from_slice(&content).map_err(|e| {
            Error::ParseError(format!("Invalid schema {}: {}", schema_path.display(), e))
        })?;

        resource["schema"] = schema;
    }

    Ok(())
}

fn validate(package: &Package) -> Result<()> {
    if package.name.trim().is_empty() {
        return Err(Error::InvalidPackage(
            "package name must not be empty".to_string(),
        ));
    }

    let mut seen = HashSet::new();
    for resource in &package.resources {
        if resource.name == MANIFEST_NAME {
            return Err(Error::InvalidPackage(format!(
                "resource name '{}' is reserved for the package manifest",
                MANIFEST_NAME
            )));
        }
        if !seen.insert(resource.name.as_str()) {
            return Err(Error::InvalidPackage(format!(
                "duplicate resource name '{}'",
                resource.name
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const MANIFEST: &str = r#"{
        "name": "test-package",
        "title": "Test package",
        "resources": [
            {
                "name": "a",
                "path": "a.csv",
                "schema": {"fields": [{"name": "id", "type": "integer"}]}
            },
            {"name": "b", "path": "b.csv", "schema": "schema.json"}
        ]
    }"#;

    fn write_package(dir: &TempDir) {
        fs::write(dir.path().join(MANIFEST_NAME), MANIFEST).unwrap();
        fs::write(
            dir.path().join("schema.json"),
            r#"{"fields": [{"name": "label", "title": "Label"}]}"#,
        )
        .unwrap();
    }

    #[test]
    fn test_load_from_directory() {
        let dir = tempfile::tempdir().unwrap();
        write_package(&dir);

        let package = load(dir.path().to_str().unwrap()).unwrap();
        assert_eq!(package.name, "test-package");
        assert_eq!(package.basepath, dir.path());
        assert_eq!(package.resource_names(), vec!["a", "b"]);
        assert_eq!(package.properties["title"], "Test package");
    }

    #[test]
    fn test_load_resolves_and_expands_schemas() {
        let dir = tempfile::tempdir().unwrap();
        write_package(&dir);

        let manifest = dir.path().join(MANIFEST_NAME);
        let package = load(manifest.to_str().unwrap()).unwrap();

        let b = package.get_resource("b").unwrap();
        assert_eq!(b.schema.fields.len(), 1);
        assert_eq!(b.schema.fields[0].title.as_deref(), Some("Label"));
        assert_eq!(b.schema.fields[0].field_type.as_deref(), Some("string"));
        assert_eq!(b.schema.missing_values, Some(vec![String::new()]));
    }

    #[test]
    fn test_load_missing_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let result = load(dir.path().to_str().unwrap());
        assert!(matches!(result, Err(Error::IoError(_))));
    }

    #[test]
    fn test_duplicate_resource_names_rejected() {
        let doc = br#"{"name": "p", "resources": [
            {"name": "a", "path": "a.csv"}, {"name": "a", "path": "b.csv"}
        ]}"#;
        let result = load_from_slice(doc, PathBuf::new());
        assert!(matches!(result, Err(Error::InvalidPackage(_))));
    }

    #[test]
    fn test_manifest_name_is_reserved() {
        let doc = br#"{"name": "p", "resources": [{"name": "datapackage.json", "path": "x"}]}"#;
        let result = load_from_slice(doc, PathBuf::new());
        assert!(matches!(result, Err(Error::InvalidPackage(_))));
    }

    #[test]
    fn test_multi_part_path_rejected() {
        let doc = br#"{"name": "p", "resources": [{"name": "a", "path": ["a1.csv", "a2.csv"]}]}"#;
        let result = load_from_slice(doc, PathBuf::new());
        match result {
            Err(Error::InvalidPackage(message)) => assert!(message.contains("multi-part")),
            other => panic!("expected InvalidPackage, got {:?}", other),
        }
    }

    #[test]
    fn test_inline_data_rejected() {
        let doc = br#"{"name": "p", "resources": [{"name": "a", "data": [{"x": 1}]}]}"#;
        let result = load_from_slice(doc, PathBuf::new());
        match result {
            Err(Error::InvalidPackage(message)) => assert!(message.contains("inline data")),
            other => panic!("expected InvalidPackage, got {:?}", other),
        }
    }

    #[test]
    fn test_invalid_json_is_parse_error() {
        let result = load_from_slice(b"{not json", PathBuf::new());
        assert!(matches!(result, Err(Error::ParseError(_))));
    }

    #[test]
    fn test_reloaded_manifest_equals_original() {
        let dir = tempfile::tempdir().unwrap();
        write_package(&dir);
        let package = load(dir.path().to_str().unwrap()).unwrap();

        let reloaded = load_from_slice(&package.to_json().unwrap(), package.basepath.clone())
            .unwrap();
        assert_eq!(reloaded, package);
    }
}
