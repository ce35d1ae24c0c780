// src/sync/hash.rs

//! Content hashing for change detection
//!
//! Local and published content are reduced to the same representation before
//! hashing: raw bytes for data resources, normalized dataset metadata for the
//! manifest resource. On the published side the manifest is re-read as a
//! package and its notes are taken from the published dataset, so notes
//! rewritten by the catalog itself never register as drift.

use super::normalize;
use crate::catalog::{CatalogClient, actions};
use crate::error::{Error, Result};
use crate::package::{MANIFEST_NAME, Package, load_from_slice};
use serde_json::{Value, json};
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io;
use std::path::PathBuf;
use tracing::debug;

/// Hex digest of a byte sequence
pub fn content_hash(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}

/// Hex digest of a local file, streamed
pub fn file_hash(path: &std::path::Path) -> Result<String> {
    let mut file = File::open(path).map_err(|e| {
        Error::IoError(format!("Failed to open {} for hashing: {}", path.display(), e))
    })?;

    let mut hasher = Sha256::new();
    io::copy(&mut file, &mut hasher).map_err(|e| {
        Error::IoError(format!("Failed to read {} for hashing: {}", path.display(), e))
    })?;

    Ok(format!("{:x}", hasher.finalize()))
}

/// Hash of the local package's normalized metadata
pub fn local_manifest_hash(package: &Package) -> Result<String> {
    let dataset = normalize::normalize(package)?;
    Ok(content_hash(&normalize::to_bytes(&dataset)?))
}

/// Hash of a local resource's authoritative content
///
/// URL-sourced resources are hashed over the content their URL serves.
pub fn local_resource_hash(
    client: &dyn CatalogClient,
    package: &Package,
    name: &str,
) -> Result<String> {
    if name == MANIFEST_NAME {
        return local_manifest_hash(package);
    }

    let resource = package.get_resource(name).ok_or_else(|| {
        Error::NotFoundError(format!("resource '{}' in package {}", name, package.name))
    })?;

    if resource.is_remote() {
        let content = client.download(&resource.path)?;
        return Ok(content_hash(&content));
    }

    file_hash(&package.resource_path(resource))
}

/// Hash of a published manifest document, normalized like a local package
pub fn manifest_document_hash(document: &[u8], published_notes: &str) -> Result<String> {
    let package = load_from_slice(document, PathBuf::new())?;
    let mut dataset = normalize::map_dataset(&package)?;
    normalize::set_notes(&mut dataset, published_notes.to_string());
    Ok(content_hash(&normalize::to_bytes(&dataset)?))
}

/// Hash of a published resource's content, looked up by catalog id
pub fn remote_resource_hash(client: &dyn CatalogClient, resource_id: &str) -> Result<String> {
    let resource = client.call_action(actions::RESOURCE_SHOW, &json!({ "id": resource_id }), None)?;
    let url = resource
        .get("url")
        .and_then(Value::as_str)
        .ok_or_else(|| Error::CorruptDataset(format!("resource {} has no URL", resource_id)))?;

    debug!("Hashing published content of resource {} at {}", resource_id, url);
    let content = client.download(url)?;

    if !is_manifest_resource(&resource) {
        return Ok(content_hash(&content));
    }

    let package_id = resource
        .get("package_id")
        .and_then(Value::as_str)
        .ok_or_else(|| {
            Error::CorruptDataset(format!("manifest resource {} has no dataset", resource_id))
        })?;
    let dataset = client.call_action(actions::PACKAGE_SHOW, &json!({ "id": package_id }), None)?;
    let notes = dataset.get("notes").and_then(Value::as_str).unwrap_or_default();

    manifest_document_hash(&content, notes)
}

/// Whether a catalog resource record is a dataset's manifest
pub fn is_manifest_resource(resource: &Value) -> bool {
    let by_name = resource.get("name").and_then(Value::as_str) == Some(MANIFEST_NAME);
    let by_url = resource
        .get("url")
        .and_then(Value::as_str)
        .and_then(|url| url.rsplit('/').next())
        == Some(MANIFEST_NAME);
    by_name || by_url
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::MemoryCatalog;
    use crate::package::Resource;
    use std::fs;

    #[test]
    fn test_content_hash_stable() {
        assert_eq!(content_hash(b"abc"), content_hash(b"abc"));
        assert_ne!(content_hash(b"abc"), content_hash(b"abd"));
        assert_eq!(
            content_hash(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_file_hash_matches_content_hash() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.csv");
        fs::write(&path, b"id,name\n1,x\n").unwrap();
        assert_eq!(file_hash(&path).unwrap(), content_hash(b"id,name\n1,x\n"));
    }

    #[test]
    fn test_one_byte_change_only_affects_that_resource() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.csv"), b"1\n").unwrap();
        fs::write(dir.path().join("b.csv"), b"2\n").unwrap();

        let mut package = Package::new("p");
        package.basepath = dir.path().to_path_buf();
        package.resources.push(Resource::new("a", "a.csv"));
        package.resources.push(Resource::new("b", "b.csv"));
        let catalog = MemoryCatalog::new();

        let a_before = local_resource_hash(&catalog, &package, "a").unwrap();
        let b_before = local_resource_hash(&catalog, &package, "b").unwrap();
        let manifest_before = local_resource_hash(&catalog, &package, MANIFEST_NAME).unwrap();

        fs::write(dir.path().join("a.csv"), b"3\n").unwrap();

        assert_ne!(local_resource_hash(&catalog, &package, "a").unwrap(), a_before);
        assert_eq!(local_resource_hash(&catalog, &package, "b").unwrap(), b_before);
        assert_eq!(
            local_resource_hash(&catalog, &package, MANIFEST_NAME).unwrap(),
            manifest_before
        );
    }

    #[test]
    fn test_url_resource_hashed_over_served_content() {
        let catalog = MemoryCatalog::new();
        catalog.publish_content("https://example.org/b.csv", b"remote".to_vec());

        let mut package = Package::new("p");
        package
            .resources
            .push(Resource::new("b", "https://example.org/b.csv"));

        assert_eq!(
            local_resource_hash(&catalog, &package, "b").unwrap(),
            content_hash(b"remote")
        );
    }

    #[test]
    fn test_published_manifest_hash_matches_local() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("README.md"), "# Readme").unwrap();
        let package = load_from_slice(
            br#"{"name": "p", "title": "T", "resources": [{"name": "a", "path": "a.csv"}]}"#,
            dir.path().to_path_buf(),
        )
        .unwrap();

        let local = local_manifest_hash(&package).unwrap();
        let published = manifest_document_hash(&package.to_json().unwrap(), "\n# Readme").unwrap();
        assert_eq!(local, published);

        let drifted = manifest_document_hash(&package.to_json().unwrap(), "other").unwrap();
        assert_ne!(local, drifted);
    }

    #[test]
    fn test_manifest_resource_detection() {
        assert!(is_manifest_resource(&json!({"name": "datapackage.json"})));
        assert!(is_manifest_resource(
            &json!({"name": "x", "url": "https://c.org/download/datapackage.json"})
        ));
        assert!(!is_manifest_resource(&json!({"name": "a", "url": "https://c.org/a.csv"})));
    }
}
