// src/sync/normalize.rs

//! Package metadata normalization
//!
//! Produces the dataset dictionary sent to the catalog: the mapped package
//! metadata without its resources (they are managed one by one), with the
//! identifier pinned to the package name and the `notes` field rebuilt from
//! the package's auxiliary markdown files. The same dictionary, serialized,
//! is what the manifest resource's hash is computed over.

use super::{RESOURCES_IDS_KEY, ResourceIdMap};
use crate::catalog::mapping;
use crate::error::{Error, Result};
use crate::package::Package;
use serde_json::{Map, Value};
use std::fs;
use std::path::Path;
use tracing::debug;

/// Auxiliary files folded into `notes`, in order
pub const NOTES_FILES: &[&str] = &["README.md", "CONTRIBUTING.md", "CHANGELOG.md"];

/// Catalog-native dataset metadata
pub type NativeMetadata = Map<String, Value>;

/// Full normalization: mapped metadata plus notes from the package directory
pub fn normalize(package: &Package) -> Result<NativeMetadata> {
    let notes = collect_notes(package.base_dir())?;
    let mut dataset = map_dataset(package)?;
    set_notes(&mut dataset, notes);
    Ok(dataset)
}

/// Mapped metadata without resources, with a stable identifier
///
/// `notes` is whatever the mapping produced; callers decide where the
/// final notes come from.
pub fn map_dataset(package: &Package) -> Result<NativeMetadata> {
    let mut dataset = mapping::to_native(package)?;
    dataset.remove("resources");
    if dataset.contains_key("id") {
        dataset.insert("id".to_string(), Value::from(package.name.clone()));
    }
    Ok(dataset)
}

pub fn set_notes(dataset: &mut NativeMetadata, notes: String) {
    dataset.insert("notes".to_string(), Value::from(notes));
}

/// Concatenate README, CONTRIBUTING and CHANGELOG, each preceded by a newline
pub fn collect_notes(base_dir: &Path) -> Result<String> {
    let mut notes = String::new();

    for file_name in NOTES_FILES {
        let path = base_dir.join(file_name);
        if !path.is_file() {
            continue;
        }
        let content = fs::read_to_string(&path).map_err(|e| {
            Error::IoError(format!("Failed to read {}: {}", path.display(), e))
        })?;
        debug!("Folding {} into dataset notes", path.display());
        notes.push('\n');
        notes.push_str(&content);
    }

    Ok(notes)
}

/// Serialized form hashed for the manifest resource
pub fn to_bytes(dataset: &NativeMetadata) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec(dataset)?)
}

/// Dataset payload carrying the resource id map as an extra
pub fn dataset_payload(package: &Package, ids: &ResourceIdMap) -> Result<NativeMetadata> {
    let mut with_ids = package.clone();
    with_ids
        .properties
        .insert(RESOURCES_IDS_KEY.to_string(), serde_json::to_value(ids)?);

    let mut dataset = normalize(&with_ids)?;
    dataset.insert("id".to_string(), Value::from(package.name.clone()));
    Ok(dataset)
}
