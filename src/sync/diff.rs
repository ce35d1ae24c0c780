// src/sync/diff.rs

//! Resource-level diff between a local package and its published dataset
//!
//! Only resources present both in the published id map and in the local
//! package are compared; names known to one side only are skipped. Records
//! follow id map order and are emitted only when something changed.

use super::hash;
use super::remote::RemoteState;
use crate::catalog::CatalogClient;
use crate::error::Result;
use crate::package::{Package, Resource, load_from_slice};
use std::path::PathBuf;
use tracing::{debug, info};

/// Change record for one resource
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceChange {
    /// Catalog resource id
    pub id: String,
    pub name: String,
    pub data_changed: bool,
    pub metadata_changed: bool,
}

impl ResourceChange {
    pub fn is_changed(&self) -> bool {
        self.data_changed || self.metadata_changed
    }
}

/// Outcome of a diff pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DatasetDiff {
    pub changes: Vec<ResourceChange>,
    /// Dataset-level metadata (title, notes, licenses...) drifted
    pub manifest_changed: bool,
}

impl DatasetDiff {
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty() && !self.manifest_changed
    }
}

/// Compare every shared resource and the dataset metadata
pub fn diff(
    client: &dyn CatalogClient,
    package: &Package,
    remote: &RemoteState,
) -> Result<DatasetDiff> {
    let manifest = remote.fetch_manifest(client)?;
    let published = load_from_slice(&manifest, PathBuf::new())?;

    let mut changes = Vec::new();
    for (name, id) in remote.ids.iter() {
        let Some(local) = package.get_resource(name) else {
            debug!("Skipping {}: not in local package", name);
            continue;
        };

        let change = ResourceChange {
            id: id.to_string(),
            name: name.to_string(),
            data_changed: data_changed(client, package, name, id)?,
            metadata_changed: metadata_changed(local, published.get_resource(name)),
        };

        debug!(
            "Resource {}: data changed {}, metadata changed {}",
            name, change.data_changed, change.metadata_changed
        );
        if change.is_changed() {
            changes.push(change);
        }
    }

    let local_manifest = hash::local_manifest_hash(package)?;
    let published_manifest = hash::manifest_document_hash(&manifest, &remote.notes)?;
    let manifest_changed = local_manifest != published_manifest;
    if manifest_changed {
        info!("Dataset metadata of {} changed", package.name);
    }

    Ok(DatasetDiff {
        changes,
        manifest_changed,
    })
}

fn data_changed(
    client: &dyn CatalogClient,
    package: &Package,
    name: &str,
    resource_id: &str,
) -> Result<bool> {
    let local = hash::local_resource_hash(client, package, name)?;
    let published = hash::remote_resource_hash(client, resource_id)?;
    Ok(local != published)
}

/// A resource missing from the published manifest counts as changed
fn metadata_changed(local: &Resource, published: Option<&Resource>) -> bool {
    published != Some(local)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::package::Field;

    #[test]
    fn test_metadata_equality_is_structural() {
        let mut local = Resource::new("a", "a.csv");
        local.schema.fields.push(Field::new("id"));
        local.expand();

        let same = local.clone();
        assert!(!metadata_changed(&local, Some(&same)));

        let mut retitled = local.clone();
        retitled.title = Some("A".to_string());
        assert!(metadata_changed(&local, Some(&retitled)));

        assert!(metadata_changed(&local, None));
    }

    #[test]
    fn test_empty_diff() {
        let diff = DatasetDiff::default();
        assert!(diff.is_empty());

        let diff = DatasetDiff {
            changes: Vec::new(),
            manifest_changed: true,
        };
        assert!(!diff.is_empty());
    }
}
