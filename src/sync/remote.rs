// src/sync/remote.rs

//! Published dataset state
//!
//! A [`RemoteState`] is a snapshot taken once at the start of an update run:
//! the dataset record, its resource id map and the location of its manifest
//! resource. It is never refreshed mid-run.

use super::{RESOURCES_IDS_KEY, ResourceIdMap};
use crate::catalog::{CatalogClient, actions};
use crate::error::{Error, Result};
use crate::package::{MANIFEST_NAME, Package, load_from_slice};
use serde_json::{Value, json};
use std::path::PathBuf;
use tracing::{debug, info};

/// Whether a live dataset with this name exists on the catalog
///
/// "Not found" and deleted datasets both count as absent. Any other failure
/// is propagated.
pub fn dataset_exists(client: &dyn CatalogClient, name: &str) -> Result<bool> {
    match client.call_action(actions::PACKAGE_SHOW, &json!({ "id": name }), None) {
        Ok(dataset) => {
            let deleted = dataset.get("state").and_then(Value::as_str) == Some("deleted");
            if deleted {
                debug!("Dataset {} exists but is deleted", name);
            }
            Ok(!deleted)
        }
        Err(Error::NotFoundError(_)) => Ok(false),
        Err(e) => Err(e),
    }
}

/// Fetch the dataset record
pub fn show_dataset(client: &dyn CatalogClient, name: &str) -> Result<Value> {
    client.call_action(actions::PACKAGE_SHOW, &json!({ "id": name }), None)
}

/// Resource id map stored in the dataset's extras
///
/// A published dataset without it was not published by this tool and cannot
/// be reconciled.
pub fn resource_id_map(client: &dyn CatalogClient, name: &str) -> Result<ResourceIdMap> {
    let dataset = show_dataset(client, name)?;
    id_map_from_dataset(client, name, &dataset)
}

/// Catalog id of the dataset's `datapackage.json` resource
pub fn manifest_resource_id(client: &dyn CatalogClient, name: &str) -> Result<String> {
    let dataset = show_dataset(client, name)?;
    let (id, _) = manifest_from_dataset(name, &dataset)?;
    Ok(id)
}

fn id_map_from_dataset(
    client: &dyn CatalogClient,
    name: &str,
    dataset: &Value,
) -> Result<ResourceIdMap> {
    let stored = dataset
        .get("extras")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .find(|extra| extra.get("key").and_then(Value::as_str) == Some(RESOURCES_IDS_KEY))
        .and_then(|extra| extra.get("value"));

    match stored {
        Some(Value::String(encoded)) => ResourceIdMap::from_json(encoded),
        Some(other) => serde_json::from_value(other.clone()).map_err(|e| {
            Error::ConfigError(format!("'{}' is not a valid id map: {}", RESOURCES_IDS_KEY, e))
        }),
        None => Err(Error::ConfigError(format!(
            "'{}' property not found in 'extras' field of dataset {}",
            RESOURCES_IDS_KEY,
            client.dataset_url(name)
        ))),
    }
}

/// Manifest resource id and URL: the resource whose URL ends in `datapackage.json`
fn manifest_from_dataset(name: &str, dataset: &Value) -> Result<(String, String)> {
    dataset
        .get("resources")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .find_map(|resource| {
            let url = resource.get("url").and_then(Value::as_str)?;
            if url.rsplit('/').next() != Some(MANIFEST_NAME) {
                return None;
            }
            let id = resource.get("id").and_then(Value::as_str)?;
            Some((id.to_string(), url.to_string()))
        })
        .ok_or_else(|| {
            Error::CorruptDataset(format!(
                "dataset {} has no {} resource",
                name, MANIFEST_NAME
            ))
        })
}

/// Snapshot of a published dataset
#[derive(Debug, Clone)]
pub struct RemoteState {
    pub name: String,
    pub ids: ResourceIdMap,
    pub manifest_id: String,
    pub manifest_url: String,
    /// Dataset notes as the catalog stores them
    pub notes: String,
}

impl RemoteState {
    /// Read the dataset's current state; fails before any write can happen
    pub fn read(client: &dyn CatalogClient, name: &str) -> Result<Self> {
        info!("Reading published state of dataset {}", client.dataset_url(name));

        let dataset = show_dataset(client, name)?;
        let ids = id_map_from_dataset(client, name, &dataset)?;
        let (manifest_id, manifest_url) = manifest_from_dataset(name, &dataset)?;
        let notes = dataset
            .get("notes")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        debug!(
            "Dataset {} has {} tracked resources, manifest {}",
            name,
            ids.len(),
            manifest_id
        );

        Ok(Self {
            name: name.to_string(),
            ids,
            manifest_id,
            manifest_url,
            notes,
        })
    }

    /// Resource names known to the catalog, in id map order
    pub fn resource_names(&self) -> Vec<&str> {
        self.ids.names().collect()
    }

    /// Raw bytes of the published manifest
    pub fn fetch_manifest(&self, client: &dyn CatalogClient) -> Result<Vec<u8>> {
        client.download(&self.manifest_url)
    }

    /// Published manifest re-read as a package
    pub fn manifest_package(&self, client: &dyn CatalogClient) -> Result<Package> {
        load_from_slice(&self.fetch_manifest(client)?, PathBuf::new())
    }
}
