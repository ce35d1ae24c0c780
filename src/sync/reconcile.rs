// src/sync/reconcile.rs

//! Publishing and incremental updates
//!
//! `publish` creates a dataset, its resources and its manifest resource, then
//! records the resource id map on the dataset. `update` applies exactly the
//! changes the diff reports and always republishes the manifest. Neither is
//! transactional: a failure aborts the run and leaves earlier writes in place.

use super::diff::{DatasetDiff, diff};
use super::normalize;
use super::remote::{RemoteState, dataset_exists};
use super::{ResourceIdMap, SyncOptions};
use crate::catalog::{CatalogClient, Upload, actions};
use crate::error::{Error, Result};
use crate::package::{MANIFEST_NAME, Package, Resource};
use serde_json::{Value, json};
use tracing::{debug, info};

/// Storage type every datastore field is registered with
const DATASTORE_FIELD_TYPE: &str = "text";

/// Result of an update run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// Published dataset already matches the local package; nothing was written
    NothingToUpdate,
    /// The listed changes were applied and the manifest republished
    Updated(DatasetDiff),
}

/// Result of a sync run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    Published(ResourceIdMap),
    Updated(UpdateOutcome),
}

/// Create the dataset and every resource on the catalog
///
/// Fails with [`Error::ConflictError`] if the dataset already exists.
pub fn publish(
    client: &dyn CatalogClient,
    package: &Package,
    options: &SyncOptions,
) -> Result<ResourceIdMap> {
    if dataset_exists(client, &package.name)? {
        return Err(Error::ConflictError(format!(
            "dataset {} is already published",
            client.dataset_url(&package.name)
        )));
    }

    info!("Creating dataset: {}", package.name);
    let dataset = normalize::normalize(package)?;
    client.call_action(actions::PACKAGE_CREATE, &Value::Object(dataset), None)?;

    let mut ids = ResourceIdMap::new();
    for resource in &package.resources {
        info!("Creating resource: {}", resource.name);
        let created = client.call_action(
            actions::RESOURCE_CREATE,
            &resource_payload("package_id", &package.name, resource),
            resource_upload(package, resource).as_ref(),
        )?;
        let id = result_id(actions::RESOURCE_CREATE, &created)?;

        if options.datastore {
            register_datastore_fields(client, &id, resource)?;
        }
        ids.insert(resource.name.clone(), id);
    }

    let manifest_id = create_manifest_resource(client, package)?;
    ids.insert(MANIFEST_NAME, manifest_id);

    patch_dataset(client, package, &ids)?;
    info!("Dataset {} published", client.dataset_url(&package.name));
    Ok(ids)
}

/// Bring a published dataset up to date with the local package
pub fn update(
    client: &dyn CatalogClient,
    package: &Package,
    options: &SyncOptions,
) -> Result<UpdateOutcome> {
    let remote = RemoteState::read(client, &package.name)?;
    let changes = diff(client, package, &remote)?;

    if changes.is_empty() {
        info!(
            "Nothing to update in dataset {}",
            client.dataset_url(&package.name)
        );
        return Ok(UpdateOutcome::NothingToUpdate);
    }

    info!("Updating dataset {}", client.dataset_url(&package.name));

    for change in &changes.changes {
        let resource = package.get_resource(&change.name).ok_or_else(|| {
            Error::NotFoundError(format!("resource '{}' in package {}", change.name, package.name))
        })?;

        if change.data_changed {
            info!("Updating data files of resource {}", resource.name);
            client.call_action(
                actions::RESOURCE_UPDATE,
                &resource_payload("id", &change.id, resource),
                resource_upload(package, resource).as_ref(),
            )?;
        }

        if change.metadata_changed {
            info!("Updating resource {} metadata", resource.name);
            // A data update already carried title and description
            if !change.data_changed {
                client.call_action(
                    actions::RESOURCE_PATCH,
                    &json!({
                        "id": change.id,
                        "name": display_name(resource),
                        "description": resource.description,
                    }),
                    None,
                )?;
            }
            if options.datastore {
                register_datastore_fields(client, &change.id, resource)?;
            }
        }
    }

    if changes.manifest_changed {
        patch_dataset(client, package, &remote.ids)?;
    }

    update_manifest_resource(client, package, &remote.manifest_id)?;
    info!("Dataset {} updated", package.name);
    Ok(UpdateOutcome::Updated(changes))
}

/// Publish when the dataset is absent, update otherwise
pub fn sync(
    client: &dyn CatalogClient,
    package: &Package,
    options: &SyncOptions,
) -> Result<SyncOutcome> {
    if dataset_exists(client, &package.name)? {
        update(client, package, options).map(SyncOutcome::Updated)
    } else {
        publish(client, package, options).map(SyncOutcome::Published)
    }
}

fn display_name(resource: &Resource) -> &str {
    resource.title.as_deref().unwrap_or(&resource.name)
}

/// Payload for creating (`package_id`) or updating (`id`) a data resource
fn resource_payload(key: &str, value: &str, resource: &Resource) -> Value {
    let mut payload = serde_json::Map::new();
    payload.insert(key.to_string(), Value::from(value));
    payload.insert("name".to_string(), Value::from(display_name(resource)));
    payload.insert(
        "description".to_string(),
        resource.description.clone().map_or(Value::Null, Value::from),
    );
    payload.insert("url".to_string(), Value::from(resource.path.clone()));
    Value::Object(payload)
}

/// Local files are uploaded; URL resources are registered by reference
fn resource_upload(package: &Package, resource: &Resource) -> Option<Upload> {
    if resource.is_remote() {
        None
    } else {
        Some(Upload::File(package.resource_path(resource)))
    }
}

fn result_id(action: &str, result: &Value) -> Result<String> {
    result
        .get("id")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| Error::ActionError {
            action: action.to_string(),
            message: "response carries no resource id".to_string(),
        })
}

/// Datastore definition of a resource's schema, or `None` without fields
fn datastore_payload(resource_id: &str, resource: &Resource) -> Option<Value> {
    if resource.schema.is_empty() {
        return None;
    }

    let fields: Vec<Value> = resource
        .schema
        .fields
        .iter()
        .map(|field| {
            json!({
                "id": field.name,
                "type": DATASTORE_FIELD_TYPE,
                "info": {
                    "label": field.title.as_deref().unwrap_or_default(),
                    "notes": field.description.as_deref().unwrap_or_default(),
                    "type_override": DATASTORE_FIELD_TYPE,
                },
            })
        })
        .collect();

    Some(json!({
        "resource_id": resource_id,
        "force": true,
        "fields": fields,
    }))
}

fn register_datastore_fields(
    client: &dyn CatalogClient,
    resource_id: &str,
    resource: &Resource,
) -> Result<()> {
    let Some(payload) = datastore_payload(resource_id, resource) else {
        debug!("Resource {} has no schema fields, skipping datastore", resource.name);
        return Ok(());
    };

    debug!("Registering datastore fields of resource {}", resource.name);
    client.call_action(actions::DATASTORE_CREATE, &payload, None)?;
    Ok(())
}

/// Serialized package descriptor, uploaded from memory
fn manifest_upload(package: &Package) -> Result<Upload> {
    Ok(Upload::Bytes {
        file_name: MANIFEST_NAME.to_string(),
        data: package.to_json()?,
    })
}

fn create_manifest_resource(client: &dyn CatalogClient, package: &Package) -> Result<String> {
    info!("Creating resource: {}", MANIFEST_NAME);
    let created = client.call_action(
        actions::RESOURCE_CREATE,
        &json!({ "package_id": package.name, "name": MANIFEST_NAME }),
        Some(&manifest_upload(package)?),
    )?;
    result_id(actions::RESOURCE_CREATE, &created)
}

fn update_manifest_resource(
    client: &dyn CatalogClient,
    package: &Package,
    resource_id: &str,
) -> Result<()> {
    info!("Updating resource {}", MANIFEST_NAME);
    client.call_action(
        actions::RESOURCE_UPDATE,
        &json!({ "id": resource_id, "name": MANIFEST_NAME }),
        Some(&manifest_upload(package)?),
    )?;
    Ok(())
}

/// Push dataset metadata together with the resource id map
fn patch_dataset(client: &dyn CatalogClient, package: &Package, ids: &ResourceIdMap) -> Result<()> {
    debug!("Recording {} resource ids on dataset {}", ids.len(), package.name);
    let payload = normalize::dataset_payload(package, ids)?;
    client.call_action(actions::PACKAGE_PATCH, &Value::Object(payload), None)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::package::Field;

    #[test]
    fn test_datastore_payload_registers_text_fields() {
        let mut resource = Resource::new("a", "a.csv");
        let mut id = Field::new("id");
        id.title = Some("Identifier".to_string());
        id.field_type = Some("integer".to_string());
        resource.schema.fields.push(id);
        resource.schema.fields.push(Field::new("label"));

        let payload = datastore_payload("res-1", &resource).unwrap();
        assert_eq!(payload["resource_id"], "res-1");
        assert_eq!(payload["force"], true);
        assert_eq!(payload["fields"][0]["id"], "id");
        assert_eq!(payload["fields"][0]["type"], "text");
        assert_eq!(payload["fields"][0]["info"]["label"], "Identifier");
        assert_eq!(payload["fields"][1]["info"]["notes"], "");
        assert_eq!(payload["fields"][1]["info"]["type_override"], "text");
    }

    #[test]
    fn test_datastore_skipped_without_fields() {
        let resource = Resource::new("a", "a.csv");
        assert!(datastore_payload("res-1", &resource).is_none());
    }

    #[test]
    fn test_resource_payload_uses_title() {
        let mut resource = Resource::new("a", "data/a.csv");
        resource.title = Some("Table A".to_string());
        let payload = resource_payload("package_id", "p", &resource);
        assert_eq!(payload["package_id"], "p");
        assert_eq!(payload["name"], "Table A");
        assert_eq!(payload["url"], "data/a.csv");
        assert!(payload["description"].is_null());
    }

    #[test]
    fn test_url_resources_are_not_uploaded() {
        let package = Package::new("p");
        let remote = Resource::new("b", "https://example.org/b.csv");
        assert!(resource_upload(&package, &remote).is_none());

        let local = Resource::new("a", "a.csv");
        assert_eq!(
            resource_upload(&package, &local),
            Some(Upload::File("./a.csv".into()))
        );
    }
}
