// src/catalog/memory.rs

//! In-process catalog
//!
//! Implements the subset of the CKAN action API the sync engine uses, keeping
//! datasets, resources and uploaded content in memory. Every mutating action
//! is recorded so callers can assert exactly which remote writes a run made.

use super::{CatalogClient, Upload, actions};
use crate::error::{Error, Result};
use serde_json::{Map, Value, json};
use std::cell::RefCell;
use std::collections::HashMap;

/// Default base address of an in-memory catalog
pub const MEMORY_ADDRESS: &str = "memory://catalog";

/// A mutating call recorded by [`MemoryCatalog`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteRecord {
    pub action: String,
    /// Dataset name or resource id the action targeted
    pub target: String,
    pub uploaded: bool,
}

#[derive(Debug, Default)]
struct State {
    /// Datasets by name, without their `resources` list
    datasets: Vec<Map<String, Value>>,
    /// Resources by id, in creation order
    resources: Vec<Map<String, Value>>,
    /// Published content by URL
    content: HashMap<String, Vec<u8>>,
    writes: Vec<WriteRecord>,
    next_id: u64,
}

impl State {
    fn dataset_index(&self, key: &str) -> Option<usize> {
        self.datasets.iter().position(|d| {
            d.get("name").and_then(Value::as_str) == Some(key)
                || d.get("id").and_then(Value::as_str) == Some(key)
        })
    }

    fn resource_index(&self, id: &str) -> Option<usize> {
        self.resources
            .iter()
            .position(|r| r.get("id").and_then(Value::as_str) == Some(id))
    }

    fn generate_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{}-{:04}", prefix, self.next_id)
    }

    fn record(&mut self, action: &str, target: &str, upload: Option<&Upload>) {
        self.writes.push(WriteRecord {
            action: action.to_string(),
            target: target.to_string(),
            uploaded: upload.is_some(),
        });
    }
}

/// Catalog double holding all state in memory
#[derive(Debug)]
pub struct MemoryCatalog {
    address: String,
    state: RefCell<State>,
}

impl Default for MemoryCatalog {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::with_address(MEMORY_ADDRESS)
    }

    pub fn with_address(address: &str) -> Self {
        Self {
            address: address.trim_end_matches('/').to_string(),
            state: RefCell::new(State::default()),
        }
    }

    /// Serve `content` at an external URL (for URL-sourced resources)
    pub fn publish_content(&self, url: &str, content: impl Into<Vec<u8>>) {
        self.state
            .borrow_mut()
            .content
            .insert(url.to_string(), content.into());
    }

    /// Mutating actions performed so far, oldest first
    pub fn writes(&self) -> Vec<WriteRecord> {
        self.state.borrow().writes.clone()
    }

    pub fn clear_writes(&self) {
        self.state.borrow_mut().writes.clear();
    }

    /// Dataset as `package_show` would return it
    pub fn dataset(&self, name: &str) -> Option<Value> {
        let state = self.state.borrow();
        state.dataset_index(name).map(|i| Self::show_dataset(&state, i))
    }

    /// Overwrite a top-level dataset field (e.g. `state`, `notes`)
    pub fn set_dataset_field(&self, name: &str, key: &str, value: Value) -> Result<()> {
        let mut state = self.state.borrow_mut();
        let index = state
            .dataset_index(name)
            .ok_or_else(|| Error::NotFoundError(format!("dataset {}", name)))?;
        state.datasets[index].insert(key.to_string(), value);
        Ok(())
    }

    /// Uploaded or registered content of a resource
    pub fn resource_content(&self, id: &str) -> Option<Vec<u8>> {
        let state = self.state.borrow();
        let index = state.resource_index(id)?;
        let url = state.resources[index].get("url")?.as_str()?;
        state.content.get(url).cloned()
    }

    fn show_dataset(state: &State, index: usize) -> Value {
        let mut dataset = state.datasets[index].clone();
        let dataset_id = dataset.get("id").cloned().unwrap_or(Value::Null);
        let resources: Vec<Value> = state
            .resources
            .iter()
            .filter(|r| r.get("package_id") == Some(&dataset_id))
            .cloned()
            .map(Value::Object)
            .collect();
        dataset.insert("resources".to_string(), Value::Array(resources));
        Value::Object(dataset)
    }

    fn required_str<'a>(action: &str, payload: &'a Value, key: &str) -> Result<&'a str> {
        payload
            .get(key)
            .and_then(Value::as_str)
            .ok_or_else(|| Error::ActionError {
                action: action.to_string(),
                message: format!("Missing value: {}", key),
            })
    }

    fn package_show(&self, payload: &Value) -> Result<Value> {
        let id = Self::required_str(actions::PACKAGE_SHOW, payload, "id")?;
        let state = self.state.borrow();
        let index = state
            .dataset_index(id)
            .ok_or_else(|| Error::NotFoundError(format!("{}: Not found", actions::PACKAGE_SHOW)))?;
        Ok(Self::show_dataset(&state, index))
    }

    fn package_create(&self, payload: &Value) -> Result<Value> {
        let action = actions::PACKAGE_CREATE;
        let name = Self::required_str(action, payload, "name")?;
        let mut state = self.state.borrow_mut();

        if state.dataset_index(name).is_some() {
            return Err(Error::ActionError {
                action: action.to_string(),
                message: format!("That URL is already in use: {}", name),
            });
        }

        let mut dataset = payload.as_object().cloned().unwrap_or_default();
        dataset.remove("resources");
        let id = state.generate_id("pkg");
        dataset.insert("id".to_string(), Value::from(id));
        dataset.insert("state".to_string(), Value::from("active"));
        dataset
            .entry("notes".to_string())
            .or_insert_with(|| Value::from(""));
        dataset
            .entry("extras".to_string())
            .or_insert_with(|| json!([]));

        state.datasets.push(dataset);
        state.record(action, name, None);
        let index = state.datasets.len() - 1;
        Ok(Self::show_dataset(&state, index))
    }

    fn package_patch(&self, payload: &Value) -> Result<Value> {
        let action = actions::PACKAGE_PATCH;
        let id = Self::required_str(action, payload, "id")?;
        let mut state = self.state.borrow_mut();
        let index = state
            .dataset_index(id)
            .ok_or_else(|| Error::NotFoundError(format!("{}: Not found", action)))?;

        if let Some(fields) = payload.as_object() {
            for (key, value) in fields {
                // The catalog owns dataset ids and resource lists
                if key == "id" || key == "resources" {
                    continue;
                }
                state.datasets[index].insert(key.clone(), value.clone());
            }
        }

        let name = state.datasets[index]
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or(id)
            .to_string();
        state.record(action, &name, None);
        Ok(Self::show_dataset(&state, index))
    }

    fn store_upload(&self, state: &mut State, resource_id: &str, upload: &Upload) -> Result<String> {
        let url = format!(
            "{}/dataset/resource/{}/download/{}",
            self.address,
            resource_id,
            upload.file_name()
        );
        let data = upload.read()?;
        state.content.insert(url.clone(), data);
        Ok(url)
    }

    fn resource_create(&self, payload: &Value, upload: Option<&Upload>) -> Result<Value> {
        let action = actions::RESOURCE_CREATE;
        let package_id = Self::required_str(action, payload, "package_id")?;
        let mut state = self.state.borrow_mut();
        let dataset_index = state
            .dataset_index(package_id)
            .ok_or_else(|| Error::NotFoundError(format!("{}: Package not found", action)))?;
        let dataset_id = state.datasets[dataset_index].get("id").cloned();

        let id = state.generate_id("res");
        let mut resource = payload.as_object().cloned().unwrap_or_default();
        resource.insert("id".to_string(), Value::from(id.clone()));
        resource.insert(
            "package_id".to_string(),
            dataset_id.unwrap_or(Value::Null),
        );

        if let Some(upload) = upload {
            let url = self.store_upload(&mut state, &id, upload)?;
            resource.insert("url".to_string(), Value::from(url));
            resource.insert("url_type".to_string(), Value::from("upload"));
        }

        state.resources.push(resource.clone());
        state.record(action, &id, upload);
        Ok(Value::Object(resource))
    }

    fn resource_update(&self, action: &str, payload: &Value, upload: Option<&Upload>) -> Result<Value> {
        let id = Self::required_str(action, payload, "id")?.to_string();
        let mut state = self.state.borrow_mut();
        let index = state
            .resource_index(&id)
            .ok_or_else(|| Error::NotFoundError(format!("{}: Resource was not found.", action)))?;

        let mut resource = state.resources[index].clone();
        if let Some(fields) = payload.as_object() {
            for (key, value) in fields {
                resource.insert(key.clone(), value.clone());
            }
        }

        if let Some(upload) = upload {
            let url = self.store_upload(&mut state, &id, upload)?;
            resource.insert("url".to_string(), Value::from(url));
            resource.insert("url_type".to_string(), Value::from("upload"));
        }

        state.resources[index] = resource.clone();
        state.record(action, &id, upload);
        Ok(Value::Object(resource))
    }

    fn resource_show(&self, payload: &Value) -> Result<Value> {
        let action = actions::RESOURCE_SHOW;
        let id = Self::required_str(action, payload, "id")?;
        let state = self.state.borrow();
        let index = state
            .resource_index(id)
            .ok_or_else(|| Error::NotFoundError(format!("{}: Resource was not found.", action)))?;
        Ok(Value::Object(state.resources[index].clone()))
    }

    fn datastore_create(&self, payload: &Value) -> Result<Value> {
        let action = actions::DATASTORE_CREATE;
        let id = Self::required_str(action, payload, "resource_id")?.to_string();
        let mut state = self.state.borrow_mut();
        let index = state
            .resource_index(&id)
            .ok_or_else(|| Error::NotFoundError(format!("{}: Resource not found", action)))?;

        let fields = payload.get("fields").cloned().unwrap_or_else(|| json!([]));
        state.resources[index].insert("datastore_active".to_string(), Value::from(true));
        state.resources[index].insert("datastore_fields".to_string(), fields.clone());
        state.record(action, &id, None);
        Ok(json!({ "resource_id": id, "fields": fields }))
    }
}

impl CatalogClient for MemoryCatalog {
    fn address(&self) -> &str {
        &self.address
    }

    fn call_action(
        &self,
        action: &str,
        payload: &Value,
        upload: Option<&Upload>,
    ) -> Result<Value> {
        match action {
            actions::PACKAGE_SHOW => self.package_show(payload),
            actions::PACKAGE_CREATE => self.package_create(payload),
            actions::PACKAGE_PATCH => self.package_patch(payload),
            actions::RESOURCE_SHOW => self.resource_show(payload),
            actions::RESOURCE_CREATE => self.resource_create(payload, upload),
            actions::RESOURCE_UPDATE | actions::RESOURCE_PATCH => {
                self.resource_update(action, payload, upload)
            }
            actions::DATASTORE_CREATE => self.datastore_create(payload),
            other => Err(Error::ActionError {
                action: other.to_string(),
                message: "Action not supported by the in-memory catalog".to_string(),
            }),
        }
    }

    fn download(&self, url: &str) -> Result<Vec<u8>> {
        self.state
            .borrow()
            .content
            .get(url)
            .cloned()
            .ok_or_else(|| Error::DownloadError(format!("HTTP 404 from {}", url)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_show_missing_dataset_is_not_found() {
        let catalog = MemoryCatalog::new();
        let result = catalog.call_action(actions::PACKAGE_SHOW, &json!({"id": "nope"}), None);
        assert!(matches!(result, Err(Error::NotFoundError(_))));
    }

    #[test]
    fn test_create_dataset_and_upload_resource() {
        let catalog = MemoryCatalog::new();
        catalog
            .call_action(actions::PACKAGE_CREATE, &json!({"name": "d", "title": "D"}), None)
            .unwrap();

        let upload = Upload::Bytes {
            file_name: "a.csv".to_string(),
            data: b"x\n1\n".to_vec(),
        };
        let resource = catalog
            .call_action(
                actions::RESOURCE_CREATE,
                &json!({"package_id": "d", "name": "A"}),
                Some(&upload),
            )
            .unwrap();

        let id = resource["id"].as_str().unwrap();
        let url = resource["url"].as_str().unwrap();
        assert!(url.ends_with("/a.csv"));
        assert_eq!(catalog.download(url).unwrap(), b"x\n1\n");
        assert_eq!(catalog.resource_content(id).unwrap(), b"x\n1\n");

        let dataset = catalog.dataset("d").unwrap();
        assert_eq!(dataset["resources"].as_array().unwrap().len(), 1);
        assert_eq!(dataset["notes"], "");
        assert_eq!(catalog.writes().len(), 2);
    }

    #[test]
    fn test_duplicate_dataset_rejected() {
        let catalog = MemoryCatalog::new();
        catalog
            .call_action(actions::PACKAGE_CREATE, &json!({"name": "d"}), None)
            .unwrap();
        let result = catalog.call_action(actions::PACKAGE_CREATE, &json!({"name": "d"}), None);
        assert!(matches!(result, Err(Error::ActionError { .. })));
    }

    #[test]
    fn test_patch_keeps_catalog_id() {
        let catalog = MemoryCatalog::new();
        let created = catalog
            .call_action(actions::PACKAGE_CREATE, &json!({"name": "d"}), None)
            .unwrap();
        catalog
            .call_action(actions::PACKAGE_PATCH, &json!({"id": "d", "title": "New"}), None)
            .unwrap();

        let dataset = catalog.dataset("d").unwrap();
        assert_eq!(dataset["id"], created["id"]);
        assert_eq!(dataset["title"], "New");
    }

    #[test]
    fn test_unsupported_action() {
        let catalog = MemoryCatalog::new();
        let result = catalog.call_action("package_delete", &json!({"id": "d"}), None);
        assert!(matches!(result, Err(Error::ActionError { .. })));
    }
}
