// src/sync/mod.rs

//! Change detection and reconciliation
//!
//! This module provides functionality for:
//! - Hashing local and published resource content
//! - Normalizing package metadata into the catalog's dataset shape
//! - Reading the published state of a dataset
//! - Diffing local resources against the published ones
//! - Publishing new datasets and applying minimal updates to existing ones

pub mod diff;
pub mod hash;
pub mod normalize;
pub mod reconcile;
pub mod remote;

pub use diff::{DatasetDiff, ResourceChange, diff};
pub use reconcile::{SyncOutcome, UpdateOutcome, publish, sync, update};
pub use remote::{RemoteState, dataset_exists};

use crate::error::{Error, Result};
use serde::de::{self, Deserializer, MapAccess, Visitor};
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Dataset extras key holding the serialized [`ResourceIdMap`]
pub const RESOURCES_IDS_KEY: &str = "resources_ids";

/// Knobs for publish and update runs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncOptions {
    /// Register resource schemas with the catalog's tabular datastore
    pub datastore: bool,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self { datastore: true }
    }
}

/// Resource name to catalog resource id, in insertion order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResourceIdMap {
    entries: Vec<(String, String)>,
}

impl ResourceIdMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the id for `name`, keeping its original position
    pub fn insert(&mut self, name: impl Into<String>, id: impl Into<String>) {
        let name = name.into();
        let id = id.into();
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = id,
            None => self.entries.push((name, id)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, id)| id.as_str())
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(n, _)| n.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(n, id)| (n.as_str(), id.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Parse the JSON-encoded form stored in dataset extras
    pub fn from_json(value: &str) -> Result<Self> {
        serde_json::from_str(value).map_err(|e| {
            Error::ConfigError(format!("'{}' is not a valid id map: {}", RESOURCES_IDS_KEY, e))
        })
    }
}

impl Serialize for ResourceIdMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (name, id) in &self.entries {
            map.serialize_entry(name, id)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for ResourceIdMap {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct IdMapVisitor;

        impl<'de> Visitor<'de> for IdMapVisitor {
            type Value = ResourceIdMap;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of resource names to resource ids")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> std::result::Result<ResourceIdMap, A::Error> {
                let mut ids = ResourceIdMap::new();
                while let Some((name, id)) = access.next_entry::<String, String>()? {
                    if ids.get(&name).is_some() {
                        return Err(de::Error::custom(format!("duplicate resource name '{}'", name)));
                    }
                    ids.insert(name, id);
                }
                Ok(ids)
            }
        }

        deserializer.deserialize_map(IdMapVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_map_keeps_insertion_order() {
        let mut ids = ResourceIdMap::new();
        ids.insert("zeta", "1");
        ids.insert("alpha", "2");
        ids.insert("zeta", "3");

        assert_eq!(ids.names().collect::<Vec<_>>(), vec!["zeta", "alpha"]);
        assert_eq!(ids.get("zeta"), Some("3"));
        assert_eq!(ids.len(), 2);
    }

    #[test]
    fn test_id_map_json_preserves_document_order() {
        let ids = ResourceIdMap::from_json(r#"{"b.csv": "id-b", "a.csv": "id-a"}"#).unwrap();
        assert_eq!(ids.names().collect::<Vec<_>>(), vec!["b.csv", "a.csv"]);
        assert_eq!(serde_json::to_string(&ids).unwrap(), r#"{"b.csv":"id-b","a.csv":"id-a"}"#);
    }

    #[test]
    fn test_id_map_rejects_non_string_ids() {
        let result = ResourceIdMap::from_json(r#"{"a.csv": 42}"#);
        assert!(matches!(result, Err(Error::ConfigError(_))));
    }

    #[test]
    fn test_default_options_enable_datastore() {
        assert!(SyncOptions::default().datastore);
    }
}
