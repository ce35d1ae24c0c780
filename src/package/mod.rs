// src/package/mod.rs

//! Data package model
//!
//! A package is the local description of a dataset: its name, descriptive
//! properties and an ordered list of resources. Resources are typed
//! explicitly so that resource metadata comparison is plain structural
//! equality. Properties the sync engine does not interpret, at package,
//! resource, schema and field level, are kept verbatim so the published
//! manifest is a full copy of the descriptor and edits to them are detected.

pub mod loader;
pub mod schema;

pub use loader::{load, load_from_slice};
pub use schema::{Dialect, Field, Schema};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};

/// Name of the synthetic manifest resource on the catalog
pub const MANIFEST_NAME: &str = "datapackage.json";

/// One named data artifact within a package
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    pub name: String,
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mediatype: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encoding: Option<String>,
    #[serde(default)]
    pub schema: Schema,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dialect: Option<Dialect>,
    /// Every other resource property (`sources`, `licenses`, `bytes`...)
    #[serde(flatten)]
    pub properties: Map<String, Value>,
}

impl Resource {
    pub fn new(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            title: None,
            description: None,
            format: None,
            mediatype: None,
            encoding: None,
            schema: Schema::default(),
            dialect: None,
            properties: Map::new(),
        }
    }

    /// Whether the path points at published content rather than a local file
    pub fn is_remote(&self) -> bool {
        self.path.starts_with("http")
    }

    /// Expand schema and dialect defaults in place
    pub fn expand(&mut self) {
        self.schema.expand();
        if let Some(dialect) = self.dialect.as_mut() {
            dialect.expand();
        }
    }
}

/// A data package: dataset-level metadata plus its resources
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Package {
    pub name: String,
    #[serde(default)]
    pub resources: Vec<Resource>,
    /// Every other descriptor property, in document order
    #[serde(flatten)]
    pub properties: Map<String, Value>,
    /// Root for relative resource paths; empty means the current directory
    #[serde(skip)]
    pub basepath: PathBuf,
}

impl Package {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            resources: Vec::new(),
            properties: Map::new(),
            basepath: PathBuf::new(),
        }
    }

    /// Resource names in package order
    pub fn resource_names(&self) -> Vec<&str> {
        self.resources.iter().map(|r| r.name.as_str()).collect()
    }

    pub fn get_resource(&self, name: &str) -> Option<&Resource> {
        self.resources.iter().find(|r| r.name == name)
    }

    /// Directory relative resource paths and auxiliary files resolve against
    pub fn base_dir(&self) -> &Path {
        if self.basepath.as_os_str().is_empty() {
            Path::new(".")
        } else {
            &self.basepath
        }
    }

    /// Filesystem location of a local resource
    pub fn resource_path(&self, resource: &Resource) -> PathBuf {
        self.base_dir().join(&resource.path)
    }

    /// Serialized descriptor, as published in the manifest resource
    pub fn to_json(&self) -> crate::Result<Vec<u8>> {
        Ok(serde_json::to_vec_pretty(self)?)
    }

    /// Descriptor as a JSON object
    pub fn to_descriptor(&self) -> crate::Result<Map<String, Value>> {
        match serde_json::to_value(self)? {
            Value::Object(map) => Ok(map),
            _ => Err(crate::Error::ParseError(format!(
                "Package '{}' did not serialize to an object",
                self.name
            ))),
        }
    }
}
