// src/package/schema.rs

//! Table schema and CSV dialect descriptors
//!
//! Both are expanded with their frictionless defaults at load time so that a
//! locally loaded package and a package re-read from the catalog compare equal
//! when they describe the same thing.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Default field type when a schema omits it
pub const DEFAULT_FIELD_TYPE: &str = "string";

/// Default field format when a schema omits it
pub const DEFAULT_FIELD_FORMAT: &str = "default";

/// A single column of a tabular resource
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub field_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub constraints: Option<Map<String, Value>>,
    /// Other field properties (`example`, `trueValues`, `rdfType`...)
    #[serde(flatten)]
    pub properties: Map<String, Value>,
}

impl Field {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            field_type: None,
            format: None,
            title: None,
            description: None,
            constraints: None,
            properties: Map::new(),
        }
    }

    fn expand(&mut self) {
        self.field_type
            .get_or_insert_with(|| DEFAULT_FIELD_TYPE.to_string());
        self.format
            .get_or_insert_with(|| DEFAULT_FIELD_FORMAT.to_string());
    }
}

/// Table schema: ordered fields plus table-level properties
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Schema {
    #[serde(default)]
    pub fields: Vec<Field>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub missing_values: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_key: Option<Value>,
    /// Other table properties, e.g. `foreignKeys`
    #[serde(flatten)]
    pub properties: Map<String, Value>,
}

impl Schema {
    /// Fill in defaults for the schema and every field
    pub fn expand(&mut self) {
        self.missing_values.get_or_insert_with(|| vec![String::new()]);
        for field in &mut self.fields {
            field.expand();
        }
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// CSV dialect
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dialect {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delimiter: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line_terminator: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quote_char: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub double_quote: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skip_initial_space: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub header: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub case_sensitive_header: Option<bool>,
    #[serde(flatten)]
    pub properties: Map<String, Value>,
}

impl Dialect {
    pub fn expand(&mut self) {
        self.delimiter.get_or_insert_with(|| ",".to_string());
        self.line_terminator.get_or_insert_with(|| "\r\n".to_string());
        self.quote_char.get_or_insert_with(|| "\"".to_string());
        self.double_quote.get_or_insert(true);
        self.skip_initial_space.get_or_insert(false);
        self.header.get_or_insert(true);
        self.case_sensitive_header.get_or_insert(false);
    }
}
