// src/catalog/mod.rs

//! Catalog access
//!
//! The sync engine talks to the catalog only through [`CatalogClient`]: an
//! action invocation (`package_show`, `resource_create`, ...) plus a download
//! of published content. Clients are passed explicitly into every operation.
//!
//! - [`http::HttpCatalog`]: CKAN action API over HTTP
//! - [`memory::MemoryCatalog`]: in-process catalog for offline runs and tests
//! - [`mapping`]: package metadata to CKAN dataset fields

pub mod http;
pub mod mapping;
pub mod memory;

pub use http::HttpCatalog;
pub use memory::MemoryCatalog;

use crate::error::Result;
use serde_json::Value;
use std::path::PathBuf;

/// Action names used by the sync engine
pub mod actions {
    pub const PACKAGE_SHOW: &str = "package_show";
    pub const PACKAGE_CREATE: &str = "package_create";
    pub const PACKAGE_PATCH: &str = "package_patch";
    pub const RESOURCE_SHOW: &str = "resource_show";
    pub const RESOURCE_CREATE: &str = "resource_create";
    pub const RESOURCE_UPDATE: &str = "resource_update";
    pub const RESOURCE_PATCH: &str = "resource_patch";
    pub const DATASTORE_CREATE: &str = "datastore_create";
}

/// Form field name the catalog expects file uploads under
pub const UPLOAD_FIELD: &str = "upload";

/// Content attached to a resource create/update
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Upload {
    /// Stream a local file
    File(PathBuf),
    /// Send an in-memory buffer under the given file name
    Bytes { file_name: String, data: Vec<u8> },
}

impl Upload {
    /// File name the catalog will publish the upload under
    pub fn file_name(&self) -> String {
        match self {
            Upload::File(path) => path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "upload".to_string()),
            Upload::Bytes { file_name, .. } => file_name.clone(),
        }
    }

    /// Read the upload's content into memory
    pub fn read(&self) -> Result<Vec<u8>> {
        match self {
            Upload::File(path) => std::fs::read(path).map_err(|e| {
                crate::Error::IoError(format!("Failed to read {}: {}", path.display(), e))
            }),
            Upload::Bytes { data, .. } => Ok(data.clone()),
        }
    }
}

/// Remote catalog collaborator
pub trait CatalogClient {
    /// Base URL of the catalog, for user-facing messages
    fn address(&self) -> &str;

    /// Invoke a catalog action and return its `result` payload
    fn call_action(&self, action: &str, payload: &Value, upload: Option<&Upload>)
    -> Result<Value>;

    /// Fetch the bytes published at `url`
    fn download(&self, url: &str) -> Result<Vec<u8>>;

    /// Public page of a dataset
    fn dataset_url(&self, name: &str) -> String {
        format!("{}/dataset/{}", self.address(), name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upload_file_name() {
        let file = Upload::File(PathBuf::from("data/a.csv"));
        assert_eq!(file.file_name(), "a.csv");

        let bytes = Upload::Bytes {
            file_name: "datapackage.json".to_string(),
            data: b"{}".to_vec(),
        };
        assert_eq!(bytes.file_name(), "datapackage.json");
        assert_eq!(bytes.read().unwrap(), b"{}");
    }

    #[test]
    fn test_upload_read_missing_file() {
        let file = Upload::File(PathBuf::from("/nonexistent/a.csv"));
        assert!(file.read().is_err());
    }
}
