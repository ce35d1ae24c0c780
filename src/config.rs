// src/config.rs

//! Catalog connection settings
//!
//! Values come from the command line or the `CKAN_HOST` / `CKAN_KEY`
//! environment variables; this module only validates and normalizes them.

use crate::error::{Error, Result};
use std::time::Duration;

/// Environment variable holding the catalog base URL
pub const HOST_ENV: &str = "CKAN_HOST";

/// Environment variable holding the catalog API key
pub const KEY_ENV: &str = "CKAN_KEY";

/// Default timeout for HTTP requests (30 seconds)
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Where and how to reach the catalog
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogConfig {
    /// Base URL without a trailing slash
    pub address: String,
    pub api_key: Option<String>,
    pub timeout: Duration,
}

impl CatalogConfig {
    /// Validate an address and build a configuration with default timeout
    pub fn new(address: &str, api_key: Option<String>) -> Result<Self> {
        let address = address.trim().trim_end_matches('/');

        let url = reqwest::Url::parse(address).map_err(|e| {
            Error::ConfigError(format!("Invalid catalog address '{}': {}", address, e))
        })?;
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(Error::ConfigError(format!(
                "Catalog address must be http or https, got '{}'",
                address
            )));
        }

        let api_key = api_key.filter(|k| !k.trim().is_empty());

        Ok(Self {
            address: address.to_string(),
            api_key,
            timeout: DEFAULT_TIMEOUT,
        })
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}
