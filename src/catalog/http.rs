// src/catalog/http.rs

//! CKAN action API client
//!
//! Every action is a POST to `{address}/api/3/action/{name}`. Plain actions
//! send a JSON body; actions carrying an upload send a multipart form whose
//! text parts are the payload fields. Responses use CKAN's envelope
//! (`success`, `result`, `error`). Failures are not retried here.

use super::{CatalogClient, UPLOAD_FIELD, Upload};
use crate::config::CatalogConfig;
use crate::error::{Error, Result};
use reqwest::blocking::multipart::{Form, Part};
use reqwest::blocking::{Client, RequestBuilder};
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

/// CKAN response envelope
#[derive(Debug, Deserialize)]
struct ActionResponse {
    success: bool,
    #[serde(default)]
    result: Value,
    #[serde(default)]
    error: Option<ActionFailure>,
}

#[derive(Debug, Deserialize)]
struct ActionFailure {
    #[serde(rename = "__type", default)]
    kind: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(flatten)]
    details: serde_json::Map<String, Value>,
}

impl ActionFailure {
    fn is_not_found(&self) -> bool {
        self.kind.as_deref() == Some("Not Found Error")
    }

    fn describe(&self) -> String {
        match (&self.message, self.details.is_empty()) {
            (Some(message), _) => message.clone(),
            (None, false) => Value::Object(self.details.clone()).to_string(),
            (None, true) => self.kind.clone().unwrap_or_else(|| "unknown error".to_string()),
        }
    }
}

/// HTTP client for a CKAN catalog
pub struct HttpCatalog {
    client: Client,
    config: CatalogConfig,
}

impl HttpCatalog {
    /// Create a new catalog client
    pub fn new(config: CatalogConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| Error::ConfigError(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    fn action_url(&self, action: &str) -> String {
        format!("{}/api/3/action/{}", self.config.address, action)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.config.api_key {
            Some(key) => request.header(reqwest::header::AUTHORIZATION, key),
            None => request,
        }
    }

    fn multipart(payload: &Value, upload: &Upload) -> Result<Form> {
        let mut form = Form::new();

        if let Value::Object(fields) = payload {
            for (key, value) in fields {
                match value {
                    Value::Null => {}
                    Value::String(s) => form = form.text(key.clone(), s.clone()),
                    other => form = form.text(key.clone(), other.to_string()),
                }
            }
        }

        let part = match upload {
            Upload::File(path) => Part::file(path).map_err(|e| {
                Error::IoError(format!("Failed to open {}: {}", path.display(), e))
            })?,
            Upload::Bytes { file_name, data } => {
                Part::bytes(data.clone()).file_name(file_name.clone())
            }
        };

        Ok(form.part(UPLOAD_FIELD, part))
    }
}

impl CatalogClient for HttpCatalog {
    fn address(&self) -> &str {
        &self.config.address
    }

    fn call_action(
        &self,
        action: &str,
        payload: &Value,
        upload: Option<&Upload>,
    ) -> Result<Value> {
        let url = self.action_url(action);
        debug!("POST {}", url);

        let request = self.authorize(self.client.post(&url));
        let request = match upload {
            Some(upload) => request.multipart(Self::multipart(payload, upload)?),
            None => request.json(payload),
        };

        let response = request.send().map_err(|e| Error::ActionError {
            action: action.to_string(),
            message: e.to_string(),
        })?;
        let status = response.status();

        let envelope: ActionResponse = response.json().map_err(|e| Error::ActionError {
            action: action.to_string(),
            message: format!("HTTP {}: unreadable response: {}", status, e),
        })?;

        if envelope.success {
            return Ok(envelope.result);
        }

        match envelope.error {
            Some(failure) if failure.is_not_found() => {
                Err(Error::NotFoundError(format!("{}: {}", action, failure.describe())))
            }
            Some(failure) => Err(Error::ActionError {
                action: action.to_string(),
                message: failure.describe(),
            }),
            None => Err(Error::ActionError {
                action: action.to_string(),
                message: format!("HTTP {}", status),
            }),
        }
    }

    fn download(&self, url: &str) -> Result<Vec<u8>> {
        debug!("Downloading {}", url);

        let mut request = self.client.get(url);
        // Private datasets only serve content to authorized requests
        if url.starts_with(&self.config.address) {
            request = self.authorize(request);
        }

        let response = request
            .send()
            .map_err(|e| Error::DownloadError(format!("Failed to download {}: {}", url, e)))?;

        if !response.status().is_success() {
            return Err(Error::DownloadError(format!(
                "HTTP {} from {}",
                response.status(),
                url
            )));
        }

        let bytes = response
            .bytes()
            .map_err(|e| Error::DownloadError(format!("Failed to read response: {}", e)))?;
        Ok(bytes.to_vec())
    }
}
