// src/error.rs

use thiserror::Error;

/// Core error types for dpsync
#[derive(Error, Debug)]
pub enum Error {
    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encoding/decoding errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error with path context
    #[error("I/O error: {0}")]
    IoError(String),

    /// Malformed manifest or schema document
    #[error("Parse error: {0}")]
    ParseError(String),

    /// Package violates a structural rule (duplicate or reserved names)
    #[error("Invalid data package: {0}")]
    InvalidPackage(String),

    /// Fatal configuration problem; the run cannot proceed
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Catalog reported that an object does not exist
    #[error("Not found: {0}")]
    NotFoundError(String),

    /// Object already exists on the catalog
    #[error("Conflict: {0}")]
    ConflictError(String),

    /// Published dataset is missing a structural part it must carry
    #[error("Corrupt dataset: {0}")]
    CorruptDataset(String),

    /// Catalog action failed; the message is passed through untranslated
    #[error("Catalog action '{action}' failed: {message}")]
    ActionError { action: String, message: String },

    /// Fetching published content failed
    #[error("Download failed: {0}")]
    DownloadError(String),
}

/// Result type alias using dpsync's Error type
pub type Result<T> = std::result::Result<T, Error>;
