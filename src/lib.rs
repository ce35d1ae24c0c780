// src/lib.rs

//! dpsync: data package publishing for CKAN catalogs
//!
//! Keeps a local data package (a `datapackage.json` manifest plus the files
//! it references) in sync with a dataset on a remote CKAN catalog.
//!
//! # Architecture
//!
//! - Package model: manifest, resources, expanded schemas
//! - Catalog: action-API client behind a trait, with an in-memory double
//! - Sync: content hashing, metadata normalization, remote state, diff, reconcile
//! - The `datapackage.json` resource on the catalog is the version marker of
//!   the whole dataset and is republished on every mutation

pub mod catalog;
pub mod config;
mod error;
pub mod package;
pub mod sync;

pub use error::{Error, Result};
