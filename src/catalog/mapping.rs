// src/catalog/mapping.rs

//! Frictionless data package to CKAN dataset mapping
//!
//! One-directional: the sync engine never maps CKAN metadata back into a
//! package. Properties CKAN has no core field for are carried as `extras`
//! entries, JSON-encoded unless they already are strings.

use crate::error::Result;
use crate::package::{Package, Resource};
use serde_json::{Map, Value, json};

/// Top-level dataset fields CKAN stores natively
const CKAN_DATASET_KEYS: &[&str] = &[
    "author",
    "author_email",
    "extras",
    "groups",
    "id",
    "license_id",
    "license_title",
    "license_url",
    "maintainer",
    "maintainer_email",
    "name",
    "notes",
    "organization",
    "owner_org",
    "private",
    "resources",
    "state",
    "tags",
    "title",
    "type",
    "url",
    "version",
];

/// Package keys renamed to their CKAN counterparts
const RENAMED_KEYS: &[(&str, &str)] = &[("description", "notes"), ("homepage", "url")];

/// Map a package to a CKAN dataset dictionary
pub fn to_native(package: &Package) -> Result<Map<String, Value>> {
    let mut dataset = package.to_descriptor()?;

    for (from, to) in RENAMED_KEYS {
        if let Some(value) = dataset.remove(*from) {
            dataset.insert((*to).to_string(), value);
        }
    }

    dataset.insert(
        "resources".to_string(),
        Value::Array(package.resources.iter().map(resource_to_native).collect()),
    );

    map_licenses(&mut dataset);
    map_contributors(&mut dataset);

    if let Some(Value::Array(keywords)) = dataset.remove("keywords") {
        let tags = keywords
            .into_iter()
            .filter_map(|k| k.as_str().map(|name| json!({ "name": name })))
            .collect();
        dataset.insert("tags".to_string(), Value::Array(tags));
    }

    move_to_extras(&mut dataset);
    Ok(dataset)
}

/// CKAN resource dictionary for a package resource
pub fn resource_to_native(resource: &Resource) -> Value {
    let mut native = Map::new();
    native.insert(
        "name".to_string(),
        Value::from(resource.title.clone().unwrap_or_else(|| resource.name.clone())),
    );
    native.insert("url".to_string(), Value::from(resource.path.clone()));
    if let Some(description) = &resource.description {
        native.insert("description".to_string(), Value::from(description.clone()));
    }
    if let Some(format) = &resource.format {
        native.insert("format".to_string(), Value::from(format.to_uppercase()));
    }
    if let Some(mediatype) = &resource.mediatype {
        native.insert("mimetype".to_string(), Value::from(mediatype.clone()));
    }
    Value::Object(native)
}

fn map_licenses(dataset: &mut Map<String, Value>) {
    let Some(Value::Array(licenses)) = dataset.get("licenses") else {
        return;
    };
    let Some(first) = licenses.first().cloned() else {
        return;
    };
    let single = licenses.len() == 1;

    for (ckan_key, license_key) in [
        ("license_id", "name"),
        ("license_title", "title"),
        ("license_url", "path"),
    ] {
        if let Some(value) = first.get(license_key) {
            dataset.insert(ckan_key.to_string(), value.clone());
        }
    }

    // Additional licenses have no CKAN field and stay in extras
    if single {
        dataset.remove("licenses");
    }
}

fn map_contributors(dataset: &mut Map<String, Value>) {
    let Some(Value::Array(contributors)) = dataset.get("contributors") else {
        return;
    };

    let with_role = |role: Option<&str>| {
        contributors.iter().find(|c| {
            let actual = c.get("role").and_then(Value::as_str);
            match role {
                Some("author") => actual.is_none() || actual == Some("author"),
                other => actual == other,
            }
        })
    };

    let author = with_role(Some("author")).cloned();
    let maintainer = with_role(Some("maintainer")).cloned();

    for (prefix, contributor) in [("author", author), ("maintainer", maintainer)] {
        let Some(contributor) = contributor else {
            continue;
        };
        if let Some(title) = contributor.get("title") {
            dataset.insert(prefix.to_string(), title.clone());
        }
        if let Some(email) = contributor.get("email") {
            dataset.insert(format!("{}_email", prefix), email.clone());
        }
    }
}

fn move_to_extras(dataset: &mut Map<String, Value>) {
    let mut extras = match dataset.remove("extras") {
        Some(Value::Array(existing)) => existing,
        _ => Vec::new(),
    };

    let foreign: Vec<String> = dataset
        .keys()
        .filter(|k| !CKAN_DATASET_KEYS.contains(&k.as_str()))
        .cloned()
        .collect();

    for key in foreign {
        if let Some(value) = dataset.remove(&key) {
            let value = match value {
                Value::String(s) => s,
                other => other.to_string(),
            };
            extras.push(json!({ "key": key, "value": value }));
        }
    }

    if !extras.is_empty() {
        dataset.insert("extras".to_string(), Value::Array(extras));
    }
}
