//! Pack descriptor model
//!
//! A [`PackDescriptor`] is built from the catalog's JSON payload on every run
//! and replaced wholesale; it is never patched field by field.
//!
//! # Examples
//!
//! ```
//! use technicpm::PackDescriptor;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let json = br#"{
//!     "id": 42,
//!     "name": "tekkit-legends",
//!     "displayName": "Tekkit Legends",
//!     "user": "technic",
//!     "minecraft": "1.7.10",
//!     "version": "1.1.1",
//!     "solder": "https://solder.example/api/"
//! }"#;
//!
//! let descriptor = PackDescriptor::from_json(json)?;
//! assert!(!descriptor.is_monolithic());
//! # Ok(())
//! # }
//! ```

use crate::component::{Component, DownloadLocator, MONOLITHIC_OWNER};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use url::Url;

/// A downloadable image published with the pack (icon, logo)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub md5: Option<String>,
}

/// Base URL of the build-resolution service that lists per-component builds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CatalogEndpoint(String);

impl CatalogEndpoint {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Join a relative path onto the endpoint, keeping exactly one slash between them
    pub fn join(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.0.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

impl std::fmt::Display for CatalogEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Immutable description of a pack as published by the catalog
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackDescriptor {
    pub id: u64,
    pub name: String,
    pub display_name: String,
    pub user: String,
    /// Game version the pack targets
    pub minecraft: String,
    pub version: String,
    /// Archive URL of a monolithic pack
    pub url: Option<String>,
    pub icon: Option<Resource>,
    pub logo: Option<Resource>,
    pub endpoint: Option<CatalogEndpoint>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawDescriptor {
    id: Option<u64>,
    name: Option<String>,
    display_name: Option<String>,
    user: Option<String>,
    url: Option<String>,
    minecraft: Option<String>,
    version: Option<String>,
    icon: Option<RawResource>,
    logo: Option<RawResource>,
    solder: Option<String>,
}

#[derive(Deserialize)]
struct RawResource {
    url: Option<String>,
    md5: Option<String>,
}

impl PackDescriptor {
    /// Parse a catalog payload
    ///
    /// Fails with [`Error::MalformedSource`] when `id`, `name`, `minecraft` or
    /// `version` are missing, and with [`Error::InvalidReference`] when a
    /// non-empty URL field does not parse.
    pub fn from_json(bytes: &[u8]) -> Result<Self> {
        let raw: RawDescriptor = serde_json::from_slice(bytes)
            .map_err(|e| Error::MalformedSource(format!("not a pack descriptor: {}", e)))?;

        let id = raw.id.ok_or_else(|| missing("id"))?;
        let name = required(raw.name, "name")?;
        let minecraft = required(raw.minecraft, "minecraft")?;
        let version = required(raw.version, "version")?;

        let url = non_empty(raw.url)
            .map(|u| checked_url("url", u))
            .transpose()?;
        let icon = raw.icon.map(|r| resource("icon", r)).transpose()?.flatten();
        let logo = raw.logo.map(|r| resource("logo", r)).transpose()?.flatten();
        let endpoint = non_empty(raw.solder)
            .map(|u| checked_url("solder", u).map(CatalogEndpoint))
            .transpose()?;

        Ok(Self {
            id,
            display_name: non_empty(raw.display_name).unwrap_or_else(|| name.clone()),
            name,
            user: raw.user.unwrap_or_default(),
            minecraft,
            version,
            url,
            icon,
            logo,
            endpoint,
        })
    }

    /// A monolithic pack ships as one archive and has no catalog endpoint
    pub fn is_monolithic(&self) -> bool {
        self.endpoint.is_none()
    }

    /// The single pseudo-component standing for a monolithic pack's archive
    pub fn monolithic_component(&self) -> Result<Component> {
        let url = self.url.as_ref().ok_or_else(|| {
            Error::MalformedSource(format!(
                "pack '{}' has neither a solder endpoint nor an archive url",
                self.name
            ))
        })?;

        Ok(Component::new(
            MONOLITHIC_OWNER,
            self.version.clone(),
            DownloadLocator::new(url.clone()),
        ))
    }
}

fn missing(field: &str) -> Error {
    Error::MalformedSource(format!("required field '{}' is missing", field))
}

fn required(value: Option<String>, field: &str) -> Result<String> {
    non_empty(value).ok_or_else(|| missing(field))
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn checked_url(field: &str, value: String) -> Result<String> {
    match Url::parse(&value) {
        Ok(_) => Ok(value),
        Err(e) => Err(Error::InvalidReference {
            field: field.to_string(),
            value,
            reason: e.to_string(),
        }),
    }
}

fn resource(field: &str, raw: RawResource) -> Result<Option<Resource>> {
    let Some(url) = non_empty(raw.url) else {
        return Ok(None);
    };

    Ok(Some(Resource {
        url: checked_url(field, url)?,
        md5: non_empty(raw.md5),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    const MONOLITHIC: &str = r#"{
        "id": 7,
        "name": "vanilla-plus",
        "displayName": "Vanilla Plus",
        "user": "someone",
        "url": "https://cdn.example/vanilla-plus-2.0.zip",
        "minecraft": "1.12.2",
        "version": "2.0",
        "icon": {"url": "https://cdn.example/icon.png", "md5": "abc"},
        "logo": null,
        "solder": ""
    }"#;

    #[test]
    fn test_parse_monolithic() {
        let descriptor = PackDescriptor::from_json(MONOLITHIC.as_bytes()).unwrap();

        assert_eq!(descriptor.id, 7);
        assert_eq!(descriptor.display_name, "Vanilla Plus");
        assert!(descriptor.is_monolithic());
        assert_eq!(descriptor.icon.as_ref().unwrap().md5.as_deref(), Some("abc"));
        assert!(descriptor.logo.is_none());

        let package = descriptor.monolithic_component().unwrap();
        assert_eq!(package.name, MONOLITHIC_OWNER);
        assert_eq!(package.version, "2.0");
    }

    #[test]
    fn test_parse_componentized() {
        let json = r#"{"id": 1, "name": "p", "minecraft": "1.7.10", "version": "1",
                       "solder": "https://solder.example/api/"}"#;
        let descriptor = PackDescriptor::from_json(json.as_bytes()).unwrap();

        assert!(!descriptor.is_monolithic());
        assert_eq!(descriptor.display_name, "p");
        assert_eq!(
            descriptor.endpoint.unwrap().join("/modpack/p"),
            "https://solder.example/api/modpack/p"
        );
    }

    #[test]
    fn test_missing_required_field() {
        let json = r#"{"id": 1, "name": "p", "minecraft": "1.7.10"}"#;
        let err = PackDescriptor::from_json(json.as_bytes()).unwrap_err();

        assert!(matches!(err, Error::MalformedSource(_)));
        assert!(err.to_string().contains("version"));
    }

    #[test]
    fn test_not_json() {
        let err = PackDescriptor::from_json(b"<html>nope</html>").unwrap_err();
        assert!(matches!(err, Error::MalformedSource(_)));
    }

    #[test]
    fn test_invalid_url() {
        let json = r#"{"id": 1, "name": "p", "minecraft": "1.7.10", "version": "1",
                       "url": "not a url"}"#;
        let err = PackDescriptor::from_json(json.as_bytes()).unwrap_err();

        match err {
            Error::InvalidReference { field, .. } => assert_eq!(field, "url"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_monolithic_without_url() {
        let json = r#"{"id": 1, "name": "p", "minecraft": "1.7.10", "version": "1"}"#;
        let descriptor = PackDescriptor::from_json(json.as_bytes()).unwrap();
        assert!(descriptor.monolithic_component().is_err());
    }
}
