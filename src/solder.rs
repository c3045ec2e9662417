//! Build resolution through a Solder API
//!
//! A componentized pack publishes its builds through Solder:
//!
//! - `GET {endpoint}modpack/{pack}` lists `builds` plus the `recommended` and
//!   `latest` build ids.
//! - `GET {endpoint}modpack/{pack}/{build}` lists the `mods` of one build,
//!   each with `name`, `version`, `url` and `md5`.
//!
//! The user picks a build with a [`BuildPreference`].

use crate::component::{Component, ComponentSet, DownloadLocator};
use crate::descriptor::CatalogEndpoint;
use crate::{Error, Result};
use serde::Deserialize;
use std::str::FromStr;
use std::time::Duration;

/// Which build of a pack the user wants installed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildPreference {
    Recommended,
    Latest,
    Exact(String),
}

impl FromStr for BuildPreference {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        match trimmed.to_ascii_lowercase().as_str() {
            "" => Err(Error::Other("Build preference must not be empty".to_string())),
            "recommended" => Ok(BuildPreference::Recommended),
            "latest" => Ok(BuildPreference::Latest),
            _ => Ok(BuildPreference::Exact(trimmed.to_string())),
        }
    }
}

impl std::fmt::Display for BuildPreference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BuildPreference::Recommended => f.write_str("recommended"),
            BuildPreference::Latest => f.write_str("latest"),
            BuildPreference::Exact(build) => f.write_str(build),
        }
    }
}

/// A concrete build and the components it is made of
#[derive(Debug, Clone)]
pub struct ResolvedBuild {
    pub build: String,
    pub components: ComponentSet,
}

/// Turns a build preference into a concrete build
pub trait BuildResolver: Send + Sync {
    fn resolve(
        &self,
        endpoint: &CatalogEndpoint,
        pack: &str,
        preference: &BuildPreference,
    ) -> Result<ResolvedBuild>;
}

#[derive(Debug, Deserialize)]
struct PackBuilds {
    #[serde(default)]
    recommended: Option<String>,
    #[serde(default)]
    latest: Option<String>,
    #[serde(default)]
    builds: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct BuildManifest {
    #[serde(default)]
    mods: Vec<BuildMod>,
}

#[derive(Debug, Deserialize)]
struct BuildMod {
    name: String,
    version: String,
    url: String,
    #[serde(default)]
    md5: Option<String>,
}

impl PackBuilds {
    fn select(&self, pack: &str, preference: &BuildPreference) -> Result<String> {
        let selected = match preference {
            BuildPreference::Recommended => self.recommended.clone(),
            BuildPreference::Latest => self.latest.clone(),
            BuildPreference::Exact(build) => self.builds.iter().find(|b| *b == build).cloned(),
        };

        selected
            .filter(|b| !b.is_empty())
            .ok_or_else(|| Error::UnknownBuild {
                pack: pack.to_string(),
                build: preference.to_string(),
            })
    }
}

pub struct SolderClient {
    client: reqwest::blocking::Client,
}

impl SolderClient {
    pub fn new() -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(concat!("technicpm/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self { client })
    }

    fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T> {
        tracing::debug!(url = %url, "Querying solder");
        let response = self.client.get(url).send()?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Other(format!(
                "Solder error: HTTP {} from {}",
                status.as_u16(),
                url
            )));
        }

        response.json().map_err(|e| {
            Error::MalformedSource(format!("unexpected solder response from {}: {}", url, e))
        })
    }
}

impl BuildResolver for SolderClient {
    fn resolve(
        &self,
        endpoint: &CatalogEndpoint,
        pack: &str,
        preference: &BuildPreference,
    ) -> Result<ResolvedBuild> {
        let pack_path = format!("modpack/{}", urlencoding::encode(pack));
        let builds: PackBuilds = self.get_json(&endpoint.join(&pack_path))?;
        let build = builds.select(pack, preference)?;

        let manifest: BuildManifest = self.get_json(
            &endpoint.join(&format!("{}/{}", pack_path, urlencoding::encode(&build))),
        )?;

        let mut components = ComponentSet::new();
        for m in manifest.mods {
            let mut locator = DownloadLocator::new(m.url);
            if let Some(md5) = m.md5.filter(|s| !s.is_empty()) {
                locator = locator.with_checksum(md5);
            }
            let component = Component::new(m.name, m.version, locator);
            if let Some(previous) = components.replace(component) {
                tracing::warn!(
                    component = %previous.name,
                    "Build lists the same mod twice, keeping the last entry"
                );
            }
        }

        tracing::info!(build = %build, mods = components.len(), "Resolved solder build");
        Ok(ResolvedBuild { build, components })
    }
}
