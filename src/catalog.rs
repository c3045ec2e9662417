//! Catalog client: fetches the raw pack descriptor
//!
//! The Technic platform serves pack descriptors at
//! `https://api.technicpack.net/modpack/<slug>?build=<launcher build>`.
//! Anything that is not served as JSON is rejected before parsing.

use crate::{Error, Result};
use std::time::Duration;

/// Source of raw descriptor bytes
pub trait CatalogClient: Send + Sync {
    /// Fetch the descriptor payload at `endpoint`
    ///
    /// Must fail with [`Error::NotACatalog`] when the response is not a JSON
    /// descriptor, so callers never try to parse an HTML page.
    fn fetch(&self, endpoint: &str) -> Result<Vec<u8>>;
}

pub struct HttpCatalogClient {
    client: reqwest::blocking::Client,
    launcher_build: String,
}

impl HttpCatalogClient {
    pub fn new(launcher_build: impl Into<String>) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(concat!("technicpm/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            launcher_build: launcher_build.into(),
        })
    }
}

impl CatalogClient for HttpCatalogClient {
    fn fetch(&self, endpoint: &str) -> Result<Vec<u8>> {
        tracing::info!(url = %endpoint, "Fetching pack descriptor");

        let response = self
            .client
            .get(endpoint)
            .query(&[("build", self.launcher_build.as_str())])
            .send()
            .map_err(|e| {
                if e.is_connect() {
                    Error::Other(format!(
                        "Cannot connect to catalog at {}\n\
                         Please check the API URL and your network connection.",
                        endpoint
                    ))
                } else if e.is_timeout() {
                    Error::Other("Catalog request timed out. Please try again.".to_string())
                } else {
                    Error::Http(e)
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Other(format!(
                "Catalog error: HTTP {} from {}",
                status.as_u16(),
                endpoint
            )));
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();

        if !content_type.starts_with("application/json") {
            return Err(Error::NotACatalog {
                url: endpoint.to_string(),
                content_type,
            });
        }

        Ok(response.bytes()?.to_vec())
    }
}
