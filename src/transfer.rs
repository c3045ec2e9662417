//! Single-file download primitive

use crate::component::DownloadLocator;
use crate::{Error, Result};
use std::fs;
use std::path::Path;
use std::time::Duration;
use tempfile::NamedTempFile;

/// Fetches one archive to a local path
pub trait Downloader: Send + Sync {
    /// Download `locator` to `dest`, returning the number of bytes written
    fn download(&self, locator: &DownloadLocator, dest: &Path) -> Result<u64>;
}

/// Blocking HTTP downloader
///
/// The body is streamed into a temporary file next to `dest` and renamed
/// into place once complete, so `dest` only ever holds a whole archive.
pub struct HttpDownloader {
    client: reqwest::blocking::Client,
}

impl HttpDownloader {
    pub fn new() -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(concat!("technicpm/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self { client })
    }
}

impl Downloader for HttpDownloader {
    fn download(&self, locator: &DownloadLocator, dest: &Path) -> Result<u64> {
        let dir = dest
            .parent()
            .ok_or_else(|| Error::Other(format!("Invalid download target {}", dest.display())))?;
        fs::create_dir_all(dir).map_err(|e| Error::filesystem(dir, e))?;

        let mut response = self.client.get(&locator.url).send()?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::Other(format!(
                "HTTP {} for {}",
                status.as_u16(),
                locator.url
            )));
        }

        let mut temp = NamedTempFile::new_in(dir)?;
        let written = response.copy_to(temp.as_file_mut())?;
        temp.persist(dest).map_err(|e| e.error)?;

        tracing::debug!(url = %locator.url, bytes = written, "Downloaded");
        Ok(written)
    }
}
