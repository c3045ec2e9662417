pub mod reset;
pub mod run;
pub mod status;

use anyhow::Result;
use std::path::PathBuf;
use technicpm::Config;

/// Command-line values that take precedence over the config file
pub struct Overrides {
    pub config: Option<PathBuf>,
    pub root: Option<String>,
    pub api_url: Option<String>,
    pub build: Option<String>,
}

impl Overrides {
    /// Load the config file (or defaults) and apply the command-line values
    pub fn load_config(&self) -> Result<Config> {
        let mut config = match &self.config {
            Some(path) => {
                if !path.exists() {
                    anyhow::bail!("Config file not found: {}", path.display());
                }
                Config::load_from(path)?
            }
            None => Config::load()?,
        };

        if let Some(root) = &self.root {
            config.install.root = root.clone();
        }
        if let Some(url) = &self.api_url {
            config.pack.api_url = Some(url.clone());
        }
        if let Some(build) = &self.build {
            config.pack.build = build.clone();
        }
        Ok(config)
    }
}
