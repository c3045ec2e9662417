//! User configuration
//!
//! Configuration is stored in TOML format at `~/.technicpm/config.toml`.
//! Every section is optional; a missing file means all defaults.
//!
//! ```toml
//! [pack]
//! api_url = "https://api.technicpack.net/modpack/tekkit-legends"
//! build = "recommended"
//!
//! [install]
//! root = "~/servers/tekkit"
//! autoupdate = false
//!
//! [loader]
//! command = ["java", "-jar", "forge-installer.jar", "--installServer"]
//! server_jar = true
//!
//! [cleanup]
//! client_only = ["^journeymap"]
//! ```
//!
//! # Examples
//!
//! ```no_run
//! use technicpm::Config;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::load()?;
//!
//! println!("Install root: {}", config.install_root()?.display());
//! println!("Build: {}", config.pack.build);
//! # Ok(())
//! # }
//! ```

use crate::loader::DEFAULT_SERVER_JAR_URL;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Launcher build id sent to the catalog; the platform serves current
/// descriptors for any recent launcher
pub const DEFAULT_LAUNCHER_BUILD: &str = "999";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub pack: PackConfig,

    #[serde(default)]
    pub install: InstallConfig,

    #[serde(default)]
    pub loader: LoaderConfig,

    #[serde(default)]
    pub cleanup: CleanupConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PackConfig {
    /// Catalog URL of the pack, e.g. `https://api.technicpack.net/modpack/<slug>`
    #[serde(default)]
    pub api_url: Option<String>,

    /// `recommended`, `latest` or an exact build id
    #[serde(default = "default_build")]
    pub build: String,

    #[serde(default = "default_launcher_build")]
    pub launcher_build: String,
}

fn default_build() -> String {
    "recommended".to_string()
}

fn default_launcher_build() -> String {
    DEFAULT_LAUNCHER_BUILD.to_string()
}

impl Default for PackConfig {
    fn default() -> Self {
        Self {
            api_url: None,
            build: default_build(),
            launcher_build: default_launcher_build(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InstallConfig {
    /// Server directory; `~` and environment variables are expanded
    #[serde(default = "default_root")]
    pub root: String,

    /// Archive cache, relative to the root unless absolute
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,

    /// Apply available updates without `technicpm update`
    #[serde(default = "default_true")]
    pub autoupdate: bool,

    #[serde(default = "default_max_parallel")]
    pub max_parallel: usize,

    #[serde(default = "default_true")]
    pub download_icon: bool,

    /// How long to hold the "update available" notice before starting
    #[serde(default = "default_update_notice_seconds")]
    pub update_notice_seconds: u64,
}

fn default_root() -> String {
    ".".to_string()
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from("cache")
}

fn default_true() -> bool {
    true
}

fn default_max_parallel() -> usize {
    4
}

fn default_update_notice_seconds() -> u64 {
    10
}

impl Default for InstallConfig {
    fn default() -> Self {
        Self {
            root: default_root(),
            cache_dir: default_cache_dir(),
            autoupdate: true,
            max_parallel: default_max_parallel(),
            download_icon: true,
            update_notice_seconds: default_update_notice_seconds(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoaderConfig {
    /// Installer to run in the install root after every install or update
    #[serde(default)]
    pub command: Option<Vec<String>>,

    /// Download the vanilla server jar of the pack's Minecraft version
    #[serde(default = "default_true")]
    pub server_jar: bool,

    /// `{version}` is replaced by the Minecraft version
    #[serde(default = "default_server_jar_url")]
    pub server_jar_url: String,
}

fn default_server_jar_url() -> String {
    DEFAULT_SERVER_JAR_URL.to_string()
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            command: None,
            server_jar: true,
            server_jar_url: default_server_jar_url(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CleanupConfig {
    /// Delete client-only mods after installing
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Extra file-name patterns (regex, case-insensitive) added to the built-in list
    #[serde(default)]
    pub client_only: Vec<String>,
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            client_only: Vec::new(),
        }
    }
}

impl Config {
    /// Get the default config file path
    ///
    /// Uses TECHNICPM_CONFIG_DIR if set, otherwise ~/.technicpm/config.toml
    pub fn default_path() -> Result<PathBuf> {
        // Check for custom config directory (useful for testing)
        if let Ok(config_dir) = std::env::var("TECHNICPM_CONFIG_DIR") {
            return Ok(PathBuf::from(config_dir).join("config.toml"));
        }

        let home = dirs::home_dir()
            .ok_or_else(|| Error::Other("Could not find home directory".to_string()))?;

        Ok(home.join(".technicpm").join("config.toml"))
    }

    /// Load config from the default path
    ///
    /// Environment variable overrides:
    /// - `TECHNICPM_API_URL`: overrides `pack.api_url`
    /// - `TECHNICPM_BUILD`: overrides `pack.build`
    /// - `TECHNICPM_CONFIG_DIR`: overrides the config directory location
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::default_path()?)
    }

    /// Load config from `path`, falling back to defaults if it does not exist
    pub fn load_from(path: &Path) -> Result<Self> {
        let mut config = if !path.exists() {
            Self::default()
        } else {
            let content = fs::read_to_string(path)?;
            toml::from_str(&content)?
        };

        config.apply_env();
        Ok(config)
    }

    fn apply_env(&mut self) {
        if let Ok(url) = std::env::var("TECHNICPM_API_URL") {
            if !url.is_empty() {
                self.pack.api_url = Some(url);
            }
        }
        if let Ok(build) = std::env::var("TECHNICPM_BUILD") {
            if !build.is_empty() {
                self.pack.build = build;
            }
        }
    }

    /// Save config to the default path
    pub fn save(&self) -> Result<()> {
        let path = Self::default_path()?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        fs::write(&path, content)?;
        Ok(())
    }

    /// The install root with `~` and `$VARS` expanded
    pub fn install_root(&self) -> Result<PathBuf> {
        let expanded = shellexpand::full(&self.install.root).map_err(|e| {
            Error::Other(format!(
                "Could not expand install root '{}': {}",
                self.install.root, e
            ))
        })?;
        Ok(PathBuf::from(expanded.as_ref()))
    }

    /// The configured catalog URL, or an error explaining how to set one
    pub fn api_url(&self) -> Result<&str> {
        self.pack
            .api_url
            .as_deref()
            .filter(|url| !url.is_empty())
            .ok_or_else(|| {
                Error::Other(
                    "No modpack API URL configured\n\n\
                     Hint: pass --api-url, set TECHNICPM_API_URL, or add\n\
                     [pack]\napi_url = \"https://api.technicpack.net/modpack/<slug>\"\n\
                     to the config file."
                        .to_string(),
                )
            })
    }
}
