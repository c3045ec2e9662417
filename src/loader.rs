//! Mod-loader conversion step
//!
//! Technic client packs carry their loader as `bin/modpack.jar`. A server
//! needs that jar at the install root, the vanilla server jar of the pack's
//! Minecraft version next to it, and usually a loader installer run once
//! after all mods are in place. This happens once per install or update,
//! never per component.

use crate::archive::is_plain_segment;
use crate::component::DownloadLocator;
use crate::{Error, Result};
use std::fs;
use std::path::Path;
use std::process::{Command, Stdio};

/// Where vanilla server jars are published; `{version}` is the Minecraft version
pub const DEFAULT_SERVER_JAR_URL: &str =
    "https://s3.amazonaws.com/Minecraft.Download/versions/{version}/minecraft_server.{version}.jar";

/// The vanilla server jar a pack runs on
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerJar {
    pub locator: DownloadLocator,
    /// Stored under this name in the install root
    pub file_name: String,
}

impl ServerJar {
    /// Fill `template` in for a Minecraft version
    pub fn for_version(template: &str, minecraft: &str) -> Result<Self> {
        let file_name = format!("minecraft_server.{}.jar", minecraft);
        if minecraft.is_empty() || !is_plain_segment(&file_name) {
            return Err(Error::Loader(format!(
                "unusable Minecraft version '{}'",
                minecraft
            )));
        }

        let url = template.replace("{version}", &urlencoding::encode(minecraft));
        Ok(Self {
            locator: DownloadLocator::new(url),
            file_name,
        })
    }
}

/// Converts an installed client pack into something a server can launch
pub trait LoaderInstaller: Send + Sync {
    fn install(&self, root: &Path) -> Result<()>;
}

/// Promotes `bin/modpack.jar` and optionally runs a configured installer
#[derive(Debug, Clone, Default)]
pub struct ModpackJarInstaller {
    /// Program and arguments, run with the install root as working directory
    command: Option<Vec<String>>,
}

impl ModpackJarInstaller {
    pub fn new(command: Option<Vec<String>>) -> Self {
        Self {
            command: command.filter(|c| !c.is_empty()),
        }
    }

    fn run_command(&self, root: &Path, argv: &[String]) -> Result<()> {
        let (program, args) = argv
            .split_first()
            .ok_or_else(|| Error::Loader("empty loader command".to_string()))?;

        tracing::info!(command = %argv.join(" "), "Running mod loader installer");

        let output = Command::new(program)
            .args(args)
            .current_dir(root)
            .stdin(Stdio::null())
            .output()
            .map_err(|e| Error::Loader(format!("failed to start '{}': {}", program, e)))?;

        if output.status.success() {
            return Ok(());
        }

        // The tail of stderr is usually where the reason is
        let stderr = String::from_utf8_lossy(&output.stderr);
        let lines: Vec<&str> = stderr.lines().collect();
        let tail = lines[lines.len().saturating_sub(10)..].join("\n");
        Err(Error::Loader(format!(
            "'{}' exited with {}\n{}",
            program, output.status, tail
        )))
    }
}

impl LoaderInstaller for ModpackJarInstaller {
    fn install(&self, root: &Path) -> Result<()> {
        let source = root.join("bin").join("modpack.jar");
        if source.exists() {
            let target = root.join("modpack.jar");
            fs::copy(&source, &target).map_err(|e| Error::filesystem(&target, e))?;
            tracing::info!("Copied bin/modpack.jar to the install root");
        } else {
            tracing::debug!("Pack has no bin/modpack.jar");
        }

        match &self.command {
            Some(argv) => self.run_command(root, argv),
            None => Ok(()),
        }
    }
}
