//! Removal of client-only mods after an install
//!
//! Client packs ship mods that crash or misbehave on a dedicated server
//! (renderers, HUD and menu tweaks). After the pack is in place, every entry
//! of `mods/` whose name the classifier flags is deleted.

use crate::{Error, Result};
use regex::{Regex, RegexBuilder};
use std::fs;
use std::path::{Path, PathBuf};

/// Patterns for mods known to be client-only, matched case-insensitively
/// against file names in `mods/`
pub const DEFAULT_CLIENT_ONLY: &[&str] = &[
    r"^optifine",
    r"^resource-?loader",
    r"^mouse-?tweaks",
    r"^inventory-?tweaks",
    r"^better-?foliage",
    r"^dynamic-?lights",
    r"^custom-?main-?menu",
    r"^controlling",
    r"^reauth",
    r"^sound-?filters",
    r"^ambient-?sounds",
    r"^fps-?reducer",
    r"^smooth-?font",
    r"^neat[-_ ]",
    r"^entityculling",
    r"^oculus",
    r"^rubidium",
];

pub trait ClientFileClassifier: Send + Sync {
    fn is_client_only(&self, file_name: &str) -> bool;
}

/// Regex blacklist classifier
#[derive(Debug, Clone)]
pub struct Blacklist {
    patterns: Vec<Regex>,
}

impl Blacklist {
    /// Build from the default patterns plus any extra ones
    pub fn new<S: AsRef<str>>(extra: &[S]) -> Result<Self> {
        let mut sources: Vec<&str> = DEFAULT_CLIENT_ONLY.to_vec();
        sources.extend(extra.iter().map(|s| s.as_ref()));

        let mut patterns = Vec::new();
        for source in sources {
            let regex = RegexBuilder::new(source)
                .case_insensitive(true)
                .build()
                .map_err(|e| {
                    Error::Other(format!("Invalid client-only pattern '{}': {}", source, e))
                })?;
            patterns.push(regex);
        }
        Ok(Self { patterns })
    }
}

impl ClientFileClassifier for Blacklist {
    fn is_client_only(&self, file_name: &str) -> bool {
        self.patterns.iter().any(|p| p.is_match(file_name))
    }
}

/// Delete client-only entries from `<root>/mods`, returning what was removed
///
/// Paths are returned relative to `root`. A missing `mods/` directory is not
/// an error. A failed deletion is logged and the scan continues.
pub fn clean_client_files(
    root: &Path,
    classifier: &dyn ClientFileClassifier,
) -> Result<Vec<PathBuf>> {
    let mods_dir = root.join("mods");
    let entries = match fs::read_dir(&mods_dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::warn!("No mods directory found, skipping client mod cleanup");
            return Ok(Vec::new());
        }
        Err(e) => return Err(Error::filesystem(&mods_dir, e)),
    };

    let mut removed = Vec::new();
    for entry in entries.flatten() {
        let name = entry.file_name().to_string_lossy().into_owned();
        if !classifier.is_client_only(&name) {
            continue;
        }

        let path = entry.path();
        let result = if path.is_dir() {
            fs::remove_dir_all(&path)
        } else {
            fs::remove_file(&path)
        };

        match result {
            Ok(()) => {
                tracing::info!(file = %name, "Deleted client-only mod");
                removed.push(Path::new("mods").join(&name));
            }
            Err(e) => {
                tracing::error!(file = %name, error = %e, "Could not delete client-only mod")
            }
        }
    }

    removed.sort();
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_blacklist() {
        let blacklist = Blacklist::new::<&str>(&[]).unwrap();

        assert!(blacklist.is_client_only("OptiFine_1.12.2_HD_U_E3.jar"));
        assert!(blacklist.is_client_only("MouseTweaks-2.10-mc1.12.2.jar"));
        assert!(blacklist.is_client_only("inventory-tweaks-1.63.jar"));
        assert!(!blacklist.is_client_only("ironchest-1.12.2-7.0.72.jar"));
        assert!(!blacklist.is_client_only("jei_1.12.2-4.16.1.jar"));
    }

    #[test]
    fn test_extra_patterns() {
        let blacklist = Blacklist::new(&["^journeymap"]).unwrap();
        assert!(blacklist.is_client_only("JourneyMap-5.7.1.jar"));
    }

    #[test]
    fn test_invalid_pattern() {
        assert!(Blacklist::new(&["("]).is_err());
    }

    #[test]
    fn test_clean_only_touches_mods_dir() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        fs::create_dir_all(root.join("mods/optifine-data")).unwrap();
        fs::write(root.join("mods/OptiFine.jar"), "x").unwrap();
        fs::write(root.join("mods/ironchest.jar"), "x").unwrap();
        fs::create_dir_all(root.join("config")).unwrap();
        fs::write(root.join("config/optifine.cfg"), "x").unwrap();

        let blacklist = Blacklist::new::<&str>(&[]).unwrap();
        let removed = clean_client_files(root, &blacklist).unwrap();

        assert_eq!(
            removed,
            vec![
                PathBuf::from("mods/OptiFine.jar"),
                PathBuf::from("mods/optifine-data")
            ]
        );
        assert!(root.join("mods/ironchest.jar").exists());
        assert!(root.join("config/optifine.cfg").exists());
    }

    #[test]
    fn test_missing_mods_dir() {
        let temp_dir = TempDir::new().unwrap();
        let blacklist = Blacklist::new::<&str>(&[]).unwrap();
        assert!(clean_client_files(temp_dir.path(), &blacklist).unwrap().is_empty());
    }
}
