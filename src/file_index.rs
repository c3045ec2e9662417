//! Record of which files each installed component placed on disk
//!
//! The index is the authority for safe deletion: when a component is removed
//! or replaced, exactly the paths recorded for it are deleted. Paths are
//! relative to the install root.
//!
//! No two owners may claim the same path. [`InstalledFileIndex::record_files`]
//! rejects a claim on a path that belongs to someone else instead of letting
//! one component's removal delete another component's files later on.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InstalledFileIndex {
    owners: BTreeMap<String, BTreeSet<PathBuf>>,
}

impl InstalledFileIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the files an owner placed on disk, replacing any previous entry
    ///
    /// Fails with [`Error::FileOwnershipConflict`] if one of the paths is
    /// owned by a different owner; the index is left unchanged in that case.
    pub fn record_files(&mut self, owner: &str, paths: BTreeSet<PathBuf>) -> Result<()> {
        if let Some((path, other)) = self.conflicts(owner, &paths) {
            return Err(Error::FileOwnershipConflict {
                path,
                owner: other,
                claimant: owner.to_string(),
            });
        }

        self.owners.insert(owner.to_string(), paths);
        Ok(())
    }

    /// First path in `paths` that is already owned by someone other than `owner`
    pub fn conflicts(&self, owner: &str, paths: &BTreeSet<PathBuf>) -> Option<(PathBuf, String)> {
        self.owners
            .iter()
            .filter(|(name, _)| name.as_str() != owner)
            .find_map(|(name, owned)| {
                paths
                    .intersection(owned)
                    .next()
                    .map(|path| (path.clone(), name.clone()))
            })
    }

    /// Check that no path is claimed by two owners
    ///
    /// [`InstalledFileIndex::record_files`] keeps this true, but an index
    /// decoded from disk has not been through it.
    pub fn validate(&self) -> Result<()> {
        let mut seen: BTreeMap<&Path, &str> = BTreeMap::new();
        for (owner, paths) in &self.owners {
            for path in paths {
                if let Some(first) = seen.insert(path.as_path(), owner.as_str()) {
                    return Err(Error::FileOwnershipConflict {
                        path: path.clone(),
                        owner: first.to_string(),
                        claimant: owner.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Files recorded for an owner; empty if the owner is unknown
    pub fn files_of(&self, owner: &str) -> BTreeSet<PathBuf> {
        self.owners.get(owner).cloned().unwrap_or_default()
    }

    /// Drop an owner's entry, returning the paths it held
    pub fn forget(&mut self, owner: &str) -> BTreeSet<PathBuf> {
        self.owners.remove(owner).unwrap_or_default()
    }

    /// Keep only `remaining` for an owner after a partial deletion
    pub fn retain_files(&mut self, owner: &str, remaining: &BTreeSet<PathBuf>) {
        if let Some(owned) = self.owners.get_mut(owner) {
            owned.retain(|path| remaining.contains(path));
            if owned.is_empty() {
                self.owners.remove(owner);
            }
        }
    }

    /// Owner of a path, if any
    pub fn owner_of(&self, path: &Path) -> Option<&str> {
        self.owners
            .iter()
            .find(|(_, owned)| owned.contains(path))
            .map(|(name, _)| name.as_str())
    }

    pub fn owners(&self) -> impl Iterator<Item = &str> {
        self.owners.keys().map(String::as_str)
    }

    pub fn contains_owner(&self, owner: &str) -> bool {
        self.owners.contains_key(owner)
    }

    pub fn len(&self) -> usize {
        self.owners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.owners.is_empty()
    }

    /// Total number of recorded files across all owners
    pub fn file_count(&self) -> usize {
        self.owners.values().map(BTreeSet::len).sum()
    }
}
