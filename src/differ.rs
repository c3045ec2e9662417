//! Snapshot differ
//!
//! Compares the installed component set against a freshly resolved one.
//! Identity is by name; a component whose version string changed is removed
//! in full and fetched again, never patched in place.

use crate::component::{Component, ComponentSet};
use std::collections::BTreeSet;

/// The three groups produced by [`diff`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SnapshotDiff {
    /// Installed components that are gone or changed (old versions)
    pub to_remove: ComponentSet,
    /// File-index owners to purge; always equal to `to_remove`
    pub to_clear: ComponentSet,
    /// Components to fetch: new ones plus the new versions of changed ones
    pub to_download: ComponentSet,
}

impl SnapshotDiff {
    /// Names present in both removal and download, i.e. changed versions
    pub fn changed(&self) -> BTreeSet<&str> {
        self.to_remove
            .iter()
            .filter(|c| self.to_download.contains(*c))
            .map(|c| c.name.as_str())
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.to_remove.is_empty() && self.to_download.is_empty()
    }
}

/// Compute what has to be removed and downloaded to go from `old` to `new`
///
/// Versions are compared as plain strings, so `1.0` and `1.0.0` count as a
/// change. The result does not depend on iteration order of the inputs.
pub fn diff(old: &ComponentSet, new: &ComponentSet) -> SnapshotDiff {
    let mut to_remove = ComponentSet::new();
    let mut to_download = ComponentSet::new();

    for installed in old {
        match new.get(installed) {
            None => {
                to_remove.insert(installed.clone());
            }
            Some(target) if !target.same_version(installed) => {
                to_remove.insert(installed.clone());
                to_download.insert(target.clone());
            }
            Some(_) => {}
        }
    }

    to_download.extend(new.iter().filter(|c| !old.contains(*c)).cloned());

    SnapshotDiff {
        to_clear: to_remove.clone(),
        to_remove,
        to_download,
    }
}

/// Plan for a full reinstall: clear everything recorded, fetch everything targeted
pub fn reinstall(old: &ComponentSet, new: &ComponentSet) -> SnapshotDiff {
    SnapshotDiff {
        to_remove: old.clone(),
        to_clear: old.clone(),
        to_download: new.clone(),
    }
}

/// Names in a set, for logs
pub fn names(set: &ComponentSet) -> Vec<&str> {
    set.iter().map(|c: &Component| c.name.as_str()).collect()
}
