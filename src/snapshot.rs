//! The durable installation record
//!
//! A snapshot bundles everything needed to decide on the next run what to
//! delete and what to fetch: the descriptor the install was made from, the
//! components that are actually on disk, the files each of them owns, and
//! the state machine.

use crate::component::ComponentSet;
use crate::descriptor::PackDescriptor;
use crate::file_index::InstalledFileIndex;
use crate::state::{InstallStatus, InstallationState};
use crate::Result;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstallationSnapshot {
    pub descriptor: PackDescriptor,
    /// Components currently on disk, at the versions that were installed
    pub components: ComponentSet,
    pub files: InstalledFileIndex,
    pub state: InstallationState,
}

impl InstallationSnapshot {
    /// Snapshot for a pack that has never been installed
    pub fn new(descriptor: PackDescriptor) -> Self {
        Self {
            descriptor,
            components: ComponentSet::new(),
            files: InstalledFileIndex::new(),
            state: InstallationState::new(),
        }
    }

    /// Merge a freshly fetched descriptor and re-evaluate the state
    ///
    /// The descriptor is replaced wholesale. Fails with `InvalidState` on a
    /// snapshot that is not installed.
    pub fn refresh(&mut self, descriptor: PackDescriptor, target_build: &str) -> Result<()> {
        self.state.refresh(target_build)?;
        self.descriptor = descriptor;
        Ok(())
    }

    pub fn status(&self) -> InstallStatus {
        self.state.status()
    }
}
