//! Installation state machine
//!
//! | from | call | to |
//! | --- | --- | --- |
//! | any | `complete(build)` | `UpToDate` |
//! | any | `mark_incomplete()` | `Updatable` |
//! | `UpToDate`/`Updatable` | `refresh(target)` | `UpToDate` if equal, else `Updatable` |
//! | `NotInstalled` | `refresh(target)` | error: `InvalidState` |
//!
//! Fields are private; orchestration code can only move the state through
//! the transition methods.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstallStatus {
    /// Nothing has been installed yet
    NotInstalled,
    /// The installed build equals the resolved target build
    UpToDate,
    /// The installed build differs from the target, or the last run was partial
    Updatable,
}

impl std::fmt::Display for InstallStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            InstallStatus::NotInstalled => "not installed",
            InstallStatus::UpToDate => "up to date",
            InstallStatus::Updatable => "update available",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallationState {
    status: InstallStatus,
    installed_build: Option<String>,
}

impl Default for InstallationState {
    fn default() -> Self {
        Self::new()
    }
}

impl InstallationState {
    pub fn new() -> Self {
        Self {
            status: InstallStatus::NotInstalled,
            installed_build: None,
        }
    }

    pub fn status(&self) -> InstallStatus {
        self.status
    }

    /// Build identifier of the last fully successful install
    pub fn installed_build(&self) -> Option<&str> {
        self.installed_build.as_deref()
    }

    pub fn is_installed(&self) -> bool {
        self.status != InstallStatus::NotInstalled
    }

    /// Re-evaluate against a freshly resolved target build
    ///
    /// Comparison is byte for byte. Calling this on a `NotInstalled` state is
    /// a contract violation: there is nothing installed to compare with.
    pub fn refresh(&mut self, target_build: &str) -> Result<()> {
        if self.status == InstallStatus::NotInstalled {
            return Err(Error::InvalidState(
                "cannot refresh a pack that is not installed".to_string(),
            ));
        }

        self.status = if self.installed_build.as_deref() == Some(target_build) {
            InstallStatus::UpToDate
        } else {
            InstallStatus::Updatable
        };
        Ok(())
    }

    /// The whole target build was applied
    pub fn complete(&mut self, build: impl Into<String>) {
        self.status = InstallStatus::UpToDate;
        self.installed_build = Some(build.into());
    }

    /// Part of the target was applied
    ///
    /// What is on disk is neither the previous build nor the target, so the
    /// recorded build is cleared and every later refresh reports `Updatable`
    /// until a run completes.
    pub fn mark_incomplete(&mut self) {
        self.status = InstallStatus::Updatable;
        self.installed_build = None;
    }

    /// Whether a run has to touch the install
    pub fn needs_action(&self, force: bool) -> bool {
        force || self.status != InstallStatus::UpToDate
    }
}
