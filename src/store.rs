//! Persistence of the installation snapshot between runs
//!
//! The snapshot is stored as a versioned JSON document next to the install:
//!
//! ```json
//! {
//!   "schema_version": 1,
//!   "generator": "technicpm 0.1.0",
//!   "saved_at": "2024-05-01T12:00:00+00:00",
//!   "snapshot": { "descriptor": {}, "components": [], "files": {}, "state": {} }
//! }
//! ```
//!
//! Saving writes a temporary file in the same directory and renames it over
//! the canonical path, so a crash never leaves a half-written state file.
//!
//! # Examples
//!
//! ```no_run
//! use technicpm::StateStore;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let store = StateStore::in_root("/srv/minecraft");
//! match store.load_or_discard()? {
//!     Some(snapshot) => println!("installed: {:?}", snapshot.state.installed_build()),
//!     None => println!("nothing installed yet"),
//! }
//! # Ok(())
//! # }
//! ```

use crate::snapshot::InstallationSnapshot;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// File name of the state file inside the install root
pub const STATE_FILE_NAME: &str = "modpack.state.json";

/// Current on-disk schema version
pub const SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Serialize)]
struct StateDocumentRef<'a> {
    schema_version: u32,
    generator: String,
    saved_at: String,
    snapshot: &'a InstallationSnapshot,
}

/// Only the header, so the version can be checked before decoding the body
#[derive(Debug, Deserialize)]
struct StateHeader {
    schema_version: u32,
}

#[derive(Debug, Deserialize)]
struct StateDocument {
    snapshot: InstallationSnapshot,
}

#[derive(Debug, Clone)]
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Store at the default location inside an install root
    pub fn in_root<P: AsRef<Path>>(root: P) -> Self {
        Self::new(root.as_ref().join(STATE_FILE_NAME))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Load the persisted snapshot
    ///
    /// Returns `Ok(None)` when no state file exists. A file that cannot be
    /// decoded, or whose file index assigns a path to two components, fails
    /// with [`Error::CorruptState`]; a file written under a different schema
    /// fails with [`Error::SchemaMismatch`].
    pub fn load(&self) -> Result<Option<InstallationSnapshot>> {
        if !self.path.exists() {
            return Ok(None);
        }

        let contents = fs::read_to_string(&self.path)
            .map_err(|e| Error::CorruptState(format!("{}: {}", self.path.display(), e)))?;

        let header: StateHeader = serde_json::from_str(&contents)
            .map_err(|e| Error::CorruptState(format!("{}: {}", self.path.display(), e)))?;

        if header.schema_version != SCHEMA_VERSION {
            return Err(Error::SchemaMismatch {
                found: header.schema_version,
                expected: SCHEMA_VERSION,
            });
        }

        let document: StateDocument = serde_json::from_str(&contents)
            .map_err(|e| Error::CorruptState(format!("{}: {}", self.path.display(), e)))?;
        document
            .snapshot
            .files
            .validate()
            .map_err(|e| Error::CorruptState(format!("{}: {}", self.path.display(), e)))?;

        Ok(Some(document.snapshot))
    }

    /// Load the snapshot, discarding an unreadable state file
    ///
    /// A corrupt or foreign-schema file is deleted and reported as absent, so
    /// the caller proceeds with a full reinstall instead of guessing at a
    /// partial structure.
    pub fn load_or_discard(&self) -> Result<Option<InstallationSnapshot>> {
        match self.load() {
            Ok(snapshot) => Ok(snapshot),
            Err(e @ (Error::CorruptState(_) | Error::SchemaMismatch { .. })) => {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %e,
                    "Discarding unreadable state file, the pack will be reinstalled"
                );
                self.discard()?;
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Atomically replace the state file with `snapshot`
    pub fn save(&self, snapshot: &InstallationSnapshot) -> Result<()> {
        let document = StateDocumentRef {
            schema_version: SCHEMA_VERSION,
            generator: format!("technicpm {}", env!("CARGO_PKG_VERSION")),
            saved_at: chrono::Utc::now().to_rfc3339(),
            snapshot,
        };
        let json = serde_json::to_string_pretty(&document)?;

        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir)?;

        let mut temp = NamedTempFile::new_in(&dir)?;
        temp.write_all(json.as_bytes())?;
        temp.as_file().sync_all()?;
        temp.persist(&self.path).map_err(|e| e.error)?;

        tracing::debug!(path = %self.path.display(), "State saved");
        Ok(())
    }

    /// Remove the state file if present
    pub fn discard(&self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::filesystem(&self.path, e)),
        }
    }
}
