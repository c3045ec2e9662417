//! technicpm - install and update Technic modpacks on a server
//!
//! A pack is published on the Technic platform either as one archive
//! (monolithic) or as a list of independently versioned mods served by a
//! Solder build service (componentized). technicpm installs the pack into a
//! server directory and keeps it current:
//!
//! - Tracks which files belong to which mod, so removed or changed mods are
//!   deleted cleanly before their replacement is extracted
//! - Refuses to let two mods claim the same file
//! - Downloads and extracts mods in parallel, containing failures to the mod
//!   that raised them and retrying those on the next run
//! - Persists the installation as a versioned JSON document, replaced atomically
//! - Promotes the pack's mod loader, fetches the matching Minecraft server
//!   jar and removes client-only mods
//!
//! # Examples
//!
//! ```no_run
//! use std::sync::Arc;
//! use technicpm::{
//!     ArchiveExtractor, BuildPreference, Collaborators, HttpCatalogClient, HttpDownloader,
//!     ModpackJarInstaller, RunOptions, Session, SolderClient, StateStore, Updater,
//!     UpdaterConfig,
//! };
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let updater = Updater::new(
//!     UpdaterConfig::new("/srv/minecraft"),
//!     Collaborators {
//!         downloader: Arc::new(HttpDownloader::new()?),
//!         extractor: Arc::new(ArchiveExtractor::new()),
//!         loader: Arc::new(ModpackJarInstaller::new(None)),
//!         classifier: None,
//!     },
//! );
//! let session = Session::new(
//!     StateStore::in_root("/srv/minecraft"),
//!     Arc::new(HttpCatalogClient::new("999")?),
//!     Arc::new(SolderClient::new()?),
//!     updater,
//! );
//!
//! let options = RunOptions {
//!     api_url: "https://api.technicpack.net/modpack/tekkit-legends".to_string(),
//!     preference: BuildPreference::Recommended,
//!     force: false,
//!     autoupdate: true,
//! };
//! let outcome = tokio::runtime::Runtime::new()?.block_on(session.run(&options))?;
//! println!("{:?}", outcome);
//! # Ok(())
//! # }
//! ```
//!
//! # Modules
//!
//! - [`descriptor`] - Pack descriptors as published by the catalog
//! - [`component`] - Mod records and their download locations
//! - [`file_index`] - Which installed file belongs to which mod
//! - [`differ`] - What to remove and what to download between two builds
//! - [`state`] - Installation state machine
//! - [`snapshot`] - The persisted installation record
//! - [`store`] - Loading and atomically saving the snapshot
//! - [`catalog`], [`solder`], [`transfer`], [`archive`], [`loader`], [`cleanup`] -
//!   Collaborators the updater drives
//! - [`updater`] - The update orchestrator
//! - [`session`] - One run, end to end
//! - [`config`] - User configuration
//! - [`error`] - Error types and result handling

pub mod archive;
pub mod catalog;
pub mod cleanup;
pub mod component;
pub mod config;
pub mod descriptor;
pub mod differ;
pub mod error;
pub mod file_index;
pub mod loader;
pub mod session;
pub mod snapshot;
pub mod solder;
pub mod state;
pub mod store;
pub mod transfer;
pub mod updater;

pub use archive::{ArchiveExtractor, Extractor};
pub use catalog::{CatalogClient, HttpCatalogClient};
pub use cleanup::{clean_client_files, Blacklist, ClientFileClassifier};
pub use component::{Component, ComponentSet, DownloadLocator, MONOLITHIC_OWNER};
pub use config::Config;
pub use descriptor::{CatalogEndpoint, PackDescriptor, Resource};
pub use differ::{diff, SnapshotDiff};
pub use error::{Error, Result};
pub use file_index::InstalledFileIndex;
pub use loader::{LoaderInstaller, ModpackJarInstaller, ServerJar, DEFAULT_SERVER_JAR_URL};
pub use session::{RunOptions, RunOutcome, Session};
pub use snapshot::InstallationSnapshot;
pub use solder::{BuildPreference, BuildResolver, ResolvedBuild, SolderClient};
pub use state::{InstallStatus, InstallationState};
pub use store::{StateStore, SCHEMA_VERSION, STATE_FILE_NAME};
pub use transfer::{Downloader, HttpDownloader};
pub use updater::{
    resolve_target, Collaborators, ComponentFailure, ProgressCallback, Target, UpdateReport,
    Updater, UpdaterConfig,
};
