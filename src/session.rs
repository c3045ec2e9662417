//! One install/update run, end to end
//!
//! load state → fetch descriptor → resolve target → merge → decide →
//! apply → save. The session owns no configuration of its own beyond what
//! it is handed in [`RunOptions`].

use crate::catalog::CatalogClient;
use crate::descriptor::PackDescriptor;
use crate::snapshot::InstallationSnapshot;
use crate::solder::{BuildPreference, BuildResolver};
use crate::state::InstallStatus;
use crate::store::StateStore;
use crate::updater::{blocking, resolve_target, UpdateReport, Updater};
use crate::Result;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Catalog URL of the pack descriptor
    pub api_url: String,
    pub preference: BuildPreference,
    /// Reinstall even when up to date, and update even with autoupdate off
    pub force: bool,
    pub autoupdate: bool,
}

/// What a run did
#[derive(Debug)]
pub enum RunOutcome {
    /// Installed build matches the target; nothing was touched
    UpToDate { build: String },
    /// An update exists but autoupdate is off and the run was not forced
    UpdateDeferred {
        installed: String,
        available: String,
    },
    Applied {
        build: String,
        status: InstallStatus,
        report: UpdateReport,
    },
}

pub struct Session {
    store: StateStore,
    catalog: Arc<dyn CatalogClient>,
    resolver: Arc<dyn BuildResolver>,
    updater: Updater,
}

impl Session {
    pub fn new(
        store: StateStore,
        catalog: Arc<dyn CatalogClient>,
        resolver: Arc<dyn BuildResolver>,
        updater: Updater,
    ) -> Self {
        Self {
            store,
            catalog,
            resolver,
            updater,
        }
    }

    pub fn store(&self) -> &StateStore {
        &self.store
    }

    pub async fn run(&self, options: &RunOptions) -> Result<RunOutcome> {
        // A snapshot that never finished a first install carries nothing worth merging
        let previous = self
            .store
            .load_or_discard()?
            .filter(|snapshot| snapshot.state.is_installed());

        let catalog = Arc::clone(&self.catalog);
        let api_url = options.api_url.clone();
        let bytes = blocking(move || catalog.fetch(&api_url)).await?;
        let descriptor = PackDescriptor::from_json(&bytes)?;
        tracing::info!(
            pack = %descriptor.display_name,
            name = %descriptor.name,
            user = %descriptor.user,
            minecraft = %descriptor.minecraft,
            "Identified modpack"
        );

        let resolver = Arc::clone(&self.resolver);
        let preference = options.preference.clone();
        let for_resolver = descriptor.clone();
        let target =
            blocking(move || resolve_target(&for_resolver, resolver.as_ref(), &preference))
                .await?;

        let mut snapshot = match previous {
            Some(mut snapshot) => {
                snapshot.refresh(descriptor, &target.build)?;
                snapshot
            }
            None => {
                tracing::info!("No previous installation found");
                InstallationSnapshot::new(descriptor)
            }
        };
        tracing::info!(status = %snapshot.status(), build = %target.build, "Checked installation");

        // Only a completed build is left running; a partially applied target
        // has no recorded build and is always finished
        let deferrable = snapshot.state.installed_build().map(str::to_string);
        if let Some(installed) = deferrable.filter(|_| {
            snapshot.status() == InstallStatus::Updatable && !options.force && !options.autoupdate
        }) {
            self.store.save(&snapshot)?;
            return Ok(RunOutcome::UpdateDeferred {
                installed,
                available: target.build,
            });
        }

        if !snapshot.state.needs_action(options.force) {
            self.store.save(&snapshot)?;
            return Ok(RunOutcome::UpToDate {
                build: target.build,
            });
        }

        let report = self
            .updater
            .apply(&mut snapshot, &target, options.force)
            .await?;
        self.store.save(&snapshot)?;

        Ok(RunOutcome::Applied {
            build: target.build,
            status: snapshot.status(),
            report,
        })
    }
}
