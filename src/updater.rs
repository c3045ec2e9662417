//! Update orchestrator
//!
//! Given the recorded snapshot and a resolved [`Target`], the updater works
//! out which components to drop and which to fetch, then runs the phases in
//! a fixed order:
//!
//! 1. delete the files of removed or changed components
//! 2. download the archives of new or changed components
//! 3. check that no archive would overwrite a file owned by someone else
//! 4. extract into the install root and record ownership
//! 5. move the state machine
//! 6. icon, mod loader with its server jar, and client-only cleanup, once
//!    per run
//!
//! Work inside a phase runs in parallel, one blocking task per component,
//! bounded by `max_parallel`. A failing component never aborts the run; it
//! is reported and left for the next run to retry. The snapshot is mutated
//! in place and persisting it is up to the caller.

use crate::archive::{self, Extractor};
use crate::cleanup::{clean_client_files, ClientFileClassifier};
use crate::component::{same_components, Component, ComponentSet, DownloadLocator};
use crate::descriptor::PackDescriptor;
use crate::differ::{self, SnapshotDiff};
use crate::loader::{LoaderInstaller, ServerJar};
use crate::snapshot::InstallationSnapshot;
use crate::solder::{BuildPreference, BuildResolver};
use crate::transfer::Downloader;
use crate::{Error, Result};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// Progress callback: message, items done, items total
pub type ProgressCallback = Arc<dyn Fn(&str, u64, u64) + Send + Sync>;

/// File name the pack icon is stored under, where server software looks for it
pub const ICON_FILE_NAME: &str = "server-icon.png";

/// What a run should end up with
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub build: String,
    pub components: ComponentSet,
}

/// Resolve the target build of a pack
///
/// A monolithic pack resolves to its version and the single `package`
/// pseudo-component. A componentized pack asks the build resolver.
pub fn resolve_target(
    descriptor: &PackDescriptor,
    resolver: &dyn BuildResolver,
    preference: &BuildPreference,
) -> Result<Target> {
    match &descriptor.endpoint {
        None => {
            let package = descriptor.monolithic_component()?;
            Ok(Target {
                build: descriptor.version.clone(),
                components: ComponentSet::from([package]),
            })
        }
        Some(endpoint) => {
            let resolved = resolver.resolve(endpoint, &descriptor.name, preference)?;
            Ok(Target {
                build: resolved.build,
                components: resolved.components,
            })
        }
    }
}

#[derive(Debug, Clone)]
pub struct UpdaterConfig {
    /// Install root; every recorded path is relative to it
    pub root: PathBuf,
    /// Archive cache, relative to `root` unless absolute
    pub cache_dir: PathBuf,
    pub max_parallel: usize,
    pub download_icon: bool,
    /// Vanilla server jar URL template, see [`ServerJar`]; `None` skips the jar
    pub server_jar_url: Option<String>,
}

impl UpdaterConfig {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            cache_dir: PathBuf::from("cache"),
            max_parallel: 4,
            download_icon: true,
            server_jar_url: None,
        }
    }

    fn cache_root(&self) -> PathBuf {
        if self.cache_dir.is_absolute() {
            self.cache_dir.clone()
        } else {
            self.root.join(&self.cache_dir)
        }
    }
}

/// The external primitives the updater drives
#[derive(Clone)]
pub struct Collaborators {
    pub downloader: Arc<dyn Downloader>,
    pub extractor: Arc<dyn Extractor>,
    pub loader: Arc<dyn LoaderInstaller>,
    /// `None` disables client-only cleanup
    pub classifier: Option<Arc<dyn ClientFileClassifier>>,
}

/// A component that could not be processed this run
#[derive(Debug)]
pub struct ComponentFailure {
    pub component: String,
    pub error: Error,
}

/// Outcome of one [`Updater::apply`] call
#[derive(Debug, Default)]
pub struct UpdateReport {
    pub removed: Vec<String>,
    pub downloaded: Vec<String>,
    pub installed: Vec<String>,
    pub failures: Vec<ComponentFailure>,
    /// Client-only files deleted after the install, relative to the root
    pub cleaned: Vec<PathBuf>,
    pub loader_error: Option<Error>,
}

impl UpdateReport {
    /// Nothing was attempted
    pub fn is_noop(&self) -> bool {
        self.removed.is_empty()
            && self.downloaded.is_empty()
            && self.installed.is_empty()
            && self.failures.is_empty()
            && self.loader_error.is_none()
    }

    /// Every attempted step succeeded
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty() && self.loader_error.is_none()
    }

    fn fail(&mut self, component: &str, error: Error) {
        tracing::error!(component = %component, error = %error, "Component failed");
        self.failures.push(ComponentFailure {
            component: component.to_string(),
            error,
        });
    }
}

/// Files of one component left behind by a failed deletion
struct Leftover {
    remaining: BTreeSet<PathBuf>,
    error: Error,
}

pub struct Updater {
    config: UpdaterConfig,
    collaborators: Collaborators,
    progress: Option<ProgressCallback>,
}

impl Updater {
    pub fn new(config: UpdaterConfig, collaborators: Collaborators) -> Self {
        Self {
            config,
            collaborators,
            progress: None,
        }
    }

    pub fn with_progress(mut self, progress: ProgressCallback) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn config(&self) -> &UpdaterConfig {
        &self.config
    }

    fn report_progress(&self, message: &str, current: u64, total: u64) {
        if let Some(progress) = &self.progress {
            progress(message, current, total);
        }
    }

    /// Bring `snapshot` to `target`
    ///
    /// Returns an empty report without touching anything when the snapshot
    /// is up to date and `force` is not set. Per-component failures end up
    /// in the report; only failures to run the phases at all are returned
    /// as errors.
    pub async fn apply(
        &self,
        snapshot: &mut InstallationSnapshot,
        target: &Target,
        force: bool,
    ) -> Result<UpdateReport> {
        let mut report = UpdateReport::default();

        if !snapshot.state.needs_action(force) {
            tracing::debug!(build = %target.build, "Installation is up to date");
            return Ok(report);
        }

        let plan = self.plan(snapshot, target, force);
        tracing::info!(
            build = %target.build,
            remove = ?differ::names(&plan.to_remove),
            download = ?differ::names(&plan.to_download),
            "Planned update"
        );

        let blocked = self.delete_phase(snapshot, &plan, &mut report).await;

        let wanted: Vec<Component> = plan
            .to_download
            .iter()
            .filter(|c| {
                let skip = blocked.contains(&c.name);
                if skip {
                    tracing::warn!(
                        component = %c.name,
                        "Old version could not be fully removed, skipping download"
                    );
                }
                !skip
            })
            .cloned()
            .collect();

        let fetched = self.download_phase(wanted, &mut report).await;
        let accepted = preflight(snapshot, fetched, &mut report);
        self.extract_phase(snapshot, accepted, &mut report).await;

        if same_components(&snapshot.components, &target.components) {
            snapshot.state.complete(target.build.clone());
            tracing::info!(build = %target.build, "Installation complete");
        } else {
            snapshot.state.mark_incomplete();
            tracing::warn!(
                build = %target.build,
                failed = report.failures.len(),
                "Installation incomplete, remaining components will be retried on the next run"
            );
        }

        if !report.installed.is_empty() {
            self.post_install(&snapshot.descriptor, &mut report).await;
        }

        report.removed.sort();
        report.downloaded.sort();
        report.installed.sort();
        Ok(report)
    }

    fn plan(&self, snapshot: &InstallationSnapshot, target: &Target, force: bool) -> SnapshotDiff {
        if !snapshot.state.is_installed() {
            differ::reinstall(&ComponentSet::new(), &target.components)
        } else if force {
            differ::reinstall(&snapshot.components, &target.components)
        } else {
            differ::diff(&snapshot.components, &target.components)
        }
    }

    /// Returns the names of components whose files could not all be deleted
    async fn delete_phase(
        &self,
        snapshot: &mut InstallationSnapshot,
        plan: &SnapshotDiff,
        report: &mut UpdateReport,
    ) -> BTreeSet<String> {
        let jobs: Vec<(Component, BTreeSet<PathBuf>)> = plan
            .to_clear
            .iter()
            .map(|c| (c.clone(), snapshot.files.files_of(&c.name)))
            .collect();

        let root = self.config.root.clone();
        let results = self
            .fan_out("Removing", jobs, move |(_, files)| {
                delete_files(&root, &files)
            })
            .await;

        let mut blocked = BTreeSet::new();
        for ((component, _), result) in results {
            match result {
                Ok(None) => {
                    snapshot.files.forget(&component.name);
                    snapshot.components.remove(&component);
                    tracing::info!(component = %component.label(), "Removed");
                    report.removed.push(component.name);
                }
                Ok(Some(leftover)) => {
                    snapshot
                        .files
                        .retain_files(&component.name, &leftover.remaining);
                    report.fail(&component.name, leftover.error);
                    blocked.insert(component.name);
                }
                Err(e) => {
                    report.fail(&component.name, e);
                    blocked.insert(component.name);
                }
            }
        }
        blocked
    }

    /// Download and list each archive; returns the archives with their entries
    async fn download_phase(
        &self,
        wanted: Vec<Component>,
        report: &mut UpdateReport,
    ) -> Vec<(Component, PathBuf, BTreeSet<PathBuf>)> {
        let cache_root = self.config.cache_root();
        let downloader = Arc::clone(&self.collaborators.downloader);
        let extractor = Arc::clone(&self.collaborators.extractor);

        let results = self
            .fan_out("Downloading", wanted, move |component: Component| {
                let archive = cache_path(&cache_root, &component)?;
                let bytes = downloader
                    .download(&component.locator, &archive)
                    .map_err(|e| transfer_error(&component.name, e))?;
                tracing::debug!(component = %component.label(), bytes, "Fetched archive");

                let contents = extractor
                    .list_contents(&archive)
                    .map_err(|e| extract_error(&component.name, e))?;
                Ok((archive, contents))
            })
            .await;

        let mut fetched = Vec::new();
        for (component, result) in results {
            match result {
                Ok((archive, contents)) => {
                    report.downloaded.push(component.name.clone());
                    fetched.push((component, archive, contents));
                }
                Err(e) => report.fail(&component.name, e),
            }
        }
        fetched
    }

    async fn extract_phase(
        &self,
        snapshot: &mut InstallationSnapshot,
        accepted: Vec<(Component, PathBuf)>,
        report: &mut UpdateReport,
    ) {
        let root = self.config.root.clone();
        let extractor = Arc::clone(&self.collaborators.extractor);

        let results = self
            .fan_out("Extracting", accepted, move |(component, archive)| {
                extractor
                    .extract(&archive, &root)
                    .map_err(|e| extract_error(&component.name, e))
            })
            .await;

        for ((component, archive), result) in results {
            let recorded = result
                .and_then(|paths| snapshot.files.record_files(&component.name, paths));
            match recorded {
                Ok(()) => {
                    tracing::info!(component = %component.label(), "Installed");
                    report.installed.push(component.name.clone());
                    snapshot.components.replace(component);
                    if let Err(e) = fs::remove_file(&archive) {
                        tracing::debug!(archive = %archive.display(), error = %e, "Could not drop cached archive");
                    }
                }
                Err(e) => report.fail(&component.name, e),
            }
        }
    }

    async fn post_install(&self, descriptor: &PackDescriptor, report: &mut UpdateReport) {
        let root = self.config.root.clone();

        if let Some(icon) = descriptor.icon.as_ref().filter(|_| self.config.download_icon) {
            let downloader = Arc::clone(&self.collaborators.downloader);
            let locator = DownloadLocator::new(icon.url.clone());
            let dest = root.join(ICON_FILE_NAME);
            match blocking(move || downloader.download(&locator, &dest)).await {
                Ok(_) => tracing::info!("Saved pack icon as {}", ICON_FILE_NAME),
                Err(e) => tracing::warn!(error = %e, "Could not download pack icon"),
            }
        }

        self.report_progress("Installing mod loader", 0, 1);
        let loader = Arc::clone(&self.collaborators.loader);
        let loader_root = root.clone();
        let installed = match blocking(move || loader.install(&loader_root)).await {
            Ok(()) => self.fetch_server_jar(descriptor).await,
            Err(e) => Err(e),
        };
        match installed {
            Ok(()) => self.report_progress("Installed mod loader", 1, 1),
            Err(e) => {
                tracing::error!(error = %e, "Mod loader installation failed");
                report.loader_error = Some(e);
            }
        }

        if let Some(classifier) = &self.collaborators.classifier {
            let classifier = Arc::clone(classifier);
            match blocking(move || clean_client_files(&root, classifier.as_ref())).await {
                Ok(cleaned) => report.cleaned = cleaned,
                Err(e) => tracing::warn!(error = %e, "Client-only cleanup failed"),
            }
        }
    }

    /// Download the vanilla server jar for the pack's Minecraft version
    ///
    /// Jars are named by version, so an existing file is kept.
    async fn fetch_server_jar(&self, descriptor: &PackDescriptor) -> Result<()> {
        let Some(template) = &self.config.server_jar_url else {
            return Ok(());
        };
        let jar = ServerJar::for_version(template, &descriptor.minecraft)?;
        let dest = self.config.root.join(&jar.file_name);
        if dest.exists() {
            tracing::debug!(jar = %jar.file_name, "Minecraft server jar already present");
            return Ok(());
        }

        self.report_progress("Downloading Minecraft server", 0, 1);
        let downloader = Arc::clone(&self.collaborators.downloader);
        let locator = jar.locator.clone();
        blocking(move || downloader.download(&locator, &dest))
            .await
            .map_err(|e| {
                Error::Loader(format!(
                    "could not download Minecraft {} server from {}: {}",
                    descriptor.minecraft, jar.locator.url, e
                ))
            })?;
        tracing::info!(jar = %jar.file_name, "Saved Minecraft server jar");
        Ok(())
    }

    /// Run `work` for every item on the blocking pool, at most
    /// `max_parallel` at a time, and collect the results sorted by item
    ///
    /// Every item gets a result. Work that panics, or a task lost to the
    /// join set, yields an error for its item.
    async fn fan_out<I, R, F>(&self, phase: &'static str, items: Vec<I>, work: F) -> Vec<(I, Result<R>)>
    where
        I: Clone + Ord + Send + 'static,
        R: Send + 'static,
        F: Fn(I) -> Result<R> + Send + Sync + 'static,
    {
        let total = items.len() as u64;
        let work = Arc::new(work);
        let semaphore = Arc::new(Semaphore::new(self.config.max_parallel.max(1)));
        let mut pending: BTreeSet<I> = items.iter().cloned().collect();
        let mut tasks = JoinSet::new();

        for item in items {
            let work = Arc::clone(&work);
            let semaphore = Arc::clone(&semaphore);
            tasks.spawn(async move {
                let _permit = semaphore.acquire_owned().await.ok();
                let key = item.clone();
                let result = match tokio::task::spawn_blocking(move || work(item)).await {
                    Ok(result) => result,
                    Err(e) => Err(Error::Other(format!("{} task failed: {}", phase, e))),
                };
                (key, result)
            });
        }

        let mut results = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((key, result)) => {
                    pending.remove(&key);
                    results.push((key, result));
                    self.report_progress(phase, results.len() as u64, total);
                }
                Err(e) => tracing::warn!(phase, error = %e, "Task panicked"),
            }
        }

        for key in pending {
            results.push((key, Err(Error::Other(format!("{} task did not finish", phase)))));
        }

        results.sort_by(|a, b| a.0.cmp(&b.0));
        results
    }
}

/// Run blocking collaborator code off the async workers
pub(crate) async fn blocking<R, F>(work: F) -> Result<R>
where
    R: Send + 'static,
    F: FnOnce() -> Result<R> + Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| Error::Other(format!("task failed: {}", e)))?
}

/// `cache_root/<name>/<file name>`
///
/// Both segments come from the remote build listing and must stay inside
/// the cache.
fn cache_path(cache_root: &Path, component: &Component) -> Result<PathBuf> {
    let file_name = component
        .locator
        .file_name()
        .map(str::to_string)
        .unwrap_or_else(|| format!("{}.zip", component.name));

    for segment in [component.name.as_str(), file_name.as_str()] {
        if !archive::is_plain_segment(segment) {
            return Err(Error::Transfer {
                component: component.name.clone(),
                reason: format!("refusing to cache under unsafe name '{}'", segment),
            });
        }
    }
    Ok(cache_root.join(&component.name).join(file_name))
}

fn transfer_error(component: &str, error: Error) -> Error {
    match error {
        Error::Transfer { reason, .. } => Error::Transfer {
            component: component.to_string(),
            reason,
        },
        other => Error::Transfer {
            component: component.to_string(),
            reason: other.to_string(),
        },
    }
}

fn extract_error(component: &str, error: Error) -> Error {
    match error {
        Error::Extract { reason, .. } => Error::Extract {
            component: component.to_string(),
            reason,
        },
        e @ Error::Filesystem { .. } => e,
        other => Error::Extract {
            component: component.to_string(),
            reason: other.to_string(),
        },
    }
}

/// Keep archives that claim no file owned by another component
///
/// Archives are checked in name order, so within one batch the first
/// claimant of a path wins.
fn preflight(
    snapshot: &InstallationSnapshot,
    fetched: Vec<(Component, PathBuf, BTreeSet<PathBuf>)>,
    report: &mut UpdateReport,
) -> Vec<(Component, PathBuf)> {
    let mut claimed: BTreeMap<PathBuf, String> = BTreeMap::new();
    let mut accepted = Vec::new();

    for (component, archive, contents) in fetched {
        let conflict = snapshot
            .files
            .conflicts(&component.name, &contents)
            .or_else(|| {
                contents
                    .iter()
                    .find_map(|p| claimed.get(p).map(|owner| (p.clone(), owner.clone())))
            });

        if let Some((path, owner)) = conflict {
            let error = Error::FileOwnershipConflict {
                path,
                owner,
                claimant: component.name.clone(),
            };
            report.fail(&component.name, error);
            continue;
        }

        for path in contents {
            claimed.insert(path, component.name.clone());
        }
        accepted.push((component, archive));
    }
    accepted
}

/// Delete `files` under `root`, pruning directories emptied along the way
///
/// Returns the paths that could not be deleted, if any. A path that is
/// already gone counts as deleted.
fn delete_files(root: &Path, files: &BTreeSet<PathBuf>) -> Result<Option<Leftover>> {
    let mut remaining = BTreeSet::new();
    let mut first_error = None;

    for relative in files {
        let path = root.join(relative);
        match fs::remove_file(&path) {
            Ok(()) => prune_empty_parents(root, &path),
            Err(e) if e.kind() == ErrorKind::NotFound => prune_empty_parents(root, &path),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Could not delete file");
                remaining.insert(relative.clone());
                first_error.get_or_insert_with(|| Error::filesystem(&path, e));
            }
        }
    }

    Ok(first_error.map(|error| Leftover { remaining, error }))
}

fn prune_empty_parents(root: &Path, path: &Path) {
    let mut dir = path.parent();
    while let Some(current) = dir {
        if current == root || !current.starts_with(root) {
            break;
        }
        if fs::remove_dir(current).is_err() {
            break;
        }
        dir = current.parent();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::InstallStatus;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// "Archives" are text files listing the relative paths they contain
    struct FakeDownloader {
        archives: HashMap<String, Vec<String>>,
        fetched: Mutex<Vec<String>>,
    }

    impl FakeDownloader {
        fn new(archives: &[(&str, &[&str])]) -> Self {
            Self {
                archives: archives
                    .iter()
                    .map(|(url, files)| {
                        (url.to_string(), files.iter().map(|f| f.to_string()).collect())
                    })
                    .collect(),
                fetched: Mutex::new(Vec::new()),
            }
        }

        fn fetched(&self) -> Vec<String> {
            let mut fetched = self.fetched.lock().unwrap().clone();
            fetched.sort();
            fetched
        }
    }

    impl Downloader for FakeDownloader {
        fn download(&self, locator: &DownloadLocator, dest: &Path) -> Result<u64> {
            self.fetched.lock().unwrap().push(locator.url.clone());
            let files = self
                .archives
                .get(&locator.url)
                .ok_or_else(|| Error::Other(format!("HTTP 404 for {}", locator.url)))?;
            fs::create_dir_all(dest.parent().unwrap())?;
            let body = files.join("\n");
            fs::write(dest, &body)?;
            Ok(body.len() as u64)
        }
    }

    struct FakeExtractor;

    impl Extractor for FakeExtractor {
        fn list_contents(&self, archive: &Path) -> Result<BTreeSet<PathBuf>> {
            let body = fs::read_to_string(archive)?;
            Ok(body
                .lines()
                .filter(|l| !l.is_empty())
                .map(PathBuf::from)
                .collect())
        }

        fn extract(&self, archive: &Path, dest: &Path) -> Result<BTreeSet<PathBuf>> {
            let files = self.list_contents(archive)?;
            let stamp = archive.file_name().unwrap().to_string_lossy().into_owned();
            for file in &files {
                let path = dest.join(file);
                fs::create_dir_all(path.parent().unwrap())?;
                fs::write(&path, &stamp)?;
            }
            Ok(files)
        }
    }

    #[derive(Default)]
    struct CountingLoader {
        runs: AtomicUsize,
    }

    impl LoaderInstaller for CountingLoader {
        fn install(&self, _root: &Path) -> Result<()> {
            self.runs.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct Harness {
        temp_dir: TempDir,
        downloader: Arc<FakeDownloader>,
        loader: Arc<CountingLoader>,
    }

    impl Harness {
        fn new(archives: &[(&str, &[&str])]) -> Self {
            Self {
                temp_dir: TempDir::new().unwrap(),
                downloader: Arc::new(FakeDownloader::new(archives)),
                loader: Arc::new(CountingLoader::default()),
            }
        }

        fn root(&self) -> &Path {
            self.temp_dir.path()
        }

        fn config(&self) -> UpdaterConfig {
            let mut config = UpdaterConfig::new(self.root());
            config.max_parallel = 2;
            config
        }

        fn updater(&self) -> Updater {
            self.updater_with(self.config(), Arc::new(FakeExtractor))
        }

        fn updater_with(&self, config: UpdaterConfig, extractor: Arc<dyn Extractor>) -> Updater {
            Updater::new(
                config,
                Collaborators {
                    downloader: self.downloader.clone(),
                    extractor,
                    loader: self.loader.clone(),
                    classifier: None,
                },
            )
        }

        fn loader_runs(&self) -> usize {
            self.loader.runs.load(Ordering::SeqCst)
        }
    }

    fn descriptor() -> PackDescriptor {
        PackDescriptor::from_json(
            br#"{"id": 1, "name": "pack", "minecraft": "1.12.2", "version": "1",
                 "solder": "https://solder.example/api/"}"#,
        )
        .unwrap()
    }

    fn component(name: &str, version: &str) -> Component {
        Component::new(
            name,
            version,
            DownloadLocator::new(format!("mem://{name}-{version}.zip")),
        )
    }

    fn target(build: &str, components: &[(&str, &str)]) -> Target {
        Target {
            build: build.to_string(),
            components: components
                .iter()
                .map(|(n, v)| component(n, v))
                .collect(),
        }
    }

    #[tokio::test]
    async fn test_fresh_install() {
        let harness = Harness::new(&[
            ("mem://a-1.zip", &["mods/a.jar", "config/a.cfg"]),
            ("mem://b-1.zip", &["mods/b.jar"]),
        ]);
        let mut snapshot = InstallationSnapshot::new(descriptor());
        let target = target("1", &[("a", "1"), ("b", "1")]);

        let report = harness
            .updater()
            .apply(&mut snapshot, &target, false)
            .await
            .unwrap();

        assert!(report.is_complete());
        assert_eq!(report.installed, vec!["a", "b"]);
        assert!(report.removed.is_empty());
        assert_eq!(snapshot.status(), InstallStatus::UpToDate);
        assert_eq!(snapshot.state.installed_build(), Some("1"));
        assert_eq!(snapshot.files.files_of("a").len(), 2);
        assert!(harness.root().join("mods/b.jar").exists());
        assert_eq!(harness.loader_runs(), 1);
        assert!(!harness.root().join("cache/a/a-1.zip").exists());
    }

    #[tokio::test]
    async fn test_up_to_date_is_noop() {
        let harness = Harness::new(&[("mem://a-1.zip", &["mods/a.jar"])]);
        let mut snapshot = InstallationSnapshot::new(descriptor());
        let target = target("1", &[("a", "1")]);
        let updater = harness.updater();
        updater.apply(&mut snapshot, &target, false).await.unwrap();

        snapshot.refresh(descriptor(), "1").unwrap();
        let report = updater.apply(&mut snapshot, &target, false).await.unwrap();

        assert!(report.is_noop());
        assert_eq!(harness.downloader.fetched().len(), 1);
        assert_eq!(harness.loader_runs(), 1);
    }

    #[tokio::test]
    async fn test_update_replaces_changed_and_drops_removed() {
        let harness = Harness::new(&[
            ("mem://a-1.zip", &["mods/a-1.jar"]),
            ("mem://b-1.zip", &["mods/b/b.jar", "config/b/deep/b.cfg"]),
            ("mem://a-2.zip", &["mods/a-2.jar"]),
            ("mem://c-1.zip", &["mods/c.jar"]),
        ]);
        let mut snapshot = InstallationSnapshot::new(descriptor());
        let updater = harness.updater();
        updater
            .apply(&mut snapshot, &target("1", &[("a", "1"), ("b", "1")]), false)
            .await
            .unwrap();

        let next = target("2", &[("a", "2"), ("c", "1")]);
        snapshot.refresh(descriptor(), &next.build).unwrap();
        assert_eq!(snapshot.status(), InstallStatus::Updatable);
        let report = updater.apply(&mut snapshot, &next, false).await.unwrap();

        assert!(report.is_complete());
        assert_eq!(report.removed, vec!["a", "b"]);
        assert_eq!(report.installed, vec!["a", "c"]);
        assert!(!harness.root().join("mods/a-1.jar").exists());
        assert!(harness.root().join("mods/a-2.jar").exists());
        assert!(!harness.root().join("mods/b").exists());
        assert!(!harness.root().join("config").exists());
        assert!(!snapshot.files.contains_owner("b"));
        assert_eq!(snapshot.status(), InstallStatus::UpToDate);
        assert_eq!(snapshot.state.installed_build(), Some("2"));
        assert_eq!(harness.loader_runs(), 2);
    }

    #[tokio::test]
    async fn test_failed_download_is_retried_next_run() {
        let harness = Harness::new(&[("mem://a-1.zip", &["mods/a.jar"])]);
        let mut snapshot = InstallationSnapshot::new(descriptor());
        let target = target("1", &[("a", "1"), ("b", "1")]);
        let updater = harness.updater();

        let report = updater.apply(&mut snapshot, &target, false).await.unwrap();

        assert!(!report.is_complete());
        assert_eq!(report.installed, vec!["a"]);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].component, "b");
        assert!(matches!(report.failures[0].error, Error::Transfer { .. }));
        assert_eq!(snapshot.status(), InstallStatus::Updatable);
        assert_eq!(differ::names(&snapshot.components), vec!["a"]);

        snapshot.refresh(descriptor(), &target.build).unwrap();
        assert_eq!(snapshot.status(), InstallStatus::Updatable);
        let retry = updater.apply(&mut snapshot, &target, false).await.unwrap();

        assert!(retry.downloaded.is_empty());
        assert_eq!(retry.failures[0].component, "b");
        assert_eq!(
            harness.downloader.fetched(),
            vec!["mem://a-1.zip", "mem://b-1.zip", "mem://b-1.zip"]
        );
    }

    #[tokio::test]
    async fn test_ownership_conflict_is_not_extracted() {
        let harness = Harness::new(&[
            ("mem://a-1.zip", &["mods/shared.jar", "mods/a.jar"]),
            ("mem://b-1.zip", &["mods/shared.jar"]),
        ]);
        let mut snapshot = InstallationSnapshot::new(descriptor());

        let report = harness
            .updater()
            .apply(&mut snapshot, &target("1", &[("a", "1"), ("b", "1")]), false)
            .await
            .unwrap();

        assert_eq!(report.installed, vec!["a"]);
        assert_eq!(report.failures.len(), 1);
        match &report.failures[0].error {
            Error::FileOwnershipConflict {
                path,
                owner,
                claimant,
            } => {
                assert_eq!(path, &PathBuf::from("mods/shared.jar"));
                assert_eq!(owner, "a");
                assert_eq!(claimant, "b");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(snapshot.files.owner_of(Path::new("mods/shared.jar")), Some("a"));
        assert_eq!(snapshot.status(), InstallStatus::Updatable);
    }

    #[tokio::test]
    async fn test_partial_delete_keeps_component() {
        let harness = Harness::new(&[
            ("mem://a-1.zip", &["mods/a.jar", "config/a.cfg"]),
            ("mem://a-2.zip", &["mods/a.jar"]),
        ]);
        let mut snapshot = InstallationSnapshot::new(descriptor());
        let updater = harness.updater();
        updater
            .apply(&mut snapshot, &target("1", &[("a", "1")]), false)
            .await
            .unwrap();

        // A directory where a file is expected cannot be removed with remove_file
        fs::remove_file(harness.root().join("mods/a.jar")).unwrap();
        fs::create_dir_all(harness.root().join("mods/a.jar/locked")).unwrap();

        let next = target("2", &[("a", "2")]);
        snapshot.refresh(descriptor(), &next.build).unwrap();
        let report = updater.apply(&mut snapshot, &next, false).await.unwrap();

        assert!(report.removed.is_empty());
        assert!(report.downloaded.is_empty());
        assert!(matches!(report.failures[0].error, Error::Filesystem { .. }));
        assert_eq!(
            snapshot.files.files_of("a"),
            BTreeSet::from([PathBuf::from("mods/a.jar")])
        );
        assert_eq!(snapshot.components.iter().next().unwrap().version, "1");
        assert!(!harness.root().join("config/a.cfg").exists());
        assert_eq!(snapshot.status(), InstallStatus::Updatable);
        assert_eq!(harness.downloader.fetched(), vec!["mem://a-1.zip"]);
    }

    #[tokio::test]
    async fn test_forced_reinstall() {
        let harness = Harness::new(&[("mem://a-1.zip", &["mods/a.jar"])]);
        let mut snapshot = InstallationSnapshot::new(descriptor());
        let target = target("1", &[("a", "1")]);
        let updater = harness.updater();
        updater.apply(&mut snapshot, &target, false).await.unwrap();
        fs::remove_file(harness.root().join("mods/a.jar")).unwrap();

        let report = updater.apply(&mut snapshot, &target, true).await.unwrap();

        assert_eq!(report.removed, vec!["a"]);
        assert_eq!(report.installed, vec!["a"]);
        assert!(harness.root().join("mods/a.jar").exists());
        assert_eq!(snapshot.status(), InstallStatus::UpToDate);
    }

    #[tokio::test]
    async fn test_progress_is_reported() {
        let harness = Harness::new(&[("mem://a-1.zip", &["mods/a.jar"])]);
        let messages = Arc::new(Mutex::new(Vec::new()));
        let sink = messages.clone();
        let progress: ProgressCallback = Arc::new(move |msg, current, total| {
            sink.lock().unwrap().push((msg.to_string(), current, total));
        });
        let updater = harness.updater().with_progress(progress);
        let mut snapshot = InstallationSnapshot::new(descriptor());

        updater
            .apply(&mut snapshot, &target("1", &[("a", "1")]), false)
            .await
            .unwrap();

        let messages = messages.lock().unwrap();
        assert!(messages.contains(&("Downloading".to_string(), 1, 1)));
        assert!(messages.contains(&("Installed mod loader".to_string(), 1, 1)));
    }

    #[test]
    fn test_cache_path_stays_in_cache() {
        let cache = Path::new("/srv/mc/cache");

        let path = cache_path(cache, &component("ironchest", "1")).unwrap();
        assert_eq!(path, PathBuf::from("/srv/mc/cache/ironchest/ironchest-1.zip"));

        let escaping = Component::new(
            "../../etc",
            "1",
            DownloadLocator::new("https://x/evil.zip"),
        );
        assert!(matches!(
            cache_path(cache, &escaping),
            Err(Error::Transfer { component, .. }) if component == "../../etc"
        ));

        let bad_file = Component::new("jei", "1", DownloadLocator::new("https://x/.."));
        assert!(cache_path(cache, &bad_file).is_err());
    }

    #[tokio::test]
    async fn test_unsafe_name_is_never_downloaded() {
        let harness = Harness::new(&[("mem://a-1.zip", &["mods/a.jar"])]);
        let mut snapshot = InstallationSnapshot::new(descriptor());
        let mut target = target("1", &[("a", "1")]);
        target.components.insert(Component::new(
            "../escape",
            "1",
            DownloadLocator::new("mem://escape.zip"),
        ));

        let report = harness
            .updater()
            .apply(&mut snapshot, &target, false)
            .await
            .unwrap();

        assert_eq!(report.installed, vec!["a"]);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].component, "../escape");
        assert!(matches!(report.failures[0].error, Error::Transfer { .. }));
        assert_eq!(harness.downloader.fetched(), vec!["mem://a-1.zip"]);
        assert!(!harness.root().join("escape").exists());
    }

    /// Panics while extracting `b`
    struct BuggyExtractor;

    impl Extractor for BuggyExtractor {
        fn list_contents(&self, archive: &Path) -> Result<BTreeSet<PathBuf>> {
            FakeExtractor.list_contents(archive)
        }

        fn extract(&self, archive: &Path, dest: &Path) -> Result<BTreeSet<PathBuf>> {
            if archive.ends_with("b-1.zip") {
                panic!("extractor bug");
            }
            FakeExtractor.extract(archive, dest)
        }
    }

    #[tokio::test]
    async fn test_panicking_task_is_reported() {
        let harness = Harness::new(&[
            ("mem://a-1.zip", &["mods/a.jar"]),
            ("mem://b-1.zip", &["mods/b.jar"]),
        ]);
        let updater = harness.updater_with(harness.config(), Arc::new(BuggyExtractor));
        let mut snapshot = InstallationSnapshot::new(descriptor());

        let report = updater
            .apply(&mut snapshot, &target("1", &[("a", "1"), ("b", "1")]), false)
            .await
            .unwrap();

        assert_eq!(report.installed, vec!["a"]);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].component, "b");
        assert!(report.failures[0].error.to_string().contains("Extracting"));
        assert!(!snapshot.files.contains_owner("b"));
        assert_eq!(snapshot.status(), InstallStatus::Updatable);
    }

    #[tokio::test]
    async fn test_server_jar_is_fetched_once() {
        let harness = Harness::new(&[
            ("mem://a-1.zip", &["mods/a.jar"]),
            ("mem://server/1.12.2.jar", &["vanilla"]),
        ]);
        let mut config = harness.config();
        config.server_jar_url = Some("mem://server/{version}.jar".to_string());
        let updater = harness.updater_with(config, Arc::new(FakeExtractor));
        let mut snapshot = InstallationSnapshot::new(descriptor());
        let target = target("1", &[("a", "1")]);

        let report = updater.apply(&mut snapshot, &target, false).await.unwrap();

        assert!(report.is_complete());
        assert_eq!(
            fs::read_to_string(harness.root().join("minecraft_server.1.12.2.jar")).unwrap(),
            "vanilla"
        );

        updater.apply(&mut snapshot, &target, true).await.unwrap();
        assert_eq!(
            harness.downloader.fetched(),
            vec!["mem://a-1.zip", "mem://a-1.zip", "mem://server/1.12.2.jar"]
        );
    }

    #[tokio::test]
    async fn test_missing_server_jar_is_a_loader_error() {
        let harness = Harness::new(&[("mem://a-1.zip", &["mods/a.jar"])]);
        let mut config = harness.config();
        config.server_jar_url = Some("mem://gone/{version}.jar".to_string());
        let updater = harness.updater_with(config, Arc::new(FakeExtractor));
        let mut snapshot = InstallationSnapshot::new(descriptor());

        let report = updater
            .apply(&mut snapshot, &target("1", &[("a", "1")]), false)
            .await
            .unwrap();

        assert!(report.failures.is_empty());
        match &report.loader_error {
            Some(Error::Loader(reason)) => assert!(reason.contains("1.12.2")),
            other => panic!("unexpected loader result: {other:?}"),
        }
        assert_eq!(snapshot.status(), InstallStatus::UpToDate);
    }

    #[test]
    fn test_resolve_monolithic_target() {
        struct NoResolver;
        impl BuildResolver for NoResolver {
            fn resolve(
                &self,
                _: &crate::descriptor::CatalogEndpoint,
                _: &str,
                _: &BuildPreference,
            ) -> Result<crate::solder::ResolvedBuild> {
                panic!("monolithic packs never hit the resolver")
            }
        }

        let descriptor = PackDescriptor::from_json(
            br#"{"id": 1, "name": "pack", "minecraft": "1.7.10", "version": "2.0",
                 "url": "https://cdn.example/pack.zip"}"#,
        )
        .unwrap();

        let target =
            resolve_target(&descriptor, &NoResolver, &BuildPreference::Recommended).unwrap();

        assert_eq!(target.build, "2.0");
        let package = target.components.iter().next().unwrap();
        assert_eq!(package.name, crate::component::MONOLITHIC_OWNER);
        assert_eq!(package.version, "2.0");
    }
}
