use super::Overrides;
use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use technicpm::{
    ArchiveExtractor, Blacklist, BuildPreference, ClientFileClassifier, Collaborators, Config,
    HttpCatalogClient, HttpDownloader, ModpackJarInstaller, ProgressCallback, RunOptions,
    RunOutcome, Session, SolderClient, StateStore, UpdateReport, Updater, UpdaterConfig,
};

/// Create an indicatif-based progress callback for CLI display
fn create_spinner_callback() -> (ProgressBar, ProgressCallback) {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏"),
    );
    spinner.enable_steady_tick(Duration::from_millis(80));

    let handle = spinner.clone();
    let callback: ProgressCallback = Arc::new(move |msg: &str, current: u64, total: u64| {
        if total > 1 {
            handle.set_message(format!("{} ({}/{})", msg, current, total));
        } else {
            handle.set_message(msg.to_string());
        }
    });
    (spinner, callback)
}

fn build_session(config: &Config, root: &Path, progress: ProgressCallback) -> Result<Session> {
    let classifier: Option<Arc<dyn ClientFileClassifier>> = if config.cleanup.enabled {
        Some(Arc::new(Blacklist::new(&config.cleanup.client_only)?))
    } else {
        None
    };

    let mut updater_config = UpdaterConfig::new(root);
    updater_config.cache_dir = config.install.cache_dir.clone();
    updater_config.max_parallel = config.install.max_parallel;
    updater_config.download_icon = config.install.download_icon;
    updater_config.server_jar_url = config
        .loader
        .server_jar
        .then(|| config.loader.server_jar_url.clone());

    let updater = Updater::new(
        updater_config,
        Collaborators {
            downloader: Arc::new(HttpDownloader::new()?),
            extractor: Arc::new(ArchiveExtractor::new()),
            loader: Arc::new(ModpackJarInstaller::new(config.loader.command.clone())),
            classifier,
        },
    )
    .with_progress(progress);

    Ok(Session::new(
        StateStore::in_root(root),
        Arc::new(HttpCatalogClient::new(config.pack.launcher_build.clone())?),
        Arc::new(SolderClient::new()?),
        updater,
    ))
}

pub fn run(overrides: &Overrides, force: bool) -> Result<()> {
    let config = overrides.load_config()?;
    let root = config.install_root()?;
    fs::create_dir_all(&root)
        .with_context(|| format!("Could not create install root {}", root.display()))?;

    let options = RunOptions {
        api_url: config.api_url()?.to_string(),
        preference: config.pack.build.parse::<BuildPreference>()?,
        force,
        autoupdate: config.install.autoupdate,
    };

    let (spinner, progress) = create_spinner_callback();
    let session = build_session(&config, &root, progress)?;

    // Blocking HTTP clients are built and dropped outside the runtime
    let runtime = tokio::runtime::Runtime::new()?;
    let outcome = runtime.block_on(session.run(&options));
    spinner.finish_and_clear();
    drop(runtime);

    match outcome? {
        RunOutcome::UpToDate { build } => {
            println!("✓ Modpack is up to date (build {})", build);
        }
        RunOutcome::UpdateDeferred {
            installed,
            available,
        } => {
            tracing::warn!(
                installed = %installed,
                available = %available,
                "MODPACK UPDATE AVAILABLE, BUT AUTOUPDATE IS DISABLED. \
                 Run `technicpm update` or set install.autoupdate = true"
            );
            std::thread::sleep(Duration::from_secs(config.install.update_notice_seconds));
        }
        RunOutcome::Applied {
            build,
            status,
            report,
        } => {
            print_report(&report);
            println!("Build {}: {}", build, status);

            if let Some(e) = &report.loader_error {
                anyhow::bail!("{}", e);
            }
        }
    }

    Ok(())
}

fn print_report(report: &UpdateReport) {
    if report.is_noop() {
        println!("Nothing to do.");
        return;
    }

    for name in &report.removed {
        println!("  - {}", name);
    }
    for name in &report.installed {
        println!("  + {}", name);
    }
    for path in &report.cleaned {
        println!("  ✗ {} (client-only)", path.display());
    }

    if !report.failures.is_empty() {
        println!();
        println!(
            "⚠ {} component(s) failed and will be retried on the next run:",
            report.failures.len()
        );
        for failure in &report.failures {
            println!("  {}: {}", failure.component, failure.error);
        }
    }
    println!();
}
