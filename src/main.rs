use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use std::path::PathBuf;

mod commands;
mod logging;

/// technicpm - run Technic modpacks as a server, and keep them up to date
#[derive(Parser)]
#[command(name = "technicpm")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Config file (defaults to ~/.technicpm/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Server directory to install into
    #[arg(long, global = true)]
    root: Option<String>,

    /// Modpack API URL (e.g. https://api.technicpack.net/modpack/<slug>)
    #[arg(long, global = true)]
    api_url: Option<String>,

    /// Build to install: recommended, latest, or an exact build
    #[arg(long, global = true)]
    build: Option<String>,

    /// Show debug output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Install the pack, or update it if autoupdate is enabled (default)
    Run,

    /// Install or update now, reinstalling every mod
    Update,

    /// Show the recorded installation without contacting the network
    Status,

    /// Forget the recorded installation so the next run reinstalls
    Reset,

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

fn main() {
    let cli = Cli::parse();
    logging::init_logging(cli.verbose);

    let overrides = commands::Overrides {
        config: cli.config,
        root: cli.root,
        api_url: cli.api_url,
        build: cli.build,
    };

    let result = match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => commands::run::run(&overrides, false),
        Commands::Update => commands::run::run(&overrides, true),
        Commands::Status => commands::status::run(&overrides),
        Commands::Reset => commands::reset::run(&overrides),
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            generate(shell, &mut cmd, "technicpm", &mut std::io::stdout());
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
