use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use skywatch_daemon::cli;
use skywatch_daemon::cli::once::LoopName;
use skywatch_daemon::config::{self, DaemonConfig};

#[derive(Parser)]
#[command(
    name = "skywatchd",
    about = "Skywatch — scheduled radar-tile fetch and sky-camera capture",
    version,
    after_help = "Config resolution: --config, then $SKYWATCH_CONFIG, then ./skywatch.json, then ~/.skywatch/config.json."
)]
struct Cli {
    /// Path to the JSON config file
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose/debug logging
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run every configured acquisition loop until stopped
    Run,
    /// Load and validate the configuration, then exit
    Check,
    /// Execute a single acquisition cycle and exit
    Once {
        /// Which loop to drive
        #[arg(value_enum)]
        target: LoopName,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let path = config::resolve_config_path(cli.config.as_deref());

    let result = match cli.command {
        Commands::Run => match DaemonConfig::load(&path) {
            Ok(cfg) => cli::run::run(cfg).await,
            Err(e) => Err(e),
        },
        Commands::Check => cli::check::run(&path),
        Commands::Once { target } => match DaemonConfig::load(&path) {
            Ok(cfg) => cli::once::run(cfg, target).await,
            Err(e) => Err(e),
        },
    };

    // Consistent exit codes: 0=success, 1=error
    if let Err(e) = &result {
        eprintln!("  Error: {e:#}");
        std::process::exit(1);
    }
    result
}

fn init_tracing(verbose: bool) {
    let default_filter = if verbose {
        "skywatch=debug,skywatch_daemon=debug,skywatchd=debug"
    } else {
        "skywatch=info,skywatch_daemon=info,skywatchd=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter)),
        )
        .init();
}
