//! ledgersync CLI - bootstrap and replace the local ledger store
//!
//! Provides `ledgersync sync`, `ledgersync import-file`, `ledgersync status`,
//! and other commands.

mod commands;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use ledgersync_core::config::default_data_dir;
use ledgersync_core::{BootstrapError, Settings};
use std::path::PathBuf;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Settings file looked up in the data directory when `--config` is absent
const SETTINGS_FILE: &str = "ledgersync.toml";

/// Exit code when the swap failed and the previous store could not be restored
const EXIT_UNRECOVERABLE: i32 = 2;

#[derive(Parser)]
#[command(name = "ledgersync")]
#[command(about = "ledgersync - bootstrap and atomically replace the local ledger store")]
#[command(version)]
struct Cli {
    /// Path to the settings file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Directory holding the store files (overrides the settings file)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Log filter (trace, debug, info, warn, error, or a full directive)
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create an empty store on first run
    Init,
    /// Download the full store from the sync endpoint
    Sync {
        /// Account email
        #[arg(long)]
        email: String,
        /// One-time code
        #[arg(long)]
        otp: String,
        /// Endpoint URL (defaults to the settings file)
        #[arg(long)]
        endpoint: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Install a seed store from the assets directory
    ImportAsset {
        /// Asset name, relative to the assets directory
        name: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Install a store file from anywhere on disk
    ImportFile {
        /// Store file to import (it is copied, not moved)
        path: PathBuf,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show the live store's health
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Check a store file without installing it
    Check {
        /// Store file to check
        file: PathBuf,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        match e.downcast_ref::<BootstrapError>() {
            Some(err) => eprintln!("Error [{}]: {err}", err.code()),
            None => eprintln!("Error: {e:#}"),
        }
        std::process::exit(exit_code(&e));
    }
}

fn exit_code(err: &anyhow::Error) -> i32 {
    match err.downcast_ref::<BootstrapError>() {
        Some(e) if e.is_unrecoverable() => EXIT_UNRECOVERABLE,
        _ => 1,
    }
}

async fn run(cli: Cli) -> Result<()> {
    let settings = load_settings(&cli)?;
    init_logging(cli.log_level.as_deref(), &settings.logging.level);

    match cli.command {
        Commands::Init => commands::store::init(&settings),
        Commands::Status { json } => commands::store::status(&settings, json),
        Commands::Check { file, json } => commands::store::check(&file, json),
        Commands::Sync {
            email,
            otp,
            endpoint,
            json,
        } => commands::bootstrap::sync(&settings, endpoint.as_deref(), &email, &otp, json).await,
        Commands::ImportAsset { name, json } => {
            commands::bootstrap::import_asset(&settings, &name, json).await
        }
        Commands::ImportFile { path, json } => {
            commands::bootstrap::import_file(&settings, &path, json).await
        }
    }
}

/// Settings from `--config`, else `<data dir>/ledgersync.toml`, else defaults.
/// `--data-dir` always wins over the file.
fn load_settings(cli: &Cli) -> Result<Settings> {
    let path = cli.config.clone().unwrap_or_else(|| {
        cli.data_dir
            .clone()
            .unwrap_or_else(default_data_dir)
            .join(SETTINGS_FILE)
    });

    let mut settings = if cli.config.is_some() {
        Settings::from_file(&path)
    } else {
        Settings::load_or_default(&path)
    }
    .with_context(|| format!("Failed to load settings from {}", path.display()))?;

    if let Some(dir) = &cli.data_dir {
        settings.data_dir = Some(dir.clone());
    }
    Ok(settings)
}

/// Log to stderr; `--log-level` beats `RUST_LOG`, which beats the settings file
fn init_logging(flag: Option<&str>, configured: &str) {
    let filter = match flag {
        Some(level) => EnvFilter::try_new(level),
        None => EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(configured)),
    }
    .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();
}
