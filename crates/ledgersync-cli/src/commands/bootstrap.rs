//! Bootstrap CLI commands
//!
//! Handles: ledgersync sync/import-asset/import-file

use anyhow::{Context, Result};
use ledgersync_core::{BootstrapSummary, Bootstrapper, LedgerStore, Settings, TableAction};
use ledgersync_transport::ProgressObserver;
use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};

/// Download the full store for `email` from the sync endpoint
pub async fn sync(
    settings: &Settings,
    endpoint: Option<&str>,
    email: &str,
    otp: &str,
    json: bool,
) -> Result<()> {
    let endpoint = endpoint
        .map(str::to_string)
        .or_else(|| settings.sync.endpoint.clone())
        .context("No sync endpoint: pass --endpoint or set [sync] endpoint in the settings file")?;

    let boot = bootstrapper(settings);
    let progress = StderrProgress::new();
    let result = boot.sync(&endpoint, email, otp, &progress).await;
    progress.finish();
    print_summary(&result?, json)
}

/// Install a bundled seed store
pub async fn import_asset(settings: &Settings, name: &str, json: bool) -> Result<()> {
    let boot = bootstrapper(settings);
    let progress = StderrProgress::new();
    let result = boot.from_bundled_asset(name, &progress).await;
    progress.finish();
    print_summary(&result?, json)
}

/// Install a store file picked by the user
pub async fn import_file(settings: &Settings, path: &Path, json: bool) -> Result<()> {
    let boot = bootstrapper(settings);
    let progress = StderrProgress::new();
    let result = boot.from_picked_file(path, &progress).await;
    progress.finish();
    print_summary(&result?, json)
}

/// Bootstrapper with the handle already open against the live store, as an
/// application would have it at the moment a sync starts
fn bootstrapper(settings: &Settings) -> Bootstrapper<LedgerStore> {
    let boot = Bootstrapper::from_settings(settings, LedgerStore::new());
    match boot.open_live() {
        Ok(true) => tracing::debug!(path = %boot.layout().live.display(), "live store open"),
        Ok(false) => tracing::info!("no live store yet; this will be a first install"),
        Err(e) => tracing::warn!(error = %e, "live store could not be opened; it will be replaced"),
    }
    boot
}

fn print_summary(summary: &BootstrapSummary, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(summary)?);
        return Ok(());
    }

    println!("Installed store from {}", summary.source);
    println!("  Bytes: {}", summary.bytes);
    println!(
        "  Replaced existing store: {}",
        if summary.replaced_existing { "yes" } else { "no" }
    );
    println!("  Accounts: {}", summary.counts.accounts);
    println!("  Account types: {}", summary.counts.account_types);
    println!("  Transactions: {}", summary.counts.transactions);

    let changed: Vec<_> = summary
        .normalization
        .tables
        .iter()
        .filter(|t| t.action != TableAction::Unchanged)
        .collect();
    if changed.is_empty() {
        println!("  Schema: already current");
    } else {
        println!("  Normalized:");
        for table in changed {
            println!("    {}: {}", table.table, describe(&table.action));
        }
    }

    if !summary.seeded.is_empty() {
        println!("  Seeded metadata: {}", summary.seeded.join(", "));
    }
    Ok(())
}

fn describe(action: &TableAction) -> String {
    match action {
        TableAction::Unchanged => "unchanged".to_string(),
        TableAction::Created => "created empty".to_string(),
        TableAction::AddedColumns { columns } => format!("added {}", columns.join(", ")),
        TableAction::Rebuilt { rows } => format!("rebuilt ({rows} rows)"),
        TableAction::Recreated => "recreated".to_string(),
    }
}

/// Renders progress as a percentage on stderr
struct StderrProgress {
    last: AtomicU32,
}

impl StderrProgress {
    const NOTHING_SHOWN: u32 = u32::MAX;

    fn new() -> Self {
        Self {
            last: AtomicU32::new(Self::NOTHING_SHOWN),
        }
    }

    /// End the progress line, if one was started
    fn finish(&self) {
        if self.last.load(Ordering::Relaxed) != Self::NOTHING_SHOWN {
            eprintln!();
        }
    }
}

impl ProgressObserver for StderrProgress {
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn progress(&self, fraction: f32) {
        let percent = (fraction.clamp(0.0, 1.0) * 100.0).round() as u32;
        if self.last.swap(percent, Ordering::Relaxed) != percent {
            eprint!("\r{percent:>3}%");
        }
    }
}
