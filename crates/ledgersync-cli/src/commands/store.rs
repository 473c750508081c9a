//! Store CLI commands
//!
//! Handles: ledgersync init/status/check

use anyhow::{Context, Result};
use chrono::Utc;
use ledgersync_core::health;
use ledgersync_core::storage::{LedgerStore, MetaStore, StoreHandle};
use ledgersync_core::validate;
use ledgersync_core::Settings;
use std::path::Path;

/// Create an empty, contract-shaped live store
pub fn init(settings: &Settings) -> Result<()> {
    let layout = settings.layout();
    let store = LedgerStore::initialize(&layout.live)
        .with_context(|| format!("Failed to initialize store at {}", layout.live.display()))?;
    let seeded = MetaStore::new(store.connection()?).seed_defaults(Utc::now())?;

    let assets = settings.assets_dir();
    std::fs::create_dir_all(&assets)
        .with_context(|| format!("Failed to create assets directory {}", assets.display()))?;

    println!("Initialized empty store: {}", layout.live.display());
    println!("Seeded metadata: {}", seeded.join(", "));
    println!("Assets directory: {}", assets.display());
    Ok(())
}

/// Report on the live store and any leftover swap files
pub fn status(settings: &Settings, json: bool) -> Result<()> {
    let layout = settings.layout();
    let report = health::inspect(&layout.live);
    let backup_present = layout.backup.exists();
    let candidate_present = layout.candidate.exists();

    if json {
        let out = serde_json::json!({
            "live": report,
            "backup_present": backup_present,
            "candidate_present": candidate_present,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    println!("Store: {}", report.path.display());
    if !report.exists {
        println!("  No store yet. Run `ledgersync init` or import one.");
        return Ok(());
    }

    println!("  Size: {} bytes", report.size_bytes);
    if let Some(hash) = &report.sha256 {
        println!("  SHA-256: {hash}");
    }
    if let Some(counts) = &report.counts {
        println!("  Accounts: {}", counts.accounts);
        println!("  Account types: {}", counts.account_types);
        println!("  Transactions: {}", counts.transactions);
        println!("  Metadata rows: {}", counts.meta);
    }
    if let Some(problem) = &report.problem {
        println!("  Problem: {problem}");
    }
    if backup_present {
        println!(
            "  Leftover backup: {} (cleared by the next swap)",
            layout.backup.display()
        );
    }
    if candidate_present {
        println!("  Leftover candidate: {}", layout.candidate.display());
    }
    Ok(())
}

/// Validate a store file read-only and list what normalization would change
pub fn check(file: &Path, json: bool) -> Result<()> {
    validate::validate(file)
        .with_context(|| format!("{} is not a usable store", file.display()))?;
    let differences: Vec<String> = validate::contract_differences(file)
        .with_context(|| format!("Failed to read the schema of {}", file.display()))?
        .iter()
        .map(ToString::to_string)
        .collect();

    if json {
        let out = serde_json::json!({
            "path": file,
            "valid": true,
            "differences": differences,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    println!("{}: valid", file.display());
    if differences.is_empty() {
        println!("  Matches the current schema");
    } else {
        println!("  Normalization needed:");
        for difference in &differences {
            println!("    - {difference}");
        }
    }
    Ok(())
}
