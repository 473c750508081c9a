//! Store health reporting

use crate::schema::{quote_ident, ACCOUNTS, ACCOUNT_TYPES, META, TRANSACTIONS};
use crate::validate;
use rusqlite::{Connection, OpenFlags};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

/// Row counts of the contract tables
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RowCounts {
    pub accounts: i64,
    pub account_types: i64,
    pub transactions: i64,
    pub meta: i64,
}

/// Count rows in every contract table
///
/// # Errors
/// Returns an error if a table cannot be counted
pub fn row_counts(conn: &Connection) -> rusqlite::Result<RowCounts> {
    let count = |table: &str| -> rusqlite::Result<i64> {
        conn.query_row(
            &format!("SELECT COUNT(*) FROM {}", quote_ident(table)),
            [],
            |row| row.get(0),
        )
    };

    Ok(RowCounts {
        accounts: count(ACCOUNTS.name)?,
        account_types: count(ACCOUNT_TYPES.name)?,
        transactions: count(TRANSACTIONS.name)?,
        meta: count(META.name)?,
    })
}

/// Snapshot of a store file on disk
#[derive(Debug, Clone, Serialize)]
pub struct StoreReport {
    pub path: PathBuf,
    pub exists: bool,
    pub size_bytes: u64,
    pub sha256: Option<String>,
    /// Present only when the file validates and every table can be counted
    pub counts: Option<RowCounts>,
    /// Why counts are missing, if they are
    pub problem: Option<String>,
}

/// SHA-256 of a file's contents, hex encoded
///
/// # Errors
/// Returns an error if the file cannot be read
pub fn file_sha256(path: &Path) -> io::Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; 64 * 1024];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

/// Inspect a store file without modifying it
#[must_use]
pub fn inspect(path: &Path) -> StoreReport {
    let mut report = StoreReport {
        path: path.to_path_buf(),
        exists: path.is_file(),
        size_bytes: 0,
        sha256: None,
        counts: None,
        problem: None,
    };

    if !report.exists {
        report.problem = Some("store file does not exist".to_string());
        return report;
    }

    report.size_bytes = std::fs::metadata(path).map(|m| m.len()).unwrap_or(0);
    match file_sha256(path) {
        Ok(hash) => report.sha256 = Some(hash),
        Err(e) => tracing::warn!(path = %path.display(), error = %e, "could not hash store"),
    }

    if let Err(e) = validate::validate(path) {
        report.problem = Some(e.to_string());
        return report;
    }

    let counted = Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_ONLY)
        .and_then(|conn| row_counts(&conn));
    match counted {
        Ok(counts) => report.counts = Some(counts),
        Err(e) => report.problem = Some(e.to_string()),
    }

    tracing::debug!(path = %path.display(), size = report.size_bytes, counts = ?report.counts, "store inspected");
    report
}
