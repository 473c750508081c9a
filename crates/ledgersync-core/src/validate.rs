//! Read-only integrity validation of candidate stores

use crate::schema::{self, ContractViolation, REQUIRED_TABLES};
use rusqlite::{Connection, OpenFlags};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors from candidate validation
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("Store file not found: {0}")]
    NotFound(PathBuf),

    #[error("Cannot open store read-only: {0}")]
    Open(#[source] rusqlite::Error),

    #[error("Integrity check did not pass: {0}")]
    Integrity(String),

    #[error("Missing required tables: {}", .0.join(", "))]
    MissingTables(Vec<String>),
}

/// Open `path` read-only.
///
/// No collation or extension is registered on this connection, so a corrupt
/// page cannot be hidden behind a custom comparison.
fn open_read_only(path: &Path) -> Result<Connection, ValidationError> {
    if !path.is_file() {
        return Err(ValidationError::NotFound(path.to_path_buf()));
    }
    let conn = Connection::open_with_flags(
        path,
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )
    .map_err(ValidationError::Open)?;
    conn.pragma_update(None, "query_only", "ON")
        .map_err(ValidationError::Open)?;
    Ok(conn)
}

/// Run the engine's built-in consistency check.
///
/// Only a single row reading exactly `ok` passes.
///
/// # Errors
/// Returns an error describing the first failure reported
pub fn integrity_check(path: &Path) -> Result<(), ValidationError> {
    let conn = open_read_only(path)?;
    let mut stmt = conn
        .prepare("PRAGMA integrity_check")
        .map_err(|e| ValidationError::Integrity(e.to_string()))?;
    let rows: Vec<String> = stmt
        .query_map([], |row| row.get::<_, String>(0))
        .and_then(|rows| rows.collect())
        .map_err(|e| ValidationError::Integrity(e.to_string()))?;

    match rows.as_slice() {
        [only] if only == "ok" => Ok(()),
        [] => Err(ValidationError::Integrity("no result".to_string())),
        [first, ..] => Err(ValidationError::Integrity(first.clone())),
    }
}

/// Required tables absent from the candidate's schema catalog
///
/// # Errors
/// Returns an error if the catalog cannot be read
pub fn missing_tables(path: &Path) -> Result<Vec<String>, ValidationError> {
    let conn = open_read_only(path)?;
    let mut missing = Vec::new();
    for name in REQUIRED_TABLES {
        let found = schema::table_exists(&conn, name).map_err(ValidationError::Open)?;
        if !found {
            missing.push(name.to_string());
        }
    }
    Ok(missing)
}

/// Whether the file passes the engine's consistency check
#[must_use]
pub fn structurally_valid(path: &Path) -> bool {
    match integrity_check(path) {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "integrity check failed");
            false
        }
    }
}

/// Whether every required table exists
#[must_use]
pub fn has_required_tables(path: &Path) -> bool {
    match missing_tables(path) {
        Ok(missing) => missing.is_empty(),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "schema check failed");
            false
        }
    }
}

/// Full validation: consistency check, then required tables
///
/// # Errors
/// Returns the first failed check
pub fn validate(path: &Path) -> Result<(), ValidationError> {
    integrity_check(path)?;
    let missing = missing_tables(path)?;
    if !missing.is_empty() {
        return Err(ValidationError::MissingTables(missing));
    }
    tracing::debug!(path = %path.display(), "candidate validated");
    Ok(())
}

/// Differences between a store and the full schema contract.
///
/// Read-only; an empty list means the store could be installed without
/// normalization.
///
/// # Errors
/// Returns an error if the file cannot be opened or its catalog read
pub fn contract_differences(path: &Path) -> Result<Vec<ContractViolation>, ValidationError> {
    let conn = open_read_only(path)?;
    schema::verify(&conn).map_err(ValidationError::Open)
}
