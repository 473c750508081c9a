//! Store handle and connection management

use crate::schema::{self, ContractViolation};
use rusqlite::Connection;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Store errors
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("I/O error for {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Store not found: {0}")]
    NotFound(PathBuf),

    #[error("Store already exists: {0}")]
    AlreadyExists(PathBuf),

    #[error("Store {path} does not satisfy the schema contract: {}", join_violations(.violations))]
    Contract {
        path: PathBuf,
        violations: Vec<ContractViolation>,
    },

    #[error("Store is not open")]
    NotOpen,
}

fn join_violations(violations: &[ContractViolation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Owner of the live store's connection.
///
/// The replace manager closes the handle before renaming files and reopens it
/// afterwards. An implementation must release every OS handle on `close`.
pub trait StoreHandle: Send {
    /// Open the store at `path`, failing if it does not satisfy the contract
    ///
    /// # Errors
    /// Returns an error if the file is missing, unreadable, or off-contract
    fn open(&mut self, path: &Path) -> Result<(), StoreError>;

    /// Close the store, if open
    ///
    /// # Errors
    /// Returns an error if the connection refuses to close
    fn close(&mut self) -> Result<(), StoreError>;

    /// Whether a connection is currently held
    fn is_open(&self) -> bool;

    /// The open connection
    ///
    /// # Errors
    /// Returns [`StoreError::NotOpen`] when closed
    fn connection(&self) -> Result<&Connection, StoreError>;
}

/// `SQLite`-backed store handle
#[derive(Default)]
pub struct LedgerStore {
    conn: Option<Connection>,
    path: Option<PathBuf>,
}

impl LedgerStore {
    /// Create a closed handle
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Open an existing store
    ///
    /// # Errors
    /// Returns an error if the store cannot be opened
    pub fn open_at(path: &Path) -> Result<Self, StoreError> {
        let mut store = Self::new();
        store.open(path)?;
        Ok(store)
    }

    /// Create a new, empty, contract-shaped store at `path` (first run)
    ///
    /// # Errors
    /// Returns an error if a file already exists or creation fails
    pub fn initialize(path: &Path) -> Result<Self, StoreError> {
        if path.exists() {
            return Err(StoreError::AlreadyExists(path.to_path_buf()));
        }
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| StoreError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        {
            let conn = Connection::open(path)?;
            apply_pragmas(&conn)?;
            schema::create_all(&conn)?;
            conn.close().map_err(|(_, e)| e)?;
        }
        tracing::info!(path = %path.display(), "initialized empty store");
        Self::open_at(path)
    }

    /// Path of the open store
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}

impl StoreHandle for LedgerStore {
    fn open(&mut self, path: &Path) -> Result<(), StoreError> {
        self.close()?;

        if !path.is_file() {
            return Err(StoreError::NotFound(path.to_path_buf()));
        }

        let conn = Connection::open_with_flags(
            path,
            rusqlite::OpenFlags::SQLITE_OPEN_READ_WRITE | rusqlite::OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        apply_pragmas(&conn)?;

        let violations = schema::verify(&conn)?;
        if !violations.is_empty() {
            drop(conn);
            return Err(StoreError::Contract {
                path: path.to_path_buf(),
                violations,
            });
        }

        tracing::debug!(path = %path.display(), "store opened");
        self.conn = Some(conn);
        self.path = Some(path.to_path_buf());
        Ok(())
    }

    fn close(&mut self) -> Result<(), StoreError> {
        if let Some(conn) = self.conn.take() {
            if let Err((conn, e)) = conn.close() {
                self.conn = Some(conn);
                return Err(e.into());
            }
            tracing::debug!(path = ?self.path, "store closed");
        }
        self.path = None;
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.conn.is_some()
    }

    fn connection(&self) -> Result<&Connection, StoreError> {
        self.conn.as_ref().ok_or(StoreError::NotOpen)
    }
}

fn apply_pragmas(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.pragma_update(None, "foreign_keys", "ON")?;
    // Rollback journal keeps the store a single file that can be renamed whole
    conn.pragma_update(None, "journal_mode", "DELETE")?;
    conn.pragma_update(None, "synchronous", "FULL")?;
    // 10MB cache
    conn.pragma_update(None, "cache_size", "-10000")?;
    conn.pragma_update(None, "temp_store", "MEMORY")?;
    Ok(())
}
