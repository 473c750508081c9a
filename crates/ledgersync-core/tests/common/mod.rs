//! Shared fixtures for store tests

#![allow(dead_code)]

use ledgersync_core::replace::FileOps;
use ledgersync_core::storage::{LedgerStore, StoreError, StoreHandle};
use rusqlite::Connection;
use sha2::{Digest, Sha256};
use std::cell::Cell;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Ledger tables in the current contract shape, no metadata table
pub const CURRENT_SCHEMA: &str = r"
    CREATE TABLE Acc_Personal (
      AccID INTEGER NOT NULL PRIMARY KEY,
      RDate TEXT, Name TEXT, Phone TEXT, Fax TEXT, Address TEXT,
      Description TEXT, UAccName TEXT, statusg TEXT,
      UserID INTEGER, CompanyID INTEGER, WName TEXT
    );
    CREATE TABLE AccType (
      AccTypeID INTEGER NOT NULL PRIMARY KEY,
      AccTypeName TEXT, AccTypeNameu TEXT, FLAG TEXT
    );
    CREATE TABLE Transactions_P (
      VoucherNo INTEGER NOT NULL PRIMARY KEY,
      TDate TEXT, AccID INTEGER, AccTypeID INTEGER, Description TEXT,
      DrCents INTEGER, CrCents INTEGER, Status TEXT
    );
";

/// Older export: transactions lack the Status column, keys are sound
pub const NO_STATUS_SCHEMA: &str = r"
    CREATE TABLE Acc_Personal (
      AccID INTEGER NOT NULL PRIMARY KEY,
      RDate TEXT, Name TEXT, Phone TEXT, Fax TEXT, Address TEXT,
      Description TEXT, UAccName TEXT, statusg TEXT,
      UserID INTEGER, CompanyID INTEGER, WName TEXT
    );
    CREATE TABLE AccType (
      AccTypeID INTEGER NOT NULL PRIMARY KEY,
      AccTypeName TEXT, AccTypeNameu TEXT, FLAG TEXT
    );
    CREATE TABLE Transactions_P (
      VoucherNo INTEGER NOT NULL PRIMARY KEY,
      TDate TEXT, AccID INTEGER, AccTypeID INTEGER, Description TEXT,
      DrCents INTEGER, CrCents INTEGER
    );
";

/// Desktop export: primary keys are declared without NOT NULL
pub const NULLABLE_PK_SCHEMA: &str = r"
    CREATE TABLE Acc_Personal (
      AccID INTEGER PRIMARY KEY,
      RDate TEXT, Name TEXT, Phone TEXT, Fax TEXT, Address TEXT,
      Description TEXT, UAccName TEXT, statusg TEXT,
      UserID INTEGER, CompanyID INTEGER, WName TEXT
    );
    CREATE TABLE AccType (
      AccTypeID INTEGER PRIMARY KEY,
      AccTypeName TEXT, AccTypeNameu TEXT, FLAG TEXT
    );
    CREATE TABLE Transactions_P (
      VoucherNo INTEGER PRIMARY KEY,
      TDate TEXT, AccID INTEGER, AccTypeID INTEGER, Description TEXT,
      DrCents INTEGER, CrCents INTEGER
    );
";

/// Create a store at `path` with `schema` and `tx_count` transactions
pub fn write_store(path: &Path, schema: &str, tx_count: i64) {
    let conn = Connection::open(path).unwrap();
    conn.execute_batch(schema).unwrap();
    seed_rows(&conn, tx_count);
}

/// Insert two accounts, two account types and `tx_count` transactions
pub fn seed_rows(conn: &Connection, tx_count: i64) {
    conn.execute_batch(
        r"
        INSERT INTO Acc_Personal (AccID, RDate, Name, Phone, UserID, CompanyID)
          VALUES (1, '2024-01-01', 'Cash', '111', 7, 1),
                 (2, '2024-01-02', 'Bank', '222', 7, 1);
        INSERT INTO AccType (AccTypeID, AccTypeName, AccTypeNameu, FLAG)
          VALUES (1, 'PKR', 'Rupee', 'pk'),
                 (2, 'USD', 'Dollar', 'us');
        ",
    )
    .unwrap();

    let mut stmt = conn
        .prepare(
            "INSERT INTO Transactions_P (VoucherNo, TDate, AccID, AccTypeID, Description, DrCents, CrCents)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        )
        .unwrap();
    for i in 1..=tx_count {
        stmt.execute(rusqlite::params![
            i,
            format!("2024-02-{:02}", (i % 28) + 1),
            (i % 2) + 1,
            (i % 2) + 1,
            format!("entry {i}"),
            i * 100,
            i * 50,
        ])
        .unwrap();
    }
}

/// A complete contract-shaped store with `tx_count` transactions
pub fn write_current_store(path: &Path, tx_count: i64) {
    let conn = Connection::open(path).unwrap();
    ledgersync_core::schema::create_all(&conn).unwrap();
    seed_rows(&conn, tx_count);
}

pub fn count(path: &Path, table: &str) -> i64 {
    let conn = Connection::open(path).unwrap();
    conn.query_row(&format!("SELECT COUNT(*) FROM \"{table}\""), [], |r| {
        r.get(0)
    })
    .unwrap()
}

pub fn sha256(path: &Path) -> String {
    let mut hasher = Sha256::new();
    hasher.update(fs::read(path).unwrap());
    hex::encode(hasher.finalize())
}

/// Transaction rows as comparable tuples, ordered by key
pub fn transactions(path: &Path) -> Vec<(i64, Option<String>, Option<i64>, Option<i64>)> {
    let conn = Connection::open(path).unwrap();
    let mut stmt = conn
        .prepare("SELECT VoucherNo, TDate, AccID, DrCents FROM Transactions_P ORDER BY VoucherNo")
        .unwrap();
    let rows = stmt
        .query_map([], |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?, r.get(3)?)))
        .unwrap();
    rows.collect::<Result<Vec<_>, _>>().unwrap()
}

/// Number of transactions with a non-NULL Status
pub fn statuses_set(path: &Path) -> i64 {
    let conn = Connection::open(path).unwrap();
    conn.query_row(
        "SELECT COUNT(*) FROM Transactions_P WHERE Status IS NOT NULL",
        [],
        |r| r.get(0),
    )
    .unwrap()
}

/// Store handle whose next `open` fails once, then behaves normally
pub struct FailNextOpen {
    inner: LedgerStore,
    armed: bool,
}

impl FailNextOpen {
    pub fn new() -> Self {
        Self {
            inner: LedgerStore::new(),
            armed: false,
        }
    }

    pub fn arm(&mut self) {
        self.armed = true;
    }
}

impl StoreHandle for FailNextOpen {
    fn open(&mut self, path: &Path) -> Result<(), StoreError> {
        if self.armed {
            self.armed = false;
            self.inner.close()?;
            return Err(StoreError::NotFound(path.to_path_buf()));
        }
        self.inner.open(path)
    }

    fn close(&mut self) -> Result<(), StoreError> {
        self.inner.close()
    }

    fn is_open(&self) -> bool {
        self.inner.is_open()
    }

    fn connection(&self) -> Result<&Connection, StoreError> {
        self.inner.connection()
    }
}

/// Real file operations, except the next `failures` renames onto
/// `target` fail with a permission error
pub struct FailingRename {
    pub target: PathBuf,
    pub failures: Cell<usize>,
}

impl FailingRename {
    pub fn new(target: &Path, failures: usize) -> Self {
        Self {
            target: target.to_path_buf(),
            failures: Cell::new(failures),
        }
    }
}

impl FileOps for FailingRename {
    fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        if to == self.target && self.failures.get() > 0 {
            self.failures.set(self.failures.get() - 1);
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                "injected rename failure",
            ));
        }
        fs::rename(from, to)
    }

    fn remove_file(&self, path: &Path) -> io::Result<()> {
        fs::remove_file(path)
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }
}
