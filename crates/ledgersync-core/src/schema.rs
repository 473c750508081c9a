//! Schema contract required by the access layer
//!
//! The store is an `SQLite` file with four tables. Three of them carry the
//! ledger (accounts, account types, transactions); the fourth is a key/value
//! metadata table. Every table has a non-null integer or text primary key.

use rusqlite::{Connection, OptionalExtension};
use serde::Serialize;
use std::fmt;

/// `SQLite` type affinity, used to compare declared column types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Affinity {
    Integer,
    Text,
    Blob,
    Real,
    Numeric,
}

impl Affinity {
    /// Affinity of a declared column type, per the `SQLite` rules
    #[must_use]
    pub fn of_declared(declared: &str) -> Self {
        let upper = declared.to_ascii_uppercase();
        if upper.contains("INT") {
            Self::Integer
        } else if upper.contains("CHAR") || upper.contains("CLOB") || upper.contains("TEXT") {
            Self::Text
        } else if upper.contains("BLOB") || upper.trim().is_empty() {
            Self::Blob
        } else if upper.contains("REAL") || upper.contains("FLOA") || upper.contains("DOUB") {
            Self::Real
        } else {
            Self::Numeric
        }
    }

    /// Type name used when this crate declares a column
    #[must_use]
    pub fn sql_type(self) -> &'static str {
        match self {
            Self::Integer => "INTEGER",
            Self::Text => "TEXT",
            Self::Blob => "BLOB",
            Self::Real => "REAL",
            Self::Numeric => "NUMERIC",
        }
    }
}

/// One column of a contract table
#[derive(Debug, Clone, Copy)]
pub struct ColumnContract {
    pub name: &'static str,
    pub affinity: Affinity,
    /// May be absent in older stores and added in place
    pub optional: bool,
    /// Declared NOT NULL (primary keys are covered separately)
    pub not_null: bool,
}

/// A required index over a single column
#[derive(Debug, Clone, Copy)]
pub struct IndexContract {
    pub name: &'static str,
    pub column: &'static str,
}

/// Required shape of one table
#[derive(Debug, Clone, Copy)]
pub struct TableContract {
    pub name: &'static str,
    pub primary_key: &'static str,
    pub columns: &'static [ColumnContract],
    pub indices: &'static [IndexContract],
}

const fn col(name: &'static str, affinity: Affinity) -> ColumnContract {
    ColumnContract {
        name,
        affinity,
        optional: false,
        not_null: false,
    }
}

const fn required_col(name: &'static str, affinity: Affinity) -> ColumnContract {
    ColumnContract {
        name,
        affinity,
        optional: false,
        not_null: true,
    }
}

const fn optional_col(name: &'static str, affinity: Affinity) -> ColumnContract {
    ColumnContract {
        name,
        affinity,
        optional: true,
        not_null: false,
    }
}

/// Accounts
pub const ACCOUNTS: TableContract = TableContract {
    name: "Acc_Personal",
    primary_key: "AccID",
    columns: &[
        col("AccID", Affinity::Integer),
        col("RDate", Affinity::Text),
        col("Name", Affinity::Text),
        col("Phone", Affinity::Text),
        col("Fax", Affinity::Text),
        col("Address", Affinity::Text),
        col("Description", Affinity::Text),
        col("UAccName", Affinity::Text),
        col("statusg", Affinity::Text),
        col("UserID", Affinity::Integer),
        col("CompanyID", Affinity::Integer),
        col("WName", Affinity::Text),
    ],
    indices: &[],
};

/// Account types (currencies)
pub const ACCOUNT_TYPES: TableContract = TableContract {
    name: "AccType",
    primary_key: "AccTypeID",
    columns: &[
        col("AccTypeID", Affinity::Integer),
        col("AccTypeName", Affinity::Text),
        col("AccTypeNameu", Affinity::Text),
        col("FLAG", Affinity::Text),
    ],
    indices: &[],
};

/// Transactions
pub const TRANSACTIONS: TableContract = TableContract {
    name: "Transactions_P",
    primary_key: "VoucherNo",
    columns: &[
        col("VoucherNo", Affinity::Integer),
        col("TDate", Affinity::Text),
        col("AccID", Affinity::Integer),
        col("AccTypeID", Affinity::Integer),
        col("Description", Affinity::Text),
        col("DrCents", Affinity::Integer),
        col("CrCents", Affinity::Integer),
        optional_col("Status", Affinity::Text),
    ],
    indices: &[
        IndexContract {
            name: "idx_TP_TDate",
            column: "TDate",
        },
        IndexContract {
            name: "idx_TP_AccID",
            column: "AccID",
        },
    ],
};

/// Key/value metadata
pub const META: TableContract = TableContract {
    name: "Meta",
    primary_key: "key",
    columns: &[
        required_col("key", Affinity::Text),
        required_col("value", Affinity::Text),
    ],
    indices: &[],
};

/// Ledger tables, in the order the normalizer visits them
pub const LEDGER_TABLES: [TableContract; 3] = [ACCOUNTS, ACCOUNT_TYPES, TRANSACTIONS];

/// Tables a candidate must already contain to be accepted
pub const REQUIRED_TABLES: [&str; 3] = [ACCOUNTS.name, ACCOUNT_TYPES.name, TRANSACTIONS.name];

impl TableContract {
    /// `CREATE TABLE` statement for this contract under `table_name`
    #[must_use]
    pub fn create_sql(&self, table_name: &str) -> String {
        let mut defs = Vec::with_capacity(self.columns.len());
        for column in self.columns {
            let mut def = format!("{} {}", quote_ident(column.name), column.affinity.sql_type());
            if column.name.eq_ignore_ascii_case(self.primary_key) {
                def.push_str(" NOT NULL PRIMARY KEY");
            } else if column.not_null {
                def.push_str(" NOT NULL");
            }
            defs.push(def);
        }
        format!(
            "CREATE TABLE {} (\n  {}\n)",
            quote_ident(table_name),
            defs.join(",\n  ")
        )
    }

    /// Idempotent `CREATE INDEX` statements for this contract
    #[must_use]
    pub fn index_sql(&self) -> Vec<String> {
        self.indices
            .iter()
            .map(|idx| {
                format!(
                    "CREATE INDEX IF NOT EXISTS {} ON {}({})",
                    quote_ident(idx.name),
                    quote_ident(self.name),
                    quote_ident(idx.column)
                )
            })
            .collect()
    }

    /// Look up a contract column by name (case-insensitive)
    #[must_use]
    pub fn column(&self, name: &str) -> Option<&ColumnContract> {
        self.columns
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(name))
    }
}

/// Quote an identifier for use in SQL text
#[must_use]
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// A column as reported by `PRAGMA table_info`
#[derive(Debug, Clone)]
pub struct ColumnInfo {
    pub name: String,
    pub declared_type: String,
    pub not_null: bool,
    /// 1-based position within the primary key, 0 if not part of it
    pub pk: i64,
}

/// Whether a table exists in the schema catalog
///
/// # Errors
/// Returns an error if the catalog cannot be queried
pub fn table_exists(conn: &Connection, name: &str) -> rusqlite::Result<bool> {
    conn.query_row(
        "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1",
        [name],
        |_| Ok(()),
    )
    .optional()
    .map(|found| found.is_some())
}

/// Whether an index exists in the schema catalog
///
/// # Errors
/// Returns an error if the catalog cannot be queried
pub fn index_exists(conn: &Connection, name: &str) -> rusqlite::Result<bool> {
    conn.query_row(
        "SELECT 1 FROM sqlite_master WHERE type = 'index' AND name = ?1",
        [name],
        |_| Ok(()),
    )
    .optional()
    .map(|found| found.is_some())
}

/// Columns of `table`, in declaration order
///
/// # Errors
/// Returns an error if the pragma fails
pub fn table_columns(conn: &Connection, table: &str) -> rusqlite::Result<Vec<ColumnInfo>> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({})", quote_ident(table)))?;
    let rows = stmt.query_map([], |row| {
        Ok(ColumnInfo {
            name: row.get("name")?,
            declared_type: row.get::<_, Option<String>>("type")?.unwrap_or_default(),
            not_null: row.get::<_, i64>("notnull")? == 1,
            pk: row.get("pk")?,
        })
    })?;
    rows.collect()
}

/// One way a store fails the contract
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum ContractViolation {
    MissingTable(String),
    NullablePrimaryKey { table: String, column: String },
    NullableColumn { table: String, column: String },
    MissingColumn { table: String, column: String },
    UnexpectedColumn { table: String, column: String },
    WrongType { table: String, column: String, declared: String },
    MissingIndex { table: String, index: String },
}

impl fmt::Display for ContractViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingTable(t) => write!(f, "missing table {t}"),
            Self::NullablePrimaryKey { table, column } => {
                write!(f, "{table}.{column} is not a NOT NULL primary key")
            }
            Self::NullableColumn { table, column } => {
                write!(f, "{table}.{column} allows NULL")
            }
            Self::MissingColumn { table, column } => write!(f, "{table} lacks column {column}"),
            Self::UnexpectedColumn { table, column } => {
                write!(f, "{table} has unexpected column {column}")
            }
            Self::WrongType {
                table,
                column,
                declared,
            } => write!(f, "{table}.{column} declared as '{declared}'"),
            Self::MissingIndex { table, index } => write!(f, "{table} lacks index {index}"),
        }
    }
}

/// Compare a table's live columns against its contract.
///
/// Returns every difference; an empty list means the table matches.
#[must_use]
pub fn table_violations(contract: &TableContract, columns: &[ColumnInfo]) -> Vec<ContractViolation> {
    let mut violations = Vec::new();
    let table = contract.name.to_string();

    let pk_ok = columns.iter().any(|c| {
        c.name.eq_ignore_ascii_case(contract.primary_key) && c.pk == 1 && c.not_null
    }) && columns.iter().filter(|c| c.pk > 0).count() == 1;
    if !pk_ok {
        violations.push(ContractViolation::NullablePrimaryKey {
            table: table.clone(),
            column: contract.primary_key.to_string(),
        });
    }

    for expected in contract.columns {
        match columns
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(expected.name))
        {
            None => violations.push(ContractViolation::MissingColumn {
                table: table.clone(),
                column: expected.name.to_string(),
            }),
            Some(actual) if Affinity::of_declared(&actual.declared_type) != expected.affinity => {
                violations.push(ContractViolation::WrongType {
                    table: table.clone(),
                    column: expected.name.to_string(),
                    declared: actual.declared_type.clone(),
                });
            }
            Some(actual)
                if expected.not_null
                    && !actual.not_null
                    && !expected.name.eq_ignore_ascii_case(contract.primary_key) =>
            {
                violations.push(ContractViolation::NullableColumn {
                    table: table.clone(),
                    column: expected.name.to_string(),
                });
            }
            Some(_) => {}
        }
    }

    for actual in columns {
        if contract.column(&actual.name).is_none() {
            violations.push(ContractViolation::UnexpectedColumn {
                table: table.clone(),
                column: actual.name.clone(),
            });
        }
    }

    violations
}

/// Check every clause of the contract against an open store.
///
/// An empty list means the store satisfies the contract.
///
/// # Errors
/// Returns an error if the schema catalog cannot be read
pub fn verify(conn: &Connection) -> rusqlite::Result<Vec<ContractViolation>> {
    let mut violations = Vec::new();

    for contract in LEDGER_TABLES.iter().chain(std::iter::once(&META)) {
        if !table_exists(conn, contract.name)? {
            violations.push(ContractViolation::MissingTable(contract.name.to_string()));
            continue;
        }
        let columns = table_columns(conn, contract.name)?;
        violations.extend(table_violations(contract, &columns));

        for idx in contract.indices {
            if !index_exists(conn, idx.name)? {
                violations.push(ContractViolation::MissingIndex {
                    table: contract.name.to_string(),
                    index: idx.name.to_string(),
                });
            }
        }
    }

    Ok(violations)
}

/// Create every contract table and index in an empty store
///
/// # Errors
/// Returns an error if any statement fails
pub fn create_all(conn: &Connection) -> rusqlite::Result<()> {
    for contract in LEDGER_TABLES.iter().chain(std::iter::once(&META)) {
        conn.execute_batch(&contract.create_sql(contract.name))?;
        for sql in contract.index_sql() {
            conn.execute_batch(&sql)?;
        }
    }
    Ok(())
}
