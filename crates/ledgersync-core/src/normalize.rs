//! Schema normalization of candidate stores
//!
//! Brings a candidate into contract shape with the cheapest safe transform.
//! A table whose primary key is sound and which only lacks optional columns
//! gets those columns added in place. Any other divergence rebuilds the table
//! through a shadow copy inside one transaction, so a failure leaves the
//! candidate exactly as it was.

use crate::schema::{
    self, quote_ident, ColumnInfo, ContractViolation, TableContract, LEDGER_TABLES, META,
};
use rusqlite::{Connection, OpenFlags};
use serde::Serialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors during normalization
#[derive(Error, Debug)]
pub enum NormalizeError {
    #[error("Cannot open candidate {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    #[error("Failed to normalize table {table}: {source}")]
    Table {
        table: String,
        #[source]
        source: rusqlite::Error,
    },
}

/// What the normalizer did to one table
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum TableAction {
    /// Already in contract shape
    Unchanged,
    /// Table was absent and created empty
    Created,
    /// Optional columns added in place; existing rows read NULL for them
    AddedColumns { columns: Vec<String> },
    /// Copied through a shadow table with the contract shape
    Rebuilt { rows: usize },
    /// Metadata table had the wrong shape and was recreated empty
    Recreated,
}

/// Per-table outcome of a normalization pass
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableReport {
    pub table: String,
    #[serde(flatten)]
    pub action: TableAction,
}

/// Outcome of a normalization pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NormalizationReport {
    pub tables: Vec<TableReport>,
}

impl NormalizationReport {
    fn push(&mut self, table: &str, action: TableAction) {
        self.tables.push(TableReport {
            table: table.to_string(),
            action,
        });
    }

    /// Action taken on `table`, if it was visited
    #[must_use]
    pub fn action_for(&self, table: &str) -> Option<&TableAction> {
        self.tables
            .iter()
            .find(|t| t.table == table)
            .map(|t| &t.action)
    }

    /// Whether any table was changed
    #[must_use]
    pub fn changed(&self) -> bool {
        self.tables
            .iter()
            .any(|t| t.action != TableAction::Unchanged)
    }
}

enum Plan {
    Keep,
    AddColumns(Vec<&'static str>),
    Rebuild,
}

fn plan(contract: &TableContract, columns: &[ColumnInfo]) -> Plan {
    let violations = schema::table_violations(contract, columns);
    if violations.is_empty() {
        return Plan::Keep;
    }

    let mut additions = Vec::new();
    for violation in &violations {
        match violation {
            ContractViolation::MissingColumn { column, .. } => match contract.column(column) {
                Some(c) if c.optional => additions.push(c.name),
                _ => return Plan::Rebuild,
            },
            _ => return Plan::Rebuild,
        }
    }
    Plan::AddColumns(additions)
}

/// Normalize the candidate store at `path` in place
///
/// # Errors
/// Returns an error if the file cannot be opened or a table cannot be
/// reconciled. Each table is handled in its own transaction.
pub fn normalize(path: &Path) -> Result<NormalizationReport, NormalizeError> {
    let open_err = |source| NormalizeError::Open {
        path: path.to_path_buf(),
        source,
    };
    let mut conn = Connection::open_with_flags(
        path,
        OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )
    .map_err(open_err)?;

    let mut report = NormalizationReport::default();
    for contract in &LEDGER_TABLES {
        let action = normalize_table(&mut conn, contract)?;
        tracing::info!(table = contract.name, ?action, "normalized table");
        report.push(contract.name, action);
    }

    let action = ensure_meta(&mut conn)?;
    tracing::info!(table = META.name, ?action, "normalized table");
    report.push(META.name, action);

    conn.close().map_err(|(_, e)| open_err(e))?;
    Ok(report)
}

fn table_error(table: &str) -> impl Fn(rusqlite::Error) -> NormalizeError + '_ {
    move |source| NormalizeError::Table {
        table: table.to_string(),
        source,
    }
}

fn normalize_table(
    conn: &mut Connection,
    contract: &TableContract,
) -> Result<TableAction, NormalizeError> {
    let err = table_error(contract.name);
    let tx = conn.transaction().map_err(&err)?;

    let action = if schema::table_exists(&tx, contract.name).map_err(&err)? {
        let columns = schema::table_columns(&tx, contract.name).map_err(&err)?;
        match plan(contract, &columns) {
            Plan::Keep => TableAction::Unchanged,
            Plan::AddColumns(names) => {
                for name in &names {
                    let column = contract.column(name).map_or("TEXT", |c| c.affinity.sql_type());
                    tx.execute_batch(&format!(
                        "ALTER TABLE {} ADD COLUMN {} {}",
                        quote_ident(contract.name),
                        quote_ident(name),
                        column
                    ))
                    .map_err(&err)?;
                }
                TableAction::AddedColumns {
                    columns: names.iter().map(ToString::to_string).collect(),
                }
            }
            Plan::Rebuild => {
                let rows = rebuild(&tx, contract, &columns).map_err(&err)?;
                TableAction::Rebuilt { rows }
            }
        }
    } else {
        tx.execute_batch(&contract.create_sql(contract.name))
            .map_err(&err)?;
        TableAction::Created
    };

    for sql in contract.index_sql() {
        tx.execute_batch(&sql).map_err(&err)?;
    }

    tx.commit().map_err(&err)?;
    Ok(action)
}

/// Copy every row into a contract-shaped shadow table and swap it in.
///
/// Contract columns missing from the source are filled with NULL; source
/// columns outside the contract are dropped.
fn rebuild(
    conn: &Connection,
    contract: &TableContract,
    existing: &[ColumnInfo],
) -> rusqlite::Result<usize> {
    let shadow = format!("{}__shadow", contract.name);

    conn.execute_batch(&format!("DROP TABLE IF EXISTS {}", quote_ident(&shadow)))?;
    conn.execute_batch(&contract.create_sql(&shadow))?;

    let targets: Vec<String> = contract.columns.iter().map(|c| quote_ident(c.name)).collect();
    let sources: Vec<String> = contract
        .columns
        .iter()
        .map(|c| {
            existing
                .iter()
                .find(|e| e.name.eq_ignore_ascii_case(c.name))
                .map_or_else(|| "NULL".to_string(), |e| quote_ident(&e.name))
        })
        .collect();

    let rows = conn.execute(
        &format!(
            "INSERT INTO {} ({}) SELECT {} FROM {}",
            quote_ident(&shadow),
            targets.join(", "),
            sources.join(", "),
            quote_ident(contract.name)
        ),
        [],
    )?;

    conn.execute_batch(&format!("DROP TABLE {}", quote_ident(contract.name)))?;
    conn.execute_batch(&format!(
        "ALTER TABLE {} RENAME TO {}",
        quote_ident(&shadow),
        quote_ident(contract.name)
    ))?;

    tracing::debug!(table = contract.name, rows, "table rebuilt");
    Ok(rows)
}

fn ensure_meta(conn: &mut Connection) -> Result<TableAction, NormalizeError> {
    let err = table_error(META.name);
    let tx = conn.transaction().map_err(&err)?;

    let action = if schema::table_exists(&tx, META.name).map_err(&err)? {
        let columns = schema::table_columns(&tx, META.name).map_err(&err)?;
        if schema::table_violations(&META, &columns).is_empty() {
            TableAction::Unchanged
        } else {
            tx.execute_batch(&format!("DROP TABLE {}", quote_ident(META.name)))
                .map_err(&err)?;
            tx.execute_batch(&META.create_sql(META.name))
                .map_err(&err)?;
            TableAction::Recreated
        }
    } else {
        tx.execute_batch(&META.create_sql(META.name))
            .map_err(&err)?;
        TableAction::Created
    };

    tx.commit().map_err(&err)?;
    Ok(action)
}
