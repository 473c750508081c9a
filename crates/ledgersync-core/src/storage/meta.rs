//! Metadata key/value operations

use crate::storage::db::StoreError;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension};

/// Schema generation marker
pub const SCHEMA_VERSION_KEY: &str = "schemaVersion";
/// Last sync version applied by the server
pub const LAST_VERSION_KEY: &str = "lastVersion";
/// When the installed store was built
pub const BUILD_UTC_KEY: &str = "buildUtc";

/// Value seeded for [`SCHEMA_VERSION_KEY`]
pub const DEFAULT_SCHEMA_VERSION: &str = "1";
/// Value seeded for [`LAST_VERSION_KEY`]
pub const DEFAULT_LAST_VERSION: &str = "0";

/// Metadata storage operations
pub struct MetaStore<'a> {
    conn: &'a Connection,
}

impl<'a> MetaStore<'a> {
    /// Create a new metadata store
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Get a value by key
    ///
    /// # Errors
    /// Returns an error if the value cannot be retrieved
    pub fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let value = self
            .conn
            .query_row(
                r"
                SELECT value FROM Meta WHERE key = ?1 LIMIT 1
                ",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    /// Insert or replace a value
    ///
    /// # Errors
    /// Returns an error if the value cannot be written
    pub fn put(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.conn.execute(
            r"
            INSERT OR REPLACE INTO Meta (key, value) VALUES (?1, ?2)
            ",
            params![key, value],
        )?;
        Ok(())
    }

    /// Insert a value only if the key is absent.
    ///
    /// Returns whether a row was inserted.
    ///
    /// # Errors
    /// Returns an error if the value cannot be written
    pub fn put_if_absent(&self, key: &str, value: &str) -> Result<bool, StoreError> {
        let inserted = self.conn.execute(
            r"
            INSERT OR IGNORE INTO Meta (key, value) VALUES (?1, ?2)
            ",
            params![key, value],
        )?;
        Ok(inserted > 0)
    }

    /// Delete a key
    ///
    /// # Errors
    /// Returns an error if the row cannot be deleted
    pub fn delete(&self, key: &str) -> Result<bool, StoreError> {
        let deleted = self.conn.execute(
            r"
            DELETE FROM Meta WHERE key = ?1
            ",
            params![key],
        )?;
        Ok(deleted > 0)
    }

    /// Seed the default rows that are not already present.
    ///
    /// Returns the keys that were inserted. Existing values are never touched,
    /// so repeated imports keep whatever the source store carried.
    ///
    /// # Errors
    /// Returns an error if a row cannot be written
    pub fn seed_defaults(&self, now: DateTime<Utc>) -> Result<Vec<&'static str>, StoreError> {
        let build_utc = now.to_rfc3339_opts(SecondsFormat::Secs, true);
        let defaults = [
            (LAST_VERSION_KEY, DEFAULT_LAST_VERSION.to_string()),
            (SCHEMA_VERSION_KEY, DEFAULT_SCHEMA_VERSION.to_string()),
            (BUILD_UTC_KEY, build_utc),
        ];

        let mut inserted = Vec::new();
        for (key, value) in defaults {
            if self.put_if_absent(key, &value)? {
                inserted.push(key);
            }
        }
        Ok(inserted)
    }
}
