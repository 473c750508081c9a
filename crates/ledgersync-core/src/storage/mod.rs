//! Storage layer (`SQLite` store handle + metadata)

pub mod db;
pub mod meta;

pub use db::{LedgerStore, StoreError, StoreHandle};
pub use meta::MetaStore;
