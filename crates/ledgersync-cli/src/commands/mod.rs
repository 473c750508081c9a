//! CLI command handlers
//!
//! `store` covers commands that only look at or create store files;
//! `bootstrap` covers the three ways of installing a new store.

pub mod bootstrap;
pub mod store;
