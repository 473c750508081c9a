//! ledgersync core - bootstrap and atomic replacement of the ledger store
//!
//! This crate validates candidate stores, reconciles their schema with the
//! contract the access layer needs, and swaps them in place of the live
//! store with backup and rollback.

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic)]

pub mod bootstrap;
pub mod config;
pub mod error;
pub mod health;
pub mod normalize;
pub mod replace;
pub mod schema;
pub mod storage;
pub mod util;
pub mod validate;

pub use ledgersync_transport;

pub use bootstrap::{BootstrapSummary, Bootstrapper};
pub use config::{Settings, StoreLayout};
pub use error::{BootstrapError, BootstrapResult};
pub use normalize::{NormalizationReport, TableAction};
pub use replace::{ReplaceManager, SwapError};
pub use storage::{LedgerStore, StoreHandle};
