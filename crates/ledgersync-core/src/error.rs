//! Consolidated bootstrap error

use crate::normalize::NormalizeError;
use crate::replace::SwapError;
use crate::storage::StoreError;
use crate::util::PathError;
use crate::validate::ValidationError;
use ledgersync_transport::TransportError;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for bootstrap operations
pub type BootstrapResult<T> = Result<T, BootstrapError>;

/// Errors surfaced by the bootstrap orchestrator.
///
/// Every stage failure names the operation and the file it concerned. Except
/// for an unrecoverable swap, the live store is untouched by any of these.
#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("{operation} failed for {path}: {source}")]
    Transport {
        operation: &'static str,
        path: PathBuf,
        #[source]
        source: TransportError,
    },

    #[error("{operation} failed for {path}: {source}")]
    Validation {
        operation: &'static str,
        path: PathBuf,
        #[source]
        source: ValidationError,
    },

    #[error("{operation} failed for {path}: {source}")]
    Normalization {
        operation: &'static str,
        path: PathBuf,
        #[source]
        source: NormalizeError,
    },

    #[error("{operation} failed for {path}: {source}")]
    Swap {
        operation: &'static str,
        path: PathBuf,
        #[source]
        source: SwapError,
    },

    /// The new store is live, but post-install bookkeeping failed
    #[error("{operation} failed for {path}: {source}")]
    Seed {
        operation: &'static str,
        path: PathBuf,
        #[source]
        source: StoreError,
    },

    #[error("Invalid asset name '{name}': {source}")]
    Asset {
        name: String,
        #[source]
        source: PathError,
    },

    #[error("Another bootstrap is already in progress")]
    InFlight,

    #[error("Background task failed: {0}")]
    Background(String),
}

impl BootstrapError {
    /// Get the error code for CLI/API responses
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::Transport { .. } => "TRANSPORT_ERROR",
            Self::Validation { .. } => "VALIDATION_ERROR",
            Self::Normalization { .. } => "NORMALIZATION_ERROR",
            Self::Swap { source, .. } if source.is_unrecoverable() => "ROLLBACK_FAILED",
            Self::Swap { .. } => "SWAP_FAILED",
            Self::Seed { .. } => "SEED_FAILED",
            Self::Asset { .. } => "INVALID_ASSET",
            Self::InFlight => "IN_PROGRESS",
            Self::Background(_) => "INTERNAL_ERROR",
        }
    }

    /// True only when the swap's own rollback failed.
    ///
    /// In that case the live path may hold neither store in a usable state.
    #[must_use]
    pub fn is_unrecoverable(&self) -> bool {
        matches!(self, Self::Swap { source, .. } if source.is_unrecoverable())
    }
}

impl From<tokio::task::JoinError> for BootstrapError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::Background(err.to_string())
    }
}
