//! Atomic replacement of the live store
//!
//! Swap sequence: close the handle, clear any stale backup, move live to
//! backup, move candidate to live, reopen the handle against the new store.
//! A failure after live has moved restores the backup, validates it, and
//! reopens it. Only a failure of that restore is unrecoverable.

use crate::config::StoreLayout;
use crate::storage::{StoreError, StoreHandle};
use crate::validate::{self, ValidationError};
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors during the swap
#[derive(Error, Debug)]
pub enum SwapError {
    #[error("Candidate store not found: {0}")]
    CandidateMissing(PathBuf),

    #[error("Candidate store is not valid: {0}")]
    CandidateInvalid(#[source] ValidationError),

    #[error("Could not close the live store: {0}")]
    Close(#[source] StoreError),

    #[error("Failed to {step} ({path}); live store untouched: {source}")]
    Prepare {
        step: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to install candidate at {path}; previous store restored: {source}")]
    Install {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("New store at {path} could not be opened; previous store restored: {source}")]
    Reopen {
        path: PathBuf,
        #[source]
        source: StoreError,
    },

    #[error("Rollback failed after '{cause}': {rollback}")]
    RollbackFailed { cause: String, rollback: String },
}

impl SwapError {
    /// True only when rollback itself failed and the live path may be unusable
    #[must_use]
    pub fn is_unrecoverable(&self) -> bool {
        matches!(self, Self::RollbackFailed { .. })
    }
}

/// File operations used by the swap
pub trait FileOps {
    /// Rename `from` to `to`
    ///
    /// # Errors
    /// Returns the OS error
    fn rename(&self, from: &Path, to: &Path) -> io::Result<()>;

    /// Delete a file
    ///
    /// # Errors
    /// Returns the OS error
    fn remove_file(&self, path: &Path) -> io::Result<()>;

    /// Whether a file exists at `path`
    fn exists(&self, path: &Path) -> bool;
}

/// Operating system file operations
#[derive(Debug, Clone, Copy, Default)]
pub struct OsFileOps;

impl FileOps for OsFileOps {
    fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        std::fs::rename(from, to)
    }

    fn remove_file(&self, path: &Path) -> io::Result<()> {
        std::fs::remove_file(path)
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }
}

/// Result of a successful swap
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwapOutcome {
    /// Whether a previous live store existed and was replaced
    pub replaced_existing: bool,
}

/// Performs the live/candidate swap for one layout
pub struct ReplaceManager<'a, F: FileOps = OsFileOps> {
    layout: &'a StoreLayout,
    fs: F,
}

impl<'a> ReplaceManager<'a, OsFileOps> {
    /// Create a manager using the real filesystem
    #[must_use]
    pub fn new(layout: &'a StoreLayout) -> Self {
        Self {
            layout,
            fs: OsFileOps,
        }
    }
}

impl<'a, F: FileOps> ReplaceManager<'a, F> {
    /// Create a manager with custom file operations
    #[must_use]
    pub fn with_file_ops(layout: &'a StoreLayout, fs: F) -> Self {
        Self { layout, fs }
    }

    /// Replace the live store with the candidate.
    ///
    /// On success the handle is open against the new live store and no
    /// backup remains. On a recoverable failure the previous store is back at
    /// the live path and the handle is as it was before the call: open if it
    /// was open, closed otherwise. A previous store the handle could not open
    /// (off-contract, say) is restored byte for byte and left closed.
    ///
    /// # Errors
    /// Returns an error if the swap did not complete
    pub fn swap(&self, handle: &mut dyn StoreHandle) -> Result<SwapOutcome, SwapError> {
        let StoreLayout {
            live,
            candidate,
            backup,
        } = self.layout;

        if !self.fs.exists(candidate) {
            return Err(SwapError::CandidateMissing(candidate.clone()));
        }
        validate::validate(candidate).map_err(SwapError::CandidateInvalid)?;

        let was_open = handle.is_open();
        handle.close().map_err(SwapError::Close)?;

        if self.fs.exists(backup) {
            tracing::warn!(path = %backup.display(), "removing stale backup");
            self.fs
                .remove_file(backup)
                .map_err(|source| self.prepare_failed(handle, "remove stale backup", backup, source))?;
        }

        let had_live = self.fs.exists(live);
        if had_live {
            self.fs
                .rename(live, backup)
                .map_err(|source| self.prepare_failed(handle, "move live store to backup", live, source))?;
            tracing::debug!(from = %live.display(), to = %backup.display(), "live moved to backup");
        } else {
            tracing::info!(path = %live.display(), "no live store yet; skipping backup");
        }

        if let Err(source) = self.fs.rename(candidate, live) {
            tracing::error!(error = %source, "failed to move candidate into place");
            self.rollback(handle, had_live, was_open, &source.to_string())?;
            return Err(SwapError::Install {
                path: live.clone(),
                source,
            });
        }

        if let Err(source) = handle.open(live) {
            tracing::error!(error = %source, "new live store failed to open");
            self.rollback(handle, had_live, was_open, &source.to_string())?;
            return Err(SwapError::Reopen {
                path: live.clone(),
                source,
            });
        }

        if had_live {
            if let Err(e) = self.fs.remove_file(backup) {
                // The swap already succeeded; the next attempt clears this.
                tracing::warn!(path = %backup.display(), error = %e, "could not delete backup");
            }
        }

        tracing::info!(path = %live.display(), replaced = had_live, "swap complete");
        Ok(SwapOutcome {
            replaced_existing: had_live,
        })
    }

    /// Failure before the live store moved: reopen it and report
    fn prepare_failed(
        &self,
        handle: &mut dyn StoreHandle,
        step: &'static str,
        path: &Path,
        source: io::Error,
    ) -> SwapError {
        if self.fs.exists(&self.layout.live) {
            if let Err(e) = handle.open(&self.layout.live) {
                tracing::warn!(error = %e, "could not reopen live store after aborted swap");
            }
        }
        SwapError::Prepare {
            step,
            path: path.to_path_buf(),
            source,
        }
    }

    /// Put the previous store back at the live path.
    ///
    /// The restored file is validated before rollback counts as successful.
    /// It must also reopen if the handle held it before the swap.
    fn rollback(
        &self,
        handle: &mut dyn StoreHandle,
        had_live: bool,
        was_open: bool,
        cause: &str,
    ) -> Result<(), SwapError> {
        let StoreLayout { live, backup, .. } = self.layout;
        let failed = |rollback: String| SwapError::RollbackFailed {
            cause: cause.to_string(),
            rollback,
        };

        if let Err(e) = handle.close() {
            tracing::warn!(error = %e, "could not close handle during rollback");
        }

        if self.fs.exists(live) {
            self.fs
                .remove_file(live)
                .map_err(|e| failed(format!("cannot remove rejected store {}: {e}", live.display())))?;
        }

        if !had_live {
            tracing::info!("rolled back first install; no previous store to restore");
            return Ok(());
        }

        self.fs
            .rename(backup, live)
            .map_err(|e| failed(format!("cannot restore backup {}: {e}", backup.display())))?;

        validate::validate(live)
            .map_err(|e| failed(format!("restored store is not valid: {e}")))?;

        match handle.open(live) {
            Ok(()) => {}
            Err(e) if was_open => {
                return Err(failed(format!("restored store cannot be opened: {e}")));
            }
            Err(e) => {
                tracing::warn!(
                    path = %live.display(),
                    error = %e,
                    "previous store restored but left closed, as it was before the swap"
                );
                return Ok(());
            }
        }

        tracing::warn!(path = %live.display(), "previous store restored");
        Ok(())
    }
}
