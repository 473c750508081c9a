//! Byte sources for candidate stores

use crate::error::TransportError;
use crate::progress::ProgressObserver;
use async_trait::async_trait;
use std::path::Path;
use tokio::fs::File;

/// Something that can stream a full store file into an open destination
#[async_trait]
pub trait CandidateSource: Send + Sync {
    /// Human-readable origin, safe to log (no secrets)
    fn describe(&self) -> String;

    /// Path on local disk, if the bytes come from a file
    fn local_path(&self) -> Option<&Path> {
        None
    }

    /// Write every byte into `out`, reporting progress as it goes.
    ///
    /// Returns the number of bytes written. Flushing and syncing `out` is the
    /// caller's job.
    ///
    /// # Errors
    /// Returns an error on a failed request, a failure status, or I/O failure
    async fn stream_into(
        &self,
        out: &mut File,
        destination: &Path,
        observer: &dyn ProgressObserver,
    ) -> Result<u64, TransportError>;
}
