//! Copy from a file on local disk

use crate::error::TransportError;
use crate::progress::{fraction_of, ProgressObserver};
use crate::source::CandidateSource;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

/// Copy buffer size
pub const CHUNK_SIZE: usize = 64 * 1024;

/// A store file already on disk (bundled asset or user-picked file)
#[derive(Debug, Clone)]
pub struct LocalSource {
    path: PathBuf,
}

impl LocalSource {
    /// Create a source reading `path`
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path being read
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl CandidateSource for LocalSource {
    fn describe(&self) -> String {
        self.path.display().to_string()
    }

    fn local_path(&self) -> Option<&Path> {
        Some(&self.path)
    }

    async fn stream_into(
        &self,
        out: &mut File,
        destination: &Path,
        observer: &dyn ProgressObserver,
    ) -> Result<u64, TransportError> {
        let mut input = File::open(&self.path)
            .await
            .map_err(|e| TransportError::io(&self.path, e))?;
        let total = input
            .metadata()
            .await
            .map_err(|e| TransportError::io(&self.path, e))?
            .len();

        let mut buf = vec![0u8; CHUNK_SIZE];
        let mut written: u64 = 0;
        loop {
            let n = input
                .read(&mut buf)
                .await
                .map_err(|e| TransportError::io(&self.path, e))?;
            if n == 0 {
                break;
            }
            out.write_all(&buf[..n])
                .await
                .map_err(|e| TransportError::io(destination, e))?;
            written += n as u64;
            if total > 0 {
                observer.progress(fraction_of(written, total));
            }
        }

        if total == 0 && written > 0 {
            observer.progress(1.0);
        }

        Ok(written)
    }
}
