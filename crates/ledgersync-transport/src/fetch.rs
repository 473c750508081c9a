//! Fetch a candidate store onto disk

use crate::error::TransportError;
use crate::progress::ProgressObserver;
use crate::source::CandidateSource;
use std::path::Path;
use tokio::fs::{self, File};
use tokio::io::AsyncWriteExt;

/// Stream `source` into `destination`.
///
/// Any stale file at `destination` is removed first. The file is flushed and
/// synced to disk before this returns, so a crash right after success cannot
/// leave a truncated candidate behind.
///
/// Returns the number of bytes written.
///
/// # Errors
/// Returns an error on a failure status, I/O failure, or an empty source
pub async fn fetch(
    source: &dyn CandidateSource,
    destination: &Path,
    observer: &dyn ProgressObserver,
) -> Result<u64, TransportError> {
    if let Some(origin) = source.local_path() {
        if same_file(origin, destination).await {
            return Err(TransportError::SameFile(destination.to_path_buf()));
        }
    }

    prepare_destination(destination).await?;

    let mut out = File::create(destination)
        .await
        .map_err(|e| TransportError::io(destination, e))?;

    tracing::info!(source = %source.describe(), destination = %destination.display(), "fetching candidate");
    let written = source.stream_into(&mut out, destination, observer).await?;

    if written == 0 {
        return Err(TransportError::EmptySource(source.describe()));
    }

    out.flush()
        .await
        .map_err(|e| TransportError::io(destination, e))?;
    out.sync_all()
        .await
        .map_err(|e| TransportError::io(destination, e))?;

    tracing::info!(bytes = written, destination = %destination.display(), "candidate written");
    Ok(written)
}

async fn prepare_destination(destination: &Path) -> Result<(), TransportError> {
    if let Some(parent) = destination.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| TransportError::io(parent, e))?;
        }
    }

    match fs::remove_file(destination).await {
        Ok(()) => {
            tracing::debug!(path = %destination.display(), "removed stale candidate");
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(TransportError::io(destination, e)),
    }
}

async fn same_file(a: &Path, b: &Path) -> bool {
    match (fs::canonicalize(a).await, fs::canonicalize(b).await) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::local::LocalSource;
    use crate::progress::NoProgress;
    use std::sync::Mutex;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_local_fetch_copies_bytes_and_reports_progress() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("seed.sqlite");
        let bytes: Vec<u8> = (0..200_000u32).map(|i| (i % 251) as u8).collect();
        std::fs::write(&src, &bytes).unwrap();

        let dest = temp.path().join("nested/incoming.db");
        let seen = Mutex::new(Vec::new());
        let observer = |f: f32| seen.lock().unwrap().push(f);

        let written = fetch(&LocalSource::new(&src), &dest, &observer)
            .await
            .unwrap();

        assert_eq!(written, bytes.len() as u64);
        assert_eq!(std::fs::read(&dest).unwrap(), bytes);

        let seen = seen.into_inner().unwrap();
        assert!(seen.len() > 1, "expected a report per chunk");
        assert!(seen.windows(2).all(|w| w[0] <= w[1]));
        assert!((seen.last().copied().unwrap() - 1.0).abs() < f32::EPSILON);
    }

    #[tokio::test]
    async fn test_fetch_replaces_stale_destination() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("seed.sqlite");
        std::fs::write(&src, b"fresh").unwrap();
        let dest = temp.path().join("incoming.db");
        std::fs::write(&dest, b"stale bytes that are much longer").unwrap();

        fetch(&LocalSource::new(&src), &dest, &NoProgress)
            .await
            .unwrap();

        assert_eq!(std::fs::read(&dest).unwrap(), b"fresh");
    }

    #[tokio::test]
    async fn test_fetch_rejects_empty_source() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("empty.sqlite");
        std::fs::write(&src, b"").unwrap();
        let dest = temp.path().join("incoming.db");

        let err = fetch(&LocalSource::new(&src), &dest, &NoProgress)
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::EmptySource(_)));
    }

    #[tokio::test]
    async fn test_fetch_missing_source_is_io_error() {
        let temp = TempDir::new().unwrap();
        let err = fetch(
            &LocalSource::new(temp.path().join("nope.sqlite")),
            &temp.path().join("incoming.db"),
            &NoProgress,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, TransportError::Io { .. }));
    }

    #[tokio::test]
    async fn test_fetch_refuses_to_copy_onto_itself() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("incoming.db");
        std::fs::write(&path, b"keep me").unwrap();

        let err = fetch(&LocalSource::new(&path), &path, &NoProgress)
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::SameFile(_)));
        assert_eq!(std::fs::read(&path).unwrap(), b"keep me");
    }
}
