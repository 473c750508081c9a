//! Bootstrap orchestration
//!
//! Three entry points (remote sync, bundled asset, picked file) share one
//! pipeline: fetch into the candidate path, validate, normalize, swap, then
//! seed metadata. Any failure before the swap leaves the live store alone.

use crate::config::{Settings, StoreLayout};
use crate::error::{BootstrapError, BootstrapResult};
use crate::health::{self, RowCounts};
use crate::normalize::{self, NormalizationReport};
use crate::replace::ReplaceManager;
use crate::storage::{MetaStore, StoreError, StoreHandle};
use crate::util::resolve_asset;
use crate::validate;
use chrono::Utc;
use ledgersync_transport::{
    fetch, CandidateSource, LocalSource, ProgressObserver, RemoteSource, ScaledProgress,
    TransportConfig, TransportError,
};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::OwnedMutexGuard;

/// Share of overall progress given to moving bytes
const TRANSPORT_SHARE: f32 = 0.90;
/// Progress once the candidate has validated
const VALIDATED: f32 = 0.93;
/// Progress once the candidate has been normalized
const NORMALIZED: f32 = 0.96;

/// What a successful bootstrap installed
#[derive(Debug, Clone, Serialize)]
pub struct BootstrapSummary {
    /// Where the bytes came from (no secrets)
    pub source: String,
    pub bytes: u64,
    /// Whether an earlier live store was replaced
    pub replaced_existing: bool,
    pub normalization: NormalizationReport,
    /// Metadata keys that were seeded because the source lacked them
    pub seeded: Vec<String>,
    pub counts: RowCounts,
}

/// Runs bootstrap attempts against one store layout
pub struct Bootstrapper<H: StoreHandle + 'static> {
    layout: StoreLayout,
    assets_dir: PathBuf,
    transport: TransportConfig,
    store: Arc<Mutex<H>>,
    /// Held by the attempt in progress. Blocking stages own the guard, so an
    /// attempt whose future is dropped keeps it until its swap resolves.
    in_flight: Arc<tokio::sync::Mutex<()>>,
}

impl<H: StoreHandle + 'static> Bootstrapper<H> {
    /// Create a bootstrapper that owns `handle`
    #[must_use]
    pub fn new(
        layout: StoreLayout,
        assets_dir: PathBuf,
        transport: TransportConfig,
        handle: H,
    ) -> Self {
        Self {
            layout,
            assets_dir,
            transport,
            store: Arc::new(Mutex::new(handle)),
            in_flight: Arc::new(tokio::sync::Mutex::new(())),
        }
    }

    /// Create a bootstrapper from resolved settings
    #[must_use]
    pub fn from_settings(settings: &Settings, handle: H) -> Self {
        Self::new(
            settings.layout(),
            settings.assets_dir(),
            settings.transport(),
            handle,
        )
    }

    /// Store file layout
    #[must_use]
    pub fn layout(&self) -> &StoreLayout {
        &self.layout
    }

    /// Run `f` with the store handle locked
    pub fn with_store<T>(&self, f: impl FnOnce(&mut H) -> T) -> T {
        // Handle mutex poisoning by recovering the lock
        let mut guard = self.store.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard)
    }

    /// Open the handle against the current live store, if there is one.
    ///
    /// Returns whether a store was opened.
    ///
    /// # Errors
    /// Returns an error if the live store exists but cannot be opened
    pub fn open_live(&self) -> Result<bool, StoreError> {
        let live = self.layout.live.clone();
        if !live.is_file() {
            return Ok(false);
        }
        self.with_store(|store| store.open(&live))?;
        Ok(true)
    }

    /// Download the full store from the sync endpoint for `principal`
    ///
    /// # Errors
    /// Returns an error if any stage fails
    pub async fn sync(
        &self,
        endpoint: &str,
        principal: &str,
        code: &str,
        observer: &dyn ProgressObserver,
    ) -> BootstrapResult<BootstrapSummary> {
        self.from_remote(
            endpoint,
            &[
                (ledgersync_transport::remote::PRINCIPAL_PARAM, principal),
                (ledgersync_transport::remote::CODE_PARAM, code),
            ],
            observer,
        )
        .await
    }

    /// Download the full store from `endpoint` with the given query parameters
    ///
    /// # Errors
    /// Returns an error if any stage fails
    pub async fn from_remote(
        &self,
        endpoint: &str,
        params: &[(&str, &str)],
        observer: &dyn ProgressObserver,
    ) -> BootstrapResult<BootstrapSummary> {
        let client = self
            .transport
            .build_client()
            .map_err(|source| BootstrapError::Transport {
                operation: "build HTTP client",
                path: self.layout.candidate.clone(),
                source: TransportError::Request {
                    url: endpoint.to_string(),
                    source,
                },
            })?;

        let source = params
            .iter()
            .fold(RemoteSource::new(client, endpoint), |s, (k, v)| {
                s.with_param(*k, *v)
            });
        self.run(&source, observer).await
    }

    /// Import a seed store shipped in the assets directory
    ///
    /// # Errors
    /// Returns an error if the name is invalid or any stage fails
    pub async fn from_bundled_asset(
        &self,
        name: &str,
        observer: &dyn ProgressObserver,
    ) -> BootstrapResult<BootstrapSummary> {
        let path =
            resolve_asset(&self.assets_dir, name).map_err(|source| BootstrapError::Asset {
                name: name.to_string(),
                source,
            })?;
        self.run(&LocalSource::new(path), observer).await
    }

    /// Import a store file chosen by the user
    ///
    /// # Errors
    /// Returns an error if any stage fails
    pub async fn from_picked_file(
        &self,
        path: &Path,
        observer: &dyn ProgressObserver,
    ) -> BootstrapResult<BootstrapSummary> {
        self.run(&LocalSource::new(path), observer).await
    }

    async fn run(
        &self,
        source: &dyn CandidateSource,
        observer: &dyn ProgressObserver,
    ) -> BootstrapResult<BootstrapSummary> {
        let guard = Arc::clone(&self.in_flight)
            .try_lock_owned()
            .map_err(|_| BootstrapError::InFlight)?;

        let described = source.describe();
        let candidate = self.layout.candidate.clone();
        tracing::info!(source = %described, "bootstrap started");

        let transport_progress = ScaledProgress::new(observer, 0.0, TRANSPORT_SHARE);
        let bytes = fetch(source, &candidate, &transport_progress)
            .await
            .map_err(|source| BootstrapError::Transport {
                operation: "fetch candidate",
                path: candidate.clone(),
                source,
            })?;

        let path = candidate.clone();
        let (validated, guard) = holding(guard, move || validate::validate(&path)).await?;
        validated.map_err(|source| BootstrapError::Validation {
            operation: "validate candidate",
            path: candidate.clone(),
            source,
        })?;
        observer.progress(VALIDATED);

        let path = candidate.clone();
        let (normalized, guard) = holding(guard, move || normalize::normalize(&path)).await?;
        let normalization = normalized.map_err(|source| BootstrapError::Normalization {
            operation: "normalize candidate",
            path: candidate.clone(),
            source,
        })?;
        observer.progress(NORMALIZED);

        let layout = self.layout.clone();
        let store = Arc::clone(&self.store);
        let (installed, _guard) = holding(guard, move || install(&layout, &store)).await?;
        let installed = installed?;
        observer.progress(1.0);

        tracing::info!(
            source = %described,
            bytes,
            transactions = installed.counts.transactions,
            "bootstrap complete"
        );

        Ok(BootstrapSummary {
            source: described,
            bytes,
            replaced_existing: installed.replaced_existing,
            normalization,
            seeded: installed.seeded,
            counts: installed.counts,
        })
    }
}

/// Run `f` on the blocking pool with the in-flight guard moved into the task.
///
/// Dropping the returned future does not stop `f`; the guard is released
/// only once `f` has returned.
async fn holding<T, F>(
    guard: OwnedMutexGuard<()>,
    f: F,
) -> Result<(T, OwnedMutexGuard<()>), tokio::task::JoinError>
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    tokio::task::spawn_blocking(move || {
        let out = f();
        (out, guard)
    })
    .await
}

struct Installed {
    replaced_existing: bool,
    seeded: Vec<String>,
    counts: RowCounts,
}

/// Swap the candidate in, then seed metadata through the reopened handle
fn install<H: StoreHandle>(layout: &StoreLayout, store: &Mutex<H>) -> BootstrapResult<Installed> {
    let mut guard = store.lock().unwrap_or_else(PoisonError::into_inner);

    let outcome = ReplaceManager::new(layout)
        .swap(&mut *guard)
        .map_err(|source| BootstrapError::Swap {
            operation: "swap candidate into place",
            path: layout.live.clone(),
            source,
        })?;

    let seed_err = |source: StoreError| BootstrapError::Seed {
        operation: "seed metadata",
        path: layout.live.clone(),
        source,
    };
    let conn = guard.connection().map_err(seed_err)?;
    let seeded = MetaStore::new(conn)
        .seed_defaults(Utc::now())
        .map_err(seed_err)?;
    if !seeded.is_empty() {
        tracing::info!(keys = ?seeded, "seeded metadata defaults");
    }
    let counts = health::row_counts(conn).map_err(|e| seed_err(e.into()))?;

    Ok(Installed {
        replaced_existing: outcome.replaced_existing,
        seeded: seeded.into_iter().map(str::to_string).collect(),
        counts,
    })
}
