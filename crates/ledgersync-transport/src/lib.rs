//! ledgersync transport - candidate store delivery
//!
//! Streams store bytes from the sync endpoint or from a local file into
//! the candidate location, reporting fractional progress along the way.

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic)]

pub mod error;
pub mod fetch;
pub mod local;
pub mod progress;
pub mod remote;
pub mod source;

pub use error::TransportError;
pub use fetch::fetch;
pub use local::LocalSource;
pub use progress::{NoProgress, ProgressObserver, ScaledProgress};
pub use remote::{RemoteSource, TransportConfig};
pub use source::CandidateSource;
