//! Transport errors

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while moving candidate bytes onto disk
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Invalid URL {url}: {message}")]
    InvalidUrl { url: String, message: String },

    #[error("HTTP {status} from {url}: {body}")]
    Status {
        status: u16,
        url: String,
        body: String,
    },

    #[error("Request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("I/O error for {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Source is empty: {0}")]
    EmptySource(String),

    #[error("Source and destination are the same file: {0}")]
    SameFile(PathBuf),
}

impl TransportError {
    /// Wrap an I/O error with the path it concerns
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// HTTP status code, if the server answered with a failure status
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// The `error` field of a JSON failure body, if the server sent one
    #[must_use]
    pub fn server_message(&self) -> Option<String> {
        let Self::Status { body, .. } = self else {
            return None;
        };
        serde_json::from_str::<ErrorBody>(body)
            .ok()
            .and_then(|b| b.error.or(b.message))
    }
}

#[derive(serde::Deserialize)]
struct ErrorBody {
    error: Option<String>,
    message: Option<String>,
}
