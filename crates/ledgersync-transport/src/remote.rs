//! HTTP download of a full store file

use crate::error::TransportError;
use crate::progress::{fraction_of, ProgressObserver};
use crate::source::CandidateSource;
use async_trait::async_trait;
use reqwest::{Client, Response, Url};
use std::path::Path;
use std::time::Duration;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;

/// Failure bodies are cut to this many characters before they reach an error
pub const MAX_ERROR_BODY_CHARS: usize = 4000;

/// Query parameter naming the requesting principal
pub const PRINCIPAL_PARAM: &str = "email";

/// Query parameter carrying the one-time code
pub const CODE_PARAM: &str = "otp";

/// HTTP client tuning
#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub user_agent: String,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(15),
            request_timeout: Duration::from_secs(300),
            user_agent: format!("ledgersync/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl TransportConfig {
    /// Build an HTTP client with these settings
    ///
    /// # Errors
    /// Returns an error if the TLS backend cannot be initialized
    pub fn build_client(&self) -> Result<Client, reqwest::Error> {
        Client::builder()
            .connect_timeout(self.connect_timeout)
            .timeout(self.request_timeout)
            .user_agent(self.user_agent.clone())
            .build()
    }
}

/// GET request against the sync endpoint
pub struct RemoteSource {
    client: Client,
    endpoint: String,
    query: Vec<(String, String)>,
}

impl RemoteSource {
    /// Create a source for `endpoint` with no query parameters
    #[must_use]
    pub fn new(client: Client, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
            query: Vec::new(),
        }
    }

    /// Standard sync request: the principal and its one-time code
    #[must_use]
    pub fn sync(client: Client, endpoint: impl Into<String>, principal: &str, code: &str) -> Self {
        Self::new(client, endpoint)
            .with_param(PRINCIPAL_PARAM, principal)
            .with_param(CODE_PARAM, code)
    }

    /// Append a query parameter
    #[must_use]
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    fn parse_endpoint(&self) -> Result<Url, TransportError> {
        Url::parse(&self.endpoint).map_err(|e| TransportError::InvalidUrl {
            url: self.endpoint.clone(),
            message: e.to_string(),
        })
    }
}

#[async_trait]
impl CandidateSource for RemoteSource {
    fn describe(&self) -> String {
        // Query values carry the one-time code; only the endpoint is shown.
        let keys: Vec<&str> = self.query.iter().map(|(k, _)| k.as_str()).collect();
        if keys.is_empty() {
            self.endpoint.clone()
        } else {
            format!("{} (params: {})", self.endpoint, keys.join(", "))
        }
    }

    async fn stream_into(
        &self,
        out: &mut File,
        destination: &Path,
        observer: &dyn ProgressObserver,
    ) -> Result<u64, TransportError> {
        let url = self.parse_endpoint()?;
        let shown = url.as_str().to_string();

        tracing::debug!(endpoint = %shown, "HTTP GET");
        let mut response = self
            .client
            .get(url)
            .query(&self.query)
            .send()
            .await
            .map_err(|source| TransportError::Request {
                url: shown.clone(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = read_error_body(&mut response).await;
            tracing::warn!(endpoint = %shown, status = status.as_u16(), "sync endpoint refused request");
            return Err(TransportError::Status {
                status: status.as_u16(),
                url: shown,
                body,
            });
        }

        let total = response.content_length().filter(|len| *len > 0);
        let mut written: u64 = 0;

        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|source| TransportError::Request {
                url: shown.clone(),
                source,
            })?
        {
            out.write_all(&chunk)
                .await
                .map_err(|e| TransportError::io(destination, e))?;
            written += chunk.len() as u64;
            if let Some(total) = total {
                observer.progress(fraction_of(written, total));
            }
        }

        if total.is_none() {
            observer.progress(1.0);
        }

        tracing::debug!(endpoint = %shown, bytes = written, "download finished");
        Ok(written)
    }
}

/// Read at most [`MAX_ERROR_BODY_CHARS`] of a failure body.
///
/// A read error ends the body with a marker instead of failing the request;
/// the status is the error that matters.
async fn read_error_body(response: &mut Response) -> String {
    // A char is at most four bytes in UTF-8
    let limit = MAX_ERROR_BODY_CHARS * 4;
    let mut raw = Vec::new();
    let mut unreadable = None;

    while raw.len() < limit {
        match response.chunk().await {
            Ok(Some(chunk)) => raw.extend_from_slice(&chunk),
            Ok(None) => break,
            Err(e) => {
                unreadable = Some(e);
                break;
            }
        }
    }
    raw.truncate(limit);

    let mut body: String = String::from_utf8_lossy(&raw)
        .chars()
        .take(MAX_ERROR_BODY_CHARS)
        .collect();
    if let Some(e) = unreadable {
        body.push_str(&format!("<body unreadable: {e}>"));
    }
    body
}
