//! HTTP fetching with rate-limit handling.
//!
//! Every request goes through the `RequestCache`. A `429 Too Many Requests`
//! answer is absorbed: the fetcher waits for the server's `retry-after`,
//! drops the cache entry and asks the cache again, so callers waiting on
//! the same URL keep sharing one request.

mod abort;
#[cfg(test)]
pub(crate) mod testing;
mod transport;

pub use abort::{abortable, AbortHandle, AbortSignal};
pub use transport::{HttpResponse, ReqwestTransport, Transport};

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, RETRY_AFTER};
use reqwest::StatusCode;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, warn};
use url::Url;

use crate::cache::RequestCache;

/// Header carrying the API version on every request.
pub const API_VERSION_HEADER: &str = "x-hive-api-version";

/// Header asking player endpoints to resolve hub title names.
pub const RESOLVE_HUB_TITLES_HEADER: &str = "x-hive-resolve-hub-titles";

/// Errors that can occur during fetching.
///
/// Cloneable because one result is shared by every caller of a coalesced
/// request.
#[derive(Debug, Clone, Error)]
pub enum FetchError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Invalid header {name}: {value}")]
    InvalidHeader { name: String, value: String },

    #[error("Rate limited, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("HTTP {status}: {message}")]
    HttpStatus { status: u16, message: String },

    #[error("JSON error: {0}")]
    Json(String),

    #[error("Request aborted")]
    Aborted,
}

impl FetchError {
    /// Whether this error came from a cancelled request.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, FetchError::Aborted)
    }

    /// HTTP status code, for status errors.
    pub fn status(&self) -> Option<u16> {
        match self {
            FetchError::HttpStatus { status, .. } => Some(*status),
            FetchError::RateLimited { .. } => Some(StatusCode::TOO_MANY_REQUESTS.as_u16()),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        FetchError::Transport(err.to_string())
    }
}

impl From<serde_json::Error> for FetchError {
    fn from(err: serde_json::Error) -> Self {
        FetchError::Json(err.to_string())
    }
}

/// How rate-limited requests are retried.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of 429 retries per call (None = retry forever)
    pub max_rate_limit_retries: Option<u32>,

    /// Wait used when the server sends no usable `retry-after`
    pub default_retry_after: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_rate_limit_retries: None,
            default_retry_after: Duration::from_secs(60),
        }
    }
}

impl RetryPolicy {
    fn allows_retry(&self, attempt: u32) -> bool {
        self.max_rate_limit_retries.map_or(true, |max| attempt <= max)
    }
}

/// A GET request against the API.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub url: Url,

    /// Headers added on top of the fetcher's defaults
    pub headers: HeaderMap,
}

impl ApiRequest {
    pub fn new(url: Url) -> Self {
        Self {
            url,
            headers: HeaderMap::new(),
        }
    }

    pub fn with_header(mut self, name: &'static str, value: &str) -> Result<Self, FetchError> {
        let value = HeaderValue::from_str(value).map_err(|_| FetchError::InvalidHeader {
            name: name.to_string(),
            value: value.to_string(),
        })?;
        self.headers.insert(HeaderName::from_static(name), value);
        Ok(self)
    }

    /// Cache key: the full URL, plus any extra headers that change the response.
    pub fn cache_key(&self) -> String {
        if self.headers.is_empty() {
            return self.url.to_string();
        }

        let mut extras: Vec<String> = self
            .headers
            .iter()
            .map(|(name, value)| format!("{}={}", name, value.to_str().unwrap_or_default()))
            .collect();
        extras.sort();
        format!("{} [{}]", self.url, extras.join(","))
    }
}

/// HTTP fetcher for API requests.
#[derive(Clone)]
pub struct Fetcher {
    transport: Arc<dyn Transport>,
    headers: HeaderMap,
    retry: RetryPolicy,
}

impl fmt::Debug for Fetcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Fetcher")
            .field("transport", &self.transport.name())
            .field("retry", &self.retry)
            .finish()
    }
}

impl Fetcher {
    /// Create a fetcher that sends `api_version` on every request.
    pub fn new(transport: Arc<dyn Transport>, api_version: &str) -> Result<Self, FetchError> {
        let mut headers = HeaderMap::new();
        let value = HeaderValue::from_str(api_version).map_err(|_| FetchError::InvalidHeader {
            name: API_VERSION_HEADER.to_string(),
            value: api_version.to_string(),
        })?;
        headers.insert(HeaderName::from_static(API_VERSION_HEADER), value);

        Ok(Self {
            transport,
            headers,
            retry: RetryPolicy::default(),
        })
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    /// Fetch JSON through the cache, waiting out rate limits.
    pub async fn fetch(
        &self,
        cache: &RequestCache,
        request: &ApiRequest,
        signal: Option<&AbortSignal>,
    ) -> Result<Value, FetchError> {
        let key = request.cache_key();
        let mut attempt = 0;

        loop {
            let shared_fetcher = self.clone();
            let shared_request = request.clone();
            let result = cache
                .get(&key, signal, move |signal| {
                    let fetcher = shared_fetcher.clone();
                    let request = shared_request.clone();
                    async move { abortable(signal.as_ref(), fetcher.fetch_once(&request)).await }
                })
                .await;

            let retry_after_secs = match result {
                Err(FetchError::RateLimited { retry_after_secs }) => retry_after_secs,
                other => return other,
            };

            attempt += 1;
            if !self.retry.allows_retry(attempt) {
                warn!(url = %request.url, attempt, "Giving up after repeated rate limiting");
                return Err(FetchError::RateLimited { retry_after_secs });
            }

            warn!(
                url = %request.url,
                attempt,
                "Rate limited, waiting {}s before retry",
                retry_after_secs
            );
            cache.invalidate(&key);
            abortable(signal, async {
                tokio::time::sleep(Duration::from_secs(retry_after_secs)).await;
                Ok(())
            })
            .await?;
        }
    }

    /// Send one request without caching or retrying.
    pub async fn fetch_once(&self, request: &ApiRequest) -> Result<Value, FetchError> {
        info!(url = %request.url, transport = self.transport.name(), "Fetching");

        let mut headers = self.headers.clone();
        headers.extend(request.headers.clone());

        let response = self.transport.get(&request.url, &headers).await?;

        let status = response.status;
        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after_secs = response
                .headers
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.trim().parse().ok())
                .unwrap_or(self.retry.default_retry_after.as_secs());

            return Err(FetchError::RateLimited { retry_after_secs });
        }

        if !status.is_success() {
            return Err(FetchError::HttpStatus {
                status: status.as_u16(),
                message: status.canonical_reason().unwrap_or("Unknown").to_string(),
            });
        }

        debug!(url = %request.url, bytes = response.body.len(), "Received response");
        Ok(serde_json::from_str(&response.body)?)
    }
}
