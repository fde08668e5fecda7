//! Scripted transport for tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::HeaderMap;
use reqwest::StatusCode;
use serde_json::Value;
use url::Url;

use super::{FetchError, HttpResponse, Transport};

/// Replays queued responses in order, then the fallback response if any.
#[derive(Default)]
pub(crate) struct MockTransport {
    queue: Mutex<VecDeque<Result<HttpResponse, FetchError>>>,
    fallback: Option<HttpResponse>,
    delay: Duration,
    calls: AtomicUsize,
    requests: Mutex<Vec<(Url, HeaderMap)>>,
}

impl MockTransport {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Answer every request with `response` once the queue is empty.
    pub(crate) fn always(response: HttpResponse) -> Self {
        Self {
            fallback: Some(response),
            ..Self::default()
        }
    }

    pub(crate) fn then(self, response: HttpResponse) -> Self {
        self.queue.lock().unwrap().push_back(Ok(response));
        self
    }

    pub(crate) fn then_error(self, error: FetchError) -> Self {
        self.queue.lock().unwrap().push_back(Err(error));
        self
    }

    /// Simulated network latency per request.
    pub(crate) fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub(crate) fn requested_urls(&self) -> Vec<String> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .map(|(url, _)| url.to_string())
            .collect()
    }

    pub(crate) fn last_headers(&self) -> Option<HeaderMap> {
        self.requests
            .lock()
            .unwrap()
            .last()
            .map(|(_, headers)| headers.clone())
    }
}

/// A 200 response carrying `value` as JSON.
pub(crate) fn ok_json(value: Value) -> HttpResponse {
    HttpResponse::new(StatusCode::OK, value.to_string())
}

/// A 429 response asking the client to wait `seconds`.
pub(crate) fn rate_limited(seconds: &str) -> HttpResponse {
    HttpResponse::new(StatusCode::TOO_MANY_REQUESTS, "").with_header("retry-after", seconds)
}

#[async_trait]
impl Transport for MockTransport {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn get(&self, url: &Url, headers: &HeaderMap) -> Result<HttpResponse, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests
            .lock()
            .unwrap()
            .push((url.clone(), headers.clone()));

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let next = self.queue.lock().unwrap().pop_front();
        match next {
            Some(reply) => reply,
            None => self
                .fallback
                .clone()
                .ok_or_else(|| FetchError::Transport("no scripted response".to_string())),
        }
    }
}
