//! HTTP transport with bounded retries
//!
//! Sends one `RequestDescriptor` and buffers the response. Idempotent methods
//! are retried on connect/timeout failures and on transient statuses; other
//! methods get exactly one attempt. Retries never look at 401, which belongs
//! to the refresh path.
//!
//! A retryable status still reaches the error classifier once the retry
//! budget is spent; the classifier itself never retries.

use std::time::Duration;

use reqwest::{Method, StatusCode};
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::request::{ApiResponse, RequestDescriptor, RequestOptions};

/// Statuses worth another attempt for idempotent methods.
const RETRY_STATUSES: &[StatusCode] = &[
    StatusCode::REQUEST_TIMEOUT,
    StatusCode::PAYLOAD_TOO_LARGE,
    StatusCode::TOO_MANY_REQUESTS,
    StatusCode::INTERNAL_SERVER_ERROR,
    StatusCode::BAD_GATEWAY,
    StatusCode::SERVICE_UNAVAILABLE,
    StatusCode::GATEWAY_TIMEOUT,
];

/// Fixed backoff between attempts.
const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(100);

/// Outbound transport shared by first attempts and replays.
#[derive(Clone)]
pub struct Transport {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
    retry_limit: u32,
    retry_delay: Duration,
}

impl Transport {
    pub fn new(
        client: reqwest::Client,
        base_url: impl Into<String>,
        timeout: Duration,
        retry_limit: u32,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            timeout,
            retry_limit,
            retry_delay: DEFAULT_RETRY_DELAY,
        }
    }

    /// Override the backoff between retries.
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Absolute URL for a request path.
    pub fn url_for(&self, path: &str) -> String {
        join_url(&self.base_url, path)
    }

    /// Send `request`, retrying transient failures for idempotent methods.
    pub async fn send(
        &self,
        request: &RequestDescriptor,
        options: &RequestOptions,
    ) -> Result<ApiResponse> {
        let url = match &options.base_url {
            Some(base_url) => join_url(base_url, &request.path),
            None => self.url_for(&request.path),
        };
        let timeout = options.timeout.unwrap_or(self.timeout);
        let retry_limit = if is_idempotent(&request.method) {
            options.retry_limit.unwrap_or(self.retry_limit)
        } else {
            0
        };
        let max_attempts = retry_limit.saturating_add(1);

        for attempt in 0..max_attempts {
            if attempt > 0 {
                metrics::counter!("session_transport_retries_total").increment(1);
                tokio::time::sleep(self.retry_delay).await;
            }
            let last_attempt = attempt + 1 == max_attempts;

            let mut builder = self
                .client
                .request(request.method.clone(), &url)
                .headers(request.headers.clone())
                .timeout(timeout);
            if let Some(body) = &request.body {
                builder = builder.body(body.clone());
            }

            match builder.send().await {
                Ok(response) => {
                    let status = response.status();
                    if !last_attempt && RETRY_STATUSES.contains(&status) {
                        warn!(attempt, %status, "transient status, retrying");
                        continue;
                    }
                    let headers = response.headers().clone();
                    let body = response
                        .bytes()
                        .await
                        .map_err(|e| Error::Transport(format!("reading response body: {e}")))?;
                    debug!(%status, bytes = body.len(), "response received");
                    return Ok(ApiResponse {
                        status,
                        headers,
                        body,
                    });
                }
                Err(e) if !last_attempt && (e.is_timeout() || e.is_connect()) => {
                    warn!(attempt, error = %e, "transport failure, retrying");
                    continue;
                }
                Err(e) if e.is_timeout() => {
                    return Err(Error::Transport(format!(
                        "timed out after {}ms ({max_attempts} attempts)",
                        timeout.as_millis()
                    )));
                }
                Err(e) => {
                    return Err(Error::Transport(e.to_string()));
                }
            }
        }

        // Should be unreachable: the last attempt always returns
        Err(Error::Transport("retry budget exhausted".into()))
    }
}

/// Join `path` onto `base_url` with exactly one slash. Absolute URLs pass through.
pub(crate) fn join_url(base_url: &str, path: &str) -> String {
    if path.starts_with("http://") || path.starts_with("https://") {
        return path.to_string();
    }
    format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

/// Methods that can be repeated without side effects.
fn is_idempotent(method: &Method) -> bool {
    [
        Method::GET,
        Method::PUT,
        Method::HEAD,
        Method::DELETE,
        Method::OPTIONS,
        Method::TRACE,
    ]
    .contains(method)
}
