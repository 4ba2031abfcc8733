//! HTTP retry helpers for transient errors.
//!
//! Every upstream request goes through [`send_json`] instead of calling
//! `reqwest::RequestBuilder::send()` directly, so connection failures,
//! timeouts, rate limiting and server errors are retried with exponential
//! backoff.
//!
//! ```ignore
//! let body = retry::send_json(|| client.get(&url).query(&params)).await?;
//! ```

use std::time::Duration;

use crate::SourceError;

/// Maximum number of retry attempts for transient HTTP errors.
///
/// With exponential backoff (2s, 4s, 8s, 16s) the total wait before giving
/// up is 30 seconds.
pub const MAX_RETRIES: u32 = 4;

/// Maximum length of the response body preview included in error logs.
const BODY_PREVIEW_LEN: usize = 300;

/// Sends an HTTP request and parses the response body as JSON.
///
/// The `build_request` closure is called on each attempt to construct a
/// fresh [`reqwest::RequestBuilder`] (builders are consumed by `.send()`).
///
/// Retries up to [`MAX_RETRIES`] times on connection errors, timeouts,
/// HTTP 429 and HTTP 5xx. Other 4xx responses fail immediately.
///
/// # Errors
///
/// Returns [`SourceError`] if the request fails after all retries, the
/// server returns a non-retryable status code, or the body is not JSON.
#[allow(clippy::future_not_send)]
pub async fn send_json<F>(build_request: F) -> Result<serde_json::Value, SourceError>
where
    F: Fn() -> reqwest::RequestBuilder,
{
    let response = send_inner(&build_request, MAX_RETRIES).await?;
    let url = response.url().to_string();
    let text = response.text().await?;

    serde_json::from_str(&text).map_err(|e| {
        let preview: String = text.chars().take(BODY_PREVIEW_LEN).collect();
        log::error!("JSON parse failed for {url}: {e}\n  body preview: {preview}");
        SourceError::Json(e)
    })
}

/// Sends the request built by `build_request`, retrying on transient errors
/// up to `max_retries` times. Returns the successful response.
#[allow(clippy::future_not_send)]
async fn send_inner<F>(
    build_request: &F,
    max_retries: u32,
) -> Result<reqwest::Response, SourceError>
where
    F: Fn() -> reqwest::RequestBuilder,
{
    let mut attempt = 0;

    loop {
        if attempt > 0 {
            let delay = backoff(attempt);
            log::warn!("  retry {attempt}/{max_retries} in {delay:?}...");
            tokio::time::sleep(delay).await;
        }
        let last = attempt >= max_retries;
        attempt += 1;

        match build_request().send().await {
            Err(e) => {
                if is_transient(&e) && !last {
                    log::warn!("  transient error: {e}");
                    continue;
                }
                return Err(SourceError::Http(e));
            }
            Ok(response) => {
                let status = response.status();
                match classify(status) {
                    StatusClass::Success => return Ok(response),
                    StatusClass::Retry if !last => {
                        log::warn!("  HTTP {status}");
                    }
                    StatusClass::Retry => {
                        return Err(SourceError::Status {
                            message: format!("HTTP {status} after {max_retries} retries"),
                        });
                    }
                    StatusClass::Fail => {
                        return Err(SourceError::Status {
                            message: format!("HTTP {status}"),
                        });
                    }
                }
            }
        }
    }
}

/// How a response status is handled by the retry loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StatusClass {
    Success,
    Retry,
    Fail,
}

fn classify(status: reqwest::StatusCode) -> StatusClass {
    if status == reqwest::StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
        StatusClass::Retry
    } else if status.is_client_error() {
        StatusClass::Fail
    } else {
        StatusClass::Success
    }
}

/// Delay before retry number `attempt` (1-based): 2s, 4s, 8s, ...
fn backoff(attempt: u32) -> Duration {
    Duration::from_secs(1u64 << attempt.min(6))
}

/// Returns `true` for connection failures and timeouts only.
fn is_transient(e: &reqwest::Error) -> bool {
    e.is_timeout() || e.is_connect()
}
