//! HTTP retry helpers for transient errors.
//!
//! Every request the HTTP service makes goes through [`send_json`], which
//! retries transient failures (timeouts, connection resets, HTTP 429,
//! HTTP 5xx) with exponential backoff before giving up. These retries live
//! inside a single logical request; the courtesy pause between requests is
//! handled by the fetch loops, which also drop the whole call (backoff
//! included) on cancellation.
//!
//! ```ignore
//! let body = retry::send_json(|| client.get(&url).query(&params), 3).await?;
//! ```

use std::time::Duration;

use crate::ArcGisError;

/// Maximum length of the response body preview included in error logs.
const BODY_PREVIEW_LEN: usize = 500;

/// Upper bound on the backoff exponent (64 s).
const MAX_BACKOFF_SHIFT: u32 = 6;

/// Sends an HTTP request and parses the response body as JSON.
///
/// The `build_request` closure is called on each attempt to construct a
/// fresh [`reqwest::RequestBuilder`] (since builders are consumed by
/// `.send()`).
///
/// Retries up to `max_retries` times on connection errors, timeouts,
/// body read failures, HTTP 429, and HTTP 5xx. Other 4xx statuses are
/// permanent and fail immediately. A body that arrives intact but is not
/// JSON is a malformed response and is not retried.
///
/// # Errors
///
/// Returns [`ArcGisError`] if the request fails after all retries, the
/// server returns a non-retryable status, or the body is not JSON.
#[allow(clippy::future_not_send)]
pub async fn send_json<F>(
    build_request: F,
    max_retries: u32,
) -> Result<serde_json::Value, ArcGisError>
where
    F: Fn() -> reqwest::RequestBuilder,
{
    let text = send_text(&build_request, max_retries).await?;

    serde_json::from_str(&text).map_err(|e| {
        let preview: String = text.chars().take(BODY_PREVIEW_LEN).collect();
        log::error!(
            "JSON parse failed.\n  \
             received: {} bytes\n  \
             parse error: {e}\n  \
             body preview: {preview}",
            text.len(),
        );
        ArcGisError::malformed(format!(
            "JSON parse failed: {e} (received {} bytes)",
            text.len()
        ))
    })
}

/// Retry loop around [`send_once`].
#[allow(clippy::future_not_send)]
async fn send_text<F>(build_request: &F, max_retries: u32) -> Result<String, ArcGisError>
where
    F: Fn() -> reqwest::RequestBuilder,
{
    let mut attempt = 0;
    loop {
        match send_once(build_request).await {
            Ok(text) => return Ok(text),
            Err(e) if attempt < max_retries && is_transient(&e) => {
                attempt += 1;
                let delay = backoff(attempt);
                log::warn!("  {e}; retry {attempt}/{max_retries} in {delay:?}...");
                tokio::time::sleep(delay).await;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Sends once and reads the whole body. Any non-2xx status is an error.
#[allow(clippy::future_not_send)]
async fn send_once<F>(build_request: &F) -> Result<String, ArcGisError>
where
    F: Fn() -> reqwest::RequestBuilder,
{
    let response = build_request().send().await?;
    let status = response.status();

    if !status.is_success() {
        return Err(ArcGisError::Status {
            status: status.as_u16(),
            url: response.url().to_string(),
        });
    }

    Ok(response.text().await?)
}

/// Returns `true` if the error is likely transient and worth retrying.
#[must_use]
pub fn is_transient(e: &ArcGisError) -> bool {
    match e {
        ArcGisError::Http(e) => {
            e.is_timeout() || e.is_connect() || e.is_body() || e.is_decode() || e.is_request()
        }
        ArcGisError::Status { status, .. } => *status == 429 || (500..600).contains(status),
        _ => false,
    }
}

/// Backoff before retry number `attempt` (1-based): 2 s, 4 s, 8 s, ...
#[must_use]
pub fn backoff(attempt: u32) -> Duration {
    Duration::from_secs(1u64 << attempt.min(MAX_BACKOFF_SHIFT))
}
