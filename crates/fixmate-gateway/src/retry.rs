//! Bounded retry for processor writes.
//!
//! Every write carries an `Idempotency-Key`, so replaying a POST after a
//! dropped connection, a 5xx or a 429 cannot move money twice. A
//! `Retry-After` header in seconds replaces the exponential delay; a value
//! longer than [`MAX_RETRY_AFTER`] ends the retries and the response is
//! returned as-is.

use std::time::Duration;

use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::StatusCode;

/// Attempts after the first one.
const MAX_RETRIES: u32 = 3;

/// First backoff step; doubles per attempt (200ms, 400ms, 800ms).
const BASE_DELAY: Duration = Duration::from_millis(200);

/// Longest server-requested wait we are willing to sit through.
const MAX_RETRY_AFTER: Duration = Duration::from_secs(5);

fn backoff(attempt: u32) -> Duration {
    BASE_DELAY * 2u32.pow(attempt)
}

fn retryable_status(status: StatusCode) -> bool {
    status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS
}

/// `Retry-After` as delta-seconds. HTTP-date values are ignored.
fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

/// Wait before the next attempt for a response, or `None` to stop.
fn response_delay(status: StatusCode, headers: &HeaderMap, attempt: u32) -> Option<Duration> {
    if !retryable_status(status) {
        return None;
    }
    match retry_after(headers) {
        Some(wait) if wait > MAX_RETRY_AFTER => None,
        Some(wait) => Some(wait),
        None => Some(backoff(attempt)),
    }
}

/// Send through `f`, retrying transport failures and 5xx/429 responses.
///
/// `f` runs at most `MAX_RETRIES + 1` times. The last outcome is returned
/// unchanged, so callers still see the final status or error.
pub(crate) async fn send_with_retry<F, Fut>(
    endpoint: &str,
    f: F,
) -> Result<reqwest::Response, reqwest::Error>
where
    F: Fn() -> Fut,
    Fut: std::future::Future<Output = Result<reqwest::Response, reqwest::Error>>,
{
    let mut attempt = 0;
    loop {
        let outcome = f().await;
        if attempt >= MAX_RETRIES {
            return outcome;
        }
        let delay = match &outcome {
            Ok(resp) => match response_delay(resp.status(), resp.headers(), attempt) {
                Some(delay) => {
                    tracing::warn!(
                        endpoint,
                        status = resp.status().as_u16(),
                        attempt = attempt + 1,
                        "processor answered with a retryable status, retrying in {delay:?}"
                    );
                    delay
                }
                None => return outcome,
            },
            Err(e) if e.is_builder() => return outcome,
            Err(e) => {
                let delay = backoff(attempt);
                tracing::warn!(
                    endpoint,
                    attempt = attempt + 1,
                    "processor request failed, retrying in {delay:?}: {e}"
                );
                delay
            }
        };
        tokio::time::sleep(delay).await;
        attempt += 1;
    }
}
