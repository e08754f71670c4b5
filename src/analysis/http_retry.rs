//! Reusable HTTP retry logic with exponential backoff for model API calls.
//!
//! Handles 429 rate limiting, 5xx server errors, and network timeouts with
//! configurable retry count and exponential backoff. Blocking variant: the
//! whole pipeline is a synchronous sequence of stages, so requests block the
//! calling thread.

use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::StatusCode;
use tracing::warn;

/// Send an HTTP request with retry and exponential backoff.
///
/// Returns `Some(Response)` on success, `None` if all retries exhausted
/// or a non-retriable error occurs.
///
/// Retry behavior:
/// - 429 (rate limited): backoff 2s, 4s, 8s
/// - 5xx (server error): backoff 1s, 2s, 4s
/// - Timeout/connect error: backoff 1s, 2s, 4s
/// - Other 4xx: non-retriable, returns None immediately
pub fn send_with_retry<F>(
    client: &Client,
    build_request: F,
    max_retries: u32,
    context: &str,
) -> Option<Response>
where
    F: Fn(&Client) -> RequestBuilder,
{
    let mut response = None;
    for attempt in 0..max_retries {
        let result = build_request(client).send();

        match result {
            Ok(resp) => {
                let status = resp.status();
                if status.is_success() {
                    response = Some(resp);
                    break;
                } else if status == StatusCode::TOO_MANY_REQUESTS {
                    // Longer backoff for rate limiting since the API needs
                    // time to reset the request quota
                    let delay = std::time::Duration::from_secs(2u64.pow(attempt + 1));
                    warn!("{}: rate limited (429), retrying in {:?}", context, delay);
                    std::thread::sleep(delay);
                } else if status.is_server_error() {
                    // Shorter backoff for server errors which are typically
                    // transient and resolve faster
                    let delay = std::time::Duration::from_secs(2u64.pow(attempt));
                    warn!("{}: server error ({}), retrying in {:?}", context, status, delay);
                    std::thread::sleep(delay);
                } else {
                    warn!("{}: non-retriable error ({})", context, status);
                    return None;
                }
            }
            Err(e) if e.is_timeout() || e.is_connect() => {
                let delay = std::time::Duration::from_secs(2u64.pow(attempt));
                warn!("{}: network error ({}), retrying in {:?}", context, e, delay);
                std::thread::sleep(delay);
            }
            Err(e) => {
                warn!("{}: request failed: {}", context, e);
                return None;
            }
        }
    }

    if response.is_none() {
        warn!("{}: failed after {} retries", context, max_retries);
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_send_with_retry_zero_retries_returns_none() {
        let client = Client::new();
        let result = send_with_retry(&client, |c| c.get("http://127.0.0.1:1/"), 0, "test");
        assert!(result.is_none());
    }

    #[test]
    fn test_send_with_retry_connection_refused_exhausts_retries() {
        // Port 1 typically refuses connections; with max_retries=1 the loop
        // runs once, hits a connect error, backs off, and returns None.
        let client = Client::builder()
            .timeout(std::time::Duration::from_millis(500))
            .build()
            .unwrap();

        let result = send_with_retry(
            &client,
            |c| c.get("http://127.0.0.1:1/"),
            1,
            "retry-connect-test",
        );
        assert!(result.is_none());
    }

    #[test]
    fn test_send_with_retry_closure_receives_client() {
        let client = Client::builder()
            .timeout(std::time::Duration::from_millis(100))
            .build()
            .unwrap();

        let call_count = std::sync::atomic::AtomicU32::new(0);
        let result = send_with_retry(
            &client,
            |c| {
                call_count.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                c.get("http://127.0.0.1:1/")
            },
            2,
            "closure-test",
        );

        assert!(result.is_none());
        // The closure should have been called exactly 2 times (max_retries = 2)
        assert_eq!(call_count.load(std::sync::atomic::Ordering::SeqCst), 2);
    }
}
