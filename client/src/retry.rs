//! Retry policy for idempotent GET requests.
//!
//! - Max retries: 2 by default (3 total attempts)
//! - Initial delay: 500ms, doubling, capped at 8 seconds
//! - Down-jitter up to 25% (multiplier in [0.75, 1.0])
//! - Retryable: 408, 429, 502, 503, 504 and connection errors
//! - `Retry-After` (seconds) is honored when it is below 60s

use std::time::Duration;

use reqwest::{RequestBuilder, Response, StatusCode, header::HeaderMap};

#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Retries after the first attempt.
    pub max_retries: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    /// Up to this fraction is subtracted from each delay.
    pub jitter_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(8),
            jitter_factor: 0.25,
        }
    }
}

impl RetryConfig {
    #[must_use]
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }
}

#[must_use]
pub fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    let secs = headers
        .get(reqwest::header::RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()?;
    let duration = Duration::from_secs(secs);
    (duration > Duration::ZERO && duration < Duration::from_secs(60)).then_some(duration)
}

#[must_use]
pub fn should_retry(status: StatusCode) -> bool {
    matches!(status.as_u16(), 408 | 429 | 502 | 503 | 504)
}

/// `backoff_step` is 0 before the first retry, 1 before the second, and so on.
#[must_use]
pub fn calculate_retry_delay(
    backoff_step: u32,
    config: &RetryConfig,
    headers: Option<&HeaderMap>,
) -> Duration {
    if let Some(delay) = headers.and_then(parse_retry_after) {
        return delay;
    }

    let base = config.initial_delay.as_secs_f64() * 2.0_f64.powi(backoff_step as i32);
    let capped = base.min(config.max_delay.as_secs_f64());

    let jitter = 1.0 - rand::random::<f64>() * config.jitter_factor;
    Duration::from_secs_f64(capped * jitter)
}

/// Result of [`send_with_retry`]. A non-2xx status is not an error at this level.
#[derive(Debug)]
pub enum RetryOutcome {
    Response(Response),
    ConnectionError {
        attempts: u32,
        source: reqwest::Error,
    },
}

fn is_retryable_error(error: &reqwest::Error) -> bool {
    error.is_connect() || error.is_timeout()
}

/// Send a request, retrying transient failures. `build_request` is called once per attempt.
pub async fn send_with_retry<F>(build_request: F, config: &RetryConfig) -> RetryOutcome
where
    F: Fn() -> RequestBuilder,
{
    let mut attempt = 0;
    loop {
        let can_retry = attempt < config.max_retries;
        match build_request().send().await {
            Ok(response) => {
                let status = response.status();
                if can_retry && should_retry(status) {
                    let delay = calculate_retry_delay(attempt, config, Some(response.headers()));
                    tracing::debug!(
                        status = %status,
                        retry_count = attempt + 1,
                        delay_ms = delay.as_millis(),
                        "Retrying request after error status"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                    continue;
                }
                return RetryOutcome::Response(response);
            }
            Err(e) => {
                if can_retry && is_retryable_error(&e) {
                    let delay = calculate_retry_delay(attempt, config, None);
                    tracing::debug!(
                        error = %e,
                        retry_count = attempt + 1,
                        delay_ms = delay.as_millis(),
                        "Retrying request after connection error"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                    continue;
                }
                return RetryOutcome::ConnectionError {
                    attempts: attempt + 1,
                    source: e,
                };
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fast_retry_config() -> RetryConfig {
        RetryConfig {
            max_retries: 2,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
            jitter_factor: 0.0,
        }
    }

    #[test]
    fn retryable_statuses() {
        for status in [408, 429, 502, 503, 504] {
            assert!(should_retry(StatusCode::from_u16(status).unwrap()), "{status}");
        }
        for status in [400, 401, 403, 404, 500] {
            assert!(!should_retry(StatusCode::from_u16(status).unwrap()), "{status}");
        }
    }

    #[test]
    fn retry_after_bounds() {
        let mut headers = HeaderMap::new();
        headers.insert("retry-after", HeaderValue::from_static("5"));
        assert_eq!(parse_retry_after(&headers), Some(Duration::from_secs(5)));

        headers.insert("retry-after", HeaderValue::from_static("120"));
        assert_eq!(parse_retry_after(&headers), None);

        headers.insert("retry-after", HeaderValue::from_static("Wed, 21 Oct 2015 07:28:00 GMT"));
        assert_eq!(parse_retry_after(&headers), None);
    }

    #[test]
    fn delay_is_jittered_and_capped() {
        let config = RetryConfig::default();
        for _ in 0..100 {
            let delay = calculate_retry_delay(0, &config, None);
            assert!(delay >= Duration::from_millis(375));
            assert!(delay <= Duration::from_millis(500));
        }
        for _ in 0..100 {
            assert!(calculate_retry_delay(10, &config, None) <= Duration::from_secs(8));
        }
    }

    #[tokio::test]
    async fn retries_503_then_returns_success() {
        let server = MockServer::start().await;
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);
        Mock::given(method("GET"))
            .and(path("/api/server/version"))
            .respond_with(move |_: &wiremock::Request| {
                if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                    ResponseTemplate::new(503)
                } else {
                    ResponseTemplate::new(200).set_body_string("10.4")
                }
            })
            .mount(&server)
            .await;

        let client = reqwest::Client::new();
        let url = format!("{}/api/server/version", server.uri());
        let outcome = send_with_retry(|| client.get(&url), &fast_retry_config()).await;

        let RetryOutcome::Response(response) = outcome else {
            panic!("expected response");
        };
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn exhausted_retries_return_last_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(429))
            .expect(3)
            .mount(&server)
            .await;

        let client = reqwest::Client::new();
        let outcome = send_with_retry(|| client.get(server.uri()), &fast_retry_config()).await;
        let RetryOutcome::Response(response) = outcome else {
            panic!("expected response");
        };
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    }

    #[tokio::test]
    async fn not_found_is_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;

        let client = reqwest::Client::new();
        let outcome = send_with_retry(|| client.get(server.uri()), &fast_retry_config()).await;
        assert!(matches!(outcome, RetryOutcome::Response(r) if r.status() == StatusCode::NOT_FOUND));
    }

    #[tokio::test]
    async fn connection_errors_are_retried_then_reported() {
        let client = reqwest::Client::new();
        // Port 1 on loopback refuses connections.
        let outcome = send_with_retry(|| client.get("http://127.0.0.1:1/"), &fast_retry_config()).await;
        assert!(matches!(outcome, RetryOutcome::ConnectionError { attempts: 3, .. }));
    }
}
