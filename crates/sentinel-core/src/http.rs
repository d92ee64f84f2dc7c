use std::sync::OnceLock;
use std::time::Duration;

use rand::Rng;
use reqwest::header::HeaderMap;
use reqwest::{RequestBuilder, Response, StatusCode};

const CONNECT_TIMEOUT_SECS: u64 = 10;

/// Process-wide HTTP client shared by every outbound call (inference,
/// translation, workbook, webhook). A single client reuses connection pools
/// across requests; callers still set a per-call `.timeout(..)` since the
/// allowed duration varies by endpoint (SPEC_FULL.md §5).
pub fn shared_client() -> &'static reqwest::Client {
    static CLIENT: OnceLock<reqwest::Client> = OnceLock::new();
    CLIENT.get_or_init(|| {
        reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .redirect(reqwest::redirect::Policy::none())
            .https_only(true)
            .build()
            .expect("build shared HTTP client")
    })
}

/// Retry envelope for a single outbound call.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
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

const RETRYABLE_STATUSES: &[u16] = &[408, 409, 429];

fn is_retryable_status(status: StatusCode) -> bool {
    RETRYABLE_STATUSES.contains(&status.as_u16()) || status.as_u16() >= 500
}

/// Honor an explicit `x-should-retry` header override when the upstream
/// service sets one, otherwise fall back to the default status-code set.
pub fn should_retry(status: StatusCode, headers: &HeaderMap) -> bool {
    if let Some(v) = headers.get("x-should-retry").and_then(|v| v.to_str().ok()) {
        match v {
            "true" => return true,
            "false" => return false,
            _ => {}
        }
    }
    is_retryable_status(status)
}

/// Parse `Retry-After` (seconds or HTTP-date) or `Retry-After-Ms`.
pub fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    if let Some(ms) = headers.get("retry-after-ms").and_then(|v| v.to_str().ok()) {
        if let Ok(ms) = ms.parse::<u64>() {
            return Some(Duration::from_millis(ms));
        }
    }
    if let Some(secs) = headers.get("retry-after").and_then(|v| v.to_str().ok()) {
        if let Ok(secs) = secs.parse::<u64>() {
            return Some(Duration::from_secs(secs));
        }
    }
    None
}

/// Compute the delay before retry attempt `step` (1-indexed), honoring an
/// explicit `Retry-After` header when present and otherwise backing off
/// exponentially with jitter.
pub fn calculate_retry_delay(step: u32, config: &RetryConfig, headers: Option<&HeaderMap>) -> Duration {
    if let Some(headers) = headers {
        if let Some(d) = parse_retry_after(headers) {
            return d.min(config.max_delay);
        }
    }
    let base = config.initial_delay.as_millis() as f64 * 2f64.powi(step.saturating_sub(1) as i32);
    let capped = base.min(config.max_delay.as_millis() as f64);
    let jitter_span = capped * config.jitter_factor;
    let jitter = rand::thread_rng().gen_range(0.0..=jitter_span.max(0.0));
    Duration::from_millis((capped + jitter) as u64)
}

/// Outcome of a retried HTTP call.
pub enum RetryOutcome {
    Success(Response),
    HttpError(Response),
    ConnectionError { attempts: u32, source: reqwest::Error },
    NonRetryable(reqwest::Error),
}

impl RetryOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, RetryOutcome::Success(_))
    }

    pub fn into_response(self) -> Option<Response> {
        match self {
            RetryOutcome::Success(r) | RetryOutcome::HttpError(r) => Some(r),
            _ => None,
        }
    }
}

/// Execute `build_request` with retry-on-transient-failure semantics.
///
/// `build_request` must be cheap and idempotent to call more than once — it
/// is invoked fresh on every attempt since a `RequestBuilder` cannot be
/// cloned after consuming its body.
pub async fn send_with_retry<F>(build_request: F, timeout: Duration, config: &RetryConfig) -> RetryOutcome
where
    F: Fn() -> RequestBuilder,
{
    let mut attempt = 0u32;
    loop {
        attempt += 1;
        let result = build_request().timeout(timeout).send().await;

        match result {
            Ok(resp) if resp.status().is_success() => return RetryOutcome::Success(resp),
            Ok(resp) => {
                let status = resp.status();
                let headers = resp.headers().clone();
                if attempt > config.max_retries || !should_retry(status, &headers) {
                    return RetryOutcome::HttpError(resp);
                }
                let delay = calculate_retry_delay(attempt, config, Some(&headers));
                tokio::time::sleep(delay).await;
            }
            Err(e) => {
                if attempt > config.max_retries {
                    return RetryOutcome::ConnectionError { attempts: attempt, source: e };
                }
                if e.is_builder() || e.is_redirect() {
                    return RetryOutcome::NonRetryable(e);
                }
                let delay = calculate_retry_delay(attempt, config, None);
                tokio::time::sleep(delay).await;
            }
        }
    }
}
