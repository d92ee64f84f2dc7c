use std::time::Duration;

use sentinel_core::http::{send_with_retry, shared_client, RetryConfig, RetryOutcome};
use serde::Serialize;
use serde_json::json;
use tracing::{info, warn};

use crate::card::WebhookCard;
use crate::error::{Result, WebhookError};

/// Per-call POST timeout (SPEC_FULL.md §5).
const WEBHOOK_TIMEOUT: Duration = Duration::from_secs(15);

/// Severity gate for the admin channel. Only `RateLimit` and above are
/// surfaced there by default; `Info` covers routine lifecycle events like
/// startup, which operators may not want paging on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

pub struct WebhookClient {
    retry: RetryConfig,
}

impl Default for WebhookClient {
    fn default() -> Self {
        Self {
            retry: RetryConfig {
                max_retries: 1,
                ..RetryConfig::default()
            },
        }
    }
}

impl WebhookClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// POST a significant-message card to `url`. The task bus's `webhook`
    /// queue owns the cross-attempt retry envelope (5 attempts, 60s base,
    /// x1.5); this call makes one logical attempt with a small number of
    /// inner retries for genuinely transient connection blips.
    pub async fn post_card(&self, url: &str, card: &WebhookCard) -> Result<()> {
        self.post_json(url, card).await
    }

    /// POST a system-level event to the admin webhook, gated by `min_severity`.
    pub async fn post_admin_event(
        &self,
        admin_url: &str,
        admin_channel: &str,
        severity: Severity,
        min_severity: Severity,
        title: &str,
        body: &str,
    ) -> Result<()> {
        if severity < min_severity {
            info!(title, channel = admin_channel, "admin event below severity gate, not posted");
            return Ok(());
        }
        let payload = json!({
            "title": format!("[{:?}] {title}", severity),
            "body": body,
            "channel": admin_channel,
        });
        self.post_json(admin_url, &payload).await
    }

    async fn post_json<T: Serialize + ?Sized>(&self, url: &str, payload: &T) -> Result<()> {
        let outcome = send_with_retry(|| shared_client().post(url).json(payload), WEBHOOK_TIMEOUT, &self.retry).await;

        match outcome {
            RetryOutcome::Success(_) => Ok(()),
            RetryOutcome::HttpError(resp) => {
                let status = resp.status();
                warn!(url, %status, "webhook post returned non-success status");
                Err(WebhookError::PostFailed(format!("HTTP {status}")))
            }
            RetryOutcome::ConnectionError { attempts, source } => {
                Err(WebhookError::PostFailed(format!("connection failed after {attempts} attempts: {source}")))
            }
            RetryOutcome::NonRetryable(e) => Err(WebhookError::PostFailed(e.to_string())),
        }
    }
}
