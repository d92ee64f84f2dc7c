use sentinel_core::config::AdminConfig;
use tracing::{info, warn};

use crate::client::{Severity, WebhookClient};
use crate::error::Result;

/// System-level events that can be surfaced to the admin channel
/// (SPEC_FULL.md §4.10, §7). Each maps to a fixed severity; the caller
/// supplies the message body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdminEvent {
    Startup,
    RateLimitHit,
    AuthRequired,
    WorkbookInitFailure,
    TerminalSinkFailure,
}

impl AdminEvent {
    fn severity(self) -> Severity {
        match self {
            AdminEvent::Startup => Severity::Info,
            AdminEvent::RateLimitHit => Severity::Warning,
            AdminEvent::AuthRequired => Severity::Critical,
            AdminEvent::WorkbookInitFailure => Severity::Warning,
            AdminEvent::TerminalSinkFailure => Severity::Critical,
        }
    }

    fn title(self) -> &'static str {
        match self {
            AdminEvent::Startup => "sentinel started",
            AdminEvent::RateLimitHit => "upstream rate limit hit",
            AdminEvent::AuthRequired => "upstream session requires re-authentication",
            AdminEvent::WorkbookInitFailure => "workbook session init failed",
            AdminEvent::TerminalSinkFailure => "sink exhausted retries",
        }
    }

    /// Events that must reach the admin channel regardless of
    /// `AdminNotifier::min_severity`. Only `Startup` is exempt: it is listed
    /// as user-visible behavior independent of the paging-noise gate that
    /// exists to keep routine `Info` events from spamming the channel.
    fn bypasses_severity_gate(self) -> bool {
        matches!(self, AdminEvent::Startup)
    }
}

/// Posts admin alerts to the configured admin webhook, gated by severity.
/// Every country shares the same admin channel; only `min_severity` and
/// above (default `Warning`, per SPEC_FULL.md §7) are sent, except `Startup`,
/// which always reaches the channel (see `AdminEvent::bypasses_severity_gate`).
pub struct AdminNotifier {
    client: WebhookClient,
    webhook_url: Option<String>,
    channel_name: String,
    min_severity: Severity,
}

impl AdminNotifier {
    pub fn new(config: &AdminConfig) -> Self {
        Self {
            client: WebhookClient::new(),
            webhook_url: config.admin_webhook_url.clone(),
            channel_name: config.admin_channel_name.clone(),
            min_severity: Severity::Warning,
        }
    }

    pub async fn notify(&self, event: AdminEvent, body: &str) -> Result<()> {
        let Some(url) = self.webhook_url.as_deref() else {
            info!(title = event.title(), "no admin webhook configured, alert dropped");
            return Ok(());
        };

        // `Startup` is enumerated as user-visible behavior the admin channel
        // always receives (SPEC_FULL.md: "admin webhook receives startup …"),
        // so it bypasses the severity gate rather than being filtered out by
        // the default `Warning` floor alongside routine `Info` noise.
        let min_severity = if event.bypasses_severity_gate() {
            Severity::Info
        } else {
            self.min_severity
        };

        match self
            .client
            .post_admin_event(url, &self.channel_name, event.severity(), min_severity, event.title(), body)
            .await
        {
            Ok(()) => Ok(()),
            Err(e) => {
                warn!(error = %e, "failed to deliver admin alert");
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_startup_bypasses_the_severity_gate() {
        assert!(AdminEvent::Startup.bypasses_severity_gate());
        assert!(!AdminEvent::RateLimitHit.bypasses_severity_gate());
        assert!(!AdminEvent::AuthRequired.bypasses_severity_gate());
        assert!(!AdminEvent::WorkbookInitFailure.bypasses_severity_gate());
        assert!(!AdminEvent::TerminalSinkFailure.bypasses_severity_gate());
    }

    #[tokio::test]
    async fn notify_without_a_configured_webhook_is_a_silent_noop() {
        let notifier = AdminNotifier::new(&AdminConfig {
            admin_webhook_url: None,
            admin_channel_name: "sentinel-admin".to_string(),
        });
        assert!(notifier.notify(AdminEvent::Startup, "monitor loop starting").await.is_ok());
    }
}
