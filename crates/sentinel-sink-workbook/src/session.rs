use std::time::Duration;

use chrono::Utc;
use sentinel_core::config::WorkbookAuthConfig;
use sentinel_core::http::{send_with_retry, shared_client, RetryConfig, RetryOutcome};
use serde::Deserialize;
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::error::{Result, WorkbookError};

/// Acquire/refresh timeout and attempt budget for the session step
/// (SPEC_FULL.md §4.8: "up to 3 attempts, 45 s timeout").
const SESSION_TIMEOUT: Duration = Duration::from_secs(45);

fn session_retry() -> RetryConfig {
    RetryConfig {
        max_retries: 2,
        initial_delay: Duration::from_secs(2),
        max_delay: Duration::from_secs(20),
        jitter_factor: 0.25,
    }
}

#[derive(Debug, Clone)]
struct CachedToken {
    access_token: String,
    expires_at: chrono::DateTime<Utc>,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
}

/// Holds the bearer token used to talk to the remote workbook API, refreshed
/// via client-credentials. Independent of the upstream chat session — this
/// one expires on its own clock and is never guarded by the session lock.
pub struct WorkbookSession {
    auth: WorkbookAuthConfig,
    cached: RwLock<Option<CachedToken>>,
}

impl WorkbookSession {
    pub fn new(auth: WorkbookAuthConfig) -> Self {
        Self {
            auth,
            cached: RwLock::new(None),
        }
    }

    pub fn api_base(&self) -> &str {
        &self.auth.api_base
    }

    /// Returns a live bearer token, refreshing if absent, expired, or forced.
    pub async fn token(&self, force: bool) -> Result<String> {
        if !force {
            let guard = self.cached.read().await;
            if let Some(cached) = guard.as_ref() {
                if cached.expires_at > Utc::now() + chrono::Duration::seconds(30) {
                    return Ok(cached.access_token.clone());
                }
            }
        }

        let mut guard = self.cached.write().await;
        if !force {
            if let Some(cached) = guard.as_ref() {
                if cached.expires_at > Utc::now() + chrono::Duration::seconds(30) {
                    return Ok(cached.access_token.clone());
                }
            }
        }

        info!("acquiring workbook bearer token via client-credentials");
        let fresh = self.fetch_token().await?;
        let token = fresh.access_token.clone();
        *guard = Some(fresh);
        Ok(token)
    }

    /// Discard the cached token, forcing the next `token()` call to refresh.
    /// Used on HTTP 401 (SPEC_FULL.md §4.8 step 5).
    pub async fn invalidate(&self) {
        *self.cached.write().await = None;
    }

    async fn fetch_token(&self) -> Result<CachedToken> {
        let body = [
            ("grant_type", "client_credentials"),
            ("client_id", self.auth.client_id.as_str()),
            ("client_secret", self.auth.client_secret.as_str()),
            ("scope", self.auth.scope.as_str()),
        ];

        let outcome = send_with_retry(
            || shared_client().post(&self.auth.token_url).form(&body),
            SESSION_TIMEOUT,
            &session_retry(),
        )
        .await;

        let resp = match outcome {
            RetryOutcome::Success(r) => r,
            RetryOutcome::HttpError(r) => {
                let status = r.status();
                warn!(%status, "workbook token endpoint returned non-success status");
                return Err(WorkbookError::SessionInit(format!("HTTP {status}")));
            }
            RetryOutcome::ConnectionError { attempts, source } => {
                return Err(WorkbookError::SessionInit(format!(
                    "connection failed after {attempts} attempts: {source}"
                )));
            }
            RetryOutcome::NonRetryable(e) => {
                return Err(WorkbookError::SessionInit(e.to_string()));
            }
        };

        let parsed: TokenResponse = resp
            .json()
            .await
            .map_err(|e| WorkbookError::SessionInit(format!("malformed token response: {e}")))?;

        Ok(CachedToken {
            access_token: parsed.access_token,
            expires_at: Utc::now() + chrono::Duration::seconds(parsed.expires_in),
        })
    }
}
