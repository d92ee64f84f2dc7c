use std::time::Duration;

use sentinel_core::http::{send_with_retry, shared_client, RetryConfig, RetryOutcome};
use serde_json::json;

use crate::error::{Result, TranslatorError};

const TRANSLATE_TIMEOUT: Duration = Duration::from_secs(30);

/// Client for a free, non-AI machine-translation REST service (LibreTranslate-
/// compatible: `POST {base_url}/translate` with `{q, source, target, format}`).
pub struct FreeTranslateClient {
    base_url: String,
    retry: RetryConfig,
}

impl FreeTranslateClient {
    pub fn new(base_url: String) -> Self {
        Self {
            base_url,
            retry: RetryConfig {
                max_retries: 1,
                ..RetryConfig::default()
            },
        }
    }

    pub async fn translate(&self, text: &str, source: &str, target: &str) -> Result<String> {
        let url = format!("{}/translate", self.base_url);
        let body = json!({
            "q": text,
            "source": source,
            "target": target,
            "format": "text",
        });

        let outcome = send_with_retry(
            || shared_client().post(&url).json(&body),
            TRANSLATE_TIMEOUT,
            &self.retry,
        )
        .await;

        match outcome {
            RetryOutcome::Success(resp) => {
                let parsed: serde_json::Value = resp
                    .json()
                    .await
                    .map_err(|e| TranslatorError::Unavailable(e.to_string()))?;
                parsed["translatedText"]
                    .as_str()
                    .map(String::from)
                    .ok_or_else(|| TranslatorError::Unavailable("no translatedText field".into()))
            }
            RetryOutcome::HttpError(resp) => {
                Err(TranslatorError::Unavailable(format!("HTTP {}", resp.status())))
            }
            RetryOutcome::ConnectionError { attempts, source } => Err(TranslatorError::Unavailable(
                format!("connection failed after {attempts} attempts: {source}"),
            )),
            RetryOutcome::NonRetryable(e) => Err(TranslatorError::Unavailable(e.to_string())),
        }
    }
}
