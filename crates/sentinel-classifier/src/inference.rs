use std::time::Duration;

use sentinel_core::config::KeywordPair;
use sentinel_core::http::{send_with_retry, shared_client, RetryConfig, RetryOutcome};
use serde_json::json;
use tracing::warn;

use crate::error::{ClassifierError, Result};

/// Remote inference call timeout (SPEC_FULL.md §5).
const INFERENCE_TIMEOUT: Duration = Duration::from_secs(30);
/// Low temperature keeps the significance verdict close to reproducible
/// across retries of the same body.
const CLASSIFY_TEMPERATURE: f64 = 0.1;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignificanceAnswer {
    Significant { matched_token: String },
    Trivial,
}

pub struct InferenceClient {
    base_url: String,
    api_key: String,
    model: String,
    retry: RetryConfig,
}

impl InferenceClient {
    pub fn new(base_url: String, api_key: String, model: String) -> Self {
        Self {
            base_url,
            api_key,
            model,
            retry: RetryConfig::default(),
        }
    }

    async fn complete(&self, system: &str, user: &str, temperature: f64) -> Result<String> {
        let url = format!("{}/v1/messages", self.base_url);
        let body = json!({
            "model": self.model,
            "max_tokens": 64,
            "temperature": temperature,
            "system": system,
            "messages": [{"role": "user", "content": user}],
        });

        let outcome = send_with_retry(
            || {
                shared_client()
                    .post(&url)
                    .header("x-api-key", &self.api_key)
                    .header("anthropic-version", "2023-06-01")
                    .json(&body)
            },
            INFERENCE_TIMEOUT,
            &self.retry,
        )
        .await;

        match outcome {
            RetryOutcome::Success(resp) => {
                let parsed: serde_json::Value = resp
                    .json()
                    .await
                    .map_err(|e| ClassifierError::UnparseableResponse(e.to_string()))?;
                parsed["content"][0]["text"]
                    .as_str()
                    .map(|s| s.trim().to_string())
                    .ok_or_else(|| {
                        ClassifierError::UnparseableResponse("no text content in response".into())
                    })
            }
            RetryOutcome::HttpError(resp) => Err(ClassifierError::InferenceUnavailable(format!(
                "HTTP {}",
                resp.status()
            ))),
            RetryOutcome::ConnectionError { attempts, source } => {
                Err(ClassifierError::InferenceUnavailable(format!(
                    "connection failed after {attempts} attempts: {source}"
                )))
            }
            RetryOutcome::NonRetryable(e) => {
                Err(ClassifierError::InferenceUnavailable(e.to_string()))
            }
        }
    }

    /// Ask the significance question. The service must answer in exactly one
    /// of two forms: `Significant: <token>` or `Trivial`.
    pub async fn classify_significance(
        &self,
        body: &str,
        significant_keywords: &[KeywordPair],
        trivial_keywords: &[KeywordPair],
        country: &str,
    ) -> Result<SignificanceAnswer> {
        let sig_list: Vec<&str> = significant_keywords.iter().map(|p| p.native.as_str()).collect();
        let triv_list: Vec<&str> = trivial_keywords.iter().map(|p| p.native.as_str()).collect();

        let system = format!(
            "You classify chat messages from {country} as significant or trivial. \
             Significant topics resemble: {}. Trivial topics resemble: {}. \
             Respond with exactly one line: either `Significant: <short topic token>` \
             or `Trivial`. No other text.",
            sig_list.join(", "),
            triv_list.join(", "),
        );

        let answer = self.complete(&system, body, CLASSIFY_TEMPERATURE).await?;
        parse_significance_answer(&answer)
    }

    /// Ask whether all `criteria` hold for a message already judged
    /// significant. Returns `true` on an ambiguous answer — "benefit of the
    /// doubt" per SPEC_FULL.md §4.4.
    pub async fn refine_criteria(&self, body: &str, country: &str, criteria: &[String]) -> Result<bool> {
        if criteria.is_empty() {
            return Ok(true);
        }
        let system = format!(
            "A message from {country} was judged significant. Check whether ALL of the \
             following criteria are satisfied: {}. Respond with exactly one word: `yes` or `no`.",
            criteria.join("; "),
        );
        let answer = self.complete(&system, body, CLASSIFY_TEMPERATURE).await?;
        Ok(parse_yes_no_benefit_of_doubt(&answer))
    }

    pub async fn translate(&self, body: &str, target: &str) -> Result<String> {
        let system = format!(
            "Translate the user's message into {target}. Respond with only the translated text."
        );
        self.complete(&system, body, 0.0).await
    }
}

fn parse_significance_answer(raw: &str) -> Result<SignificanceAnswer> {
    let line = raw.lines().next().unwrap_or(raw).trim();
    if let Some(rest) = line.strip_prefix("Significant:") {
        return Ok(SignificanceAnswer::Significant {
            matched_token: rest.trim().to_string(),
        });
    }
    if line.eq_ignore_ascii_case("trivial") {
        return Ok(SignificanceAnswer::Trivial);
    }
    Err(ClassifierError::UnparseableResponse(raw.to_string()))
}

fn parse_yes_no_benefit_of_doubt(raw: &str) -> bool {
    let line = raw.trim().to_lowercase();
    if line.starts_with("no") {
        false
    } else if line.starts_with("yes") {
        true
    } else {
        warn!(response = %raw, "ambiguous criteria-refinement answer, defaulting to significant");
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_significant_answer_with_token() {
        let parsed = parse_significance_answer("Significant: protest").unwrap();
        assert_eq!(
            parsed,
            SignificanceAnswer::Significant { matched_token: "protest".to_string() }
        );
    }

    #[test]
    fn parses_trivial_answer() {
        assert_eq!(parse_significance_answer("Trivial").unwrap(), SignificanceAnswer::Trivial);
    }

    #[test]
    fn unparseable_answer_is_an_error() {
        assert!(parse_significance_answer("I'm not sure").is_err());
    }

    #[test]
    fn ambiguous_criteria_answer_defaults_true() {
        assert!(parse_yes_no_benefit_of_doubt("maybe, hard to tell"));
    }

    #[test]
    fn explicit_no_downgrades() {
        assert!(!parse_yes_no_benefit_of_doubt("no, it does not mention Iraq"));
    }
}
