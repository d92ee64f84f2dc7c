use sentinel_core::config::ClassificationPolicy;
use sentinel_core::types::{ClassifierMethod, Language, Verdict};
use tracing::warn;

use crate::inference::{InferenceClient, SignificanceAnswer};
use crate::keywords::match_keywords;
use crate::language::detect_language;

/// Outcome of running the full classification pipeline on one message body.
#[derive(Debug, Clone)]
pub struct ClassificationResult {
    pub language: Language,
    pub verdict: Verdict,
    pub matched_keywords: Vec<String>,
    pub method: String,
    pub reasoning: String,
}

fn has_non_ascii(s: &str) -> bool {
    s.chars().any(|c| !c.is_ascii())
}

/// Run the exclude -> keyword -> AI -> criteria-refinement pipeline
/// described in SPEC_FULL.md §4.4. `inference` is `None` when no country
/// using this policy has any AI flag enabled, in which case steps 4-5 are
/// skipped unconditionally rather than attempted and failing.
pub async fn classify(
    body: &str,
    policy: &ClassificationPolicy,
    inference: Option<&InferenceClient>,
    country: &str,
) -> ClassificationResult {
    let language = detect_language(body);

    let exclude_matches = match_keywords(body, language, &policy.exclude_keywords);
    if !exclude_matches.is_empty() {
        return ClassificationResult {
            language,
            verdict: Verdict::Excluded,
            matched_keywords: exclude_matches.clone(),
            method: ClassifierMethod::ExcludedKeyword.as_str().to_string(),
            reasoning: format!("matched exclude keyword(s): {}", exclude_matches.join(", ")),
        };
    }

    let sig_matches = match_keywords(body, language, &policy.significant_keywords);
    let triv_matches = match_keywords(body, language, &policy.trivial_keywords);

    match (sig_matches.is_empty(), triv_matches.is_empty()) {
        (false, true) => ClassificationResult {
            language,
            verdict: Verdict::Significant,
            matched_keywords: sig_matches.clone(),
            method: ClassifierMethod::KeywordSignificant.as_str().to_string(),
            reasoning: format!("matched significant keyword(s): {}", sig_matches.join(", ")),
        },
        (true, false) => ClassificationResult {
            language,
            verdict: Verdict::Trivial,
            matched_keywords: triv_matches.clone(),
            method: ClassifierMethod::KeywordTrivial.as_str().to_string(),
            reasoning: format!("matched trivial keyword(s): {}", triv_matches.join(", ")),
        },
        (sig_empty, triv_empty) => {
            // Both matched or neither matched: escalate to AI if enabled.
            if policy.use_ai_for_message_filtering {
                if let Some(inference) = inference {
                    return classify_via_ai(
                        body,
                        policy,
                        inference,
                        country,
                        language,
                        sig_empty,
                        triv_empty,
                        &sig_matches,
                    )
                    .await;
                }
                warn!("use_ai_for_message_filtering enabled but no inference client configured");
            }
            fallback_without_ai(language, sig_empty, triv_empty, &sig_matches)
        }
    }
}

fn fallback_without_ai(
    language: Language,
    sig_empty: bool,
    triv_empty: bool,
    sig_matches: &[String],
) -> ClassificationResult {
    if !sig_empty && !triv_empty {
        ClassificationResult {
            language,
            verdict: Verdict::Significant,
            matched_keywords: sig_matches.to_vec(),
            method: ClassifierMethod::KeywordSignificant.as_str().to_string(),
            reasoning: "both significant and trivial keywords matched; significance takes precedence".to_string(),
        }
    } else {
        ClassificationResult {
            language,
            verdict: Verdict::Trivial,
            matched_keywords: vec![],
            method: ClassifierMethod::NoMatchTrivial.as_str().to_string(),
            reasoning: "no keyword matched and AI filtering is disabled".to_string(),
        }
    }
}

async fn classify_via_ai(
    body: &str,
    policy: &ClassificationPolicy,
    inference: &InferenceClient,
    country: &str,
    language: Language,
    sig_empty: bool,
    triv_empty: bool,
    sig_matches: &[String],
) -> ClassificationResult {
    let answer = inference
        .classify_significance(body, &policy.significant_keywords, &policy.trivial_keywords, country)
        .await;

    let answer = match answer {
        Ok(a) => a,
        Err(e) => {
            warn!(error = %e, "AI significance call failed, degrading to keyword-only result");
            let mut fallback = fallback_without_ai(language, sig_empty, triv_empty, sig_matches);
            fallback.method = format!("{}_ai_unavailable", fallback.method);
            return fallback;
        }
    };

    match answer {
        SignificanceAnswer::Trivial => ClassificationResult {
            language,
            verdict: Verdict::Trivial,
            matched_keywords: vec![],
            method: ClassifierMethod::AiTrivial.as_str().to_string(),
            reasoning: "AI inference judged the message trivial".to_string(),
        },
        SignificanceAnswer::Significant { matched_token } => {
            let token_en = if has_non_ascii(&matched_token) {
                inference
                    .translate(&matched_token, "en")
                    .await
                    .unwrap_or(matched_token.clone())
            } else {
                matched_token.clone()
            };

            if policy.use_ai_for_enhanced_filtering {
                match inference
                    .refine_criteria(body, country, &policy.additional_ai_criteria)
                    .await
                {
                    Ok(true) | Err(_) => ClassificationResult {
                        language,
                        verdict: Verdict::Significant,
                        matched_keywords: vec![token_en],
                        method: ClassifierMethod::AiSignificant.as_str().to_string(),
                        reasoning: "AI inference judged the message significant; criteria refinement kept it".to_string(),
                    },
                    Ok(false) => ClassificationResult {
                        language,
                        verdict: Verdict::Trivial,
                        matched_keywords: vec![token_en],
                        method: ClassifierMethod::CriteriaRefinedTrivial.as_str().to_string(),
                        reasoning: "AI inference judged the message significant, but additional criteria were not satisfied".to_string(),
                    },
                }
            } else {
                ClassificationResult {
                    language,
                    verdict: Verdict::Significant,
                    matched_keywords: vec![token_en],
                    method: ClassifierMethod::AiSignificant.as_str().to_string(),
                    reasoning: format!("AI inference judged the message significant (topic: {token_en})"),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sentinel_core::config::KeywordPair;

    fn pair(english: &str, native: &str) -> KeywordPair {
        KeywordPair { english: english.to_string(), native: native.to_string() }
    }

    fn policy() -> ClassificationPolicy {
        ClassificationPolicy {
            significant_keywords: vec![pair("protest", "protest")],
            trivial_keywords: vec![pair("sports", "sports")],
            exclude_keywords: vec![pair("advertisement", "advertisement")],
            use_ai_for_message_filtering: false,
            translate_trivial: false,
            use_ai_for_translation: false,
            use_ai_for_enhanced_filtering: false,
            additional_ai_criteria: vec![],
        }
    }

    #[tokio::test]
    async fn exclude_precedence_over_everything() {
        let result = classify("advertisement for protest discount", &policy(), None, "iraq").await;
        assert_eq!(result.verdict, Verdict::Excluded);
        assert_eq!(result.method, "excluded_keyword");
    }

    #[tokio::test]
    async fn keyword_significant_without_ai() {
        let result = classify("a protest broke out", &policy(), None, "iraq").await;
        assert_eq!(result.verdict, Verdict::Significant);
        assert_eq!(result.method, "keyword_significant");
    }

    #[tokio::test]
    async fn keyword_trivial_without_ai() {
        let result = classify("a sports match was played", &policy(), None, "iraq").await;
        assert_eq!(result.verdict, Verdict::Trivial);
        assert_eq!(result.method, "keyword_trivial");
    }

    #[tokio::test]
    async fn both_matched_without_ai_favors_significant() {
        let result = classify("protest breaks out at sports stadium", &policy(), None, "iraq").await;
        assert_eq!(result.verdict, Verdict::Significant);
        assert_eq!(result.method, "keyword_significant");
    }

    #[tokio::test]
    async fn no_match_without_ai_is_trivial() {
        let result = classify("the weather is nice today", &policy(), None, "iraq").await;
        assert_eq!(result.verdict, Verdict::Trivial);
        assert_eq!(result.method, "no_match_trivial");
    }
}
