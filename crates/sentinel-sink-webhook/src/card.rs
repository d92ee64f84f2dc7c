use sentinel_core::types::ProcessedMessage;
use serde::Serialize;

/// One key-value fact shown on a card, e.g. `{"name": "method", "value": "keyword_significant"}`.
#[derive(Debug, Clone, Serialize)]
pub struct Fact {
    pub name: String,
    pub value: String,
}

/// A single significant-message notification, matching the target chat
/// system's incoming-webhook schema (SPEC_FULL.md §6): `title`, `body`, an
/// optional `originalBody`, and a `facts` key-value list.
#[derive(Debug, Clone, Serialize)]
pub struct WebhookCard {
    pub title: String,
    pub body: String,
    #[serde(rename = "originalBody", skip_serializing_if = "Option::is_none")]
    pub original_body: Option<String>,
    pub facts: Vec<Fact>,
}

/// Build the card for a significant message, honoring the country's
/// webhook-exclusion list: any schema field name listed there is dropped
/// from `facts`, but `title`/`body`/`originalBody` are always present (they
/// are not schema-projected fields, they are the card's required shape).
pub fn build_card(msg: &ProcessedMessage, country_name: &str, excluded_fields: &[String]) -> WebhookCard {
    let title = format!("{country_name} — {}", msg.raw.channel);

    let mut facts = Vec::new();
    let mut push = |name: &str, value: String| {
        if !excluded_fields.iter().any(|f| f == name) {
            facts.push(Fact { name: name.to_string(), value });
        }
    };
    push("matched_keywords", msg.matched_keywords.join(", "));
    push("method", msg.method.clone());
    push("language", msg.language.to_string());
    push("author_handle", msg.raw.author_handle.clone().unwrap_or_default());
    push("authored_at", msg.raw.authored_at.to_rfc3339());

    WebhookCard {
        title,
        body: msg.translated_body.clone(),
        original_body: msg.was_translated.then(|| msg.raw.body.clone()),
        facts,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sentinel_core::types::{ChannelId, ClassifierMethod, CountryId, ExternalMessageId, Language, RawMessage, Verdict};
    use chrono::Utc;

    fn sample() -> ProcessedMessage {
        ProcessedMessage {
            raw: RawMessage {
                external_id: ExternalMessageId(101),
                channel: ChannelId("@x".into()),
                authored_at: Utc::now(),
                author_handle: Some("reporter".into()),
                body: "عاجل احتجاج".into(),
                media_descriptor: None,
                forwarded_from: None,
            },
            country: CountryId("iraq".into()),
            language: Language::Ar,
            translated_body: "urgent protest".into(),
            was_translated: true,
            verdict: Verdict::Significant,
            matched_keywords: vec!["urgent".into(), "protest".into()],
            method: ClassifierMethod::KeywordSignificant.as_str().to_string(),
            reasoning: String::new(),
            processed_at: Utc::now(),
        }
    }

    #[test]
    fn includes_original_body_when_translated() {
        let card = build_card(&sample(), "Iraq", &[]);
        assert_eq!(card.original_body.as_deref(), Some("عاجل احتجاج"));
        assert_eq!(card.body, "urgent protest");
    }

    #[test]
    fn excluded_fields_drop_matching_facts() {
        let card = build_card(&sample(), "Iraq", &["method".to_string()]);
        assert!(!card.facts.iter().any(|f| f.name == "method"));
        assert!(card.facts.iter().any(|f| f.name == "matched_keywords"));
    }
}
