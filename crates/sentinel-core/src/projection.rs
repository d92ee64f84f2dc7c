use crate::types::ProcessedMessage;

/// Project `msg` through an ordered list of logical field names, as used by
/// both the workbook and CSV sinks (SPEC_FULL.md §3's "Sink Schema").
///
/// Returns `Err(field_name)` for any name not recognized — callers should
/// surface that as `sink_schema_mismatch`, a fatal (non-retriable) error per
/// SPEC_FULL.md §7, since no amount of retrying fixes a bad schema entry.
pub fn project_fields(msg: &ProcessedMessage, fields: &[String]) -> Result<Vec<String>, String> {
    fields.iter().map(|f| project_one(msg, f)).collect()
}

fn project_one(msg: &ProcessedMessage, field: &str) -> Result<String, String> {
    Ok(match field {
        "external_id" => msg.raw.external_id.to_string(),
        "channel" => msg.raw.channel.to_string(),
        "country" => msg.country.to_string(),
        "authored_at" => msg.raw.authored_at.to_rfc3339(),
        "author_handle" => msg.raw.author_handle.clone().unwrap_or_default(),
        "original_body" => msg.raw.body.clone(),
        "translated_body" => msg.translated_body.clone(),
        "language" => msg.language.to_string(),
        "was_translated" => msg.was_translated.to_string(),
        "verdict" => msg.verdict.to_string(),
        "matched_keywords" => msg.matched_keywords.join(";"),
        "method" => msg.method.clone(),
        "reasoning" => msg.reasoning.clone(),
        "processed_at" => msg.processed_at.to_rfc3339(),
        other => return Err(other.to_string()),
    })
}

/// `fields` with every name in `excluded` removed, preserving order. Used to
/// build the workbook/webhook projection, which additionally honors a
/// per-country exclusion list that CSV (the ground-truth record) ignores.
pub fn fields_minus_excluded<'a>(fields: &'a [String], excluded: &[String]) -> Vec<&'a str> {
    fields
        .iter()
        .filter(|f| !excluded.contains(f))
        .map(|f| f.as_str())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ChannelId, ClassifierMethod, CountryId, ExternalMessageId, Language, RawMessage, Verdict};
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
            reasoning: "matched significant keyword(s): urgent, protest".into(),
            processed_at: Utc::now(),
        }
    }

    #[test]
    fn projects_known_fields_in_order() {
        let msg = sample();
        let fields = vec!["external_id".to_string(), "verdict".to_string(), "matched_keywords".to_string()];
        let row = project_fields(&msg, &fields).unwrap();
        assert_eq!(row, vec!["101", "significant", "urgent;protest"]);
    }

    #[test]
    fn unknown_field_is_an_error() {
        let msg = sample();
        let fields = vec!["not_a_real_field".to_string()];
        assert_eq!(project_fields(&msg, &fields), Err("not_a_real_field".to_string()));
    }

    #[test]
    fn excluded_fields_are_removed_preserving_order() {
        let fields = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let excluded = vec!["b".to_string()];
        assert_eq!(fields_minus_excluded(&fields, &excluded), vec!["a", "c"]);
    }
}
