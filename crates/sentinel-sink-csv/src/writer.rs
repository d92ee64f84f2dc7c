use std::path::PathBuf;

use csv::WriterBuilder;
use sentinel_core::projection::project_fields;
use sentinel_core::types::{ProcessedMessage, Sheet};
use tracing::info;

use crate::error::{CsvSinkError, Result};

/// Append-only local CSV backup, one pair of files per country
/// (`<country>_significant_messages.csv` / `<country>_trivial_messages.csv`).
/// This is the ground-truth record: no exclusion list is ever applied here,
/// unlike the workbook and webhook sinks (SPEC_FULL.md §4.9).
pub struct CsvSink {
    dir: PathBuf,
}

impl CsvSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, country: &str, sheet: Sheet) -> PathBuf {
        let suffix = match sheet {
            Sheet::Significant => "significant_messages",
            Sheet::Trivial => "trivial_messages",
        };
        self.dir.join(format!("{country}_{suffix}.csv"))
    }

    /// Append one row for `msg` to the file selected by its verdict.
    /// `Verdict::Excluded` is the caller's responsibility to have already
    /// filtered out — the dispatcher never routes excluded messages here.
    pub fn append(&self, country: &str, sheet: Sheet, msg: &ProcessedMessage, schema_fields: &[String]) -> Result<()> {
        std::fs::create_dir_all(&self.dir)?;
        let path = self.path_for(country, sheet);
        let needs_header = !path.exists();

        let row = project_fields(msg, schema_fields).map_err(CsvSinkError::SchemaMismatch)?;

        let file = std::fs::OpenOptions::new().create(true).append(true).open(&path)?;
        let mut writer = WriterBuilder::new()
            .terminator(csv::Terminator::Any(b'\n'))
            .has_headers(false)
            .from_writer(file);

        if needs_header {
            writer.write_record(schema_fields)?;
        }
        writer.write_record(&row)?;
        writer.flush()?;

        info!(country, sheet = %sheet, path = %path.display(), "csv row appended");
        Ok(())
    }

    /// Path a cold-start cursor recovery scan would read for `(country, sheet)`.
    pub fn path(&self, country: &str, sheet: Sheet) -> PathBuf {
        self.path_for(country, sheet)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sentinel_core::types::{ChannelId, ClassifierMethod, CountryId, ExternalMessageId, Language, RawMessage, Verdict};
    use chrono::Utc;

    fn schema() -> Vec<String> {
        vec!["external_id".to_string(), "channel".to_string(), "verdict".to_string()]
    }

    fn sample(id: i64) -> ProcessedMessage {
        ProcessedMessage {
            raw: RawMessage {
                external_id: ExternalMessageId(id),
                channel: ChannelId("@x".into()),
                authored_at: Utc::now(),
                author_handle: None,
                body: "hello, \"world\"".into(),
                media_descriptor: None,
                forwarded_from: None,
            },
            country: CountryId("iraq".into()),
            language: Language::En,
            translated_body: "hello, \"world\"".into(),
            was_translated: false,
            verdict: Verdict::Significant,
            matched_keywords: vec![],
            method: ClassifierMethod::KeywordSignificant.as_str().to_string(),
            reasoning: String::new(),
            processed_at: Utc::now(),
        }
    }

    #[test]
    fn first_append_writes_header_then_row() {
        let dir = tempfile::tempdir().unwrap();
        let sink = CsvSink::new(dir.path());
        sink.append("iraq", Sheet::Significant, &sample(101), &schema()).unwrap();

        let contents = std::fs::read_to_string(sink.path("iraq", Sheet::Significant)).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines[0], "external_id,channel,verdict");
        assert!(lines[1].starts_with("101,@x,significant"));
        assert!(!contents.contains('\r'));
    }

    #[test]
    fn second_append_does_not_repeat_header() {
        let dir = tempfile::tempdir().unwrap();
        let sink = CsvSink::new(dir.path());
        sink.append("iraq", Sheet::Significant, &sample(101), &schema()).unwrap();
        sink.append("iraq", Sheet::Significant, &sample(102), &schema()).unwrap();

        let contents = std::fs::read_to_string(sink.path("iraq", Sheet::Significant)).unwrap();
        assert_eq!(contents.lines().count(), 3);
    }

    #[test]
    fn significant_and_trivial_are_separate_files() {
        let dir = tempfile::tempdir().unwrap();
        let sink = CsvSink::new(dir.path());
        sink.append("iraq", Sheet::Significant, &sample(101), &schema()).unwrap();
        assert!(!sink.path("iraq", Sheet::Trivial).exists());
    }

    #[test]
    fn unknown_schema_field_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let sink = CsvSink::new(dir.path());
        let bad_schema = vec!["nonexistent".to_string()];
        let err = sink.append("iraq", Sheet::Significant, &sample(101), &bad_schema).unwrap_err();
        assert!(matches!(err, CsvSinkError::SchemaMismatch(_)));
    }
}
