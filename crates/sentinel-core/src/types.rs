use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable handle of an external chat channel, e.g. `@iraq_news`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChannelId(pub String);

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ChannelId {
    fn from(s: &str) -> Self {
        ChannelId(s.to_string())
    }
}

/// Identifier of a country partition, e.g. `iraq`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CountryId(pub String);

impl fmt::Display for CountryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for CountryId {
    fn from(s: &str) -> Self {
        CountryId(s.to_string())
    }
}

/// Platform-native message id, scoped to one channel. Always increases
/// within a channel's history, which is what makes it usable as a cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ExternalMessageId(pub i64);

impl fmt::Display for ExternalMessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Detected natural language of a message body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Language {
    En,
    Ar,
    Other,
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Language::En => "en",
            Language::Ar => "ar",
            Language::Other => "other",
        };
        write!(f, "{s}")
    }
}

/// Final classification outcome for a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Significant,
    Trivial,
    Excluded,
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Verdict::Significant => "significant",
            Verdict::Trivial => "trivial",
            Verdict::Excluded => "excluded",
        };
        write!(f, "{s}")
    }
}

/// How a verdict was reached. Mirrors SPEC_FULL.md §4.4 method tags.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassifierMethod {
    ExcludedKeyword,
    KeywordSignificant,
    KeywordTrivial,
    AiSignificant,
    AiTrivial,
    NoMatchTrivial,
    CriteriaRefinedTrivial,
}

impl ClassifierMethod {
    /// Appended to the method tag when an AI step was skipped due to a
    /// remote failure and the pipeline fell back to the keyword-only result.
    pub fn as_str(&self) -> &'static str {
        match self {
            ClassifierMethod::ExcludedKeyword => "excluded_keyword",
            ClassifierMethod::KeywordSignificant => "keyword_significant",
            ClassifierMethod::KeywordTrivial => "keyword_trivial",
            ClassifierMethod::AiSignificant => "ai_significant",
            ClassifierMethod::AiTrivial => "ai_trivial",
            ClassifierMethod::NoMatchTrivial => "no_match_trivial",
            ClassifierMethod::CriteriaRefinedTrivial => "criteria_refined_trivial",
        }
    }
}

impl fmt::Display for ClassifierMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Which of the two per-country sinks (workbook sheet / CSV file) a
/// processed message routes to. `Verdict::Excluded` has no sheet — callers
/// check for that case before calling [`Sheet::for_verdict`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sheet {
    Significant,
    Trivial,
}

impl Sheet {
    pub fn for_verdict(verdict: Verdict) -> Option<Sheet> {
        match verdict {
            Verdict::Significant => Some(Sheet::Significant),
            Verdict::Trivial => Some(Sheet::Trivial),
            Verdict::Excluded => None,
        }
    }
}

impl fmt::Display for Sheet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Sheet::Significant => "Significant",
            Sheet::Trivial => "Trivial",
        };
        write!(f, "{s}")
    }
}

/// A message exactly as fetched from the upstream, before classification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawMessage {
    pub external_id: ExternalMessageId,
    pub channel: ChannelId,
    pub authored_at: chrono::DateTime<chrono::Utc>,
    pub author_handle: Option<String>,
    pub body: String,
    pub media_descriptor: Option<String>,
    pub forwarded_from: Option<String>,
}

/// A message after the full classify/translate pipeline has run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessedMessage {
    pub raw: RawMessage,
    pub country: CountryId,
    pub language: Language,
    pub translated_body: String,
    pub was_translated: bool,
    pub verdict: Verdict,
    pub matched_keywords: Vec<String>,
    pub method: String,
    pub reasoning: String,
    pub processed_at: chrono::DateTime<chrono::Utc>,
}
