use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::{Result, SentinelError};

pub const DEFAULT_FETCH_INTERVAL_SECONDS: u64 = 180;
pub const DEFAULT_FETCH_MESSAGE_LIMIT: u32 = 100;
pub const DEFAULT_MAX_MESSAGE_AGE_HOURS: i64 = 4;
pub const DEFAULT_DEDUPE_TTL_SECONDS: u64 = 24 * 3600;
pub const DEFAULT_SINK_RETENTION_DAYS: u32 = 3;

/// Root configuration document (`sentinel.toml` + `SENTINEL_*` env overrides).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SentinelConfig {
    pub upstream: UpstreamConfig,
    pub inference: InferenceConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub translation: TranslationConfig,
    pub workbook_auth: WorkbookAuthConfig,
    pub countries: HashMap<String, CountryConfig>,
    #[serde(default)]
    pub admin: AdminConfig,
    #[serde(default)]
    pub schema: SchemaConfig,
    #[serde(default)]
    pub fetch: FetchConfig,
    #[serde(default)]
    pub queues: QueueConfig,
    #[serde(default)]
    pub paths: PathsConfig,
}

/// Telegram user-session credentials (MTProto, not a bot token — see
/// sentinel-upstream for why this is a user-account client).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamConfig {
    pub api_id: i32,
    pub api_hash: String,
    pub phone: String,
    #[serde(default = "default_session_file")]
    pub session_file: String,
}

fn default_session_file() -> String {
    "./sentinel.session".to_string()
}

/// Remote inference service used by the classifier and (optionally) the
/// translator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InferenceConfig {
    pub api_key: String,
    #[serde(default = "default_inference_base_url")]
    pub base_url: String,
    #[serde(default = "default_inference_model")]
    pub model: String,
}

fn default_inference_base_url() -> String {
    "https://api.anthropic.com".to_string()
}

fn default_inference_model() -> String {
    "claude-sonnet-4-6".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_redis_url")]
    pub redis_url: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            redis_url: default_redis_url(),
        }
    }
}

fn default_redis_url() -> String {
    "redis://127.0.0.1:6379".to_string()
}

/// The free, non-AI translation backend (SPEC_FULL.md §4.5's "general
/// purpose service"), independent of the `inference` region used for the
/// AI-backed classifier/translator path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslationConfig {
    #[serde(default = "default_free_translate_url")]
    pub free_base_url: String,
}

impl Default for TranslationConfig {
    fn default() -> Self {
        Self {
            free_base_url: default_free_translate_url(),
        }
    }
}

fn default_free_translate_url() -> String {
    "https://libretranslate.com".to_string()
}

/// Client-credentials grant used to mint the bearer token for the workbook
/// HTTP API — wholly independent of the upstream chat session (SPEC_FULL.md
/// §4.8), so it gets its own config region rather than living under `admin`
/// or `upstream`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkbookAuthConfig {
    pub client_id: String,
    pub client_secret: String,
    pub token_url: String,
    #[serde(default = "default_workbook_api_base")]
    pub api_base: String,
    #[serde(default = "default_workbook_scope")]
    pub scope: String,
}

fn default_workbook_api_base() -> String {
    "https://graph.microsoft.com/v1.0".to_string()
}

fn default_workbook_scope() -> String {
    "https://graph.microsoft.com/.default".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkbookBinding {
    pub site: String,
    pub folder: String,
    pub filename: String,
    #[serde(default = "default_significant_sheet")]
    pub significant_sheet: String,
    #[serde(default = "default_trivial_sheet")]
    pub trivial_sheet: String,
}

fn default_significant_sheet() -> String {
    "Significant".to_string()
}

fn default_trivial_sheet() -> String {
    "Trivial".to_string()
}

/// A matched-keyword pair. `native` may equal `english` for single-language
/// policies (the "degenerate case" named in SPEC_FULL.md §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeywordPair {
    pub english: String,
    pub native: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ClassificationPolicy {
    #[serde(default)]
    pub significant_keywords: Vec<KeywordPair>,
    #[serde(default)]
    pub trivial_keywords: Vec<KeywordPair>,
    #[serde(default)]
    pub exclude_keywords: Vec<KeywordPair>,
    #[serde(default)]
    pub use_ai_for_message_filtering: bool,
    #[serde(default)]
    pub translate_trivial: bool,
    #[serde(default)]
    pub use_ai_for_translation: bool,
    #[serde(default)]
    pub use_ai_for_enhanced_filtering: bool,
    #[serde(default)]
    pub additional_ai_criteria: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CountryConfig {
    pub name: String,
    pub channels: Vec<String>,
    pub webhook_url: String,
    pub workbook: WorkbookBinding,
    #[serde(default)]
    pub classification_policy: ClassificationPolicy,
    #[serde(default)]
    pub workbook_excluded_fields: Vec<String>,
    #[serde(default)]
    pub webhook_excluded_fields: Vec<String>,
    pub csv_dir: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AdminConfig {
    pub admin_webhook_url: Option<String>,
    #[serde(default = "default_admin_channel_name")]
    pub admin_channel_name: String,
}

fn default_admin_channel_name() -> String {
    "sentinel-admin".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaConfig {
    #[serde(default = "default_schema_fields")]
    pub fields: Vec<String>,
}

impl Default for SchemaConfig {
    fn default() -> Self {
        Self {
            fields: default_schema_fields(),
        }
    }
}

fn default_schema_fields() -> Vec<String> {
    vec![
        "external_id",
        "channel",
        "country",
        "authored_at",
        "author_handle",
        "original_body",
        "translated_body",
        "language",
        "was_translated",
        "verdict",
        "matched_keywords",
        "method",
        "reasoning",
        "processed_at",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    #[serde(default = "default_fetch_interval")]
    pub interval_seconds: u64,
    #[serde(default = "default_fetch_limit")]
    pub message_limit: u32,
    #[serde(default = "default_max_age_hours")]
    pub max_message_age_hours: i64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            interval_seconds: default_fetch_interval(),
            message_limit: default_fetch_limit(),
            max_message_age_hours: default_max_age_hours(),
        }
    }
}

fn default_fetch_interval() -> u64 {
    DEFAULT_FETCH_INTERVAL_SECONDS
}
fn default_fetch_limit() -> u32 {
    DEFAULT_FETCH_MESSAGE_LIMIT
}
fn default_max_age_hours() -> i64 {
    DEFAULT_MAX_MESSAGE_AGE_HOURS
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueTuning {
    pub concurrency: u32,
    pub max_retries: u32,
    pub base_delay_secs: u64,
    pub backoff_multiplier: f64,
    pub task_time_limit_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    #[serde(default = "default_fetch_queue")]
    pub fetch: QueueTuning,
    #[serde(default = "default_processing_queue")]
    pub processing: QueueTuning,
    #[serde(default = "default_webhook_queue")]
    pub webhook: QueueTuning,
    #[serde(default = "default_workbook_queue")]
    pub workbook: QueueTuning,
    #[serde(default = "default_csv_queue")]
    pub csv: QueueTuning,
    #[serde(default = "default_maintenance_queue")]
    pub maintenance: QueueTuning,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            fetch: default_fetch_queue(),
            processing: default_processing_queue(),
            webhook: default_webhook_queue(),
            workbook: default_workbook_queue(),
            csv: default_csv_queue(),
            maintenance: default_maintenance_queue(),
        }
    }
}

fn default_fetch_queue() -> QueueTuning {
    QueueTuning {
        concurrency: 1,
        max_retries: 3,
        base_delay_secs: 60,
        backoff_multiplier: 2.0,
        task_time_limit_secs: 120,
    }
}
fn default_processing_queue() -> QueueTuning {
    QueueTuning {
        concurrency: 4,
        max_retries: 3,
        base_delay_secs: 30,
        backoff_multiplier: 2.0,
        task_time_limit_secs: 60,
    }
}
fn default_webhook_queue() -> QueueTuning {
    QueueTuning {
        concurrency: 2,
        max_retries: 5,
        base_delay_secs: 60,
        backoff_multiplier: 1.5,
        task_time_limit_secs: 30,
    }
}
fn default_workbook_queue() -> QueueTuning {
    QueueTuning {
        concurrency: 2,
        max_retries: 5,
        base_delay_secs: 180,
        backoff_multiplier: 2.0,
        task_time_limit_secs: 60,
    }
}
fn default_csv_queue() -> QueueTuning {
    QueueTuning {
        concurrency: 1,
        max_retries: 3,
        base_delay_secs: 15,
        backoff_multiplier: 2.0,
        task_time_limit_secs: 15,
    }
}
fn default_maintenance_queue() -> QueueTuning {
    QueueTuning {
        concurrency: 1,
        max_retries: 3,
        base_delay_secs: 60,
        backoff_multiplier: 2.0,
        task_time_limit_secs: 60,
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    #[serde(default = "default_taskbus_db_path")]
    pub taskbus_db: String,
    #[serde(default = "default_lockfile_path")]
    pub session_lockfile: String,
    #[serde(default = "default_log_path")]
    pub log_file: String,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            taskbus_db: default_taskbus_db_path(),
            session_lockfile: default_lockfile_path(),
            log_file: default_log_path(),
        }
    }
}

fn default_taskbus_db_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{home}/.sentinel/taskbus.db")
}
fn default_lockfile_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{home}/.sentinel/session.lock")
}
fn default_log_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{home}/.sentinel/sentinel.log")
}

impl SentinelConfig {
    /// Load config from a TOML file with `SENTINEL_*` env var overrides.
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let path = config_path
            .map(String::from)
            .unwrap_or_else(default_config_path);

        let config: SentinelConfig = Figment::new()
            .merge(Toml::file(&path))
            .merge(Env::prefixed("SENTINEL_").split("_"))
            .extract()
            .map_err(|e| SentinelError::Config(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    /// Fail-fast structural validation. Anything reachable here must never
    /// surface as a panic deeper in the pipeline.
    pub fn validate(&self) -> Result<()> {
        if self.countries.is_empty() {
            return Err(SentinelError::Config(
                "no country partitions configured".into(),
            ));
        }
        for (id, country) in &self.countries {
            if country.channels.is_empty() {
                return Err(SentinelError::Config(format!(
                    "country '{id}' has no channels configured"
                )));
            }
            for pair in country
                .classification_policy
                .significant_keywords
                .iter()
                .chain(&country.classification_policy.trivial_keywords)
                .chain(&country.classification_policy.exclude_keywords)
            {
                if pair.english.trim().is_empty() {
                    return Err(SentinelError::Config(format!(
                        "country '{id}' has a keyword pair with an empty english form"
                    )));
                }
            }
        }
        if self.schema.fields.is_empty() {
            return Err(SentinelError::Config(
                "schema.fields must not be empty".into(),
            ));
        }
        Ok(())
    }
}

fn default_config_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{home}/.sentinel/sentinel.toml")
}
