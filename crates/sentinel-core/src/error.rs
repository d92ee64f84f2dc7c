use thiserror::Error;

/// Top-level error type shared across the fabric.
///
/// Component crates define their own narrower error enums and convert into
/// this one at the boundary where a result needs to cross into the task bus
/// or the CLI driver.
#[derive(Debug, Error)]
pub enum SentinelError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("session conflict: {reason}")]
    SessionConflict { reason: String },

    #[error("upstream rate limited, retry after {wait_secs}s")]
    RateLimited { wait_secs: u64 },

    #[error("upstream authentication required: {0}")]
    AuthRequired(String),

    #[error("transient network error: {0}")]
    TransientNetwork(String),

    #[error("sink error ({sink}): {reason}")]
    Sink { sink: String, reason: String },

    #[error("sink schema mismatch: {0}")]
    SinkSchemaMismatch(String),

    #[error("database error: {0}")]
    Database(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl SentinelError {
    /// Short machine-stable code, mirrored in admin-webhook alert payloads
    /// and log fields so operators can grep by kind across components.
    pub fn code(&self) -> &'static str {
        match self {
            SentinelError::Config(_) => "CONFIG_INVALID",
            SentinelError::SessionConflict { .. } => "SESSION_CONFLICT",
            SentinelError::RateLimited { .. } => "RATE_LIMITED",
            SentinelError::AuthRequired(_) => "AUTH_REQUIRED",
            SentinelError::TransientNetwork(_) => "TRANSIENT_NETWORK",
            SentinelError::Sink { .. } => "SINK_TRANSIENT",
            SentinelError::SinkSchemaMismatch(_) => "SINK_SCHEMA_MISMATCH",
            SentinelError::Database(_) => "DATABASE_ERROR",
            SentinelError::Serialization(_) => "SERIALIZATION_ERROR",
            SentinelError::Io(_) => "IO_ERROR",
            SentinelError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Whether the task bus should retry the task that produced this error.
    pub fn is_retriable(&self) -> bool {
        matches!(
            self,
            SentinelError::TransientNetwork(_)
                | SentinelError::Sink { .. }
                | SentinelError::RateLimited { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, SentinelError>;
