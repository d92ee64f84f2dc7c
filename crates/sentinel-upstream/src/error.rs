use thiserror::Error;

#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    #[error("authentication required: {0}")]
    AuthRequired(String),

    #[error("rate limited, retry after {wait_secs}s")]
    RateLimited { wait_secs: u64 },

    #[error("transient error: {0}")]
    Transient(String),

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("channel not found: {0}")]
    ChannelNotFound(String),
}

pub type Result<T> = std::result::Result<T, UpstreamError>;
