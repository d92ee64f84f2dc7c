use thiserror::Error;

#[derive(Debug, Error)]
pub enum TrackingError {
    #[error("cache unavailable: {0}")]
    Unavailable(String),

    #[error("cache protocol error: {0}")]
    Protocol(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
}

impl From<redis::RedisError> for TrackingError {
    fn from(e: redis::RedisError) -> Self {
        if e.is_connection_dropped() || e.is_connection_refusal() || e.is_timeout() {
            TrackingError::Unavailable(e.to_string())
        } else {
            TrackingError::Protocol(e.to_string())
        }
    }
}

pub type Result<T> = std::result::Result<T, TrackingError>;
