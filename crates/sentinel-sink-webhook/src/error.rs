use thiserror::Error;

#[derive(Debug, Error)]
pub enum WebhookError {
    #[error("webhook post failed: {0}")]
    PostFailed(String),
}

pub type Result<T> = std::result::Result<T, WebhookError>;
