use thiserror::Error;

#[derive(Debug, Error)]
pub enum TranslatorError {
    #[error("translation backend unavailable: {0}")]
    Unavailable(String),
}

pub type Result<T> = std::result::Result<T, TranslatorError>;
