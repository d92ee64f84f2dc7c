use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClassifierError {
    #[error("inference service unavailable: {0}")]
    InferenceUnavailable(String),

    #[error("inference service returned an unparseable response: {0}")]
    UnparseableResponse(String),
}

pub type Result<T> = std::result::Result<T, ClassifierError>;
