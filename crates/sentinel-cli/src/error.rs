use thiserror::Error;

/// Process exit codes per SPEC_FULL.md §6.
#[derive(Debug, Error)]
pub enum CliError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("session safety refusal: {0}")]
    SessionSafety(String),

    #[error("unrecoverable external failure: {0}")]
    ExternalFailure(String),
}

impl CliError {
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Config(_) => 1,
            CliError::SessionSafety(_) => 2,
            CliError::ExternalFailure(_) => 3,
        }
    }
}

pub type Result<T> = std::result::Result<T, CliError>;
