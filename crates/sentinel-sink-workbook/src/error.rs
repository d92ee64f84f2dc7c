use thiserror::Error;

#[derive(Debug, Error)]
pub enum WorkbookError {
    #[error("workbook session init failed: {0}")]
    SessionInit(String),

    #[error("workbook http call failed: {0}")]
    Http(String),

    #[error("workbook sheet lookup failed: {0}")]
    SheetLookup(String),

    #[error("unknown schema field: {0}")]
    SchemaMismatch(String),
}

impl WorkbookError {
    /// Session-init failures are the one kind the Task Bus treats as
    /// retriable with its own backoff and that also triggers an admin alert
    /// (SPEC_FULL.md §4.8); everything else is a plain row-append failure.
    pub fn is_session_init(&self) -> bool {
        matches!(self, WorkbookError::SessionInit(_))
    }
}

pub type Result<T> = std::result::Result<T, WorkbookError>;
