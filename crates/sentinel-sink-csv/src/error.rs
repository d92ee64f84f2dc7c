use thiserror::Error;

#[derive(Debug, Error)]
pub enum CsvSinkError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("schema mismatch, unknown field: {0}")]
    SchemaMismatch(String),
}

pub type Result<T> = std::result::Result<T, CsvSinkError>;
