use thiserror::Error;

#[derive(Debug, Error)]
pub enum TaskBusError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("unknown queue: {0}")]
    QueueNotFound(String),

    #[error("task not found: {0}")]
    TaskNotFound(String),

    #[error("corrupt task record: {0}")]
    Corrupt(String),
}

pub type Result<T> = std::result::Result<T, TaskBusError>;
