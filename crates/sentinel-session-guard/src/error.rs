use thiserror::Error;

#[derive(Debug, Error)]
pub enum SessionGuardError {
    #[error("session lock busy: held by pid {pid} for purpose '{purpose}'")]
    Busy { pid: u32, purpose: String },

    #[error("session conflict: worker process {pid} ({worker_name}) is alive")]
    Conflict { pid: u32, worker_name: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("sidecar payload corrupt: {0}")]
    CorruptSidecar(String),
}

pub type Result<T> = std::result::Result<T, SessionGuardError>;
