use thiserror::Error;

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("task bus error: {0}")]
    TaskBus(#[from] sentinel_taskbus::TaskBusError),

    #[error("tracking store error: {0}")]
    Tracking(#[from] sentinel_tracking::error::TrackingError),
}

pub type Result<T> = std::result::Result<T, DispatchError>;
