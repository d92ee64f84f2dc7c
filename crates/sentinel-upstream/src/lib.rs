pub mod adapter;
pub mod backoff;
pub mod error;

pub use adapter::{AdapterStatus, TelegramAdapter, UpstreamAdapter};
pub use backoff::connect_with_backoff;
pub use error::{Result, UpstreamError};
