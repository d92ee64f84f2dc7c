pub mod config;
pub mod error;
pub mod http;
pub mod logging;
pub mod projection;
pub mod types;

pub use config::SentinelConfig;
pub use error::{Result, SentinelError};
