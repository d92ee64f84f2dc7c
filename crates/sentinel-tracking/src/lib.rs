pub mod coldstart;
pub mod error;
pub mod store;

pub use coldstart::{conservative_admission_cutoff, recover_cursor_from_csv};
pub use error::{Result, TrackingError};
pub use store::{TrackingStore, CURSOR_TTL_SECS, DEDUPE_TTL_SECS};
