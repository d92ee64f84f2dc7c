//! `sentinel-taskbus` — named async queues with per-queue concurrency,
//! bounded-backoff retries, and idempotency via `(queue, idempotency_key)`.
//!
//! See SPEC_FULL.md §4.6 for the queue topology (fetch/processing/webhook/
//! workbook/csv/maintenance) and their individual concurrency/retry tuning.

pub mod bus;
pub mod db;
pub mod error;
pub mod handler;
pub mod types;

pub use bus::TaskBus;
pub use error::{Result, TaskBusError};
pub use handler::{TaskHandler, TaskOutcome};
pub use types::{EnqueueOutcome, Task, TaskState};
