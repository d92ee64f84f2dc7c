//! `sentinel-scheduler` — Tokio-based job scheduler with SQLite persistence.
//!
//! Drives the four fixed triggers named in SPEC_FULL.md §4.7 (`fetch_all`,
//! `cleanup_cache`, `cleanup_sink_history`, `health_ping`) by forwarding
//! fired jobs directly to [`sentinel_taskbus::TaskBus::enqueue`].

pub mod db;
pub mod engine;
pub mod error;
pub mod schedule;
pub mod types;

pub use engine::SchedulerEngine;
pub use error::{Result, SchedulerError};
pub use types::{Job, JobStatus, Schedule, SeedAction};
