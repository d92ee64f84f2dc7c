use async_trait::async_trait;
use serde_json::Value;

/// Outcome a handler reports back to the engine after running one task.
#[derive(Debug, Clone)]
pub enum TaskOutcome {
    /// The task's effect was fully applied; mark the record `done`.
    Done,
    /// The handler failed for a reason that may clear on its own (network
    /// blip, upstream 5xx, lock contention). Eligible for backoff retry up
    /// to the queue's `max_retries`.
    Retriable(String),
    /// The handler failed for a reason retrying cannot fix (malformed
    /// payload, schema mismatch). Moves straight to `dead_letter`.
    Fatal(String),
}

/// A queue's unit-of-work handler. One implementation per named queue
/// (fetch, processing, webhook, workbook, csv, maintenance); the engine
/// itself has no notion of what a task does beyond its payload and outcome.
#[async_trait]
pub trait TaskHandler: Send + Sync {
    async fn handle(&self, payload: Value) -> TaskOutcome;
}
