use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle state of a queued task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    /// Persisted, not yet handed to a worker (or waiting to be retried).
    Pending,
    /// Currently being processed by a worker.
    InFlight,
    /// Handler returned success.
    Done,
    /// Handler failed and retries remain; will be retried after `base_delay * multiplier^attempt`.
    Failed,
    /// Handler failed and `max_retries` was exhausted.
    DeadLetter,
}

impl std::fmt::Display for TaskState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TaskState::Pending => "pending",
            TaskState::InFlight => "in_flight",
            TaskState::Done => "done",
            TaskState::Failed => "failed",
            TaskState::DeadLetter => "dead_letter",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for TaskState {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "pending" => Ok(TaskState::Pending),
            "in_flight" => Ok(TaskState::InFlight),
            "done" => Ok(TaskState::Done),
            "failed" => Ok(TaskState::Failed),
            "dead_letter" => Ok(TaskState::DeadLetter),
            other => Err(format!("unknown task state: {other}")),
        }
    }
}

/// A unit of work routed to one of the named queues.
///
/// `idempotency_key` is unique per queue: re-enqueuing the same key while a
/// prior task with that key is `Pending`, `InFlight`, or `Done` is a no-op,
/// which is what lets the dispatcher enqueue a sink task and then advance a
/// cursor without creating duplicate work on restart.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub queue: String,
    pub idempotency_key: String,
    pub payload: serde_json::Value,
    pub state: TaskState,
    pub attempt: u32,
    pub last_error: Option<String>,
    /// Set when `state == Failed`; the row is not eligible for reclaim by a
    /// worker until this instant passes.
    pub next_retry_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Result of an `enqueue` call, reflecting the idempotency rule in
/// SPEC_FULL.md §4.6: a repeated `(queue, idempotency_key)` short-circuits
/// unless the prior record is `Failed` or `InFlight` past its deadline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnqueueOutcome {
    /// No prior record, or the prior record was eligible for reclaim: a
    /// fresh attempt was persisted as `Pending`.
    Accepted,
    /// A prior record already covers this obligation (`Pending`, `Done`, or
    /// an `InFlight` record still within its deadline); no new work queued.
    Deduped,
    /// A prior record is `DeadLetter`; terminal, no automatic retry.
    DeadLettered,
}
