use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Defines when and how often a job should run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Schedule {
    /// Run exactly once at the given UTC instant.
    Once { at: DateTime<Utc> },

    /// Run repeatedly with a fixed interval in seconds.
    Interval { every_secs: u64 },

    /// Run every day at the given hour and minute (UTC).
    Daily { hour: u8, minute: u8 },

    /// Run on a specific weekday (0 = Monday … 6 = Sunday) at the given time (UTC).
    Weekly { day: u8, hour: u8, minute: u8 },

    /// Run according to a cron expression (parsing support planned for a future phase).
    Cron { expression: String },
}

/// Lifecycle state of a job execution slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Waiting for its next_run time.
    Pending,
    /// Finished successfully (used for `Once` jobs after their single run).
    Completed,
    /// The scheduled window was skipped (e.g. engine was offline).
    Missed,
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            JobStatus::Pending => "pending",
            JobStatus::Completed => "completed",
            JobStatus::Missed => "missed",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "pending" => Ok(JobStatus::Pending),
            "completed" => Ok(JobStatus::Completed),
            "missed" => Ok(JobStatus::Missed),
            other => Err(format!("unknown job status: {other}")),
        }
    }
}

/// The four fixed triggers named in SPEC_FULL.md §4.7. Each carries its own
/// target task-bus queue and a stable label used to build task-bus
/// idempotency keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SeedAction {
    FetchAll,
    CleanupCache,
    CleanupSinkHistory,
    HealthPing,
}

impl SeedAction {
    pub fn queue(&self) -> &'static str {
        match self {
            SeedAction::FetchAll => "fetch",
            SeedAction::CleanupCache | SeedAction::CleanupSinkHistory | SeedAction::HealthPing => {
                "maintenance"
            }
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            SeedAction::FetchAll => "fetch_all",
            SeedAction::CleanupCache => "cleanup_cache",
            SeedAction::CleanupSinkHistory => "cleanup_sink_history",
            SeedAction::HealthPing => "health_ping",
        }
    }

    /// Whether firing this action must first check for existing open work
    /// on its target queue before enqueuing (SPEC_FULL.md §4.7: "does not
    /// queue a new fetch_all if the previous one is still in flight").
    pub fn coalesces(&self) -> bool {
        matches!(self, SeedAction::FetchAll)
    }
}

/// A persisted job record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    /// UUID v4 string — primary key.
    pub id: String,
    /// Human-readable, unique label (`fetch_all`, `cleanup_cache`, …).
    pub name: String,
    /// Serialised schedule definition.
    pub schedule: Schedule,
    /// The seed action this job fires.
    pub action: SeedAction,
    /// Current lifecycle state.
    pub status: JobStatus,
    /// ISO-8601 timestamp of the most recent execution start, if any.
    pub last_run: Option<String>,
    /// ISO-8601 timestamp of the next planned execution, if any.
    pub next_run: Option<String>,
    /// Total number of completed runs.
    pub run_count: u32,
    /// If set, the job is marked `Completed` after this many runs.
    pub max_runs: Option<u32>,
    /// ISO-8601 timestamp of job creation.
    pub created_at: String,
    /// ISO-8601 timestamp of the last metadata update.
    pub updated_at: String,
}
