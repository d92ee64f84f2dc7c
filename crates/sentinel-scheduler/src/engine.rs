use std::sync::Arc;

use chrono::Utc;
use rusqlite::Connection;
use sentinel_taskbus::TaskBus;
use tokio::sync::watch;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::{
    db::init_db,
    error::{Result, SchedulerError},
    schedule::compute_next_run,
    types::{Job, JobStatus, Schedule, SeedAction},
};

/// Core scheduler: persists jobs to SQLite, polls every second, and forwards
/// fired jobs straight to [`TaskBus::enqueue`] on their target queue.
///
/// This is a generic interval/daily/weekly job scheduler with no
/// Sentinel-specific semantics baked into the engine itself — only the four
/// seed jobs registered at bootstrap (SPEC_FULL.md §4.7) are domain-specific,
/// and they are plain data (a [`Schedule`] + [`SeedAction`] row), not code.
pub struct SchedulerEngine {
    conn: Connection,
    task_bus: Arc<TaskBus>,
}

impl SchedulerEngine {
    pub fn new(conn: Connection, task_bus: Arc<TaskBus>) -> Result<Self> {
        init_db(&conn)?;
        Ok(Self { conn, task_bus })
    }

    /// Register the four fixed triggers if they are not already present
    /// (keyed by unique `name`, so bootstrap is idempotent across restarts).
    pub fn register_seed_jobs(&self, fetch_interval_secs: u64) -> Result<()> {
        self.ensure_job("fetch_all", Schedule::Interval { every_secs: fetch_interval_secs }, SeedAction::FetchAll)?;
        self.ensure_job("cleanup_cache", Schedule::Interval { every_secs: 3600 }, SeedAction::CleanupCache)?;
        self.ensure_job(
            "cleanup_sink_history",
            Schedule::Daily { hour: 3, minute: 0 },
            SeedAction::CleanupSinkHistory,
        )?;
        self.ensure_job("health_ping", Schedule::Interval { every_secs: 300 }, SeedAction::HealthPing)?;
        Ok(())
    }

    fn ensure_job(&self, name: &str, schedule: Schedule, action: SeedAction) -> Result<()> {
        let exists: bool = self
            .conn
            .query_row("SELECT EXISTS(SELECT 1 FROM jobs WHERE name = ?1)", [name], |r| r.get(0))?;
        if exists {
            return Ok(());
        }
        self.add_job(name, schedule, action)?;
        info!(job = name, "seed job registered");
        Ok(())
    }

    pub fn add_job(&self, name: &str, schedule: Schedule, action: SeedAction) -> Result<Job> {
        let now = Utc::now();
        let now_str = now.to_rfc3339();
        let next = compute_next_run(&schedule, now).map(|dt| dt.to_rfc3339());
        let id = Uuid::new_v4().to_string();
        let schedule_json =
            serde_json::to_string(&schedule).map_err(|e| SchedulerError::InvalidSchedule(e.to_string()))?;
        let action_json =
            serde_json::to_string(&action).map_err(|e| SchedulerError::InvalidSchedule(e.to_string()))?;

        self.conn.execute(
            "INSERT INTO jobs
             (id, name, schedule, action, status, last_run, next_run,
              run_count, max_runs, created_at, updated_at)
             VALUES (?1,?2,?3,?4,'pending',NULL,?5,0,NULL,?6,?6)",
            rusqlite::params![id, name, schedule_json, action_json, next, now_str],
        )?;

        Ok(Job {
            id,
            name: name.to_string(),
            schedule,
            action,
            status: JobStatus::Pending,
            last_run: None,
            next_run: next,
            run_count: 0,
            max_runs: None,
            created_at: now_str.clone(),
            updated_at: now_str,
        })
    }

    pub fn list_jobs(&self) -> Result<Vec<Job>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, schedule, action, status, last_run, next_run,
                    run_count, max_runs, created_at, updated_at
             FROM jobs ORDER BY created_at",
        )?;

        let jobs = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, Option<String>>(5)?,
                    row.get::<_, Option<String>>(6)?,
                    row.get::<_, u32>(7)?,
                    row.get::<_, Option<u32>>(8)?,
                    row.get::<_, String>(9)?,
                    row.get::<_, String>(10)?,
                ))
            })?
            .filter_map(|r| {
                let (id, name, sched_json, action_json, status_str, last_run, next_run, run_count, max_runs, created_at, updated_at) =
                    r.ok()?;
                let schedule: Schedule = serde_json::from_str(&sched_json).ok()?;
                let action: SeedAction = serde_json::from_str(&action_json).ok()?;
                let status: JobStatus = status_str.parse().ok()?;
                Some(Job {
                    id,
                    name,
                    schedule,
                    action,
                    status,
                    last_run,
                    next_run,
                    run_count,
                    max_runs,
                    created_at,
                    updated_at,
                })
            })
            .collect();
        Ok(jobs)
    }

    /// Main event loop. Polls every second until `shutdown` broadcasts `true`.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        info!("scheduler engine started");
        self.mark_missed_on_startup();

        let mut interval = tokio::time::interval(std::time::Duration::from_secs(1));
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if let Err(e) = self.tick() {
                        error!("scheduler tick error: {e}");
                    }
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("scheduler engine shutting down");
                        break;
                    }
                }
            }
        }
    }

    fn mark_missed_on_startup(&mut self) {
        let now = Utc::now().to_rfc3339();
        match self.conn.execute(
            "UPDATE jobs SET status = 'missed', updated_at = ?1
             WHERE status = 'pending' AND next_run IS NOT NULL AND next_run < ?1",
            [&now],
        ) {
            Ok(n) if n > 0 => warn!(count = n, "jobs marked missed on startup"),
            Err(e) => error!("missed-on-startup query failed: {e}"),
            _ => {}
        }
    }

    fn tick(&mut self) -> Result<()> {
        let now = Utc::now();
        let now_str = now.to_rfc3339();

        let due: Vec<(String, String, String, String, u32, Option<u32>)> = {
            let mut stmt = self.conn.prepare_cached(
                "SELECT id, name, schedule, action, run_count, max_runs FROM jobs
                 WHERE status = 'pending' AND next_run IS NOT NULL AND next_run <= ?1",
            )?;
            let rows: Vec<_> = stmt
                .query_map([&now_str], |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, u32>(4)?,
                        row.get::<_, Option<u32>>(5)?,
                    ))
                })?
                .filter_map(|r| r.ok())
                .collect();
            rows
        };

        for (id, name, sched_json, action_json, run_count, max_runs) in due {
            let schedule: Schedule = match serde_json::from_str(&sched_json) {
                Ok(s) => s,
                Err(e) => {
                    error!(job_id = %id, "bad schedule JSON: {e}");
                    continue;
                }
            };
            let action: SeedAction = match serde_json::from_str(&action_json) {
                Ok(a) => a,
                Err(e) => {
                    error!(job_id = %id, "bad action JSON: {e}");
                    continue;
                }
            };

            self.fire(&id, &name, &action, now);

            let new_count = run_count + 1;
            let next = if max_runs.is_some_and(|m| new_count >= m) {
                None
            } else {
                compute_next_run(&schedule, now).map(|dt| dt.to_rfc3339())
            };
            let new_status = if next.is_none() { "completed" } else { "pending" };

            self.conn.execute(
                "UPDATE jobs SET status=?1, last_run=?2, next_run=?3, run_count=?4, updated_at=?2 WHERE id=?5",
                rusqlite::params![new_status, now_str, next, new_count, id],
            )?;
        }
        Ok(())
    }

    /// Enqueue the task-bus work for a fired job, honoring the `fetch_all`
    /// coalesce rule: skip if the fetch queue already has open work.
    fn fire(&self, job_id: &str, name: &str, action: &SeedAction, now: chrono::DateTime<Utc>) {
        if action.coalesces() {
            match self.task_bus.queue_has_open_work(action.queue()) {
                Ok(true) => {
                    info!(job_id, name, "fetch_all coalesced: previous cycle still in flight");
                    return;
                }
                Err(e) => {
                    error!(job_id, name, error = %e, "coalesce check failed, firing anyway");
                }
                Ok(false) => {}
            }
        }

        let idempotency_key = format!("{}:{}", action.label(), now.timestamp());
        let payload = serde_json::json!({ "action": action.label(), "fired_at": now.to_rfc3339() });
        match self.task_bus.enqueue(action.queue(), &idempotency_key, payload) {
            Ok(outcome) => info!(job_id, name, queue = action.queue(), ?outcome, "job fired"),
            Err(e) => error!(job_id, name, error = %e, "failed to enqueue fired job"),
        }
    }
}
