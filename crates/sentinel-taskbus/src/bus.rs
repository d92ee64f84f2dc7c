use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration as StdDuration;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use sentinel_core::config::QueueTuning;
use tokio::sync::watch;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::db::init_db;
use crate::error::{Result, TaskBusError};
use crate::handler::{TaskHandler, TaskOutcome};
use crate::types::{EnqueueOutcome, Task, TaskState};

/// Named-queue task bus backed by SQLite. One [`TaskBus`] is shared across
/// the whole process; each named queue gets its own pool of worker loops
/// with independent concurrency and retry envelopes (SPEC_FULL.md §4.6).
pub struct TaskBus {
    conn: Arc<Mutex<Connection>>,
    queues: HashMap<String, QueueTuning>,
    suppressed: Mutex<HashMap<String, DateTime<Utc>>>,
}

impl TaskBus {
    pub fn new(conn: Connection, queues: HashMap<String, QueueTuning>) -> Result<Self> {
        init_db(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            queues,
            suppressed: Mutex::new(HashMap::new()),
        })
    }

    fn tuning(&self, queue: &str) -> Result<&QueueTuning> {
        self.queues
            .get(queue)
            .ok_or_else(|| TaskBusError::QueueNotFound(queue.to_string()))
    }

    /// Suppress claims on `queue` until `until`. Used when the Upstream
    /// Adapter reports `rate_limited(w)` with `w` above threshold: the fetch
    /// queue refuses to hand out new work until the deadline passes
    /// (SPEC_FULL.md §4.3, §5).
    pub fn suppress_queue(&self, queue: &str, until: DateTime<Utc>) {
        let mut guard = self.suppressed.lock().unwrap();
        let entry = guard.entry(queue.to_string()).or_insert(until);
        if until > *entry {
            *entry = until;
        }
        warn!(queue, until = %until, "queue suppressed");
    }

    pub fn is_suppressed(&self, queue: &str) -> bool {
        let guard = self.suppressed.lock().unwrap();
        guard.get(queue).is_some_and(|until| Utc::now() < *until)
    }

    /// Enqueue a task keyed by `(queue, idempotency_key)`. A repeated key
    /// whose prior record is still live (`pending`/`done`, or `in_flight`
    /// within its deadline) is a no-op; see [`EnqueueOutcome`].
    pub fn enqueue(
        &self,
        queue: &str,
        idempotency_key: &str,
        payload: serde_json::Value,
    ) -> Result<EnqueueOutcome> {
        let tuning = self.tuning(queue)?.clone();
        let conn = self.conn.lock().unwrap();
        let now = Utc::now();
        let now_str = now.to_rfc3339();

        let existing: Option<(String, String, String)> = conn
            .query_row(
                "SELECT id, state, updated_at FROM tasks WHERE queue = ?1 AND idempotency_key = ?2",
                params![queue, idempotency_key],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()?;

        let Some((id, state_str, updated_at_str)) = existing else {
            let id = Uuid::new_v4().to_string();
            conn.execute(
                "INSERT INTO tasks
                 (id, queue, idempotency_key, payload, state, attempt, last_error, next_retry_at, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, 'pending', 0, NULL, NULL, ?5, ?5)",
                params![id, queue, idempotency_key, payload.to_string(), now_str],
            )?;
            info!(queue, idempotency_key, task_id = %id, "task enqueued");
            return Ok(EnqueueOutcome::Accepted);
        };

        let state: TaskState = state_str
            .parse()
            .map_err(|_| TaskBusError::Corrupt(format!("bad state on task {id}")))?;

        match state {
            TaskState::Pending | TaskState::Done => Ok(EnqueueOutcome::Deduped),
            TaskState::DeadLetter => Ok(EnqueueOutcome::DeadLettered),
            TaskState::InFlight => {
                let updated_at: DateTime<Utc> = updated_at_str
                    .parse()
                    .map_err(|_| TaskBusError::Corrupt(format!("bad updated_at on task {id}")))?;
                let deadline = updated_at + chrono::Duration::seconds(tuning.task_time_limit_secs as i64);
                if now <= deadline {
                    return Ok(EnqueueOutcome::Deduped);
                }
                conn.execute(
                    "UPDATE tasks SET state = 'pending', payload = ?1, next_retry_at = NULL, updated_at = ?2
                     WHERE id = ?3",
                    params![payload.to_string(), now_str, id],
                )?;
                warn!(queue, idempotency_key, task_id = %id, "reclaimed in-flight task past its deadline");
                Ok(EnqueueOutcome::Accepted)
            }
            TaskState::Failed => {
                conn.execute(
                    "UPDATE tasks SET state = 'pending', payload = ?1, next_retry_at = NULL, updated_at = ?2
                     WHERE id = ?3",
                    params![payload.to_string(), now_str, id],
                )?;
                Ok(EnqueueOutcome::Accepted)
            }
        }
    }

    /// Claim the oldest eligible task on `queue`: `pending`, or `failed`
    /// whose `next_retry_at` has passed. Marks it `in_flight` before
    /// returning so no other worker can claim it concurrently.
    fn claim_next(&self, queue: &str) -> Result<Option<Task>> {
        if self.is_suppressed(queue) {
            return Ok(None);
        }
        let conn = self.conn.lock().unwrap();
        let now = Utc::now();
        let now_str = now.to_rfc3339();

        let row: Option<(String, String, String, u32)> = conn
            .query_row(
                "SELECT id, idempotency_key, payload, attempt FROM tasks
                 WHERE queue = ?1
                   AND (state = 'pending' OR (state = 'failed' AND (next_retry_at IS NULL OR next_retry_at <= ?2)))
                 ORDER BY created_at LIMIT 1",
                params![queue, now_str],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
            )
            .optional()?;

        let Some((id, idempotency_key, payload_str, attempt)) = row else {
            return Ok(None);
        };

        conn.execute(
            "UPDATE tasks SET state = 'in_flight', updated_at = ?1 WHERE id = ?2",
            params![now_str, id],
        )?;

        let payload: serde_json::Value = serde_json::from_str(&payload_str)
            .map_err(|e| TaskBusError::Corrupt(e.to_string()))?;

        Ok(Some(Task {
            id,
            queue: queue.to_string(),
            idempotency_key,
            payload,
            state: TaskState::InFlight,
            attempt,
            last_error: None,
            next_retry_at: None,
            created_at: now,
            updated_at: now,
        }))
    }

    fn mark_done(&self, id: &str) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        let now = Utc::now().to_rfc3339();
        conn.execute(
            "UPDATE tasks SET state = 'done', updated_at = ?1 WHERE id = ?2",
            params![now, id],
        )?;
        Ok(())
    }

    /// `attempt` is the count *before* this run; on exhaustion the task is
    /// moved to `dead_letter` instead of scheduling another retry.
    fn mark_retriable(&self, id: &str, attempt: u32, reason: &str, tuning: &QueueTuning) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        let now = Utc::now();
        let now_str = now.to_rfc3339();
        let new_attempt = attempt + 1;

        if new_attempt >= tuning.max_retries {
            conn.execute(
                "UPDATE tasks SET state = 'dead_letter', attempt = ?1, last_error = ?2, updated_at = ?3
                 WHERE id = ?4",
                params![new_attempt, reason, now_str, id],
            )?;
            warn!(task_id = id, attempts = new_attempt, reason, "task exhausted retries, moved to dead letter");
            return Ok(());
        }

        let delay_secs =
            tuning.base_delay_secs as f64 * tuning.backoff_multiplier.powi(new_attempt as i32 - 1);
        let next_retry = now + chrono::Duration::seconds(delay_secs as i64);
        conn.execute(
            "UPDATE tasks SET state = 'failed', attempt = ?1, last_error = ?2, next_retry_at = ?3, updated_at = ?4
             WHERE id = ?5",
            params![new_attempt, reason, next_retry.to_rfc3339(), now_str, id],
        )?;
        Ok(())
    }

    fn mark_fatal(&self, id: &str, reason: &str) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        let now = Utc::now().to_rfc3339();
        conn.execute(
            "UPDATE tasks SET state = 'dead_letter', last_error = ?1, updated_at = ?2 WHERE id = ?3",
            params![reason, now, id],
        )?;
        Ok(())
    }

    /// Delete terminal (`done`/`dead_letter`) rows older than `retention`.
    /// Wired to the `cleanup_cache` maintenance job (SPEC_FULL.md §4.7); does
    /// not touch `pending`/`in_flight`/`failed` rows regardless of age.
    pub fn prune_terminal_older_than(&self, retention: chrono::Duration) -> Result<u64> {
        let conn = self.conn.lock().unwrap();
        let cutoff = (Utc::now() - retention).to_rfc3339();
        let n = conn.execute(
            "DELETE FROM tasks WHERE state IN ('done', 'dead_letter') AND updated_at < ?1",
            params![cutoff],
        )?;
        Ok(n as u64)
    }

    /// True if `queue` has any `pending` or `in_flight` row. The scheduler
    /// uses this to coalesce `fetch_all` firings: a cycle still in flight
    /// means the next tick skips enqueuing rather than piling up
    /// (SPEC_FULL.md §4.7).
    pub fn queue_has_open_work(&self, queue: &str) -> Result<bool> {
        let conn = self.conn.lock().unwrap();
        let n: i64 = conn.query_row(
            "SELECT COUNT(*) FROM tasks WHERE queue = ?1 AND state IN ('pending', 'in_flight')",
            params![queue],
            |r| r.get(0),
        )?;
        Ok(n > 0)
    }

    /// Count tasks currently sitting in `dead_letter`, across all queues.
    /// Surfaced by the CLI `test` mode and by admin alerting.
    pub fn dead_letter_count(&self) -> Result<u64> {
        let conn = self.conn.lock().unwrap();
        let n: i64 = conn.query_row("SELECT COUNT(*) FROM tasks WHERE state = 'dead_letter'", [], |r| r.get(0))?;
        Ok(n as u64)
    }

    /// Spawn `concurrency` worker loops per registered queue that has a
    /// handler in `handlers`, and block until `shutdown` broadcasts `true`
    /// and every worker has drained its current task.
    pub async fn run(self: Arc<Self>, handlers: HashMap<String, Arc<dyn TaskHandler>>, shutdown: watch::Receiver<bool>) {
        let mut join_set = tokio::task::JoinSet::new();
        for (queue, tuning) in self.queues.clone() {
            let Some(handler) = handlers.get(&queue).cloned() else {
                warn!(queue, "no handler registered for queue, skipping");
                continue;
            };
            for worker_idx in 0..tuning.concurrency {
                let bus = Arc::clone(&self);
                let handler = Arc::clone(&handler);
                let queue = queue.clone();
                let tuning = tuning.clone();
                let shutdown_rx = shutdown.clone();
                join_set.spawn(async move {
                    bus.worker_loop(queue, worker_idx, tuning, handler, shutdown_rx).await;
                });
            }
        }
        while join_set.join_next().await.is_some() {}
    }

    async fn worker_loop(
        &self,
        queue: String,
        worker_idx: u32,
        tuning: QueueTuning,
        handler: Arc<dyn TaskHandler>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        info!(queue, worker_idx, "task bus worker started");
        let mut poll = tokio::time::interval(StdDuration::from_millis(500));
        loop {
            tokio::select! {
                biased;
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!(queue, worker_idx, "task bus worker shutting down");
                        break;
                    }
                }
                _ = poll.tick() => {
                    match self.claim_next(&queue) {
                        Ok(Some(task)) => self.run_one(&queue, &tuning, handler.as_ref(), task).await,
                        Ok(None) => {}
                        Err(e) => error!(queue, error = %e, "claim_next failed"),
                    }
                }
            }
        }
    }

    /// Run one claimed task under the queue's soft deadline. A single-
    /// threaded cooperative worker cannot literally kill its own OS process
    /// mid-future (SPEC_FULL.md §4.6's "exceeding the deadline aborts the
    /// worker process"); `tokio::time::timeout` gives the equivalent effect
    /// at the task granularity this engine actually schedules at — the
    /// in-flight future is dropped and the slot freed for the next claim.
    async fn run_one(&self, queue: &str, tuning: &QueueTuning, handler: &dyn TaskHandler, task: Task) {
        let deadline = StdDuration::from_secs(tuning.task_time_limit_secs);
        let outcome = tokio::time::timeout(deadline, handler.handle(task.payload.clone())).await;

        let result = match outcome {
            Ok(TaskOutcome::Done) => self.mark_done(&task.id),
            Ok(TaskOutcome::Retriable(reason)) => self.mark_retriable(&task.id, task.attempt, &reason, tuning),
            Ok(TaskOutcome::Fatal(reason)) => self.mark_fatal(&task.id, &reason),
            Err(_elapsed) => {
                warn!(queue, task_id = %task.id, "task exceeded its time limit");
                self.mark_retriable(&task.id, task.attempt, "task_time_limit exceeded", tuning)
            }
        };

        if let Err(e) = result {
            error!(queue, task_id = %task.id, error = %e, "failed to persist task outcome");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn queue_map() -> HashMap<String, QueueTuning> {
        let mut m = HashMap::new();
        m.insert(
            "csv".to_string(),
            QueueTuning {
                concurrency: 1,
                max_retries: 2,
                base_delay_secs: 0,
                backoff_multiplier: 1.0,
                task_time_limit_secs: 5,
            },
        );
        m
    }

    fn bus() -> TaskBus {
        let conn = Connection::open_in_memory().unwrap();
        TaskBus::new(conn, queue_map()).unwrap()
    }

    #[test]
    fn repeat_enqueue_with_same_key_is_deduped_while_pending() {
        let bus = bus();
        let first = bus.enqueue("csv", "chan:1:csv", json!({"x": 1})).unwrap();
        let second = bus.enqueue("csv", "chan:1:csv", json!({"x": 1})).unwrap();
        assert_eq!(first, EnqueueOutcome::Accepted);
        assert_eq!(second, EnqueueOutcome::Deduped);
    }

    #[test]
    fn claim_marks_in_flight_and_hides_from_second_claim() {
        let bus = bus();
        bus.enqueue("csv", "chan:1:csv", json!({"x": 1})).unwrap();
        let claimed = bus.claim_next("csv").unwrap();
        assert!(claimed.is_some());
        let second = bus.claim_next("csv").unwrap();
        assert!(second.is_none());
    }

    #[test]
    fn retriable_failure_reschedules_until_retries_exhausted_then_dead_letters() {
        let bus = bus();
        bus.enqueue("csv", "chan:1:csv", json!({"x": 1})).unwrap();
        let task = bus.claim_next("csv").unwrap().unwrap();

        bus.mark_retriable(&task.id, task.attempt, "boom", bus.tuning("csv").unwrap())
            .unwrap();
        // base_delay_secs = 0 so the retry is immediately eligible.
        let reclaimed = bus.claim_next("csv").unwrap().unwrap();
        assert_eq!(reclaimed.attempt, 1);

        bus.mark_retriable(&reclaimed.id, reclaimed.attempt, "boom again", bus.tuning("csv").unwrap())
            .unwrap();
        assert_eq!(bus.dead_letter_count().unwrap(), 1);
        assert!(bus.claim_next("csv").unwrap().is_none());
    }

    #[test]
    fn dead_letter_enqueue_is_terminal() {
        let bus = bus();
        bus.enqueue("csv", "chan:1:csv", json!({"x": 1})).unwrap();
        let task = bus.claim_next("csv").unwrap().unwrap();
        bus.mark_retriable(&task.id, task.attempt, "boom", bus.tuning("csv").unwrap())
            .unwrap();
        let reclaimed = bus.claim_next("csv").unwrap().unwrap();
        bus.mark_retriable(&reclaimed.id, reclaimed.attempt, "boom", bus.tuning("csv").unwrap())
            .unwrap();

        let outcome = bus.enqueue("csv", "chan:1:csv", json!({"x": 1})).unwrap();
        assert_eq!(outcome, EnqueueOutcome::DeadLettered);
    }
}
