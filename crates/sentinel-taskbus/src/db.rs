use rusqlite::Connection;

use crate::error::Result;

/// Initialise the task-bus schema in `conn`.
///
/// Creates the `tasks` table (idempotent) plus the indexes the engine
/// depends on: one for the idempotency-key lookup done on every `enqueue`,
/// and one for the pending-task sweep done on startup and on periodic
/// recovery.
pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS tasks (
            id              TEXT    NOT NULL PRIMARY KEY,
            queue           TEXT    NOT NULL,
            idempotency_key TEXT    NOT NULL,
            payload         TEXT    NOT NULL,   -- JSON
            state           TEXT    NOT NULL DEFAULT 'pending',
            attempt         INTEGER NOT NULL DEFAULT 0,
            last_error      TEXT,
            next_retry_at   TEXT,
            created_at      TEXT    NOT NULL,
            updated_at      TEXT    NOT NULL
        ) STRICT;

        CREATE UNIQUE INDEX IF NOT EXISTS idx_tasks_queue_idempotency
            ON tasks (queue, idempotency_key);

        CREATE INDEX IF NOT EXISTS idx_tasks_state ON tasks (state);
        ",
    )?;
    Ok(())
}
