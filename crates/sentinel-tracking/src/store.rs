use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use sentinel_core::types::{ChannelId, ExternalMessageId};
use tracing::{info, warn};

use crate::error::{Result, TrackingError};

/// TTL applied to both cursor and dedupe keys (SPEC_FULL.md §3: "TTL >= 24h").
pub const CURSOR_TTL_SECS: u64 = 24 * 3600;
pub const DEDUPE_TTL_SECS: u64 = 24 * 3600;

const CONNECT_BASE_DELAY_MS: u64 = 250;
const CONNECT_MAX_DELAY_MS: u64 = 5_000;
const CONNECT_MAX_ATTEMPTS: u32 = 8;

fn cursor_key(channel: &ChannelId) -> String {
    format!("track:cursor:{channel}")
}

fn seen_key(channel: &ChannelId, id: ExternalMessageId) -> String {
    format!("track:seen:{channel}:{}", id.0)
}

/// High-water-mark and dedupe store backed by a Redis-compatible cache.
///
/// `ConnectionManager` reconnects transparently on transport errors, but a
/// request issued while it is reconnecting still surfaces an error here —
/// callers treat that as [`TrackingError::Unavailable`] and fall back to the
/// conservative time-based admission path described in SPEC_FULL.md §4.1.
pub struct TrackingStore {
    conn: ConnectionManager,
}

impl TrackingStore {
    /// Connect with exponential backoff, mirroring the upstream-worker
    /// reconnect discipline this crate is grounded on: capped doubling delay,
    /// bounded attempt count, loud logging on every retry.
    pub async fn connect(redis_url: &str) -> Result<Self> {
        let client = redis::Client::open(redis_url)
            .map_err(|e| TrackingError::Protocol(e.to_string()))?;

        let mut delay_ms = CONNECT_BASE_DELAY_MS;
        let mut last_err = None;
        for attempt in 1..=CONNECT_MAX_ATTEMPTS {
            match client.get_connection_manager().await {
                Ok(conn) => {
                    info!(attempt, "tracking store connected");
                    return Ok(Self { conn });
                }
                Err(e) => {
                    warn!(attempt, error = %e, "tracking store connect failed, retrying");
                    last_err = Some(e);
                    if attempt < CONNECT_MAX_ATTEMPTS {
                        tokio::time::sleep(std::time::Duration::from_millis(delay_ms)).await;
                        delay_ms = (delay_ms * 2).min(CONNECT_MAX_DELAY_MS);
                    }
                }
            }
        }
        Err(TrackingError::Unavailable(
            last_err.map(|e| e.to_string()).unwrap_or_default(),
        ))
    }

    /// Return the stored high-water-mark for `channel`, if any.
    pub async fn get_cursor(&self, channel: &ChannelId) -> Result<Option<i64>> {
        let mut conn = self.conn.clone();
        let val: Option<i64> = conn.get(cursor_key(channel)).await?;
        Ok(val)
    }

    /// Monotonic merge: store `max(current, id)` and refresh the TTL.
    pub async fn set_cursor(&self, channel: &ChannelId, id: ExternalMessageId) -> Result<()> {
        let mut conn = self.conn.clone();
        let key = cursor_key(channel);
        let current: Option<i64> = conn.get(&key).await?;
        let next = match current {
            Some(c) if c >= id.0 => c,
            _ => id.0,
        };
        let _: () = conn.set_ex(&key, next, CURSOR_TTL_SECS).await?;
        Ok(())
    }

    /// Assert that `(channel, id)` has been enqueued; future `is_seen` calls
    /// for the same pair return true until the TTL lapses.
    pub async fn mark_seen(&self, channel: &ChannelId, id: ExternalMessageId) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: () = conn.set_ex(seen_key(channel, id), 1, DEDUPE_TTL_SECS).await?;
        Ok(())
    }

    pub async fn is_seen(&self, channel: &ChannelId, id: ExternalMessageId) -> Result<bool> {
        let mut conn = self.conn.clone();
        let val: Option<i64> = conn.get(seen_key(channel, id)).await?;
        Ok(val.is_some())
    }
}
