use rand::Rng;
use tokio::time::{sleep, Duration};
use tracing::{error, info, warn};

use crate::adapter::UpstreamAdapter;
use crate::error::{Result, UpstreamError};

const BACKOFF_BASE_SECS: u64 = 5;
const BACKOFF_MAX_SECS: u64 = 300;
const MAX_ATTEMPTS: u32 = 10;
const JITTER_FRACTION: f64 = 0.10;

/// Connect `adapter` with exponential backoff and +/-10% jitter, mirroring
/// the reconnect discipline this codebase already uses for other channel
/// adapters: 5s -> 10s -> 20s -> ... capped at 300s, up to 10 attempts.
pub async fn connect_with_backoff(adapter: &mut dyn UpstreamAdapter) -> Result<()> {
    let mut delay_secs = BACKOFF_BASE_SECS;

    for attempt in 1..=MAX_ATTEMPTS {
        match adapter.connect().await {
            Ok(()) => {
                info!(attempt, "upstream adapter connected");
                return Ok(());
            }
            // Auth failures are not retriable by backoff: the operator must
            // re-run the out-of-band login flow.
            Err(UpstreamError::AuthRequired(reason)) => {
                return Err(UpstreamError::AuthRequired(reason));
            }
            Err(e) if attempt == MAX_ATTEMPTS => {
                error!(attempt, error = %e, "upstream adapter failed to connect after retries");
                return Err(e);
            }
            Err(e) => {
                let jitter = jitter_secs(delay_secs);
                let total = delay_secs + jitter;
                warn!(attempt, max = MAX_ATTEMPTS, error = %e, retry_after_secs = total, "upstream connect failed, retrying");
                sleep(Duration::from_secs(total)).await;
                delay_secs = (delay_secs * 2).min(BACKOFF_MAX_SECS);
            }
        }
    }

    unreachable!("backoff loop exited without returning")
}

fn jitter_secs(base_secs: u64) -> u64 {
    let max_jitter = ((base_secs as f64) * JITTER_FRACTION) as u64;
    if max_jitter == 0 {
        return 0;
    }
    rand::thread_rng().gen_range(0..=max_jitter)
}
