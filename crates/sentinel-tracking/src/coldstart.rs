use chrono::{DateTime, Duration, Utc};
use std::path::Path;

use crate::error::Result;

/// When the tracking store has no cursor for a channel (fresh deployment, or
/// the cache was flushed), scan a CSV sink's `external_id`/`channel` columns
/// and return the largest id seen for `channel_id`.
///
/// Returns `Ok(None)` if the file does not exist or no row matches — this is
/// a best-effort recovery path, not a hard dependency.
pub fn recover_cursor_from_csv(csv_path: &Path, channel_id: &str) -> Result<Option<i64>> {
    if !csv_path.exists() {
        return Ok(None);
    }
    let mut reader = csv::Reader::from_path(csv_path)?;
    let headers = reader.headers()?.clone();
    let id_idx = headers.iter().position(|h| h == "external_id");
    let channel_idx = headers.iter().position(|h| h == "channel");
    let (Some(id_idx), Some(channel_idx)) = (id_idx, channel_idx) else {
        return Ok(None);
    };

    let mut max_id: Option<i64> = None;
    for record in reader.records() {
        let record = record?;
        if record.get(channel_idx) != Some(channel_id) {
            continue;
        }
        if let Some(id_str) = record.get(id_idx) {
            if let Ok(id) = id_str.parse::<i64>() {
                max_id = Some(max_id.map_or(id, |m| m.max(id)));
            }
        }
    }
    Ok(max_id)
}

/// When neither the cache nor the CSV backfill yields a cursor, admit only
/// messages authored within `fetch_interval + 30s` of `now` — SPEC_FULL.md
/// §4.1's "conservative time-based admission", which keeps a bootstrapping
/// node from flooding every sink with a channel's entire history.
pub fn conservative_admission_cutoff(now: DateTime<Utc>, fetch_interval_secs: u64) -> DateTime<Utc> {
    now - Duration::seconds(fetch_interval_secs as i64 + 30)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conservative_cutoff_is_interval_plus_30s_before_now() {
        let now = Utc::now();
        let cutoff = conservative_admission_cutoff(now, 180);
        assert_eq!(now - cutoff, Duration::seconds(210));
    }

    #[test]
    fn recover_cursor_returns_none_for_missing_file() {
        let result = recover_cursor_from_csv(Path::new("/nonexistent/path.csv"), "chan").unwrap();
        assert_eq!(result, None);
    }

    #[test]
    fn recover_cursor_picks_max_for_matching_channel() {
        let dir = std::env::temp_dir().join(format!("sentinel-test-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("significant.csv");
        std::fs::write(
            &path,
            "external_id,channel,body\n10,chan_a,x\n55,chan_a,y\n999,chan_b,z\n",
        )
        .unwrap();

        let result = recover_cursor_from_csv(&path, "chan_a").unwrap();
        assert_eq!(result, Some(55));

        std::fs::remove_dir_all(&dir).ok();
    }
}
