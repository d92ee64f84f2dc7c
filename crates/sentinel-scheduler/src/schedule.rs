use chrono::{DateTime, Datelike, Duration, TimeZone, Utc};
use tracing::warn;

use crate::types::Schedule;

/// Compute the next UTC execution time for `schedule` starting *after* `from`.
///
/// Returns `None` when the schedule is exhausted (e.g. a `Once` job whose
/// time has already passed) or when the schedule type is not yet supported
/// (e.g. `Cron`).
pub fn compute_next_run(schedule: &Schedule, from: DateTime<Utc>) -> Option<DateTime<Utc>> {
    match schedule {
        Schedule::Once { at } => {
            if *at > from {
                Some(*at)
            } else {
                None
            }
        }

        Schedule::Interval { every_secs } => Some(from + Duration::seconds(*every_secs as i64)),

        Schedule::Daily { hour, minute } => {
            let candidate = Utc
                .with_ymd_and_hms(
                    from.year(),
                    from.month(),
                    from.day(),
                    *hour as u32,
                    *minute as u32,
                    0,
                )
                .single()?;
            if candidate > from {
                Some(candidate)
            } else {
                Some(candidate + Duration::days(1))
            }
        }

        Schedule::Weekly { day, hour, minute } => {
            // `day` follows ISO weekday numbering: 0=Monday … 6=Sunday,
            // which matches chrono's `num_days_from_monday`.
            let today_dow = from.weekday().num_days_from_monday() as i64;
            let target_dow = (*day as i64).clamp(0, 6);
            let mut days_ahead = target_dow - today_dow;

            let candidate_day = if days_ahead < 0 {
                from + Duration::days(7 + days_ahead)
            } else {
                from + Duration::days(days_ahead)
            };

            let candidate = Utc
                .with_ymd_and_hms(
                    candidate_day.year(),
                    candidate_day.month(),
                    candidate_day.day(),
                    *hour as u32,
                    *minute as u32,
                    0,
                )
                .single()?;

            if candidate > from {
                Some(candidate)
            } else {
                days_ahead = if days_ahead <= 0 { 7 } else { 7 - days_ahead };
                Some(candidate + Duration::days(days_ahead))
            }
        }

        Schedule::Cron { .. } => {
            warn!("cron schedule type is not yet supported; next_run will not be set");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interval_advances_by_fixed_seconds() {
        let from = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let next = compute_next_run(&Schedule::Interval { every_secs: 180 }, from).unwrap();
        assert_eq!(next, from + Duration::seconds(180));
    }

    #[test]
    fn daily_rolls_to_tomorrow_once_todays_slot_passed() {
        let from = Utc.with_ymd_and_hms(2026, 1, 1, 12, 0, 0).unwrap();
        let next = compute_next_run(&Schedule::Daily { hour: 3, minute: 0 }, from).unwrap();
        assert_eq!(next, Utc.with_ymd_and_hms(2026, 1, 2, 3, 0, 0).unwrap());
    }
}
