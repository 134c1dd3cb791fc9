//! Rate-of-change guard: a new reading implying an implausibly fast level
//! change against the last persisted one is dropped, not raised.

use crate::store::Reading;
use chrono::{DateTime, Utc};

/// Whether `new_level` is plausible given the most recent persisted reading.
/// With no prior reading it always accepts. A zero or negative elapsed time
/// rejects outright instead of dividing by it.
pub fn accept(
    now: DateTime<Utc>,
    new_level: f64,
    last: Option<&Reading>,
    max_rate_cm_per_hour: f64,
) -> bool {
    let Some(last) = last else {
        return true;
    };

    let elapsed_hours = (now - last.ts).num_seconds() as f64 / 3600.0;
    if elapsed_hours <= 0.0 {
        return false;
    }

    let rate = (new_level - last.level).abs() / elapsed_hours;
    rate < max_rate_cm_per_hour
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn reading(ts: DateTime<Utc>, level: f64) -> Reading {
        Reading { ts, level }
    }

    fn hour_ago(now: DateTime<Utc>) -> DateTime<Utc> {
        now - Duration::hours(1)
    }

    #[test]
    fn bootstrap_accepts_anything() {
        let now = Utc.with_ymd_and_hms(2026, 8, 1, 12, 0, 0).unwrap();
        assert!(accept(now, -149.0, None, 5.0));
        assert!(accept(now, 9999.0, None, 5.0));
    }

    #[test]
    fn slow_change_is_accepted() {
        let now = Utc.with_ymd_and_hms(2026, 8, 1, 12, 0, 0).unwrap();
        let last = reading(hour_ago(now), 100.0);
        assert!(accept(now, 104.0, Some(&last), 5.0));
    }

    #[test]
    fn fast_rise_is_rejected() {
        let now = Utc.with_ymd_and_hms(2026, 8, 1, 12, 0, 0).unwrap();
        let last = reading(hour_ago(now), 100.0);
        assert!(!accept(now, 106.0, Some(&last), 5.0));
    }

    #[test]
    fn fast_drop_is_rejected_symmetrically() {
        let now = Utc.with_ymd_and_hms(2026, 8, 1, 12, 0, 0).unwrap();
        let last = reading(hour_ago(now), 100.0);
        assert!(!accept(now, 95.0, Some(&last), 5.0));
    }

    #[test]
    fn zero_elapsed_time_rejects_instead_of_dividing() {
        let now = Utc.with_ymd_and_hms(2026, 8, 1, 12, 0, 0).unwrap();
        let last = reading(now, 100.0);
        assert!(!accept(now, 100.1, Some(&last), 5.0));
    }

    #[test]
    fn clock_regression_rejects() {
        let now = Utc.with_ymd_and_hms(2026, 8, 1, 12, 0, 0).unwrap();
        let last = reading(now + Duration::minutes(5), 100.0);
        assert!(!accept(now, 100.0, Some(&last), 5.0));
    }
}
