//! Date utilities for day-keyed client state.

use chrono::{DateTime, Duration, NaiveDate, Utc};

/// Calendar day an activity at `now` counts towards.
///
/// Days are UTC calendar dates, matching the backend's default when the
/// aggregation request carries no explicit day.
pub fn activity_day(now: DateTime<Utc>) -> NaiveDate {
    now.date_naive()
}

/// Format a day as YYYY-MM-DD for SQL queries.
pub fn day_string(day: NaiveDate) -> String {
    day.format("%Y-%m-%d").to_string()
}

/// Oldest day still kept in the dedup cache.
pub fn retention_cutoff(today: NaiveDate, retention_days: u32) -> NaiveDate {
    today - Duration::days(i64::from(retention_days))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_activity_day_is_utc_date() {
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 23, 59, 59).unwrap();
        assert_eq!(activity_day(now), NaiveDate::from_ymd_opt(2024, 5, 1).unwrap());
    }

    #[test]
    fn test_format_string() {
        let day = NaiveDate::from_ymd_opt(2024, 1, 9).unwrap();
        assert_eq!(day_string(day), "2024-01-09");
    }

    #[test]
    fn test_retention_cutoff() {
        let today = NaiveDate::from_ymd_opt(2024, 5, 31).unwrap();
        assert_eq!(
            retention_cutoff(today, 30),
            NaiveDate::from_ymd_opt(2024, 5, 1).unwrap()
        );
    }
}
