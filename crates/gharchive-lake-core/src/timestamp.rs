//! Process timestamps and partition granularity
//!
//! A `ProcessTimestamp` always names a completed hour: construction truncates
//! minutes, seconds and sub-seconds, and the scheduling helpers step back one
//! unit from "now" before truncating.

use chrono::{DateTime, Duration, NaiveDateTime, NaiveTime, Timelike, Utc};
use std::fmt;

/// Bucketing of a partition path or export file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Granularity {
    Hourly,
    Daily,
}

impl Granularity {
    pub fn is_hourly(&self) -> bool {
        matches!(self, Granularity::Hourly)
    }
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Granularity::Hourly => f.write_str("hourly"),
            Granularity::Daily => f.write_str("daily"),
        }
    }
}

/// Timezone-naive instant truncated to the hour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ProcessTimestamp(NaiveDateTime);

impl ProcessTimestamp {
    /// Truncate `dt` to the start of its hour.
    pub fn from_naive(dt: NaiveDateTime) -> Self {
        let hour = NaiveTime::from_hms_opt(dt.hour(), 0, 0).unwrap_or(NaiveTime::MIN);
        Self(dt.date().and_time(hour))
    }

    /// The last completed hour before `now`.
    pub fn previous_hour(now: DateTime<Utc>) -> Self {
        Self::from_naive(now.naive_utc()) - Duration::hours(1)
    }

    /// Midnight of the last completed day before `now`.
    pub fn previous_day(now: DateTime<Utc>) -> Self {
        let midnight = now.date_naive().and_time(NaiveTime::MIN);
        Self(midnight - Duration::days(1))
    }

    pub fn as_naive(&self) -> NaiveDateTime {
        self.0
    }

    /// Midnight of the same day.
    pub fn day_start(&self) -> Self {
        Self(self.0.date().and_time(NaiveTime::MIN))
    }
}

impl std::ops::Sub<Duration> for ProcessTimestamp {
    type Output = ProcessTimestamp;

    fn sub(self, rhs: Duration) -> Self::Output {
        Self::from_naive(self.0 - rhs)
    }
}

impl From<NaiveDateTime> for ProcessTimestamp {
    fn from(dt: NaiveDateTime) -> Self {
        Self::from_naive(dt)
    }
}

impl fmt::Display for ProcessTimestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%d %H:00"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone};

    fn naive(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_micro_opt(h, min, s, 123_456)
            .unwrap()
    }

    #[test]
    fn test_truncates_to_hour() {
        let ts = ProcessTimestamp::from_naive(naive(2023, 1, 5, 3, 42, 17));
        let expected = NaiveDate::from_ymd_opt(2023, 1, 5)
            .unwrap()
            .and_hms_opt(3, 0, 0)
            .unwrap();
        assert_eq!(ts.as_naive(), expected);
        assert_eq!(ts.to_string(), "2023-01-05 03:00");
    }

    #[test]
    fn test_previous_hour_crosses_midnight() {
        let now = Utc.with_ymd_and_hms(2023, 1, 5, 0, 10, 0).unwrap();
        let ts = ProcessTimestamp::previous_hour(now);
        assert_eq!(ts.to_string(), "2023-01-04 23:00");
    }

    #[test]
    fn test_previous_day() {
        let now = Utc.with_ymd_and_hms(2023, 3, 1, 0, 30, 0).unwrap();
        let ts = ProcessTimestamp::previous_day(now);
        assert_eq!(ts.to_string(), "2023-02-28 00:00");
        assert_eq!(ts, ts.day_start());
    }

    #[test]
    fn test_granularity() {
        assert!(Granularity::Hourly.is_hourly());
        assert!(!Granularity::Daily.is_hourly());
        assert_eq!(Granularity::Daily.to_string(), "daily");
    }
}
