//! Bucket keys and station-local time
//!
//! Every truncation in the engine goes through one [`LocalClock`], so an
//! hourly bucket and the daily bucket that contains it always agree on where
//! local midnight falls.

use crate::error::{Error, Result};
use crate::types::{DateRange, TimeWindow};
use chrono::{
    DateTime, Duration, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Offset, Timelike, Utc,
};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Width of a bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Granularity {
    /// One reading, truncated to the second
    Point,
    /// One local hour
    Hour,
    /// One local calendar day
    Day,
}

/// Start of a bucket in station-local time
///
/// Ordered by start, then granularity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BucketKey {
    /// Local start of the bucket
    pub start: NaiveDateTime,
    /// Bucket width
    pub granularity: Granularity,
}

impl BucketKey {
    /// Create a key from an already truncated local start
    pub fn new(start: NaiveDateTime, granularity: Granularity) -> Self {
        Self { start, granularity }
    }

    /// Axis label for the bucket
    pub fn label(&self) -> String {
        let format = match self.granularity {
            Granularity::Day => "%Y-%m-%d",
            Granularity::Hour => "%Y-%m-%d %H:%M",
            Granularity::Point => "%Y-%m-%d %H:%M:%S",
        };
        self.start.format(format).to_string()
    }
}

impl fmt::Display for BucketKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

/// Fixed-offset station clock
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalClock {
    offset: FixedOffset,
}

impl LocalClock {
    /// Clock at a fixed offset
    pub fn new(offset: FixedOffset) -> Self {
        Self { offset }
    }

    /// Clock from an offset in minutes east of UTC
    pub fn from_minutes(minutes: i32) -> Result<Self> {
        minutes
            .checked_mul(60)
            .and_then(FixedOffset::east_opt)
            .map(Self::new)
            .ok_or_else(|| Error::Configuration(format!("invalid UTC offset: {} minutes", minutes)))
    }

    /// UTC clock
    pub fn utc() -> Self {
        Self::new(Utc.fix())
    }

    /// Offset of the clock
    pub fn offset(&self) -> FixedOffset {
        self.offset
    }

    /// Local wall time of an instant
    pub fn local(&self, ts: DateTime<Utc>) -> NaiveDateTime {
        ts.with_timezone(&self.offset).naive_local()
    }

    /// Local calendar day of an instant
    pub fn today(&self, now: DateTime<Utc>) -> NaiveDate {
        self.local(now).date()
    }

    /// UTC window covering one local day
    pub fn day_window(&self, day: NaiveDate) -> Result<TimeWindow> {
        DateRange::single_day(day).to_window(self.offset)
    }

    /// Bucket containing an instant
    pub fn bucket(&self, ts: DateTime<Utc>, granularity: Granularity) -> BucketKey {
        let local = self.local(ts);
        let start = match granularity {
            Granularity::Point => local.with_nanosecond(0).unwrap_or(local),
            Granularity::Hour => {
                local.date().and_time(NaiveTime::MIN) + Duration::hours(i64::from(local.hour()))
            },
            Granularity::Day => local.date().and_time(NaiveTime::MIN),
        };
        BucketKey::new(start, granularity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_day_bucket_uses_local_midnight() {
        let clock = LocalClock::from_minutes(-180).unwrap();
        // 01:30 UTC on the 2nd is 22:30 local on the 1st
        let ts = Utc.with_ymd_and_hms(2024, 3, 2, 1, 30, 0).unwrap();

        assert_eq!(clock.bucket(ts, Granularity::Day).label(), "2024-03-01");
        assert_eq!(clock.bucket(ts, Granularity::Hour).label(), "2024-03-01 22:00");
        assert_eq!(clock.bucket(ts, Granularity::Point).label(), "2024-03-01 22:30:00");
    }

    #[test]
    fn test_hour_and_day_agree() {
        let clock = LocalClock::from_minutes(-180).unwrap();
        let ts = Utc.with_ymd_and_hms(2024, 3, 2, 2, 59, 59).unwrap();
        let hour = clock.bucket(ts, Granularity::Hour);
        let day = clock.bucket(ts, Granularity::Day);
        assert_eq!(hour.start.date(), day.start.date());
    }

    #[test]
    fn test_invalid_offset() {
        assert!(LocalClock::from_minutes(24 * 60).is_err());
    }

    #[test]
    fn test_ordering_by_start_then_granularity() {
        let clock = LocalClock::utc();
        let ts = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        let point = clock.bucket(ts, Granularity::Point);
        let day = clock.bucket(ts, Granularity::Day);
        assert!(point < day);
    }
}
