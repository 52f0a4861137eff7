//! Timestamp value object for immutable points in time.

use chrono::{DateTime, Duration, Months, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Immutable point in time, always UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Creates a timestamp for the current moment.
    pub fn now() -> Self {
        Self(Utc::now())
    }

    /// Creates a timestamp from a DateTime<Utc>.
    pub fn from_datetime(dt: DateTime<Utc>) -> Self {
        Self(dt)
    }

    /// Returns the inner DateTime.
    pub fn as_datetime(&self) -> &DateTime<Utc> {
        &self.0
    }

    /// Checks if this timestamp is before another.
    pub fn is_before(&self, other: &Timestamp) -> bool {
        self.0 < other.0
    }

    /// Checks if this timestamp is after another.
    pub fn is_after(&self, other: &Timestamp) -> bool {
        self.0 > other.0
    }

    /// Creates a new timestamp by adding the specified number of days.
    pub fn add_days(&self, days: i64) -> Self {
        Self(self.0 + Duration::days(days))
    }

    /// Adds calendar months. The day is clamped to the last day of the
    /// target month (Jan 31 + 1 month = Feb 28/29).
    pub fn add_months(&self, months: u32) -> Self {
        match self.0.checked_add_months(Months::new(months)) {
            Some(dt) => Self(dt),
            None => Self(self.0 + Duration::days(i64::from(months) * 30)),
        }
    }

    /// Creates a timestamp from Unix seconds, if representable.
    pub fn from_unix_secs(secs: i64) -> Option<Self> {
        Utc.timestamp_opt(secs, 0).single().map(Self)
    }

    /// Returns the timestamp as Unix seconds.
    pub fn as_unix_secs(&self) -> i64 {
        self.0.timestamp()
    }

    /// Returns the later of the two timestamps.
    pub fn later_of(self, other: Timestamp) -> Self {
        if other.0 > self.0 {
            other
        } else {
            self
        }
    }
}

impl Default for Timestamp {
    fn default() -> Self {
        Self::now()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Datelike;

    fn at(y: i32, m: u32, d: u32) -> Timestamp {
        Timestamp::from_datetime(Utc.with_ymd_and_hms(y, m, d, 12, 0, 0).unwrap())
    }

    #[test]
    fn timestamp_now_creates_current_time() {
        let before = Utc::now();
        let ts = Timestamp::now();
        let after = Utc::now();

        assert!(ts.as_datetime() >= &before);
        assert!(ts.as_datetime() <= &after);
    }

    #[test]
    fn add_months_uses_calendar_months() {
        let ts = at(2024, 3, 15).add_months(1);
        assert_eq!(ts.as_datetime().month(), 4);
        assert_eq!(ts.as_datetime().day(), 15);
    }

    #[test]
    fn add_months_clamps_to_month_end() {
        let ts = at(2024, 1, 31).add_months(1);
        assert_eq!(ts.as_datetime().month(), 2);
        assert_eq!(ts.as_datetime().day(), 29);
    }

    #[test]
    fn add_twelve_months_rolls_year() {
        let ts = at(2024, 6, 1).add_months(12);
        assert_eq!(ts.as_datetime().year(), 2025);
        assert_eq!(ts.as_datetime().month(), 6);
    }

    #[test]
    fn later_of_picks_later_timestamp() {
        let early = at(2024, 1, 1);
        let late = at(2024, 2, 1);
        assert_eq!(early.later_of(late), late);
        assert_eq!(late.later_of(early), late);
    }

    #[test]
    fn unix_secs_round_trip() {
        let ts = Timestamp::from_unix_secs(1_704_067_200).unwrap();
        assert_eq!(ts.as_unix_secs(), 1_704_067_200);
    }

    #[test]
    fn comparisons_work() {
        let a = at(2024, 1, 1);
        let b = a.add_days(1);
        assert!(a.is_before(&b));
        assert!(b.is_after(&a));
    }

    #[test]
    fn serializes_as_rfc3339_string() {
        let json = serde_json::to_string(&at(2024, 1, 2)).unwrap();
        assert!(json.starts_with("\"2024-01-02T12:00:00"));
    }
}
