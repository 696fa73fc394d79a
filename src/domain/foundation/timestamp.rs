//! Timestamp value object for immutable points in time.

use chrono::{DateTime, Datelike, Duration, Timelike, Utc};
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

    /// Returns the duration from another timestamp to this one.
    ///
    /// Returns negative duration if other is after self.
    pub fn duration_since(&self, other: &Timestamp) -> Duration {
        self.0.signed_duration_since(other.0)
    }

    /// Creates a new timestamp by adding the specified number of days.
    ///
    /// Negative values subtract days.
    pub fn add_days(&self, days: i64) -> Self {
        Self(self.0 + Duration::days(days))
    }

    /// Creates a new timestamp by adding the specified number of hours.
    pub fn add_hours(&self, hours: i64) -> Self {
        Self(self.0 + Duration::hours(hours))
    }

    /// Creates a new timestamp by adding the specified number of seconds.
    pub fn plus_secs(&self, secs: u64) -> Self {
        Self(self.0 + Duration::seconds(secs as i64))
    }

    /// Creates a new timestamp by adding an arbitrary duration.
    pub fn plus(&self, duration: Duration) -> Self {
        Self(self.0 + duration)
    }

    /// Lower-case English weekday name (`monday` .. `sunday`).
    pub fn weekday_name(&self) -> &'static str {
        match self.0.weekday() {
            chrono::Weekday::Mon => "monday",
            chrono::Weekday::Tue => "tuesday",
            chrono::Weekday::Wed => "wednesday",
            chrono::Weekday::Thu => "thursday",
            chrono::Weekday::Fri => "friday",
            chrono::Weekday::Sat => "saturday",
            chrono::Weekday::Sun => "sunday",
        }
    }

    /// Hour of day in UTC (0-23).
    pub fn hour_of_day(&self) -> u32 {
        self.0.hour()
    }

    /// Whole days elapsed since `earlier` (zero if `earlier` is in the future).
    pub fn days_since(&self, earlier: &Timestamp) -> i64 {
        self.duration_since(earlier).num_days().max(0)
    }
}

impl Default for Timestamp {
    fn default() -> Self {
        Self::now()
    }
}

impl From<DateTime<Utc>> for Timestamp {
    fn from(dt: DateTime<Utc>) -> Self {
        Self(dt)
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.to_rfc3339())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn fixed() -> Timestamp {
        // 2024-03-04 was a Monday
        Timestamp::from_datetime(Utc.with_ymd_and_hms(2024, 3, 4, 15, 30, 0).unwrap())
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
    fn add_days_and_hours_move_forward() {
        let ts = fixed();
        assert_eq!(ts.add_days(14).duration_since(&ts), Duration::days(14));
        assert_eq!(ts.add_hours(36).duration_since(&ts), Duration::hours(36));
    }

    #[test]
    fn ordering_helpers_agree() {
        let earlier = fixed();
        let later = earlier.plus_secs(1);
        assert!(earlier.is_before(&later));
        assert!(later.is_after(&earlier));
        assert!(earlier < later);
    }

    #[test]
    fn weekday_and_hour_are_utc() {
        let ts = fixed();
        assert_eq!(ts.weekday_name(), "monday");
        assert_eq!(ts.hour_of_day(), 15);
    }

    #[test]
    fn days_since_never_negative() {
        let ts = fixed();
        assert_eq!(ts.add_days(3).days_since(&ts), 3);
        assert_eq!(ts.days_since(&ts.add_days(3)), 0);
    }

    #[test]
    fn serializes_as_rfc3339_string() {
        let json = serde_json::to_string(&fixed()).unwrap();
        assert_eq!(json, r#""2024-03-04T15:30:00Z""#);
    }
}
