// ⏰ Weekly Period Calculator
// Maps any instant to the weekly reset it belongs to.
//
// The game resets weekly content on Tuesday at 15:00 UTC. A period is
// named after the calendar date of its opening reset, as YYYYMMDD.
// Everything here is UTC; the local time zone never enters the math.

use chrono::{DateTime, Datelike, Duration, NaiveTime, Timelike, Utc, Weekday};
use serde::{Deserialize, Serialize};
use std::fmt;

pub const RESET_WEEKDAY: Weekday = Weekday::Tue;
pub const RESET_HOUR: u32 = 15;

// ============================================================================
// PERIOD ID
// ============================================================================

/// Canonical identifier of a weekly reset period, e.g. `"20241224"`.
///
/// Two ids are equal iff their strings are equal. There is no date
/// normalization, so `"2024-12-24"` and `"20241224"` are different ids.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PeriodId(String);

impl PeriodId {
    /// Period containing `at`.
    pub fn for_timestamp(at: DateTime<Utc>) -> Self {
        PeriodId(last_reset(at).format("%Y%m%d").to_string())
    }

    /// Period containing a unix timestamp in seconds.
    ///
    /// `None` unless the reset date lands in years 0..=9999, the range
    /// `%Y` renders as exactly four digits.
    pub fn for_unix(secs: i64) -> Option<Self> {
        let at = DateTime::<Utc>::from_timestamp(secs, 0)?;
        if !(0..=10_000).contains(&at.year()) {
            return None;
        }

        let reset = last_reset(at);
        if !(0..=9999).contains(&reset.year()) {
            return None;
        }
        Some(Self::for_timestamp(at))
    }

    /// Period containing the current instant.
    pub fn current() -> Self {
        Self::for_timestamp(Utc::now())
    }

    /// Rehydrate an id previously written to settings.
    pub(crate) fn from_stored(value: impl Into<String>) -> Self {
        PeriodId(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// String comparison against a tag read from elsewhere (addon data,
    /// persisted settings).
    pub fn matches(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl fmt::Display for PeriodId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for PeriodId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// ============================================================================
// RESET BOUNDARIES
// ============================================================================

fn reset_time() -> NaiveTime {
    NaiveTime::from_hms_opt(RESET_HOUR, 0, 0).unwrap_or_default()
}

/// Most recent reset boundary at or before `at`.
///
/// On the reset weekday before the reset hour the current calendar date
/// has not reset yet, so the boundary is a full week back.
pub fn last_reset(at: DateTime<Utc>) -> DateTime<Utc> {
    let weekday = at.weekday().num_days_from_sunday();
    let reset_day = RESET_WEEKDAY.num_days_from_sunday();

    let mut days_back = i64::from((weekday + 7 - reset_day) % 7);
    if days_back == 0 && at.hour() < RESET_HOUR {
        days_back = 7;
    }

    let reset_date = at.date_naive() - Duration::days(days_back);
    reset_date.and_time(reset_time()).and_utc()
}

/// First reset boundary strictly after `at`.
pub fn next_reset_after(at: DateTime<Utc>) -> DateTime<Utc> {
    last_reset(at) + Duration::days(7)
}

/// Time remaining until the next reset.
pub fn time_until_reset(at: DateTime<Utc>) -> Duration {
    next_reset_after(at) - at
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn utc(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, s).unwrap()
    }

    #[test]
    fn test_tuesday_before_reset_belongs_to_previous_week() {
        // 2024-12-24 10:00 UTC
        let id = PeriodId::for_unix(1_735_034_400).unwrap();
        assert_eq!(id.as_str(), "20241217");
    }

    #[test]
    fn test_tuesday_after_reset_is_same_day() {
        // 2024-12-24 16:00 UTC
        let id = PeriodId::for_unix(1_735_056_000).unwrap();
        assert_eq!(id.as_str(), "20241224");
    }

    #[test]
    fn test_monday_belongs_to_previous_tuesday() {
        // 2024-12-23 10:00 UTC
        let id = PeriodId::for_unix(1_734_948_000).unwrap();
        assert_eq!(id.as_str(), "20241217");
    }

    #[test]
    fn test_exact_boundary() {
        assert_eq!(
            PeriodId::for_timestamp(utc(2024, 12, 24, 15, 0, 0)).as_str(),
            "20241224"
        );
        assert_eq!(
            PeriodId::for_timestamp(utc(2024, 12, 24, 14, 59, 59)).as_str(),
            "20241217"
        );
    }

    #[test]
    fn test_year_and_month_rollover() {
        // Wednesday 2025-01-01 belongs to Tuesday 2024-12-31
        assert_eq!(
            PeriodId::for_timestamp(utc(2025, 1, 1, 0, 0, 0)).as_str(),
            "20241231"
        );
        // Sunday 2025-03-02 belongs to Tuesday 2025-02-25
        assert_eq!(
            PeriodId::for_timestamp(utc(2025, 3, 2, 23, 59, 59)).as_str(),
            "20250225"
        );
    }

    #[test]
    fn test_constant_across_whole_period() {
        let start = utc(2025, 6, 3, 15, 0, 0);
        let expected = PeriodId::for_timestamp(start);
        assert_eq!(expected.as_str(), "20250603");

        let mut at = start;
        let end = start + Duration::days(7);
        while at < end {
            assert_eq!(PeriodId::for_timestamp(at), expected, "at {}", at);
            at += Duration::minutes(37);
        }

        assert_eq!(
            PeriodId::for_timestamp(end - Duration::seconds(1)),
            expected
        );
        assert_eq!(PeriodId::for_timestamp(end).as_str(), "20250610");
    }

    #[test]
    fn test_always_eight_digits() {
        for secs in [0_i64, 86_400 * 3, 1_000_000_000, 1_735_034_400, 4_102_444_800] {
            let id = PeriodId::for_unix(secs).unwrap();
            assert_eq!(id.as_str().len(), 8, "{}", id);
            assert!(id.as_str().chars().all(|c| c.is_ascii_digit()), "{}", id);
        }

        // Years past 9999 and before 0 have no four-digit rendering
        assert_eq!(PeriodId::for_unix(1_000_000_000_000), None);
        assert_eq!(PeriodId::for_unix(-100_000_000_000), None);
        assert_eq!(PeriodId::for_unix(i64::MAX), None);
        assert_eq!(PeriodId::for_unix(i64::MIN), None);

        // Last instant of 9999 still belongs to a 9999 reset
        let late = PeriodId::for_unix(253_402_300_799).unwrap();
        assert!(late.as_str().starts_with("9999"), "{}", late);
        // 0000-01-01 is a Saturday whose reset is back in year -1
        assert_eq!(PeriodId::for_unix(-62_167_219_200), None);
    }

    #[test]
    fn test_equality_is_plain_string_equality() {
        let id = PeriodId::for_unix(1_735_056_000).unwrap();
        assert!(id.matches("20241224"));
        assert!(!id.matches("2024-12-24"));
        assert!(!id.matches("20241217"));
        assert_ne!(id, PeriodId::from_stored("2024-12-24"));
        assert_eq!(id, PeriodId::from_stored("20241224"));
    }

    #[test]
    fn test_next_reset_and_countdown() {
        let at = utc(2024, 12, 26, 15, 0, 0);
        assert_eq!(next_reset_after(at), utc(2024, 12, 31, 15, 0, 0));
        assert_eq!(time_until_reset(at), Duration::days(5));

        let before = utc(2024, 12, 24, 14, 0, 0);
        assert_eq!(next_reset_after(before), utc(2024, 12, 24, 15, 0, 0));
        assert_eq!(time_until_reset(before), Duration::hours(1));
    }
}
