//! Time sources and calendar arithmetic.
//!
//! The engine never reads the system clock directly; it asks a [`Clock`].
//! All instants are UTC. Calendar questions ("which day is it?", "when is the
//! wake deadline?") go through a [`Calendar`] carrying the user's fixed UTC
//! offset and first day of the week.

use std::sync::Mutex;

use chrono::{
    DateTime, Datelike, Duration, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Offset, TimeZone,
    Utc, Weekday,
};

/// Source of the current instant.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Settable clock for tests and simulations.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn set(&self, instant: DateTime<Utc>) {
        let mut guard = self.now.lock().unwrap_or_else(|p| p.into_inner());
        *guard = instant;
    }

    pub fn advance(&self, by: Duration) {
        let mut guard = self.now.lock().unwrap_or_else(|p| p.into_inner());
        *guard += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|p| p.into_inner())
    }
}

/// Local calendar view over UTC instants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Calendar {
    offset: FixedOffset,
    week_start: Weekday,
}

impl Default for Calendar {
    fn default() -> Self {
        Self {
            offset: Utc.fix(),
            week_start: Weekday::Mon,
        }
    }
}

impl Calendar {
    pub fn new(offset: FixedOffset, week_start: Weekday) -> Self {
        Self { offset, week_start }
    }

    pub fn offset(&self) -> FixedOffset {
        self.offset
    }

    pub fn week_start(&self) -> Weekday {
        self.week_start
    }

    pub fn local(&self, instant: DateTime<Utc>) -> NaiveDateTime {
        instant.with_timezone(&self.offset).naive_local()
    }

    pub fn date_of(&self, instant: DateTime<Utc>) -> NaiveDate {
        self.local(instant).date()
    }

    /// UTC instant of a local wall-clock time on `date`.
    pub fn instant_at(&self, date: NaiveDate, time: NaiveTime) -> DateTime<Utc> {
        let local = date.and_time(time);
        let utc = local - Duration::seconds(i64::from(self.offset.local_minus_utc()));
        Utc.from_utc_datetime(&utc)
    }

    /// First day of the week containing `date`.
    pub fn start_of_week(&self, date: NaiveDate) -> NaiveDate {
        let days_back = (7 + date.weekday().num_days_from_monday()
            - self.week_start.num_days_from_monday())
            % 7;
        date - Duration::days(i64::from(days_back))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn manual_clock_advances() {
        let start = Utc.with_ymd_and_hms(2026, 10, 12, 6, 0, 0).unwrap();
        let clock = ManualClock::new(start);
        clock.advance(Duration::minutes(11));
        assert_eq!(clock.now(), start + Duration::minutes(11));
    }

    #[test]
    fn date_of_uses_offset() {
        let cal = Calendar::new(FixedOffset::east_opt(5 * 3600 + 1800).unwrap(), Weekday::Mon);
        let instant = Utc.with_ymd_and_hms(2026, 10, 11, 20, 0, 0).unwrap();
        assert_eq!(cal.date_of(instant), date(2026, 10, 12));
    }

    #[test]
    fn instant_at_inverts_offset() {
        let cal = Calendar::new(FixedOffset::west_opt(4 * 3600).unwrap(), Weekday::Mon);
        let at = cal.instant_at(date(2026, 10, 12), NaiveTime::from_hms_opt(6, 10, 0).unwrap());
        assert_eq!(at, Utc.with_ymd_and_hms(2026, 10, 12, 10, 10, 0).unwrap());
        assert_eq!(cal.date_of(at), date(2026, 10, 12));
    }

    #[test]
    fn start_of_week_honours_week_start() {
        // 2026-10-15 is a Thursday.
        let thursday = date(2026, 10, 15);
        assert_eq!(Calendar::default().start_of_week(thursday), date(2026, 10, 12));
        let sunday_first = Calendar::new(FixedOffset::east_opt(0).unwrap(), Weekday::Sun);
        assert_eq!(sunday_first.start_of_week(thursday), date(2026, 10, 11));
        assert_eq!(sunday_first.start_of_week(date(2026, 10, 11)), date(2026, 10, 11));
    }
}
