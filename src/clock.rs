//! Wall-clock access pinned to the assistant's civil timezone.
//!
//! Every component that stamps messages or partitions "daily" records goes
//! through [`Clock`] so tests can freeze time. All date arithmetic uses
//! Taipei local time, never UTC; a reminder sent at 23:50 Taipei belongs to
//! that Taipei day even though UTC has already rolled over.

use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;

#[cfg(test)]
use chrono::TimeZone;

/// The fixed civil timezone for all user-facing times and daily partitions.
pub const LOCAL_TZ: Tz = chrono_tz::Asia::Taipei;

/// Source of current local wall-clock time.
pub trait Clock: Send + Sync {
    /// Current time in [`LOCAL_TZ`].
    fn now(&self) -> DateTime<Tz>;

    /// Today's calendar date in [`LOCAL_TZ`].
    fn today(&self) -> NaiveDate {
        self.now().date_naive()
    }
}

/// Production clock reading the system time.
#[derive(Debug, Clone, Copy, Default)]
pub struct TaipeiClock;

impl Clock for TaipeiClock {
    fn now(&self) -> DateTime<Tz> {
        Utc::now().with_timezone(&LOCAL_TZ)
    }
}

/// Format a timestamp the way user-facing messages expect it.
pub fn format_timestamp(ts: DateTime<Tz>) -> String {
    ts.format("%Y-%m-%d %H:%M:%S").to_string()
}

/// Today's date in the portal's filter format: `YYYY/M/D`, no zero-padding.
pub fn portal_date(date: NaiveDate) -> String {
    use chrono::Datelike;
    format!("{}/{}/{}", date.year(), date.month(), date.day())
}

/// Frozen clock for tests. Advances only when told to.
#[cfg(test)]
pub struct FixedClock(std::sync::Mutex<DateTime<Tz>>);

#[cfg(test)]
impl FixedClock {
    /// Freeze the clock at a local (Taipei) date and time.
    pub fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> Self {
        let dt = LOCAL_TZ
            .with_ymd_and_hms(y, mo, d, h, mi, s)
            .single()
            .expect("unambiguous local time");
        Self(std::sync::Mutex::new(dt))
    }

    pub fn advance(&self, d: chrono::Duration) {
        let mut guard = self.0.lock().expect("fixed clock lock");
        *guard = *guard + d;
    }

    pub fn set(&self, y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) {
        let dt = LOCAL_TZ
            .with_ymd_and_hms(y, mo, d, h, mi, s)
            .single()
            .expect("unambiguous local time");
        *self.0.lock().expect("fixed clock lock") = dt;
    }
}

#[cfg(test)]
impl Clock for FixedClock {
    fn now(&self) -> DateTime<Tz> {
        *self.0.lock().expect("fixed clock lock")
    }
}
