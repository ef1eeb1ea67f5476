//! Reporting windows and calendar-month keys.

use std::{fmt, str::FromStr};

use chrono::{Datelike, Duration, Months, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::common::Timestamp;

/// Whether the end of a [`DateWindow`] belongs to the window.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum WindowBounds {
    /// `start <= t <= end`
    Closed,
    /// `start <= t < end`
    HalfOpen,
}

/// Time interval over which transactions are aggregated.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct DateWindow {
    pub start: Timestamp,
    pub end: Timestamp,
    pub bounds: WindowBounds,
}

impl DateWindow {
    pub fn closed(start: Timestamp, end: Timestamp) -> Result<Self, DateWindowError> {
        if end < start {
            return Err(DateWindowError::InvalidRange);
        }
        Ok(Self {
            start,
            end,
            bounds: WindowBounds::Closed,
        })
    }

    pub fn half_open(start: Timestamp, end: Timestamp) -> Result<Self, DateWindowError> {
        if end <= start {
            return Err(DateWindowError::InvalidRange);
        }
        Ok(Self {
            start,
            end,
            bounds: WindowBounds::HalfOpen,
        })
    }

    /// The `days`-long window ending (exclusively) at `now`.
    pub fn trailing_days(now: Timestamp, days: u32) -> Result<Self, DateWindowError> {
        Self::half_open(now - Duration::days(i64::from(days)), now)
    }

    pub fn contains(&self, instant: Timestamp) -> bool {
        if instant < self.start {
            return false;
        }
        match self.bounds {
            WindowBounds::Closed => instant <= self.end,
            WindowBounds::HalfOpen => instant < self.end,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Errors that can occur when constructing [`DateWindow`] values.
pub enum DateWindowError {
    InvalidRange,
}

impl fmt::Display for DateWindowError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DateWindowError::InvalidRange => f.write_str("date window end must not precede start"),
        }
    }
}

impl std::error::Error for DateWindowError {}

/// A calendar month, rendered as `YYYY-MM`. Used as the monthly summary document id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MonthKey {
    first_day: NaiveDate,
}

impl MonthKey {
    pub fn new(year: i32, month: u32) -> Result<Self, MonthKeyError> {
        NaiveDate::from_ymd_opt(year, month, 1)
            .map(|first_day| Self { first_day })
            .ok_or(MonthKeyError::OutOfRange { year, month })
    }

    /// The UTC calendar month containing `instant`.
    pub fn containing(instant: Timestamp) -> Self {
        let date = instant.date_naive();
        Self {
            first_day: date - Duration::days(i64::from(date.day0())),
        }
    }

    /// The month immediately preceding the one containing `instant`.
    pub fn preceding(instant: Timestamp) -> Result<Self, MonthKeyError> {
        Self::containing(instant).previous()
    }

    pub fn year(&self) -> i32 {
        self.first_day.year()
    }

    pub fn month(&self) -> u32 {
        self.first_day.month()
    }

    pub fn previous(&self) -> Result<Self, MonthKeyError> {
        self.first_day
            .checked_sub_months(Months::new(1))
            .map(|first_day| Self { first_day })
            .ok_or(MonthKeyError::OutOfRange {
                year: self.year(),
                month: self.month(),
            })
    }

    pub fn next(&self) -> Result<Self, MonthKeyError> {
        self.first_day
            .checked_add_months(Months::new(1))
            .map(|first_day| Self { first_day })
            .ok_or(MonthKeyError::OutOfRange {
                year: self.year(),
                month: self.month(),
            })
    }

    /// Closed window from the first millisecond of the month to its last
    /// millisecond (`23:59:59.999` on the final day).
    pub fn window(&self) -> Result<DateWindow, MonthKeyError> {
        let start = Utc.from_utc_datetime(&self.first_day.and_time(chrono::NaiveTime::MIN));
        let next = self.next()?;
        let next_start = Utc.from_utc_datetime(&next.first_day.and_time(chrono::NaiveTime::MIN));
        let end = next_start - Duration::milliseconds(1);
        DateWindow::closed(start, end).map_err(|_| MonthKeyError::OutOfRange {
            year: self.year(),
            month: self.month(),
        })
    }
}

impl fmt::Display for MonthKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year(), self.month())
    }
}

impl FromStr for MonthKey {
    type Err = MonthKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || MonthKeyError::Malformed(s.to_string());
        let (year, month) = s.trim().split_once('-').ok_or_else(invalid)?;
        if month.len() != 2 {
            return Err(invalid());
        }
        let year = year.parse::<i32>().map_err(|_| invalid())?;
        let month = month.parse::<u32>().map_err(|_| invalid())?;
        Self::new(year, month)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MonthKeyError {
    OutOfRange { year: i32, month: u32 },
    Malformed(String),
}

impl fmt::Display for MonthKeyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MonthKeyError::OutOfRange { year, month } => {
                write!(f, "month {year}-{month} is out of range")
            }
            MonthKeyError::Malformed(raw) => write!(f, "`{raw}` is not a YYYY-MM month key"),
        }
    }
}

impl std::error::Error for MonthKeyError {}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> Timestamp {
        Utc.with_ymd_and_hms(y, m, d, h, min, s).unwrap()
    }

    #[test]
    fn preceding_month_wraps_year() {
        let key = MonthKey::preceding(ts(2025, 1, 1, 0, 0, 0)).unwrap();
        assert_eq!(key.to_string(), "2024-12");
        assert_eq!((key.year(), key.month()), (2024, 12));
    }

    #[test]
    fn month_window_is_closed_at_last_millisecond() {
        let window = MonthKey::new(2024, 2).unwrap().window().unwrap();
        assert_eq!(window.start, ts(2024, 2, 1, 0, 0, 0));
        assert_eq!(
            window.end,
            ts(2024, 2, 29, 23, 59, 59) + Duration::milliseconds(999)
        );
        assert!(window.contains(window.end));
        assert!(!window.contains(window.end + Duration::milliseconds(1)));
        assert!(!window.contains(window.start - Duration::milliseconds(1)));
    }

    #[test]
    fn trailing_window_excludes_now() {
        let now = ts(2024, 6, 10, 8, 0, 0);
        let window = DateWindow::trailing_days(now, 7).unwrap();
        assert!(window.contains(ts(2024, 6, 3, 8, 0, 0)));
        assert!(!window.contains(now));
        assert!(DateWindow::half_open(now, now).is_err());
        assert!(DateWindow::closed(now, now).is_ok());
    }

    #[test]
    fn month_keys_parse_strictly() {
        assert_eq!("2023-07".parse::<MonthKey>().unwrap(), MonthKey::new(2023, 7).unwrap());
        assert!("2023-7".parse::<MonthKey>().is_err());
        assert!("2023-13".parse::<MonthKey>().is_err());
        assert!("july".parse::<MonthKey>().is_err());
    }
}
