//! Inclusive calendar-date windows.

use crate::error::{CloudError, Result};
use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Inclusive `[start, end]` date range used to search for an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DateWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateWindow {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self> {
        if start > end {
            return Err(CloudError::InvalidWindow { start, end });
        }
        Ok(Self { start, end })
    }

    /// Window covering a single day.
    pub fn single(date: NaiveDate) -> Self {
        Self {
            start: date,
            end: date,
        }
    }

    /// Window ending on `end` and starting `days` earlier.
    pub fn ending_at(end: NaiveDate, days: i64) -> Self {
        Self {
            start: end - Duration::days(days.max(0)),
            end,
        }
    }

    /// Widen the window by `days` on both sides.
    pub fn padded(&self, days: i64) -> Self {
        let days = Duration::days(days.max(0));
        Self {
            start: self.start - days,
            end: self.end + days,
        }
    }
}

impl fmt::Display for DateWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.start, self.end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_rejects_inverted() {
        assert!(DateWindow::new(date(2024, 5, 2), date(2024, 5, 1)).is_err());
        assert!(DateWindow::new(date(2024, 5, 1), date(2024, 5, 1)).is_ok());
    }

    #[test]
    fn test_ending_at_and_padding() {
        let w = DateWindow::ending_at(date(2024, 3, 1), 7);
        assert_eq!(w.start, date(2024, 2, 23));
        assert_eq!(w.end, date(2024, 3, 1));

        let p = DateWindow::single(date(2024, 1, 10)).padded(15);
        assert_eq!(p.start, date(2023, 12, 26));
        assert_eq!(p.end, date(2024, 1, 25));
    }

    #[test]
    fn test_display_as_interval() {
        let w = DateWindow::new(date(2024, 6, 1), date(2024, 6, 30)).unwrap();
        assert_eq!(w.to_string(), "2024-06-01/2024-06-30");
    }
}
