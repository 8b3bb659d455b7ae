//! Date ranges and their split into report-sized windows
//!
//! The Reporting API rejects AUDIT requests that span more than six months, so an
//! arbitrary range is cut into consecutive windows of at most `max_window_days`
//! days. Both ends of a range are inclusive: the range `2025-01-01..=2025-01-01`
//! is one day long, and the next window always starts the day after the previous
//! one ended.
use crate::error::{ExportError, Result};
use chrono::{Days, NaiveDate, Utc};
use serde::Serialize;
use std::fmt;
use std::ops::Deref;

/// Date format accepted on the command line and sent to the API
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Maximum window length allowed by the Veracode API (6 months)
pub const MAX_WINDOW_DAYS: u32 = 180;

/// An inclusive range of calendar days with `start <= end`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct DateRange {
    start: NaiveDate,
    end: NaiveDate,
}


impl DateRange {
    /// Create a range, rejecting `start > end`
    ///
    /// # Errors
    ///
    /// Returns `Configuration` if start is after end
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self> {
        if start > end {
            return Err(ExportError::Configuration(format!(
                "start date {start} must be on or before end date {end}"
            )));
        }
        Ok(Self { start, end })
    }

    /// First day of the range
    #[must_use]
    pub fn start(&self) -> NaiveDate {
        self.start
    }

    /// Last day of the range (inclusive)
    #[must_use]
    pub fn end(&self) -> NaiveDate {
        self.end
    }

    /// Number of days covered, counting both ends
    #[must_use]
    pub fn num_days(&self) -> u64 {
        u64::try_from((self.end - self.start).num_days())
            .unwrap_or(0)
            .saturating_add(1)
    }

    /// Whether the range covers more than a single day
    #[must_use]
    pub fn spans_multiple_days(&self) -> bool {
        self.end > self.start
    }

    /// `start` formatted for the API
    #[must_use]
    pub fn start_str(&self) -> String {
        self.start.format(DATE_FORMAT).to_string()
    }

    /// `end` formatted for the API
    #[must_use]
    pub fn end_str(&self) -> String {
        self.end.format(DATE_FORMAT).to_string()
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} to {}", self.start, self.end)
    }
}

/// A date range produced by [`split`], never longer than [`MAX_WINDOW_DAYS`]
///
/// There is no public constructor; every window comes out of [`split`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct Window(DateRange);

impl Deref for Window {
    type Target = DateRange;

    fn deref(&self) -> &DateRange {
        &self.0
    }
}

impl PartialEq<DateRange> for Window {
    fn eq(&self, other: &DateRange) -> bool {
        self.0 == *other
    }
}

impl fmt::Display for Window {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Split a range into consecutive windows of at most `max_window_days` days
///
/// The result is never empty, is in ascending order, has no gaps or overlaps, and
/// its union is exactly `range`.
///
/// # Errors
///
/// Returns `Configuration` if `max_window_days` is 0 or above [`MAX_WINDOW_DAYS`]
///
/// # Examples
///
/// ```
/// use chrono::NaiveDate;
/// use veraexport::window::{split, DateRange};
///
/// let day = |d| NaiveDate::parse_from_str(d, "%Y-%m-%d").unwrap();
/// let range = DateRange::new(day("2025-01-01"), day("2025-01-10")).unwrap();
///
/// let windows = split(range, 4).unwrap();
/// assert_eq!(windows.len(), 3);
/// assert_eq!(windows[1].start(), day("2025-01-05"));
/// assert_eq!(windows[2].end(), day("2025-01-10"));
/// ```
pub fn split(range: DateRange, max_window_days: u32) -> Result<Vec<Window>> {
    if !(1..=MAX_WINDOW_DAYS).contains(&max_window_days) {
        return Err(ExportError::Configuration(format!(
            "window length must be between 1 and {MAX_WINDOW_DAYS} days, got {max_window_days}"
        )));
    }

    let span = Days::new(u64::from(max_window_days).saturating_sub(1));
    let mut windows = Vec::new();
    let mut cursor = range.start;

    loop {
        let window_end = cursor
            .checked_add_days(span)
            .map_or(range.end, |end| end.min(range.end));
        windows.push(Window(DateRange {
            start: cursor,
            end: window_end,
        }));

        if window_end >= range.end {
            break;
        }
        match window_end.succ_opt() {
            Some(next) => cursor = next,
            None => break,
        }
    }

    log::debug!(
        "Split {} ({} days) into {} window(s) of at most {} days",
        range,
        range.num_days(),
        windows.len(),
        max_window_days
    );

    Ok(windows)
}

/// Parse a `YYYY-MM-DD` date
///
/// # Errors
///
/// Returns `Configuration` if the text is not a valid calendar date
pub fn parse_date(value: &str, field_name: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), DATE_FORMAT).map_err(|_| {
        ExportError::Configuration(format!(
            "Invalid {field_name}: '{value}'. Expected: YYYY-MM-DD"
        ))
    })
}

/// Today's date in UTC
#[must_use]
pub fn today_utc() -> NaiveDate {
    Utc::now().date_naive()
}
