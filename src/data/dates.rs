//! Date parsing for column type inference
//!
//! A text column is re-typed as a date column only when every present value
//! parses with the format detected from its first present value.

use chrono::{DateTime, NaiveDate, NaiveDateTime};

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%Y/%m/%d %H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
    "%d.%m.%Y %H:%M:%S",
    "%d.%m.%Y %H:%M",
];

const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%m/%d/%Y",
    "%d.%m.%Y",
    "%d-%b-%Y",
    "%d %b %Y",
    "%b %d, %Y",
    "%B %d, %Y",
    "%b %d %Y",
];

/// Year and month only, pinned to the first of the month
const MONTH_FORMATS: &[&str] = &["%Y-%m", "%Y/%m"];

/// A recognised textual date layout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateFormat {
    /// RFC 3339 timestamp with offset, normalised to UTC
    Rfc3339,
    /// Date and time of day
    DateTime(&'static str),
    /// Calendar date, midnight assumed
    Date(&'static str),
    /// Year and month, day 1 at midnight assumed
    Month(&'static str),
}

impl DateFormat {
    /// Parse a single value with this format
    pub fn parse(&self, value: &str) -> Option<NaiveDateTime> {
        let value = value.trim();
        match self {
            DateFormat::Rfc3339 => DateTime::parse_from_rfc3339(value)
                .ok()
                .map(|dt| dt.naive_utc()),
            DateFormat::DateTime(fmt) => NaiveDateTime::parse_from_str(value, fmt).ok(),
            DateFormat::Date(fmt) => NaiveDate::parse_from_str(value, fmt)
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0)),
            // chrono needs a day to build a date
            DateFormat::Month(fmt) => NaiveDate::parse_from_str(&format!("{}-01", value), &format!("{}-%d", fmt))
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0)),
        }
    }
}

/// Detect the format of a single value
pub fn detect_format(value: &str) -> Option<DateFormat> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    if DateFormat::Rfc3339.parse(value).is_some() {
        return Some(DateFormat::Rfc3339);
    }

    DATETIME_FORMATS
        .iter()
        .copied()
        .map(DateFormat::DateTime)
        .chain(DATE_FORMATS.iter().copied().map(DateFormat::Date))
        .chain(MONTH_FORMATS.iter().copied().map(DateFormat::Month))
        .find(|format| format.parse(value).is_some())
}

/// Parse a single value with whichever supported format matches
pub fn parse_datetime(value: &str) -> Option<NaiveDateTime> {
    detect_format(value).and_then(|format| format.parse(value))
}

/// Parse a whole text column as dates.
///
/// Returns `None` when any present value fails to parse with the format of the
/// first present value, or when the column has no present values at all.
pub fn parse_date_column(values: &[Option<String>]) -> Option<Vec<Option<NaiveDateTime>>> {
    let first = values.iter().flatten().next()?;
    let format = detect_format(first)?;

    values
        .iter()
        .map(|value| match value {
            None => Some(None),
            Some(s) => format.parse(s).map(Some),
        })
        .collect()
}
