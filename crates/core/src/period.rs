use chrono::{DateTime, NaiveDate};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq)]
#[error("Invalid date: '{0}'")]
pub struct DateError(pub String);

/// Parses an ISO-8601 calendar date or timestamp down to its date.
///
/// Accepts `2021-01-01`, `2021-01-01T12:00:00.000Z` and offset timestamps.
pub fn parse_iso_date(s: &str) -> Result<NaiveDate, DateError> {
    let s = s.trim();
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Ok(date);
    }
    if let Ok(ts) = DateTime::parse_from_rfc3339(s) {
        return Ok(ts.naive_utc().date());
    }
    // Timestamps without an offset still carry the date in their first ten bytes.
    s.get(..10)
        .and_then(|head| NaiveDate::parse_from_str(head, "%Y-%m-%d").ok())
        .ok_or_else(|| DateError(s.to_string()))
}

pub(crate) fn deserialize_iso_date<'de, D>(deserializer: D) -> Result<NaiveDate, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_iso_date(&raw).map_err(serde::de::Error::custom)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} to {}", self.start, self.end)
    }
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        DateRange { start, end }
    }

    /// Smallest range covering every date, `None` for an empty input.
    pub fn spanning<I>(dates: I) -> Option<Self>
    where
        I: IntoIterator<Item = NaiveDate>,
    {
        dates.into_iter().fold(None, |range, date| match range {
            None => Some(DateRange::new(date, date)),
            Some(r) => Some(DateRange::new(r.start.min(date), r.end.max(date))),
        })
    }

    /// Whole days between start and end.
    pub fn days(self) -> i64 {
        (self.end - self.start).num_days()
    }
}
