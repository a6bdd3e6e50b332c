//! Best-effort normalization of free-form `pubDate` text.
//!
//! Feeds in the wild ignore RFC 822 more often than not, so [`parse_pub_date`]
//! walks a list of formats from strict to loose and takes the first match.
//! Anything without an explicit zone is taken as UTC.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, TimeZone, Utc};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DateParseError {
    #[error("Empty date")]
    Empty,
    #[error("Unrecognized date format: {0:?}")]
    Unrecognized(String),
}

/// Formats carrying a numeric offset (`%z`), tried after RFC 2822/3339.
const OFFSET_FORMATS: &[&str] = &[
    "%a, %d %b %Y %H:%M %z",
    "%d %b %Y %H:%M:%S %z",
    "%Y-%m-%d %H:%M:%S %z",
    "%Y-%m-%d %H:%M:%S%z",
    "%Y-%m-%dT%H:%M:%S%z",
    "%Y-%m-%dT%H:%M:%S%.f%z",
    "%a %b %d %H:%M:%S %z %Y",
];

/// Formats without zone information, interpreted as UTC.
const NAIVE_DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%a, %d %b %Y %H:%M:%S",
    "%a, %d %b %Y %H:%M",
    "%d %b %Y %H:%M:%S",
    "%d %b %Y %H:%M",
    "%a %b %e %H:%M:%S %Y",
    "%B %d, %Y %H:%M:%S",
    "%B %d, %Y %I:%M %p",
    "%b %d, %Y %H:%M:%S",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
    "%Y/%m/%d %H:%M:%S",
];

const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%a, %d %b %Y",
    "%d %b %Y",
    "%d %B %Y",
    "%B %d, %Y",
    "%b %d, %Y",
    "%m/%d/%Y",
    "%Y/%m/%d",
];

/// Zone abbreviations that RFC 2822 parsing in chrono does not cover
/// everywhere they appear in feeds.
const NAMED_ZONES: &[(&str, i32)] = &[
    ("UTC", 0),
    ("GMT", 0),
    ("UT", 0),
    ("Z", 0),
    ("EST", -5),
    ("EDT", -4),
    ("CST", -6),
    ("CDT", -5),
    ("MST", -7),
    ("MDT", -6),
    ("PST", -8),
    ("PDT", -7),
    ("CET", 1),
    ("CEST", 2),
    ("JST", 9),
];

/// Parse a publication date string into UTC.
///
/// Tries RFC 2822, RFC 3339, common offset and naive layouts, bare dates
/// (midnight UTC), and finally unix epoch seconds or milliseconds. A leading
/// weekday that disagrees with the date is tolerated by retrying without it.
pub fn parse_pub_date(input: &str) -> Result<DateTime<Utc>, DateParseError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(DateParseError::Empty);
    }

    if let Some(dt) = parse_strict(trimmed) {
        return Ok(dt);
    }

    // "Tue, 02 Jan 2006 ..." where Jan 2 was a Monday: chrono rejects the
    // inconsistent weekday, the rest of the string is usually fine.
    if let Some((head, rest)) = trimmed.split_once(',') {
        if !head.is_empty() && head.chars().all(|c| c.is_ascii_alphabetic()) {
            if let Some(dt) = parse_strict(rest.trim()) {
                return Ok(dt);
            }
        }
    }

    if let Some(dt) = parse_epoch(trimmed) {
        return Ok(dt);
    }

    Err(DateParseError::Unrecognized(trimmed.to_string()))
}

fn parse_strict(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc2822(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }

    if let Some(dt) = OFFSET_FORMATS
        .iter()
        .find_map(|fmt| DateTime::parse_from_str(s, fmt).ok())
    {
        return Some(dt.with_timezone(&Utc));
    }

    if let Some(dt) = parse_named_zone(s) {
        return Some(dt);
    }

    parse_naive(s).map(|naive| Utc.from_utc_datetime(&naive))
}

/// Handle a trailing zone abbreviation by converting it to a fixed offset.
fn parse_named_zone(s: &str) -> Option<DateTime<Utc>> {
    let (rest, zone) = s.rsplit_once(' ')?;
    let hours = NAMED_ZONES
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(zone))
        .map(|(_, hours)| *hours)?;

    let offset = FixedOffset::east_opt(hours * 3600)?;
    let naive = parse_naive(rest.trim())?;
    offset
        .from_local_datetime(&naive)
        .single()
        .map(|dt| dt.with_timezone(&Utc))
}

fn parse_naive(s: &str) -> Option<NaiveDateTime> {
    NAIVE_DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })
}

fn parse_epoch(s: &str) -> Option<DateTime<Utc>> {
    if !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let value: i64 = s.parse().ok()?;
    match s.len() {
        9 | 10 => DateTime::from_timestamp(value, 0),
        13 => DateTime::from_timestamp_millis(value),
        _ => None,
    }
}
