//! Resolution of free-form time expressions into epoch-second ranges.
//!
//! Accepted forms, tried in order:
//! - `now`, `today`, `yesterday`
//! - relative: `1 hour ago`, `2 weeks ago`, `an hour and 30 minutes ago`
//! - RFC 3339 / ISO-8601 instants, RFC 2822
//! - calendar dates and date-times (`2023-12-31`, `31 Dec 2023`,
//!   `Dec 31, 2023`, `12/31/2023`, `2023-12-31 08:30`)
//! - bare unix timestamps in seconds (milliseconds if 13+ digits)
//!
//! Anything without an explicit offset is read as UTC.

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, TimeZone, Utc};

use crate::error::ParseError;

const OFFSET_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f%z",
    "%Y-%m-%dT%H:%M%#z",
    "%Y-%m-%d %H:%M:%S%.f %z",
    "%Y-%m-%d %H:%M:%S%.f%z",
];

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%Y%m%d",
    "%d %b %Y",
    "%d %B %Y",
    "%b %d, %Y",
    "%B %d, %Y",
    "%b %d %Y",
    "%m/%d/%Y",
];

/// A resolved `[from, to]` window in unix seconds.
///
/// `from <= to` is not enforced; a reversed range is passed to the remote
/// as-is, which answers with an empty result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
    pub from: i64,
    pub to: i64,
}

impl TimeRange {
    /// Resolve both expressions relative to the current time.
    pub fn resolve(from: &str, to: &str) -> Result<Self, ParseError> {
        Self::resolve_at(from, to, Utc::now())
    }

    /// Resolve both expressions relative to `now`.
    pub fn resolve_at(from: &str, to: &str, now: DateTime<Utc>) -> Result<Self, ParseError> {
        let start = parse_instant(from, now)?;
        let end = parse_instant(to, now)?;
        log::info!("Start time: {}", start.to_rfc3339());
        log::info!("End time: {}", end.to_rfc3339());
        if start > end {
            log::warn!("start time {from:?} is after end time {to:?}; the result will be empty");
        }
        Ok(Self {
            from: start.timestamp(),
            to: end.timestamp(),
        })
    }

    pub fn is_ordered(&self) -> bool {
        self.from <= self.to
    }
}

fn parse_error(input: &str, reason: impl Into<String>) -> ParseError {
    ParseError {
        input: input.to_string(),
        reason: reason.into(),
    }
}

/// Resolve one expression to an instant.
pub fn parse_instant(input: &str, now: DateTime<Utc>) -> Result<DateTime<Utc>, ParseError> {
    let s = input.trim();
    if s.is_empty() {
        return Err(parse_error(input, "empty time expression"));
    }
    let lower = s.to_ascii_lowercase();

    match lower.as_str() {
        "now" => return Ok(now),
        "today" => return Ok(start_of_day(now)),
        "yesterday" => return Ok(start_of_day(now) - Duration::days(1)),
        _ => {}
    }

    if let Some(body) = lower.strip_suffix("ago") {
        let ago = parse_relative(body).map_err(|reason| parse_error(input, reason))?;
        return now
            .checked_sub_signed(ago)
            .ok_or_else(|| parse_error(input, "relative time out of range"));
    }

    if s.bytes().all(|b| b.is_ascii_digit()) && s.len() != 8 {
        return parse_epoch(s).ok_or_else(|| parse_error(input, "timestamp out of range"));
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(s) {
        return Ok(dt.with_timezone(&Utc));
    }
    for fmt in OFFSET_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(s, fmt) {
            return Ok(dt.with_timezone(&Utc));
        }
    }

    // explicit UTC markers on otherwise naive layouts
    let naive = s
        .strip_suffix(" UTC")
        .or_else(|| s.strip_suffix('Z'))
        .unwrap_or(s)
        .trim_end();
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(naive, fmt) {
            return Ok(dt.and_utc());
        }
    }
    for fmt in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(naive, fmt) {
            if let Some(dt) = date.and_hms_opt(0, 0, 0) {
                return Ok(dt.and_utc());
            }
        }
    }

    Err(parse_error(input, "unrecognized date/time format"))
}

/// `"1 hour"`, `"an hour and 30 minutes"` → duration
fn parse_relative(body: &str) -> Result<Duration, String> {
    let words: Vec<&str> = body
        .split_whitespace()
        .filter(|w| *w != "and")
        .map(|w| if w == "a" || w == "an" { "1" } else { w })
        .collect();
    if words.is_empty() {
        return Err("missing duration before \"ago\"".to_string());
    }
    let std = humantime::parse_duration(&words.join(" "))
        .map_err(|e| format!("invalid relative duration: {e}"))?;
    Duration::from_std(std).map_err(|_| "relative duration too large".to_string())
}

fn parse_epoch(digits: &str) -> Option<DateTime<Utc>> {
    let n: i64 = digits.parse().ok()?;
    if digits.len() >= 13 {
        Utc.timestamp_millis_opt(n).single()
    } else {
        Utc.timestamp_opt(n, 0).single()
    }
}

fn start_of_day(t: DateTime<Utc>) -> DateTime<Utc> {
    t.date_naive()
        .and_hms_opt(0, 0, 0)
        .map(|dt| dt.and_utc())
        .unwrap_or(t)
}
