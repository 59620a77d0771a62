//! Temporal boundary resolution and display-date formatting.
//!
//! The boundary is the start of a calendar day in a fixed reference zone,
//! expressed as epoch milliseconds. Resolution never fails: a missing or
//! malformed date string degrades to "start of today".

use chrono::{DateTime, Duration, LocalResult, NaiveDate, TimeZone, Utc};
use chrono_tz::Tz;

/// Display format for dates in exported rows.
pub const DISPLAY_DATE_FORMAT: &str = "%Y-%m-%d";

/// Date format used for the mail-source `after:` hint.
pub const QUERY_DATE_FORMAT: &str = "%Y/%m/%d";

/// A resolved lower bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Boundary {
    /// Start of `date` in the reference zone, as epoch milliseconds.
    pub epoch_ms: i64,
    /// The calendar day the boundary starts.
    pub date: NaiveDate,
    /// True when the input was absent or unparseable and today was used.
    pub fell_back: bool,
}

/// Resolve a `YYYY/MM/DD` or `YYYY-MM-DD` string to a start-of-day boundary.
///
/// Pure function of its inputs: `now` supplies "today" for the fallback.
pub fn resolve_boundary(input: Option<&str>, now: DateTime<Utc>, tz: Tz) -> Boundary {
    let parsed = input.and_then(parse_date);

    if let Some(date) = parsed
        && let Some(start) = start_of_day(date, tz)
    {
        return Boundary {
            epoch_ms: start.timestamp_millis(),
            date,
            fell_back: false,
        };
    }

    let today = now.with_timezone(&tz).date_naive();
    let epoch_ms = start_of_day(today, tz)
        .map(|start| start.timestamp_millis())
        .unwrap_or_else(|| now.timestamp_millis());

    Boundary {
        epoch_ms,
        date: today,
        fell_back: true,
    }
}

/// Shorthand for [`resolve_boundary`] returning only the epoch milliseconds.
pub fn resolve_boundary_ms(input: Option<&str>, now: DateTime<Utc>, tz: Tz) -> i64 {
    resolve_boundary(input, now, tz).epoch_ms
}

/// Format an epoch-millisecond timestamp as a calendar date in `tz`.
pub fn format_display_date(epoch_ms: i64, tz: Tz) -> String {
    DateTime::from_timestamp_millis(epoch_ms)
        .map(|dt| dt.with_timezone(&tz).format(DISPLAY_DATE_FORMAT).to_string())
        .unwrap_or_default()
}

/// Format a boundary date for a mail-source search hint.
pub fn format_query_date(date: NaiveDate) -> String {
    date.format(QUERY_DATE_FORMAT).to_string()
}

fn parse_date(raw: &str) -> Option<NaiveDate> {
    let normalized = raw.trim().replace('-', "/");
    if normalized.is_empty() {
        return None;
    }
    NaiveDate::parse_from_str(&normalized, QUERY_DATE_FORMAT).ok()
}

/// First instant of `date` in `tz`.
///
/// Midnight can be skipped by a DST transition in some zones; the next
/// valid local time within the day is used instead.
fn start_of_day(date: NaiveDate, tz: Tz) -> Option<DateTime<Tz>> {
    let midnight = date.and_hms_opt(0, 0, 0)?;
    (0..24).find_map(|hour| match tz.from_local_datetime(&(midnight + Duration::hours(hour))) {
        LocalResult::Single(dt) => Some(dt),
        LocalResult::Ambiguous(earliest, _) => Some(earliest),
        LocalResult::None => None,
    })
}
