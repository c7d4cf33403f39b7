//! Relative and absolute time parsing for configuration values.

use chrono::{NaiveDate, NaiveDateTime, TimeDelta};
use once_cell::sync::Lazy;
use regex::Regex;

static AMOUNT_UNIT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?P<amount>[-+]?(?:\d+\.?\d*|\.\d+))\s*(?P<unit>[A-Za-z]+)").expect("valid regex")
});

const SECONDS_PER_MINUTE: f64 = 60.0;
const SECONDS_PER_HOUR: f64 = 60.0 * SECONDS_PER_MINUTE;
const SECONDS_PER_DAY: f64 = 24.0 * SECONDS_PER_HOUR;
const SECONDS_PER_WEEK: f64 = 7.0 * SECONDS_PER_DAY;
const SECONDS_PER_MONTH: f64 = 30.0 * SECONDS_PER_DAY;

/// Layouts accepted for absolute timestamps.
const DATETIME_FORMATS: &[&str] =
    &["%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M"];

/// Number of seconds in one unit, by unit token.
///
/// Only the leading letters matter. `m` alone could be minutes or months
/// so those two need a second letter.
fn unit_seconds(unit: &str) -> Option<f64> {
    let unit = unit.to_ascii_lowercase();
    if unit.starts_with("mi") {
        Some(SECONDS_PER_MINUTE)
    } else if unit.starts_with("mo") {
        Some(SECONDS_PER_MONTH)
    } else if unit.starts_with('w') {
        Some(SECONDS_PER_WEEK)
    } else if unit.starts_with('d') {
        Some(SECONDS_PER_DAY)
    } else if unit.starts_with('h') {
        Some(SECONDS_PER_HOUR)
    } else if unit.starts_with('s') {
        Some(1.0)
    } else {
        None
    }
}

/// Parse `<amount> <unit>` pairs (e.g. `2 wks 3.5 days 10 min`) into a duration.
///
/// Pairs may come in any order; unrecognized tokens are ignored. Returns
/// `None` when no pair could be recognized at all.
pub fn parse_relative_time(source: &str) -> Option<TimeDelta> {
    let mut total_seconds = 0.0;
    let mut matched = false;

    for capture in AMOUNT_UNIT.captures_iter(source) {
        let Some(seconds) = unit_seconds(&capture["unit"]) else {
            tracing::debug!(unit = &capture["unit"], "Ignoring unknown time unit");
            continue;
        };
        let Ok(amount) = capture["amount"].parse::<f64>() else {
            continue;
        };
        total_seconds += amount * seconds;
        matched = true;
    }

    if !matched {
        return None;
    }
    let micros = (total_seconds * 1_000_000.0).round() as i64;
    Some(TimeDelta::microseconds(micros))
}

/// Parse an absolute `YYYY-MM-DD HH:MM:SS` style timestamp.
///
/// A bare date means midnight.
pub fn parse_datetime(source: &str) -> Option<NaiveDateTime> {
    let source = source.trim();
    DATETIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(source, format).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(source, "%Y-%m-%d")
                .ok()
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })
}
