//! Time utilities: parsing timestamps and durations, formatting milliseconds.

use crate::errors::{AppError, AppResult};
use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, TimeZone, Utc};

pub const MS_PER_SECOND: i64 = 1_000;
pub const MS_PER_MINUTE: i64 = 60 * MS_PER_SECOND;
pub const MS_PER_HOUR: i64 = 60 * MS_PER_MINUTE;
pub const MS_PER_DAY: i64 = 24 * MS_PER_HOUR;

/// Parse a timestamp into epoch milliseconds.
///
/// Accepted forms:
/// - plain integer (already epoch ms)
/// - RFC 3339 (`2025-10-02T08:30:00+02:00`)
/// - local `YYYY-MM-DD HH:MM` or `YYYY-MM-DDTHH:MM`
pub fn parse_timestamp(s: &str) -> AppResult<i64> {
    let s = s.trim();

    if let Ok(ms) = s.parse::<i64>() {
        return Ok(ms);
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.timestamp_millis());
    }

    for fmt in ["%Y-%m-%d %H:%M", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Local
                .from_local_datetime(&naive)
                .earliest()
                .map(|dt| dt.timestamp_millis())
                .ok_or_else(|| AppError::InvalidTimestamp(s.to_string()));
        }
    }

    Err(AppError::InvalidTimestamp(s.to_string()))
}

pub fn parse_optional_timestamp(input: Option<&String>) -> AppResult<Option<i64>> {
    input.map(|s| parse_timestamp(s)).transpose()
}

/// Parse a calendar date, `YYYY-MM-DD`.
pub fn parse_date(s: &str) -> AppResult<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
        .map_err(|_| AppError::InvalidTimestamp(format!("{s} (expected YYYY-MM-DD)")))
}

/// Parse a duration like `8h`, `45m`, `1h30m`, `90s` or plain milliseconds.
pub fn parse_duration_ms(s: &str) -> AppResult<i64> {
    let s = s.trim().to_lowercase();
    if s.is_empty() {
        return Err(AppError::InvalidDuration(s));
    }

    if let Ok(ms) = s.parse::<i64>() {
        return if ms >= 0 {
            Ok(ms)
        } else {
            Err(AppError::InvalidDuration(s))
        };
    }

    let mut total = 0i64;
    let mut digits = String::new();

    for c in s.chars() {
        if c.is_ascii_digit() {
            digits.push(c);
            continue;
        }

        let unit = match c {
            'h' => MS_PER_HOUR,
            'm' => MS_PER_MINUTE,
            's' => MS_PER_SECOND,
            _ => return Err(AppError::InvalidDuration(s)),
        };

        let n: i64 = digits
            .parse()
            .map_err(|_| AppError::InvalidDuration(s.clone()))?;
        total += n * unit;
        digits.clear();
    }

    // trailing digits without a unit
    if !digits.is_empty() {
        return Err(AppError::InvalidDuration(s));
    }

    Ok(total)
}

pub fn parse_optional_duration(input: Option<&String>) -> AppResult<Option<i64>> {
    input.map(|s| parse_duration_ms(s)).transpose()
}

/// Format milliseconds as `HHh MMm` (negative values keep their sign).
pub fn format_duration_ms(ms: i64) -> String {
    let sign = if ms < 0 { "-" } else { "" };
    let total_minutes = ms.abs() / MS_PER_MINUTE;
    format!("{}{:02}h {:02}m", sign, total_minutes / 60, total_minutes % 60)
}

/// Format epoch milliseconds in local time, `YYYY-MM-DD HH:MM`.
pub fn format_timestamp(ms: i64) -> String {
    match Utc.timestamp_millis_opt(ms).single() {
        Some(dt) => dt.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string(),
        None => ms.to_string(),
    }
}

pub fn format_optional_timestamp(ms: Option<i64>) -> String {
    ms.map(format_timestamp).unwrap_or_else(|| "--".to_string())
}
