//! Shared validation and formatting helpers for tool payloads

use std::sync::OnceLock;

use chrono::{Duration, NaiveDate};
use regex::Regex;
use serde_json::{json, Value};

use crate::errors::ApiError;

pub const DEFAULT_ANALYTICS_DAYS: u32 = 30;
pub const MAX_ANALYTICS_DAYS: u32 = 365;

fn duration_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^P(?:(\d+)D)?(?:T(?:(\d+)H)?(?:(\d+)M)?(?:(\d+)S)?)?$")
            .expect("duration pattern is valid")
    })
}

/// Seconds in an ISO 8601 video duration such as `PT1H2M3S`; anything
/// unparseable counts as zero.
pub fn parse_iso8601_duration(value: &str) -> u64 {
    let Some(captures) = duration_pattern().captures(value.trim()) else {
        return 0;
    };
    let part = |index: usize| {
        captures
            .get(index)
            .and_then(|m| m.as_str().parse::<u64>().ok())
            .unwrap_or(0)
    };
    part(1) * 86_400 + part(2) * 3_600 + part(3) * 60 + part(4)
}

/// Keeps the first `max_chars` characters, appending `...` when cut.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut truncated: String = text.chars().take(max_chars).collect();
    truncated.push_str("...");
    truncated
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// JSON number that prints whole values without a fractional part.
pub fn number(value: f64) -> Value {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < 9.0e15 {
        json!(value as i64)
    } else {
        json!(value)
    }
}

/// Reads a count from a statistics object; the Data API sends them as strings.
pub fn count(object: &Value, key: &str) -> u64 {
    match object.get(key) {
        Some(Value::String(raw)) => raw.parse().unwrap_or(0),
        Some(Value::Number(number)) => number.as_u64().unwrap_or(0),
        _ => 0,
    }
}

pub fn str_field<'a>(object: &'a Value, key: &str) -> &'a str {
    object.get(key).and_then(Value::as_str).unwrap_or_default()
}

/// Inclusive `[today - days, today]` reporting window.
pub fn analytics_window(days: Option<u32>, today: NaiveDate) -> Result<(NaiveDate, NaiveDate), ApiError> {
    let days = days.unwrap_or(DEFAULT_ANALYTICS_DAYS);
    if days == 0 || days > MAX_ANALYTICS_DAYS {
        return Err(ApiError::validation(format!(
            "days must be between 1 and {MAX_ANALYTICS_DAYS}"
        )));
    }
    Ok((today - Duration::days(i64::from(days)), today))
}
