//! Common types used throughout Slicewise CDK
//!
//! This module contains shared type definitions, type aliases,
//! and utility types used across multiple modules.

use crate::error::{Error, Result};
use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::Write;
use std::str::FromStr;

// ============================================================================
// Type Aliases
// ============================================================================

/// JSON value type (re-exported from serde_json)
pub type JsonValue = serde_json::Value;

/// A single extracted record
pub type Record = JsonValue;

// ============================================================================
// Log Level
// ============================================================================

/// Log level for connector messages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl From<LogLevel> for tracing::Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => tracing::Level::TRACE,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Error => tracing::Level::ERROR,
        }
    }
}

// ============================================================================
// Cursor Format
// ============================================================================

/// Format for cursor values in records, slices and checkpoints
///
/// All values are interpreted in UTC.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CursorFormat {
    /// RFC 3339 datetime string
    #[default]
    Iso8601,
    /// Unix timestamp (seconds)
    Unix,
    /// Unix timestamp (milliseconds)
    UnixMs,
    /// Calendar date, `%Y-%m-%d`
    Date,
    /// Custom `strftime` pattern
    Strftime(String),
}

impl CursorFormat {
    /// Render a datetime as a string in this format
    pub fn format(&self, dt: DateTime<Utc>) -> String {
        match self {
            Self::Iso8601 => dt.to_rfc3339_opts(SecondsFormat::AutoSi, true),
            Self::Unix => dt.timestamp().to_string(),
            Self::UnixMs => dt.timestamp_millis().to_string(),
            Self::Date => dt.format("%Y-%m-%d").to_string(),
            Self::Strftime(pattern) => {
                let mut out = String::new();
                match write!(out, "{}", dt.format(pattern)) {
                    Ok(()) => out,
                    // unchecked pattern
                    Err(_) => dt.to_rfc3339_opts(SecondsFormat::AutoSi, true),
                }
            }
        }
    }

    /// Reject `strftime` patterns chrono cannot render
    pub fn validate(&self) -> Result<()> {
        match self {
            Self::Strftime(pattern) => validate_pattern(pattern),
            _ => Ok(()),
        }
    }

    /// Render a datetime as a JSON value (numbers for unix formats)
    pub fn to_value(&self, dt: DateTime<Utc>) -> JsonValue {
        match self {
            Self::Unix => JsonValue::from(dt.timestamp()),
            Self::UnixMs => JsonValue::from(dt.timestamp_millis()),
            _ => JsonValue::String(self.format(dt)),
        }
    }

    /// Parse a string in this format
    pub fn parse(&self, s: &str) -> Option<DateTime<Utc>> {
        let s = s.trim();
        match self {
            Self::Unix => s.parse::<i64>().ok().and_then(|n| Utc.timestamp_opt(n, 0).single()),
            Self::UnixMs => s
                .parse::<i64>()
                .ok()
                .and_then(|n| Utc.timestamp_millis_opt(n).single()),
            Self::Strftime(pattern) => parse_with_pattern(s, pattern).or_else(|| parse_datetime(s)),
            Self::Iso8601 | Self::Date => parse_datetime(s),
        }
    }

    /// Parse a JSON value in this format
    pub fn parse_value(&self, value: &JsonValue) -> Option<DateTime<Utc>> {
        match value {
            JsonValue::String(s) => self.parse(s),
            JsonValue::Number(n) => {
                let n = n.as_i64()?;
                match self {
                    Self::UnixMs => Utc.timestamp_millis_opt(n).single(),
                    _ => Utc.timestamp_opt(n, 0).single(),
                }
            }
            _ => None,
        }
    }
}

impl FromStr for CursorFormat {
    type Err = Error;

    /// Parse a format name (`iso8601`, `unix`, `unix_ms`, `date`) or a
    /// `strftime` pattern containing `%`
    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "" | "iso8601" | "rfc3339" => Ok(Self::Iso8601),
            "unix" | "timestamp" => Ok(Self::Unix),
            "unix_ms" | "timestamp_ms" => Ok(Self::UnixMs),
            "date" => Ok(Self::Date),
            pattern if pattern.contains('%') => {
                validate_pattern(pattern)?;
                Ok(Self::Strftime(pattern.to_string()))
            }
            other => Err(Error::invalid_value(
                "datetime_format",
                format!("unknown format '{other}'"),
            )),
        }
    }
}

fn validate_pattern(pattern: &str) -> Result<()> {
    if StrftimeItems::new(pattern).any(|item| matches!(item, Item::Error)) {
        return Err(Error::invalid_value(
            "datetime_format",
            format!("invalid strftime pattern '{pattern}'"),
        ));
    }
    Ok(())
}

fn parse_with_pattern(s: &str, pattern: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_str(s, pattern) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(ndt) = NaiveDateTime::parse_from_str(s, pattern) {
        return Some(Utc.from_utc_datetime(&ndt));
    }
    NaiveDate::parse_from_str(s, pattern)
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|ndt| Utc.from_utc_datetime(&ndt))
}

/// Parse a datetime string into UTC, trying RFC 3339 and common layouts
pub fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();

    // Try RFC 3339 first
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }

    // Try common formats
    let formats = [
        "%Y-%m-%dT%H:%M:%S%.fZ",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%d",
        "%Y/%m/%d",
    ];

    formats.iter().find_map(|fmt| parse_with_pattern(s, fmt))
}

/// Extract a value from a JSON record by dotted path (e.g., "data.updated_at")
pub fn extract_path<'a>(record: &'a JsonValue, path: &str) -> Option<&'a JsonValue> {
    path.split('.').try_fold(record, |current, part| current.get(part))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ts(s: &str) -> DateTime<Utc> {
        parse_datetime(s).unwrap()
    }

    #[test]
    fn test_iso8601_round_trip() {
        let fmt = CursorFormat::Iso8601;
        let dt = ts("2024-01-05T10:11:12Z");
        assert_eq!(fmt.format(dt), "2024-01-05T10:11:12Z");
        assert_eq!(fmt.parse("2024-01-05T10:11:12Z"), Some(dt));
    }

    #[test]
    fn test_parse_datetime_layouts() {
        assert_eq!(ts("2024-01-05"), ts("2024-01-05T00:00:00Z"));
        assert_eq!(ts("2024/01/05"), ts("2024-01-05T00:00:00Z"));
        assert_eq!(ts("2024-01-05 01:02:03"), ts("2024-01-05T01:02:03Z"));
        assert_eq!(
            ts("2023-08-01T10:11:12.000000Z"),
            ts("2023-08-01T10:11:12Z")
        );
        assert!(parse_datetime("yesterday").is_none());
    }

    #[test]
    fn test_offsets_normalised_to_utc() {
        assert_eq!(ts("2024-01-05T02:00:00+02:00"), ts("2024-01-05T00:00:00Z"));
    }

    #[test]
    fn test_unix_formats() {
        let dt = ts("2024-01-01T00:00:00Z");
        assert_eq!(CursorFormat::Unix.to_value(dt), json!(1_704_067_200));
        assert_eq!(CursorFormat::UnixMs.to_value(dt), json!(1_704_067_200_000_i64));
        assert_eq!(CursorFormat::Unix.parse_value(&json!(1_704_067_200)), Some(dt));
        assert_eq!(CursorFormat::UnixMs.parse("1704067200000"), Some(dt));
    }

    #[test]
    fn test_strftime_format() {
        let fmt = CursorFormat::Strftime("%d/%m/%Y".to_string());
        let dt = ts("2024-03-02");
        assert_eq!(fmt.format(dt), "02/03/2024");
        assert_eq!(fmt.parse("02/03/2024"), Some(dt));
    }

    #[test]
    fn test_invalid_strftime_pattern() {
        assert!("%Y-%Q".parse::<CursorFormat>().is_err());

        let fmt = CursorFormat::Strftime("%Y-%Q".to_string());
        assert!(fmt.validate().is_err());
        // Falls back to RFC 3339 rather than failing mid-checkpoint
        assert_eq!(fmt.format(ts("2024-03-02")), "2024-03-02T00:00:00Z");
    }

    #[test]
    fn test_cursor_format_serde() {
        let fmt: CursorFormat = serde_json::from_str("\"unix_ms\"").unwrap();
        assert_eq!(fmt, CursorFormat::UnixMs);
        let fmt: CursorFormat = serde_json::from_str(r#"{"strftime": "%Y%m%d"}"#).unwrap();
        assert_eq!(fmt, CursorFormat::Strftime("%Y%m%d".to_string()));
    }

    #[test]
    fn test_cursor_format_from_str() {
        assert_eq!("unix".parse::<CursorFormat>().unwrap(), CursorFormat::Unix);
        assert_eq!("".parse::<CursorFormat>().unwrap(), CursorFormat::Iso8601);
        assert_eq!(
            "%Y-%m-%d %H".parse::<CursorFormat>().unwrap(),
            CursorFormat::Strftime("%Y-%m-%d %H".to_string())
        );
        assert!("weekly".parse::<CursorFormat>().is_err());
    }

    #[test]
    fn test_extract_path() {
        let record = json!({"data": {"updated_at": "2024-01-01"}, "id": 7});
        assert_eq!(extract_path(&record, "id"), Some(&json!(7)));
        assert_eq!(
            extract_path(&record, "data.updated_at"),
            Some(&json!("2024-01-01"))
        );
        assert!(extract_path(&record, "data.missing").is_none());
    }
}
