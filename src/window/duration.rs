//! Duration parsing
//!
//! Accepts two notations:
//! - compact: one or more `<number><unit>` pairs, units `w d h m s ms us ns`
//!   (e.g. `3d`, `1h30m`, `250ms`)
//! - ISO-8601: `P[nW][nD][T[nH][nM][nS]]` (e.g. `P1W`, `PT1H`, `PT0.5S`)
//!
//! Calendar months and years have no fixed length and are rejected.

use crate::error::{Error, Result};
use chrono::Duration;
use regex::Regex;
use std::sync::LazyLock;

static COMPACT_PART: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+)(ms|us|ns|w|d|h|m|s)").unwrap());

static ISO_8601: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^P(?:(\d+)W)?(?:(\d+)D)?(?:T(?:(\d+)H)?(?:(\d+)M)?(?:(\d+)(?:\.(\d{1,9}))?S)?)?$",
    )
    .unwrap()
});

/// Parse a duration string like "1d", "2h30m", "250ms" or "P1D"
pub fn parse_duration(s: &str) -> Result<Duration> {
    let s = s.trim();
    if s.is_empty() {
        return Err(Error::invalid_duration(s, "empty duration"));
    }

    let duration = if s.starts_with('P') {
        parse_iso_8601(s)?
    } else {
        parse_compact(s)?
    };

    if duration <= Duration::zero() {
        return Err(Error::invalid_duration(s, "duration must be positive"));
    }
    Ok(duration)
}

fn parse_compact(s: &str) -> Result<Duration> {
    let mut total = Duration::zero();
    let mut consumed = 0;

    for cap in COMPACT_PART.captures_iter(s) {
        let whole = cap.get(0).unwrap();
        if whole.start() != consumed {
            return Err(Error::invalid_duration(
                s,
                format!("unexpected input at offset {consumed}"),
            ));
        }
        consumed = whole.end();

        let num: i64 = cap[1]
            .parse()
            .map_err(|_| Error::invalid_duration(s, format!("number out of range: {}", &cap[1])))?;

        let part = match &cap[2] {
            "w" => Duration::try_weeks(num),
            "d" => Duration::try_days(num),
            "h" => Duration::try_hours(num),
            "m" => Duration::try_minutes(num),
            "s" => Duration::try_seconds(num),
            "ms" => Duration::try_milliseconds(num),
            "us" => Some(Duration::microseconds(num)),
            "ns" => Some(Duration::nanoseconds(num)),
            unit => return Err(Error::invalid_duration(s, format!("unknown unit '{unit}'"))),
        };

        total = part
            .and_then(|p| total.checked_add(&p))
            .ok_or_else(|| Error::invalid_duration(s, "duration overflow"))?;
    }

    if consumed != s.len() {
        let hint = if s.chars().all(|c| c.is_ascii_digit()) {
            "missing unit (expected one of w, d, h, m, s, ms, us, ns)".to_string()
        } else {
            format!("unexpected input at offset {consumed}")
        };
        return Err(Error::invalid_duration(s, hint));
    }

    Ok(total)
}

fn parse_iso_8601(s: &str) -> Result<Duration> {
    let cap = ISO_8601.captures(s).ok_or_else(|| {
        Error::invalid_duration(
            s,
            "expected ISO-8601 duration in weeks, days, hours, minutes or seconds",
        )
    })?;

    if (1..=6).all(|i| cap.get(i).is_none()) {
        return Err(Error::invalid_duration(s, "duration has no components"));
    }

    let field = |i: usize| -> Result<i64> {
        cap.get(i).map_or(Ok(0), |m| {
            m.as_str()
                .parse()
                .map_err(|_| Error::invalid_duration(s, format!("number out of range: {}", m.as_str())))
        })
    };

    let nanos = match cap.get(6) {
        Some(frac) => {
            let digits = frac.as_str();
            let padded = format!("{digits:0<9}");
            padded
                .parse::<i64>()
                .map_err(|_| Error::invalid_duration(s, "invalid fractional seconds"))?
        }
        None => 0,
    };

    [
        Duration::try_weeks(field(1)?),
        Duration::try_days(field(2)?),
        Duration::try_hours(field(3)?),
        Duration::try_minutes(field(4)?),
        Duration::try_seconds(field(5)?),
        Some(Duration::nanoseconds(nanos)),
    ]
    .into_iter()
    .try_fold(Duration::zero(), |acc, part| acc.checked_add(&part?))
    .ok_or_else(|| Error::invalid_duration(s, "duration overflow"))
}

/// Render a duration in compact notation, largest units first
pub fn format_duration(duration: Duration) -> String {
    if duration.is_zero() {
        return "0s".to_string();
    }

    const UNITS_MS: [(&str, i64); 6] = [
        ("w", 7 * 24 * 3_600_000),
        ("d", 24 * 3_600_000),
        ("h", 3_600_000),
        ("m", 60_000),
        ("s", 1_000),
        ("ms", 1),
    ];

    let mut out = String::new();
    let total_ms = duration.num_milliseconds();
    let mut rest_ms = total_ms;

    for (suffix, unit_ms) in UNITS_MS {
        let count = rest_ms / unit_ms;
        if count > 0 {
            out.push_str(&format!("{count}{suffix}"));
            rest_ms -= count * unit_ms;
        }
    }

    let sub_ms = (duration - Duration::milliseconds(total_ms))
        .num_nanoseconds()
        .unwrap_or(0);
    if sub_ms > 0 {
        out.push_str(&format!("{sub_ms}ns"));
    }
    out
}
