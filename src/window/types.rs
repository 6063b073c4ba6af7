//! Window and slice types

use crate::types::CursorFormat;
use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use std::fmt;

/// A closed time window `[start, end]`
///
/// Both bounds are inclusive at the configured granularity: the next window
/// starts exactly one granularity step after this one ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimeWindow {
    /// First instant covered by the window
    pub start: DateTime<Utc>,
    /// Last instant covered by the window
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    /// Create a new window
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    /// Check whether an instant falls inside the window
    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        self.start <= instant && instant <= self.end
    }
}

impl fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}, {}]",
            CursorFormat::Iso8601.format(self.start),
            CursorFormat::Iso8601.format(self.end)
        )
    }
}

/// One bounded unit of extraction work
///
/// A slice without a window covers the whole partition (full refresh or
/// bounded-history listings).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Slice {
    /// Partition the slice belongs to
    pub partition: Option<String>,
    /// Time window, if the cursor slices by time
    pub window: Option<TimeWindow>,
}

impl Slice {
    /// Create a slice covering a time window
    pub fn windowed(partition: Option<String>, window: TimeWindow) -> Self {
        Self {
            partition,
            window: Some(window),
        }
    }

    /// Create a slice covering the whole partition
    pub fn whole(partition: Option<String>) -> Self {
        Self {
            partition,
            window: None,
        }
    }

    /// Window start, if any
    pub fn start(&self) -> Option<DateTime<Utc>> {
        self.window.map(|w| w.start)
    }

    /// Window end, if any
    pub fn end(&self) -> Option<DateTime<Utc>> {
        self.window.map(|w| w.end)
    }

    /// Render the slice boundaries as request parameters
    pub fn to_value(&self, format: &CursorFormat) -> Value {
        match &self.window {
            Some(w) => json!({
                "partition": self.partition,
                "start_time": format.to_value(w.start),
                "end_time": format.to_value(w.end),
            }),
            None => json!({ "partition": self.partition }),
        }
    }
}

impl fmt::Display for Slice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.partition, &self.window) {
            (Some(p), Some(w)) => write!(f, "{p}:{w}"),
            (None, Some(w)) => write!(f, "{w}"),
            (Some(p), None) => write!(f, "{p}:[*]"),
            (None, None) => write!(f, "[*]"),
        }
    }
}
