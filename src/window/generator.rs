//! Time window generator
//!
//! From `start`, each window ends at `min(start + step - granularity, end)`
//! and the next one begins at `start + step`. Generation stops once the
//! running start passes `end`, so an `end` before `start` yields nothing.

use super::duration::format_duration;
use super::types::TimeWindow;
use crate::error::{Error, Result};
use chrono::{DateTime, Duration, Utc};
use std::fmt;

/// Validated window generator settings
///
/// Iterating does not consume the generator; every call to [`TimeWindows::iter`]
/// starts again from `start`.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct TimeWindows {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    step: Duration,
    granularity: Duration,
}

impl TimeWindows {
    /// Create a new generator
    ///
    /// `step` must be positive and `granularity` must lie in `(0, step]`.
    pub fn new(
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        step: Duration,
        granularity: Duration,
    ) -> Result<Self> {
        Self::validate_step(step, granularity)?;
        Ok(Self {
            start,
            end,
            step,
            granularity,
        })
    }

    /// Check a step and granularity pair without building a generator
    pub fn validate_step(step: Duration, granularity: Duration) -> Result<()> {
        if step <= Duration::zero() {
            return Err(Error::invalid_value("step", "must be positive"));
        }
        if granularity <= Duration::zero() {
            return Err(Error::invalid_value("granularity", "must be positive"));
        }
        if granularity > step {
            return Err(Error::invalid_value(
                "granularity",
                format!(
                    "{} is larger than step {}",
                    format_duration(granularity),
                    format_duration(step)
                ),
            ));
        }
        Ok(())
    }

    /// Lower bound
    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    /// Upper bound
    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }

    /// Window length
    pub fn step(&self) -> Duration {
        self.step
    }

    /// Smallest distinguishable time unit
    pub fn granularity(&self) -> Duration {
        self.granularity
    }

    /// Whether the range yields no windows at all
    pub fn is_empty(&self) -> bool {
        self.end < self.start
    }

    /// Iterate over the windows from the beginning
    pub fn iter(&self) -> TimeWindowIter {
        TimeWindowIter {
            next_start: Some(self.start),
            end: self.end,
            step: self.step,
            granularity: self.granularity,
        }
    }
}

impl fmt::Debug for TimeWindows {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimeWindows")
            .field("start", &self.start)
            .field("end", &self.end)
            .field("step", &format_duration(self.step))
            .field("granularity", &format_duration(self.granularity))
            .finish()
    }
}

impl IntoIterator for &TimeWindows {
    type Item = TimeWindow;
    type IntoIter = TimeWindowIter;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Lazy iterator over time windows
#[derive(Debug, Clone)]
pub struct TimeWindowIter {
    next_start: Option<DateTime<Utc>>,
    end: DateTime<Utc>,
    step: Duration,
    granularity: Duration,
}

impl Iterator for TimeWindowIter {
    type Item = TimeWindow;

    fn next(&mut self) -> Option<Self::Item> {
        let start = self.next_start.filter(|s| *s <= self.end)?;

        // Overflow past the representable range ends the sequence
        let window_end = start
            .checked_add_signed(self.step - self.granularity)
            .map_or(self.end, |e| e.min(self.end));
        self.next_start = start.checked_add_signed(self.step);

        Some(TimeWindow::new(start, window_end))
    }
}

/// Generate windows tiling `[start, end]`
///
/// Shorthand for [`TimeWindows::new`] followed by [`TimeWindows::iter`].
pub fn generate(
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    step: Duration,
    granularity: Duration,
) -> Result<TimeWindowIter> {
    Ok(TimeWindows::new(start, end, step, granularity)?.iter())
}
