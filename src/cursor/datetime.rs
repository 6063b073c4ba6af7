//! Time-windowed watermark cursor
//!
//! Merges the checkpointed watermark with the configured bounds and hands
//! the resulting range to the window generator.

use super::types::{record_position, Cursor, CursorKind};
use crate::error::{Error, Result};
use crate::state::PartitionCheckpoint;
use crate::template::{EvalContext, Evaluator};
use crate::types::{CursorFormat, Record};
use crate::window::{Slice, TimeWindows};
use chrono::{DateTime, Duration, Utc};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

/// Settings shared by all partitions of a datetime-cursored stream
#[derive(Debug, Clone)]
pub struct DatetimeCursorSettings {
    /// Lower bound expression (e.g. `{{ config.start_date }}`)
    pub start: String,
    /// Upper bound expression; `now` when absent
    pub end: Option<String>,
    /// Window length
    pub step: Duration,
    /// Smallest distinguishable unit of the cursor field
    pub granularity: Duration,
    /// Re-read this much before the watermark
    pub lookback: Duration,
    /// Record field holding the cursor value
    pub cursor_field: String,
    /// Format of bounds, record values and the persisted position
    pub format: CursorFormat,
}

impl DatetimeCursorSettings {
    /// Create settings with zero lookback and iso8601 format
    pub fn new(
        start: impl Into<String>,
        step: Duration,
        granularity: Duration,
        cursor_field: impl Into<String>,
    ) -> Self {
        Self {
            start: start.into(),
            end: None,
            step,
            granularity,
            lookback: Duration::zero(),
            cursor_field: cursor_field.into(),
            format: CursorFormat::Iso8601,
        }
    }

    /// Set the upper bound expression
    #[must_use]
    pub fn with_end(mut self, end: impl Into<String>) -> Self {
        self.end = Some(end.into());
        self
    }

    /// Set the lookback window
    #[must_use]
    pub fn with_lookback(mut self, lookback: Duration) -> Self {
        self.lookback = lookback;
        self
    }

    /// Set the datetime format
    #[must_use]
    pub fn with_format(mut self, format: CursorFormat) -> Self {
        self.format = format;
        self
    }

    /// Check the settings before any extraction starts
    ///
    /// Bounds that do not depend on the partition or the clock are resolved
    /// here, so a static start after a static end fails at construction.
    pub fn validate(&self, evaluator: &dyn Evaluator, ctx: &EvalContext) -> Result<()> {
        TimeWindows::validate_step(self.step, self.granularity)?;
        self.format.validate()?;
        if self.lookback < Duration::zero() {
            return Err(Error::invalid_value("lookback_window", "must not be negative"));
        }
        if self.cursor_field.is_empty() {
            return Err(Error::missing_field("cursor_field"));
        }

        let is_static = |expr: &str| !expr.contains("{{");
        let start = if is_static(&self.start) {
            Some(resolve_bound(&self.start, "start_datetime", &self.format, evaluator, ctx)?)
        } else {
            None
        };
        let end = match &self.end {
            Some(end) if is_static(end) => {
                Some(resolve_bound(end, "end_datetime", &self.format, evaluator, ctx)?)
            }
            _ => None,
        };

        if let (Some(start), Some(end)) = (start, end) {
            if start > end {
                return Err(Error::config(format!(
                    "start_datetime {} is after end_datetime {}",
                    self.format.format(start),
                    self.format.format(end)
                )));
            }
        }
        Ok(())
    }
}

/// Resolve a bound expression to a datetime
fn resolve_bound(
    expr: &str,
    field: &str,
    format: &CursorFormat,
    evaluator: &dyn Evaluator,
    ctx: &EvalContext,
) -> Result<DateTime<Utc>> {
    let value = evaluator.resolve(expr, ctx)?;
    format.parse_value(&value).ok_or_else(|| {
        Error::invalid_value(field, format!("'{value}' is not a datetime in {format:?} format"))
    })
}

/// Time-windowed cursor for one partition
pub struct DatetimeCursor {
    partition: String,
    settings: Arc<DatetimeCursorSettings>,
    evaluator: Arc<dyn Evaluator>,
    context: EvalContext,
    watermark: Option<DateTime<Utc>>,
    slice_max: Option<DateTime<Utc>>,
}

impl DatetimeCursor {
    /// Create a cursor with no prior progress
    pub fn new(
        partition: impl Into<String>,
        settings: Arc<DatetimeCursorSettings>,
        evaluator: Arc<dyn Evaluator>,
        context: EvalContext,
    ) -> Self {
        Self {
            partition: partition.into(),
            settings,
            evaluator,
            context,
            watermark: None,
            slice_max: None,
        }
    }

    /// Restore a cursor from the partition's checkpoint
    ///
    /// A checkpoint of another cursor variant, or a position that cannot be
    /// read in the configured format, fails instead of guessing a start.
    pub fn from_checkpoint(
        partition: impl Into<String>,
        settings: Arc<DatetimeCursorSettings>,
        evaluator: Arc<dyn Evaluator>,
        context: EvalContext,
        checkpoint: Option<&PartitionCheckpoint>,
    ) -> Result<Self> {
        let mut cursor = Self::new(partition, settings, evaluator, context);
        let Some(checkpoint) = checkpoint else {
            return Ok(cursor);
        };

        if checkpoint.history.is_some() {
            return Err(Error::checkpoint_corruption(
                &cursor.partition,
                "found a file history where a datetime position was expected",
            ));
        }
        if let Some(position) = &checkpoint.position {
            let watermark = cursor.settings.format.parse_value(position).ok_or_else(|| {
                Error::checkpoint_corruption(
                    &cursor.partition,
                    format!(
                        "position {position} is not a datetime in {:?} format",
                        cursor.settings.format
                    ),
                )
            })?;
            cursor.watermark = Some(watermark);
        }
        Ok(cursor)
    }

    /// Settings this cursor was built with
    pub fn settings(&self) -> &DatetimeCursorSettings {
        &self.settings
    }

    /// Effective low bound and clamped high bound for a clock reading
    ///
    /// The low bound is `max(configured start, watermark - lookback)`; the
    /// high bound is `min(configured end, now)`.
    pub fn bounds(&self, now: DateTime<Utc>) -> Result<(DateTime<Utc>, DateTime<Utc>)> {
        let mut ctx = self.context.clone();
        ctx.set_now(now);
        let evaluator = self.evaluator.as_ref();
        let format = &self.settings.format;

        let configured_low =
            resolve_bound(&self.settings.start, "start_datetime", format, evaluator, &ctx)?;
        let configured_high = match &self.settings.end {
            Some(end) => resolve_bound(end, "end_datetime", format, evaluator, &ctx)?,
            None => now,
        };

        let high = configured_high.min(now);
        let low = match self.watermark {
            Some(wm) => {
                let resume = wm
                    .checked_sub_signed(self.settings.lookback)
                    .unwrap_or(DateTime::<Utc>::MIN_UTC);
                configured_low.max(resume)
            }
            None => configured_low,
        };
        Ok((low, high))
    }

    /// Low bound the next slices start from
    pub fn effective_low(&self, now: DateTime<Utc>) -> Result<DateTime<Utc>> {
        self.bounds(now).map(|(low, _)| low)
    }

    /// Move the watermark to `max(watermark, min(last_position, slice_end))`
    ///
    /// Without a last position the slice is taken as fully drained.
    pub fn advance_to(
        &mut self,
        last_position: Option<DateTime<Utc>>,
        slice_end: DateTime<Utc>,
    ) -> DateTime<Utc> {
        let candidate = last_position.map_or(slice_end, |p| p.min(slice_end));
        let next = self.watermark.map_or(candidate, |wm| wm.max(candidate));
        if self.watermark != Some(next) {
            debug!(
                partition = %self.partition,
                watermark = %self.settings.format.format(next),
                "Advanced watermark"
            );
        }
        self.watermark = Some(next);
        next
    }

    fn record_in_slice(&self, slice: &Slice, position: DateTime<Utc>) -> bool {
        match slice.window {
            Some(w) => {
                let upper = w
                    .end
                    .checked_add_signed(self.settings.granularity)
                    .unwrap_or(DateTime::<Utc>::MAX_UTC);
                w.start <= position && position < upper
            }
            None => true,
        }
    }
}

impl fmt::Debug for DatetimeCursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatetimeCursor")
            .field("partition", &self.partition)
            .field("watermark", &self.watermark)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl Cursor for DatetimeCursor {
    fn kind(&self) -> CursorKind {
        CursorKind::Datetime
    }

    fn partition_id(&self) -> &str {
        &self.partition
    }

    fn compute_slices(&self, now: DateTime<Utc>) -> Result<Vec<Slice>> {
        let (low, high) = self.bounds(now)?;

        if low > high {
            debug!(
                partition = %self.partition,
                low = %self.settings.format.format(low),
                high = %self.settings.format.format(high),
                "Nothing new to extract"
            );
            return Ok(Vec::new());
        }

        let windows = TimeWindows::new(low, high, self.settings.step, self.settings.granularity)?;
        let slices: Vec<Slice> = windows
            .iter()
            .map(|w| Slice::windowed(Some(self.partition.clone()), w))
            .collect();

        debug!(partition = %self.partition, count = slices.len(), "Computed slices");
        Ok(slices)
    }

    fn should_sync(&self, slice: &Slice, record: &Record) -> bool {
        match record_position(record, &self.settings.cursor_field, &self.settings.format) {
            Some(position) => self.record_in_slice(slice, position),
            None => true,
        }
    }

    fn observe(&mut self, record: &Record) {
        match record_position(record, &self.settings.cursor_field, &self.settings.format) {
            Some(position) => {
                self.slice_max = Some(self.slice_max.map_or(position, |m| m.max(position)));
            }
            None => warn!(
                partition = %self.partition,
                cursor_field = %self.settings.cursor_field,
                "Record has no readable cursor value"
            ),
        }
    }

    fn advance(&mut self, slice: &Slice, last_position: Option<DateTime<Utc>>) {
        self.slice_max = None;
        if let Some(end) = slice.end() {
            self.advance_to(last_position, end);
        }
    }

    fn close_slice(&mut self, slice: &Slice) {
        let last = self.slice_max.take();
        self.advance(slice, last);
    }

    fn watermark(&self) -> Option<DateTime<Utc>> {
        self.watermark
    }

    fn checkpoint(&self) -> Option<PartitionCheckpoint> {
        self.watermark
            .map(|wm| PartitionCheckpoint::with_position(self.settings.format.to_value(wm)))
    }
}
