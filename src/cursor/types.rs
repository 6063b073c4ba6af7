//! Cursor trait and shared types

use crate::error::Result;
use crate::state::PartitionCheckpoint;
use crate::types::{extract_path, CursorFormat, Record};
use crate::window::Slice;
use chrono::{DateTime, Utc};
use std::fmt;

/// Cursor variant, used in logs and checkpoint errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorKind {
    /// Time-windowed watermark cursor
    Datetime,
    /// No watermark, whole partition every run
    FullRefresh,
    /// Bounded history of seen resources
    FileHistory,
}

impl fmt::Display for CursorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Datetime => write!(f, "datetime"),
            Self::FullRefresh => write!(f, "full_refresh"),
            Self::FileHistory => write!(f, "file_history"),
        }
    }
}

/// Per-partition cursor
///
/// Turns prior progress plus configuration into slices, and folds new
/// progress back in. One instance is owned by exactly one pipeline for one
/// partition.
pub trait Cursor: Send + fmt::Debug {
    /// Which variant this is
    fn kind(&self) -> CursorKind;

    /// Partition this cursor tracks
    fn partition_id(&self) -> &str;

    /// Compute the slices still to extract, in ascending order
    ///
    /// Does not mutate the cursor: calling it twice with the same clock
    /// reading yields the same slices.
    fn compute_slices(&self, now: DateTime<Utc>) -> Result<Vec<Slice>>;

    /// Whether a fetched record should be emitted
    fn should_sync(&self, _slice: &Slice, _record: &Record) -> bool {
        true
    }

    /// Note a record that has been emitted
    fn observe(&mut self, record: &Record);

    /// Advance the watermark after `slice` has been durably emitted
    ///
    /// The watermark never moves past the slice's own end, and never back.
    fn advance(&mut self, slice: &Slice, last_position: Option<DateTime<Utc>>);

    /// Advance using the positions seen through [`Cursor::observe`]
    fn close_slice(&mut self, slice: &Slice);

    /// Current watermark, if the cursor keeps one
    fn watermark(&self) -> Option<DateTime<Utc>>;

    /// Serializable state, or `None` when there is nothing to persist
    fn checkpoint(&self) -> Option<PartitionCheckpoint>;
}

/// Read a datetime from a record field
pub(crate) fn record_position(
    record: &Record,
    field: &str,
    format: &CursorFormat,
) -> Option<DateTime<Utc>> {
    extract_path(record, field).and_then(|v| format.parse_value(v))
}
