//! Cursor for streams without incremental progress

use super::types::{Cursor, CursorKind};
use crate::error::Result;
use crate::state::PartitionCheckpoint;
use crate::types::Record;
use crate::window::Slice;
use chrono::{DateTime, Utc};

/// Reads the whole partition on every run and never persists a watermark
#[derive(Debug, Clone)]
pub struct FullRefreshCursor {
    partition: String,
}

impl FullRefreshCursor {
    /// Create a cursor for one partition
    pub fn new(partition: impl Into<String>) -> Self {
        Self {
            partition: partition.into(),
        }
    }
}

impl Cursor for FullRefreshCursor {
    fn kind(&self) -> CursorKind {
        CursorKind::FullRefresh
    }

    fn partition_id(&self) -> &str {
        &self.partition
    }

    fn compute_slices(&self, _now: DateTime<Utc>) -> Result<Vec<Slice>> {
        Ok(vec![Slice::whole(Some(self.partition.clone()))])
    }

    fn observe(&mut self, _record: &Record) {}

    fn advance(&mut self, _slice: &Slice, _last_position: Option<DateTime<Utc>>) {}

    fn close_slice(&mut self, _slice: &Slice) {}

    fn watermark(&self) -> Option<DateTime<Utc>> {
        None
    }

    fn checkpoint(&self) -> Option<PartitionCheckpoint> {
        None
    }
}
