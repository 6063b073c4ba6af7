//! Builds per-partition cursors from stream-level settings

use super::datetime::{DatetimeCursor, DatetimeCursorSettings};
use super::full_refresh::FullRefreshCursor;
use super::history::{FileHistoryCursor, FileHistorySettings};
use super::types::{Cursor, CursorKind};
use crate::error::Result;
use crate::partition::Partition;
use crate::state::PartitionCheckpoint;
use crate::template::{EvalContext, Evaluator};
use std::sync::Arc;

/// Stream-level cursor configuration, one variant per cursor kind
#[derive(Debug, Clone)]
pub enum CursorFactory {
    /// Time-windowed watermark
    Datetime(Arc<DatetimeCursorSettings>),
    /// Whole partition every run
    FullRefresh,
    /// Bounded resource history
    FileHistory(FileHistorySettings),
}

impl CursorFactory {
    /// Which cursor variant this factory builds
    pub fn kind(&self) -> CursorKind {
        match self {
            Self::Datetime(_) => CursorKind::Datetime,
            Self::FullRefresh => CursorKind::FullRefresh,
            Self::FileHistory(_) => CursorKind::FileHistory,
        }
    }

    /// Check the settings against a base context
    pub fn validate(&self, evaluator: &dyn Evaluator, ctx: &EvalContext) -> Result<()> {
        match self {
            Self::Datetime(settings) => settings.validate(evaluator, ctx),
            Self::FullRefresh => Ok(()),
            Self::FileHistory(settings) => settings.validate(),
        }
    }

    /// Create the cursor of one partition, restoring prior progress
    ///
    /// `base` supplies config values; the partition's values are layered on
    /// top so bound expressions can reference them.
    pub fn create(
        &self,
        partition: &Partition,
        checkpoint: Option<&PartitionCheckpoint>,
        evaluator: Arc<dyn Evaluator>,
        base: &EvalContext,
    ) -> Result<Box<dyn Cursor>> {
        match self {
            Self::Datetime(settings) => {
                let mut ctx = base.clone();
                ctx.set_partition(partition.to_value());
                let cursor = DatetimeCursor::from_checkpoint(
                    partition.id.clone(),
                    Arc::clone(settings),
                    evaluator,
                    ctx,
                    checkpoint,
                )?;
                Ok(Box::new(cursor))
            }
            Self::FullRefresh => Ok(Box::new(FullRefreshCursor::new(partition.id.clone()))),
            Self::FileHistory(settings) => {
                let cursor = FileHistoryCursor::from_checkpoint(
                    partition.id.clone(),
                    settings.clone(),
                    checkpoint,
                )?;
                Ok(Box::new(cursor))
            }
        }
    }
}
