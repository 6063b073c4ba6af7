//! Engine types
//!
//! Message types, collaborator traits and configuration for the extraction
//! pipeline.

use crate::error::Result;
use crate::job::{JobRepository, OrchestratorConfig};
use crate::partition::Partition;
use crate::types::{LogLevel, Record};
use crate::window::Slice;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// A message emitted during sync
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    /// One extracted record
    Record {
        /// Stream name
        stream: String,
        /// Partition the record belongs to
        partition: String,
        /// The record
        record: Record,
    },
    /// Checkpoint snapshot, emitted after a slice is durably processed
    State {
        /// Stream name
        stream: String,
        /// Checkpoint of the stream, every partition included
        data: Value,
    },
    /// Log message
    Log {
        /// Log level
        level: LogLevel,
        /// Log message
        message: String,
    },
}

impl Message {
    /// Create a record message
    pub fn record(stream: impl Into<String>, partition: impl Into<String>, record: Record) -> Self {
        Self::Record {
            stream: stream.into(),
            partition: partition.into(),
            record,
        }
    }

    /// Create a state message
    pub fn state(stream: impl Into<String>, data: Value) -> Self {
        Self::State {
            stream: stream.into(),
            data,
        }
    }

    /// Create a log message
    pub fn log(level: LogLevel, message: impl Into<String>) -> Self {
        Self::Log {
            level,
            message: message.into(),
        }
    }

    /// Create an info log
    pub fn info(message: impl Into<String>) -> Self {
        Self::log(LogLevel::Info, message)
    }

    /// Create a debug log
    pub fn debug(message: impl Into<String>) -> Self {
        Self::log(LogLevel::Debug, message)
    }

    /// Create a warning log
    pub fn warn(message: impl Into<String>) -> Self {
        Self::log(LogLevel::Warn, message)
    }

    /// Create an error log
    pub fn error(message: impl Into<String>) -> Self {
        Self::log(LogLevel::Error, message)
    }

    /// Check if this is a record message
    pub fn is_record(&self) -> bool {
        matches!(self, Self::Record { .. })
    }

    /// Check if this is a state message
    pub fn is_state(&self) -> bool {
        matches!(self, Self::State { .. })
    }

    /// Check if this is a log message
    pub fn is_log(&self) -> bool {
        matches!(self, Self::Log { .. })
    }
}

// ============================================================================
// Collaborators
// ============================================================================

/// One page of records
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Page {
    /// Records on this page
    pub records: Vec<Record>,
    /// Token of the next page, `None` on the last page
    pub next_page_token: Option<String>,
}

impl Page {
    /// A page followed by another
    pub fn new(records: Vec<Record>, next_page_token: impl Into<String>) -> Self {
        Self {
            records,
            next_page_token: Some(next_page_token.into()),
        }
    }

    /// The final page of a slice
    pub fn last(records: Vec<Record>) -> Self {
        Self {
            records,
            next_page_token: None,
        }
    }
}

/// Source-specific paginated reads
///
/// Implementations own transport retries; an error returned from here is
/// final for the slice.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Fetch one page of a slice
    async fn fetch_page(
        &self,
        partition: &Partition,
        slice: &Slice,
        page_token: Option<String>,
    ) -> Result<Page>;
}

/// Receives records and checkpoint snapshots
#[async_trait]
pub trait MessageSink: Send {
    /// Accept one message
    async fn emit(&mut self, message: Message) -> Result<()>;
}

#[async_trait]
impl MessageSink for Vec<Message> {
    async fn emit(&mut self, message: Message) -> Result<()> {
        self.push(message);
        Ok(())
    }
}

/// Where a stream's records come from
#[derive(Clone)]
pub enum RecordSource {
    /// Paginated synchronous reads
    Pages(Arc<dyn PageFetcher>),
    /// Submit-then-poll remote jobs
    Jobs {
        /// Remote job API
        repository: Arc<dyn JobRepository>,
        /// Poll loop settings
        config: OrchestratorConfig,
    },
}

impl RecordSource {
    /// Whether records come from remote jobs
    pub fn is_async(&self) -> bool {
        matches!(self, Self::Jobs { .. })
    }
}

impl fmt::Debug for RecordSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pages(_) => f.write_str("RecordSource::Pages"),
            Self::Jobs { config, .. } => f
                .debug_struct("RecordSource::Jobs")
                .field("config", config)
                .finish_non_exhaustive(),
        }
    }
}

// ============================================================================
// Configuration and Statistics
// ============================================================================

/// Configuration for sync operation
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Stop at the first failed partition
    ///
    /// When off, a partition failing with a fetch or job error is logged and
    /// the run moves on. Checkpoint errors always stop the run.
    pub fail_fast: bool,
    /// Clock reading used for slice computation, `Utc::now()` when unset
    pub now: Option<DateTime<Utc>>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            fail_fast: true,
            now: None,
        }
    }
}

impl SyncConfig {
    /// Create a new sync config
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set fail fast mode
    #[must_use]
    pub fn with_fail_fast(mut self, fail_fast: bool) -> Self {
        self.fail_fast = fail_fast;
        self
    }

    /// Pin the clock
    #[must_use]
    pub fn with_now(mut self, now: DateTime<Utc>) -> Self {
        self.now = Some(now);
        self
    }
}

/// Statistics from a sync operation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncStats {
    /// Total records emitted
    pub records_synced: usize,
    /// Records dropped by the cursor
    pub records_skipped: usize,
    /// Total pages fetched
    pub pages_fetched: usize,
    /// Slices fully drained and checkpointed
    pub slices_completed: usize,
    /// Remote jobs submitted
    pub jobs_submitted: usize,
    /// Partitions finished without error
    pub partitions_synced: usize,
    /// Partitions that failed
    pub errors: usize,
    /// Duration in milliseconds
    pub duration_ms: u64,
}

impl SyncStats {
    /// Create new stats
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an emitted record
    pub fn add_record(&mut self) {
        self.records_synced += 1;
    }

    /// Add a skipped record
    pub fn add_skipped(&mut self) {
        self.records_skipped += 1;
    }

    /// Add a page
    pub fn add_page(&mut self) {
        self.pages_fetched += 1;
    }

    /// Add a completed slice
    pub fn add_slice(&mut self) {
        self.slices_completed += 1;
    }

    /// Add submitted jobs
    pub fn add_jobs(&mut self, count: usize) {
        self.jobs_submitted += count;
    }

    /// Add a partition
    pub fn add_partition(&mut self) {
        self.partitions_synced += 1;
    }

    /// Add an error
    pub fn add_error(&mut self) {
        self.errors += 1;
    }

    /// Set duration
    pub fn set_duration(&mut self, ms: u64) {
        self.duration_ms = ms;
    }
}
