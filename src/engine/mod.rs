//! Execution engine module
//!
//! Main read loop and stream orchestration.
//!
//! # Overview
//!
//! The engine module provides:
//! - `ExtractionPipeline` - Partitions, slices, fetches, advances and checkpoints one stream
//! - `PageFetcher` / `MessageSink` - Collaborator seams for reading and emitting
//! - `SyncConfig` - Configuration for sync operations
//! - Message types for output (Record, State, Log)
//!
//! Partitions are processed one after another. Within a partition, a slice's
//! checkpoint is written only after all of its records have been emitted.

mod types;

pub use types::{
    Message, MessageSink, Page, PageFetcher, RecordSource, SyncConfig, SyncStats,
};

use crate::cursor::{Cursor, CursorFactory};
use crate::error::{Error, Result};
use crate::job::{AsyncJobOrchestrator, JobRepository, OrchestratorConfig};
use crate::loader::{build_cursor, build_orchestrator_config, build_router, StreamDefinition};
use crate::partition::{Partition, PartitionRouter};
use crate::state::StateManager;
use crate::template::{EvalContext, Evaluator, TemplateEvaluator};
use crate::types::Record;
use crate::window::Slice;
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Incremental extraction pipeline for one stream
///
/// Owns the cursor of every partition it handles for the duration of a run.
pub struct ExtractionPipeline {
    stream: String,
    cursor_factory: CursorFactory,
    router: Box<dyn PartitionRouter>,
    source: RecordSource,
    state: StateManager,
    evaluator: Arc<dyn Evaluator>,
    context: EvalContext,
    config: SyncConfig,
    stats: SyncStats,
    cursors: BTreeMap<String, Box<dyn Cursor>>,
}

impl ExtractionPipeline {
    /// Create a pipeline from its components
    pub fn new(
        stream: impl Into<String>,
        cursor_factory: CursorFactory,
        router: Box<dyn PartitionRouter>,
        source: RecordSource,
        state: StateManager,
    ) -> Self {
        Self {
            stream: stream.into(),
            cursor_factory,
            router,
            source,
            state,
            evaluator: Arc::new(TemplateEvaluator::new()),
            context: EvalContext::new(),
            config: SyncConfig::default(),
            stats: SyncStats::default(),
            cursors: BTreeMap::new(),
        }
    }

    /// Create a pipeline from a declarative stream definition
    ///
    /// `context` carries the connector config used by bound and partition
    /// expressions. An `async_job` section replaces the orchestrator settings
    /// of a job source, and requires one.
    pub fn from_definition(
        def: &StreamDefinition,
        context: EvalContext,
        source: RecordSource,
        state: StateManager,
        parent_records: Option<Vec<Value>>,
    ) -> Result<Self> {
        let evaluator: Arc<dyn Evaluator> = Arc::new(TemplateEvaluator::new());

        let cursor_factory = build_cursor(&def.cursor)?;
        cursor_factory.validate(evaluator.as_ref(), &context)?;
        let router = build_router(&def.partition, evaluator.as_ref(), &context, parent_records)?;

        let source = match (source, &def.async_job) {
            (RecordSource::Jobs { repository, .. }, Some(job)) => RecordSource::Jobs {
                repository,
                config: build_orchestrator_config(job)?,
            },
            (RecordSource::Pages(_), Some(_)) => {
                return Err(Error::config(format!(
                    "Stream '{}' defines async_job but has no job repository",
                    def.name
                )))
            }
            (source, None) => source,
        };

        Ok(Self::new(def.name.clone(), cursor_factory, router, source, state)
            .with_evaluator(evaluator)
            .with_context(context))
    }

    /// Set the expression evaluator
    #[must_use]
    pub fn with_evaluator(mut self, evaluator: Arc<dyn Evaluator>) -> Self {
        self.evaluator = evaluator;
        self
    }

    /// Set the base template context
    #[must_use]
    pub fn with_context(mut self, context: EvalContext) -> Self {
        self.context = context;
        self
    }

    /// Set sync configuration
    #[must_use]
    pub fn with_config(mut self, config: SyncConfig) -> Self {
        self.config = config;
        self
    }

    /// Stream name
    pub fn stream(&self) -> &str {
        &self.stream
    }

    /// Get the state manager
    pub fn state(&self) -> &StateManager {
        &self.state
    }

    /// Get statistics of the last run
    pub fn stats(&self) -> &SyncStats {
        &self.stats
    }

    /// Cursor of a partition, once loaded
    pub fn cursor(&self, partition_id: &str) -> Option<&dyn Cursor> {
        self.cursors.get(partition_id).map(|c| &**c)
    }

    fn cursor_mut(&mut self, partition_id: &str) -> Result<&mut dyn Cursor> {
        match self.cursors.get_mut(partition_id) {
            Some(cursor) => Ok(&mut **cursor),
            None => Err(Error::state(format!(
                "no cursor loaded for partition '{partition_id}'"
            ))),
        }
    }

    // ============================================================================
    // Cursor Operations
    // ============================================================================

    /// Slices still to extract for a partition
    ///
    /// Restores the partition's cursor from the checkpoint on first use.
    pub async fn compute_slices(
        &mut self,
        partition: &Partition,
        now: DateTime<Utc>,
    ) -> Result<Vec<Slice>> {
        if !self.cursors.contains_key(&partition.id) {
            let checkpoint = self.state.get_partition(&self.stream, &partition.id).await?;
            let cursor = self.cursor_factory.create(
                partition,
                checkpoint.as_ref(),
                Arc::clone(&self.evaluator),
                &self.context,
            )?;
            self.cursors.insert(partition.id.clone(), cursor);
        }
        self.cursor_mut(&partition.id)?.compute_slices(now)
    }

    /// Advance a partition's cursor past a drained slice and store the
    /// resulting checkpoint
    pub async fn advance_cursor(
        &mut self,
        partition_id: &str,
        slice: &Slice,
        last_position: Option<DateTime<Utc>>,
    ) -> Result<()> {
        let cursor = self.cursor_mut(partition_id)?;
        cursor.advance(slice, last_position);
        if let Some(checkpoint) = cursor.checkpoint() {
            self.state
                .set_partition(&self.stream, partition_id, &checkpoint)
                .await?;
        }
        Ok(())
    }

    /// Checkpoint document of this stream
    pub async fn serialize_cursor_state(&self) -> Result<Value> {
        let state = self.state.state().await;
        match state.get_stream(&self.stream) {
            Some(stream) => Ok(serde_json::to_value(stream)?),
            None => Ok(Value::Object(Map::new())),
        }
    }

    // ============================================================================
    // Read Loop
    // ============================================================================

    /// Extract every partition of the stream
    ///
    /// With `fail_fast` off, a partition failing with a fetch or job error is
    /// reported and skipped; checkpoint errors stop the run either way.
    pub async fn run(&mut self, sink: &mut dyn MessageSink) -> Result<SyncStats> {
        let start = Instant::now();
        let now = self.config.now.unwrap_or_else(Utc::now);
        self.stats = SyncStats::default();
        self.cursors.clear();

        info!(stream = %self.stream, "Starting sync");
        sink.emit(Message::info(format!("Starting sync for stream: {}", self.stream)))
            .await?;

        let partitions = self.router.partitions()?;
        debug!(stream = %self.stream, count = partitions.len(), "Enumerated partitions");

        for partition in &partitions {
            match self.sync_partition(partition, now, sink).await {
                Ok(()) => self.stats.add_partition(),
                Err(e) => {
                    self.stats.add_error();
                    warn!(
                        stream = %self.stream,
                        partition = %partition.id,
                        error = %e,
                        "Partition failed"
                    );
                    sink.emit(Message::error(format!(
                        "Error in partition {}: {e}",
                        partition.id
                    )))
                    .await?;
                    if self.config.fail_fast || e.is_fatal_to_run() {
                        return Err(e);
                    }
                }
            }
        }

        self.cursors.clear();

        #[allow(clippy::cast_possible_truncation)]
        self.stats.set_duration(start.elapsed().as_millis() as u64);

        sink.emit(Message::info(format!(
            "Completed sync for {}: {} records in {} slices",
            self.stream, self.stats.records_synced, self.stats.slices_completed
        )))
        .await?;

        Ok(self.stats.clone())
    }

    async fn sync_partition(
        &mut self,
        partition: &Partition,
        now: DateTime<Utc>,
        sink: &mut dyn MessageSink,
    ) -> Result<()> {
        let slices = self.compute_slices(partition, now).await?;
        info!(
            stream = %self.stream,
            partition = %partition.id,
            slices = slices.len(),
            "Computed slices"
        );

        if slices.is_empty() {
            sink.emit(Message::debug(format!(
                "Partition {} is up to date",
                partition.id
            )))
            .await?;
            return Ok(());
        }

        match self.source.clone() {
            RecordSource::Pages(fetcher) => {
                for slice in &slices {
                    self.read_pages(fetcher.as_ref(), partition, slice, sink)
                        .await?;
                }
                Ok(())
            }
            RecordSource::Jobs { repository, config } => {
                self.read_jobs(repository, config, partition, &slices, sink)
                    .await
            }
        }
    }

    async fn read_pages(
        &mut self,
        fetcher: &dyn PageFetcher,
        partition: &Partition,
        slice: &Slice,
        sink: &mut dyn MessageSink,
    ) -> Result<()> {
        let mut token: Option<String> = None;

        loop {
            let page = fetcher.fetch_page(partition, slice, token.take()).await?;
            self.stats.add_page();

            for record in page.records {
                self.emit_record(&partition.id, slice, record, sink).await?;
            }

            match page.next_page_token {
                Some(next) => token = Some(next),
                None => break,
            }
        }

        self.cursor_mut(&partition.id)?.close_slice(slice);
        self.commit_slice(&partition.id, slice, sink).await
    }

    async fn read_jobs(
        &mut self,
        repository: Arc<dyn JobRepository>,
        config: OrchestratorConfig,
        partition: &Partition,
        slices: &[Slice],
        sink: &mut dyn MessageSink,
    ) -> Result<()> {
        let mut orchestrator = AsyncJobOrchestrator::new(partition.id.clone(), repository, config);
        orchestrator.enqueue(slices.iter().cloned());

        let result = self
            .drain_jobs(&mut orchestrator, partition, slices, sink)
            .await;
        self.stats.add_jobs(orchestrator.submitted_jobs());
        result
    }

    /// Emit groups as they complete; advance only across the contiguous
    /// prefix of drained slices
    async fn drain_jobs(
        &mut self,
        orchestrator: &mut AsyncJobOrchestrator,
        partition: &Partition,
        slices: &[Slice],
        sink: &mut dyn MessageSink,
    ) -> Result<()> {
        let mut drained = BTreeSet::new();
        let mut next = 0;

        while let Some(group) = orchestrator.next_completed().await? {
            debug!(
                stream = %self.stream,
                partition = %partition.id,
                slice = %group.slice,
                "Reading job group"
            );

            let mut records = Box::pin(orchestrator.fetch_records(&group));
            while let Some(record) = records.try_next().await? {
                self.emit_record(&partition.id, &group.slice, record, sink)
                    .await?;
            }

            drained.insert(group.index);
            while drained.remove(&next) {
                let Some(slice) = slices.get(next) else {
                    break;
                };
                self.cursor_mut(&partition.id)?.advance(slice, None);
                self.commit_slice(&partition.id, slice, sink).await?;
                next += 1;
            }
        }

        Ok(())
    }

    async fn emit_record(
        &mut self,
        partition_id: &str,
        slice: &Slice,
        record: Record,
        sink: &mut dyn MessageSink,
    ) -> Result<()> {
        if !self.cursor_mut(partition_id)?.should_sync(slice, &record) {
            self.stats.add_skipped();
            return Ok(());
        }

        sink.emit(Message::record(&self.stream, partition_id, record.clone()))
            .await?;
        self.cursor_mut(partition_id)?.observe(&record);
        self.stats.add_record();
        Ok(())
    }

    /// Persist the partition's checkpoint and emit the stream snapshot
    async fn commit_slice(
        &mut self,
        partition_id: &str,
        slice: &Slice,
        sink: &mut dyn MessageSink,
    ) -> Result<()> {
        self.stats.add_slice();

        let Some(checkpoint) = self.cursor_mut(partition_id)?.checkpoint() else {
            return Ok(());
        };
        self.state
            .set_partition(&self.stream, partition_id, &checkpoint)
            .await?;

        debug!(
            stream = %self.stream,
            partition = %partition_id,
            slice = %slice,
            "Checkpointed slice"
        );
        let data = self.serialize_cursor_state().await?;
        sink.emit(Message::state(&self.stream, data)).await
    }
}

impl std::fmt::Debug for ExtractionPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExtractionPipeline")
            .field("stream", &self.stream)
            .field("cursor", &self.cursor_factory.kind())
            .field("source", &self.source)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
