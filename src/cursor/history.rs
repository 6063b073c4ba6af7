//! Bounded-history cursor for file-like sources
//!
//! Resources (files, objects) carry an id and a last-modified position. The
//! cursor remembers the most recent `capacity` of them and skips any whose
//! position has not moved since it was last emitted.

use super::types::{record_position, Cursor, CursorKind};
use crate::error::{Error, Result};
use crate::state::PartitionCheckpoint;
use crate::types::{extract_path, parse_datetime, CursorFormat, Record};
use crate::window::Slice;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::{debug, warn};

/// Format of positions stored in the history mapping
pub const HISTORY_DATETIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6fZ";

/// Default number of resources remembered per partition
pub const DEFAULT_MAX_HISTORY_SIZE: usize = 10_000;

/// Settings shared by all partitions of a file-history stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileHistorySettings {
    /// Record field holding the resource id
    pub resource_field: String,
    /// Record field holding the resource's last-modified time
    pub cursor_field: String,
    /// Format of the last-modified field
    pub format: CursorFormat,
    /// Maximum number of remembered resources
    pub capacity: usize,
}

impl FileHistorySettings {
    /// Create settings with the default capacity
    pub fn new(resource_field: impl Into<String>, cursor_field: impl Into<String>) -> Self {
        Self {
            resource_field: resource_field.into(),
            cursor_field: cursor_field.into(),
            format: CursorFormat::Iso8601,
            capacity: DEFAULT_MAX_HISTORY_SIZE,
        }
    }

    /// Set the history capacity
    #[must_use]
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Check the settings before any extraction starts
    pub fn validate(&self) -> Result<()> {
        if self.capacity == 0 {
            return Err(Error::invalid_value("max_history_size", "must be at least 1"));
        }
        if self.resource_field.is_empty() {
            return Err(Error::missing_field("resource_field"));
        }
        if self.cursor_field.is_empty() {
            return Err(Error::missing_field("cursor_field"));
        }
        self.format.validate()
    }
}

/// Bounded map of resource id to last-seen position for one partition
#[derive(Debug, Clone)]
pub struct FileHistoryCursor {
    partition: String,
    settings: FileHistorySettings,
    entries: HashMap<String, DateTime<Utc>>,
    /// Eviction order: oldest position first, ties by id
    order: BTreeSet<(DateTime<Utc>, String)>,
    /// Oldest entry when the run started, if history was already full
    initial_oldest: Option<DateTime<Utc>>,
}

impl FileHistoryCursor {
    /// Create a cursor with an empty history
    pub fn new(partition: impl Into<String>, settings: FileHistorySettings) -> Self {
        Self {
            partition: partition.into(),
            settings,
            entries: HashMap::new(),
            order: BTreeSet::new(),
            initial_oldest: None,
        }
    }

    /// Restore a cursor from the partition's checkpoint
    pub fn from_checkpoint(
        partition: impl Into<String>,
        settings: FileHistorySettings,
        checkpoint: Option<&PartitionCheckpoint>,
    ) -> Result<Self> {
        let mut cursor = Self::new(partition, settings);
        let Some(checkpoint) = checkpoint else {
            return Ok(cursor);
        };

        let Some(history) = &checkpoint.history else {
            if checkpoint.position.is_some() {
                return Err(Error::checkpoint_corruption(
                    &cursor.partition,
                    "found a datetime position but no file history",
                ));
            }
            return Ok(cursor);
        };

        for (id, raw) in history {
            let position = parse_datetime(raw).ok_or_else(|| {
                Error::checkpoint_corruption(
                    &cursor.partition,
                    format!("history entry '{id}' has unreadable position '{raw}'"),
                )
            })?;
            cursor.insert(id.clone(), position);
        }

        let evicted = cursor.evict_overflow();
        if evicted > 0 {
            warn!(
                partition = %cursor.partition,
                evicted,
                capacity = cursor.settings.capacity,
                "Stored history exceeded capacity"
            );
        }

        if cursor.is_full() {
            cursor.initial_oldest = cursor.order.first().map(|(t, _)| *t);
        }
        Ok(cursor)
    }

    /// Number of remembered resources
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no resource has been remembered yet
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether the history has reached its capacity
    pub fn is_full(&self) -> bool {
        self.entries.len() >= self.settings.capacity
    }

    /// Last-seen position of a resource
    pub fn position_of(&self, resource: &str) -> Option<DateTime<Utc>> {
        self.entries.get(resource).copied()
    }

    /// Newest remembered position
    pub fn newest(&self) -> Option<DateTime<Utc>> {
        self.order.last().map(|(t, _)| *t)
    }

    /// Oldest remembered position
    pub fn oldest(&self) -> Option<DateTime<Utc>> {
        self.order.first().map(|(t, _)| *t)
    }

    /// Whether a resource at `position` should be emitted
    ///
    /// A known resource syncs only when its position moved forward. An
    /// unknown one always syncs while the history has room; once it is full,
    /// only resources at or after the oldest entry at start of run sync, since
    /// anything older may have been seen and evicted.
    pub fn should_sync_resource(&self, resource: &str, position: DateTime<Utc>) -> bool {
        if let Some(seen) = self.entries.get(resource) {
            if position < *seen {
                warn!(
                    partition = %self.partition,
                    resource,
                    "Resource position moved backwards since last sync"
                );
            }
            return position > *seen;
        }

        if !self.is_full() {
            return true;
        }
        match self.initial_oldest {
            Some(oldest) => position >= oldest,
            None => true,
        }
    }

    /// Remember a resource after it has been emitted
    ///
    /// Evicts the oldest-by-position entry when the capacity is exceeded.
    pub fn record_seen(&mut self, resource: &str, position: DateTime<Utc>) {
        let position = match self.entries.get(resource) {
            Some(seen) if *seen >= position => return,
            _ => position,
        };
        self.insert(resource.to_string(), position);

        if self.evict_overflow() > 0 {
            debug!(partition = %self.partition, "Evicted oldest history entry");
        }
    }

    fn insert(&mut self, resource: String, position: DateTime<Utc>) {
        if let Some(previous) = self.entries.insert(resource.clone(), position) {
            self.order.remove(&(previous, resource.clone()));
        }
        self.order.insert((position, resource));
    }

    fn evict_overflow(&mut self) -> usize {
        let mut evicted = 0;
        while self.entries.len() > self.settings.capacity {
            let Some((_, id)) = self.order.pop_first() else {
                break;
            };
            self.entries.remove(&id);
            evicted += 1;
        }
        evicted
    }

    fn resource_of(&self, record: &Record) -> Option<(String, DateTime<Utc>)> {
        let id = extract_path(record, &self.settings.resource_field)?;
        let id = id.as_str().map_or_else(|| id.to_string(), str::to_string);
        let position = record_position(record, &self.settings.cursor_field, &self.settings.format)?;
        Some((id, position))
    }
}

fn format_history_position(position: DateTime<Utc>) -> String {
    position.format(HISTORY_DATETIME_FORMAT).to_string()
}

impl Cursor for FileHistoryCursor {
    fn kind(&self) -> CursorKind {
        CursorKind::FileHistory
    }

    fn partition_id(&self) -> &str {
        &self.partition
    }

    fn compute_slices(&self, _now: DateTime<Utc>) -> Result<Vec<Slice>> {
        Ok(vec![Slice::whole(Some(self.partition.clone()))])
    }

    fn should_sync(&self, _slice: &Slice, record: &Record) -> bool {
        let Some((id, position)) = self.resource_of(record) else {
            return true;
        };
        let sync = self.should_sync_resource(&id, position);
        if !sync {
            debug!(partition = %self.partition, resource = %id, "Skipping already synced resource");
        }
        sync
    }

    fn observe(&mut self, record: &Record) {
        match self.resource_of(record) {
            Some((id, position)) => self.record_seen(&id, position),
            None => warn!(
                partition = %self.partition,
                resource_field = %self.settings.resource_field,
                "Record has no readable resource id or position"
            ),
        }
    }

    fn advance(&mut self, _slice: &Slice, _last_position: Option<DateTime<Utc>>) {}

    fn close_slice(&mut self, _slice: &Slice) {}

    fn watermark(&self) -> Option<DateTime<Utc>> {
        self.newest()
    }

    fn checkpoint(&self) -> Option<PartitionCheckpoint> {
        let newest = self.newest()?;
        let history: BTreeMap<String, String> = self
            .entries
            .iter()
            .map(|(id, t)| (id.clone(), format_history_position(*t)))
            .collect();

        Some(PartitionCheckpoint {
            position: Some(format_history_position(newest).into()),
            history: Some(history),
            ..PartitionCheckpoint::default()
        })
    }
}
