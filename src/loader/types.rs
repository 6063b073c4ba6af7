//! Loader types
//!
//! Declarative stream definition types for YAML parsing.

use crate::cursor::DEFAULT_MAX_HISTORY_SIZE;
use crate::job::DEFAULT_MAX_CONCURRENT_JOBS;
use serde::{Deserialize, Serialize};

// ============================================================================
// Stream Definition
// ============================================================================

/// Declarative definition of one incremental stream
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct StreamDefinition {
    /// Stream name, also the key of its checkpoint
    pub name: String,
    /// How progress is tracked
    #[serde(default)]
    pub cursor: CursorDefinition,
    /// How the stream is split into partitions
    #[serde(default)]
    pub partition: PartitionDefinition,
    /// Submit-then-poll extraction settings
    #[serde(default)]
    pub async_job: Option<AsyncJobDefinition>,
}

impl StreamDefinition {
    /// Whether records come from remote jobs instead of pages
    pub fn is_async(&self) -> bool {
        self.async_job.is_some()
    }
}

// ============================================================================
// Cursor Definition
// ============================================================================

/// Cursor definition
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CursorDefinition {
    /// Windowed watermark over a datetime field
    Datetime {
        /// Record field holding the cursor value
        cursor_field: String,
        /// Lower bound (template)
        start_datetime: String,
        /// Upper bound (template), `now` when absent
        #[serde(default)]
        end_datetime: Option<String>,
        /// Window length (e.g. `3d`, `P1D`)
        step: String,
        /// Cursor granularity, defaults from the datetime format
        #[serde(default)]
        granularity: Option<String>,
        /// Duration re-read before the watermark
        #[serde(default)]
        lookback_window: Option<String>,
        /// `iso8601`, `unix`, `unix_ms`, `date` or a strftime pattern
        #[serde(default)]
        datetime_format: Option<String>,
    },
    /// Whole partition on every run
    #[default]
    FullRefresh,
    /// Bounded history of seen resources (files, objects)
    FileHistory {
        /// Record field holding the resource id
        #[serde(default = "default_resource_field")]
        resource_field: String,
        /// Record field holding the last-modified time
        #[serde(default = "default_modified_field")]
        cursor_field: String,
        /// Maximum number of remembered resources
        #[serde(default = "default_max_history_size")]
        max_history_size: usize,
        /// Format of the last-modified field
        #[serde(default)]
        datetime_format: Option<String>,
    },
}

fn default_resource_field() -> String {
    "uri".to_string()
}

fn default_modified_field() -> String {
    "last_modified".to_string()
}

fn default_max_history_size() -> usize {
    DEFAULT_MAX_HISTORY_SIZE
}

// ============================================================================
// Partition Definition
// ============================================================================

/// Partition router definition
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PartitionDefinition {
    /// One implicit partition
    #[default]
    Single,
    /// Static list of values
    List {
        /// Literal values or an expression resolving to a list
        values: ListValues,
        /// Field name in partition context
        partition_field: String,
    },
    /// Keys of a parent stream's records
    Parent {
        /// Parent stream name
        parent_stream: String,
        /// Field to extract from parent records
        parent_key: String,
        /// Field name in partition context
        partition_field: String,
    },
}

/// Values of a list partition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ListValues {
    /// Literal values
    Literal(Vec<String>),
    /// Expression such as `{{ config.account_ids }}`
    Expression(String),
}

// ============================================================================
// Async Job Definition
// ============================================================================

/// Async job polling definition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct AsyncJobDefinition {
    /// Sleep between status polls
    #[serde(default = "default_poll_interval")]
    pub poll_interval: String,
    /// Mark a job TIMED_OUT after this long
    #[serde(default)]
    pub job_timeout: Option<String>,
    /// Maximum number of job groups running at once
    #[serde(default = "default_max_concurrent_jobs")]
    pub max_concurrent_jobs: usize,
}

impl Default for AsyncJobDefinition {
    fn default() -> Self {
        Self {
            poll_interval: default_poll_interval(),
            job_timeout: None,
            max_concurrent_jobs: default_max_concurrent_jobs(),
        }
    }
}

fn default_poll_interval() -> String {
    "5s".to_string()
}

fn default_max_concurrent_jobs() -> usize {
    DEFAULT_MAX_CONCURRENT_JOBS
}
