//! Error types for Slicewise CDK
//!
//! This module defines the error hierarchy for the entire CDK.
//! All public APIs return `Result<T, Error>` where Error is defined here.
//!
//! The variants fall into four families:
//! - configuration errors, raised while building cursors, routers and windows
//! - fetch errors, reported by record-fetching collaborators
//! - job failures, raised by the async job orchestrator
//! - checkpoint errors, raised while loading or persisting cursor state

use thiserror::Error;

/// The main error type for Slicewise CDK
#[allow(missing_docs)]
#[derive(Error, Debug)]
pub enum Error {
    // ============================================================================
    // Configuration Errors
    // ============================================================================
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Missing required config field: {field}")]
    MissingConfigField { field: String },

    #[error("Invalid config value for '{field}': {message}")]
    InvalidConfigValue { field: String, message: String },

    #[error("Invalid duration '{value}': {message}")]
    InvalidDuration { value: String, message: String },

    #[error("Failed to parse YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    // ============================================================================
    // Fetch Errors
    // ============================================================================
    #[error("Fetch failed for partition '{partition}': {message}")]
    Fetch {
        partition: String,
        message: String,
        retryable: bool,
    },

    // ============================================================================
    // Async Job Errors
    // ============================================================================
    #[error("Job group for partition '{partition}' slice {slice} ended {status}: jobs [{}]", .job_ids.join(", "))]
    JobFailure {
        partition: String,
        slice: String,
        status: String,
        job_ids: Vec<String>,
    },

    #[error("Job submission failed for partition '{partition}': {message}")]
    JobSubmission { partition: String, message: String },

    // ============================================================================
    // State Errors
    // ============================================================================
    #[error("State error: {message}")]
    State { message: String },

    #[error("Checkpoint failed: {message}")]
    Checkpoint { message: String },

    #[error("Corrupt checkpoint for partition '{partition}': {message}")]
    CheckpointCorruption { partition: String, message: String },

    // ============================================================================
    // Partition Errors
    // ============================================================================
    #[error("Partition error for stream '{stream}': {message}")]
    Partition { stream: String, message: String },

    // ============================================================================
    // Template Errors
    // ============================================================================
    #[error("Template error: {message}")]
    Template { message: String },

    #[error("Undefined variable in template: {variable}")]
    UndefinedVariable { variable: String },

    // ============================================================================
    // I/O Errors
    // ============================================================================
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // ============================================================================
    // Generic Errors
    // ============================================================================
    #[error("{0}")]
    Other(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

impl Error {
    /// Create a config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a missing field error
    pub fn missing_field(field: impl Into<String>) -> Self {
        Self::MissingConfigField {
            field: field.into(),
        }
    }

    /// Create an invalid config value error
    pub fn invalid_value(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidConfigValue {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create an invalid duration error
    pub fn invalid_duration(value: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidDuration {
            value: value.into(),
            message: message.into(),
        }
    }

    /// Create a retryable fetch error
    pub fn transient_fetch(partition: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Fetch {
            partition: partition.into(),
            message: message.into(),
            retryable: true,
        }
    }

    /// Create a fetch error whose retry budget is already exhausted
    pub fn fetch(partition: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Fetch {
            partition: partition.into(),
            message: message.into(),
            retryable: false,
        }
    }

    /// Create a job failure error
    pub fn job_failure(
        partition: impl Into<String>,
        slice: impl Into<String>,
        status: impl Into<String>,
        job_ids: Vec<String>,
    ) -> Self {
        Self::JobFailure {
            partition: partition.into(),
            slice: slice.into(),
            status: status.into(),
            job_ids,
        }
    }

    /// Create a template error
    pub fn template(message: impl Into<String>) -> Self {
        Self::Template {
            message: message.into(),
        }
    }

    /// Create an undefined variable error
    pub fn undefined_var(variable: impl Into<String>) -> Self {
        Self::UndefinedVariable {
            variable: variable.into(),
        }
    }

    /// Create a state error
    pub fn state(message: impl Into<String>) -> Self {
        Self::State {
            message: message.into(),
        }
    }

    /// Create a checkpoint corruption error
    pub fn checkpoint_corruption(partition: impl Into<String>, message: impl Into<String>) -> Self {
        Self::CheckpointCorruption {
            partition: partition.into(),
            message: message.into(),
        }
    }

    /// Create a partition error
    pub fn partition(stream: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Partition {
            stream: stream.into(),
            message: message.into(),
        }
    }

    /// Check if this error is retryable
    ///
    /// Only fetch errors can be retried, and only by the collaborator that
    /// raised them. Job failures and checkpoint errors are always fatal.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Fetch { retryable, .. } => *retryable,
            Error::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::TimedOut
                    | std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::Interrupted
            ),
            _ => false,
        }
    }

    /// Check if this error must abort the whole run
    pub fn is_fatal_to_run(&self) -> bool {
        matches!(
            self,
            Error::CheckpointCorruption { .. } | Error::Checkpoint { .. } | Error::State { .. }
        )
    }
}

/// Result type alias for Slicewise CDK
pub type Result<T> = std::result::Result<T, Error>;

/// Extension trait for adding context to errors
pub trait ResultExt<T> {
    /// Add context to an error
    fn context(self, message: impl Into<String>) -> Result<T>;

    /// Add context with a closure (lazy evaluation)
    fn with_context<F: FnOnce() -> String>(self, f: F) -> Result<T>;
}

impl<T, E: Into<Error>> ResultExt<T> for std::result::Result<T, E> {
    fn context(self, message: impl Into<String>) -> Result<T> {
        self.map_err(|e| {
            let inner = e.into();
            Error::Other(format!("{}: {}", message.into(), inner))
        })
    }

    fn with_context<F: FnOnce() -> String>(self, f: F) -> Result<T> {
        self.map_err(|e| {
            let inner = e.into();
            Error::Other(format!("{}: {}", f(), inner))
        })
    }
}
