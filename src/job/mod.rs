//! Async job module
//!
//! Coordinates sources whose API is submit-a-job then poll-to-completion.
//!
//! # Overview
//!
//! - `JobRepository` - Source-specific submit, poll and download
//! - `JobGroup` - The jobs backing one slice, with an aggregate status
//! - `AsyncJobOrchestrator` - Fixed-interval poll loop for one partition
//!
//! # Example
//!
//! ```ignore
//! let mut orchestrator = AsyncJobOrchestrator::new("acct-1", repository, OrchestratorConfig::default());
//! orchestrator.enqueue(slices);
//! while let Some(group) = orchestrator.next_completed().await? {
//!     let records: Vec<_> = orchestrator.fetch_records(&group).try_collect().await?;
//! }
//! ```

mod orchestrator;
mod repository;
mod types;

pub use orchestrator::{
    AsyncJobOrchestrator, OrchestratorConfig, DEFAULT_MAX_CONCURRENT_JOBS, DEFAULT_POLL_INTERVAL,
};
pub use repository::JobRepository;
pub use types::{Job, JobGroup, JobStatus};

#[cfg(test)]
mod tests;
