//! Remote job API seam

use super::types::JobStatus;
use crate::error::Result;
use crate::types::Record;
use crate::window::Slice;
use async_trait::async_trait;
use std::collections::HashMap;

/// Source-specific access to submit-then-poll jobs
///
/// Implementations own retries of transient transport errors; an error
/// returned from here is final for the call.
#[async_trait]
pub trait JobRepository: Send + Sync {
    /// Submit one job for a slice and return its id
    async fn submit_job(&self, slice: &Slice) -> Result<String>;

    /// Submit the jobs backing a slice
    ///
    /// Sources that split a slice across several jobs override this.
    async fn submit_jobs(&self, slice: &Slice) -> Result<Vec<String>> {
        Ok(vec![self.submit_job(slice).await?])
    }

    /// Current status of one job
    async fn poll_job_status(&self, job_id: &str) -> Result<JobStatus>;

    /// Current status of several jobs
    ///
    /// The default polls one at a time; override when the API accepts
    /// many ids per call. Ids missing from the result keep their status.
    async fn poll_job_statuses(&self, job_ids: &[String]) -> Result<HashMap<String, JobStatus>> {
        let mut statuses = HashMap::with_capacity(job_ids.len());
        for id in job_ids {
            statuses.insert(id.clone(), self.poll_job_status(id).await?);
        }
        Ok(statuses)
    }

    /// Records produced by a completed job
    async fn fetch_job_records(&self, job_id: &str) -> Result<Vec<Record>>;
}
