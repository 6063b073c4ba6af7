//! Poll loop driving submit-then-poll jobs for one partition

use super::repository::JobRepository;
use super::types::{JobGroup, JobStatus};
use crate::error::{Error, Result};
use crate::types::Record;
use crate::window::Slice;
use futures::stream::{self, Stream, StreamExt, TryStreamExt};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Default time between status polls
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Default number of job groups kept running at once
pub const DEFAULT_MAX_CONCURRENT_JOBS: usize = 10;

/// Orchestrator tuning
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrchestratorConfig {
    /// Sleep between polls while nothing is terminal
    pub poll_interval: Duration,
    /// Mark a job TIMED_OUT after running this long
    pub job_timeout: Option<Duration>,
    /// Maximum number of groups running at once
    pub max_concurrent_jobs: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            job_timeout: None,
            max_concurrent_jobs: DEFAULT_MAX_CONCURRENT_JOBS,
        }
    }
}

impl OrchestratorConfig {
    /// Set the poll interval
    #[must_use]
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Set the per-job timeout
    #[must_use]
    pub fn with_job_timeout(mut self, timeout: Duration) -> Self {
        self.job_timeout = Some(timeout);
        self
    }

    /// Set the concurrent group budget
    #[must_use]
    pub fn with_max_concurrent_jobs(mut self, max: usize) -> Self {
        self.max_concurrent_jobs = max;
        self
    }

    /// Reject settings the poll loop cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.poll_interval.is_zero() {
            return Err(Error::invalid_value("poll_interval", "must be positive"));
        }
        if self.max_concurrent_jobs == 0 {
            return Err(Error::invalid_value("max_concurrent_jobs", "must be at least 1"));
        }
        if self.job_timeout.is_some_and(|t| t.is_zero()) {
            return Err(Error::invalid_value("job_timeout", "must be positive"));
        }
        Ok(())
    }
}

/// Tracks the job groups of one partition from submission to completion
///
/// Single-threaded and cooperative: the only suspension points are calls to
/// the repository and the sleep between polls. A FAILED or TIMED_OUT group
/// ends the loop with [`Error::JobFailure`]; the orchestrator never resubmits.
pub struct AsyncJobOrchestrator {
    partition: String,
    repository: Arc<dyn JobRepository>,
    config: OrchestratorConfig,
    pending: VecDeque<(usize, Slice)>,
    running: Vec<JobGroup>,
    ready: VecDeque<JobGroup>,
    next_index: usize,
    submitted_jobs: usize,
}

impl AsyncJobOrchestrator {
    /// Create an orchestrator for one partition
    pub fn new(
        partition: impl Into<String>,
        repository: Arc<dyn JobRepository>,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            partition: partition.into(),
            repository,
            config,
            pending: VecDeque::new(),
            running: Vec::new(),
            ready: VecDeque::new(),
            next_index: 0,
            submitted_jobs: 0,
        }
    }

    /// Partition this orchestrator works for
    pub fn partition(&self) -> &str {
        &self.partition
    }

    /// Queue slices to be started as the concurrency budget allows
    ///
    /// Slices are numbered in the order they are queued.
    pub fn enqueue(&mut self, slices: impl IntoIterator<Item = Slice>) {
        for slice in slices {
            self.pending.push_back((self.next_index, slice));
            self.next_index += 1;
        }
    }

    /// Submit the jobs for a slice right away
    pub async fn start(&mut self, slice: Slice) -> Result<&JobGroup> {
        let index = self.next_index;
        self.next_index += 1;
        self.submit(index, slice).await
    }

    async fn submit(&mut self, index: usize, slice: Slice) -> Result<&JobGroup> {
        let ids = self.repository.submit_jobs(&slice).await?;
        if ids.is_empty() {
            return Err(Error::JobSubmission {
                partition: self.partition.clone(),
                message: format!("no job id returned for slice {slice}"),
            });
        }

        info!(
            partition = %self.partition,
            slice = %slice,
            job_ids = ?ids,
            "Submitted job group"
        );
        self.submitted_jobs += ids.len();

        let pos = self.running.len();
        self.running.push(JobGroup::new(index, slice, ids));
        Ok(&self.running[pos])
    }

    async fn start_pending(&mut self) -> Result<()> {
        let budget = self.config.max_concurrent_jobs.max(1);
        while self.running.len() < budget {
            let Some((index, slice)) = self.pending.pop_front() else {
                break;
            };
            self.submit(index, slice).await?;
        }
        Ok(())
    }

    /// Refresh every running group once
    ///
    /// Returns the groups that became COMPLETED, in slice order, and keeps the
    /// rest. A group that became FAILED or TIMED_OUT is an error naming all of
    /// its jobs.
    pub async fn poll_once(&mut self) -> Result<Vec<JobGroup>> {
        let ids: Vec<String> = self
            .running
            .iter()
            .flat_map(|g| g.running_ids().map(str::to_string))
            .collect();
        if ids.is_empty() {
            return self.take_terminal();
        }

        let statuses = self.repository.poll_job_statuses(&ids).await?;
        let timeout = self.config.job_timeout;

        for group in &mut self.running {
            for job in &mut group.jobs {
                if job.status.is_terminal() {
                    continue;
                }
                if let Some(status) = statuses.get(&job.id) {
                    job.status = *status;
                }
                if job.status == JobStatus::Running
                    && timeout.is_some_and(|t| job.started_at.elapsed() >= t)
                {
                    warn!(
                        partition = %self.partition,
                        job_id = %job.id,
                        "Job exceeded timeout"
                    );
                    job.status = JobStatus::TimedOut;
                }
            }
        }

        self.take_terminal()
    }

    fn take_terminal(&mut self) -> Result<Vec<JobGroup>> {
        let (terminal, running): (Vec<JobGroup>, Vec<JobGroup>) = std::mem::take(&mut self.running)
            .into_iter()
            .partition(|g| g.status().is_terminal());
        self.running = running;

        let mut completed = Vec::with_capacity(terminal.len());
        for group in terminal {
            let status = group.status();
            if status != JobStatus::Completed {
                warn!(
                    partition = %self.partition,
                    slice = %group.slice,
                    status = %status,
                    job_ids = ?group.job_ids(),
                    "Job group did not complete"
                );
                return Err(Error::job_failure(
                    self.partition.clone(),
                    group.slice.to_string(),
                    status.to_string(),
                    group.job_ids(),
                ));
            }
            debug!(partition = %self.partition, slice = %group.slice, "Job group completed");
            completed.push(group);
        }
        completed.sort_by_key(|g| g.index);
        Ok(completed)
    }

    /// Wait for the next completed group
    ///
    /// Starts queued slices as budget frees up, polls, and sleeps between
    /// polls. Returns `None` once nothing is queued or running.
    pub async fn next_completed(&mut self) -> Result<Option<JobGroup>> {
        loop {
            if let Some(group) = self.ready.pop_front() {
                return Ok(Some(group));
            }

            self.start_pending().await?;
            if self.running.is_empty() {
                return Ok(None);
            }

            let completed = self.poll_once().await?;
            if completed.is_empty() {
                tokio::time::sleep(self.config.poll_interval).await;
            } else {
                self.ready.extend(completed);
            }
        }
    }

    /// Stream of groups in completion order
    pub fn drain_completed(&mut self) -> impl Stream<Item = Result<JobGroup>> + '_ {
        stream::try_unfold(self, |orchestrator| async move {
            let next = orchestrator.next_completed().await?;
            Ok::<_, Error>(next.map(|group| (group, orchestrator)))
        })
    }

    /// Records of a completed group, one member job after another
    pub fn fetch_records(&self, group: &JobGroup) -> impl Stream<Item = Result<Record>> + Send + 'static {
        let repository = Arc::clone(&self.repository);
        stream::iter(group.job_ids())
            .then(move |id| {
                let repository = Arc::clone(&repository);
                async move { repository.fetch_job_records(&id).await }
            })
            .map_ok(|records| stream::iter(records.into_iter().map(Ok::<_, Error>)))
            .try_flatten()
    }

    /// Number of groups still running
    pub fn running_count(&self) -> usize {
        self.running.len()
    }

    /// Number of slices waiting for budget
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Number of jobs submitted so far
    pub fn submitted_jobs(&self) -> usize {
        self.submitted_jobs
    }
}

impl std::fmt::Debug for AsyncJobOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AsyncJobOrchestrator")
            .field("partition", &self.partition)
            .field("config", &self.config)
            .field("pending", &self.pending.len())
            .field("running", &self.running.len())
            .finish_non_exhaustive()
    }
}
