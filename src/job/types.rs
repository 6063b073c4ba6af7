//! Job and job group types

use crate::window::Slice;
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::time::Instant;

/// Status of a remote job, or the aggregate of a group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    /// Still being processed remotely
    Running,
    /// Finished, results can be fetched
    Completed,
    /// Reported as failed by the source
    Failed,
    /// Ran longer than the configured timeout
    TimedOut,
}

impl JobStatus {
    /// Whether the status can no longer change
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Running)
    }

    /// Aggregate member statuses into a group status
    ///
    /// Precedence is `FAILED > TIMED_OUT > RUNNING > COMPLETED`, so a group is
    /// completed only when every member is.
    pub fn aggregate<I>(statuses: I) -> Self
    where
        I: IntoIterator<Item = Self>,
    {
        statuses
            .into_iter()
            .fold(Self::Completed, |acc, s| if s.rank() > acc.rank() { s } else { acc })
    }

    fn rank(self) -> u8 {
        match self {
            Self::Completed => 0,
            Self::Running => 1,
            Self::TimedOut => 2,
            Self::Failed => 3,
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Running => write!(f, "RUNNING"),
            Self::Completed => write!(f, "COMPLETED"),
            Self::Failed => write!(f, "FAILED"),
            Self::TimedOut => write!(f, "TIMED_OUT"),
        }
    }
}

/// One submitted remote job
#[derive(Debug, Clone)]
pub struct Job {
    /// Id assigned by the source
    pub id: String,
    /// Last known status
    pub status: JobStatus,
    /// When the job was submitted
    pub started_at: Instant,
}

impl Job {
    /// Track a freshly submitted job
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            status: JobStatus::Running,
            started_at: Instant::now(),
        }
    }
}

/// Jobs backing one slice
#[derive(Debug, Clone)]
pub struct JobGroup {
    /// Position of the slice in the partition's slice sequence
    pub index: usize,
    /// Slice the jobs were submitted for
    pub slice: Slice,
    /// Member jobs, at least one
    pub jobs: Vec<Job>,
}

impl JobGroup {
    /// Create a group from submitted job ids
    pub fn new(index: usize, slice: Slice, job_ids: Vec<String>) -> Self {
        Self {
            index,
            slice,
            jobs: job_ids.into_iter().map(Job::new).collect(),
        }
    }

    /// Aggregate status of the member jobs
    pub fn status(&self) -> JobStatus {
        JobStatus::aggregate(self.jobs.iter().map(|j| j.status))
    }

    /// Ids of all member jobs
    pub fn job_ids(&self) -> Vec<String> {
        self.jobs.iter().map(|j| j.id.clone()).collect()
    }

    /// Ids of members still running
    pub fn running_ids(&self) -> impl Iterator<Item = &str> {
        self.jobs
            .iter()
            .filter(|j| !j.status.is_terminal())
            .map(|j| j.id.as_str())
    }
}
