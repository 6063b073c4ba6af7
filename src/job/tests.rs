//! Tests for the async job orchestrator

use super::*;
use crate::error::{Error, Result};
use crate::types::Record;
use crate::window::Slice;
use async_trait::async_trait;
use futures::{StreamExt, TryStreamExt};
use pretty_assertions::assert_eq;
use serde_json::json;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use test_case::test_case;

use super::JobStatus::{Completed, Failed, Running, TimedOut};

// ============================================================================
// Mock Repository
// ============================================================================

/// Hands out ids `job-0`, `job-1`, ... and replays scripted statuses.
/// The last scripted status sticks; unscripted jobs complete at once.
#[derive(Debug, Default)]
struct MockRepository {
    jobs_per_slice: usize,
    next_id: AtomicUsize,
    polls: AtomicUsize,
    scripts: Mutex<HashMap<String, VecDeque<JobStatus>>>,
}

impl MockRepository {
    fn new() -> Self {
        Self {
            jobs_per_slice: 1,
            ..Self::default()
        }
    }

    fn with_jobs_per_slice(mut self, n: usize) -> Self {
        self.jobs_per_slice = n;
        self
    }

    fn script(self, job_id: &str, statuses: &[JobStatus]) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .insert(job_id.to_string(), statuses.iter().copied().collect());
        self
    }
}

#[async_trait]
impl JobRepository for MockRepository {
    async fn submit_job(&self, _slice: &Slice) -> Result<String> {
        let n = self.next_id.fetch_add(1, Ordering::SeqCst);
        Ok(format!("job-{n}"))
    }

    async fn submit_jobs(&self, slice: &Slice) -> Result<Vec<String>> {
        let mut ids = Vec::new();
        for _ in 0..self.jobs_per_slice {
            ids.push(self.submit_job(slice).await?);
        }
        Ok(ids)
    }

    async fn poll_job_status(&self, job_id: &str) -> Result<JobStatus> {
        self.polls.fetch_add(1, Ordering::SeqCst);
        let mut scripts = self.scripts.lock().unwrap();
        let Some(script) = scripts.get_mut(job_id) else {
            return Ok(Completed);
        };
        let status = if script.len() > 1 {
            script.pop_front().unwrap()
        } else {
            script.front().copied().unwrap_or(Completed)
        };
        Ok(status)
    }

    async fn fetch_job_records(&self, job_id: &str) -> Result<Vec<Record>> {
        Ok(vec![
            json!({"job": job_id, "n": 0}),
            json!({"job": job_id, "n": 1}),
        ])
    }
}

fn fast_config() -> OrchestratorConfig {
    OrchestratorConfig::default().with_poll_interval(Duration::from_millis(1))
}

fn slices(n: usize) -> Vec<Slice> {
    (0..n).map(|i| Slice::whole(Some(format!("s{i}")))).collect()
}

fn orchestrator(repository: MockRepository, config: OrchestratorConfig) -> AsyncJobOrchestrator {
    AsyncJobOrchestrator::new("acct-1", Arc::new(repository), config)
}

// ============================================================================
// Status Aggregation Tests
// ============================================================================

#[test_case(&[Completed, Completed], Completed ; "all completed")]
#[test_case(&[Completed, Running], Running ; "one still running")]
#[test_case(&[Running, Failed], Failed ; "failure beats running")]
#[test_case(&[Completed, TimedOut], TimedOut ; "timeout beats completed")]
#[test_case(&[Failed, TimedOut], Failed ; "failure beats timeout")]
#[test_case(&[Running, TimedOut], TimedOut ; "timeout beats running")]
#[test_case(&[Completed], Completed ; "single job")]
fn test_aggregate_status(members: &[JobStatus], expected: JobStatus) {
    assert_eq!(JobStatus::aggregate(members.iter().copied()), expected);
}

#[test]
fn test_status_display_and_serde() {
    assert_eq!(TimedOut.to_string(), "TIMED_OUT");
    assert_eq!(serde_json::to_value(TimedOut).unwrap(), json!("TIMED_OUT"));
    assert_eq!(
        serde_json::from_value::<JobStatus>(json!("COMPLETED")).unwrap(),
        Completed
    );
    assert!(!Running.is_terminal());
    assert!(Failed.is_terminal());
}

#[test]
fn test_group_status_follows_members() {
    let mut group = JobGroup::new(0, Slice::whole(None), vec!["a".into(), "b".into()]);
    assert_eq!(group.status(), Running);

    group.jobs[0].status = Completed;
    assert_eq!(group.status(), Running);
    assert_eq!(group.running_ids().collect::<Vec<_>>(), vec!["b"]);

    group.jobs[1].status = Completed;
    assert_eq!(group.status(), Completed);
}

// ============================================================================
// Orchestrator Tests
// ============================================================================

#[tokio::test]
async fn test_group_completes_after_polling() {
    let repository = MockRepository::new().script("job-0", &[Running, Running, Completed]);
    let mut orchestrator = orchestrator(repository, fast_config());
    orchestrator.enqueue(slices(1));

    let group = orchestrator.next_completed().await.unwrap().unwrap();
    assert_eq!(group.index, 0);
    assert_eq!(group.job_ids(), vec!["job-0"]);
    assert_eq!(group.status(), Completed);

    assert!(orchestrator.next_completed().await.unwrap().is_none());
    assert_eq!(orchestrator.submitted_jobs(), 1);
}

#[tokio::test]
async fn test_failed_member_fails_whole_group() {
    let repository = MockRepository::new()
        .with_jobs_per_slice(2)
        .script("job-0", &[Completed])
        .script("job-1", &[Running, Failed]);
    let mut orchestrator = orchestrator(repository, fast_config());
    orchestrator.enqueue(slices(1));

    let err = orchestrator.next_completed().await.unwrap_err();
    match err {
        Error::JobFailure {
            partition,
            status,
            job_ids,
            ..
        } => {
            assert_eq!(partition, "acct-1");
            assert_eq!(status, "FAILED");
            assert_eq!(job_ids, vec!["job-0", "job-1"]);
        }
        other => panic!("expected job failure, got {other:?}"),
    }
    assert!(!Error::job_failure("p", "s", "FAILED", vec![]).is_retryable());
}

#[tokio::test]
async fn test_job_timeout_marks_timed_out() {
    let repository = MockRepository::new().script("job-0", &[Running]);
    let config = fast_config().with_job_timeout(Duration::from_millis(5));
    let mut orchestrator = orchestrator(repository, config);
    orchestrator.enqueue(slices(1));

    let err = orchestrator.next_completed().await.unwrap_err();
    assert!(matches!(err, Error::JobFailure { ref status, .. } if status == "TIMED_OUT"));
}

#[tokio::test]
async fn test_groups_yielded_as_they_complete() {
    let repository = MockRepository::new()
        .script("job-0", &[Running, Running, Running, Completed])
        .script("job-1", &[Completed]);
    let mut orchestrator = orchestrator(repository, fast_config());
    orchestrator.enqueue(slices(2));

    let first = orchestrator.next_completed().await.unwrap().unwrap();
    let second = orchestrator.next_completed().await.unwrap().unwrap();
    assert_eq!((first.index, second.index), (1, 0));
}

#[tokio::test]
async fn test_concurrency_budget_limits_running_groups() {
    let repository = MockRepository::new()
        .script("job-0", &[Running, Completed])
        .script("job-1", &[Running, Completed]);
    let config = fast_config().with_max_concurrent_jobs(2);
    let mut orchestrator = orchestrator(repository, config);
    orchestrator.enqueue(slices(5));
    assert_eq!(orchestrator.pending_count(), 5);

    let mut seen = Vec::new();
    while let Some(group) = orchestrator.next_completed().await.unwrap() {
        assert!(orchestrator.running_count() <= 2);
        seen.push(group.index);
    }

    seen.sort_unstable();
    assert_eq!(seen, vec![0, 1, 2, 3, 4]);
    assert_eq!(orchestrator.pending_count(), 0);
    assert_eq!(orchestrator.submitted_jobs(), 5);
}

#[tokio::test]
async fn test_drain_completed_yields_every_group() {
    let mut orchestrator = orchestrator(MockRepository::new(), fast_config());
    orchestrator.enqueue(slices(3));

    let groups: Vec<JobGroup> = orchestrator.drain_completed().try_collect().await.unwrap();
    let indices: Vec<usize> = groups.iter().map(|g| g.index).collect();
    assert_eq!(indices, vec![0, 1, 2]);
}

#[tokio::test]
async fn test_drain_stops_at_failure() {
    let repository = MockRepository::new().script("job-1", &[Failed]);
    let mut orchestrator = orchestrator(repository, fast_config().with_max_concurrent_jobs(1));
    orchestrator.enqueue(slices(3));

    let results: Vec<Result<JobGroup>> = orchestrator.drain_completed().collect().await;
    assert_eq!(results.len(), 2);
    assert!(results[0].is_ok());
    assert!(matches!(results[1], Err(Error::JobFailure { .. })));
}

#[tokio::test]
async fn test_fetch_records_reads_jobs_in_turn() {
    let repository = MockRepository::new().with_jobs_per_slice(2);
    let mut orchestrator = orchestrator(repository, fast_config());
    orchestrator.enqueue(slices(1));

    let group = orchestrator.next_completed().await.unwrap().unwrap();
    let records: Vec<Record> = orchestrator.fetch_records(&group).try_collect().await.unwrap();

    let origin: Vec<(&str, i64)> = records
        .iter()
        .map(|r| (r["job"].as_str().unwrap(), r["n"].as_i64().unwrap()))
        .collect();
    assert_eq!(
        origin,
        vec![("job-0", 0), ("job-0", 1), ("job-1", 0), ("job-1", 1)]
    );
}

#[tokio::test]
async fn test_start_submits_immediately() {
    let mut orchestrator = orchestrator(MockRepository::new(), fast_config());

    let group = orchestrator.start(Slice::whole(Some("p".into()))).await.unwrap();
    assert_eq!(group.status(), Running);
    assert_eq!(orchestrator.running_count(), 1);

    let completed = orchestrator.poll_once().await.unwrap();
    assert_eq!(completed.len(), 1);
    assert_eq!(orchestrator.running_count(), 0);
}

#[tokio::test]
async fn test_empty_submission_is_error() {
    let repository = MockRepository::new().with_jobs_per_slice(0);
    let mut orchestrator = orchestrator(repository, fast_config());
    orchestrator.enqueue(slices(1));

    let err = orchestrator.next_completed().await.unwrap_err();
    assert!(matches!(err, Error::JobSubmission { .. }));
}

#[tokio::test]
async fn test_nothing_enqueued_finishes_without_polling() {
    let repository = Arc::new(MockRepository::new());
    let mut orchestrator = AsyncJobOrchestrator::new("acct-1", repository.clone(), fast_config());

    assert!(orchestrator.next_completed().await.unwrap().is_none());
    assert_eq!(repository.polls.load(Ordering::SeqCst), 0);
    assert_eq!(repository.next_id.load(Ordering::SeqCst), 0);
}

#[test]
fn test_config_validation() {
    assert!(OrchestratorConfig::default().validate().is_ok());
    assert!(OrchestratorConfig::default()
        .with_poll_interval(Duration::ZERO)
        .validate()
        .is_err());
    assert!(OrchestratorConfig::default()
        .with_max_concurrent_jobs(0)
        .validate()
        .is_err());
}
