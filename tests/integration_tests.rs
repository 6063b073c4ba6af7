//! Integration tests using in-memory sources
//!
//! Tests the full end-to-end flow: YAML stream → slices → records → state file

use async_trait::async_trait;
use chrono::Duration;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use slicewise_cdk::job::JobGroup;
use slicewise_cdk::types::parse_datetime;
use slicewise_cdk::{
    load_stream_from_str, EvalContext, ExtractionPipeline, JobRepository, JobStatus, Message,
    Page, PageFetcher, Partition, Record, RecordSource, Result, Slice, StateManager, SyncConfig,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

const ORDERS_STREAM: &str = r#"
name: orders
cursor:
  type: datetime
  cursor_field: updated_at
  start_datetime: "{{ config.start_date }}"
  step: 1d
  granularity: 1d
partition:
  type: list
  values: "{{ config.accounts }}"
  partition_field: account_id
"#;

/// Three orders per account per day, served over two pages
#[derive(Debug, Default)]
struct OrdersApi;

#[async_trait]
impl PageFetcher for OrdersApi {
    async fn fetch_page(
        &self,
        partition: &Partition,
        slice: &Slice,
        page_token: Option<String>,
    ) -> Result<Page> {
        let start = slice.start().unwrap();
        let account = partition.get_string("account_id").unwrap().to_string();
        let records: Vec<Record> = (0..3)
            .map(|hour| {
                json!({
                    "id": format!("{account}-{}-{hour}", start.format("%d")),
                    "updated_at": (start + Duration::hours(hour * 6)).to_rfc3339(),
                })
            })
            .collect();

        match page_token.as_deref() {
            None => Ok(Page::new(records[..2].to_vec(), "p2")),
            Some(_) => Ok(Page::last(records[2..].to_vec())),
        }
    }
}

fn context() -> EvalContext {
    EvalContext::with_config(json!({
        "start_date": "2024-03-01",
        "accounts": ["acme", "globex"],
    }))
}

fn ids(messages: &[Message]) -> Vec<String> {
    messages
        .iter()
        .filter_map(|m| match m {
            Message::Record { record, .. } => record["id"].as_str().map(str::to_string),
            _ => None,
        })
        .collect()
}

// ============================================================================
// Resume Across Runs
// ============================================================================

#[tokio::test]
async fn test_resume_from_state_file_across_runs() {
    let dir = TempDir::new().unwrap();
    let state_path = dir.path().join("state.json");
    let def = load_stream_from_str(ORDERS_STREAM).unwrap();
    let api = Arc::new(OrdersApi);

    // First run: two days for two accounts
    let mut pipeline = ExtractionPipeline::from_definition(
        &def,
        context(),
        RecordSource::Pages(api.clone()),
        StateManager::from_file(&state_path).unwrap(),
        None,
    )
    .unwrap()
    .with_config(SyncConfig::new().with_now(parse_datetime("2024-03-02T12:00:00Z").unwrap()));

    let mut messages = Vec::new();
    let stats = pipeline.run(&mut messages).await.unwrap();

    assert_eq!(stats.partitions_synced, 2);
    assert_eq!(stats.slices_completed, 4);
    assert_eq!(stats.pages_fetched, 8);
    assert_eq!(stats.records_synced, 12);
    assert!(messages.iter().any(Message::is_state));

    // Watermark stops at the last slice end, not the newest record
    let saved: Value = serde_json::from_str(&std::fs::read_to_string(&state_path).unwrap()).unwrap();
    assert_eq!(
        saved["streams"]["orders"]["partitions"]["acme"]["position"],
        json!("2024-03-02T00:00:00Z")
    );

    // Second run, fresh state manager: day two is read again, then day three
    let mut pipeline = ExtractionPipeline::from_definition(
        &def,
        context(),
        RecordSource::Pages(api.clone()),
        StateManager::from_file(&state_path).unwrap(),
        None,
    )
    .unwrap()
    .with_config(SyncConfig::new().with_now(parse_datetime("2024-03-03T12:00:00Z").unwrap()));

    let mut messages = Vec::new();
    let stats = pipeline.run(&mut messages).await.unwrap();

    assert_eq!(
        ids(&messages),
        vec![
            "acme-02-0",
            "acme-02-1",
            "acme-02-2",
            "acme-03-0",
            "acme-03-1",
            "acme-03-2",
            "globex-02-0",
            "globex-02-1",
            "globex-02-2",
            "globex-03-0",
            "globex-03-1",
            "globex-03-2",
        ]
    );
    assert_eq!(stats.slices_completed, 4);

    let saved: Value = serde_json::from_str(&std::fs::read_to_string(&state_path).unwrap()).unwrap();
    assert_eq!(
        saved["streams"]["orders"]["partitions"]["globex"]["position"],
        json!("2024-03-03T00:00:00Z")
    );
}

// ============================================================================
// Async Job Streams
// ============================================================================

/// Reports complete on the second poll of each job
#[derive(Debug, Default)]
struct ReportApi {
    next_id: AtomicUsize,
    polls: Mutex<HashMap<String, usize>>,
}

#[async_trait]
impl JobRepository for ReportApi {
    async fn submit_job(&self, slice: &Slice) -> Result<String> {
        let n = self.next_id.fetch_add(1, Ordering::SeqCst);
        Ok(format!("report-{n}-{}", slice.start().unwrap().format("%m%d")))
    }

    async fn poll_job_status(&self, job_id: &str) -> Result<JobStatus> {
        let mut polls = self.polls.lock().unwrap();
        let count = polls.entry(job_id.to_string()).or_default();
        *count += 1;
        Ok(if *count >= 2 {
            JobStatus::Completed
        } else {
            JobStatus::Running
        })
    }

    async fn fetch_job_records(&self, job_id: &str) -> Result<Vec<Record>> {
        Ok(vec![json!({"report": job_id})])
    }
}

#[tokio::test]
async fn test_async_report_stream() {
    let def = load_stream_from_str(
        r#"
name: reports
cursor:
  type: datetime
  cursor_field: day
  start_datetime: "2024-03-01"
  step: 1d
  datetime_format: date
async_job:
  poll_interval: 1ms
  max_concurrent_jobs: 2
"#,
    )
    .unwrap();

    let api = Arc::new(ReportApi::default());
    let source = RecordSource::Jobs {
        repository: api.clone(),
        config: slicewise_cdk::OrchestratorConfig::default(),
    };
    let mut pipeline = ExtractionPipeline::from_definition(
        &def,
        EvalContext::new(),
        source,
        StateManager::in_memory(),
        None,
    )
    .unwrap()
    .with_config(SyncConfig::new().with_now(parse_datetime("2024-03-04").unwrap()));

    let mut messages = Vec::new();
    let stats = pipeline.run(&mut messages).await.unwrap();

    assert_eq!(stats.jobs_submitted, 4);
    assert_eq!(stats.records_synced, 4);
    assert_eq!(
        pipeline.serialize_cursor_state().await.unwrap(),
        json!({"partitions": {"default": {"position": "2024-03-04"}}})
    );

    let reports: Vec<Value> = messages
        .iter()
        .filter_map(|m| match m {
            Message::Record { record, .. } => Some(record["report"].clone()),
            _ => None,
        })
        .collect();
    assert_eq!(reports.len(), 4);
}

#[test]
fn test_job_group_reports_running_members() {
    let group = JobGroup::new(0, Slice::whole(None), vec!["a".to_string(), "b".to_string()]);
    assert_eq!(group.status(), JobStatus::Running);
    assert_eq!(group.running_ids().collect::<Vec<_>>(), vec!["a", "b"]);
}

// ============================================================================
// Parent Partitions
// ============================================================================

#[tokio::test]
async fn test_parent_partitions_from_parent_records() {
    let def = load_stream_from_str(
        r#"
name: comments
partition:
  type: parent
  parent_stream: posts
  parent_key: id
  partition_field: post_id
"#,
    )
    .unwrap();

    #[derive(Debug)]
    struct Comments;

    #[async_trait]
    impl PageFetcher for Comments {
        async fn fetch_page(&self, partition: &Partition, _: &Slice, _: Option<String>) -> Result<Page> {
            let post = partition.get("post_id").cloned().unwrap_or(Value::Null);
            Ok(Page::last(vec![json!({"post": post})]))
        }
    }

    let posts = vec![json!({"id": 10}), json!({"id": 11}), json!({"id": 10})];
    let mut pipeline = ExtractionPipeline::from_definition(
        &def,
        EvalContext::new(),
        RecordSource::Pages(Arc::new(Comments)),
        StateManager::in_memory(),
        Some(posts),
    )
    .unwrap();

    let mut messages = Vec::new();
    let stats = pipeline.run(&mut messages).await.unwrap();

    assert_eq!(stats.partitions_synced, 2);
    let partitions: Vec<String> = messages
        .iter()
        .filter_map(|m| match m {
            Message::Record { partition, .. } => Some(partition.clone()),
            _ => None,
        })
        .collect();
    assert_eq!(partitions, vec!["10", "11"]);
}
