//! End-to-end pipeline behavior through the public API.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use advisory_pipeline::error::{AppError, Result};
use advisory_pipeline::models::{
    Advisory, AnalysisStage, JobKind, PipelineConfig, ProcessingJob, StatusSnapshot,
};
use advisory_pipeline::pipeline::{
    Coordinator, Enqueued, JobQueue, Monitor, PipelineContext, Processor,
};
use advisory_pipeline::services::{Analyzer, AnalyzerSet};
use advisory_pipeline::storage::{AdvisoryStore, LocalStorage, MemoryStorage};
use async_trait::async_trait;
use chrono::Utc;
use serde_json::json;

/// Echoes its input; fails every call for ids in `broken`, sleeps `delay` otherwise.
struct EchoAnalyzer {
    stage: AnalysisStage,
    broken: Vec<String>,
    delay: Duration,
    calls: AtomicUsize,
}

impl EchoAnalyzer {
    fn new(stage: AnalysisStage) -> Arc<Self> {
        Self::with(stage, &[], Duration::ZERO)
    }

    fn with(stage: AnalysisStage, broken: &[&str], delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            stage,
            broken: broken.iter().map(|s| s.to_string()).collect(),
            delay,
            calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Analyzer for EchoAnalyzer {
    fn stage(&self) -> AnalysisStage {
        self.stage
    }

    async fn analyze(&self, item_id: &str, text: &str) -> Result<serde_json::Value> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.broken.iter().any(|id| id == item_id) {
            return Err(AppError::analyzer(self.stage, item_id, "upstream model unavailable"));
        }
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        Ok(json!({ "text": text }))
    }
}

fn echo_set() -> AnalyzerSet {
    AnalyzerSet::new(
        EchoAnalyzer::new(AnalysisStage::Intelligence),
        EchoAnalyzer::new(AnalysisStage::Compliance),
    )
}

fn fast_config() -> PipelineConfig {
    PipelineConfig {
        poll_interval_ms: 10,
        drain_timeout_ms: 500,
        ..PipelineConfig::default()
    }
}

async fn seed(store: &dyn AdvisoryStore, items: &[(&str, &str)]) {
    let base = Utc::now() - chrono::Duration::minutes(1);
    for (i, (id, text)) in items.iter().enumerate() {
        store
            .put_item(Advisory::new(*id, *text, base + chrono::Duration::seconds(i as i64)))
            .await
            .unwrap();
    }
}

/// Process queued jobs until the queue stays empty.
async fn process_all(ctx: &PipelineContext) {
    let processor = Processor::new(ctx);
    while let Some(job) = ctx.queue().dequeue(Duration::from_millis(5)).await {
        processor.process(job).await;
    }
}

fn wait_for(coordinator: &Coordinator, pred: impl Fn(&StatusSnapshot) -> bool) -> StatusSnapshot {
    let deadline = Instant::now() + Duration::from_secs(10);
    loop {
        let status = coordinator.get_status();
        if pred(&status) || Instant::now() > deadline {
            return status;
        }
        thread::sleep(Duration::from_millis(10));
    }
}

#[tokio::test]
async fn test_new_item_is_processed_once() {
    let store = Arc::new(MemoryStorage::new());
    seed(store.as_ref(), &[("A", "X")]).await;
    let ctx = PipelineContext::new(fast_config(), store.clone(), echo_set());

    Monitor::new(&ctx).poll_once().await.unwrap();
    process_all(&ctx).await;

    let stats = ctx.statistics();
    assert_eq!(stats.skipped, 0);
    assert_eq!(stats.successful, 1);
    assert_eq!(stats.failed, 0);
    assert!(ctx.is_processed("A"));
    for stage in AnalysisStage::ALL {
        assert!(store.result(stage, "A").await.unwrap().is_some());
    }
}

#[tokio::test]
async fn test_edited_item_is_reanalyzed() {
    let store = Arc::new(MemoryStorage::new());
    seed(store.as_ref(), &[("A", "X")]).await;
    let ctx = PipelineContext::new(fast_config(), store.clone(), echo_set());
    let monitor = Monitor::new(&ctx);

    monitor.poll_once().await.unwrap();
    process_all(&ctx).await;

    store
        .put_item(Advisory::new("A", "Y", Utc::now()))
        .await
        .unwrap();
    let (_, updates) = monitor.poll_once().await.unwrap();
    assert_eq!(updates.enqueued, 1);
    process_all(&ctx).await;

    assert_eq!(ctx.statistics().successful, 2);
    let record = store
        .result(AnalysisStage::Compliance, "A")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.payload["text"], "Y");

    // A further pass with no edit queues nothing.
    let (_, updates) = monitor.poll_once().await.unwrap();
    assert_eq!(updates.enqueued, 0);
}

#[tokio::test]
async fn test_failing_item_is_attempted_max_retries_plus_one() {
    let store = Arc::new(MemoryStorage::new());
    seed(store.as_ref(), &[("B", "broken")]).await;
    let intelligence = EchoAnalyzer::with(AnalysisStage::Intelligence, &["B"], Duration::ZERO);
    let analyzers = AnalyzerSet::new(
        intelligence.clone(),
        EchoAnalyzer::new(AnalysisStage::Compliance),
    );
    let ctx = PipelineContext::new(fast_config(), store.clone(), analyzers);

    Monitor::new(&ctx).scan_new().await.unwrap();
    process_all(&ctx).await;

    let stats = ctx.statistics();
    assert_eq!(intelligence.calls(), 4);
    assert_eq!(stats.failed, 1);
    assert_eq!(stats.retried, 3);
    assert_eq!(stats.total_processed, 4);
    assert!(ctx.queue().is_empty());
    assert!(!ctx.is_processed("B"));
}

#[test]
fn test_full_queue_drops_newest() {
    let queue = JobQueue::new(100);
    for i in 0..100 {
        let job = ProcessingJob::new(format!("item-{i}"), "text", JobKind::New, 3);
        assert_eq!(queue.enqueue(job), Enqueued::Accepted);
    }

    let extra = ProcessingJob::new("item-100", "text", JobKind::New, 3);
    assert_eq!(queue.enqueue(extra), Enqueued::Dropped);
    assert_eq!(queue.len(), 100);
    assert_eq!(queue.dropped(), 1);
}

#[tokio::test]
async fn test_racing_scans_enqueue_twice_and_skip_once() {
    let store = Arc::new(MemoryStorage::new());
    seed(store.as_ref(), &[("C", "race")]).await;
    let ctx = PipelineContext::new(fast_config(), store.clone(), echo_set());
    let monitor = Monitor::new(&ctx);

    // Two scans over the same window before anything is processed.
    let window = ctx.watermark();
    assert_eq!(monitor.scan_new().await.unwrap().enqueued, 1);
    ctx.set_watermark(window);
    assert_eq!(monitor.scan_new().await.unwrap().enqueued, 1);
    assert_eq!(ctx.queue().len(), 2);

    process_all(&ctx).await;

    let stats = ctx.statistics();
    assert_eq!(stats.successful, 1);
    assert_eq!(stats.skipped, 1);
}

#[test]
fn test_coordinator_stops_gracefully_under_load() {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap();
    let store = Arc::new(MemoryStorage::new());
    let items: Vec<(String, String)> = (0..30)
        .map(|i| (format!("adv-{i:02}"), format!("advisory text {i}")))
        .collect();
    let refs: Vec<(&str, &str)> = items.iter().map(|(a, b)| (a.as_str(), b.as_str())).collect();
    runtime.block_on(seed(store.as_ref(), &refs));

    let slow = AnalyzerSet::new(
        EchoAnalyzer::with(AnalysisStage::Intelligence, &[], Duration::from_millis(20)),
        EchoAnalyzer::new(AnalysisStage::Compliance),
    );
    let mut coordinator = Coordinator::new(fast_config(), store.clone(), slow);
    coordinator.start().unwrap();

    let running = wait_for(&coordinator, |s| s.statistics.successful >= 2);
    assert!(running.is_running);
    assert!(running.statistics.successful >= 2);

    coordinator.stop();
    let final_status = coordinator.wait().unwrap();
    assert!(!final_status.is_running);
    assert_eq!(final_status.queue_depth, 0);
    assert_eq!(final_status.unfinished_jobs, 0);
    assert_eq!(
        final_status.statistics.total_processed,
        final_status.statistics.successful
    );
    assert_eq!(final_status.processed_count as u64, final_status.statistics.successful);
}

#[test]
fn test_local_store_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap();
    let store = Arc::new(LocalStorage::new(dir.path()));
    runtime.block_on(seed(store.as_ref(), &[("A", "first"), ("B", "second")]));

    let mut coordinator = Coordinator::new(fast_config(), store, echo_set());
    coordinator.start().unwrap();
    wait_for(&coordinator, |s| s.statistics.successful == 2);
    coordinator.stop();
    assert_eq!(coordinator.wait().unwrap().statistics.successful, 2);

    // A fresh coordinator over the same files restores the processed set.
    let reopened = Arc::new(LocalStorage::new(dir.path()));
    let mut restarted = Coordinator::new(fast_config(), reopened, echo_set());
    restarted.start().unwrap();
    let status = wait_for(&restarted, |s| s.processed_count == 2);
    assert_eq!(status.processed_count, 2);
    assert_eq!(status.statistics.successful, 0);
    restarted.stop();
    restarted.wait();
}
