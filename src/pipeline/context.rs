// src/pipeline/context.rs

//! State shared by the monitor and processor tasks.
//!
//! A context is created on the worker thread and never leaves it. Both tasks
//! borrow it on the same single-threaded scheduler, so plain `Cell`/`RefCell`
//! is enough; no borrow is ever held across an `.await`.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::models::{AnalysisStage, ConfigSnapshot, PipelineConfig, Statistics, StatusSnapshot};
use crate::pipeline::ledger::DedupLedger;
use crate::pipeline::queue::JobQueue;
use crate::services::AnalyzerSet;
use crate::storage::AdvisoryStore;

/// Everything one pipeline run owns.
pub struct PipelineContext {
    pub(crate) config: PipelineConfig,
    pub(crate) store: Arc<dyn AdvisoryStore>,
    pub(crate) analyzers: AnalyzerSet,
    pub(crate) queue: JobQueue,
    pub(crate) ledger: RefCell<DedupLedger>,
    pub(crate) stats: RefCell<Statistics>,
    pub(crate) watermark: Cell<DateTime<Utc>>,
}

/// Result of the boot-time reconciliation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Reconciliation {
    /// Ids with a record in both result tables
    pub processed: usize,
    /// Of those, ids whose records agreed on a fingerprint
    pub fingerprints_seeded: usize,
    /// Ids with only one stage persisted
    pub partial: usize,
}

impl PipelineContext {
    pub fn new(config: PipelineConfig, store: Arc<dyn AdvisoryStore>, analyzers: AnalyzerSet) -> Self {
        let watermark = Utc::now()
            .checked_sub_signed(config.initial_lookback())
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        Self {
            queue: JobQueue::new(config.max_queue_size),
            config,
            store,
            analyzers,
            ledger: RefCell::new(DedupLedger::new()),
            stats: RefCell::new(Statistics::new()),
            watermark: Cell::new(watermark),
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn queue(&self) -> &JobQueue {
        &self.queue
    }

    pub fn watermark(&self) -> DateTime<Utc> {
        self.watermark.get()
    }

    pub fn set_watermark(&self, watermark: DateTime<Utc>) {
        self.watermark.set(watermark);
    }

    pub fn is_processed(&self, item_id: &str) -> bool {
        self.ledger.borrow().is_processed(item_id)
    }

    pub fn processed_count(&self) -> usize {
        self.ledger.borrow().processed_count()
    }

    pub fn fingerprint(&self, item_id: &str) -> Option<String> {
        self.ledger.borrow().fingerprint(item_id).map(str::to_string)
    }

    /// Record a completed item directly, bypassing the processor.
    pub fn mark_processed(&self, item_id: &str, fingerprint: String) {
        self.ledger.borrow_mut().mark_processed(item_id, fingerprint);
    }

    /// Copy of the current counters.
    pub fn statistics(&self) -> Statistics {
        let mut stats = self.stats.borrow().clone();
        stats.dropped = self.queue.dropped();
        stats
    }

    /// Load the processed set from the store.
    ///
    /// An item counts as processed only when both result tables hold a record
    /// for it. Items with a single stage persisted are left for the monitor to
    /// rediscover.
    pub async fn reconcile(&self) -> Result<Reconciliation> {
        let intelligence = self.store.result_records(AnalysisStage::Intelligence).await?;
        let compliance: HashMap<String, Option<String>> = self
            .store
            .result_records(AnalysisStage::Compliance)
            .await?
            .into_iter()
            .map(|record| (record.item_id, record.fingerprint))
            .collect();

        let mut outcome = Reconciliation::default();
        let mut ledger = self.ledger.borrow_mut();

        for record in &intelligence {
            let Some(compliance_fingerprint) = compliance.get(&record.item_id) else {
                outcome.partial += 1;
                continue;
            };

            outcome.processed += 1;
            let agreed = match (&record.fingerprint, compliance_fingerprint) {
                (Some(a), Some(b)) if a == b => Some(a.clone()),
                _ => None,
            };
            if agreed.is_some() {
                outcome.fingerprints_seeded += 1;
            }
            ledger.restore(&record.item_id, agreed);
        }
        outcome.partial += compliance.len().saturating_sub(outcome.processed);
        drop(ledger);

        log::info!(
            "Reconciled {} processed items ({} with fingerprints, {} partial)",
            outcome.processed,
            outcome.fingerprints_seeded,
            outcome.partial
        );
        Ok(outcome)
    }

    /// Status as seen from inside the scheduler.
    pub fn snapshot(&self, is_running: bool) -> StatusSnapshot {
        StatusSnapshot {
            is_running,
            processed_count: self.processed_count(),
            queue_depth: self.queue.len(),
            unfinished_jobs: self.queue.unfinished(),
            statistics: self.statistics().snapshot(),
            configuration: ConfigSnapshot::from(&self.config),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AnalysisRecord;
    use crate::pipeline::test_support::{BrokenStore, context, ok_analyzers};
    use crate::storage::MemoryStorage;

    async fn persist(store: &MemoryStorage, id: &str, stage: AnalysisStage, fingerprint: &str) {
        store
            .upsert_result(&AnalysisRecord::new(id, stage, fingerprint, serde_json::json!({})))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_reconcile_requires_both_stages() {
        let store = Arc::new(MemoryStorage::new());
        persist(&store, "both", AnalysisStage::Intelligence, "f1").await;
        persist(&store, "both", AnalysisStage::Compliance, "f1").await;
        persist(&store, "stage1-only", AnalysisStage::Intelligence, "f2").await;
        persist(&store, "stage2-only", AnalysisStage::Compliance, "f3").await;

        let ctx = context(store, ok_analyzers());
        let outcome = ctx.reconcile().await.unwrap();

        assert_eq!(outcome.processed, 1);
        assert_eq!(outcome.partial, 2);
        assert!(ctx.is_processed("both"));
        assert!(!ctx.is_processed("stage1-only"));
        assert!(!ctx.is_processed("stage2-only"));
        assert_eq!(ctx.fingerprint("both").as_deref(), Some("f1"));
    }

    #[tokio::test]
    async fn test_reconcile_skips_disagreeing_fingerprints() {
        let store = Arc::new(MemoryStorage::new());
        persist(&store, "torn", AnalysisStage::Intelligence, "new").await;
        persist(&store, "torn", AnalysisStage::Compliance, "old").await;

        let ctx = context(store, ok_analyzers());
        let outcome = ctx.reconcile().await.unwrap();

        assert_eq!(outcome.fingerprints_seeded, 0);
        assert!(ctx.is_processed("torn"));
        assert_eq!(ctx.fingerprint("torn"), None);
    }

    #[tokio::test]
    async fn test_reconcile_propagates_store_errors() {
        let ctx = context(Arc::new(BrokenStore), ok_analyzers());
        assert!(ctx.reconcile().await.is_err());
        assert_eq!(ctx.processed_count(), 0);
    }

    #[test]
    fn test_initial_watermark_uses_lookback() {
        let ctx = context(Arc::new(MemoryStorage::new()), ok_analyzers());
        let age = Utc::now() - ctx.watermark();
        assert!(age >= chrono::Duration::seconds(3599));
        assert!(age <= chrono::Duration::seconds(3601));
    }

    #[test]
    fn test_out_of_range_lookback_starts_at_earliest_time() {
        let mut config = crate::pipeline::test_support::test_config();
        config.initial_lookback_secs = 10_000_000_000_000;
        let ctx = PipelineContext::new(config, Arc::new(MemoryStorage::new()), ok_analyzers());
        assert_eq!(ctx.watermark(), DateTime::<Utc>::MIN_UTC);
    }

    #[test]
    fn test_snapshot_reports_queue_drops() {
        let ctx = context(Arc::new(MemoryStorage::new()), ok_analyzers());
        let snapshot = ctx.snapshot(true);
        assert!(snapshot.is_running);
        assert_eq!(snapshot.statistics.dropped, 0);
        assert_eq!(snapshot.configuration.max_queue_size, 100);
    }
}
