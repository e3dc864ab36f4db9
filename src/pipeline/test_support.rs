//! Stub analyzers and stores shared by the pipeline tests.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::json;

use crate::error::{AppError, Result};
use crate::models::{Advisory, AnalysisRecord, AnalysisStage, PipelineConfig};
use crate::pipeline::PipelineContext;
use crate::services::{Analyzer, AnalyzerSet};
use crate::storage::{AdvisoryStore, MemoryStorage};

/// Echoes the text back; fails the first `failures` calls.
pub struct ScriptedAnalyzer {
    stage: AnalysisStage,
    failures: usize,
    calls: AtomicUsize,
}

impl ScriptedAnalyzer {
    pub fn ok(stage: AnalysisStage) -> Arc<Self> {
        Self::failing(stage, 0)
    }

    pub fn failing(stage: AnalysisStage, failures: usize) -> Arc<Self> {
        Arc::new(Self {
            stage,
            failures,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn always_failing(stage: AnalysisStage) -> Arc<Self> {
        Self::failing(stage, usize::MAX)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Analyzer for ScriptedAnalyzer {
    fn stage(&self) -> AnalysisStage {
        self.stage
    }

    async fn analyze(&self, item_id: &str, text: &str) -> Result<serde_json::Value> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call < self.failures {
            return Err(AppError::analyzer(self.stage, item_id, "scripted failure"));
        }
        Ok(json!({ "stage": self.stage.as_str(), "text": text }))
    }
}

pub fn analyzers(
    intelligence: Arc<ScriptedAnalyzer>,
    compliance: Arc<ScriptedAnalyzer>,
) -> AnalyzerSet {
    AnalyzerSet::new(intelligence, compliance)
}

pub fn ok_analyzers() -> AnalyzerSet {
    analyzers(
        ScriptedAnalyzer::ok(AnalysisStage::Intelligence),
        ScriptedAnalyzer::ok(AnalysisStage::Compliance),
    )
}

pub fn test_config() -> PipelineConfig {
    PipelineConfig {
        poll_interval_ms: 10,
        batch_size: 50,
        max_queue_size: 100,
        max_retries: 3,
        initial_lookback_secs: 3600,
        drain_timeout_ms: 200,
    }
}

pub fn context(store: Arc<dyn AdvisoryStore>, analyzers: AnalyzerSet) -> PipelineContext {
    PipelineContext::new(test_config(), store, analyzers)
}

pub async fn store_with(items: &[(&str, &str)]) -> Arc<MemoryStorage> {
    let store = Arc::new(MemoryStorage::new());
    let base = Utc::now() - chrono::Duration::minutes(5);
    for (i, (id, text)) in items.iter().enumerate() {
        store
            .put_item(Advisory::new(*id, *text, base + chrono::Duration::seconds(i as i64)))
            .await
            .unwrap();
    }
    store
}

/// Store whose every call fails.
pub struct BrokenStore;

#[async_trait]
impl AdvisoryStore for BrokenStore {
    async fn items_since(&self, _: DateTime<Utc>, _: usize) -> Result<Vec<Advisory>> {
        Err(AppError::store("items_since", "connection refused"))
    }

    async fn item_text(&self, _: &str) -> Result<Option<String>> {
        Err(AppError::store("item_text", "connection refused"))
    }

    async fn put_item(&self, _: Advisory) -> Result<()> {
        Err(AppError::store("put_item", "connection refused"))
    }

    async fn upsert_result(&self, _: &AnalysisRecord) -> Result<()> {
        Err(AppError::store("upsert_result", "connection refused"))
    }

    async fn result(&self, _: AnalysisStage, _: &str) -> Result<Option<AnalysisRecord>> {
        Err(AppError::store("result", "connection refused"))
    }

    async fn result_records(&self, _: AnalysisStage) -> Result<Vec<AnalysisRecord>> {
        Err(AppError::store("result_records", "connection refused"))
    }
}
