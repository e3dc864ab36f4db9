//! In-process storage backend.
//!
//! Used by embedding hosts that already own their persistence and by tests.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::{AppError, Result};
use crate::models::{Advisory, AnalysisRecord, AnalysisStage};
use crate::storage::{AdvisoryStore, select_since};

#[derive(Debug, Default)]
struct Tables {
    items: Vec<Advisory>,
    results: HashMap<(AnalysisStage, String), AnalysisRecord>,
}

/// Mutex-guarded in-memory store.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    tables: Mutex<Tables>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn tables(&self) -> Result<MutexGuard<'_, Tables>> {
        self.tables
            .lock()
            .map_err(|e| AppError::store("lock", e))
    }

    /// Number of stored items.
    pub fn item_count(&self) -> usize {
        self.tables().map(|t| t.items.len()).unwrap_or(0)
    }
}

#[async_trait]
impl AdvisoryStore for MemoryStorage {
    async fn items_since(&self, watermark: DateTime<Utc>, limit: usize) -> Result<Vec<Advisory>> {
        let tables = self.tables()?;
        Ok(select_since(tables.items.iter(), watermark, limit))
    }

    async fn item_text(&self, item_id: &str) -> Result<Option<String>> {
        let tables = self.tables()?;
        Ok(tables
            .items
            .iter()
            .find(|item| item.id == item_id)
            .map(|item| item.text.clone()))
    }

    async fn put_item(&self, item: Advisory) -> Result<()> {
        let mut tables = self.tables()?;
        match tables.items.iter_mut().find(|existing| existing.id == item.id) {
            Some(existing) => existing.text = item.text,
            None => tables.items.push(item),
        }
        Ok(())
    }

    async fn upsert_result(&self, record: &AnalysisRecord) -> Result<()> {
        let mut tables = self.tables()?;
        tables
            .results
            .insert((record.stage, record.item_id.clone()), record.clone());
        Ok(())
    }

    async fn result(&self, stage: AnalysisStage, item_id: &str) -> Result<Option<AnalysisRecord>> {
        let tables = self.tables()?;
        Ok(tables.results.get(&(stage, item_id.to_string())).cloned())
    }

    async fn result_records(&self, stage: AnalysisStage) -> Result<Vec<AnalysisRecord>> {
        let tables = self.tables()?;
        Ok(tables
            .results
            .values()
            .filter(|record| record.stage == stage)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_and_read_item() {
        let store = MemoryStorage::new();
        store
            .put_item(Advisory::new("x", "Flooding in the north", Utc::now()))
            .await
            .unwrap();
        store
            .put_item(Advisory::new("x", "Flooding receding", Utc::now()))
            .await
            .unwrap();

        assert_eq!(store.item_count(), 1);
        assert_eq!(
            store.item_text("x").await.unwrap().as_deref(),
            Some("Flooding receding")
        );
        assert!(store.item_text("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_results_are_separated_by_stage() {
        let store = MemoryStorage::new();
        let payload = serde_json::json!({});
        store
            .upsert_result(&AnalysisRecord::new("x", AnalysisStage::Intelligence, "f", payload.clone()))
            .await
            .unwrap();

        assert!(store.result(AnalysisStage::Intelligence, "x").await.unwrap().is_some());
        assert!(store.result(AnalysisStage::Compliance, "x").await.unwrap().is_none());
        assert!(store.result_records(AnalysisStage::Compliance).await.unwrap().is_empty());
    }
}
