//! Local filesystem storage implementation.
//!
//! Keeps items and stage results as pretty-printed JSON files under a root
//! directory. Every write goes to a temp file first and is renamed into
//! place, so a reader never sees a half-written file.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Serialize, de::DeserializeOwned};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::error::{AppError, Result};
use crate::models::{Advisory, AnalysisRecord, AnalysisStage};
use crate::storage::{AdvisoryStore, select_since};

const ITEMS_KEY: &str = "items.json";

/// Local filesystem storage backend.
pub struct LocalStorage {
    root_dir: PathBuf,
    // Serializes read-modify-write cycles within this process.
    write_lock: Mutex<()>,
}

impl LocalStorage {
    /// Create a new LocalStorage rooted at the given directory.
    pub fn new(root_dir: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root_dir.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn root_dir(&self) -> &Path {
        &self.root_dir
    }

    /// Get the full path for a relative key.
    fn path(&self, key: &str) -> PathBuf {
        self.root_dir.join(key)
    }

    /// Ensure parent directory exists.
    async fn ensure_dir(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        Ok(())
    }

    /// Write bytes atomically (write to temp, then rename).
    async fn write_bytes(&self, key: &str, bytes: &[u8]) -> Result<()> {
        let path = self.path(key);
        self.ensure_dir(&path).await?;

        let tmp = path.with_extension("tmp");
        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(bytes).await?;
        file.flush().await?;
        drop(file);

        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }

    /// Write JSON data.
    async fn write_json<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(value)?;
        self.write_bytes(key, &bytes).await
    }

    /// Read bytes, returning None if file doesn't exist.
    async fn read_bytes(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let path = self.path(key);
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AppError::Io(e)),
        }
    }

    /// Read JSON data.
    async fn read_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.read_bytes(key).await? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Results key for a given stage.
    fn results_key(stage: AnalysisStage) -> String {
        format!("results/{}.json", stage.as_str())
    }

    async fn load_items(&self) -> Result<Vec<Advisory>> {
        Ok(self.read_json(ITEMS_KEY).await?.unwrap_or_default())
    }

    async fn load_results(&self, stage: AnalysisStage) -> Result<BTreeMap<String, AnalysisRecord>> {
        Ok(self
            .read_json(&Self::results_key(stage))
            .await?
            .unwrap_or_default())
    }

    /// All stored items, in file order.
    pub async fn items(&self) -> Result<Vec<Advisory>> {
        self.load_items().await
    }
}

#[async_trait]
impl AdvisoryStore for LocalStorage {
    async fn items_since(&self, watermark: DateTime<Utc>, limit: usize) -> Result<Vec<Advisory>> {
        let items = self.load_items().await?;
        Ok(select_since(items.iter(), watermark, limit))
    }

    async fn item_text(&self, item_id: &str) -> Result<Option<String>> {
        let items = self.load_items().await?;
        Ok(items
            .into_iter()
            .find(|item| item.id == item_id)
            .map(|item| item.text))
    }

    async fn items_text(&self, item_ids: &[String]) -> Result<HashMap<String, String>> {
        let wanted: HashSet<&str> = item_ids.iter().map(String::as_str).collect();
        Ok(self
            .load_items()
            .await?
            .into_iter()
            .filter(|item| wanted.contains(item.id.as_str()))
            .map(|item| (item.id, item.text))
            .collect())
    }

    async fn put_item(&self, item: Advisory) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut items = self.load_items().await?;

        match items.iter_mut().find(|existing| existing.id == item.id) {
            Some(existing) => {
                log::debug!("Replacing text of item {}", item.id);
                existing.text = item.text;
            }
            None => items.push(item),
        }

        self.write_json(ITEMS_KEY, &items).await
    }

    async fn upsert_result(&self, record: &AnalysisRecord) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let key = Self::results_key(record.stage);
        let mut results = self.load_results(record.stage).await?;
        results.insert(record.item_id.clone(), record.clone());
        self.write_json(&key, &results).await
    }

    async fn result(&self, stage: AnalysisStage, item_id: &str) -> Result<Option<AnalysisRecord>> {
        let mut results = self.load_results(stage).await?;
        Ok(results.remove(item_id))
    }

    async fn result_records(&self, stage: AnalysisStage) -> Result<Vec<AnalysisRecord>> {
        Ok(self.load_results(stage).await?.into_values().collect())
    }
}
