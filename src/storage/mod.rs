//! Storage abstractions for advisories and analysis results.
//!
//! The pipeline needs only a narrow contract from its store: range reads of
//! newly arrived items, point reads of an item's current text, and an
//! idempotent upsert per analyzer stage.
//!
//! ## Directory Structure (LocalStorage)
//!
//! ```text
//! storage/
//! ├── config.toml               # Pipeline configuration
//! ├── items.json                # Source advisories
//! └── results/
//!     ├── intelligence.json     # Stage 1 records keyed by item id
//!     └── compliance.json       # Stage 2 records keyed by item id
//! ```

pub mod local;
pub mod memory;

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::models::{Advisory, AnalysisRecord, AnalysisStage};

// Re-export for convenience
pub use local::LocalStorage;
pub use memory::MemoryStorage;

/// Trait for advisory storage backends.
#[async_trait]
pub trait AdvisoryStore: Send + Sync {
    /// Items that arrived strictly after `watermark`, oldest first, at most `limit`.
    async fn items_since(&self, watermark: DateTime<Utc>, limit: usize) -> Result<Vec<Advisory>>;

    /// Current text of an item, `None` if it no longer exists.
    async fn item_text(&self, item_id: &str) -> Result<Option<String>>;

    /// Current text of each listed item that still exists, keyed by id.
    ///
    /// The default issues one point read per id; backends that load the
    /// whole table anyway should answer in a single pass.
    async fn items_text(&self, item_ids: &[String]) -> Result<HashMap<String, String>> {
        let mut texts = HashMap::with_capacity(item_ids.len());
        for item_id in item_ids {
            if let Some(text) = self.item_text(item_id).await? {
                texts.insert(item_id.clone(), text);
            }
        }
        Ok(texts)
    }

    /// Insert or replace a source item.
    async fn put_item(&self, item: Advisory) -> Result<()>;

    /// Insert or replace the record for `(record.stage, record.item_id)`.
    async fn upsert_result(&self, record: &AnalysisRecord) -> Result<()>;

    /// Point read of one stage's record.
    async fn result(&self, stage: AnalysisStage, item_id: &str) -> Result<Option<AnalysisRecord>>;

    /// Every record of one stage.
    async fn result_records(&self, stage: AnalysisStage) -> Result<Vec<AnalysisRecord>>;
}

/// Oldest-first, strictly-after-watermark, capped selection shared by the backends.
pub(crate) fn select_since<'a>(
    items: impl Iterator<Item = &'a Advisory>,
    watermark: DateTime<Utc>,
    limit: usize,
) -> Vec<Advisory> {
    let mut selected: Vec<Advisory> = items
        .filter(|item| item.arrival_time > watermark)
        .cloned()
        .collect();
    selected.sort_by(|a, b| a.arrival_time.cmp(&b.arrival_time).then_with(|| a.id.cmp(&b.id)));
    selected.truncate(limit);
    selected
}
