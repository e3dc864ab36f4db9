//! Persisted analyzer output.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The two analyzer stages, run in this order for every job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisStage {
    /// Content intelligence (threat categories, severity)
    Intelligence,
    /// Legal and compliance implications
    Compliance,
}

impl AnalysisStage {
    pub const ALL: [AnalysisStage; 2] = [AnalysisStage::Intelligence, AnalysisStage::Compliance];

    pub fn as_str(&self) -> &'static str {
        match self {
            AnalysisStage::Intelligence => "intelligence",
            AnalysisStage::Compliance => "compliance",
        }
    }
}

impl fmt::Display for AnalysisStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of one stage for one item, upserted by `(stage, item_id)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisRecord {
    pub item_id: String,
    pub stage: AnalysisStage,

    /// Fingerprint of the content this record was computed from
    #[serde(default)]
    pub fingerprint: Option<String>,

    /// Analyzer-defined structured output
    pub payload: serde_json::Value,

    pub analyzed_at: DateTime<Utc>,
}

impl AnalysisRecord {
    pub fn new(
        item_id: impl Into<String>,
        stage: AnalysisStage,
        fingerprint: impl Into<String>,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            item_id: item_id.into(),
            stage,
            fingerprint: Some(fingerprint.into()),
            payload,
            analyzed_at: Utc::now(),
        }
    }
}
