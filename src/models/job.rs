//! Processing jobs handed from the monitor to the processor.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Why a job was created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobKind {
    /// First discovery of an item
    New,
    /// Item text changed after it was processed
    Update,
    /// Re-attempt after a stage failure
    Retry,
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            JobKind::New => "new",
            JobKind::Update => "update",
            JobKind::Retry => "retry",
        };
        f.write_str(s)
    }
}

/// One unit of work: run both analyzer stages over one content version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessingJob {
    pub item_id: String,
    pub content: String,
    pub job_kind: JobKind,
    pub created_at: DateTime<Utc>,
    pub retry_count: u32,
    pub max_retries: u32,
}

impl ProcessingJob {
    pub fn new(
        item_id: impl Into<String>,
        content: impl Into<String>,
        job_kind: JobKind,
        max_retries: u32,
    ) -> Self {
        Self {
            item_id: item_id.into(),
            content: content.into(),
            job_kind,
            created_at: Utc::now(),
            retry_count: 0,
            max_retries,
        }
    }

    /// Whether another attempt is allowed after a failure.
    pub fn can_retry(&self) -> bool {
        self.retry_count < self.max_retries
    }

    /// Consume this job and produce its next attempt.
    pub fn into_retry(mut self) -> Self {
        self.retry_count += 1;
        self.job_kind = JobKind::Retry;
        self
    }
}
