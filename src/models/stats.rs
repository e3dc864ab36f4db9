//! Running counters and the status snapshot returned to the host.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::PipelineConfig;

/// Counters mutated by the processor task. Reset on every start.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Statistics {
    /// Every dequeued attempt, whatever its outcome
    pub total_processed: u64,
    pub successful: u64,
    pub failed: u64,
    /// `new` jobs for items that were already processed
    pub skipped: u64,
    /// Attempts requeued after a stage failure
    pub retried: u64,
    /// Jobs rejected because the queue was full
    pub dropped: u64,
    pub start_time: DateTime<Utc>,
}

impl Statistics {
    pub fn new() -> Self {
        Self {
            total_processed: 0,
            successful: 0,
            failed: 0,
            skipped: 0,
            retried: 0,
            dropped: 0,
            start_time: Utc::now(),
        }
    }

    pub fn runtime_minutes(&self) -> f64 {
        let elapsed = Utc::now() - self.start_time;
        elapsed.num_milliseconds().max(0) as f64 / 60_000.0
    }

    pub fn snapshot(&self) -> StatisticsSnapshot {
        StatisticsSnapshot {
            total_processed: self.total_processed,
            successful: self.successful,
            failed: self.failed,
            skipped: self.skipped,
            retried: self.retried,
            dropped: self.dropped,
            start_time: self.start_time,
            runtime_minutes: self.runtime_minutes(),
        }
    }
}

impl Default for Statistics {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time copy of [`Statistics`] with the derived runtime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatisticsSnapshot {
    pub total_processed: u64,
    pub successful: u64,
    pub failed: u64,
    pub skipped: u64,
    pub retried: u64,
    pub dropped: u64,
    pub start_time: DateTime<Utc>,
    pub runtime_minutes: f64,
}

/// Configuration values reported with the status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigSnapshot {
    pub poll_interval_ms: u64,
    pub batch_size: usize,
    pub max_queue_size: usize,
    pub max_retries: u32,
}

impl From<&PipelineConfig> for ConfigSnapshot {
    fn from(config: &PipelineConfig) -> Self {
        Self {
            poll_interval_ms: config.poll_interval_ms,
            batch_size: config.batch_size,
            max_queue_size: config.max_queue_size,
            max_retries: config.max_retries,
        }
    }
}

/// Everything the host can observe about the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusSnapshot {
    pub is_running: bool,
    pub processed_count: usize,
    pub queue_depth: usize,
    /// Jobs enqueued or dequeued but not yet marked done
    pub unfinished_jobs: usize,
    pub statistics: StatisticsSnapshot,
    pub configuration: ConfigSnapshot,
}

impl StatusSnapshot {
    /// Snapshot for a pipeline that has never run.
    pub fn idle(config: &PipelineConfig) -> Self {
        Self {
            is_running: false,
            processed_count: 0,
            queue_depth: 0,
            unfinished_jobs: 0,
            statistics: Statistics::new().snapshot(),
            configuration: ConfigSnapshot::from(config),
        }
    }
}
