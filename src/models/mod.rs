// src/models/mod.rs

//! Domain models for the advisory pipeline.
//!
//! This module contains all data structures used throughout the application,
//! organized by their primary purpose.

mod advisory;
mod analysis;
mod config;
mod job;
mod stats;

// Re-export all public types
pub use advisory::Advisory;
pub use analysis::{AnalysisRecord, AnalysisStage};
pub use config::{
    AnalyzerConfig, Config, KeywordRule, LoggingConfig, PipelineConfig, StorageConfig,
};
pub use job::{JobKind, ProcessingJob};
pub use stats::{ConfigSnapshot, Statistics, StatisticsSnapshot, StatusSnapshot};
