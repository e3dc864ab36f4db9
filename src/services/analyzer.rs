// src/services/analyzer.rs

//! Analyzer contract.
//!
//! An analyzer turns one item's text into a structured result or fails.
//! The pipeline treats the result as opaque JSON and only persists it.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{AnalysisStage, AnalyzerConfig};
use crate::services::KeywordAnalyzer;

/// One analysis stage.
#[async_trait]
pub trait Analyzer: Send + Sync {
    /// Which result table this analyzer's output belongs to.
    fn stage(&self) -> AnalysisStage;

    /// Analyze `text`. Any error is retried within the job's budget.
    async fn analyze(&self, item_id: &str, text: &str) -> Result<serde_json::Value>;
}

/// The two stages run, in order, for every job.
#[derive(Clone)]
pub struct AnalyzerSet {
    pub intelligence: Arc<dyn Analyzer>,
    pub compliance: Arc<dyn Analyzer>,
}

impl AnalyzerSet {
    pub fn new(intelligence: Arc<dyn Analyzer>, compliance: Arc<dyn Analyzer>) -> Self {
        Self {
            intelligence,
            compliance,
        }
    }

    /// Keyword analyzers built from configuration.
    pub fn from_config(config: &AnalyzerConfig) -> Result<Self> {
        Ok(Self::new(
            Arc::new(KeywordAnalyzer::new(
                AnalysisStage::Intelligence,
                &config.intelligence,
            )?),
            Arc::new(KeywordAnalyzer::new(
                AnalysisStage::Compliance,
                &config.compliance,
            )?),
        ))
    }

    /// Stages in execution order.
    pub fn stages(&self) -> [&Arc<dyn Analyzer>; 2] {
        [&self.intelligence, &self.compliance]
    }
}
