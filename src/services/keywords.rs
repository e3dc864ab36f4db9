// src/services/keywords.rs

//! Rule-based analyzer.
//!
//! Tags an advisory with every configured category whose patterns match and
//! reports a severity equal to the highest matching weight.

use async_trait::async_trait;
use regex::{Regex, RegexBuilder};
use serde_json::json;

use crate::error::{AppError, Result};
use crate::models::{AnalysisStage, KeywordRule};
use crate::services::Analyzer;

struct CompiledRule {
    category: String,
    weight: u8,
    patterns: Vec<Regex>,
}

/// Analyzer driven by [`KeywordRule`]s.
pub struct KeywordAnalyzer {
    stage: AnalysisStage,
    rules: Vec<CompiledRule>,
}

impl KeywordAnalyzer {
    pub fn new(stage: AnalysisStage, rules: &[KeywordRule]) -> Result<Self> {
        let rules = rules
            .iter()
            .map(|rule| {
                let patterns = rule
                    .patterns
                    .iter()
                    .map(|p| RegexBuilder::new(p).case_insensitive(true).build())
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(CompiledRule {
                    category: rule.category.clone(),
                    weight: rule.weight,
                    patterns,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { stage, rules })
    }
}

#[async_trait]
impl Analyzer for KeywordAnalyzer {
    fn stage(&self) -> AnalysisStage {
        self.stage
    }

    async fn analyze(&self, item_id: &str, text: &str) -> Result<serde_json::Value> {
        if text.trim().is_empty() {
            return Err(AppError::analyzer(self.stage, item_id, "empty text"));
        }

        let mut categories = Vec::new();
        let mut matches = Vec::new();
        let mut severity = 0u8;

        for rule in &self.rules {
            let hits: Vec<&str> = rule
                .patterns
                .iter()
                .filter_map(|p| p.find(text).map(|m| m.as_str()))
                .collect();
            if hits.is_empty() {
                continue;
            }
            categories.push(rule.category.as_str());
            matches.extend(hits);
            severity = severity.max(rule.weight);
        }

        log::debug!(
            "{} analysis of {}: {} categories, severity {}",
            self.stage,
            item_id,
            categories.len(),
            severity
        );

        Ok(json!({
            "categories": categories,
            "matches": matches,
            "severity": severity,
        }))
    }
}
