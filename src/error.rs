// src/error.rs

//! Unified error handling for the advisory pipeline.

use std::fmt;

use thiserror::Error;

use crate::models::AnalysisStage;

/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, AppError>;

/// Unified application error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing failed
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// TOML serialization failed
    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    /// Keyword rule failed to compile
    #[error("Invalid pattern: {0}")]
    Regex(#[from] regex::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Data validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Store access failed
    #[error("Store error during {context}: {message}")]
    Store { context: String, message: String },

    /// An analyzer stage rejected an item
    #[error("{stage} analysis failed for {item_id}: {message}")]
    Analyzer {
        stage: AnalysisStage,
        item_id: String,
        message: String,
    },

    /// Worker thread or scheduler failure
    #[error("Lifecycle error: {0}")]
    Lifecycle(String),
}

impl AppError {
    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create a store error with context.
    pub fn store(context: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Store {
            context: context.into(),
            message: message.to_string(),
        }
    }

    /// Create an analyzer error for one stage and item.
    pub fn analyzer(
        stage: AnalysisStage,
        item_id: impl Into<String>,
        message: impl fmt::Display,
    ) -> Self {
        Self::Analyzer {
            stage,
            item_id: item_id.into(),
            message: message.to_string(),
        }
    }

    /// Create a lifecycle error.
    pub fn lifecycle(message: impl fmt::Display) -> Self {
        Self::Lifecycle(message.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_analyzer_error_display() {
        let err = AppError::analyzer(AnalysisStage::Intelligence, "a1", "timeout");
        assert_eq!(
            err.to_string(),
            "intelligence analysis failed for a1: timeout"
        );
    }

    #[test]
    fn test_store_error_display() {
        let err = AppError::store("upsert", "disk full");
        assert_eq!(err.to_string(), "Store error during upsert: disk full");
    }
}
