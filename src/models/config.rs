//! Application configuration structures.

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Polling, queueing and retry behavior
    #[serde(default)]
    pub pipeline: PipelineConfig,

    /// Where the local store keeps its files
    #[serde(default)]
    pub storage: StorageConfig,

    /// Log verbosity
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Keyword rules for the built-in analyzers
    #[serde(default)]
    pub analyzers: AnalyzerConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration or return default if loading fails.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(&path).unwrap_or_else(|e| {
            log::warn!(
                "Config load failed from {:?}: {}. Using defaults.",
                path.as_ref(),
                e
            );
            Self::default()
        })
    }

    /// Serialize configuration back to TOML.
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        self.pipeline.validate()?;
        if self.storage.root_dir.trim().is_empty() {
            return Err(AppError::validation("storage.root_dir is empty"));
        }
        if self.analyzers.intelligence.is_empty() {
            return Err(AppError::validation("No intelligence rules defined"));
        }
        if self.analyzers.compliance.is_empty() {
            return Err(AppError::validation("No compliance rules defined"));
        }
        Ok(())
    }
}

/// Pipeline behavior. Fixed for the lifetime of a running pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Sleep between monitor scans; also the processor's dequeue timeout
    #[serde(default = "defaults::poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Maximum number of new items fetched per scan
    #[serde(default = "defaults::batch_size")]
    pub batch_size: usize,

    /// Queue bound; jobs beyond it are dropped
    #[serde(default = "defaults::max_queue_size")]
    pub max_queue_size: usize,

    /// Requeues allowed per job before it counts as failed
    #[serde(default = "defaults::max_retries")]
    pub max_retries: u32,

    /// How far back the first scan after boot looks for new items
    #[serde(default = "defaults::initial_lookback_secs")]
    pub initial_lookback_secs: u64,

    /// Upper bound on the shutdown drain
    #[serde(default = "defaults::drain_timeout_ms")]
    pub drain_timeout_ms: u64,
}

/// Ten years.
const MAX_LOOKBACK_SECS: u64 = 10 * 366 * 24 * 60 * 60;

impl PipelineConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn drain_timeout(&self) -> Duration {
        Duration::from_millis(self.drain_timeout_ms)
    }

    pub fn initial_lookback(&self) -> chrono::Duration {
        i64::try_from(self.initial_lookback_secs)
            .ok()
            .and_then(chrono::Duration::try_seconds)
            .unwrap_or(chrono::Duration::MAX)
    }

    pub fn validate(&self) -> Result<()> {
        if self.poll_interval_ms == 0 {
            return Err(AppError::validation("pipeline.poll_interval_ms must be > 0"));
        }
        if self.batch_size == 0 {
            return Err(AppError::validation("pipeline.batch_size must be > 0"));
        }
        if self.max_queue_size == 0 {
            return Err(AppError::validation("pipeline.max_queue_size must be > 0"));
        }
        if self.initial_lookback_secs > MAX_LOOKBACK_SECS {
            return Err(AppError::validation(format!(
                "pipeline.initial_lookback_secs must be <= {MAX_LOOKBACK_SECS}"
            )));
        }
        Ok(())
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: defaults::poll_interval_ms(),
            batch_size: defaults::batch_size(),
            max_queue_size: defaults::max_queue_size(),
            max_retries: defaults::max_retries(),
            initial_lookback_secs: defaults::initial_lookback_secs(),
            drain_timeout_ms: defaults::drain_timeout_ms(),
        }
    }
}

/// Local storage settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory holding items.json and results/
    #[serde(default = "defaults::root_dir")]
    pub root_dir: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root_dir: defaults::root_dir(),
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// One of: debug, info, warn, error
    #[serde(default = "defaults::log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: defaults::log_level(),
        }
    }
}

/// Keyword rules for both analyzer stages.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzerConfig {
    #[serde(default = "defaults::intelligence_rules")]
    pub intelligence: Vec<KeywordRule>,

    #[serde(default = "defaults::compliance_rules")]
    pub compliance: Vec<KeywordRule>,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            intelligence: defaults::intelligence_rules(),
            compliance: defaults::compliance_rules(),
        }
    }
}

/// A category tagged when any of its patterns matches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeywordRule {
    /// Category name reported in the analysis payload
    pub category: String,

    /// Case-insensitive regular expressions
    pub patterns: Vec<String>,

    /// Severity contribution (1-5)
    #[serde(default = "defaults::weight")]
    pub weight: u8,
}

mod defaults {
    use super::KeywordRule;

    // Pipeline defaults
    pub fn poll_interval_ms() -> u64 {
        30_000
    }
    pub fn batch_size() -> usize {
        50
    }
    pub fn max_queue_size() -> usize {
        100
    }
    pub fn max_retries() -> u32 {
        3
    }
    pub fn initial_lookback_secs() -> u64 {
        24 * 60 * 60
    }
    pub fn drain_timeout_ms() -> u64 {
        5_000
    }

    // Storage defaults
    pub fn root_dir() -> String {
        "storage".into()
    }

    // Logging defaults
    pub fn log_level() -> String {
        "info".into()
    }

    pub fn weight() -> u8 {
        1
    }

    fn rule(category: &str, weight: u8, patterns: &[&str]) -> KeywordRule {
        KeywordRule {
            category: category.to_string(),
            patterns: patterns.iter().map(|p| p.to_string()).collect(),
            weight,
        }
    }

    pub fn intelligence_rules() -> Vec<KeywordRule> {
        vec![
            rule("conflict", 5, &[r"\bwar\b", r"armed conflict", r"military"]),
            rule("terrorism", 5, &[r"terror", r"bomb", r"attack"]),
            rule("civil_unrest", 3, &[r"protest", r"unrest", r"demonstration", r"riot"]),
            rule("health", 3, &[r"outbreak", r"epidemic", r"cholera", r"quarantine"]),
            rule("natural_disaster", 4, &[r"earthquake", r"flood", r"hurricane", r"typhoon", r"wildfire"]),
            rule("evacuation", 5, &[r"evacuat", r"leave immediately", r"do not travel"]),
        ]
    }

    pub fn compliance_rules() -> Vec<KeywordRule> {
        vec![
            rule("entry_requirements", 2, &[r"\bvisa\b", r"entry requirement", r"passport"]),
            rule("sanctions", 4, &[r"sanction", r"embargo"]),
            rule("border_control", 3, &[r"border (closure|closed)", r"checkpoint"]),
            rule("local_law", 2, &[r"curfew", r"state of emergency", r"martial law"]),
        ]
    }
}
