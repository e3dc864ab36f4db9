// src/utils/log.rs

//! Report formatting for CLI output.
//!
//! Everything goes through the `log` facade so reports share the timestamps
//! and filtering configured by the binary.

use crate::models::{AnalysisRecord, StatusSnapshot};

const RULE_WIDTH: usize = 60;

/// Log a header
pub fn header(title: &str) {
    let border = "═".repeat(RULE_WIDTH);
    ::log::info!("{}", border);
    ::log::info!("  {}", title);
    ::log::info!("{}", border);
}

/// Log a separator line
pub fn separator() {
    ::log::info!("{}", "─".repeat(RULE_WIDTH));
}

/// Log a summary section
pub fn summary(title: &str, items: &[(&str, String)]) {
    ::log::info!("[SUMMARY] {}", title);
    for (key, value) in items {
        ::log::info!("    {}: {}", key, value);
    }
}

/// Key/value lines describing a status snapshot.
pub fn status_items(status: &StatusSnapshot) -> Vec<(&'static str, String)> {
    let stats = &status.statistics;
    vec![
        ("running", status.is_running.to_string()),
        ("processed items", status.processed_count.to_string()),
        ("queue depth", status.queue_depth.to_string()),
        ("unfinished jobs", status.unfinished_jobs.to_string()),
        (
            "attempts",
            format!(
                "{} total, {} ok, {} failed, {} skipped, {} retried",
                stats.total_processed, stats.successful, stats.failed, stats.skipped, stats.retried
            ),
        ),
        ("dropped jobs", stats.dropped.to_string()),
        ("runtime", format!("{:.1} min", stats.runtime_minutes)),
    ]
}

/// Log a status snapshot.
pub fn status(status: &StatusSnapshot) {
    summary("Pipeline status", &status_items(status));
}

/// Log one stored analysis result.
pub fn record(record: &AnalysisRecord) {
    ::log::info!(
        "[{}] analyzed {} (fingerprint {})",
        record.stage,
        record.analyzed_at.format("%Y-%m-%d %H:%M:%S"),
        record.fingerprint.as_deref().unwrap_or("-")
    );
    ::log::info!("    {}", record.payload);
}
