// src/services/mod.rs

//! Analysis services invoked by the processor.

pub mod analyzer;
pub mod keywords;

pub use analyzer::{Analyzer, AnalyzerSet};
pub use keywords::KeywordAnalyzer;
