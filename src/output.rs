//! Result types produced by an analysis run.

use crate::error::PageError;
use crate::pipeline::parse::HealthReport;
use serde::{Deserialize, Serialize};

/// The model's answer for a single page image.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageAnalysis {
    /// 1-indexed page number (always 1 for image uploads).
    pub page_num: usize,
    /// Raw model answer; empty when `error` is set.
    pub text: String,
    pub input_tokens: usize,
    pub output_tokens: usize,
    pub duration_ms: u64,
    /// Retries spent before the final attempt.
    pub retries: u8,
    pub error: Option<PageError>,
}

impl PageAnalysis {
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Aggregate counters for one run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalysisStats {
    /// Page images produced from the upload.
    pub total_pages: usize,
    pub analysed_pages: usize,
    pub failed_pages: usize,
    /// PDF pages beyond `max_pages` that were never rendered.
    pub skipped_pages: usize,
    pub total_input_tokens: u64,
    pub total_output_tokens: u64,
    pub render_duration_ms: u64,
    pub llm_duration_ms: u64,
    pub pdf_duration_ms: u64,
    pub total_duration_ms: u64,
}

/// Everything an analysis run produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisOutput {
    /// Successful page answers concatenated in page order, each followed by a newline.
    pub raw_text: String,
    /// Structured report parsed from `raw_text`.
    pub report: HealthReport,
    pub pages: Vec<PageAnalysis>,
    pub stats: AnalysisStats,
    /// Generated PDF document.
    #[serde(skip)]
    pub pdf: Vec<u8>,
}
