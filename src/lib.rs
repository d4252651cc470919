//! # clinical-report-analyzer
//!
//! Read a photographed or scanned clinical lab report with a Vision Language
//! Model and turn the answer into a structured health report and a styled PDF.
//!
//! ## Pipeline Overview
//!
//! ```text
//! upload (JPG / PNG / PDF)
//!  │
//!  ├─ 1. Input   classify by extension, decode image or check PDF magic
//!  ├─ 2. Render  rasterise PDF pages via pdfium (spawn_blocking)
//!  ├─ 3. Encode  downscale, PNG-encode, base64
//!  ├─ 4. VLM     five-section analysis prompt, concurrent per page
//!  ├─ 5. Parse   results / recommendations / summary / score / disclaimer
//!  └─ 6. Report  A4 PDF with cards, bullets and Arabic shaping
//! ```
//!
//! The same pipeline backs the HTTP service ([`server`]) and the
//! `report-analyzer analyze` command.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use clinical_report_analyzer::{AnalyzerConfig, ReportAnalyzer};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Provider from GEMINI_API_KEY, or EDGEQUAKE_LLM_PROVIDER + EDGEQUAKE_MODEL
//!     let analyzer = ReportAnalyzer::new(AnalyzerConfig::default())?;
//!     let output = analyzer.analyze_to_file("labs.jpg", "health_report.pdf").await?;
//!     for result in &output.report.results {
//!         println!("{}: {} ({})", result.indicator, result.result, result.normal_range);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `report-analyzer` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! ## Fonts
//!
//! The PDF embeds DejaVu Sans from `fonts-dejavu-core` so Arabic renders.
//! Without those files the report falls back to built-in Helvetica and
//! non-Latin text is left out.

// ── Modules ──────────────────────────────────────────────────────────────

pub mod analyze;
pub mod config;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod report;
pub mod server;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use analyze::ReportAnalyzer;
pub use config::{AnalyzerConfig, AnalyzerConfigBuilder, CorsConfig, ServerConfig};
pub use error::{AnalyzerError, PageError};
pub use output::{AnalysisOutput, AnalysisStats, PageAnalysis};
pub use pipeline::input::{Upload, UploadKind};
pub use pipeline::llm::{CallOptions, ModelCallError, ModelReply, VisionModel};
pub use pipeline::parse::{parse_pages, parse_report, HealthReport, Recommendations, TestResult};
pub use progress::{AnalysisProgressCallback, NoopProgressCallback, ProgressCallback};
pub use report::{render_report_pdf, FontSet};
pub use server::{create_router, serve};
