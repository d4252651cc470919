//! Pipeline stages for report analysis.
//!
//! Each submodule implements exactly one transformation step.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ render ──▶ encode ──▶ llm ──▶ parse ──▶ crate::report
//! (upload)  (pdfium)   (base64)   (VLM)   (sections)  (PDF)
//! ```
//!
//! 1. [`input`]: classify the upload and decode images / validate PDFs
//! 2. [`render`]: rasterise PDF pages; runs in `spawn_blocking` because
//!    pdfium is not async-safe
//! 3. [`encode`]: downscale, PNG-encode and base64-wrap each page image
//! 4. [`llm`]: drive the VLM call with timeout and retry/backoff
//! 5. [`parse`]: split the five-section answer into a [`parse::HealthReport`]

pub mod encode;
pub mod input;
pub mod llm;
pub mod parse;
pub mod render;
