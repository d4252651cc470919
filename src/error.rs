//! Error types for the clinical report analyzer.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`AnalyzerError`]: **Fatal**: the analysis cannot proceed at all
//!   (unsupported upload, corrupt PDF, provider not configured, every page
//!   failed). Returned as `Err(AnalyzerError)` from the `analyze*` entry
//!   points and mapped to an HTTP status by the server.
//!
//! * [`PageError`]: **Non-fatal**: a single page failed (render glitch,
//!   transient API error) while other pages produced an answer. Stored inside
//!   [`crate::output::PageAnalysis`] so a multi-page report still yields a
//!   PDF when one page goes wrong.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the analyzer.
#[derive(Debug, Error)]
pub enum AnalyzerError {
    // ── Upload / input errors ─────────────────────────────────────────────
    /// The uploaded file name has no supported extension.
    #[error("Unsupported file format. Use JPG, PNG, or PDF.")]
    UnsupportedFormat { filename: String },

    /// The multipart request carried no `file` field.
    #[error("Missing upload: expected a multipart field named '{field}'")]
    MissingUpload { field: String },

    /// The upload claims to be an image but could not be decoded.
    #[error("Could not decode image '{filename}': {detail}")]
    InvalidImage { filename: String, detail: String },

    /// The upload claims to be a PDF but lacks the `%PDF` header.
    #[error("File '{filename}' is not a valid PDF (first bytes: {magic:?})")]
    NotAPdf { filename: String, magic: Vec<u8> },

    /// Local input path does not exist.
    #[error("Report file not found: '{path}'")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'")]
    PermissionDenied { path: PathBuf },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'")]
    DownloadTimeout { url: String, secs: u64 },

    // ── PDF errors ────────────────────────────────────────────────────────
    /// PDF header/trailer/xref is corrupt and cannot be parsed.
    #[error("PDF '{filename}' is corrupt: {detail}")]
    CorruptPdf { filename: String, detail: String },

    /// PDF requires a password but none was configured.
    #[error("PDF '{filename}' is encrypted and requires a password")]
    PasswordRequired { filename: String },

    /// A password was configured but it is wrong.
    #[error("Wrong password for PDF '{filename}'")]
    WrongPassword { filename: String },

    /// The PDF opened fine but has no pages.
    #[error("PDF '{filename}' contains no pages")]
    EmptyDocument { filename: String },

    /// pdfium-render returned an error for a specific page.
    #[error("Rasterisation failed for page {page}: {detail}")]
    RasterisationFailed { page: usize, detail: String },

    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\
Set PDFIUM_LIB_PATH=/path/to/libpdfium or install pdfium system-wide."
    )]
    PdfiumBindingFailed(String),

    // ── LLM errors ────────────────────────────────────────────────────────
    /// The configured provider is not initialised (missing API key etc.).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    /// Every page failed after all retries; there is nothing to report on.
    #[error("All {total} pages failed after {retries} retries each. First error: {first_error}")]
    AllPagesFailed {
        total: usize,
        retries: u32,
        first_error: String,
    },

    // ── Output errors ─────────────────────────────────────────────────────
    /// The report PDF could not be typeset.
    #[error("Failed to generate report PDF: {0}")]
    PdfGeneration(String),

    /// A font file could not be parsed.
    #[error("Font '{path}' could not be loaded: {detail}")]
    FontLoad { path: PathBuf, detail: String },

    /// Could not create or write an output file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Requested report id is not (or no longer) stored.
    #[error("Report '{id}' not found")]
    ReportNotFound { id: String },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AnalyzerError {
    /// True when the caller sent something unusable, as opposed to a
    /// failure on our side or upstream.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            AnalyzerError::UnsupportedFormat { .. }
                | AnalyzerError::MissingUpload { .. }
                | AnalyzerError::InvalidImage { .. }
                | AnalyzerError::NotAPdf { .. }
                | AnalyzerError::CorruptPdf { .. }
                | AnalyzerError::PasswordRequired { .. }
                | AnalyzerError::WrongPassword { .. }
                | AnalyzerError::EmptyDocument { .. }
        )
    }
}

/// A non-fatal error for a single page.
#[derive(Debug, Clone, Error, serde::Serialize, serde::Deserialize)]
pub enum PageError {
    /// Page image could not be encoded for the model.
    #[error("Page {page}: image encoding failed: {detail}")]
    EncodeFailed { page: usize, detail: String },

    /// LLM call failed after retries.
    #[error("Page {page}: LLM call failed after {retries} retries: {detail}")]
    LlmFailed {
        page: usize,
        retries: u8,
        detail: String,
    },

    /// LLM call timed out on the last attempt.
    #[error("Page {page}: LLM call timed out after {secs}s")]
    Timeout { page: usize, secs: u64 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsupported_format_message_lists_accepted_types() {
        let e = AnalyzerError::UnsupportedFormat {
            filename: "scan.tiff".into(),
        };
        assert_eq!(e.to_string(), "Unsupported file format. Use JPG, PNG, or PDF.");
        assert!(e.is_client_error());
    }

    #[test]
    fn all_pages_failed_display() {
        let e = AnalyzerError::AllPagesFailed {
            total: 3,
            retries: 2,
            first_error: "quota exhausted".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("All 3 pages"), "got: {msg}");
        assert!(msg.contains("quota exhausted"));
        assert!(!e.is_client_error());
    }

    #[test]
    fn page_timeout_display() {
        let e = PageError::Timeout { page: 2, secs: 60 };
        assert!(e.to_string().contains("Page 2"));
        assert!(e.to_string().contains("60s"));
    }

    #[test]
    fn provider_error_is_server_side() {
        let e = AnalyzerError::ProviderNotConfigured {
            provider: "gemini".into(),
            hint: "GEMINI_API_KEY is not set".into(),
        };
        assert!(e.to_string().contains("gemini"));
        assert!(!e.is_client_error());
    }
}
