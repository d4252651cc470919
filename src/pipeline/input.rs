//! Input handling: classify an upload and load it into memory.
//!
//! The service receives bytes plus a client-supplied file name; the CLI
//! receives a local path or an HTTP(S) URL. Both end up as an [`Upload`]
//! whose [`UploadKind`] is decided by the file extension alone, then checked
//! against the content (PDF magic bytes, decodable image) before any model
//! call is made.

use crate::error::AnalyzerError;
use image::DynamicImage;
use std::path::PathBuf;
use tracing::{debug, info};

/// What kind of document an upload is, judged by its file name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadKind {
    /// `.png`, `.jpg`, `.jpeg`: a single page.
    Image,
    /// `.pdf`: one page image per PDF page.
    Pdf,
}

impl UploadKind {
    /// Classify by extension, case-insensitively.
    pub fn from_filename(filename: &str) -> Option<Self> {
        let lower = filename.to_ascii_lowercase();
        if [".png", ".jpg", ".jpeg"].iter().any(|ext| lower.ends_with(ext)) {
            Some(UploadKind::Image)
        } else if lower.ends_with(".pdf") {
            Some(UploadKind::Pdf)
        } else {
            None
        }
    }
}

/// An uploaded report held in memory.
#[derive(Debug, Clone)]
pub struct Upload {
    pub filename: String,
    pub kind: UploadKind,
    pub bytes: Vec<u8>,
}

impl Upload {
    /// Classify `bytes` by `filename`, rejecting unsupported extensions.
    pub fn new(filename: impl Into<String>, bytes: Vec<u8>) -> Result<Self, AnalyzerError> {
        let filename = filename.into();
        let kind = UploadKind::from_filename(&filename)
            .ok_or_else(|| AnalyzerError::UnsupportedFormat {
                filename: filename.clone(),
            })?;
        Ok(Self {
            filename,
            kind,
            bytes,
        })
    }

    /// Fail early when a `.pdf` upload does not start with `%PDF`.
    pub fn check_pdf_magic(&self) -> Result<(), AnalyzerError> {
        if self.kind == UploadKind::Pdf && !self.bytes.starts_with(b"%PDF") {
            return Err(AnalyzerError::NotAPdf {
                filename: self.filename.clone(),
                magic: self.bytes.iter().take(4).copied().collect(),
            });
        }
        Ok(())
    }

    /// Decode an image upload.
    pub fn decode_image(&self) -> Result<DynamicImage, AnalyzerError> {
        image::load_from_memory(&self.bytes).map_err(|e| AnalyzerError::InvalidImage {
            filename: self.filename.clone(),
            detail: e.to_string(),
        })
    }
}

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Load a local file or download a URL into an [`Upload`].
pub async fn resolve_input(input: &str, timeout_secs: u64) -> Result<Upload, AnalyzerError> {
    if is_url(input) {
        download_url(input, timeout_secs).await
    } else {
        read_local(input).await
    }
}

async fn read_local(path_str: &str) -> Result<Upload, AnalyzerError> {
    let path = PathBuf::from(path_str);
    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path_str.to_string());

    // Reject the extension before touching the disk.
    if UploadKind::from_filename(&filename).is_none() {
        return Err(AnalyzerError::UnsupportedFormat { filename });
    }

    let bytes = tokio::fs::read(&path).await.map_err(|e| match e.kind() {
        std::io::ErrorKind::PermissionDenied => AnalyzerError::PermissionDenied { path: path.clone() },
        _ => AnalyzerError::FileNotFound { path: path.clone() },
    })?;

    debug!("Read local report: {} ({} bytes)", path.display(), bytes.len());
    Upload::new(filename, bytes)
}

async fn download_url(url: &str, timeout_secs: u64) -> Result<Upload, AnalyzerError> {
    info!("Downloading report from: {}", url);

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| AnalyzerError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            AnalyzerError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            AnalyzerError::DownloadFailed {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    })?;

    if !response.status().is_success() {
        return Err(AnalyzerError::DownloadFailed {
            url: url.to_string(),
            reason: format!("HTTP {}", response.status()),
        });
    }

    let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let filename = extract_filename(url, content_type.as_deref());

    let bytes = response
        .bytes()
        .await
        .map_err(|e| AnalyzerError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    info!("Downloaded {} bytes as '{}'", bytes.len(), filename);
    Upload::new(filename, bytes.to_vec())
}

/// Pick a file name for a downloaded report.
///
/// The last URL path segment wins when it has an extension; otherwise the
/// response content type decides.
fn extract_filename(url: &str, content_type: Option<&str>) -> String {
    if let Ok(parsed) = reqwest::Url::parse(url) {
        if let Some(mut segments) = parsed.path_segments() {
            if let Some(last) = segments.next_back() {
                if !last.is_empty() && last.contains('.') {
                    return last.to_string();
                }
            }
        }
    }

    match content_type.map(|c| c.split(';').next().unwrap_or("").trim()) {
        Some("image/png") => "downloaded.png".to_string(),
        Some("image/jpeg") => "downloaded.jpg".to_string(),
        _ => "downloaded.pdf".to_string(),
    }
}
