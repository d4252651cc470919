//! Request handlers.

use crate::error::AnalyzerError;
use crate::output::AnalysisStats;
use crate::pipeline::parse::HealthReport;
use crate::server::error::HttpError;
use crate::server::state::AppState;
use crate::server::store::StoredReport;
use axum::extract::multipart::MultipartRejection;
use axum::extract::{Multipart, Path, State};
use axum::http::{header, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use tracing::info;

/// Multipart field carrying the report.
pub const UPLOAD_FIELD: &str = "file";

/// File name offered to the browser for downloads.
pub const DOWNLOAD_FILENAME: &str = "health_report.pdf";

pub const SUCCESS_MESSAGE: &str = "✅ Report analyzed and PDF generated.";

const INDEX_HTML: &str = r#"<html>
    <head><title>Clinical Report Analyzer</title></head>
    <body>
        <h2>🚀 Clinical Report Analyzer is running!</h2>
        <p>POST a lab report (JPG, PNG or PDF) as the <code>file</code> field to <code>/analyze/</code>,
        then fetch the generated PDF from <code>/download</code>.</p>
    </body>
</html>
"#;

#[derive(Debug, Serialize)]
pub struct AnalyzeResponse {
    pub message: &'static str,
    /// Raw model answer, all pages concatenated.
    pub gemini_text: String,
    pub pdf_file_url: String,
    pub report_id: String,
    pub report: HealthReport,
    pub stats: AnalysisStats,
    /// Id, PDF size and creation time of the stored report.
    pub stored_report: StoredReport,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

pub async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

/// `POST /analyze/`: analyse the uploaded report and store the PDF.
pub async fn analyze(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<AnalyzeResponse>, HttpError> {
    let mut multipart = multipart.map_err(|e| HttpError::BadRequest(e.body_text()))?;
    let (filename, bytes) = read_upload(&mut multipart).await?;
    info!("Received '{}' ({} bytes)", filename, bytes.len());

    let output = state.analyzer.analyze_upload(filename, bytes).await?;
    let stored = state.store.save(&output.pdf).await?;

    Ok(Json(AnalyzeResponse {
        message: SUCCESS_MESSAGE,
        gemini_text: output.raw_text,
        pdf_file_url: format!("/download/{}", stored.id),
        report_id: stored.id.clone(),
        report: output.report,
        stats: output.stats,
        stored_report: stored,
    }))
}

/// Pull the `file` field out of the form, skipping any other fields.
async fn read_upload(multipart: &mut Multipart) -> Result<(String, Vec<u8>), HttpError> {
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }
        let filename = field.file_name().unwrap_or_default().to_string();
        let bytes = field.bytes().await.map_err(multipart_error)?;
        return Ok((filename, bytes.to_vec()));
    }
    Err(AnalyzerError::MissingUpload {
        field: UPLOAD_FIELD.to_string(),
    }
    .into())
}

fn multipart_error(e: axum::extract::multipart::MultipartError) -> HttpError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        HttpError::PayloadTooLarge(e.body_text())
    } else {
        HttpError::BadRequest(e.body_text())
    }
}

/// `GET /download`: the most recent report.
pub async fn download_latest(State(state): State<AppState>) -> Result<Response, HttpError> {
    let pdf = state.store.read(None).await?;
    Ok(pdf_response(pdf))
}

/// `GET /download/{id}`
pub async fn download(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, HttpError> {
    let pdf = state.store.read(Some(&id)).await?;
    Ok(pdf_response(pdf))
}

fn pdf_response(pdf: Vec<u8>) -> Response {
    (
        [
            (header::CONTENT_TYPE, "application/pdf".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", DOWNLOAD_FILENAME),
            ),
        ],
        pdf,
    )
        .into_response()
}
