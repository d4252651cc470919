//! HTTP error type and the mapping from analysis errors to status codes.

use crate::error::AnalyzerError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

#[derive(Debug, Error)]
pub enum HttpError {
    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The upload is missing, unsupported or unreadable.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Request body over the configured upload limit.
    #[error("Payload too large: {0}")]
    PayloadTooLarge(String),

    /// The vision model failed for every page.
    #[error("Upstream model error: {0}")]
    BadGateway(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// JSON error response body.
#[derive(Serialize)]
struct ErrorBody {
    error: String,
    status: u16,
}

impl HttpError {
    pub fn status(&self) -> StatusCode {
        match self {
            HttpError::NotFound(_) => StatusCode::NOT_FOUND,
            HttpError::BadRequest(_) => StatusCode::BAD_REQUEST,
            HttpError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            HttpError::BadGateway(_) => StatusCode::BAD_GATEWAY,
            HttpError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn into_message(self) -> String {
        match self {
            HttpError::NotFound(msg)
            | HttpError::BadRequest(msg)
            | HttpError::PayloadTooLarge(msg)
            | HttpError::BadGateway(msg)
            | HttpError::Internal(msg) => msg,
        }
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!("{}", self);
        }

        let body = ErrorBody {
            error: self.into_message(),
            status: status.as_u16(),
        };

        (status, axum::Json(body)).into_response()
    }
}

impl From<AnalyzerError> for HttpError {
    fn from(err: AnalyzerError) -> Self {
        if err.is_client_error() {
            return HttpError::BadRequest(err.to_string());
        }
        match err {
            AnalyzerError::ReportNotFound { .. } => HttpError::NotFound(err.to_string()),
            AnalyzerError::AllPagesFailed { .. } => HttpError::BadGateway(err.to_string()),
            other => HttpError::Internal(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn analyzer_errors_map_to_status_codes() {
        let cases = [
            (
                AnalyzerError::UnsupportedFormat {
                    filename: "a.gif".into(),
                },
                StatusCode::BAD_REQUEST,
            ),
            (
                AnalyzerError::MissingUpload {
                    field: "file".into(),
                },
                StatusCode::BAD_REQUEST,
            ),
            (
                AnalyzerError::ReportNotFound { id: "x".into() },
                StatusCode::NOT_FOUND,
            ),
            (
                AnalyzerError::AllPagesFailed {
                    total: 1,
                    retries: 3,
                    first_error: "boom".into(),
                },
                StatusCode::BAD_GATEWAY,
            ),
            (
                AnalyzerError::PdfGeneration("bad font".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, expected) in cases {
            assert_eq!(HttpError::from(err).status(), expected);
        }
    }

    #[test]
    fn unsupported_format_keeps_its_message() {
        let http = HttpError::from(AnalyzerError::UnsupportedFormat {
            filename: "a.gif".into(),
        });
        assert_eq!(http.into_message(), "Unsupported file format. Use JPG, PNG, or PDF.");
    }
}
