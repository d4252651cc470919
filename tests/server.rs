//! Integration tests for the HTTP service.
//!
//! The router is driven in-process with `oneshot`; the vision model is a
//! scripted stand-in so no API key or network access is needed.

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use clinical_report_analyzer::server::{create_router, AppState, ServerContext};
use clinical_report_analyzer::{
    AnalyzerConfig, CallOptions, ModelCallError, ModelReply, ReportAnalyzer, ServerConfig,
    VisionModel,
};
use edgequake_llm::ImageData;
use http_body_util::BodyExt;
use image::{DynamicImage, Rgb, RgbImage};
use std::io::Cursor;
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

const ANSWER: &str = "**1. Analysis of Your Results**\n\
    Indicator: Hemoglobin\nYour Result: 11.2 g/dL\nNormal Range: 13.5 - 17.5 g/dL\nComment: Slightly low.\n\
    Indicator: Glucose\nYour Result: 90 mg/dL\nNormal Range: 70 - 100 mg/dL\nComment: Normal.\n\
    **2. Recommendations**\nTo Improve:\n- Eat iron-rich food\nTo Maintain:\n- Keep exercising\n\
    **3. Summary**\nMild anaemia, otherwise healthy.\n\
    **4. Final Score**\nScore: 80/100\n\
    **5. Medical Disclaimer**\n\"This is not a diagnosis.\"\n";

const BOUNDARY: &str = "report-analyzer-test-boundary";

struct Scripted {
    answer: Result<&'static str, &'static str>,
}

#[async_trait]
impl VisionModel for Scripted {
    fn label(&self) -> &str {
        "scripted"
    }

    async fn analyze(
        &self,
        _prompt: &str,
        _image: ImageData,
        _options: CallOptions,
    ) -> Result<ModelReply, ModelCallError> {
        self.answer
            .map(|text| ModelReply {
                text: text.to_string(),
                input_tokens: 120,
                output_tokens: 80,
            })
            .map_err(|e| ModelCallError(e.to_string()))
    }
}

/// Router plus the temp dir that must outlive it.
async fn test_app(
    answer: Result<&'static str, &'static str>,
    max_upload_bytes: usize,
) -> (Router, TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let config = AnalyzerConfig::builder()
        .max_retries(0)
        .retry_backoff_ms(1)
        .build()
        .unwrap();
    let analyzer = ReportAnalyzer::with_model(config, Arc::new(Scripted { answer }));
    let server = ServerConfig {
        report_dir: dir.path().join("reports"),
        max_upload_bytes,
        max_stored_reports: 2,
        ..ServerConfig::default()
    };
    let state: AppState = Arc::new(ServerContext::new(analyzer, server).await.unwrap());
    (create_router(state), dir)
}

fn png_bytes() -> Vec<u8> {
    let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(48, 48, Rgb([250, 250, 250])));
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
        .unwrap();
    buf
}

fn multipart_body(field: &str, filename: &str, content: &[u8]) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
    body.extend_from_slice(
        format!(
            "Content-Disposition: form-data; name=\"{field}\"; filename=\"{filename}\"\r\n\
             Content-Type: application/octet-stream\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(content);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
    body
}

fn upload_request(uri: &str, field: &str, filename: &str, content: &[u8]) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(multipart_body(field, filename, content)))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn body_bytes(response: axum::response::Response) -> Vec<u8> {
    response.into_body().collect().await.unwrap().to_bytes().to_vec()
}

async fn parse_json(response: axum::response::Response) -> serde_json::Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

#[tokio::test]
async fn health_and_index_respond() {
    let (app, _dir) = test_app(Ok(ANSWER), 1 << 20).await;

    let response = app.clone().oneshot(get("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(parse_json(response).await["status"], "ok");

    let response = app.oneshot(get("/")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let html = String::from_utf8(body_bytes(response).await).unwrap();
    assert!(html.contains("/analyze/"));
}

#[tokio::test]
async fn image_upload_returns_analysis_and_pdf_link() {
    let (app, _dir) = test_app(Ok(ANSWER), 1 << 20).await;

    let response = app
        .clone()
        .oneshot(upload_request("/analyze/", "file", "labs.png", &png_bytes()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = parse_json(response).await;
    assert_eq!(json["message"], "✅ Report analyzed and PDF generated.");
    assert_eq!(json["gemini_text"], format!("{ANSWER}\n"));
    let report_id = json["report_id"].as_str().unwrap().to_string();
    assert_eq!(json["pdf_file_url"], format!("/download/{report_id}"));

    let results = json["report"]["results"].as_array().unwrap();
    assert_eq!(results.len(), 2);
    assert_eq!(results[0]["indicator"], "Hemoglobin");
    assert_eq!(json["report"]["recommendations"]["to_improve"][0], "Eat iron-rich food");
    assert_eq!(json["stats"]["total_input_tokens"], 120);

    let stored = &json["stored_report"];
    assert_eq!(stored["id"], report_id.as_str());
    assert!(stored.get("path").is_none());
    let created_at = stored["created_at"].as_str().unwrap();
    assert!(chrono::DateTime::parse_from_rfc3339(created_at).is_ok(), "{created_at}");

    let response = app
        .oneshot(get(&format!("/download/{report_id}")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let pdf = body_bytes(response).await;
    assert!(pdf.starts_with(b"%PDF-"));
    assert_eq!(stored["size_bytes"], pdf.len());
}

#[tokio::test]
async fn download_serves_latest_report() {
    let (app, _dir) = test_app(Ok(ANSWER), 1 << 20).await;

    let response = app.clone().oneshot(get("/download")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(parse_json(response).await["status"], 404);

    let response = app
        .clone()
        .oneshot(upload_request("/analyze", "file", "labs.PNG", &png_bytes()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app.oneshot(get("/download")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "application/pdf"
    );
    assert_eq!(
        response.headers()[header::CONTENT_DISPOSITION],
        "attachment; filename=\"health_report.pdf\""
    );
    assert!(body_bytes(response).await.starts_with(b"%PDF-"));
}

#[tokio::test]
async fn evicted_reports_are_gone() {
    let (app, _dir) = test_app(Ok(ANSWER), 1 << 20).await;

    let mut ids = Vec::new();
    for _ in 0..3 {
        let response = app
            .clone()
            .oneshot(upload_request("/analyze/", "file", "labs.png", &png_bytes()))
            .await
            .unwrap();
        let json = parse_json(response).await;
        ids.push(json["report_id"].as_str().unwrap().to_string());
    }

    // Capacity is two; the first report was evicted.
    let response = app
        .clone()
        .oneshot(get(&format!("/download/{}", ids[0])))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app
        .oneshot(get(&format!("/download/{}", ids[2])))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn unsupported_format_is_rejected() {
    let (app, _dir) = test_app(Ok(ANSWER), 1 << 20).await;

    let response = app
        .oneshot(upload_request("/analyze/", "file", "notes.txt", b"hello"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let json = parse_json(response).await;
    assert_eq!(json["status"], 400);
    assert_eq!(
        json["error"],
        "Unsupported file format. Use JPG, PNG, or PDF."
    );
}

#[tokio::test]
async fn missing_file_field_is_rejected() {
    let (app, _dir) = test_app(Ok(ANSWER), 1 << 20).await;

    let response = app
        .oneshot(upload_request("/analyze/", "document", "labs.png", &png_bytes()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(parse_json(response).await["status"], 400);
}

#[tokio::test]
async fn fake_pdf_is_rejected() {
    let (app, _dir) = test_app(Ok(ANSWER), 1 << 20).await;

    let response = app
        .oneshot(upload_request("/analyze/", "file", "labs.pdf", b"this is not a pdf"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn model_failure_is_a_bad_gateway() {
    let (app, _dir) = test_app(Err("quota exceeded"), 1 << 20).await;

    let response = app
        .clone()
        .oneshot(upload_request("/analyze/", "file", "labs.png", &png_bytes()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    assert_eq!(parse_json(response).await["status"], 502);

    // Nothing was stored.
    let response = app.oneshot(get("/download")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn oversized_upload_is_rejected() {
    let (app, _dir) = test_app(Ok(ANSWER), 1024).await;

    let response = app
        .oneshot(upload_request("/analyze/", "file", "labs.png", &vec![0u8; 8 * 1024]))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
}
