//! Analysis entry points: upload in, parsed report and PDF out.
//!
//! A [`ReportAnalyzer`] is built once (model provider and fonts resolved up
//! front) and then shared, by the HTTP server across requests or by the CLI
//! for a single run.

use crate::config::{AnalyzerConfig, DEFAULT_MODEL, DEFAULT_PROVIDER};
use crate::error::{AnalyzerError, PageError};
use crate::output::{AnalysisOutput, AnalysisStats, PageAnalysis};
use crate::pipeline::input::{self, Upload, UploadKind};
use crate::pipeline::llm::{self, LlmVisionModel, VisionModel};
use crate::pipeline::{encode, parse, render};
use crate::prompts;
use crate::report::{self, FontSet};
use edgequake_llm::{ImageData, LLMProvider, ProviderFactory};
use futures::stream::{self, StreamExt};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Page images ready for the model, plus the pages that never got that far.
struct PreparedPages {
    total_pages: usize,
    skipped_pages: usize,
    encoded: Vec<(usize, ImageData)>,
    failed: Vec<PageAnalysis>,
}

/// Runs the full pipeline for one upload at a time; cheap to share behind an `Arc`.
pub struct ReportAnalyzer {
    config: AnalyzerConfig,
    model: Arc<dyn VisionModel>,
    fonts: Arc<FontSet>,
}

impl ReportAnalyzer {
    /// Resolve the model provider and load fonts.
    ///
    /// Fails when no provider can be configured, typically a missing API key.
    pub fn new(config: AnalyzerConfig) -> Result<Self, AnalyzerError> {
        let (provider, label) = resolve_provider(&config)?;
        info!("Using vision model {}", label);
        let model: Arc<dyn VisionModel> = Arc::new(LlmVisionModel::new(provider, label));
        Ok(Self::with_model(config, model))
    }

    /// Use a caller-supplied model instead of an `edgequake_llm` provider.
    pub fn with_model(config: AnalyzerConfig, model: Arc<dyn VisionModel>) -> Self {
        let fonts = FontSet::load_or_builtin(&config.regular_font, &config.bold_font);
        Self {
            config,
            model,
            fonts: Arc::new(fonts),
        }
    }

    pub fn config(&self) -> &AnalyzerConfig {
        &self.config
    }

    pub fn model_label(&self) -> &str {
        self.model.label()
    }

    pub fn fonts(&self) -> &FontSet {
        &self.fonts
    }

    /// Analyse uploaded bytes; `filename` decides image vs. PDF handling.
    pub async fn analyze_upload(
        &self,
        filename: impl Into<String>,
        bytes: Vec<u8>,
    ) -> Result<AnalysisOutput, AnalyzerError> {
        self.analyze(Upload::new(filename, bytes)?).await
    }

    /// Analyse a local file path or an HTTP(S) URL.
    pub async fn analyze_input(&self, input: &str) -> Result<AnalysisOutput, AnalyzerError> {
        let upload = input::resolve_input(input, self.config.download_timeout_secs).await?;
        self.analyze(upload).await
    }

    /// Analyse `input` and write the PDF to `output_path` atomically.
    pub async fn analyze_to_file(
        &self,
        input: &str,
        output_path: impl AsRef<Path>,
    ) -> Result<AnalysisOutput, AnalyzerError> {
        let output = self.analyze_input(input).await?;
        write_atomic(output_path.as_ref(), &output.pdf).await?;
        Ok(output)
    }

    /// Run the pipeline on an [`Upload`].
    ///
    /// Returns `Ok` as long as at least one page was answered; per-page
    /// failures are reported in `output.pages` and `output.stats`.
    pub async fn analyze(&self, upload: Upload) -> Result<AnalysisOutput, AnalyzerError> {
        let total_start = Instant::now();
        info!(
            "Analysing '{}' ({} bytes, {:?})",
            upload.filename,
            upload.bytes.len(),
            upload.kind
        );

        // ── Step 1: Page images ──────────────────────────────────────────
        let render_start = Instant::now();
        let prepared = self.prepare_pages(upload).await?;
        let render_duration_ms = render_start.elapsed().as_millis() as u64;
        debug!(
            "Prepared {} page images in {}ms",
            prepared.encoded.len(),
            render_duration_ms
        );

        self.analyze_prepared(prepared, total_start, render_duration_ms)
            .await
    }

    /// Model calls, parsing and typesetting for pages that are ready to send.
    async fn analyze_prepared(
        &self,
        prepared: PreparedPages,
        total_start: Instant,
        render_duration_ms: u64,
    ) -> Result<AnalysisOutput, AnalyzerError> {
        let attempted = prepared.encoded.len() + prepared.failed.len();
        if let Some(ref cb) = self.config.progress_callback {
            cb.on_analysis_start(attempted);
        }

        // ── Step 2: Model calls ──────────────────────────────────────────
        let llm_start = Instant::now();
        let mut pages = self.process_pages(&prepared.encoded, attempted).await;
        pages.extend(prepared.failed);
        pages.sort_by_key(|p| p.page_num);
        let llm_duration_ms = llm_start.elapsed().as_millis() as u64;

        let analysed = pages.iter().filter(|p| p.is_ok()).count();
        if let Some(ref cb) = self.config.progress_callback {
            cb.on_analysis_complete(attempted, analysed);
        }

        if analysed == 0 {
            let first_error = pages
                .iter()
                .find_map(|p| p.error.as_ref())
                .map(|e| e.to_string())
                .unwrap_or_else(|| "Unknown error".to_string());
            return Err(AnalyzerError::AllPagesFailed {
                total: pages.len(),
                retries: self.config.max_retries,
                first_error,
            });
        }

        // ── Step 3: Parse ────────────────────────────────────────────────
        let answers: Vec<&str> = pages
            .iter()
            .filter(|p| p.is_ok())
            .map(|p| p.text.as_str())
            .collect();
        let raw_text: String = answers.iter().map(|a| format!("{}\n", a)).collect();
        let report = parse::parse_pages(answers);
        if report.is_empty() {
            warn!("Model answer contained none of the expected sections");
        }

        // ── Step 4: Typeset ──────────────────────────────────────────────
        let pdf_start = Instant::now();
        let pdf = {
            let report = report.clone();
            let fonts = Arc::clone(&self.fonts);
            tokio::task::spawn_blocking(move || report::render_report_pdf(&report, &fonts))
                .await
                .map_err(|e| AnalyzerError::Internal(format!("PDF task panicked: {}", e)))??
        };
        let pdf_duration_ms = pdf_start.elapsed().as_millis() as u64;

        let stats = AnalysisStats {
            total_pages: prepared.total_pages,
            analysed_pages: analysed,
            failed_pages: pages.len() - analysed,
            skipped_pages: prepared.skipped_pages,
            total_input_tokens: pages.iter().map(|p| p.input_tokens as u64).sum(),
            total_output_tokens: pages.iter().map(|p| p.output_tokens as u64).sum(),
            render_duration_ms,
            llm_duration_ms,
            pdf_duration_ms,
            total_duration_ms: total_start.elapsed().as_millis() as u64,
        };

        info!(
            "Analysis complete: {}/{} pages, {} test results, {} byte PDF, {}ms total",
            analysed,
            pages.len(),
            report.results.len(),
            pdf.len(),
            stats.total_duration_ms
        );

        Ok(AnalysisOutput {
            raw_text,
            report,
            pages,
            stats,
            pdf,
        })
    }

    async fn prepare_pages(&self, upload: Upload) -> Result<PreparedPages, AnalyzerError> {
        let max_pixels = self.config.max_rendered_pixels;

        match upload.kind {
            UploadKind::Image => {
                let data = tokio::task::spawn_blocking(move || {
                    let img = upload.decode_image()?;
                    encode::encode_page(img, max_pixels).map_err(|e| AnalyzerError::InvalidImage {
                        filename: upload.filename.clone(),
                        detail: e.to_string(),
                    })
                })
                .await
                .map_err(|e| AnalyzerError::Internal(format!("Encode task panicked: {}", e)))??;

                Ok(PreparedPages {
                    total_pages: 1,
                    skipped_pages: 0,
                    encoded: vec![(0, data)],
                    failed: Vec::new(),
                })
            }
            UploadKind::Pdf => {
                upload.check_pdf_magic()?;
                let rendered = render::render_pdf(&upload.filename, upload.bytes, &self.config).await?;
                let total_pages = rendered.page_count;
                let skipped_pages = rendered.skipped();

                let results = tokio::task::spawn_blocking(move || {
                    rendered
                        .pages
                        .into_iter()
                        .map(|(idx, img)| (idx, encode::encode_page(img, max_pixels)))
                        .collect::<Vec<_>>()
                })
                .await
                .map_err(|e| AnalyzerError::Internal(format!("Encode task panicked: {}", e)))?;

                let mut encoded = Vec::with_capacity(results.len());
                let mut failed = Vec::new();
                for (idx, result) in results {
                    match result {
                        Ok(data) => encoded.push((idx, data)),
                        Err(e) => {
                            warn!("Failed to encode page {}: {}", idx + 1, e);
                            failed.push(encode_failure(idx + 1, e.to_string()));
                        }
                    }
                }

                Ok(PreparedPages {
                    total_pages,
                    skipped_pages,
                    encoded,
                    failed,
                })
            }
        }
    }

    /// Send pages to the model, at most `config.concurrency` at a time.
    async fn process_pages(
        &self,
        pages: &[(usize, ImageData)],
        total_pages: usize,
    ) -> Vec<PageAnalysis> {
        let prompt = prompts::analysis_prompt(self.config.system_prompt.as_deref());

        // Collected before streaming so the returned future stays `Send`.
        let futures: Vec<_> = pages
            .iter()
            .map(|(idx, data)| {
                let page_num = idx + 1;
                async move {
                    if let Some(ref cb) = self.config.progress_callback {
                        cb.on_page_start(page_num, total_pages);
                    }
                    let result =
                        llm::analyze_page(&self.model, page_num, data.clone(), prompt, &self.config)
                            .await;
                    if let Some(ref cb) = self.config.progress_callback {
                        match &result.error {
                            None => cb.on_page_complete(page_num, total_pages, result.text.len()),
                            Some(e) => cb.on_page_error(page_num, total_pages, &e.to_string()),
                        }
                    }
                    result
                }
            })
            .collect();

        stream::iter(futures)
            .buffer_unordered(self.config.concurrency)
            .collect()
            .await
    }
}

fn encode_failure(page_num: usize, detail: String) -> PageAnalysis {
    PageAnalysis {
        page_num,
        text: String::new(),
        input_tokens: 0,
        output_tokens: 0,
        duration_ms: 0,
        retries: 0,
        error: Some(PageError::EncodeFailed {
            page: page_num,
            detail,
        }),
    }
}

/// Write to a sibling temp file, then rename over `path`.
pub(crate) async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), AnalyzerError> {
    let write_err = |e| AnalyzerError::OutputWriteFailed {
        path: path.to_path_buf(),
        source: e,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
    }

    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp_path = std::path::PathBuf::from(tmp_name);

    tokio::fs::write(&tmp_path, bytes).await.map_err(write_err)?;
    tokio::fs::rename(&tmp_path, path).await.map_err(write_err)?;
    Ok(())
}

fn create_vision_provider(
    provider_name: &str,
    model: &str,
) -> Result<(Arc<dyn LLMProvider>, String), AnalyzerError> {
    let provider = ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        AnalyzerError::ProviderNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })?;
    Ok((provider, format!("{}/{}", provider_name, model)))
}

/// Resolve the LLM provider, from most-specific to least-specific:
///
/// 1. a pre-built `config.provider`;
/// 2. `config.provider_name` with `config.model` (or [`DEFAULT_MODEL`]);
/// 3. `EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL` when both are set;
/// 4. [`DEFAULT_PROVIDER`] when `GEMINI_API_KEY` is set;
/// 5. whatever `ProviderFactory::from_env` detects.
fn resolve_provider(config: &AnalyzerConfig) -> Result<(Arc<dyn LLMProvider>, String), AnalyzerError> {
    if let Some(ref provider) = config.provider {
        return Ok((Arc::clone(provider), "custom".to_string()));
    }

    let model = config.model.as_deref().unwrap_or(DEFAULT_MODEL);

    if let Some(ref name) = config.provider_name {
        return create_vision_provider(name, model);
    }

    if let (Ok(prov), Ok(env_model)) = (
        std::env::var("EDGEQUAKE_LLM_PROVIDER"),
        std::env::var("EDGEQUAKE_MODEL"),
    ) {
        if !prov.is_empty() && !env_model.is_empty() {
            return create_vision_provider(&prov, &env_model);
        }
    }

    if std::env::var("GEMINI_API_KEY").is_ok_and(|key| !key.is_empty()) {
        return create_vision_provider(DEFAULT_PROVIDER, model);
    }

    let (llm_provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| AnalyzerError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No vision model provider could be detected from the environment.\n\
                Set GEMINI_API_KEY (or OPENAI_API_KEY, ANTHROPIC_API_KEY) or pass --provider.\n\
                Error: {}",
                e
            ),
        })?;

    Ok((llm_provider, "auto".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::llm::{CallOptions, ModelCallError, ModelReply};
    use crate::progress::AnalysisProgressCallback;
    use async_trait::async_trait;
    use image::{DynamicImage, Rgb, RgbImage};
    use std::io::Cursor;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const ANSWER: &str = "**1. Analysis of Your Results**\n\
        Indicator: Glucose\nYour Result: 92 mg/dL\nNormal Range: 70 - 100 mg/dL\nComment: Normal.\n\
        **2. Recommendations**\n* To Improve:\n* Drink water\n* To Maintain:\n* Walk\n\
        **3. Summary**\nAll good.\n\
        **4. Final Score**\n95/100\n\
        **5. Medical Disclaimer**\n\"Not advice.\"\n";

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
                    input_tokens: 100,
                    output_tokens: 50,
                })
                .map_err(|e| ModelCallError(e.to_string()))
        }
    }

    #[derive(Default)]
    struct Counting {
        started: AtomicUsize,
        completed: AtomicUsize,
        finished: AtomicUsize,
    }

    impl AnalysisProgressCallback for Counting {
        fn on_page_start(&self, _: usize, _: usize) {
            self.started.fetch_add(1, Ordering::SeqCst);
        }
        fn on_page_complete(&self, _: usize, _: usize, _: usize) {
            self.completed.fetch_add(1, Ordering::SeqCst);
        }
        fn on_analysis_complete(&self, _: usize, _: usize) {
            self.finished.fetch_add(1, Ordering::SeqCst);
        }
    }

    /// Answers every page except the ones whose payload is `BAD`.
    struct FailsOnBadPage;

    #[async_trait]
    impl VisionModel for FailsOnBadPage {
        fn label(&self) -> &str {
            "fails-on-bad-page"
        }

        async fn analyze(
            &self,
            _prompt: &str,
            image: ImageData,
            _options: CallOptions,
        ) -> Result<ModelReply, ModelCallError> {
            if image.data == "BAD" {
                return Err(ModelCallError("content filtered".into()));
            }
            Ok(ModelReply {
                text: ANSWER.to_string(),
                input_tokens: 100,
                output_tokens: 50,
            })
        }
    }

    fn page(data: &str) -> ImageData {
        ImageData::new(data.to_string(), "image/png")
    }

    fn png_bytes() -> Vec<u8> {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(32, 32, Rgb([255, 255, 255])));
        let mut buf = Vec::new();
        img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
            .unwrap();
        buf
    }

    fn analyzer(answer: Result<&'static str, &'static str>, config: AnalyzerConfig) -> ReportAnalyzer {
        ReportAnalyzer::with_model(config, Arc::new(Scripted { answer }))
    }

    fn fast_config() -> AnalyzerConfig {
        AnalyzerConfig::builder()
            .max_retries(0)
            .retry_backoff_ms(1)
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn image_upload_produces_report_and_pdf() {
        let counter = Arc::new(Counting::default());
        let config = AnalyzerConfig::builder()
            .max_retries(0)
            .progress_callback(counter.clone() as Arc<dyn AnalysisProgressCallback>)
            .build()
            .unwrap();

        let output = analyzer(Ok(ANSWER), config)
            .analyze_upload("labs.png", png_bytes())
            .await
            .unwrap();

        assert_eq!(output.raw_text, format!("{}\n", ANSWER));
        assert_eq!(output.report.results[0].indicator, "Glucose");
        assert_eq!(output.report.disclaimer, "Not advice.");
        assert!(output.pdf.starts_with(b"%PDF-"));
        assert_eq!(output.stats.total_pages, 1);
        assert_eq!(output.stats.analysed_pages, 1);
        assert_eq!(output.stats.total_input_tokens, 100);
        assert_eq!(counter.started.load(Ordering::SeqCst), 1);
        assert_eq!(counter.completed.load(Ordering::SeqCst), 1);
        assert_eq!(counter.finished.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn unsupported_extension_is_rejected_before_the_model() {
        let err = analyzer(Ok(ANSWER), fast_config())
            .analyze_upload("labs.docx", vec![1, 2, 3])
            .await
            .unwrap_err();
        assert!(matches!(err, AnalyzerError::UnsupportedFormat { .. }));
        assert!(err.is_client_error());
    }

    #[tokio::test]
    async fn undecodable_image_is_a_client_error() {
        let err = analyzer(Ok(ANSWER), fast_config())
            .analyze_upload("labs.jpg", b"definitely not a jpeg".to_vec())
            .await
            .unwrap_err();
        assert!(matches!(err, AnalyzerError::InvalidImage { .. }), "got {err:?}");
    }

    #[tokio::test]
    async fn pdf_without_magic_is_rejected() {
        let err = analyzer(Ok(ANSWER), fast_config())
            .analyze_upload("labs.pdf", b"<html>".to_vec())
            .await
            .unwrap_err();
        assert!(matches!(err, AnalyzerError::NotAPdf { .. }));
    }

    #[tokio::test]
    async fn model_failure_on_every_page_is_fatal() {
        let err = analyzer(Err("quota exceeded"), fast_config())
            .analyze_upload("labs.png", png_bytes())
            .await
            .unwrap_err();
        match err {
            AnalyzerError::AllPagesFailed { total, first_error, .. } => {
                assert_eq!(total, 1);
                assert!(first_error.contains("quota exceeded"));
            }
            other => panic!("expected AllPagesFailed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn pdf_is_written_atomically() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("labs.png");
        std::fs::write(&input, png_bytes()).unwrap();
        let out = dir.path().join("nested").join("report.pdf");

        analyzer(Ok(ANSWER), fast_config())
            .analyze_to_file(input.to_str().unwrap(), &out)
            .await
            .unwrap();

        let written = std::fs::read(&out).unwrap();
        assert!(written.starts_with(b"%PDF-"));
        assert!(!dir.path().join("nested").join("report.pdf.tmp").exists());
    }

    fn assert_send<T: Send>(_: &T) {}

    #[test]
    fn analysis_futures_are_send() {
        let analyzer = analyzer(Ok(ANSWER), fast_config());
        let upload = analyzer.analyze_upload("labs.png", png_bytes());
        assert_send(&upload);
        let input = analyzer.analyze_input("labs.png");
        assert_send(&input);
    }

    #[tokio::test]
    async fn one_failed_page_does_not_sink_the_report() {
        let analyzer = ReportAnalyzer::with_model(fast_config(), Arc::new(FailsOnBadPage));
        let prepared = PreparedPages {
            total_pages: 3,
            skipped_pages: 0,
            encoded: vec![(0, page("AAAA")), (1, page("BAD"))],
            failed: vec![encode_failure(3, "bad pixels".into())],
        };

        let output = analyzer
            .analyze_prepared(prepared, Instant::now(), 0)
            .await
            .unwrap();

        assert_eq!(output.stats.analysed_pages, 1);
        assert_eq!(output.stats.failed_pages, 2);
        assert_eq!(output.stats.total_input_tokens, 100);
        let nums: Vec<usize> = output.pages.iter().map(|p| p.page_num).collect();
        assert_eq!(nums, vec![1, 2, 3]);
        assert!(output.pages[0].is_ok());
        assert!(matches!(
            output.pages[1].error,
            Some(PageError::LlmFailed { page: 2, .. })
        ));
        assert!(matches!(
            output.pages[2].error,
            Some(PageError::EncodeFailed { page: 3, .. })
        ));
        // Only the answered page contributes text.
        assert_eq!(output.raw_text, format!("{}\n", ANSWER));
        assert_eq!(output.report.results.len(), 1);
        assert!(output.pdf.starts_with(b"%PDF-"));
    }

    #[tokio::test]
    async fn every_prepared_page_failing_is_fatal() {
        let analyzer = ReportAnalyzer::with_model(fast_config(), Arc::new(FailsOnBadPage));
        let prepared = PreparedPages {
            total_pages: 2,
            skipped_pages: 0,
            encoded: vec![(0, page("BAD"))],
            failed: vec![encode_failure(2, "bad pixels".into())],
        };

        let err = analyzer
            .analyze_prepared(prepared, Instant::now(), 0)
            .await
            .unwrap_err();
        assert!(matches!(err, AnalyzerError::AllPagesFailed { total: 2, .. }));
    }
}
