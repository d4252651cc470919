//! VLM interaction: send one page image with the analysis prompt.
//!
//! The rest of the crate talks to models through the [`VisionModel`] trait;
//! [`LlmVisionModel`] is the production implementation over an
//! `edgequake_llm` provider. Tests and embedders can plug in their own.
//!
//! ## Retry Strategy
//!
//! Each attempt is bounded by `api_timeout_secs`. Failed or timed-out
//! attempts are retried up to `max_retries` times with exponential backoff
//! (`retry_backoff_ms * 2^(attempt-1)`).

use crate::config::AnalyzerConfig;
use crate::error::PageError;
use crate::output::PageAnalysis;
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, ImageData, LLMProvider};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tokio::time::{sleep, timeout, Duration};
use tracing::{debug, warn};

/// Sampling options for a single call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CallOptions {
    pub temperature: f32,
    pub max_tokens: usize,
}

impl From<&AnalyzerConfig> for CallOptions {
    fn from(config: &AnalyzerConfig) -> Self {
        Self {
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        }
    }
}

/// A model's answer for one image.
#[derive(Debug, Clone, Default)]
pub struct ModelReply {
    pub text: String,
    pub input_tokens: usize,
    pub output_tokens: usize,
}

/// A failed model call.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct ModelCallError(pub String);

/// Anything that can read a report page image and answer a prompt about it.
#[async_trait]
pub trait VisionModel: Send + Sync {
    /// Short label for logs, e.g. `gemini/gemini-2.0-flash`.
    fn label(&self) -> &str;

    async fn analyze(
        &self,
        prompt: &str,
        image: ImageData,
        options: CallOptions,
    ) -> Result<ModelReply, ModelCallError>;
}

/// [`VisionModel`] backed by an `edgequake_llm` provider.
pub struct LlmVisionModel {
    provider: Arc<dyn LLMProvider>,
    label: String,
}

impl LlmVisionModel {
    pub fn new(provider: Arc<dyn LLMProvider>, label: impl Into<String>) -> Self {
        Self {
            provider,
            label: label.into(),
        }
    }
}

#[async_trait]
impl VisionModel for LlmVisionModel {
    fn label(&self) -> &str {
        &self.label
    }

    async fn analyze(
        &self,
        prompt: &str,
        image: ImageData,
        options: CallOptions,
    ) -> Result<ModelReply, ModelCallError> {
        // Prompt and image travel together in one user turn.
        let messages = vec![ChatMessage::user_with_images(prompt, vec![image])];
        let completion = CompletionOptions {
            temperature: Some(options.temperature),
            max_tokens: Some(options.max_tokens),
            ..Default::default()
        };

        let response = self
            .provider
            .chat(&messages, Some(&completion))
            .await
            .map_err(|e| ModelCallError(e.to_string()))?;

        Ok(ModelReply {
            text: response.content,
            input_tokens: response.prompt_tokens,
            output_tokens: response.completion_tokens,
        })
    }
}

/// Delay before retry number `attempt` (1-based). Saturates instead of
/// overflowing for large attempt counts.
fn backoff_ms(base_ms: u64, attempt: u32) -> u64 {
    base_ms.saturating_mul(2u64.saturating_pow(attempt.saturating_sub(1)))
}

/// Analyse a single page image.
///
/// Always returns a `PageAnalysis`; failures are recorded in its `error`
/// field so one bad page doesn't sink a multi-page report.
pub async fn analyze_page(
    model: &Arc<dyn VisionModel>,
    page_num: usize,
    image: ImageData,
    prompt: &str,
    config: &AnalyzerConfig,
) -> PageAnalysis {
    let start = Instant::now();
    let options = CallOptions::from(config);
    let call_timeout = Duration::from_secs(config.api_timeout_secs);

    let mut last_err: Option<PageError> = None;

    for attempt in 0..=config.max_retries {
        if attempt > 0 {
            let backoff = backoff_ms(config.retry_backoff_ms, attempt);
            warn!(
                "Page {}: retry {}/{} after {}ms",
                page_num, attempt, config.max_retries, backoff
            );
            sleep(Duration::from_millis(backoff)).await;
        }

        match timeout(call_timeout, model.analyze(prompt, image.clone(), options)).await {
            Ok(Ok(reply)) => {
                let duration = start.elapsed();
                debug!(
                    "Page {}: {} input tokens, {} output tokens, {:?} via {}",
                    page_num,
                    reply.input_tokens,
                    reply.output_tokens,
                    duration,
                    model.label()
                );
                return PageAnalysis {
                    page_num,
                    text: reply.text,
                    input_tokens: reply.input_tokens,
                    output_tokens: reply.output_tokens,
                    duration_ms: duration.as_millis() as u64,
                    retries: attempt as u8,
                    error: None,
                };
            }
            Ok(Err(e)) => {
                warn!("Page {}: attempt {} failed: {}", page_num, attempt + 1, e);
                last_err = Some(PageError::LlmFailed {
                    page: page_num,
                    retries: config.max_retries as u8,
                    detail: e.to_string(),
                });
            }
            Err(_) => {
                warn!(
                    "Page {}: attempt {} timed out after {}s",
                    page_num,
                    attempt + 1,
                    config.api_timeout_secs
                );
                last_err = Some(PageError::Timeout {
                    page: page_num,
                    secs: config.api_timeout_secs,
                });
            }
        }
    }

    PageAnalysis {
        page_num,
        text: String::new(),
        input_tokens: 0,
        output_tokens: 0,
        duration_ms: start.elapsed().as_millis() as u64,
        retries: config.max_retries as u8,
        error: Some(last_err.unwrap_or(PageError::LlmFailed {
            page: page_num,
            retries: config.max_retries as u8,
            detail: "Unknown error".to_string(),
        })),
    }
}
