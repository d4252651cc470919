//! Configuration types for report analysis and the HTTP service.
//!
//! Analysis behaviour is controlled through [`AnalyzerConfig`], built via its
//! [`AnalyzerConfigBuilder`]. The HTTP listener, upload limits and report
//! storage live in [`ServerConfig`].

use crate::error::AnalyzerError;
use crate::progress::ProgressCallback;
use edgequake_llm::LLMProvider;
use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

/// Provider used when nothing else is configured.
pub const DEFAULT_PROVIDER: &str = "gemini";

/// Model used with [`DEFAULT_PROVIDER`] when no model is configured.
pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";

/// Upper bound for [`AnalyzerConfigBuilder::max_retries`].
pub const MAX_RETRIES: u32 = 10;

/// Regular body font installed by the `fonts-dejavu-core` package.
pub const DEFAULT_REGULAR_FONT: &str = "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf";

/// Bold font installed by the `fonts-dejavu-core` package.
pub const DEFAULT_BOLD_FONT: &str = "/usr/share/fonts/truetype/dejavu/DejaVuSans-Bold.ttf";

/// Configuration for analysing one uploaded report.
///
/// # Example
/// ```rust
/// use clinical_report_analyzer::AnalyzerConfig;
///
/// let config = AnalyzerConfig::builder()
///     .dpi(150)
///     .concurrency(2)
///     .model("gemini-2.0-flash")
///     .build()
///     .unwrap();
/// assert_eq!(config.dpi, 150);
/// ```
#[derive(Clone)]
pub struct AnalyzerConfig {
    /// Rendering DPI used when rasterising PDF pages. Range: 72–400. Default: 200.
    ///
    /// Lab reports are dense tables with small print; 200 DPI keeps decimal
    /// points legible for the model.
    pub dpi: u32,

    /// Maximum image dimension (width or height) in pixels. Default: 2000.
    ///
    /// Applies to rendered PDF pages and to uploaded photos alike; larger
    /// images are scaled down with their aspect ratio preserved.
    pub max_rendered_pixels: u32,

    /// Maximum number of PDF pages analysed. Default: 20. Later pages are skipped.
    pub max_pages: usize,

    /// Number of concurrent VLM API calls. Default: 4.
    pub concurrency: usize,

    /// LLM model identifier. If None, [`DEFAULT_MODEL`] is used with a named provider.
    pub model: Option<String>,

    /// LLM provider name (e.g. "gemini", "openai").
    /// If None along with `provider`, the environment decides.
    pub provider_name: Option<String>,

    /// Pre-constructed LLM provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Sampling temperature for the LLM completion. Default: 0.2.
    pub temperature: f32,

    /// Maximum tokens the LLM may generate per page. Default: 4096.
    pub max_tokens: usize,

    /// Maximum retry attempts on a failed VLM call. Default: 3, at most [`MAX_RETRIES`].
    pub max_retries: u32,

    /// Initial retry delay in milliseconds, doubled per attempt. Default: 500.
    pub retry_backoff_ms: u64,

    /// Per-VLM-call timeout in seconds. Default: 60.
    pub api_timeout_secs: u64,

    /// Download timeout for URL inputs in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// PDF user password for encrypted documents.
    pub password: Option<String>,

    /// Custom analysis prompt. If None, uses [`crate::prompts::ANALYSIS_PROMPT`].
    pub system_prompt: Option<String>,

    /// TrueType font for body text. Default: [`DEFAULT_REGULAR_FONT`].
    pub regular_font: PathBuf,

    /// TrueType font for headings and labels. Default: [`DEFAULT_BOLD_FONT`].
    pub bold_font: PathBuf,

    /// Optional progress observer.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            dpi: 200,
            max_rendered_pixels: 2000,
            max_pages: 20,
            concurrency: 4,
            model: None,
            provider_name: None,
            provider: None,
            temperature: 0.2,
            max_tokens: 4096,
            max_retries: 3,
            retry_backoff_ms: 500,
            api_timeout_secs: 60,
            download_timeout_secs: 120,
            password: None,
            system_prompt: None,
            regular_font: PathBuf::from(DEFAULT_REGULAR_FONT),
            bold_font: PathBuf::from(DEFAULT_BOLD_FONT),
            progress_callback: None,
        }
    }
}

impl fmt::Debug for AnalyzerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnalyzerConfig")
            .field("dpi", &self.dpi)
            .field("max_rendered_pixels", &self.max_rendered_pixels)
            .field("max_pages", &self.max_pages)
            .field("concurrency", &self.concurrency)
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("max_retries", &self.max_retries)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("custom_prompt", &self.system_prompt.is_some())
            .field("regular_font", &self.regular_font)
            .field("bold_font", &self.bold_font)
            .finish()
    }
}

impl AnalyzerConfig {
    /// Create a new builder for `AnalyzerConfig`.
    pub fn builder() -> AnalyzerConfigBuilder {
        AnalyzerConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`AnalyzerConfig`].
pub struct AnalyzerConfigBuilder {
    config: AnalyzerConfig,
}

impl fmt::Debug for AnalyzerConfigBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnalyzerConfigBuilder")
            .field("config", &self.config)
            .finish()
    }
}

impl AnalyzerConfigBuilder {
    pub fn dpi(mut self, dpi: u32) -> Self {
        self.config.dpi = dpi.clamp(72, 400);
        self
    }

    pub fn max_rendered_pixels(mut self, px: u32) -> Self {
        self.config.max_rendered_pixels = px.max(100);
        self
    }

    pub fn max_pages(mut self, n: usize) -> Self {
        self.config.max_pages = n;
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n.max(1);
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n.min(MAX_RETRIES);
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn password(mut self, pwd: impl Into<String>) -> Self {
        self.config.password = Some(pwd.into());
        self
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.system_prompt = Some(prompt.into());
        self
    }

    pub fn regular_font(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.regular_font = path.into();
        self
    }

    pub fn bold_font(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.bold_font = path.into();
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<AnalyzerConfig, AnalyzerError> {
        let c = &self.config;
        if c.dpi < 72 || c.dpi > 400 {
            return Err(AnalyzerError::InvalidConfig(format!(
                "DPI must be 72–400, got {}",
                c.dpi
            )));
        }
        if c.concurrency == 0 {
            return Err(AnalyzerError::InvalidConfig("Concurrency must be ≥ 1".into()));
        }
        if c.max_pages == 0 {
            return Err(AnalyzerError::InvalidConfig("max_pages must be ≥ 1".into()));
        }
        if c.api_timeout_secs == 0 {
            return Err(AnalyzerError::InvalidConfig(
                "API timeout must be at least one second".into(),
            ));
        }
        Ok(self.config)
    }
}

// ── Server ───────────────────────────────────────────────────────────────

/// CORS configuration for the web server.
#[derive(Debug, Clone, Default)]
pub enum CorsConfig {
    /// Allow all origins (default; the service has no cookies or auth).
    #[default]
    AllowAll,
    /// Allow specific origins only.
    AllowOrigins(Vec<String>),
}

/// Configuration for the HTTP service.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Interface to bind. Default: `0.0.0.0`.
    pub host: String,
    /// TCP port. Default: 8000.
    pub port: u16,
    /// Largest accepted request body in bytes. Default: 20 MiB.
    pub max_upload_bytes: usize,
    /// Directory generated PDFs are written to. Default: `$TMPDIR/clinical-reports`.
    pub report_dir: PathBuf,
    /// How many generated reports are kept before the oldest is evicted. Default: 32.
    pub max_stored_reports: usize,
    /// CORS configuration.
    pub cors: CorsConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            max_upload_bytes: 20 * 1024 * 1024,
            report_dir: std::env::temp_dir().join("clinical-reports"),
            max_stored_reports: 32,
            cors: CorsConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Resolve `host:port` into a socket address.
    pub fn socket_addr(&self) -> Result<SocketAddr, AnalyzerError> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|e| AnalyzerError::InvalidConfig(format!("bind address: {e}")))
    }

    /// Set CORS to allow specific origins.
    #[must_use]
    pub fn with_allowed_origins(mut self, origins: Vec<String>) -> Self {
        self.cors = CorsConfig::AllowOrigins(origins);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_deployment() {
        let server = ServerConfig::default();
        assert_eq!(server.port, 8000);
        assert_eq!(server.host, "0.0.0.0");
        assert_eq!(server.socket_addr().unwrap().port(), 8000);

        let config = AnalyzerConfig::default();
        assert_eq!(config.dpi, 200);
        assert_eq!(config.regular_font, PathBuf::from(DEFAULT_REGULAR_FONT));
    }

    #[test]
    fn builder_clamps_out_of_range_values() {
        let config = AnalyzerConfig::builder()
            .dpi(1000)
            .concurrency(0)
            .temperature(5.0)
            .max_rendered_pixels(10)
            .max_retries(1000)
            .build()
            .unwrap();
        assert_eq!(config.dpi, 400);
        assert_eq!(config.max_retries, MAX_RETRIES);
        assert_eq!(config.concurrency, 1);
        assert_eq!(config.temperature, 2.0);
        assert_eq!(config.max_rendered_pixels, 100);
    }

    #[test]
    fn builder_rejects_zero_pages() {
        let err = AnalyzerConfig::builder().max_pages(0).build().unwrap_err();
        assert!(matches!(err, AnalyzerError::InvalidConfig(_)));
    }

    #[test]
    fn debug_redacts_password() {
        let config = AnalyzerConfig::builder().password("hunter2").build().unwrap();
        let dbg = format!("{config:?}");
        assert!(!dbg.contains("hunter2"));
        assert!(dbg.contains("<redacted>"));
    }

    #[test]
    fn invalid_host_is_reported() {
        let server = ServerConfig {
            host: "not a host".into(),
            ..ServerConfig::default()
        };
        assert!(server.socket_addr().is_err());
    }
}
