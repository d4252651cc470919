//! CLI binary for clinical-report-analyzer.
//!
//! `serve` (the default) runs the HTTP service; `analyze` runs one report
//! through the pipeline and writes the PDF locally.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use clinical_report_analyzer::config::{DEFAULT_BOLD_FONT, DEFAULT_REGULAR_FONT};
use clinical_report_analyzer::{
    serve, AnalysisProgressCallback, AnalyzerConfig, ProgressCallback, ReportAnalyzer,
    ServerConfig,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers ──────────────────────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

struct CliProgressCallback {
    bar: ProgressBar,
    errors: AtomicUsize,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        bar.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(TICKS),
        );
        bar.set_prefix("Preparing");
        bar.set_message("Reading report…");
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self {
            bar,
            errors: AtomicUsize::new(0),
        })
    }
}

impl AnalysisProgressCallback for CliProgressCallback {
    fn on_analysis_start(&self, total_pages: usize) {
        self.bar.set_style(
            ProgressStyle::with_template(
                "{spinner:.cyan} {prefix:.bold}  [{bar:42.green/238}] {pos:>3}/{len} pages  ⏱ {elapsed_precise}",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▉▊▋▌▍▎▏  ")
            .tick_strings(TICKS),
        );
        self.bar.set_length(total_pages as u64);
        self.bar.set_prefix("Analysing");
    }

    fn on_page_start(&self, page_num: usize, _total: usize) {
        self.bar.set_message(format!("page {page_num}"));
    }

    fn on_page_complete(&self, page_num: usize, total: usize, text_len: usize) {
        self.bar.println(format!(
            "  {} Page {:>3}/{:<3}  {}",
            green("✓"),
            page_num,
            total,
            dim(&format!("{text_len:>5} chars")),
        ));
        self.bar.inc(1);
    }

    fn on_page_error(&self, page_num: usize, total: usize, error: &str) {
        self.errors.fetch_add(1, Ordering::SeqCst);
        let msg: String = if error.chars().count() > 80 {
            error.chars().take(79).chain(['…']).collect()
        } else {
            error.to_string()
        };
        self.bar.println(format!(
            "  {} Page {:>3}/{:<3}  {}",
            red("✗"),
            page_num,
            total,
            red(&msg)
        ));
        self.bar.inc(1);
    }

    fn on_analysis_complete(&self, total_pages: usize, success_count: usize) {
        self.bar.finish_and_clear();
        let failed = total_pages.saturating_sub(success_count);
        if failed > 0 {
            eprintln!(
                "{} {}/{} pages analysed ({} failed)",
                cyan("⚠"),
                bold(&success_count.to_string()),
                total_pages,
                red(&failed.to_string())
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Run the HTTP service on 0.0.0.0:8000
  report-analyzer serve

  # Analyse one report and write the PDF
  report-analyzer analyze labs.jpg -o report.pdf

  # Print the parsed report as JSON
  report-analyzer analyze https://example.com/labs.pdf --json

ENVIRONMENT VARIABLES:
  GEMINI_API_KEY           Google Gemini API key (default provider)
  OPENAI_API_KEY           OpenAI API key
  ANTHROPIC_API_KEY        Anthropic API key
  EDGEQUAKE_LLM_PROVIDER   Provider, used together with EDGEQUAKE_MODEL
  EDGEQUAKE_MODEL          Model ID, used together with EDGEQUAKE_LLM_PROVIDER
  PDFIUM_LIB_PATH          libpdfium file or directory
  RUST_LOG                 Log filter, overrides -v / -q
"#;

/// Analyse clinical lab reports with a vision model and typeset a PDF summary.
#[derive(Parser, Debug)]
#[command(
    name = "report-analyzer",
    version,
    about = "Analyse clinical lab reports with a vision model and typeset a PDF summary",
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(flatten)]
    model: ModelArgs,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "REPORT_ANALYZER_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "REPORT_ANALYZER_QUIET")]
    quiet: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP service (default).
    Serve(ServeArgs),
    /// Analyse a single report file or URL.
    Analyze(AnalyzeArgs),
}

#[derive(Args, Debug)]
struct ModelArgs {
    /// Vision model provider: gemini, openai, anthropic, ollama, azure.
    #[arg(long, global = true, env = "REPORT_ANALYZER_PROVIDER")]
    provider: Option<String>,

    /// Model ID (default with a provider: gemini-2.0-flash).
    #[arg(long, global = true, env = "REPORT_ANALYZER_MODEL")]
    model: Option<String>,

    /// Rendering DPI for PDF pages (72–400).
    #[arg(long, global = true, env = "REPORT_ANALYZER_DPI", default_value_t = 200,
          value_parser = clap::value_parser!(u32).range(72..=400))]
    dpi: u32,

    /// Maximum PDF pages analysed per upload.
    #[arg(long, global = true, env = "REPORT_ANALYZER_MAX_PAGES", default_value_t = 20)]
    max_pages: usize,

    /// Number of concurrent model calls.
    #[arg(short, long, global = true, env = "REPORT_ANALYZER_CONCURRENCY", default_value_t = 4)]
    concurrency: usize,

    /// Max model output tokens per page.
    #[arg(long, global = true, env = "REPORT_ANALYZER_MAX_TOKENS", default_value_t = 4096)]
    max_tokens: usize,

    /// Model temperature (0.0–2.0).
    #[arg(long, global = true, env = "REPORT_ANALYZER_TEMPERATURE", default_value_t = 0.2)]
    temperature: f32,

    /// Retries per page on model failure.
    #[arg(long, global = true, env = "REPORT_ANALYZER_MAX_RETRIES", default_value_t = 3)]
    max_retries: u32,

    /// Per-page model call timeout in seconds.
    #[arg(long, global = true, env = "REPORT_ANALYZER_API_TIMEOUT", default_value_t = 60)]
    api_timeout: u64,

    /// HTTP download timeout in seconds (URL inputs).
    #[arg(long, global = true, env = "REPORT_ANALYZER_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    /// PDF user password for encrypted reports.
    #[arg(long, global = true, env = "REPORT_ANALYZER_PASSWORD")]
    password: Option<String>,

    /// Text file replacing the built-in analysis prompt.
    #[arg(long, global = true, env = "REPORT_ANALYZER_PROMPT")]
    prompt: Option<PathBuf>,

    /// Regular TrueType font for the PDF.
    #[arg(long, global = true, env = "REPORT_ANALYZER_FONT", default_value = DEFAULT_REGULAR_FONT)]
    font: PathBuf,

    /// Bold TrueType font for the PDF.
    #[arg(long, global = true, env = "REPORT_ANALYZER_BOLD_FONT", default_value = DEFAULT_BOLD_FONT)]
    bold_font: PathBuf,
}

#[derive(Parser, Debug)]
struct ServeArgs {
    /// Interface to bind.
    #[arg(long, env = "REPORT_ANALYZER_HOST", default_value = "0.0.0.0")]
    host: String,

    /// Port to listen on.
    #[arg(short, long, env = "REPORT_ANALYZER_PORT", default_value_t = 8000)]
    port: u16,

    /// Largest accepted upload in MiB.
    #[arg(long, env = "REPORT_ANALYZER_MAX_UPLOAD_MB", default_value_t = 20)]
    max_upload_mb: usize,

    /// Directory for generated PDFs (default: $TMPDIR/clinical-reports).
    #[arg(long, env = "REPORT_ANALYZER_REPORT_DIR")]
    report_dir: Option<PathBuf>,

    /// Generated reports kept before the oldest is deleted.
    #[arg(long, env = "REPORT_ANALYZER_MAX_REPORTS", default_value_t = 32)]
    max_reports: usize,

    /// Comma-separated allowed CORS origins (default: any).
    #[arg(long, env = "REPORT_ANALYZER_CORS_ORIGINS", value_delimiter = ',')]
    cors_origins: Vec<String>,
}

#[derive(Args, Debug)]
struct AnalyzeArgs {
    /// Local JPG/PNG/PDF path or HTTP/HTTPS URL.
    input: String,

    /// Where to write the generated PDF.
    #[arg(short, long, env = "REPORT_ANALYZER_OUTPUT", default_value = "health_report.pdf")]
    output: PathBuf,

    /// Print the analysis (raw text, parsed report, stats) as JSON on stdout.
    #[arg(long)]
    json: bool,

    /// Disable the progress bar.
    #[arg(long, env = "REPORT_ANALYZER_NO_PROGRESS")]
    no_progress: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let command = match cli.command {
        Some(command) => command,
        None => Command::Serve(ServeArgs::parse_from(["report-analyzer"])),
    };

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO logs in one-shot mode.
    let show_progress = match &command {
        Command::Analyze(args) => !cli.quiet && !args.no_progress && !args.json,
        Command::Serve(_) => false,
    };
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let progress: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn AnalysisProgressCallback>)
    } else {
        None
    };
    let config = build_config(&cli.model, progress).await?;
    let analyzer = ReportAnalyzer::new(config).context("Could not configure a vision model")?;

    match command {
        Command::Serve(args) => {
            serve(build_server_config(args), analyzer)
                .await
                .context("Server failed")?;
        }
        Command::Analyze(args) => {
            let output = analyzer
                .analyze_to_file(&args.input, &args.output)
                .await
                .context("Analysis failed")?;

            if args.json {
                let json =
                    serde_json::to_string_pretty(&output).context("Failed to serialise output")?;
                println!("{json}");
            }

            if !cli.quiet {
                eprintln!(
                    "{}  {} test results  {}ms  →  {}",
                    green("✔"),
                    output.report.results.len(),
                    output.stats.total_duration_ms,
                    bold(&args.output.display().to_string()),
                );
                eprintln!(
                    "   {} tokens in  /  {} tokens out",
                    dim(&output.stats.total_input_tokens.to_string()),
                    dim(&output.stats.total_output_tokens.to_string()),
                );
            }
        }
    }

    Ok(())
}

/// Map CLI args to `AnalyzerConfig`.
async fn build_config(args: &ModelArgs, progress: Option<ProgressCallback>) -> Result<AnalyzerConfig> {
    let mut builder = AnalyzerConfig::builder()
        .dpi(args.dpi)
        .max_pages(args.max_pages)
        .concurrency(args.concurrency)
        .max_tokens(args.max_tokens)
        .temperature(args.temperature)
        .max_retries(args.max_retries)
        .api_timeout_secs(args.api_timeout)
        .download_timeout_secs(args.download_timeout)
        .regular_font(&args.font)
        .bold_font(&args.bold_font);

    if let Some(ref provider) = args.provider {
        builder = builder.provider_name(provider);
    }
    if let Some(ref model) = args.model {
        builder = builder.model(model);
    }
    if let Some(ref password) = args.password {
        builder = builder.password(password);
    }
    if let Some(ref path) = args.prompt {
        let prompt = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read prompt from {:?}", path))?;
        builder = builder.system_prompt(prompt);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

fn build_server_config(args: ServeArgs) -> ServerConfig {
    let mut config = ServerConfig {
        host: args.host,
        port: args.port,
        max_upload_bytes: args.max_upload_mb.max(1) * 1024 * 1024,
        max_stored_reports: args.max_reports,
        ..ServerConfig::default()
    };
    if let Some(dir) = args.report_dir {
        config.report_dir = dir;
    }
    if !args.cors_origins.is_empty() {
        config = config.with_allowed_origins(args.cors_origins);
    }
    config
}
