//! PDF rasterisation: render pages of an uploaded PDF via pdfium.
//!
//! pdfium keeps thread-local state and blocks for the whole render, so the
//! work runs on tokio's blocking pool. Pages are scaled by DPI and then capped
//! by `max_rendered_pixels` on both axes to keep memory bounded for
//! oversized pages.

use crate::config::AnalyzerConfig;
use crate::error::AnalyzerError;
use image::DynamicImage;
use pdfium_render::prelude::*;
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// The pages rendered from one PDF.
#[derive(Debug)]
pub struct RenderedDocument {
    /// Page count of the document, including skipped pages.
    pub page_count: usize,
    /// `(page_index_0based, image)` for every rendered page.
    pub pages: Vec<(usize, DynamicImage)>,
}

impl RenderedDocument {
    pub fn skipped(&self) -> usize {
        self.page_count.saturating_sub(self.pages.len())
    }
}

/// Rasterise up to `config.max_pages` pages of `bytes`.
pub async fn render_pdf(
    filename: &str,
    bytes: Vec<u8>,
    config: &AnalyzerConfig,
) -> Result<RenderedDocument, AnalyzerError> {
    let filename = filename.to_string();
    let options = RenderOptions {
        dpi: config.dpi,
        max_pixels: config.max_rendered_pixels,
        max_pages: config.max_pages,
        password: config.password.clone(),
    };

    tokio::task::spawn_blocking(move || render_blocking(&filename, &bytes, &options))
        .await
        .map_err(|e| AnalyzerError::Internal(format!("Render task panicked: {}", e)))?
}

struct RenderOptions {
    dpi: u32,
    max_pixels: u32,
    max_pages: usize,
    password: Option<String>,
}

/// Bind pdfium: `PDFIUM_LIB_PATH` (file or directory), then the working
/// directory, then the system library search path.
pub fn bind_pdfium() -> Result<Pdfium, AnalyzerError> {
    if let Ok(configured) = std::env::var("PDFIUM_LIB_PATH") {
        let path = PathBuf::from(&configured);
        let path = if path.is_dir() {
            Pdfium::pdfium_platform_library_name_at_path(&path)
        } else {
            path
        };
        return Pdfium::bind_to_library(&path)
            .map(Pdfium::new)
            .map_err(|e| AnalyzerError::PdfiumBindingFailed(format!("{}: {:?}", path.display(), e)));
    }

    Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
        .or_else(|_| Pdfium::bind_to_system_library())
        .map(Pdfium::new)
        .map_err(|e| AnalyzerError::PdfiumBindingFailed(format!("{:?}", e)))
}

fn render_blocking(
    filename: &str,
    bytes: &[u8],
    options: &RenderOptions,
) -> Result<RenderedDocument, AnalyzerError> {
    let pdfium = bind_pdfium()?;
    let password = options.password.as_deref();

    let document = pdfium
        .load_pdf_from_byte_slice(bytes, password)
        .map_err(|e| classify_load_error(filename, password.is_some(), e))?;

    let pages = document.pages();
    let page_count = pages.len() as usize;
    info!("PDF '{}' loaded: {} pages", filename, page_count);

    if page_count == 0 {
        return Err(AnalyzerError::EmptyDocument {
            filename: filename.to_string(),
        });
    }
    if page_count > options.max_pages {
        warn!(
            "Only the first {} of {} pages will be analysed",
            options.max_pages, page_count
        );
    }

    let render_config = PdfRenderConfig::new()
        .scale_page_by_factor(options.dpi as f32 / 72.0)
        .set_maximum_width(options.max_pixels as i32)
        .set_maximum_height(options.max_pixels as i32);

    let mut rendered = Vec::with_capacity(page_count.min(options.max_pages));
    for (idx, page) in pages.iter().enumerate().take(options.max_pages) {
        let bitmap = page
            .render_with_config(&render_config)
            .map_err(|e| AnalyzerError::RasterisationFailed {
                page: idx + 1,
                detail: format!("{:?}", e),
            })?;

        let image = bitmap.as_image();
        debug!(
            "Rendered page {} → {}x{} px",
            idx + 1,
            image.width(),
            image.height()
        );
        rendered.push((idx, image));
    }

    Ok(RenderedDocument {
        page_count,
        pages: rendered,
    })
}

fn classify_load_error(filename: &str, had_password: bool, e: PdfiumError) -> AnalyzerError {
    let detail = format!("{:?}", e);
    if detail.to_ascii_lowercase().contains("password") {
        if had_password {
            AnalyzerError::WrongPassword {
                filename: filename.to_string(),
            }
        } else {
            AnalyzerError::PasswordRequired {
                filename: filename.to_string(),
            }
        }
    } else {
        AnalyzerError::CorruptPdf {
            filename: filename.to_string(),
            detail,
        }
    }
}
