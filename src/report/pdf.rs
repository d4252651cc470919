//! Write laid-out pages to PDF bytes with `printpdf`.
//!
//! `printpdf` documents are `Rc`-based and not `Send`; callers on the async
//! runtime run [`render_report_pdf`] inside `spawn_blocking`.

use crate::error::AnalyzerError;
use crate::pipeline::parse::HealthReport;
use crate::report::fonts::{FontSet, FontSource};
use crate::report::layout::{layout_report, Color, DrawOp, Pages, Weight, PAGE_HEIGHT_MM, PAGE_WIDTH_MM};
use printpdf::path::PaintMode;
use printpdf::{BuiltinFont, IndirectFontRef, Mm, PdfDocument, PdfLayerReference, Rect, Rgb};
use std::io::Cursor;
use tracing::debug;

pub const DOCUMENT_TITLE: &str = "Health Report";

/// Lay out and write `report`, returning the PDF file contents.
pub fn render_report_pdf(report: &HealthReport, fonts: &FontSet) -> Result<Vec<u8>, AnalyzerError> {
    let pages = layout_report(report, fonts);
    write_pages(&pages, fonts)
}

fn pdf_err(e: impl std::fmt::Display) -> AnalyzerError {
    AnalyzerError::PdfGeneration(e.to_string())
}

fn write_pages(pages: &Pages, fonts: &FontSet) -> Result<Vec<u8>, AnalyzerError> {
    let (doc, first_page, first_layer) =
        PdfDocument::new(DOCUMENT_TITLE, Mm(PAGE_WIDTH_MM), Mm(PAGE_HEIGHT_MM), "Layer 1");

    let (regular, bold) = match fonts.source() {
        FontSource::Embedded { regular, bold } => (
            doc.add_external_font(Cursor::new(regular.as_slice())).map_err(pdf_err)?,
            doc.add_external_font(Cursor::new(bold.as_slice())).map_err(pdf_err)?,
        ),
        FontSource::Builtin => (
            doc.add_builtin_font(BuiltinFont::Helvetica).map_err(pdf_err)?,
            doc.add_builtin_font(BuiltinFont::HelveticaBold).map_err(pdf_err)?,
        ),
    };

    for (idx, ops) in pages.iter().enumerate() {
        let layer = if idx == 0 {
            doc.get_page(first_page).get_layer(first_layer)
        } else {
            let (page, layer) = doc.add_page(Mm(PAGE_WIDTH_MM), Mm(PAGE_HEIGHT_MM), "Layer 1");
            doc.get_page(page).get_layer(layer)
        };
        for op in ops {
            draw(&layer, op, &regular, &bold);
        }
    }

    let bytes = doc.save_to_bytes().map_err(pdf_err)?;
    debug!("Wrote {} page report PDF ({} bytes)", pages.len(), bytes.len());
    Ok(bytes)
}

fn rgb(color: Color) -> printpdf::Color {
    let Color(r, g, b) = color;
    printpdf::Color::Rgb(Rgb::new(
        r as f32 / 255.0,
        g as f32 / 255.0,
        b as f32 / 255.0,
        None,
    ))
}

/// Layout coordinates run down from the top; PDF coordinates run up from the bottom.
fn flip(y: f32) -> Mm {
    Mm(PAGE_HEIGHT_MM - y)
}

fn draw(layer: &PdfLayerReference, op: &DrawOp, regular: &IndirectFontRef, bold: &IndirectFontRef) {
    match op {
        DrawOp::Text {
            x,
            baseline,
            size,
            weight,
            color,
            text,
        } => {
            let font = match weight {
                Weight::Regular => regular,
                Weight::Bold => bold,
            };
            layer.set_fill_color(rgb(*color));
            layer.use_text(text.as_str(), *size, Mm(*x), flip(*baseline), font);
        }
        DrawOp::Rect {
            x,
            y,
            width,
            height,
            fill,
            stroke,
            line_width,
        } => {
            layer.set_fill_color(rgb(*fill));
            layer.set_outline_color(rgb(*stroke));
            layer.set_outline_thickness(Mm(*line_width).into_pt().0);
            let rect = Rect::new(Mm(*x), flip(*y + *height), Mm(*x + *width), flip(*y))
                .with_mode(PaintMode::FillStroke);
            layer.add_rect(rect);
        }
    }
}
