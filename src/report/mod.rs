//! The generated PDF report.
//!
//! * [`shaping`]: Arabic reshaping and bidi reordering
//! * [`layout`]: page geometry, emitting draw operations
//! * [`fonts`]: DejaVu loading and glyph metrics, Helvetica fallback
//! * [`pdf`]: draw operations to PDF bytes

pub mod fonts;
pub mod layout;
pub mod pdf;
pub mod shaping;

pub use fonts::FontSet;
pub use pdf::render_report_pdf;
