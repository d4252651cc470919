//! Fonts for the generated report.
//!
//! DejaVu Sans covers Latin, Arabic and the Arabic presentation forms, so it
//! is the default. When the TTF files are missing the report still renders
//! with the PDF built-in Helvetica pair; Arabic text is then dropped by the
//! writer, which is logged once at load time.

use crate::error::AnalyzerError;
use crate::report::layout::{TextMeasure, Weight, PT_TO_MM};
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, warn};

/// Advance widths for one face, in font units.
#[derive(Debug, Clone)]
struct Metrics {
    units_per_em: f32,
    advances: HashMap<char, u16>,
    fallback: u16,
}

/// Code points the report can contain: Latin, punctuation and Arabic.
const MEASURED_RANGES: &[(u32, u32)] = &[
    (0x0020, 0x007E),
    (0x00A0, 0x00FF),
    (0x0600, 0x06FF),
    (0x2000, 0x206F),
    (0x2190, 0x21FF),
    (0xFB50, 0xFDFF),
    (0xFE70, 0xFEFF),
];

impl Metrics {
    fn from_ttf(data: &[u8]) -> Result<Self, ttf_parser::FaceParsingError> {
        let face = ttf_parser::Face::parse(data, 0)?;
        let advance = |c: char| {
            face.glyph_index(c)
                .and_then(|gid| face.glyph_hor_advance(gid))
        };

        let mut advances = HashMap::new();
        for &(start, end) in MEASURED_RANGES {
            for c in (start..=end).filter_map(char::from_u32) {
                if let Some(width) = advance(c) {
                    advances.insert(c, width);
                }
            }
        }

        let units_per_em = face.units_per_em();
        let fallback = advance('?').unwrap_or(units_per_em / 2);
        Ok(Self {
            units_per_em: units_per_em as f32,
            advances,
            fallback,
        })
    }

    fn helvetica(widths: &[u16; 95]) -> Self {
        let advances = (0x20u8..=0x7E)
            .zip(widths.iter())
            .map(|(b, w)| (b as char, *w))
            .collect();
        Self {
            units_per_em: 1000.0,
            advances,
            fallback: 556,
        }
    }

    fn width_mm(&self, text: &str, size_pt: f32) -> f32 {
        let units: u32 = text
            .chars()
            .map(|c| *self.advances.get(&c).unwrap_or(&self.fallback) as u32)
            .sum();
        units as f32 / self.units_per_em * size_pt * PT_TO_MM
    }
}

/// Helvetica advance widths for ASCII 0x20..=0x7E (Adobe core font metrics).
#[rustfmt::skip]
const HELVETICA: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278,
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 278, 278, 584, 584, 584, 556,
    1015, 667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, 722, 778,
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 278, 278, 278, 469, 556,
    333, 556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, 556, 556,
    556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, 334, 260, 334, 584,
];

#[rustfmt::skip]
const HELVETICA_BOLD: [u16; 95] = [
    278, 333, 474, 556, 556, 889, 722, 238, 333, 333, 389, 584, 278, 333, 278, 278,
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 333, 333, 584, 584, 584, 611,
    975, 722, 722, 722, 722, 667, 611, 778, 722, 278, 556, 722, 611, 833, 722, 778,
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 333, 278, 333, 584, 556,
    333, 556, 611, 556, 611, 556, 333, 611, 611, 278, 278, 556, 278, 889, 611, 611,
    611, 611, 389, 556, 333, 611, 556, 778, 556, 556, 500, 389, 280, 389, 584,
];

/// Where the glyphs come from when the PDF is written.
#[derive(Debug, Clone)]
pub enum FontSource {
    /// TrueType files embedded into the PDF.
    Embedded { regular: Vec<u8>, bold: Vec<u8> },
    /// Helvetica / Helvetica-Bold from the PDF base-14 set.
    Builtin,
}

/// Regular and bold faces plus their metrics.
#[derive(Debug, Clone)]
pub struct FontSet {
    source: FontSource,
    regular: Metrics,
    bold: Metrics,
}

impl FontSet {
    /// Load both TTF files, failing if either is unreadable or malformed.
    pub fn load(regular: &Path, bold: &Path) -> Result<Self, AnalyzerError> {
        let regular_bytes = read_font(regular)?;
        let bold_bytes = read_font(bold)?;

        let regular_metrics = Metrics::from_ttf(&regular_bytes).map_err(|e| AnalyzerError::FontLoad {
            path: regular.to_path_buf(),
            detail: e.to_string(),
        })?;
        let bold_metrics = Metrics::from_ttf(&bold_bytes).map_err(|e| AnalyzerError::FontLoad {
            path: bold.to_path_buf(),
            detail: e.to_string(),
        })?;

        debug!(
            "Loaded fonts {} ({} glyph widths) and {}",
            regular.display(),
            regular_metrics.advances.len(),
            bold.display()
        );

        Ok(Self {
            source: FontSource::Embedded {
                regular: regular_bytes,
                bold: bold_bytes,
            },
            regular: regular_metrics,
            bold: bold_metrics,
        })
    }

    /// Like [`FontSet::load`], falling back to [`FontSet::builtin`] on error.
    pub fn load_or_builtin(regular: &Path, bold: &Path) -> Self {
        match Self::load(regular, bold) {
            Ok(fonts) => fonts,
            Err(e) => {
                warn!(
                    "{}; using built-in Helvetica, Arabic text will not be drawn",
                    e
                );
                Self::builtin()
            }
        }
    }

    pub fn builtin() -> Self {
        Self {
            source: FontSource::Builtin,
            regular: Metrics::helvetica(&HELVETICA),
            bold: Metrics::helvetica(&HELVETICA_BOLD),
        }
    }

    pub fn is_builtin(&self) -> bool {
        matches!(self.source, FontSource::Builtin)
    }

    pub fn source(&self) -> &FontSource {
        &self.source
    }
}

impl TextMeasure for FontSet {
    fn width_mm(&self, text: &str, weight: Weight, size_pt: f32) -> f32 {
        match weight {
            Weight::Regular => self.regular.width_mm(text, size_pt),
            Weight::Bold => self.bold.width_mm(text, size_pt),
        }
    }
}

fn read_font(path: &Path) -> Result<Vec<u8>, AnalyzerError> {
    std::fs::read(path).map_err(|e| AnalyzerError::FontLoad {
        path: path.to_path_buf(),
        detail: e.to_string(),
    })
}
