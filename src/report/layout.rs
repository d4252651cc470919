//! Report typesetting.
//!
//! [`Layout`] walks a [`HealthReport`] top to bottom on A4 pages and emits
//! [`DrawOp`]s in millimetres from the top-left corner. It never touches a
//! font file: widths come from a [`TextMeasure`], so the geometry can be
//! tested with a fixed-width measure and drawn by any backend.

use crate::pipeline::parse::{HealthReport, TestResult};
use crate::report::shaping::{is_arabic, prepare_rtl};

pub const PAGE_WIDTH_MM: f32 = 210.0;
pub const PAGE_HEIGHT_MM: f32 = 297.0;
pub const MARGIN_MM: f32 = 10.0;
pub const CONTENT_WIDTH_MM: f32 = PAGE_WIDTH_MM - 2.0 * MARGIN_MM;
/// Blocks that would cross this line start on a fresh page.
pub const BREAK_Y_MM: f32 = 260.0;
/// Lines never extend below this.
pub const BOTTOM_Y_MM: f32 = PAGE_HEIGHT_MM - MARGIN_MM;

pub const PT_TO_MM: f32 = 25.4 / 72.0;

const RIGHT_EDGE_MM: f32 = PAGE_WIDTH_MM - MARGIN_MM;
const CARD_TEXT_X_MM: f32 = 12.0;
const BODY_SIZE: f32 = 12.0;
const BULLET: &str = "•";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Color(pub u8, pub u8, pub u8);

impl Color {
    pub const BLACK: Color = Color(0, 0, 0);
    pub const ACCENT: Color = Color(195, 60, 84);
    pub const CARD_FILL: Color = Color(245, 245, 245);
    pub const CARD_STROKE: Color = Color(210, 210, 210);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Weight {
    Regular,
    Bold,
}

/// Measures rendered text width.
pub trait TextMeasure {
    /// Width of `text` in millimetres at `size_pt`.
    fn width_mm(&self, text: &str, weight: Weight, size_pt: f32) -> f32;
}

#[derive(Debug, Clone, PartialEq)]
pub enum DrawOp {
    /// Text already in visual order; `baseline` is measured from the page top.
    Text {
        x: f32,
        baseline: f32,
        size: f32,
        weight: Weight,
        color: Color,
        text: String,
    },
    /// Filled and stroked rectangle; `y` is its top edge.
    Rect {
        x: f32,
        y: f32,
        width: f32,
        height: f32,
        fill: Color,
        stroke: Color,
        line_width: f32,
    },
}

/// Draw operations for each page, in painting order.
pub type Pages = Vec<Vec<DrawOp>>;

#[derive(Debug, Clone, Copy)]
enum Align {
    Left(f32),
    Right(f32),
}

/// One line ready to place.
struct Line {
    text: String,
    align: Align,
}

pub struct Layout<'m, M: TextMeasure + ?Sized> {
    measure: &'m M,
    pages: Pages,
    y: f32,
}

impl<'m, M: TextMeasure + ?Sized> Layout<'m, M> {
    pub fn new(measure: &'m M) -> Self {
        Self {
            measure,
            pages: vec![Vec::new()],
            y: MARGIN_MM,
        }
    }

    /// Current vertical position in mm from the page top.
    pub fn y(&self) -> f32 {
        self.y
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn finish(self) -> Pages {
        self.pages
    }

    /// Start a new page if `height` mm would cross the break line.
    pub fn ensure_space(&mut self, height: f32) {
        if self.y + height > BREAK_Y_MM {
            self.new_page();
        }
    }

    fn new_page(&mut self) {
        self.pages.push(Vec::new());
        self.y = MARGIN_MM;
    }

    fn push(&mut self, op: DrawOp) {
        if let Some(page) = self.pages.last_mut() {
            page.push(op);
        }
    }

    /// Numbered section heading in the accent colour.
    pub fn section(&mut self, title: &str) {
        self.y += 6.0;
        self.ensure_space(20.0);
        self.emit(
            Line {
                text: title.to_string(),
                align: Align::Left(MARGIN_MM),
            },
            10.0,
            14.0,
            Weight::Bold,
            Color::ACCENT,
        );
        self.y += 6.0;
    }

    /// Grey card holding one test result.
    pub fn test_result(&mut self, result: &TestResult) {
        let width = RIGHT_EDGE_MM - CARD_TEXT_X_MM;
        let indicator = self.wrap_ltr(
            &format!("Indicator: {}", result.indicator),
            CARD_TEXT_X_MM,
            width,
            Weight::Bold,
            BODY_SIZE,
        );
        let value = self.wrap_ltr(
            &format!("Result: {}", result.result),
            CARD_TEXT_X_MM,
            width,
            Weight::Regular,
            BODY_SIZE,
        );
        let range = self.wrap_ltr(
            &format!("Normal Range: {}", result.normal_range),
            CARD_TEXT_X_MM,
            width,
            Weight::Regular,
            BODY_SIZE,
        );
        let comment = self.wrap_auto(&result.comment, CARD_TEXT_X_MM, width, BODY_SIZE, false);

        let content = 8.0 * indicator.len() as f32
            + 7.0 * (value.len() + range.len() + comment.len().max(1)) as f32;
        let height = content + 6.0;

        self.ensure_space(height.max(40.0).min(BREAK_Y_MM - MARGIN_MM));
        let top = self.y;
        self.push(DrawOp::Rect {
            x: MARGIN_MM,
            y: top,
            width: CONTENT_WIDTH_MM,
            height: height.min(BOTTOM_Y_MM - top),
            fill: Color::CARD_FILL,
            stroke: Color::CARD_STROKE,
            line_width: 0.2,
        });

        self.y = top + 2.0;
        for line in indicator {
            self.emit(line, 8.0, BODY_SIZE, Weight::Bold, Color::BLACK);
        }
        for line in value.into_iter().chain(range) {
            self.emit(line, 7.0, BODY_SIZE, Weight::Regular, Color::BLACK);
        }
        if comment.is_empty() {
            self.y += 7.0;
        }
        for line in comment {
            self.emit(line, 7.0, BODY_SIZE, Weight::Regular, Color::BLACK);
        }

        // A card that spilled onto another page leaves the cursor where its text ended.
        let end = top + height + 2.0;
        if self.y < end {
            self.y = end;
        }
    }

    /// Bold list title followed by bullet items.
    pub fn bullets(&mut self, title: &str, items: &[String]) {
        self.ensure_space(10.0 + 8.0 * items.len() as f32 + 4.0);
        self.emit(
            Line {
                text: title.to_string(),
                align: Align::Left(MARGIN_MM),
            },
            10.0,
            13.0,
            Weight::Bold,
            Color::BLACK,
        );

        for item in items {
            let lines = if is_arabic(item) {
                let trimmed = item.trim_matches(|c| matches!(c, ' ' | '.' | '،' | ':'));
                self.wrap_rtl(trimmed, CONTENT_WIDTH_MM, BODY_SIZE, true)
            } else {
                self.wrap_ltr(
                    &format!("{} {}", BULLET, item),
                    MARGIN_MM,
                    CONTENT_WIDTH_MM,
                    Weight::Regular,
                    BODY_SIZE,
                )
            };
            for line in lines {
                self.emit(line, 8.0, BODY_SIZE, Weight::Regular, Color::BLACK);
            }
        }
        self.y += 2.0;
    }

    /// Body paragraph; blank lines in `text` are kept.
    pub fn paragraph(&mut self, text: &str) {
        let text = text.trim();
        if text.is_empty() {
            return;
        }
        self.ensure_space(10.0);
        for line in self.wrap_auto(text, MARGIN_MM, CONTENT_WIDTH_MM, BODY_SIZE, false) {
            self.emit(line, 8.0, BODY_SIZE, Weight::Regular, Color::BLACK);
        }
    }

    fn emit(&mut self, line: Line, height: f32, size: f32, weight: Weight, color: Color) {
        if self.y + height > BOTTOM_Y_MM {
            self.new_page();
        }
        if !line.text.is_empty() {
            let x = match line.align {
                Align::Left(x) => x,
                Align::Right(edge) => edge - self.measure.width_mm(&line.text, weight, size),
            };
            // Text sits vertically centred in its cell.
            let baseline = self.y + height / 2.0 + 0.3 * size * PT_TO_MM;
            self.push(DrawOp::Text {
                x,
                baseline,
                size,
                weight,
                color,
                text: line.text,
            });
        }
        self.y += height;
    }

    fn wrap_auto(&self, text: &str, x: f32, width: f32, size: f32, bullet: bool) -> Vec<Line> {
        if is_arabic(text) {
            self.wrap_rtl(text, width, size, bullet)
        } else {
            self.wrap_ltr(text, x, width, Weight::Regular, size)
        }
    }

    fn wrap_ltr(&self, text: &str, x: f32, width: f32, weight: Weight, size: f32) -> Vec<Line> {
        let fits = |s: &str| self.measure.width_mm(s, weight, size) <= width;
        text.split('\n')
            .flat_map(|para| wrap_words(para.trim(), &fits))
            .map(|text| Line {
                text,
                align: Align::Left(x),
            })
            .collect()
    }

    /// Wrap in logical order, measuring each candidate as it will be drawn,
    /// then convert every line to visual order and right-align it. The
    /// bullet goes on the right of the first line, where RTL reading starts.
    fn wrap_rtl(&self, text: &str, width: f32, size: f32, bullet: bool) -> Vec<Line> {
        let mut lines = Vec::new();
        for para in text.split('\n') {
            let with_bullet = bullet && lines.is_empty();
            let fits = |s: &str| {
                let mut visual = prepare_rtl(s);
                if with_bullet {
                    visual.push(' ');
                    visual.push_str(BULLET);
                }
                self.measure.width_mm(&visual, Weight::Regular, size) <= width
            };
            let wrapped = wrap_words(para.trim(), &fits);
            for logical in wrapped {
                let mut visual = prepare_rtl(&logical);
                if bullet && lines.is_empty() {
                    visual.push(' ');
                    visual.push_str(BULLET);
                }
                lines.push(Line {
                    text: visual,
                    align: Align::Right(RIGHT_EDGE_MM),
                });
            }
        }
        lines
    }
}

/// Greedy word wrap. Words that do not fit on a line of their own are
/// broken between characters. An empty input yields one empty line.
fn wrap_words(text: &str, fits: &dyn Fn(&str) -> bool) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        let candidate = if current.is_empty() {
            word.to_string()
        } else {
            format!("{} {}", current, word)
        };
        if fits(&candidate) {
            current = candidate;
            continue;
        }
        if !current.is_empty() {
            lines.push(std::mem::take(&mut current));
        }
        if fits(word) {
            current = word.to_string();
        } else {
            for ch in word.chars() {
                current.push(ch);
                if !fits(&current) && current.chars().count() > 1 {
                    current.pop();
                    lines.push(std::mem::take(&mut current));
                    current.push(ch);
                }
            }
        }
    }

    if !current.is_empty() || lines.is_empty() {
        lines.push(current);
    }
    lines
}

/// Lay out the whole report in its five fixed sections.
pub fn layout_report<M: TextMeasure + ?Sized>(report: &HealthReport, measure: &M) -> Pages {
    let mut layout = Layout::new(measure);

    layout.section("1. Analysis of Your Results");
    for result in &report.results {
        layout.test_result(result);
    }

    layout.section("2. Recommendations");
    layout.bullets("To Improve:", &report.recommendations.to_improve);
    layout.bullets("To Maintain:", &report.recommendations.to_maintain);

    layout.section("3. Summary");
    layout.paragraph(&report.summary);

    layout.section("4. Final Score");
    for line in &report.score_lines {
        layout.paragraph(line);
    }

    layout.section("5. Medical Disclaimer");
    layout.paragraph(&report.disclaimer);

    layout.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::parse::Recommendations;

    /// Every character is 2 mm wide regardless of font.
    struct Fixed;

    impl TextMeasure for Fixed {
        fn width_mm(&self, text: &str, _weight: Weight, _size_pt: f32) -> f32 {
            text.chars().count() as f32 * 2.0
        }
    }

    fn texts(pages: &Pages) -> Vec<&str> {
        pages
            .iter()
            .flatten()
            .filter_map(|op| match op {
                DrawOp::Text { text, .. } => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn wrap_breaks_on_words() {
        let fits = |s: &str| s.chars().count() <= 10;
        assert_eq!(wrap_words("aaa bbb ccc ddd", &fits), vec!["aaa bbb", "ccc ddd"]);
    }

    #[test]
    fn wrap_hard_breaks_long_words() {
        let fits = |s: &str| s.chars().count() <= 4;
        assert_eq!(wrap_words("abcdefghij", &fits), vec!["abcd", "efgh", "ij"]);
    }

    #[test]
    fn wrap_of_empty_text_is_one_blank_line() {
        let fits = |_: &str| true;
        assert_eq!(wrap_words("", &fits), vec![String::new()]);
    }

    #[test]
    fn section_heading_is_accent_bold() {
        let mut layout = Layout::new(&Fixed);
        layout.section("3. Summary");
        assert_eq!(layout.y(), 10.0 + 6.0 + 10.0 + 6.0);
        let pages = layout.finish();
        match &pages[0][0] {
            DrawOp::Text {
                x, weight, color, size, ..
            } => {
                assert_eq!(*x, MARGIN_MM);
                assert_eq!(*weight, Weight::Bold);
                assert_eq!(*color, Color::ACCENT);
                assert_eq!(*size, 14.0);
            }
            other => panic!("expected text, got {other:?}"),
        }
    }

    #[test]
    fn ensure_space_breaks_at_260() {
        let mut layout = Layout::new(&Fixed);
        layout.y = 250.0;
        layout.ensure_space(9.0);
        assert_eq!(layout.page_count(), 1);
        layout.ensure_space(11.0);
        assert_eq!(layout.page_count(), 2);
        assert_eq!(layout.y(), MARGIN_MM);
    }

    #[test]
    fn card_box_is_drawn_under_its_text() {
        let mut layout = Layout::new(&Fixed);
        layout.test_result(&TestResult {
            indicator: "Glucose".into(),
            result: "95 mg/dL".into(),
            normal_range: "70 - 100 mg/dL".into(),
            comment: "Fine.".into(),
        });
        let pages = layout.finish();
        let ops = &pages[0];
        match &ops[0] {
            DrawOp::Rect {
                x, width, height, fill, ..
            } => {
                assert_eq!(*x, 10.0);
                assert_eq!(*width, 190.0);
                assert_eq!(*height, 8.0 + 7.0 * 3.0 + 6.0);
                assert_eq!(*fill, Color::CARD_FILL);
            }
            other => panic!("expected rect first, got {other:?}"),
        }
        assert_eq!(
            texts(&pages),
            vec![
                "Indicator: Glucose",
                "Result: 95 mg/dL",
                "Normal Range: 70 - 100 mg/dL",
                "Fine."
            ]
        );
    }

    #[test]
    fn long_comment_grows_the_card() {
        let mut layout = Layout::new(&Fixed);
        let comment = "word ".repeat(40);
        layout.test_result(&TestResult {
            indicator: "X".into(),
            comment,
            ..Default::default()
        });
        let pages = layout.finish();
        let height = match &pages[0][0] {
            DrawOp::Rect { height, .. } => *height,
            _ => unreachable!(),
        };
        // 200 chars at 2 mm in 188 mm lines: 94 chars per line, three lines.
        assert_eq!(height, 8.0 + 7.0 * 2.0 + 7.0 * 3.0 + 6.0);
    }

    #[test]
    fn arabic_bullet_is_right_aligned_with_bullet_on_the_right() {
        let mut layout = Layout::new(&Fixed);
        layout.bullets("To Improve:", &["اشرب مية.".to_string()]);
        let pages = layout.finish();
        match &pages[0][1] {
            DrawOp::Text { x, text, .. } => {
                assert!(text.ends_with(" •"), "{text}");
                let width = text.chars().count() as f32 * 2.0;
                assert!((x + width - 200.0).abs() < 1e-3);
            }
            other => panic!("expected text, got {other:?}"),
        }
    }

    /// Right edge of every text op, for checking right alignment.
    fn right_edges(ops: &[DrawOp]) -> Vec<(String, f32)> {
        ops.iter()
            .filter_map(|op| match op {
                DrawOp::Text { x, text, .. } => {
                    Some((text.clone(), x + text.chars().count() as f32 * 2.0))
                }
                _ => None,
            })
            .collect()
    }

    #[test]
    fn arabic_paragraph_is_right_aligned() {
        let mut layout = Layout::new(&Fixed);
        layout.paragraph("صحتك كويسة بشكل عام");
        let pages = layout.finish();
        let edges = right_edges(&pages[0]);
        assert_eq!(edges.len(), 1);
        let (text, right) = &edges[0];
        assert!((right - RIGHT_EDGE_MM).abs() < 1e-3, "{text} ends at {right}");
        assert!(!text.contains(BULLET));
    }

    #[test]
    fn arabic_card_comment_is_right_aligned_and_labels_stay_left() {
        let mut layout = Layout::new(&Fixed);
        layout.test_result(&TestResult {
            indicator: "Hemoglobin".into(),
            result: "11 g/dL".into(),
            normal_range: "13 - 17 g/dL".into(),
            comment: "أقل من الطبيعي شوية".into(),
        });
        let pages = layout.finish();
        let texts: Vec<(f32, String)> = pages[0]
            .iter()
            .filter_map(|op| match op {
                DrawOp::Text { x, text, .. } => Some((*x, text.clone())),
                _ => None,
            })
            .collect();
        assert_eq!(texts.len(), 4);
        for (x, _) in &texts[..3] {
            assert_eq!(*x, CARD_TEXT_X_MM);
        }
        let (x, comment) = &texts[3];
        let right = x + comment.chars().count() as f32 * 2.0;
        assert!((right - RIGHT_EDGE_MM).abs() < 1e-3, "{comment} ends at {right}");
        assert!(*x > CARD_TEXT_X_MM);
    }

    #[test]
    fn latin_bullet_is_prefixed() {
        let mut layout = Layout::new(&Fixed);
        layout.bullets("To Maintain:", &["Walk daily".to_string()]);
        let pages = layout.finish();
        assert_eq!(texts(&pages), vec!["To Maintain:", "• Walk daily"]);
    }

    #[test]
    fn overflowing_paragraph_continues_on_next_page() {
        let mut layout = Layout::new(&Fixed);
        let text = vec!["line"; 40].join("\n");
        layout.paragraph(&text);
        assert_eq!(layout.page_count(), 2);
    }

    #[test]
    fn empty_paragraph_draws_nothing() {
        let mut layout = Layout::new(&Fixed);
        layout.paragraph("   ");
        assert_eq!(layout.y(), MARGIN_MM);
        assert!(layout.finish()[0].is_empty());
    }

    #[test]
    fn report_has_five_sections_in_order() {
        let report = HealthReport {
            results: vec![TestResult {
                indicator: "Hb".into(),
                ..Default::default()
            }],
            recommendations: Recommendations {
                to_improve: vec!["Sleep".into()],
                to_maintain: vec![],
            },
            summary: "Good.".into(),
            score_lines: vec!["80/100".into()],
            disclaimer: "Not advice.".into(),
        };
        let pages = layout_report(&report, &Fixed);
        let all = texts(&pages);
        let headings: Vec<_> = all.iter().filter(|t| t.starts_with(char::is_numeric)).collect();
        assert_eq!(
            headings,
            vec![
                &"1. Analysis of Your Results",
                &"2. Recommendations",
                &"3. Summary",
                &"4. Final Score",
                &"80/100",
                &"5. Medical Disclaimer"
            ]
        );
        assert!(all.contains(&"Not advice."));
    }
}
