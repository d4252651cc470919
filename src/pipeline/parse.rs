//! Parsing: split the model's five-section answer into a [`HealthReport`].
//!
//! The prompt asks for numbered headings, labelled fields and `*` bullets,
//! but models decorate freely (`**2. Recommendations**`, `## 3. Summary:`,
//! `**Your Result:** 13.5`). Headings are therefore matched line by line on
//! their names with decoration ignored, and emphasis markers are stripped
//! from every extracted value. Anything missing yields an empty field rather
//! than an error: a partial report is still worth rendering.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// One lab test line from section 1.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestResult {
    pub indicator: String,
    pub result: String,
    pub normal_range: String,
    /// Explanation, usually Egyptian Arabic.
    pub comment: String,
}

/// Section 2 bullet lists.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recommendations {
    pub to_improve: Vec<String>,
    pub to_maintain: Vec<String>,
}

/// The structured content of an analysed report.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthReport {
    pub results: Vec<TestResult>,
    pub recommendations: Recommendations,
    pub summary: String,
    /// Section 4 lines, with any `Metric:` label removed.
    pub score_lines: Vec<String>,
    pub disclaimer: String,
}

impl HealthReport {
    /// True when no section produced any content.
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
            && self.recommendations.to_improve.is_empty()
            && self.recommendations.to_maintain.is_empty()
            && self.summary.is_empty()
            && self.score_lines.is_empty()
            && self.disclaimer.is_empty()
    }

    /// Append another page's report to this one.
    ///
    /// Lists and score lines are appended in order, summaries are joined as
    /// separate paragraphs and the first non-empty disclaimer is kept.
    pub fn merge(&mut self, other: HealthReport) {
        self.results.extend(other.results);
        self.recommendations
            .to_improve
            .extend(other.recommendations.to_improve);
        self.recommendations
            .to_maintain
            .extend(other.recommendations.to_maintain);
        if !other.summary.is_empty() {
            if !self.summary.is_empty() {
                self.summary.push_str("\n\n");
            }
            self.summary.push_str(&other.summary);
        }
        self.score_lines.extend(other.score_lines);
        if self.disclaimer.is_empty() {
            self.disclaimer = other.disclaimer;
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Results = 0,
    Recommendations = 1,
    Summary = 2,
    Score = 3,
    Disclaimer = 4,
}

static RE_HEADING: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)^[\s#>*_]*[1-5]\s*[.)]\s*[*_]*\s*(analysis of your results|recommendations|summary|final score|medical disclaimer)\s*[*_]*\s*:?\s*[*_]*\s*(.*)$",
    )
    .unwrap()
});

/// `Indicator:` at the start of a line, after list or emphasis markers.
static RE_INDICATOR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^[ \t>*_\-•#\d.)]*Indicator\s*:").unwrap());

/// Markdown horizontal rule: `---`, `***`, `___`, `===`.
static RE_RULE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*([-*_=])(\s*[-*_=]){2,}\s*$").unwrap());

fn heading_section(line: &str) -> Option<(Section, &str)> {
    let caps = RE_HEADING.captures(line)?;
    let section = match caps.get(1)?.as_str().to_ascii_lowercase().as_str() {
        "analysis of your results" => Section::Results,
        "recommendations" => Section::Recommendations,
        "summary" => Section::Summary,
        "final score" => Section::Score,
        _ => Section::Disclaimer,
    };
    let rest = caps.get(2).map_or("", |m| m.as_str());
    Some((section, rest))
}

/// Split an answer into its five section bodies.
///
/// Text before the first heading belongs to section 1, matching answers
/// that omit the first heading entirely.
fn split_sections(text: &str) -> [String; 5] {
    let mut sections: [String; 5] = Default::default();
    let mut current = Section::Results;

    for line in text.lines() {
        if let Some((section, rest)) = heading_section(line) {
            current = section;
            if !rest.trim().is_empty() {
                push_line(&mut sections[current as usize], rest);
            }
            continue;
        }
        push_line(&mut sections[current as usize], line);
    }
    sections
}

fn push_line(buf: &mut String, line: &str) {
    buf.push_str(line);
    buf.push('\n');
}

/// Remove markdown emphasis and surrounding whitespace.
fn clean(value: &str) -> String {
    value
        .replace("**", "")
        .replace("__", "")
        .trim()
        .trim_matches(|c: char| c == '*' || c == '_' || c.is_whitespace())
        .to_string()
}

/// Text after the first colon of the first line containing any of `labels`,
/// plus wrapped continuation lines up to the next blank line, rule, heading
/// or label.
fn labelled_value(lines: &[&str], labels: &[&str]) -> String {
    let Some(start) = lines
        .iter()
        .position(|l| labels.iter().any(|label| l.contains(label)))
    else {
        return String::new();
    };

    let mut value = lines[start]
        .split_once(':')
        .map(|(_, v)| clean(v))
        .unwrap_or_default();

    for line in &lines[start + 1..] {
        if ends_continuation(line) {
            break;
        }
        let extra = clean(line);
        if !extra.is_empty() {
            if !value.is_empty() {
                value.push(' ');
            }
            value.push_str(&extra);
        }
    }
    value
}

fn has_field_label(line: &str) -> bool {
    ["Result:", "Normal Range:", "Comment:"]
        .iter()
        .any(|label| line.contains(label))
}

fn ends_continuation(line: &str) -> bool {
    let trimmed = line.trim();
    trimmed.is_empty()
        || has_field_label(line)
        || RE_RULE.is_match(line)
        || trimmed.starts_with('#')
        || heading_section(line).is_some()
}

fn parse_results(section: &str) -> Vec<TestResult> {
    RE_INDICATOR
        .split(section)
        .skip(1)
        .filter_map(|chunk| {
            let lines: Vec<&str> = chunk.trim().lines().collect();
            let indicator = clean(lines.first()?);
            if indicator.is_empty() {
                return None;
            }
            Some(TestResult {
                indicator,
                result: labelled_value(&lines, &["Your Result:", "Result:"]),
                normal_range: labelled_value(&lines, &["Normal Range:"]),
                comment: labelled_value(&lines, &["Comment:"]),
            })
        })
        .collect()
}

/// Which list a `To Improve` / `To Maintain` sub-heading opens, and any item
/// written inline after its colon.
///
/// The label must open the line (after bullet and emphasis markers) and be
/// followed by a colon, a parenthesised gloss or nothing, so a bullet that
/// merely mentions "to maintain" stays a bullet.
fn list_heading(line: &str) -> Option<(List, String)> {
    let stripped = line.trim_start_matches(|c: char| {
        c.is_whitespace() || matches!(c, '*' | '-' | '•' | '_' | '#' | '>')
    });
    let (list, rest) = if let Some(rest) = stripped.strip_prefix("To Improve") {
        (List::Improve, rest)
    } else if let Some(rest) = stripped.strip_prefix("To Maintain") {
        (List::Maintain, rest)
    } else {
        return None;
    };

    let rest = rest.trim_start_matches(|c: char| c.is_whitespace() || c == '*' || c == '_');
    if !(rest.is_empty() || rest.starts_with(':') || rest.starts_with('(')) {
        return None;
    }
    let inline = rest.split_once(':').map(|(_, v)| clean(v)).unwrap_or_default();
    Some((list, inline))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum List {
    Improve,
    Maintain,
}

fn parse_recommendations(section: &str) -> Recommendations {
    let mut recs = Recommendations::default();
    let mut current: Option<List> = None;

    for raw in section.lines() {
        let line = raw.trim();

        let item = if let Some((list, inline)) = list_heading(line) {
            current = Some(list);
            inline
        } else if line.starts_with(['*', '-', '•']) {
            clean(line.trim_start_matches(['*', '-', '•']))
        } else {
            continue;
        };

        if item.is_empty() {
            continue;
        }
        match current {
            Some(List::Improve) => recs.to_improve.push(item),
            Some(List::Maintain) => recs.to_maintain.push(item),
            None => {}
        }
    }
    recs
}

fn parse_score(section: &str) -> Vec<String> {
    section
        .lines()
        .map(|line| clean(&line.replace("Metric:", "")))
        .filter(|line| !line.is_empty())
        .collect()
}

fn parse_disclaimer(section: &str) -> String {
    let text = clean(section);
    text.trim_matches(|c: char| c == '"' || c == '“' || c == '”' || c.is_whitespace())
        .to_string()
}

/// Parse one model answer.
pub fn parse_report(text: &str) -> HealthReport {
    let normalised = text.replace("\r\n", "\n");
    let [results, recommendations, summary, score, disclaimer] = split_sections(&normalised);

    HealthReport {
        results: parse_results(&results),
        recommendations: parse_recommendations(&recommendations),
        summary: summary.trim().to_string(),
        score_lines: parse_score(&score),
        disclaimer: parse_disclaimer(&disclaimer),
    }
}

/// Parse each page answer separately and merge them in order.
pub fn parse_pages<'a>(answers: impl IntoIterator<Item = &'a str>) -> HealthReport {
    let mut merged = HealthReport::default();
    for answer in answers {
        merged.merge(parse_report(answer));
    }
    merged
}
