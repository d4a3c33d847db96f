//! Lightweight line-oriented rendering of assistant answers.
//!
//! Only headings (`###`), bullets (`* ` / `- `), blank-line spacers and
//! `**bold**` spans are recognised. Everything else is literal text.

use once_cell::sync::Lazy;
use regex::Regex;

static BOLD: Lazy<Regex> = Lazy::new(|| Regex::new(r"\*\*(.*?)\*\*").expect("valid bold pattern"));

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inline {
    Text(String),
    Bold(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind {
    Heading,
    Bullet,
    Spacer,
    Paragraph,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Line {
    Heading(Vec<Inline>),
    Bullet(Vec<Inline>),
    Spacer,
    Paragraph(Vec<Inline>),
}

#[cfg(test)]
impl Line {
    pub fn kind(&self) -> LineKind {
        match self {
            Line::Heading(_) => LineKind::Heading,
            Line::Bullet(_) => LineKind::Bullet,
            Line::Spacer => LineKind::Spacer,
            Line::Paragraph(_) => LineKind::Paragraph,
        }
    }

    /// Markdown text that classifies back to the same kind of line.
    pub fn to_source(&self) -> String {
        match self {
            Line::Heading(spans) => format!("### {}", inline_source(spans)),
            Line::Bullet(spans) => format!("- {}", inline_source(spans)),
            Line::Spacer => String::new(),
            Line::Paragraph(spans) => inline_source(spans),
        }
    }
}

pub fn classify(line: &str) -> LineKind {
    let trimmed = line.trim();
    if trimmed.starts_with("###") {
        LineKind::Heading
    } else if trimmed.starts_with("* ") || trimmed.starts_with("- ") {
        LineKind::Bullet
    } else if trimmed.is_empty() {
        LineKind::Spacer
    } else {
        LineKind::Paragraph
    }
}

pub fn render(text: &str) -> Vec<Line> {
    if text.is_empty() {
        return Vec::new();
    }
    text.split('\n').map(render_line).collect()
}

fn render_line(line: &str) -> Line {
    let trimmed = line.trim();
    match classify(line) {
        LineKind::Heading => Line::Heading(inline(trimmed.trim_start_matches('#').trim())),
        // both markers are a single ASCII char followed by whitespace
        LineKind::Bullet => Line::Bullet(inline(trimmed[1..].trim_start())),
        LineKind::Spacer => Line::Spacer,
        LineKind::Paragraph => Line::Paragraph(inline(line)),
    }
}

/// Splits on paired `**` delimiters. Unpaired asterisks stay in the text.
pub fn inline(text: &str) -> Vec<Inline> {
    let mut spans = Vec::new();
    let mut last = 0;

    for caps in BOLD.captures_iter(text) {
        let (Some(whole), Some(inner)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        if whole.start() > last {
            spans.push(Inline::Text(text[last..whole.start()].to_string()));
        }
        spans.push(Inline::Bold(inner.as_str().to_string()));
        last = whole.end();
    }

    if last < text.len() {
        spans.push(Inline::Text(text[last..].to_string()));
    }
    spans
}

#[cfg(test)]
fn inline_source(spans: &[Inline]) -> String {
    spans
        .iter()
        .map(|span| match span {
            Inline::Text(t) => t.clone(),
            Inline::Bold(b) => format!("**{}**", b),
        })
        .collect()
}
