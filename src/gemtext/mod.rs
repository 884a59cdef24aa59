//! `text/gemini` documents
//!
//! [`itemize`] classifies each line of a document; [`html::to_html`] renders
//! the result.

pub mod html;

use std::io::BufRead;

use crate::header::split_field;

/// What a gemtext line is, decided by its prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind {
    Link,
    Preformatted,
    Text,
    List,
    Heading1,
    Heading2,
    Heading3,
    Quote,
}

/// One classified line of a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Line {
    pub kind: LineKind,
    /// The line as received, minus its terminator.
    pub raw: String,
    /// Text to show for the line.
    pub display: String,
    /// Target of a link line.
    pub link: Option<String>,
}

impl Line {
    fn new(kind: LineKind, raw: &str, display: &str) -> Self {
        Self {
            kind,
            raw: raw.to_string(),
            display: display.trim().to_string(),
            link: None,
        }
    }

    fn link(raw: &str, rest: &str) -> Self {
        let (target, label) = split_field(rest.trim());
        let target = target.trim();
        let label = label.map(str::trim).unwrap_or(target);
        Self {
            kind: LineKind::Link,
            raw: raw.to_string(),
            display: label.to_string(),
            link: Some(target.to_string()),
        }
    }
}

/// Split a gemtext document into classified lines.
///
/// Preformat toggle lines are consumed and not returned. A final line with
/// no terminator is kept.
pub fn itemize<R: BufRead>(reader: R) -> std::io::Result<Vec<Line>> {
    let mut preformatted = false;
    let mut lines = Vec::new();

    for raw in reader.lines() {
        let raw = raw?;
        let raw = raw.trim_end_matches(['\r', '\n']);

        if raw.starts_with("```") {
            preformatted = !preformatted;
            continue;
        }

        let line = if preformatted {
            Line::new(LineKind::Preformatted, raw, raw)
        } else if let Some(rest) = raw.strip_prefix("=>") {
            Line::link(raw, rest)
        } else if let Some(rest) = raw.strip_prefix("* ") {
            Line::new(LineKind::List, raw, rest)
        } else if let Some(rest) = raw.strip_prefix('>') {
            Line::new(LineKind::Quote, raw, rest)
        } else if let Some(rest) = raw.strip_prefix("###") {
            Line::new(LineKind::Heading3, raw, rest)
        } else if let Some(rest) = raw.strip_prefix("##") {
            Line::new(LineKind::Heading2, raw, rest)
        } else if let Some(rest) = raw.strip_prefix('#') {
            Line::new(LineKind::Heading1, raw, rest)
        } else {
            Line::new(LineKind::Text, raw, raw)
        };
        lines.push(line);
    }

    Ok(lines)
}

/// Itemize a document already held in memory.
pub fn parse(document: &str) -> Vec<Line> {
    // Reading valid UTF-8 from memory cannot fail
    itemize(document.as_bytes()).unwrap_or_default()
}
