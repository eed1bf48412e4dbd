//! Heading detection for section-aware chunking.

use std::sync::LazyLock;

use regex::Regex;

const MAX_HEADING_CHARS: usize = 80;
const PREAMBLE: &str = "서문";

/// A labeled region of a document, in character offsets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    pub name: String,
    pub level: u8,
    pub start: usize,
    pub end: usize,
}

enum HeadingKind {
    Fixed(u8),
    /// Level derived from the number of dotted components.
    Outline,
}

static HEADING_PATTERNS: LazyLock<Vec<(Regex, HeadingKind)>> = LazyLock::new(|| {
    [
        (r"^제\s*\d+\s*장(\s|$)", HeadingKind::Fixed(1)),
        (r"^[IVX]{1,5}\.\s+\S", HeadingKind::Fixed(1)),
        (r"^제\s*\d+\s*절(\s|$)", HeadingKind::Fixed(2)),
        (r"^\[[^\]]{1,40}\]$", HeadingKind::Fixed(2)),
        // a bare number needs its dot: "1. 개요" is a heading, "3 개월" is not
        (r"^\d{1,2}\.\s+\S", HeadingKind::Outline),
        (r"^\d{1,2}(\.\d{1,2}){1,3}\.?\s+\S", HeadingKind::Outline),
        (r"^[가-하]\.\s+\S", HeadingKind::Fixed(5)),
    ]
    .into_iter()
    .map(|(pattern, kind)| (Regex::new(pattern).expect("valid heading regex"), kind))
    .collect()
});

fn heading_level(line: &str) -> Option<u8> {
    if line.is_empty() || line.chars().count() > MAX_HEADING_CHARS {
        return None;
    }
    HEADING_PATTERNS
        .iter()
        .find(|(re, _)| re.is_match(line))
        .map(|(_, kind)| match kind {
            HeadingKind::Fixed(level) => *level,
            HeadingKind::Outline => {
                let label = line.split_whitespace().next().unwrap_or_default();
                let depth = label.trim_end_matches('.').split('.').count();
                u8::try_from(depth + 1).unwrap_or(u8::MAX)
            }
        })
}

/// Split `text` into sections at detected headings.
///
/// Returns an empty vector when no heading is found so callers can fall back to
/// whole-document windowing. Text before the first heading becomes a preamble
/// section when it is not blank.
#[must_use]
pub fn detect_sections(text: &str) -> Vec<Section> {
    let mut headings: Vec<(usize, String, u8)> = Vec::new();
    let mut char_pos = 0;
    for line in text.split_inclusive('\n') {
        let trimmed = line.trim();
        if let Some(level) = heading_level(trimmed) {
            headings.push((char_pos, trimmed.to_owned(), level));
        }
        char_pos += line.chars().count();
    }
    let total = char_pos;

    if headings.is_empty() {
        return Vec::new();
    }

    let mut sections = Vec::with_capacity(headings.len() + 1);
    let first_start = headings[0].0;
    if first_start > 0 {
        let preamble: String = text.chars().take(first_start).collect();
        if !preamble.trim().is_empty() {
            sections.push(Section {
                name: PREAMBLE.into(),
                level: 0,
                start: 0,
                end: first_start,
            });
        }
    }

    for (i, (start, name, level)) in headings.iter().enumerate() {
        let end = headings.get(i + 1).map_or(total, |next| next.0);
        sections.push(Section {
            name: name.clone(),
            level: *level,
            start: *start,
            end,
        });
    }
    sections
}
