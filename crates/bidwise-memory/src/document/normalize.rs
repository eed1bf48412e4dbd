//! Text cleanup applied before chunking and before querying.

use std::sync::LazyLock;

use regex::Regex;

static SPACE_RUNS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r" {2,}").expect("valid regex"));
static NEWLINE_RUNS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n{3,}").expect("valid regex"));

/// Clean extracted document text.
///
/// Strips the BOM and control characters, turns tabs into spaces, collapses
/// runs of spaces and caps blank lines at one. Newlines are preserved.
#[must_use]
pub fn normalize_document_text(text: &str) -> String {
    let text = text.trim_start_matches('\u{feff}').replace("\r\n", "\n");
    let cleaned: String = text
        .chars()
        .map(|c| if c == '\t' { ' ' } else { c })
        .filter(|c| !c.is_control() || *c == '\n')
        .collect();
    let cleaned = SPACE_RUNS.replace_all(&cleaned, " ");
    let cleaned = NEWLINE_RUNS.replace_all(&cleaned, "\n\n");
    cleaned.trim().to_owned()
}

/// Canonical form of a search query: single spaces, trimmed, lowercase.
#[must_use]
pub fn normalize_query(query: &str) -> String {
    query
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}
