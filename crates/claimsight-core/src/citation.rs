//! Citation tag extraction and validation.
//!
//! Generated answers reference evidence with inline `[#id]` tags. The
//! tracker maps those tags back to the evidence the generator was shown,
//! strips any tag that references evidence it was *not* shown, and reports
//! both sets so the scorer can reward grounded answers and penalize
//! fabricated references.

use std::collections::HashSet;

/// The outcome of resolving citations in a generated answer.
#[derive(Debug, Clone)]
pub struct CitationOutcome {
    /// Answer text with malformed citation tags removed.
    pub text: String,
    /// Ids cited that were present in the shown evidence, deduplicated in
    /// first-mention order.
    pub valid: Vec<String>,
    /// Ids cited that were *not* shown to the generator.
    pub malformed: Vec<String>,
}

/// Scan `text` for `[#id]` tags and validate them against `shown` ids.
///
/// Valid tags are kept in the text; malformed ones are stripped rather than
/// propagated. Tags with an empty id or no closing bracket are treated as
/// plain text and left alone.
pub fn resolve_citations(text: &str, shown: &[String]) -> CitationOutcome {
    let shown: HashSet<&str> = shown.iter().map(String::as_str).collect();

    let mut out = String::with_capacity(text.len());
    let mut valid: Vec<String> = Vec::new();
    let mut malformed: Vec<String> = Vec::new();

    let mut rest = text;
    while let Some(start) = rest.find("[#") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find(']') {
            Some(end) if end > 0 => {
                let id = &after[..end];
                if shown.contains(id) {
                    out.push_str(&rest[start..start + 2 + end + 1]);
                    if !valid.iter().any(|v| v == id) {
                        valid.push(id.to_string());
                    }
                } else {
                    tracing::warn!(citation = id, "stripping citation of unshown evidence");
                    if !malformed.iter().any(|m| m == id) {
                        malformed.push(id.to_string());
                    }
                }
                rest = &after[end + 1..];
            }
            _ => {
                // No closing bracket or empty id: not a tag.
                out.push_str("[#");
                rest = after;
            }
        }
    }
    out.push_str(rest);

    CitationOutcome {
        text: out,
        valid,
        malformed,
    }
}
