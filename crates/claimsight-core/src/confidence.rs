//! Confidence scoring for generated answers.
//!
//! Two strategies, selected by configuration:
//!
//! - **Model-reported** — parse a `Confidence: N` token the generator was
//!   instructed to append; fall back to the heuristic when the token is
//!   absent or unparseable.
//! - **Heuristic** (default) — combine the top retrieval score, the
//!   presence of at least one valid citation, and an answer-length sanity
//!   check. Monotonic: a higher top score or a valid citation never lowers
//!   the result, all else equal.
//!
//! Regardless of strategy, zero retrieval results clamp the score to 2 or
//! below (there is no evidence to ground the answer), and stripped
//! malformed citations cost at least one band.

use serde::{Deserialize, Serialize};

use crate::models::EvidenceSet;

/// How confidence is derived for an attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScoringStrategy {
    /// Parse the generator's own confidence token, falling back to
    /// [`ScoringStrategy::Heuristic`] when missing.
    Model,
    /// Derive confidence from retrieval scores and citations.
    Heuristic,
}

impl Default for ScoringStrategy {
    fn default() -> Self {
        ScoringStrategy::Heuristic
    }
}

/// Everything the scorer looks at for one attempt.
#[derive(Debug)]
pub struct ScoreInputs<'a> {
    /// Generated text after citation resolution (malformed tags stripped).
    pub answer_text: &'a str,
    /// The evidence shown to this attempt.
    pub evidence: &'a EvidenceSet,
    /// Number of distinct valid citations in the answer.
    pub valid_citations: usize,
    /// Number of distinct malformed citations stripped from the answer.
    pub malformed_citations: usize,
    /// Confidence token parsed from the generator output, if any.
    pub model_reported: Option<u8>,
}

/// Confidence scorer for one configured strategy.
#[derive(Debug, Clone, Copy)]
pub struct ConfidenceScorer {
    strategy: ScoringStrategy,
}

impl ConfidenceScorer {
    pub fn new(strategy: ScoringStrategy) -> Self {
        Self { strategy }
    }

    pub fn strategy(&self) -> ScoringStrategy {
        self.strategy
    }

    /// Score an attempt, returning a value in `1..=5`.
    pub fn score(&self, inputs: &ScoreInputs<'_>) -> u8 {
        let base = match self.strategy {
            ScoringStrategy::Model => match inputs.model_reported {
                Some(n) if (1..=5).contains(&n) => n,
                _ => heuristic(inputs),
            },
            ScoringStrategy::Heuristic => heuristic(inputs),
        };

        let mut score = base;
        if inputs.malformed_citations > 0 {
            score = score.saturating_sub(1);
        }
        if inputs.evidence.is_empty() {
            score = score.min(2);
        }
        score.clamp(1, 5)
    }
}

fn heuristic(inputs: &ScoreInputs<'_>) -> u8 {
    if !answer_is_sane(inputs.answer_text) {
        return 1;
    }

    let top = inputs.evidence.top_score().unwrap_or(0.0);
    let base = if top >= 0.85 {
        4
    } else if top >= 0.6 {
        3
    } else if top >= 0.35 {
        2
    } else {
        1
    };

    if inputs.valid_citations > 0 {
        (base + 1).min(5)
    } else {
        base
    }
}

/// Near-empty or error-pattern text forces the lowest band.
fn answer_is_sane(text: &str) -> bool {
    let trimmed = text.trim();
    if trimmed.len() < 10 {
        return false;
    }
    let lower = trimmed.to_lowercase();
    !(lower.starts_with("error") || lower.contains("i encountered an error"))
}

/// Split a generator reply into answer text and an optional trailing
/// `Confidence: N` token.
///
/// Only the last non-empty line is considered, so a confidence value quoted
/// mid-answer is not mistaken for the token. Returns the text with the
/// token line removed and the parsed value when it is in `1..=5`.
pub fn parse_confidence_token(raw: &str) -> (String, Option<u8>) {
    let trimmed = raw.trim_end();
    let last_start = trimmed.rfind('\n').map(|i| i + 1).unwrap_or(0);
    let last_line = trimmed[last_start..].trim();
    let lower = last_line.to_lowercase();

    if let Some(rest) = lower.strip_prefix("confidence") {
        let digit = rest.chars().find(|c| c.is_ascii_digit());
        if let Some(d) = digit {
            let value = d as u8 - b'0';
            if (1..=5).contains(&value) {
                let text = trimmed[..last_start].trim_end().to_string();
                return (text, Some(value));
            }
        }
    }
    (raw.to_string(), None)
}
