//! Core data models used throughout the Claimsight pipeline.
//!
//! These types represent the queries, evidence sets, attempts, and answers
//! that flow through a single pipeline invocation. All of them are owned by
//! that invocation: nothing here is shared across concurrent requests.

use serde::{Deserialize, Serialize};

/// Optional constraints applied during retrieval.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueryFilters {
    /// Case-insensitive substring every retained chunk must contain.
    /// Dropped when the retry controller widens the retrieval plan.
    #[serde(default)]
    pub must_contain: Option<String>,
}

/// A natural-language question entering the answer pipeline.
///
/// Immutable once issued; created per request and discarded after the
/// pipeline returns.
#[derive(Debug, Clone)]
pub struct Query {
    pub text: String,
    pub filters: QueryFilters,
}

impl Query {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            filters: QueryFilters::default(),
        }
    }

    pub fn with_filters(text: impl Into<String>, filters: QueryFilters) -> Self {
        Self {
            text: text.into(),
            filters,
        }
    }
}

/// A single ranked piece of evidence produced by the retriever.
#[derive(Debug, Clone, Serialize)]
pub struct RetrievalResult {
    /// Id of the stored chunk this result projects.
    pub chunk_id: String,
    /// Similarity score in `[0.0, 1.0]`.
    pub score: f64,
    /// 0-based rank within the evidence set (descending score).
    pub rank: usize,
    /// Chunk text, carried so the assembler can pack it without a second
    /// index round-trip.
    pub text: String,
    /// Id of the source document the chunk was cut from, when known.
    pub source_id: Option<String>,
    /// Collection-specific payload fields (position metadata for chunks;
    /// outcome and keywords for precedents).
    #[serde(skip_serializing)]
    pub metadata: serde_json::Value,
}

/// The ranked evidence produced by one retrieval pass.
///
/// Ephemeral: never persisted, referenced from attempts by its `id` only.
#[derive(Debug, Clone)]
pub struct EvidenceSet {
    /// Unique id for this retrieval pass (referenced by [`Attempt`]).
    pub id: String,
    /// Results in descending score order.
    pub results: Vec<RetrievalResult>,
}

impl EvidenceSet {
    /// An evidence set with no results, used on the degraded path when the
    /// index is empty or unreachable.
    pub fn empty() -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            results: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// Highest similarity score in the set, if any.
    pub fn top_score(&self) -> Option<f64> {
        self.results.first().map(|r| r.score)
    }

    pub fn contains(&self, chunk_id: &str) -> bool {
        self.results.iter().any(|r| r.chunk_id == chunk_id)
    }
}

/// One generation attempt accumulated by the retry controller.
#[derive(Debug, Clone, Serialize)]
pub struct Attempt {
    /// 0-based, strictly increasing, bounded by `max_retries`.
    pub attempt_number: u32,
    /// The exact prompt sent to the generator.
    pub prompt_snapshot: String,
    /// Generator output after citation stripping (empty on generation
    /// failure).
    pub generated_text: String,
    /// Confidence assigned to this attempt, in `1..=5`.
    pub confidence: u8,
    /// Id of the [`EvidenceSet`] this attempt was grounded in.
    pub retrieval_set_id: String,
}

/// The terminal artifact of the answer pipeline.
///
/// Invariant: every id in `citations` appears in the evidence shown to the
/// accepted attempt — an answer never cites evidence it was not given.
#[derive(Debug, Clone, Serialize)]
pub struct Answer {
    pub text: String,
    /// Confidence in `1..=5`. Always present; low confidence is surfaced,
    /// never suppressed.
    pub confidence: u8,
    /// Chunk ids the answer cites, deduplicated in first-mention order.
    pub citations: Vec<String>,
    /// The accepted attempt's evidence, for source attribution.
    pub sources: Vec<RetrievalResult>,
    /// All attempts made for this query, in order.
    pub attempts: Vec<Attempt>,
    /// True iff more than one attempt was made.
    pub healed: bool,
}

impl Answer {
    /// Number of self-healing retries that ran (`attempts - 1`).
    pub fn healed_attempts(&self) -> usize {
        self.attempts.len().saturating_sub(1)
    }
}

/// A historical case matched against a claim summary.
///
/// Ordered descending by `similarity_score`; no retry semantics apply.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrecedentMatch {
    pub precedent_id: String,
    pub summary: String,
    pub outcome: Option<String>,
    pub keywords: Vec<String>,
    pub similarity_score: f64,
}
