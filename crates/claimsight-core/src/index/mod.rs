//! Similarity-index abstraction.
//!
//! The [`SimilarityIndex`] trait defines the read/write surface the
//! pipeline needs from a vector store, enabling pluggable backends
//! (in-memory, remote vector databases). Implementations must be
//! `Send + Sync` to work with async runtimes.
//!
//! Each logical collection (document chunks, precedents) is a separate
//! index instance; the core never mixes collections in one query.

pub mod memory;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::EngineError;

pub use memory::InMemoryIndex;

/// A stored (vector, payload) pair.
///
/// `text` is the embedded content (chunk text or precedent summary);
/// `metadata` carries collection-specific fields such as
/// `source_document_id`, `position`, `outcome`, or `keywords`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexEntry {
    pub id: String,
    pub vector: Vec<f32>,
    pub text: String,
    #[serde(default)]
    pub metadata: serde_json::Value,
}

/// An entry returned from a nearest-neighbor query, with its similarity
/// score in `[0.0, 1.0]`.
#[derive(Debug, Clone)]
pub struct ScoredEntry {
    pub id: String,
    pub score: f64,
    pub text: String,
    pub metadata: serde_json::Value,
}

/// Read/write API of a similarity index.
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`upsert`](SimilarityIndex::upsert) | Insert or replace entries by id |
/// | [`query`](SimilarityIndex::query) | k-nearest-neighbor search with optional lexical filter |
/// | [`count`](SimilarityIndex::count) | Number of stored entries |
///
/// Writes happen only during out-of-band corpus loading; query paths treat
/// the index as read-only and an empty index as a valid, empty result.
#[async_trait]
pub trait SimilarityIndex: Send + Sync {
    /// Insert entries, replacing any existing entry with the same id.
    async fn upsert(&self, entries: Vec<IndexEntry>) -> Result<(), EngineError>;

    /// Return up to `k` entries by descending similarity to `vector`.
    ///
    /// When `must_contain` is given, only entries whose text contains the
    /// substring (case-insensitive) are considered, before truncation to
    /// `k`. An empty index yields an empty list, not an error.
    async fn query(
        &self,
        vector: &[f32],
        k: usize,
        must_contain: Option<&str>,
    ) -> Result<Vec<ScoredEntry>, EngineError>;

    /// Number of entries currently stored.
    async fn count(&self) -> Result<usize, EngineError>;
}

/// Compute cosine similarity between two embedding vectors.
///
/// Returns a value in `[-1.0, 1.0]`:
/// - `1.0` = identical direction
/// - `0.0` = orthogonal (unrelated)
/// - `-1.0` = opposite direction
///
/// Returns `0.0` for empty vectors or vectors of different lengths.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        return 0.0;
    }

    dot / denom
}

/// Map a raw cosine value onto the `[0.0, 1.0]` relevance scale used by
/// the retriever. Anti-correlated vectors clamp to `0.0` rather than going
/// negative, so unrelated content scores near zero instead of mid-scale.
pub fn similarity_score(cosine: f32) -> f64 {
    f64::from(cosine.max(0.0))
}
