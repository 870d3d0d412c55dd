//! Nearest-precedent ranking.
//!
//! A one-pass pipeline over the precedent collection: embed the claim
//! summary, query the similarity index through the retriever (no lexical
//! filter), and map the hits to [`PrecedentMatch`] ordered by descending
//! similarity. No generation, no gate, no retries — a sparse or empty
//! collection simply yields fewer or zero matches.

use std::sync::Arc;

use tracing::warn;

use crate::error::EngineError;
use crate::index::SimilarityIndex;
use crate::models::{PrecedentMatch, QueryFilters};
use crate::pipeline::Embedder;
use crate::retrieval::{HybridRetriever, RetrievalPlan};

/// Similarity search over the precedent collection.
pub struct PrecedentRanker {
    embedder: Arc<dyn Embedder>,
    retriever: HybridRetriever,
}

impl PrecedentRanker {
    pub fn new(embedder: Arc<dyn Embedder>, index: Arc<dyn SimilarityIndex>) -> Self {
        Self {
            embedder,
            retriever: HybridRetriever::new(index),
        }
    }

    /// Return the top-`k` precedents most similar to `summary_text`.
    ///
    /// Deterministic for an unchanged index: repeated calls with the same
    /// summary return the same ordered list. An unreachable index degrades
    /// to an empty list; only embedding failure is surfaced as an error.
    pub async fn find_precedents(
        &self,
        summary_text: &str,
        k: usize,
    ) -> Result<Vec<PrecedentMatch>, EngineError> {
        if summary_text.trim().is_empty() || k == 0 {
            return Ok(Vec::new());
        }

        let vector = self.embedder.embed(summary_text).await?;
        let plan = RetrievalPlan::new(k, &QueryFilters::default());

        let evidence = match self.retriever.retrieve(&vector, &plan).await {
            Ok(evidence) => evidence,
            Err(EngineError::Index(msg)) => {
                warn!(error = %msg, "precedent index unavailable, returning no matches");
                return Ok(Vec::new());
            }
            Err(other) => return Err(other),
        };

        Ok(evidence
            .results
            .into_iter()
            .map(|hit| {
                let outcome = hit
                    .metadata
                    .get("outcome")
                    .and_then(|v| v.as_str())
                    .map(str::to_string);
                let keywords = hit
                    .metadata
                    .get("keywords")
                    .and_then(|v| v.as_array())
                    .map(|arr| {
                        arr.iter()
                            .filter_map(|v| v.as_str().map(str::to_string))
                            .collect()
                    })
                    .unwrap_or_default();
                PrecedentMatch {
                    precedent_id: hit.chunk_id,
                    summary: hit.text,
                    outcome,
                    keywords,
                    similarity_score: hit.score,
                }
            })
            .collect())
    }
}
