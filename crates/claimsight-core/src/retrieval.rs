//! Hybrid retriever: semantic search with optional lexical filtering.
//!
//! The retriever runs one k-nearest-neighbor pass against a
//! [`SimilarityIndex`], optionally intersected with a case-insensitive
//! substring filter over chunk text, and projects the hits into a ranked
//! [`EvidenceSet`]. The filter is applied by the index *before* truncation
//! to k, so a lexically-matching chunk is never crowded out by
//! higher-scoring chunks that fail the filter.
//!
//! Retry passes use [`RetrievalPlan::widen`], which multiplies k (capped at
//! a hard maximum) and drops the lexical filter.

use std::sync::Arc;

use uuid::Uuid;

use crate::error::EngineError;
use crate::index::SimilarityIndex;
use crate::models::{EvidenceSet, QueryFilters, RetrievalResult};

/// Parameters for one retrieval pass.
#[derive(Debug, Clone)]
pub struct RetrievalPlan {
    /// Maximum number of results to return.
    pub k: usize,
    /// Optional lexical constraint over chunk text.
    pub must_contain: Option<String>,
}

impl RetrievalPlan {
    pub fn new(k: usize, filters: &QueryFilters) -> Self {
        Self {
            k,
            must_contain: filters.must_contain.clone(),
        }
    }

    /// The mutated plan used after a low-confidence attempt: k grows by
    /// `factor` (capped at `max_k`) and the lexical filter is dropped.
    pub fn widen(&self, factor: usize, max_k: usize) -> Self {
        Self {
            k: (self.k.saturating_mul(factor.max(1))).min(max_k),
            must_contain: None,
        }
    }
}

/// Ranked-evidence retrieval over a [`SimilarityIndex`].
#[derive(Clone)]
pub struct HybridRetriever {
    index: Arc<dyn SimilarityIndex>,
}

impl HybridRetriever {
    pub fn new(index: Arc<dyn SimilarityIndex>) -> Self {
        Self { index }
    }

    /// Run one retrieval pass.
    ///
    /// Returns results ordered by descending score, at most `plan.k` of
    /// them, with 0-based ranks assigned. An empty collection yields an
    /// empty set, not an error; index *failures* are surfaced as
    /// [`EngineError::Index`] so the caller can choose the degraded path.
    pub async fn retrieve(
        &self,
        query_vector: &[f32],
        plan: &RetrievalPlan,
    ) -> Result<EvidenceSet, EngineError> {
        let hits = self
            .index
            .query(query_vector, plan.k, plan.must_contain.as_deref())
            .await?;

        let results = hits
            .into_iter()
            .enumerate()
            .map(|(rank, hit)| RetrievalResult {
                chunk_id: hit.id,
                score: hit.score,
                rank,
                text: hit.text,
                source_id: hit
                    .metadata
                    .get("source_document_id")
                    .and_then(|v| v.as_str())
                    .map(str::to_string),
                metadata: hit.metadata,
            })
            .collect();

        Ok(EvidenceSet {
            id: Uuid::new_v4().to_string(),
            results,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::{IndexEntry, InMemoryIndex};
    use serde_json::json;

    async fn seed() -> Arc<InMemoryIndex> {
        let index = Arc::new(InMemoryIndex::new());
        index
            .upsert(vec![
                IndexEntry {
                    id: "c1".into(),
                    vector: vec![1.0, 0.0],
                    text: "policy excludes flood damage".into(),
                    metadata: json!({ "source_document_id": "doc-7" }),
                },
                IndexEntry {
                    id: "c2".into(),
                    vector: vec![0.6, 0.8],
                    text: "fire damage is covered in full".into(),
                    metadata: json!({}),
                },
            ])
            .await
            .unwrap();
        index
    }

    #[tokio::test]
    async fn test_retrieve_ranks_and_projects_metadata() {
        let retriever = HybridRetriever::new(seed().await);
        let plan = RetrievalPlan::new(2, &QueryFilters::default());
        let evidence = retriever.retrieve(&[1.0, 0.0], &plan).await.unwrap();

        assert_eq!(evidence.results.len(), 2);
        assert_eq!(evidence.results[0].chunk_id, "c1");
        assert_eq!(evidence.results[0].rank, 0);
        assert_eq!(evidence.results[0].source_id.as_deref(), Some("doc-7"));
        assert_eq!(evidence.results[1].rank, 1);
        assert!(evidence.results[0].score >= evidence.results[1].score);
    }

    #[tokio::test]
    async fn test_lexical_filter_narrows_results() {
        let retriever = HybridRetriever::new(seed().await);
        let plan = RetrievalPlan::new(
            5,
            &QueryFilters {
                must_contain: Some("flood".into()),
            },
        );
        let evidence = retriever.retrieve(&[0.6, 0.8], &plan).await.unwrap();
        assert_eq!(evidence.results.len(), 1);
        assert_eq!(evidence.results[0].chunk_id, "c1");
    }

    #[tokio::test]
    async fn test_empty_index_yields_empty_set() {
        let retriever = HybridRetriever::new(Arc::new(InMemoryIndex::new()));
        let plan = RetrievalPlan::new(3, &QueryFilters::default());
        let evidence = retriever.retrieve(&[1.0, 0.0], &plan).await.unwrap();
        assert!(evidence.is_empty());
    }

    #[test]
    fn test_widen_multiplies_caps_and_relaxes() {
        let plan = RetrievalPlan {
            k: 4,
            must_contain: Some("flood".into()),
        };
        let widened = plan.widen(2, 16);
        assert_eq!(widened.k, 8);
        assert!(widened.must_contain.is_none());

        let capped = widened.widen(2, 12);
        assert_eq!(capped.k, 12);
    }
}
