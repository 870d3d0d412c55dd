//! In-memory [`SimilarityIndex`] implementation.
//!
//! Uses a `Vec` behind `std::sync::RwLock`: query paths take the read lock,
//! corpus loading takes the write lock. Search is brute-force cosine over
//! all stored vectors, which is exact and fast enough for the collection
//! sizes a single claims workspace holds.
//!
//! Insertion order is preserved so that equal-score ties break stably.

use std::sync::RwLock;

use async_trait::async_trait;

use crate::error::EngineError;

use super::{cosine_similarity, similarity_score, IndexEntry, ScoredEntry, SimilarityIndex};

/// Brute-force in-memory similarity index.
#[derive(Default)]
pub struct InMemoryIndex {
    entries: RwLock<Vec<IndexEntry>>,
}

impl InMemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SimilarityIndex for InMemoryIndex {
    async fn upsert(&self, new_entries: Vec<IndexEntry>) -> Result<(), EngineError> {
        let mut entries = self
            .entries
            .write()
            .map_err(|_| EngineError::Index("index lock poisoned".into()))?;
        for entry in new_entries {
            // Replace in place to keep the original insertion position.
            match entries.iter_mut().find(|e| e.id == entry.id) {
                Some(existing) => *existing = entry,
                None => entries.push(entry),
            }
        }
        Ok(())
    }

    async fn query(
        &self,
        vector: &[f32],
        k: usize,
        must_contain: Option<&str>,
    ) -> Result<Vec<ScoredEntry>, EngineError> {
        if k == 0 {
            return Ok(Vec::new());
        }
        let entries = self
            .entries
            .read()
            .map_err(|_| EngineError::Index("index lock poisoned".into()))?;

        let needle = must_contain.map(|s| s.to_lowercase());

        let mut scored: Vec<ScoredEntry> = entries
            .iter()
            .filter(|e| match &needle {
                Some(n) => e.text.to_lowercase().contains(n.as_str()),
                None => true,
            })
            .map(|e| ScoredEntry {
                id: e.id.clone(),
                score: similarity_score(cosine_similarity(vector, &e.vector)),
                text: e.text.clone(),
                metadata: e.metadata.clone(),
            })
            .collect();

        // Stable sort: equal scores keep insertion order.
        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        scored.truncate(k);
        Ok(scored)
    }

    async fn count(&self) -> Result<usize, EngineError> {
        let entries = self
            .entries
            .read()
            .map_err(|_| EngineError::Index("index lock poisoned".into()))?;
        Ok(entries.len())
    }
}
