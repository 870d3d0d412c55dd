//! Corpus loading.
//!
//! Reads the chunk and precedent collections from JSON files and upserts
//! them into their in-memory similarity indexes at startup. Records may
//! carry a precomputed embedding vector; records without one are embedded
//! in batches through the configured provider before insertion.
//!
//! Loading is idempotent: record ids are stable, so reloading the same
//! file replaces entries in place instead of duplicating them.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use claimsight_core::index::{IndexEntry, SimilarityIndex};

use crate::embedding::OpenAiEmbedder;

const EMBED_BATCH_SIZE: usize = 64;

/// One evidence chunk as stored in `chunks.json`.
#[derive(Debug, Deserialize)]
pub struct ChunkRecord {
    #[serde(default)]
    pub id: Option<String>,
    pub text: String,
    #[serde(default)]
    pub source_document_id: Option<String>,
    #[serde(default)]
    pub embedding: Option<Vec<f32>>,
}

/// One historical case as stored in `precedents.json`.
#[derive(Debug, Deserialize)]
pub struct PrecedentRecord {
    #[serde(default)]
    pub id: Option<String>,
    pub summary: String,
    #[serde(default)]
    pub outcome: Option<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub embedding: Option<Vec<f32>>,
}

/// Load `chunks.json` into the evidence index. Returns the number of
/// chunks loaded.
pub async fn load_chunks(
    path: &Path,
    index: &Arc<dyn SimilarityIndex>,
    embedder: &OpenAiEmbedder,
) -> Result<usize> {
    let records: Vec<ChunkRecord> = read_json(path)?;

    let entries = records
        .into_iter()
        .map(|record| IndexEntry {
            id: record
                .id
                .unwrap_or_else(|| Uuid::new_v4().to_string()),
            vector: record.embedding.unwrap_or_default(),
            text: record.text,
            metadata: match record.source_document_id {
                Some(doc) => json!({ "source_document_id": doc }),
                None => json!({}),
            },
        })
        .collect();

    let count = upsert_embedded(entries, index, embedder).await?;
    info!(count, path = %path.display(), "loaded evidence chunks");
    Ok(count)
}

/// Load `precedents.json` into the precedent index. Returns the number of
/// precedents loaded.
pub async fn load_precedents(
    path: &Path,
    index: &Arc<dyn SimilarityIndex>,
    embedder: &OpenAiEmbedder,
) -> Result<usize> {
    let records: Vec<PrecedentRecord> = read_json(path)?;

    let entries = records
        .into_iter()
        .map(|record| IndexEntry {
            id: record
                .id
                .unwrap_or_else(|| Uuid::new_v4().to_string()),
            vector: record.embedding.unwrap_or_default(),
            text: record.summary,
            metadata: json!({
                "outcome": record.outcome,
                "keywords": record.keywords,
            }),
        })
        .collect();

    let count = upsert_embedded(entries, index, embedder).await?;
    info!(count, path = %path.display(), "loaded precedents");
    Ok(count)
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read corpus file: {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse corpus file: {}", path.display()))
}

/// Fill in missing vectors by batch-embedding entry text, then upsert
/// everything into the index.
async fn upsert_embedded(
    mut entries: Vec<IndexEntry>,
    index: &Arc<dyn SimilarityIndex>,
    embedder: &OpenAiEmbedder,
) -> Result<usize> {
    let missing: Vec<usize> = entries
        .iter()
        .enumerate()
        .filter(|(_, e)| e.vector.is_empty())
        .map(|(i, _)| i)
        .collect();

    for batch in missing.chunks(EMBED_BATCH_SIZE) {
        let texts: Vec<String> = batch.iter().map(|&i| entries[i].text.clone()).collect();
        let vectors = embedder.embed_batch(&texts).await?;
        for (&i, vector) in batch.iter().zip(vectors) {
            entries[i].vector = vector;
        }
    }

    let count = entries.len();
    index
        .upsert(entries)
        .await
        .map_err(|e| anyhow::anyhow!("{}", e))?;
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_chunk_records_parse_with_and_without_optionals() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(
            br#"[
                {
                    "id": "c1",
                    "text": "Flood damage is excluded.",
                    "source_document_id": "policy-1",
                    "embedding": [1.0, 0.0]
                },
                { "text": "Fire damage is covered." }
            ]"#,
        )
        .unwrap();

        let records: Vec<ChunkRecord> = read_json(file.path()).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].id.as_deref(), Some("c1"));
        assert_eq!(records[0].embedding.as_deref(), Some(&[1.0, 0.0][..]));
        assert!(records[1].id.is_none());
        assert!(records[1].embedding.is_none());
    }

    #[test]
    fn test_precedent_records_parse() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(
            br#"[
                {
                    "id": "p1",
                    "summary": "Burst pipe flooded the basement.",
                    "outcome": "approved",
                    "keywords": ["flood", "pipe"],
                    "embedding": [0.5, 0.5]
                }
            ]"#,
        )
        .unwrap();

        let records: Vec<PrecedentRecord> = read_json(file.path()).unwrap();
        assert_eq!(records[0].keywords, vec!["flood", "pipe"]);
        assert_eq!(records[0].outcome.as_deref(), Some("approved"));
    }

    #[test]
    fn test_malformed_corpus_is_an_error() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"{ not json ]").unwrap();
        let result: Result<Vec<ChunkRecord>> = read_json(file.path());
        assert!(result.is_err());
    }
}
