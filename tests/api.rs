//! End-to-end test: corpus files on disk, loaded into the in-memory
//! indexes, queried through the HTTP router.
//!
//! Corpus records carry precomputed embeddings so no embedding endpoint
//! is contacted; the query side uses a mock embedder.

use std::io::Write;
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

use claimsight::corpus;
use claimsight::embedding::OpenAiEmbedder;
use claimsight::server::{build_router, AppState};
use claimsight_core::error::EngineError;
use claimsight_core::index::{InMemoryIndex, SimilarityIndex};
use claimsight_core::pipeline::{AnswerEngine, Embedder, EngineConfig, Generator};
use claimsight_core::precedent::PrecedentRanker;

struct StaticEmbedder(Vec<f32>);

#[async_trait]
impl Embedder for StaticEmbedder {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>, EngineError> {
        Ok(self.0.clone())
    }
}

struct CannedGenerator(&'static str);

#[async_trait]
impl Generator for CannedGenerator {
    async fn generate(&self, _prompt: &str) -> Result<String, EngineError> {
        Ok(self.0.to_string())
    }
}

fn write_corpus(dir: &TempDir) -> (std::path::PathBuf, std::path::PathBuf) {
    let chunks = dir.path().join("chunks.json");
    let mut f = std::fs::File::create(&chunks).unwrap();
    f.write_all(
        br#"[
            {
                "id": "chunk-flood",
                "text": "Flood damage is excluded under section 4.2 of the policy.",
                "source_document_id": "policy-doc-1",
                "embedding": [1.0, 0.0]
            },
            {
                "id": "chunk-fire",
                "text": "Fire damage is covered up to the policy limit.",
                "source_document_id": "policy-doc-1",
                "embedding": [0.0, 1.0]
            }
        ]"#,
    )
    .unwrap();

    let precedents = dir.path().join("precedents.json");
    let mut f = std::fs::File::create(&precedents).unwrap();
    f.write_all(
        br#"[
            {
                "id": "prec-1",
                "summary": "Burst pipe flooded the basement; claim approved.",
                "outcome": "approved",
                "keywords": ["flood", "pipe"],
                "embedding": [1.0, 0.0]
            }
        ]"#,
    )
    .unwrap();

    (chunks, precedents)
}

fn corpus_embedder() -> OpenAiEmbedder {
    // No record is missing its embedding, so the provider is never
    // called; it only needs to construct.
    std::env::set_var("CLAIMSIGHT_TEST_KEY", "test-key");
    OpenAiEmbedder::new(&claimsight::config::EmbeddingConfig {
        api_base: "http://127.0.0.1:1/v1".into(),
        model: "test-model".into(),
        dims: 2,
        timeout_secs: 1,
        max_retries: 0,
        api_key_env: "CLAIMSIGHT_TEST_KEY".into(),
    })
    .unwrap()
}

async fn loaded_state() -> AppState {
    let dir = TempDir::new().unwrap();
    let (chunks_path, precedents_path) = write_corpus(&dir);
    let embedder = corpus_embedder();

    let chunks: Arc<dyn SimilarityIndex> = Arc::new(InMemoryIndex::new());
    let precedents: Arc<dyn SimilarityIndex> = Arc::new(InMemoryIndex::new());
    let loaded = corpus::load_chunks(&chunks_path, &chunks, &embedder)
        .await
        .unwrap();
    assert_eq!(loaded, 2);
    let loaded = corpus::load_precedents(&precedents_path, &precedents, &embedder)
        .await
        .unwrap();
    assert_eq!(loaded, 1);

    let query_embedder: Arc<dyn Embedder> = Arc::new(StaticEmbedder(vec![1.0, 0.0]));
    let engine = AnswerEngine::new(
        query_embedder.clone(),
        Arc::new(CannedGenerator(
            "Flood damage is excluded under section 4.2 [#chunk-flood].",
        )),
        chunks,
        EngineConfig::default(),
    )
    .unwrap();

    AppState {
        engine: Arc::new(engine),
        ranker: Arc::new(PrecedentRanker::new(query_embedder, precedents)),
    }
}

async fn post(state: AppState, path: &str, body: Value) -> (StatusCode, Value) {
    let response = build_router(state)
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(path)
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn test_ask_over_loaded_corpus() {
    let state = loaded_state().await;
    let (status, body) = post(
        state,
        "/ask",
        json!({ "query": "Is flood damage covered?" }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert!(body["answer"].as_str().unwrap().contains("excluded"));
    assert_eq!(body["citations"][0], "chunk-flood");
    assert_eq!(body["sources"][0]["source_id"], "policy-doc-1");
    assert!(body["confidence"].as_u64().unwrap() >= 4);
}

#[tokio::test]
async fn test_precedents_over_loaded_corpus() {
    let state = loaded_state().await;
    let (status, body) = post(
        state,
        "/precedents",
        json!({ "claim_summary": "Basement flooded after a pipe burst", "top_k": 3 }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let precedents = body["precedents"].as_array().unwrap();
    assert_eq!(precedents.len(), 1);
    assert_eq!(precedents[0]["precedent_id"], "prec-1");
    assert_eq!(precedents[0]["keywords"][0], "flood");
}

#[tokio::test]
async fn test_reloading_corpus_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let (chunks_path, _) = write_corpus(&dir);
    let embedder = corpus_embedder();

    let index: Arc<dyn SimilarityIndex> = Arc::new(InMemoryIndex::new());
    corpus::load_chunks(&chunks_path, &index, &embedder).await.unwrap();
    corpus::load_chunks(&chunks_path, &index, &embedder).await.unwrap();
    assert_eq!(index.count().await.unwrap(), 2);
}
