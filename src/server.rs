//! HTTP API server.
//!
//! Exposes the answer pipeline and precedent search as a small JSON API.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/ask` | Answer a question over the claims corpus |
//! | `POST` | `/precedents` | Find historical cases similar to a claim summary |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! # Error Contract
//!
//! All error responses share one schema:
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "query must not be empty" } }
//! ```
//!
//! Error codes: `bad_request` (400), `embedding_failed` (502),
//! `internal` (500). A low-confidence answer is **not** an error: it comes
//! back as a normal 200 with its confidence rating attached.
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted to support browser-based
//! clients.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use claimsight_core::error::EngineError;
use claimsight_core::models::{Query, QueryFilters, RetrievalResult};
use claimsight_core::pipeline::AnswerEngine;
use claimsight_core::precedent::PrecedentRanker;

const DEFAULT_PRECEDENT_TOP_K: usize = 5;
const MAX_PRECEDENT_TOP_K: usize = 50;
const SOURCE_EXCERPT_CHARS: usize = 280;

/// Shared application state passed to all route handlers via Axum's
/// `State` extractor.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<AnswerEngine>,
    pub ranker: Arc<PrecedentRanker>,
}

/// Build the API router over prepared engine state.
///
/// Split out from [`run_server`] so tests can drive the router directly
/// without binding a socket.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/ask", post(handle_ask))
        .route("/precedents", post(handle_precedents))
        .route("/health", get(handle_health))
        .layer(cors)
        .with_state(state)
}

/// Start the HTTP server on `bind_addr`.
///
/// Runs until the process is terminated. Returns an error if binding
/// fails.
pub async fn run_server(bind_addr: &str, state: AppState) -> anyhow::Result<()> {
    let app = build_router(state);

    info!(bind = bind_addr, "API server listening");
    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// ============ Error response ============

/// JSON error response body.
#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

/// Inner error detail with a machine-readable code and human-readable
/// message.
#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

/// Internal error type that converts into an Axum HTTP response.
struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

/// Constructs a 400 Bad Request error.
fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request".to_string(),
        message: message.into(),
    }
}

/// Maps engine errors to HTTP responses. Only embedding failure and
/// invalid input ever reach here; generation and index failures are
/// absorbed by the pipeline's degraded paths.
fn classify_engine_error(err: EngineError) -> AppError {
    match err {
        EngineError::Embedding(msg) => AppError {
            status: StatusCode::BAD_GATEWAY,
            code: "embedding_failed".to_string(),
            message: msg,
        },
        EngineError::Config(msg) => bad_request(msg),
        other => AppError {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            code: "internal".to_string(),
            message: other.to_string(),
        },
    }
}

// ============ GET /health ============

/// JSON response body for `GET /health`.
#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

/// Handler for `GET /health`.
async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ POST /ask ============

/// JSON request body for `POST /ask`.
#[derive(Deserialize)]
struct AskRequest {
    query: String,
    /// Optional case-insensitive substring filter over evidence text.
    #[serde(default)]
    must_contain: Option<String>,
}

/// One source attribution in an `/ask` response.
#[derive(Serialize)]
struct SourceView {
    source_id: String,
    excerpt: String,
    relevance_score: f64,
}

/// JSON response body for `POST /ask`.
#[derive(Serialize)]
struct AskResponse {
    answer: String,
    confidence: u8,
    citations: Vec<String>,
    sources: Vec<SourceView>,
    healed_attempts: usize,
}

fn source_view(result: &RetrievalResult) -> SourceView {
    let excerpt = if result.text.chars().count() > SOURCE_EXCERPT_CHARS {
        let truncated: String = result.text.chars().take(SOURCE_EXCERPT_CHARS).collect();
        format!("{}…", truncated.trim_end())
    } else {
        result.text.clone()
    };
    SourceView {
        source_id: result
            .source_id
            .clone()
            .unwrap_or_else(|| result.chunk_id.clone()),
        excerpt,
        relevance_score: result.score,
    }
}

/// Handler for `POST /ask`.
///
/// Runs the full confidence-gated pipeline and returns the answer with
/// its confidence, citations, and source attributions.
async fn handle_ask(
    State(state): State<AppState>,
    Json(request): Json<AskRequest>,
) -> Result<Json<AskResponse>, AppError> {
    if request.query.trim().is_empty() {
        return Err(bad_request("query must not be empty"));
    }

    let query = Query::with_filters(
        request.query,
        QueryFilters {
            must_contain: request.must_contain,
        },
    );

    let answer = state
        .engine
        .answer(&query)
        .await
        .map_err(classify_engine_error)?;

    Ok(Json(AskResponse {
        healed_attempts: answer.healed_attempts(),
        confidence: answer.confidence,
        citations: answer.citations.clone(),
        sources: answer.sources.iter().map(source_view).collect(),
        answer: answer.text,
    }))
}

// ============ POST /precedents ============

/// JSON request body for `POST /precedents`.
#[derive(Deserialize)]
struct PrecedentsRequest {
    claim_summary: String,
    #[serde(default)]
    top_k: Option<usize>,
}

/// JSON response body for `POST /precedents`.
#[derive(Serialize)]
struct PrecedentsResponse {
    precedents: Vec<claimsight_core::models::PrecedentMatch>,
}

/// Handler for `POST /precedents`.
///
/// Returns the historical cases most similar to the claim summary,
/// ordered by descending similarity.
async fn handle_precedents(
    State(state): State<AppState>,
    Json(request): Json<PrecedentsRequest>,
) -> Result<Json<PrecedentsResponse>, AppError> {
    if request.claim_summary.trim().is_empty() {
        return Err(bad_request("claim_summary must not be empty"));
    }

    let top_k = request
        .top_k
        .unwrap_or(DEFAULT_PRECEDENT_TOP_K)
        .clamp(1, MAX_PRECEDENT_TOP_K);

    let precedents = state
        .ranker
        .find_precedents(&request.claim_summary, top_k)
        .await
        .map_err(classify_engine_error)?;

    Ok(Json(PrecedentsResponse { precedents }))
}
