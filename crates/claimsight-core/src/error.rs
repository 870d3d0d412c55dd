//! Engine error taxonomy.
//!
//! Only [`EngineError::Embedding`] is fatal to an invocation: without a
//! query vector no retrieval is possible. Index failures degrade to an
//! empty evidence set and generation failures degrade to a confidence-1
//! attempt, both handled inside the pipeline rather than surfaced here.

use thiserror::Error;

/// Errors produced by the answer pipeline and its collaborators.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The query (or summary) could not be embedded. Fatal for the
    /// invocation — no retrieval can be attempted.
    #[error("embedding failed: {0}")]
    Embedding(String),

    /// The generation endpoint failed or timed out. The pipeline records
    /// the attempt at confidence 1 and may retry.
    #[error("generation failed: {0}")]
    Generation(String),

    /// The similarity index was unreachable or rejected the operation.
    /// Query paths recover by proceeding with an empty evidence set.
    #[error("similarity index unavailable: {0}")]
    Index(String),

    /// The engine was constructed or invoked with invalid parameters.
    #[error("invalid engine configuration: {0}")]
    Config(String),
}
