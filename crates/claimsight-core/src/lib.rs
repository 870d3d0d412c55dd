//! # Claimsight Core
//!
//! Shared, I/O-free logic for Claimsight: data models, the similarity-index
//! abstraction, hybrid retrieval, prompt assembly, confidence scoring,
//! citation tracking, the self-healing answer pipeline, and the precedent
//! ranker.
//!
//! External capabilities — embedding and generation — are consumed through
//! the [`Embedder`](pipeline::Embedder) and [`Generator`](pipeline::Generator)
//! traits. This crate never opens a socket or touches the filesystem; the
//! application crate supplies concrete providers and the index backend.
//!
//! ## Pipeline
//!
//! ```text
//! query ──▶ Embedder ──▶ HybridRetriever ──▶ PromptAssembler ──▶ Generator
//!                                                                   │
//!            retry (widen k, revise prompt) ◀── quality gate ◀── ConfidenceScorer
//!                                                   │
//!                                                   ▼
//!                                          Answer + citations
//! ```
//!
//! The precedent ranker is the same retrieval path without generation or
//! gating: embed a claim summary, query the precedent collection, return
//! the top-k matches by similarity.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`models`] | Pipeline data types (queries, evidence, attempts, answers) |
//! | [`error`] | Engine error taxonomy |
//! | [`index`] | Similarity-index trait and in-memory implementation |
//! | [`retrieval`] | Hybrid retriever and retry widening plans |
//! | [`prompt`] | Deterministic budgeted prompt assembly |
//! | [`confidence`] | Model-reported and heuristic confidence scoring |
//! | [`citation`] | Citation tag extraction and validation |
//! | [`pipeline`] | Retry / quality-gate controller |
//! | [`precedent`] | One-pass precedent ranker |

pub mod citation;
pub mod confidence;
pub mod error;
pub mod index;
pub mod models;
pub mod pipeline;
pub mod precedent;
pub mod prompt;
pub mod retrieval;
