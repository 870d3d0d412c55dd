//! # Claimsight
//!
//! A confidence-gated, retrieval-augmented answering engine for insurance
//! claims documents.
//!
//! Claimsight answers natural-language questions over a corpus of claims
//! and policy documents, grounds every answer in retrieved evidence with
//! inline citations, rates its own confidence, and retries with a widened
//! retrieval pass when an answer falls below the confidence threshold. A
//! separate endpoint finds historical claim precedents by semantic
//! similarity.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌───────────┐   ┌───────────┐   ┌────────────┐
//! │  Query   │──▶│ Retriever │──▶│ Assembler │──▶│ Generator  │
//! └──────────┘   └───────────┘   └───────────┘   └─────┬──────┘
//!                      ▲                               ▼
//!                      │ widen k              ┌────────────────┐
//!                      └──────── retry ◀──────│ Scorer + Gate  │
//!                                             └────────┬───────┘
//!                                                      ▼
//!                                                  Answer
//! ```
//!
//! The pipeline itself lives in the `claimsight-core` crate; this crate
//! supplies the configuration surface, the OpenAI-compatible embedding and
//! generation providers, corpus loading, the HTTP server, and the CLI.
//!
//! ## Quick Start
//!
//! ```bash
//! claimsight ask "Is flood damage covered?"    # one-shot answer
//! claimsight precedents "Burst pipe flooded the basement"
//! claimsight serve                             # start the HTTP API
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`embedding`] | OpenAI-compatible embedding provider |
//! | [`generation`] | OpenAI-compatible completion provider |
//! | [`corpus`] | JSON corpus loading into the in-memory indexes |
//! | [`server`] | HTTP API server |

pub mod config;
pub mod corpus;
pub mod embedding;
pub mod generation;
pub mod server;
