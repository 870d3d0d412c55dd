//! # Claimsight CLI
//!
//! The `claimsight` binary answers questions over a claims-document corpus
//! and finds similar historical claims, either one-shot from the command
//! line or as a long-running HTTP API.
//!
//! ## Usage
//!
//! ```bash
//! claimsight --config ./config/claimsight.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `claimsight ask "<question>"` | Answer a question with citations and a confidence rating |
//! | `claimsight precedents "<summary>"` | Find historical claims similar to a summary |
//! | `claimsight serve` | Start the HTTP API server |
//!
//! ## Examples
//!
//! ```bash
//! # One-shot question with a lexical filter
//! claimsight ask "Is flood damage covered?" --must-contain flood
//!
//! # Top 3 similar precedents
//! claimsight precedents "Burst pipe flooded the basement" --top-k 3
//!
//! # Start the API on the configured bind address
//! claimsight serve --config ./config/claimsight.toml
//! ```

mod config;
mod corpus;
mod embedding;
mod generation;
mod server;

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use claimsight_core::index::{InMemoryIndex, SimilarityIndex};
use claimsight_core::models::{Query, QueryFilters};
use claimsight_core::pipeline::{AnswerEngine, Embedder};
use claimsight_core::precedent::PrecedentRanker;

use crate::embedding::OpenAiEmbedder;
use crate::generation::OpenAiGenerator;
use crate::server::AppState;

/// Claimsight CLI — a confidence-gated, retrieval-augmented answering
/// engine for insurance claims documents.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/claimsight.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "claimsight",
    about = "Claimsight — a confidence-gated, retrieval-augmented answering engine for claims documents",
    version,
    long_about = "Claimsight answers natural-language questions over a corpus of insurance claims \
    and policy documents. Answers are grounded in retrieved evidence with inline citations, rated \
    for confidence, and retried with a widened retrieval pass when confidence is low. A separate \
    command finds historical claim precedents by semantic similarity."
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/claimsight.toml`. All retrieval, confidence,
    /// provider, and server settings are read from this file.
    #[arg(long, global = true, default_value = "./config/claimsight.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Answer a question over the claims corpus.
    ///
    /// Loads the corpus, runs the confidence-gated pipeline, and prints
    /// the answer with its confidence rating, citations, and sources.
    Ask {
        /// The question to answer.
        query: String,

        /// Only use evidence whose text contains this substring
        /// (case-insensitive). Dropped automatically if a retry widens
        /// the search.
        #[arg(long)]
        must_contain: Option<String>,
    },

    /// Find historical claims similar to a claim summary.
    ///
    /// Embeds the summary and prints the nearest precedents with their
    /// outcomes, keywords, and similarity scores.
    Precedents {
        /// Free-text summary of the claim.
        summary: String,

        /// Number of precedents to return.
        #[arg(long, default_value_t = 5)]
        top_k: usize,
    },

    /// Start the HTTP API server.
    ///
    /// Loads the corpus and serves `POST /ask`, `POST /precedents`, and
    /// `GET /health` on the address configured in `[server].bind`.
    Serve,
}

/// Everything a command needs: providers wired to the engine and ranker
/// over freshly loaded corpus indexes.
struct App {
    engine: Arc<AnswerEngine>,
    ranker: Arc<PrecedentRanker>,
    bind: String,
}

async fn build_app(cfg: &config::Config) -> anyhow::Result<App> {
    let embedder = Arc::new(OpenAiEmbedder::new(&cfg.embedding)?);
    let generator = Arc::new(OpenAiGenerator::new(&cfg.generation)?);

    let chunks: Arc<dyn SimilarityIndex> = Arc::new(InMemoryIndex::new());
    let precedents: Arc<dyn SimilarityIndex> = Arc::new(InMemoryIndex::new());
    corpus::load_chunks(&cfg.corpus.chunks, &chunks, &embedder).await?;
    corpus::load_precedents(&cfg.corpus.precedents, &precedents, &embedder).await?;

    let shared_embedder: Arc<dyn Embedder> = embedder;
    let engine = AnswerEngine::new(
        shared_embedder.clone(),
        generator,
        chunks,
        cfg.engine_config(),
    )?;

    Ok(App {
        engine: Arc::new(engine),
        ranker: Arc::new(PrecedentRanker::new(shared_embedder, precedents)),
        bind: cfg.server.bind.clone(),
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("claimsight=info")),
        )
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;
    let app = build_app(&cfg).await?;

    match cli.command {
        Commands::Ask {
            query,
            must_contain,
        } => {
            let query = Query::with_filters(query, QueryFilters { must_contain });
            let answer = app.engine.answer(&query).await?;

            println!("{}", answer.text);
            println!();
            println!("confidence: {}/5", answer.confidence);
            if answer.healed {
                println!("healed after {} retry(ies)", answer.healed_attempts());
            }
            if !answer.citations.is_empty() {
                println!("citations: {}", answer.citations.join(", "));
            }
            for source in &answer.sources {
                let doc = source.source_id.as_deref().unwrap_or(&source.chunk_id);
                println!("  [{:.2}] {}", source.score, doc);
            }
        }
        Commands::Precedents { summary, top_k } => {
            let matches = app.ranker.find_precedents(&summary, top_k).await?;
            if matches.is_empty() {
                println!("No similar precedents found.");
            }
            for (i, m) in matches.iter().enumerate() {
                println!("{}. [{:.2}] {}", i + 1, m.similarity_score, m.summary);
                if let Some(outcome) = &m.outcome {
                    println!("   outcome: {}", outcome);
                }
                if !m.keywords.is_empty() {
                    println!("   keywords: {}", m.keywords.join(", "));
                }
            }
        }
        Commands::Serve => {
            server::run_server(
                &app.bind,
                AppState {
                    engine: app.engine,
                    ranker: app.ranker,
                },
            )
            .await?;
        }
    }

    Ok(())
}
