//! The retry / quality-gate controller.
//!
//! One [`AnswerEngine`] invocation runs the full pipeline for a query:
//! embed → retrieve → assemble → generate → track citations → score → gate.
//! The gate either accepts the answer or re-enters the loop with a widened
//! retrieval plan and a revision prompt, up to `max_retries` extra
//! attempts. The loop is an explicit bounded `for`, never recursion, so it
//! terminates within `max_retries + 1` attempts by construction.
//!
//! Failure handling follows the degraded-path rules:
//!
//! - index unreachable → proceed with an empty evidence set
//! - generation failure or timeout → attempt recorded at confidence 1,
//!   retry budget permitting
//! - embedding failure → fatal for the invocation
//! ([`EngineError::Embedding`])
//!
//! A low-confidence answer is always returned with its rating visible,
//! never discarded.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::citation::resolve_citations;
use crate::confidence::{parse_confidence_token, ConfidenceScorer, ScoreInputs, ScoringStrategy};
use crate::error::EngineError;
use crate::index::SimilarityIndex;
use crate::models::{Answer, Attempt, EvidenceSet, Query, RetrievalResult};
use crate::prompt::{postprocess_answer, PromptAssembler};
use crate::retrieval::{HybridRetriever, RetrievalPlan};

/// Converts text into a fixed-dimension embedding vector.
///
/// External capability: implemented by the application over an embedding
/// endpoint. A failure here is fatal for the invocation.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EngineError>;
}

/// Produces a completion for an assembled prompt.
///
/// External capability: responses are not assumed deterministic, and the
/// pipeline must tolerate variance across repeated calls with the same
/// prompt. Timeouts surface as [`EngineError::Generation`].
#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, EngineError>;
}

/// Tuning knobs for the answer pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Evidence chunks retrieved per attempt.
    pub retrieval_k: usize,
    /// Multiplier applied to k on each retry.
    pub widen_factor: usize,
    /// Hard ceiling on k after widening.
    pub max_k: usize,
    /// Minimum confidence the gate accepts without retrying.
    pub confidence_threshold: u8,
    /// Self-healing retries after the first attempt.
    pub max_retries: u32,
    /// Confidence scoring strategy.
    pub scoring_strategy: ScoringStrategy,
    /// Character budget for assembled prompts.
    pub prompt_budget_chars: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            retrieval_k: 4,
            widen_factor: 2,
            max_k: 16,
            confidence_threshold: 3,
            max_retries: 1,
            scoring_strategy: ScoringStrategy::default(),
            prompt_budget_chars: 6000,
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.retrieval_k == 0 {
            return Err(EngineError::Config("retrieval_k must be >= 1".into()));
        }
        if self.max_k < self.retrieval_k {
            return Err(EngineError::Config(
                "max_k must be >= retrieval_k".into(),
            ));
        }
        if self.widen_factor == 0 {
            return Err(EngineError::Config("widen_factor must be >= 1".into()));
        }
        if !(1..=5).contains(&self.confidence_threshold) {
            return Err(EngineError::Config(
                "confidence_threshold must be in 1..=5".into(),
            ));
        }
        if self.prompt_budget_chars < 200 {
            return Err(EngineError::Config(
                "prompt_budget_chars must be >= 200".into(),
            ));
        }
        Ok(())
    }
}

/// Cooperative cancellation flag checked between attempts.
///
/// Cancelling never interrupts an in-flight external call; it only prevents
/// a new attempt from starting.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Gate states an attempt moves through. Transitions are total: every
/// attempt ends in `Accepted`, `Retry`, or `Exhausted`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateState {
    Init,
    Retrieved,
    Generated,
    Scored,
    Accepted,
    Retry,
    Exhausted,
}

/// Per-attempt artifacts kept so the final answer can be built from
/// whichever attempt scored best.
struct AttemptOutcome {
    text: String,
    citations: Vec<String>,
    sources: Vec<RetrievalResult>,
}

/// The confidence-gated answering engine.
///
/// Stateless across invocations: every call owns its attempts and evidence,
/// so arbitrarily many invocations may run concurrently over the same
/// (read-only) index.
pub struct AnswerEngine {
    embedder: Arc<dyn Embedder>,
    generator: Arc<dyn Generator>,
    retriever: HybridRetriever,
    assembler: PromptAssembler,
    scorer: ConfidenceScorer,
    config: EngineConfig,
}

impl AnswerEngine {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        generator: Arc<dyn Generator>,
        index: Arc<dyn SimilarityIndex>,
        config: EngineConfig,
    ) -> Result<Self, EngineError> {
        config.validate()?;
        Ok(Self {
            embedder,
            generator,
            retriever: HybridRetriever::new(index),
            assembler: PromptAssembler::new(config.prompt_budget_chars),
            scorer: ConfidenceScorer::new(config.scoring_strategy),
            config,
        })
    }

    /// Answer a query without external cancellation.
    pub async fn answer(&self, query: &Query) -> Result<Answer, EngineError> {
        self.answer_with_cancel(query, &CancelFlag::new()).await
    }

    /// Answer a query, checking `cancel` between attempts.
    pub async fn answer_with_cancel(
        &self,
        query: &Query,
        cancel: &CancelFlag,
    ) -> Result<Answer, EngineError> {
        if query.text.trim().is_empty() {
            return Err(EngineError::Config("query text must not be empty".into()));
        }

        let query_vector = self.embedder.embed(&query.text).await?;

        let mut plan = RetrievalPlan::new(self.config.retrieval_k, &query.filters);
        let mut attempts: Vec<Attempt> = Vec::new();
        let mut outcomes: Vec<AttemptOutcome> = Vec::new();
        let mut previous_answer: Option<String> = None;
        let mut best: usize = 0;

        for attempt_number in 0..=self.config.max_retries {
            if attempt_number > 0 && cancel.is_cancelled() {
                info!(attempt = attempt_number, "query cancelled, skipping retry");
                break;
            }

            let mut state = GateState::Init;
            debug!(attempt = attempt_number, k = plan.k, ?state, "attempt start");

            let evidence = match self.retriever.retrieve(&query_vector, &plan).await {
                Ok(evidence) => evidence,
                Err(EngineError::Index(msg)) => {
                    warn!(error = %msg, "index unavailable, degrading to empty evidence");
                    EvidenceSet::empty()
                }
                Err(other) => return Err(other),
            };
            state = GateState::Retrieved;
            debug!(
                attempt = attempt_number,
                results = evidence.results.len(),
                ?state,
                "retrieval done"
            );

            let want_token = self.scorer.strategy() == ScoringStrategy::Model;
            let prompt = self.assembler.assemble(
                &query.text,
                &evidence,
                previous_answer.as_deref(),
                want_token,
            );

            let (text, citations, confidence) = match self.generator.generate(&prompt.text).await
            {
                Ok(raw) => {
                    state = GateState::Generated;
                    debug!(attempt = attempt_number, chars = raw.len(), ?state, "generation done");
                    let (text, model_reported) = if want_token {
                        parse_confidence_token(&raw)
                    } else {
                        (raw, None)
                    };
                    let resolved = resolve_citations(&text, &prompt.included);
                    let confidence = self.scorer.score(&ScoreInputs {
                        answer_text: &resolved.text,
                        evidence: &evidence,
                        valid_citations: resolved.valid.len(),
                        malformed_citations: resolved.malformed.len(),
                        model_reported,
                    });
                    (resolved.text, resolved.valid, confidence)
                }
                Err(EngineError::Generation(msg)) => {
                    warn!(attempt = attempt_number, error = %msg, "generation failed");
                    (String::new(), Vec::new(), 1)
                }
                Err(other) => return Err(other),
            };
            state = GateState::Scored;
            debug!(attempt = attempt_number, confidence, ?state, "attempt scored");

            attempts.push(Attempt {
                attempt_number,
                prompt_snapshot: prompt.text,
                generated_text: text.clone(),
                confidence,
                retrieval_set_id: evidence.id.clone(),
            });
            outcomes.push(AttemptOutcome {
                text,
                citations,
                sources: evidence.results,
            });
            // Later attempts win ties: a revision at equal confidence is
            // the fresher answer.
            if confidence >= attempts[best].confidence {
                best = attempts.len() - 1;
            }

            if confidence >= self.config.confidence_threshold {
                state = GateState::Accepted;
                info!(attempt = attempt_number, confidence, ?state, "answer accepted");
                best = attempts.len() - 1;
                break;
            }

            if attempt_number < self.config.max_retries {
                state = GateState::Retry;
                info!(
                    attempt = attempt_number,
                    confidence,
                    threshold = self.config.confidence_threshold,
                    ?state,
                    "confidence below threshold, retrying"
                );
                plan = plan.widen(self.config.widen_factor, self.config.max_k);
                let last = &outcomes[outcomes.len() - 1].text;
                previous_answer = if last.trim().is_empty() {
                    None
                } else {
                    Some(last.clone())
                };
            } else {
                state = GateState::Exhausted;
                info!(attempt = attempt_number, confidence, ?state, "retry budget exhausted");
            }
        }

        let accepted = &outcomes[best];
        let healed = attempts.len() > 1;
        Ok(Answer {
            text: postprocess_answer(&accepted.text),
            confidence: attempts[best].confidence,
            citations: accepted.citations.clone(),
            sources: accepted.sources.clone(),
            attempts,
            healed,
        })
    }
}
