//! Deterministic prompt assembly.
//!
//! Evidence is packed in rank order under a fixed character budget. Each
//! packed chunk is tagged inline with its citation id (`[#id]`) and the
//! instructions tell the generator to reproduce the tag for any evidence it
//! uses, which is what makes citation tracking possible downstream.
//!
//! When no evidence was retrieved, the assembler still produces a valid
//! prompt instructing the generator to say that no grounding evidence was
//! found — the pipeline never sends an unguarded prompt.

use crate::models::EvidenceSet;

const INSTRUCTIONS: &str = "You are an assistant answering questions about insurance claims \
using only the evidence provided below. Each piece of evidence is tagged with an id like \
[#chunk-1]. When your answer uses a piece of evidence, reproduce its tag inline. If the \
evidence does not contain the answer, say so plainly; do not invent information.";

const NO_EVIDENCE_INSTRUCTIONS: &str = "You are an assistant answering questions about \
insurance claims. No grounding evidence was found for this query. State clearly that the \
available documents do not contain the answer, and suggest rephrasing the question. Do not \
invent information.";

const CONFIDENCE_INSTRUCTION: &str = "End your reply with a final line of the form \
`Confidence: N` where N is a whole number from 1 (not confident) to 5 (fully supported by \
the evidence).";

/// The assembled prompt plus the ids of the evidence actually packed into
/// it. Citations are validated against `included`, not against the full
/// retrieval set: an answer may only cite evidence it was shown.
#[derive(Debug, Clone)]
pub struct AssembledPrompt {
    pub text: String,
    pub included: Vec<String>,
}

/// Budgeted, deterministic prompt assembler.
#[derive(Debug, Clone)]
pub struct PromptAssembler {
    budget_chars: usize,
}

impl PromptAssembler {
    pub fn new(budget_chars: usize) -> Self {
        Self { budget_chars }
    }

    /// Compose a prompt for `query_text` over `evidence`.
    ///
    /// `previous_answer` switches to the revision wording used by
    /// self-healing retries; `request_confidence_token` appends the
    /// model-reported scoring instruction.
    pub fn assemble(
        &self,
        query_text: &str,
        evidence: &EvidenceSet,
        previous_answer: Option<&str>,
        request_confidence_token: bool,
    ) -> AssembledPrompt {
        let mut text = String::new();
        let mut included = Vec::new();

        if evidence.is_empty() {
            text.push_str(NO_EVIDENCE_INSTRUCTIONS);
        } else {
            text.push_str(INSTRUCTIONS);
            text.push_str("\n\nEVIDENCE:\n");
            // The budget counts characters, not bytes: chunk text may be
            // multibyte and truncation must never split a code point.
            let mut used = text.chars().count();

            for result in &evidence.results {
                let header = format!("[#{}]", result.chunk_id);
                let block = match &result.source_id {
                    Some(source) => format!(
                        "{header} (document: {source}, relevance: {:.2})\n{}\n\n",
                        result.score, result.text
                    ),
                    None => format!(
                        "{header} (relevance: {:.2})\n{}\n\n",
                        result.score, result.text
                    ),
                };
                let block_chars = block.chars().count();

                if used + block_chars > self.budget_chars {
                    if included.is_empty() {
                        // Truncate the top-ranked chunk into whatever
                        // budget remains, but count it as shown only if
                        // its tag fit: `included` must list exactly the
                        // ids the generator can see.
                        let room = self.budget_chars.saturating_sub(used);
                        if room >= header.chars().count() {
                            text.extend(block.chars().take(room));
                            included.push(result.chunk_id.clone());
                        }
                    }
                    break;
                }
                text.push_str(&block);
                used += block_chars;
                included.push(result.chunk_id.clone());
            }
        }

        if let Some(previous) = previous_answer {
            text.push_str("\n\nPREVIOUS ANSWER (low confidence):\n");
            text.push_str(previous);
            text.push_str(
                "\n\nThe previous answer had low confidence. Revise it using only the \
evidence above.",
            );
        }

        text.push_str("\n\nQUERY:\n");
        text.push_str(query_text);

        if request_confidence_token {
            text.push_str("\n\n");
            text.push_str(CONFIDENCE_INSTRUCTION);
        }

        text.push_str("\n\nANSWER:\n");

        AssembledPrompt { text, included }
    }
}

/// Tidy a raw generated answer for presentation: trim, collapse runs of
/// blank lines, and substitute a fixed fallback when nothing usable
/// remains. Scoring happens on the raw text, before this runs.
pub fn postprocess_answer(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut blank_run = 0usize;
    for line in raw.trim().lines() {
        if line.trim().is_empty() {
            blank_run += 1;
            if blank_run > 1 {
                continue;
            }
        } else {
            blank_run = 0;
        }
        out.push_str(line.trim_end());
        out.push('\n');
    }
    let out = out.trim().to_string();
    if out.is_empty() {
        "I was unable to find a relevant answer in the provided documents.".to_string()
    } else {
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RetrievalResult;

    fn evidence(chunks: &[(&str, &str, f64)]) -> EvidenceSet {
        EvidenceSet {
            id: "rs-test".into(),
            results: chunks
                .iter()
                .enumerate()
                .map(|(rank, (id, text, score))| RetrievalResult {
                    chunk_id: id.to_string(),
                    score: *score,
                    rank,
                    text: text.to_string(),
                    source_id: None,
                    metadata: serde_json::Value::Null,
                })
                .collect(),
        }
    }

    #[test]
    fn test_packs_in_rank_order_with_tags() {
        let assembler = PromptAssembler::new(6000);
        let ev = evidence(&[
            ("chunk-a", "flood damage is excluded", 0.9),
            ("chunk-b", "fire damage is covered", 0.7),
        ]);
        let prompt = assembler.assemble("is flood covered?", &ev, None, false);

        assert_eq!(prompt.included, vec!["chunk-a", "chunk-b"]);
        let a = prompt.text.find("[#chunk-a]").unwrap();
        let b = prompt.text.find("[#chunk-b]").unwrap();
        assert!(a < b);
        assert!(prompt.text.contains("is flood covered?"));
    }

    #[test]
    fn test_budget_stops_packing() {
        let assembler = PromptAssembler::new(600);
        let long = "x".repeat(400);
        let ev = evidence(&[("first", &long, 0.9), ("second", &long, 0.8)]);
        let prompt = assembler.assemble("q", &ev, None, false);

        assert_eq!(prompt.included, vec!["first"]);
        assert!(!prompt.text.contains("[#second]"));
    }

    #[test]
    fn test_top_chunk_truncated_into_remaining_budget() {
        let overhead = INSTRUCTIONS.chars().count() + "\n\nEVIDENCE:\n".len();
        let assembler = PromptAssembler::new(overhead + 40);
        let long = "x".repeat(200);
        let ev = evidence(&[("only", &long, 0.9)]);
        let prompt = assembler.assemble("q", &ev, None, false);

        assert_eq!(prompt.included, vec!["only"]);
        assert!(prompt.text.contains("[#only]"));
    }

    #[test]
    fn test_chunk_not_claimed_when_tag_cannot_fit() {
        // At the minimum budget the instructions alone overflow it; no
        // evidence is actually shown, so none may be listed as included.
        let assembler = PromptAssembler::new(200);
        let ev = evidence(&[("only", "some evidence text", 0.9)]);
        let prompt = assembler.assemble("q", &ev, None, false);

        assert!(prompt.included.is_empty());
        assert!(!prompt.text.contains("[#only]"));
    }

    #[test]
    fn test_budget_counts_characters_not_bytes() {
        let overhead = INSTRUCTIONS.chars().count() + "\n\nEVIDENCE:\n".len();
        // 100 three-byte characters: fits by character count even though
        // the byte length is triple the remaining budget.
        let wide = "€".repeat(100);
        let assembler = PromptAssembler::new(overhead + 140);
        let ev = evidence(&[("wide", &wide, 0.9)]);
        let prompt = assembler.assemble("q", &ev, None, false);

        assert_eq!(prompt.included, vec!["wide"]);
        assert!(prompt.text.contains(&wide));
    }

    #[test]
    fn test_empty_evidence_produces_guarded_prompt() {
        let assembler = PromptAssembler::new(6000);
        let prompt = assembler.assemble("anything?", &EvidenceSet::empty(), None, false);
        assert!(prompt.included.is_empty());
        assert!(prompt.text.contains("No grounding evidence was found"));
        assert!(prompt.text.contains("anything?"));
    }

    #[test]
    fn test_revision_prompt_embeds_previous_answer() {
        let assembler = PromptAssembler::new(6000);
        let ev = evidence(&[("c", "text", 0.5)]);
        let prompt = assembler.assemble("q", &ev, Some("old weak answer"), false);
        assert!(prompt.text.contains("old weak answer"));
        assert!(prompt.text.contains("Revise it"));
    }

    #[test]
    fn test_confidence_token_instruction_is_optional() {
        let assembler = PromptAssembler::new(6000);
        let ev = evidence(&[("c", "text", 0.5)]);
        let with = assembler.assemble("q", &ev, None, true);
        let without = assembler.assemble("q", &ev, None, false);
        assert!(with.text.contains("Confidence: N"));
        assert!(!without.text.contains("Confidence: N"));
    }

    #[test]
    fn test_assembly_is_deterministic() {
        let assembler = PromptAssembler::new(6000);
        let ev = evidence(&[("a", "one", 0.9), ("b", "two", 0.8)]);
        let p1 = assembler.assemble("q", &ev, None, true);
        let p2 = assembler.assemble("q", &ev, None, true);
        assert_eq!(p1.text, p2.text);
        assert_eq!(p1.included, p2.included);
    }

    #[test]
    fn test_postprocess_collapses_and_falls_back() {
        assert_eq!(postprocess_answer("  answer.  \n\n\n\nmore  "), "answer.\n\nmore");
        assert!(postprocess_answer("   \n  ").contains("unable to find"));
    }
}
