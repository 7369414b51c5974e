//! The Writer node: scenario drafting.
//!
//! The Writer expands curated seeds (or a category-only prompt) into one
//! free-text draft containing multiple scenario write-ups. In repair mode
//! it replays the critiques of rejected candidates as corrective
//! constraints instead of seeds. Providers are tried through an ordered
//! fallback chain; the iteration counter advances here so the Supervisor's
//! bound is exact regardless of which branch routed back.

use std::sync::Arc;

use crate::llm::{ChainError, CompletionChain, CompletionRequest, Message};
use crate::prompts::{
    WRITER_PROMPT, WRITER_REPAIR_SECTION, WRITER_SEEDS_SECTION, WRITER_SYSTEM_PROMPT,
};
use crate::storage::ScenarioRepository;
use crate::swarm::{ScenarioCandidate, ScenarioStatus, SwarmState, WorkflowPhase};

/// Sampling temperature for drafting.
const WRITER_TEMPERATURE: f64 = 0.7;

/// Number of reference examples requested from the repository.
const GOLD_EXAMPLE_LIMIT: u32 = 10;

/// Cap on the cached gold-example text.
const GOLD_CACHE_MAX_CHARS: usize = 4000;

/// Cap on the gold-example text included in one prompt.
const GOLD_PROMPT_MAX_CHARS: usize = 3000;

/// Number of rejected-candidate critiques replayed per repair draft.
const REPAIR_CRITIQUE_LIMIT: usize = 3;

/// Scenario drafting node.
pub struct Writer {
    chain: CompletionChain,
    repository: Arc<dyn ScenarioRepository>,
}

impl Writer {
    /// Create a Writer over the given provider chain and repository.
    pub fn new(chain: CompletionChain, repository: Arc<dyn ScenarioRepository>) -> Self {
        Self { chain, repository }
    }

    /// Produce one raw draft candidate for this iteration.
    pub async fn run(&self, state: &mut SwarmState) {
        state.set_phase(WorkflowPhase::Writing);
        state.iteration += 1;

        tracing::info!(
            iteration = state.iteration,
            category = state.config.category.as_str(),
            needed = state
                .config
                .target_count
                .saturating_sub(state.approved_count()),
            "Writer starting"
        );

        if state.gold_examples.is_empty() {
            state.gold_examples = self.load_gold_examples(&state.config.category).await;
        }

        // Repair mode: replay critiques of judge-rejected candidates with
        // attempt budget remaining.
        let repair_ids: Vec<uuid::Uuid> = state
            .repair_eligible()
            .iter()
            .map(|c| c.id)
            .collect();
        let critiques: Vec<String> = state
            .repair_eligible()
            .iter()
            .rev()
            .take(REPAIR_CRITIQUE_LIMIT)
            .filter(|c| !c.critique.is_empty())
            .map(|c| c.critique.clone())
            .collect();
        let repair_mode = !repair_ids.is_empty();

        let user_prompt = self.build_prompt(state, if repair_mode { &critiques } else { &[] });

        let request = CompletionRequest::new(
            "",
            vec![
                Message::system(WRITER_SYSTEM_PROMPT),
                Message::user(user_prompt),
            ],
        )
        .with_temperature(WRITER_TEMPERATURE);

        match self.chain.complete(request).await {
            Ok(outcome) => {
                state.metrics.llm_errors += u64::from(outcome.failed_attempts);
                let draft_text = match outcome.response.text() {
                    Ok(text) if !text.is_empty() => text,
                    _ => {
                        state.add_error("Writer produced an empty draft");
                        return;
                    }
                };

                tracing::info!(
                    chars = draft_text.len(),
                    provider = outcome.provider.as_str(),
                    repair = repair_mode,
                    "Writer completed"
                );

                let category = state.config.category.clone();
                state.add_candidate(ScenarioCandidate::raw_draft(
                    draft_text,
                    &outcome.provider,
                    &category,
                ));

                // The consumed critiques will not be replayed again: their
                // rework re-enters the pipeline as fresh formatted records.
                if repair_mode {
                    let mut repaired = 0u64;
                    for candidate in &mut state.candidates {
                        if repair_ids.contains(&candidate.id) {
                            candidate.status = ScenarioStatus::Repaired;
                            repaired += 1;
                        }
                    }
                    state.metrics.total_repaired += repaired;
                }
            }
            Err(ChainError::Exhausted {
                failed_attempts,
                last,
            }) => {
                state.metrics.llm_errors += u64::from(failed_attempts);
                state.add_error(format!(
                    "Writer failed: all configured providers failed ({last})"
                ));
            }
            Err(ChainError::Empty) => {
                state.add_error("Writer failed: no providers configured");
            }
        }
    }

    /// Build the generation prompt for the current mode.
    fn build_prompt(&self, state: &SwarmState, critiques: &[String]) -> String {
        let repair_section = if critiques.is_empty() {
            String::new()
        } else {
            WRITER_REPAIR_SECTION.replace("{critiques}", &critiques.join("\n"))
        };

        let seeds_section = if critiques.is_empty() && !state.scout_seeds.is_empty() {
            let seeds = state
                .scout_seeds
                .iter()
                .take(state.config.batch_size)
                .map(|s| format!("- {s}"))
                .collect::<Vec<_>>()
                .join("\n");
            WRITER_SEEDS_SECTION.replace("{seeds}", &seeds)
        } else {
            String::new()
        };

        let gold_section = if state.gold_examples.is_empty() {
            String::new()
        } else {
            let capped: String = state
                .gold_examples
                .chars()
                .take(GOLD_PROMPT_MAX_CHARS)
                .collect();
            format!("\nReference examples:\n{capped}")
        };

        WRITER_PROMPT
            .replace("{repair_section}", &repair_section)
            .replace("{seeds_section}", &seeds_section)
            .replace("{bundle_id}", &state.bundle_id)
            .replace("{category}", &state.config.category)
            .replace("{count}", &state.config.batch_size.to_string())
            .replace("{gold_section}", &gold_section)
    }

    /// Render approved reference scenarios into prompt text. Best-effort:
    /// a repository failure just yields an empty string.
    async fn load_gold_examples(&self, category: &str) -> String {
        match self
            .repository
            .load_approved_examples(category, GOLD_EXAMPLE_LIMIT)
            .await
        {
            Ok(examples) => {
                let text = examples
                    .iter()
                    .map(|sc| format!("### {}\nBackground: {}\n", sc.title(), sc.background()))
                    .collect::<Vec<_>>()
                    .join("\n");
                text.chars().take(GOLD_CACHE_MAX_CHARS).collect()
            }
            Err(e) => {
                tracing::debug!(error = %e, "Failed to load gold examples");
                String::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LlmError;
    use crate::nodes::support::{MockRepository, ScriptedProvider};
    use crate::scenario::ScenarioData;
    use crate::swarm::{RejectedBy, SwarmConfig};
    use serde_json::json;

    fn state() -> SwarmState {
        SwarmState::new(SwarmConfig {
            batch_size: 2,
            ..SwarmConfig::new("suspicious object")
        })
    }

    fn rejected_candidate(title: &str, critique: &str) -> ScenarioCandidate {
        let data = ScenarioData::from_value(json!({"title": title, "category": "suspicious object"}));
        let mut c = ScenarioCandidate::new(data, ScenarioStatus::Unique);
        c.record_feedback(critique, 40.0);
        c.status = ScenarioStatus::Rejected;
        c.rejected_by = Some(RejectedBy::Judge);
        c
    }

    #[tokio::test]
    async fn test_fresh_batch_uses_seeds() {
        let provider = Arc::new(ScriptedProvider::always("Title: Draft one\n..."));
        let chain = CompletionChain::new().with("primary", provider.clone());
        let writer = Writer::new(chain, Arc::new(MockRepository::new()));

        let mut st = state();
        st.scout_seeds = vec!["idea one".to_string(), "idea two".to_string()];
        writer.run(&mut st).await;

        assert_eq!(st.iteration, 1);
        assert_eq!(st.candidates.len(), 1);
        assert!(st.candidates[0].is_raw_draft);
        assert_eq!(st.candidates[0].status, ScenarioStatus::Draft);
        let prompt = provider.last_prompt();
        assert!(prompt.contains("- idea one"));
        assert!(!prompt.contains("Corrections required"));
    }

    #[tokio::test]
    async fn test_repair_mode_replays_critiques() {
        let provider = Arc::new(ScriptedProvider::always("Title: Repaired draft\n..."));
        let chain = CompletionChain::new().with("primary", provider.clone());
        let writer = Writer::new(chain, Arc::new(MockRepository::new()));

        let mut st = state();
        st.scout_seeds = vec!["stale seed".to_string()];
        st.add_candidate(rejected_candidate("Weak", "the perimeter distance is wrong"));
        writer.run(&mut st).await;

        let prompt = provider.last_prompt();
        assert!(prompt.contains("the perimeter distance is wrong"));
        assert!(!prompt.contains("stale seed"), "repair mode skips seeds");

        let repaired: Vec<_> = st
            .candidates
            .iter()
            .filter(|c| c.status == ScenarioStatus::Repaired)
            .collect();
        assert_eq!(repaired.len(), 1);
        assert_eq!(st.metrics.total_repaired, 1);
    }

    #[tokio::test]
    async fn test_repair_consumes_at_most_three_critiques() {
        let provider = Arc::new(ScriptedProvider::always("draft"));
        let chain = CompletionChain::new().with("primary", provider.clone());
        let writer = Writer::new(chain, Arc::new(MockRepository::new()));

        let mut st = state();
        for i in 0..5 {
            st.add_candidate(rejected_candidate(&format!("c{i}"), &format!("critique-{i}")));
        }
        writer.run(&mut st).await;

        let prompt = provider.last_prompt();
        let replayed = (0..5)
            .filter(|i| prompt.contains(&format!("critique-{i}")))
            .count();
        assert_eq!(replayed, 3);
        // All eligible candidates are consumed, not only the quoted three.
        assert_eq!(st.metrics.total_repaired, 5);
    }

    #[tokio::test]
    async fn test_all_providers_fail() {
        let a = Arc::new(ScriptedProvider::new(vec![Err(LlmError::ApiError {
            code: 400,
            message: "bad".to_string(),
        })]));
        let b = Arc::new(ScriptedProvider::new(vec![Err(LlmError::ApiError {
            code: 400,
            message: "bad".to_string(),
        })]));
        let chain = CompletionChain::new().with("a", a).with("b", b);
        let writer = Writer::new(chain, Arc::new(MockRepository::new()));

        let mut st = state();
        st.add_candidate(rejected_candidate("Weak", "needs work"));
        writer.run(&mut st).await;

        assert_eq!(st.candidates.len(), 1, "no draft produced");
        assert_eq!(st.metrics.llm_errors, 2);
        assert_eq!(st.errors.len(), 1);
        // The critique was not consumed: the candidate stays repair-eligible.
        assert_eq!(st.repair_eligible().len(), 1);
        assert_eq!(st.iteration, 1, "iteration advances even on failure");
    }

    #[tokio::test]
    async fn test_fallback_counts_errors() {
        let a = Arc::new(ScriptedProvider::new(vec![Err(LlmError::ApiError {
            code: 500,
            message: "down".to_string(),
        })]));
        let b = Arc::new(ScriptedProvider::always("draft text"));
        let chain = CompletionChain::new().with("a", a).with("b", b);
        let writer = Writer::new(chain, Arc::new(MockRepository::new()));

        let mut st = state();
        writer.run(&mut st).await;

        assert_eq!(st.metrics.llm_errors, 1);
        assert_eq!(st.candidates.len(), 1);
    }

    #[tokio::test]
    async fn test_gold_examples_loaded_once() {
        let provider = Arc::new(ScriptedProvider::always("draft"));
        let chain = CompletionChain::new().with("primary", provider.clone());
        let repo = Arc::new(MockRepository::new());
        repo.approved_examples
            .lock()
            .expect("lock poisoned")
            .push(ScenarioData::from_value(json!({
                "title": "Gold reference",
                "category": "suspicious object",
                "background": "a canonical example"
            })));
        let writer = Writer::new(chain, repo);

        let mut st = state();
        writer.run(&mut st).await;

        assert!(st.gold_examples.contains("Gold reference"));
        assert!(provider.last_prompt().contains("Gold reference"));

        // Second run reuses the cache.
        let cached = st.gold_examples.clone();
        writer.run(&mut st).await;
        assert_eq!(st.gold_examples, cached);
    }

    #[tokio::test]
    async fn test_empty_chain_records_error() {
        let writer = Writer::new(CompletionChain::new(), Arc::new(MockRepository::new()));
        let mut st = state();
        writer.run(&mut st).await;
        assert_eq!(st.errors.len(), 1);
        assert!(st.errors[0].contains("no providers"));
    }
}
