//! The Clerk node: structured formatting.
//!
//! The Clerk converts the Writer's free-text drafts into structured
//! scenario records via a JSON-constrained provider call, with one stricter
//! retry and a direct parse of the raw draft as the last resort. Every raw
//! draft is consumed by this stage whether or not it produced children;
//! unparseable drafts are counted, not retried indefinitely.

use std::sync::Arc;

use serde_json::Value;

use crate::llm::{CompletionProvider, CompletionRequest, Message};
use crate::prompts::{CLERK_RETRY_PROMPT, CLERK_SYSTEM_PROMPT};
use crate::scenario::ScenarioData;
use crate::swarm::{ScenarioCandidate, ScenarioStatus, SwarmState, WorkflowPhase};
use crate::utils::parse_llm_json;

/// Structured formatting node.
pub struct Clerk {
    provider: Option<Arc<dyn CompletionProvider>>,
}

impl Clerk {
    /// Create a Clerk over the given provider.
    pub fn new(provider: Option<Arc<dyn CompletionProvider>>) -> Self {
        Self { provider }
    }

    /// Convert raw drafts into formatted candidates.
    pub async fn run(&self, state: &mut SwarmState) {
        state.set_phase(WorkflowPhase::Formatting);

        let draft_indexes: Vec<usize> = state
            .candidates
            .iter()
            .enumerate()
            .filter(|(_, c)| c.is_raw_draft && c.status == ScenarioStatus::Draft)
            .map(|(i, _)| i)
            .collect();

        if draft_indexes.is_empty() {
            tracing::info!("Clerk: no raw drafts to process");
            return;
        }

        tracing::info!(drafts = draft_indexes.len(), "Clerk starting");

        if self.provider.is_none() {
            state.add_error("Clerk: no formatting provider configured");
        }

        let category = state.config.category.clone();
        let bundle_id = state.bundle_id.clone();

        for idx in draft_indexes {
            let draft_text = state.candidates[idx].data.get_str("raw_text").to_string();

            let mut scenarios = Vec::new();
            if !draft_text.is_empty() {
                scenarios = self
                    .format_draft(&draft_text, &category, &bundle_id, state)
                    .await;
            }

            if scenarios.is_empty() {
                tracing::warn!("Clerk: no valid scenarios extracted from draft");
                state.metrics.parse_errors += 1;
            }

            let formatted = scenarios.len() as u64;
            for data in scenarios {
                let candidate = ScenarioCandidate::new(data, ScenarioStatus::Formatted);
                tracing::debug!(title = candidate.title(), "Clerk formatted");
                state.add_candidate(candidate);
            }
            state.metrics.total_generated += formatted;

            // The raw draft is consumed either way; candidates are
            // append-only so it leaves the pool by status transition.
            state.candidates[idx].status = ScenarioStatus::Archived;
        }
    }

    /// Run the refine / stricter-retry / direct-parse ladder for one draft.
    async fn format_draft(
        &self,
        draft_text: &str,
        category: &str,
        bundle_id: &str,
        state: &mut SwarmState,
    ) -> Vec<ScenarioData> {
        if let Some(provider) = &self.provider {
            // First pass: system-prompted JSON refinement.
            match self.refine(provider, Message::user(draft_text)).await {
                Ok(text) => {
                    let scenarios = parse_scenarios(&text, category, bundle_id);
                    if !scenarios.is_empty() {
                        return scenarios;
                    }
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Clerk refinement failed");
                    state.metrics.llm_errors += 1;
                }
            }

            // Second pass: stricter instruction.
            let retry_prompt = CLERK_RETRY_PROMPT.replace("{draft}", draft_text);
            match self.refine(provider, Message::user(retry_prompt)).await {
                Ok(text) => {
                    let scenarios = parse_scenarios(&text, category, bundle_id);
                    if !scenarios.is_empty() {
                        return scenarios;
                    }
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Clerk second refinement attempt failed");
                    state.metrics.llm_errors += 1;
                }
            }
        }

        // Last resort: the draft itself may already be JSON.
        parse_scenarios(draft_text, category, bundle_id)
    }

    async fn refine(
        &self,
        provider: &Arc<dyn CompletionProvider>,
        user_message: Message,
    ) -> Result<String, crate::error::LlmError> {
        let request = CompletionRequest::new(
            "",
            vec![Message::system(CLERK_SYSTEM_PROMPT), user_message],
        )
        .with_json_output();
        provider.complete(request).await?.text()
    }
}

/// Parse formatting output into scenario records.
///
/// Accepts `{"scenarios": [...]}`, a bare array, or a single object.
/// Records without a non-empty title are discarded; a missing category
/// inherits the run category; every record is tagged with the bundle and
/// shape-coerced.
fn parse_scenarios(text: &str, category: &str, bundle_id: &str) -> Vec<ScenarioData> {
    let Some(value) = parse_llm_json(text) else {
        return Vec::new();
    };

    let raw_scenarios: Vec<Value> = match value {
        Value::Object(ref map) if map.contains_key("scenarios") => map
            .get("scenarios")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default(),
        Value::Array(items) => items,
        Value::Object(_) => vec![value],
        _ => Vec::new(),
    };

    raw_scenarios
        .into_iter()
        .filter_map(|raw| {
            let mut data = ScenarioData::from_value(raw);
            if data.title().trim().is_empty() {
                tracing::debug!("Skipping scenario without title");
                return None;
            }
            if data.category().trim().is_empty() {
                data.insert("category", Value::String(category.to_string()));
            }
            data.insert("bundle_id", Value::String(bundle_id.to_string()));
            data.coerce_shape();
            Some(data)
        })
        .collect()
}
