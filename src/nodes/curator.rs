//! The Curator node: seed filtering.
//!
//! The Curator asks a provider to rank the Scout's raw seed pool and keep
//! the `batch_size` best ideas. It must never stall the pipeline: on
//! provider failure or unparseable output it falls back to taking the
//! first `batch_size` seeds verbatim.

use std::sync::Arc;

use crate::llm::{CompletionProvider, CompletionRequest, Message};
use crate::prompts::{CURATOR_PROMPT, CURATOR_SYSTEM_PROMPT};
use crate::swarm::{SwarmState, WorkflowPhase};
use crate::utils::parse_llm_json;

/// Seeds shorter than this after curation are treated as noise.
const MIN_SELECTED_SEED_CHARS: usize = 6;

/// Seed filtering node.
pub struct Curator {
    provider: Option<Arc<dyn CompletionProvider>>,
}

impl Curator {
    /// Create a Curator over the given provider.
    pub fn new(provider: Option<Arc<dyn CompletionProvider>>) -> Self {
        Self { provider }
    }

    /// Filter `state.scout_seeds` down to `batch_size` entries.
    pub async fn run(&self, state: &mut SwarmState) {
        state.set_phase(WorkflowPhase::Curating);

        if state.scout_seeds.is_empty() {
            tracing::info!("Curator skipped: no seeds from Scout");
            return;
        }

        let batch_size = state.config.batch_size;
        tracing::info!(
            from = state.scout_seeds.len(),
            to = batch_size,
            "Curator starting"
        );

        let Some(provider) = &self.provider else {
            tracing::warn!("Curator skipped: no provider available, truncating seed list");
            state.scout_seeds.truncate(batch_size);
            return;
        };

        let seeds_text = state
            .scout_seeds
            .iter()
            .enumerate()
            .map(|(i, seed)| format!("{}. {}", i + 1, seed))
            .collect::<Vec<_>>()
            .join("\n");

        let prompt = CURATOR_PROMPT
            .replace("{count}", &batch_size.to_string())
            .replace("{category}", &state.config.category)
            .replace("{seeds}", &seeds_text);

        let request = CompletionRequest::new(
            "",
            vec![
                Message::system(CURATOR_SYSTEM_PROMPT),
                Message::user(prompt),
            ],
        )
        .with_json_output();

        match provider.complete(request).await {
            Ok(response) => {
                let text = response.text().unwrap_or_default();
                let curated = parse_selected_seeds(&text);
                match curated {
                    Some(selected) if !selected.is_empty() => {
                        tracing::info!(
                            selected = selected.len(),
                            from = state.scout_seeds.len(),
                            "Curator completed"
                        );
                        state.scout_seeds = selected;
                    }
                    _ => {
                        tracing::warn!("Curator response unusable, keeping first seeds");
                        state.scout_seeds.truncate(batch_size);
                    }
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "Curator failed, keeping first seeds");
                state.metrics.llm_errors += 1;
                state.scout_seeds.truncate(batch_size);
            }
        }
    }
}

/// Parse the curation reply: `{"selected_seeds": [...], "reasoning": "..."}`.
fn parse_selected_seeds(text: &str) -> Option<Vec<String>> {
    let value = parse_llm_json(text)?;
    let selected = value.get("selected_seeds")?.as_array()?;
    Some(
        selected
            .iter()
            .filter_map(|v| v.as_str())
            .filter(|s| s.chars().count() >= MIN_SELECTED_SEED_CHARS)
            .map(|s| s.to_string())
            .collect(),
    )
}
