//! The Scout node: high-volume idea generation.
//!
//! The Scout asks a fast, cheap provider for a large pool of one-line
//! scenario ideas at high sampling temperature, optionally passing the raw
//! list through a stronger provider for refinement. Scout failure is never
//! fatal: a run with no seeds simply continues and the Writer falls back
//! to a category-only prompt.

use std::sync::Arc;

use regex::Regex;

use crate::llm::{CompletionProvider, CompletionRequest, Message};
use crate::prompts::{SCOUT_PROMPT, SCOUT_REFINE_PROMPT, SCOUT_SYSTEM_PROMPT};
use crate::swarm::{SwarmState, WorkflowPhase};

/// Minimum seed length in characters.
const SEED_MIN_CHARS: usize = 15;

/// Maximum seed length in characters.
const SEED_MAX_CHARS: usize = 250;

/// Sampling temperature for brainstorming.
const SCOUT_TEMPERATURE: f64 = 0.9;

/// Idea generation node.
pub struct Scout {
    /// Fast provider used for raw brainstorming.
    primary: Option<Arc<dyn CompletionProvider>>,
    /// Stronger provider used to refine the raw list, or to generate
    /// directly when the primary is unavailable.
    refiner: Option<Arc<dyn CompletionProvider>>,
}

impl Scout {
    /// Create a Scout over the given providers.
    pub fn new(
        primary: Option<Arc<dyn CompletionProvider>>,
        refiner: Option<Arc<dyn CompletionProvider>>,
    ) -> Self {
        Self { primary, refiner }
    }

    /// Generate idea seeds into `state.scout_seeds`.
    pub async fn run(&self, state: &mut SwarmState) {
        state.set_phase(WorkflowPhase::Scouting);
        state.scout_seeds.clear();

        let seed_count = state.config.batch_size * 3;
        tracing::info!(
            count = seed_count,
            category = state.config.category.as_str(),
            "Scout starting"
        );

        if self.primary.is_none() && self.refiner.is_none() {
            tracing::warn!("Scout skipped: no ideation provider available");
            return;
        }

        let prompt = SCOUT_PROMPT
            .replace("{count}", &seed_count.to_string())
            .replace("{category}", &state.config.category);

        let mut raw_text: Option<String> = None;
        let mut primary_used = false;

        if let Some(primary) = &self.primary {
            let request = CompletionRequest::new(
                "",
                vec![
                    Message::system(SCOUT_SYSTEM_PROMPT),
                    Message::user(prompt.clone()),
                ],
            )
            .with_temperature(SCOUT_TEMPERATURE);

            match primary.complete(request).await {
                Ok(response) => match response.text() {
                    Ok(text) => {
                        raw_text = Some(text);
                        primary_used = true;
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "Scout primary returned no content");
                        state.metrics.llm_errors += 1;
                    }
                },
                Err(e) => {
                    tracing::warn!(error = %e, "Scout primary failed, falling back");
                    state.metrics.llm_errors += 1;
                }
            }
        }

        // Primary unavailable or failed: ask the refiner to generate directly.
        if raw_text.is_none() {
            if let Some(refiner) = &self.refiner {
                let request = CompletionRequest::new(
                    "",
                    vec![
                        Message::system(SCOUT_SYSTEM_PROMPT),
                        Message::user(prompt),
                    ],
                )
                .with_temperature(SCOUT_TEMPERATURE);

                match refiner.complete(request).await {
                    Ok(response) => raw_text = response.text().ok(),
                    Err(e) => {
                        tracing::warn!(error = %e, "Scout fallback failed, continuing without seeds");
                        state.metrics.llm_errors += 1;
                    }
                }
            }
        } else if primary_used {
            // Optional refinement pass over the raw brainstorm.
            if let Some(refiner) = &self.refiner {
                let refine_prompt = SCOUT_REFINE_PROMPT
                    .replace("{category}", &state.config.category)
                    .replace("{ideas}", raw_text.as_deref().unwrap_or_default());
                let request = CompletionRequest::new(
                    "",
                    vec![
                        Message::system(SCOUT_SYSTEM_PROMPT),
                        Message::user(refine_prompt),
                    ],
                );
                match refiner.complete(request).await {
                    Ok(response) => {
                        if let Ok(text) = response.text() {
                            raw_text = Some(text);
                        }
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "Seed refinement failed, keeping raw list");
                        state.metrics.llm_errors += 1;
                    }
                }
            }
        }

        let Some(raw_text) = raw_text else {
            tracing::warn!("Scout produced no text, continuing without seeds");
            return;
        };

        let seeds = parse_seeds(&raw_text);
        tracing::info!(
            seeds = seeds.len(),
            chars = raw_text.len(),
            "Scout completed"
        );
        state.scout_seeds = seeds;
    }
}

/// Split raw LLM output into seed lines: strip list markers and discard
/// lines outside the length bound.
pub fn parse_seeds(raw_text: &str) -> Vec<String> {
    let numbered = Regex::new(r"^\d+[.)]\s*").expect("static regex");
    let bulleted = Regex::new(r"^[-*•]\s*").expect("static regex");

    raw_text
        .lines()
        .map(|line| {
            let line = line.trim();
            let line = numbered.replace(line, "");
            let line = bulleted.replace(&line, "");
            line.trim().to_string()
        })
        .filter(|line| {
            let chars = line.chars().count();
            (SEED_MIN_CHARS..=SEED_MAX_CHARS).contains(&chars)
        })
        .collect()
}
