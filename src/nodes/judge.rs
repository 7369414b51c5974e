//! The Judge node: two-phase, cost-ordered evaluation.
//!
//! Phase 1 is the deterministic doctrine pass — no external call. A hard
//! violation forces a zero score and rejects the candidate without ever
//! invoking the LLM judge. Phase 2 asks the LLM judge for a rubric score
//! and critique; if the call fails the doctrine score stands in for it and
//! the degradation is noted in the critique.
//!
//! The final score is `doctrine * 0.4 + llm * 0.6`, and feedback is
//! recorded on the candidate in every branch, advancing its attempt count.

use std::sync::Arc;

use crate::doctrine;
use crate::error::LlmError;
use crate::llm::{CompletionProvider, CompletionRequest, Message};
use crate::prompts::{JUDGE_PROMPT, JUDGE_RUBRIC, JUDGE_SYSTEM_PROMPT};
use crate::scenario::ScenarioData;
use crate::swarm::{RejectedBy, ScenarioStatus, SwarmState, WorkflowPhase};

/// Weight of the deterministic doctrine score in the final score.
const DOCTRINE_WEIGHT: f64 = 0.4;

/// Weight of the LLM judge score in the final score.
const LLM_WEIGHT: f64 = 0.6;

/// Score assumed when the judge reply cannot be parsed.
const UNPARSEABLE_REPLY_SCORE: f64 = 60.0;

/// Quality adjudication node.
pub struct Judge {
    provider: Option<Arc<dyn CompletionProvider>>,
}

impl Judge {
    /// Create a Judge over the given provider.
    pub fn new(provider: Option<Arc<dyn CompletionProvider>>) -> Self {
        Self { provider }
    }

    /// Evaluate every unique candidate.
    pub async fn run(&self, state: &mut SwarmState) {
        state.set_phase(WorkflowPhase::Judging);

        let indexes: Vec<usize> = state
            .candidates
            .iter()
            .enumerate()
            .filter(|(_, c)| !c.is_raw_draft && c.status == ScenarioStatus::Unique)
            .map(|(i, _)| i)
            .collect();

        if indexes.is_empty() {
            tracing::info!("Judge: no unique candidates to evaluate");
            return;
        }

        tracing::info!(candidates = indexes.len(), "Judge evaluating");

        let threshold = state.config.score_threshold;
        let mut scores = Vec::new();

        for idx in indexes {
            let report = doctrine::evaluate(&state.candidates[idx].data);

            if !report.is_valid {
                let candidate = &mut state.candidates[idx];
                candidate.record_feedback(
                    format!("Doctrine failure: {}", report.errors.join(", ")),
                    0.0,
                );
                candidate.status = ScenarioStatus::Rejected;
                candidate.rejected_by = Some(RejectedBy::Judge);
                state.metrics.total_rejected += 1;
                tracing::debug!(title = state.candidates[idx].title(), "Rejected by doctrine");
                continue;
            }

            let llm_result = self.score_with_llm(&state.candidates[idx].data).await;
            let (llm_score, llm_critique) =
                match llm_result {
                    Ok(result) => result,
                    Err(e) => {
                        tracing::warn!(error = %e, "LLM scoring failed, using doctrine score");
                        state.metrics.llm_errors += 1;
                        (
                            report.doctrine_score,
                            format!(
                                "LLM judge unavailable; doctrine score only. Warnings: {}",
                                report.warnings.join(", ")
                            ),
                        )
                    }
                };

            let final_score = report.doctrine_score * DOCTRINE_WEIGHT + llm_score * LLM_WEIGHT;

            let mut full_critique = llm_critique;
            if !report.warnings.is_empty() {
                full_critique
                    .push_str(&format!("\n\nDoctrine warnings: {}", report.warnings.join(", ")));
            }

            let candidate = &mut state.candidates[idx];
            candidate.record_feedback(full_critique, final_score);
            scores.push(final_score);

            if final_score >= threshold {
                candidate.status = ScenarioStatus::Approved;
                state.metrics.total_approved += 1;
                tracing::info!(
                    title = state.candidates[idx].title(),
                    score = final_score,
                    threshold,
                    "Judge approved"
                );
            } else {
                candidate.status = ScenarioStatus::Rejected;
                candidate.rejected_by = Some(RejectedBy::Judge);
                state.metrics.total_rejected += 1;
                tracing::debug!(
                    title = state.candidates[idx].title(),
                    score = final_score,
                    threshold,
                    "Judge rejected"
                );
            }
        }

        state.metrics.update_score_stats(&scores);

        tracing::info!(
            approved = state.metrics.total_approved,
            rejected = state.metrics.total_rejected,
            avg_score = state.metrics.average_score,
            "Judge completed"
        );
    }

    /// Ask the LLM judge for a rubric score and critique.
    async fn score_with_llm(&self, data: &ScenarioData) -> Result<(f64, String), LlmError> {
        let Some(provider) = &self.provider else {
            return Err(LlmError::RequestFailed(
                "judge provider not configured".to_string(),
            ));
        };

        let scenario_json = serde_json::to_string_pretty(data)
            .map_err(|e| LlmError::ParseError(e.to_string()))?;
        let prompt = JUDGE_PROMPT
            .replace("{rubric}", JUDGE_RUBRIC)
            .replace("{scenario}", &scenario_json);

        let request = CompletionRequest::new(
            "",
            vec![Message::system(JUDGE_SYSTEM_PROMPT), Message::user(prompt)],
        )
        .with_json_output();

        let text = provider.complete(request).await?.text()?;
        Ok(parse_verdict(&text))
    }
}

/// Parse the judge reply into (score, critique). An unparseable reply
/// yields a conservative fixed score rather than failing the candidate.
fn parse_verdict(text: &str) -> (f64, String) {
    let Some(value) = crate::utils::parse_llm_json(text) else {
        tracing::warn!("Failed to parse judge reply");
        return (
            UNPARSEABLE_REPLY_SCORE,
            "Judge reply could not be parsed".to_string(),
        );
    };

    let score = value
        .get("score")
        .and_then(|v| v.as_f64())
        .unwrap_or(UNPARSEABLE_REPLY_SCORE)
        .clamp(0.0, 100.0);

    let mut critique = value
        .get("critique")
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .to_string();

    let join_list = |key: &str| -> Vec<String> {
        value
            .get(key)
            .and_then(|v| v.as_array())
            .map(|items| {
                items
                    .iter()
                    .filter_map(|i| i.as_str())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    };

    let strengths = join_list("strengths");
    if !strengths.is_empty() {
        critique.push_str(&format!("\n\nStrengths: {}", strengths.join(", ")));
    }
    let weaknesses = join_list("weaknesses");
    if !weaknesses.is_empty() {
        critique.push_str(&format!("\n\nWeaknesses: {}", weaknesses.join(", ")));
    }

    if let Some(instructions) = value.get("repair_instructions").and_then(|v| v.as_array()) {
        let mut lines = Vec::new();
        for instr in instructions {
            let field = instr.get("field").and_then(|v| v.as_str()).unwrap_or("general");
            let issue = instr.get("issue").and_then(|v| v.as_str()).unwrap_or("");
            let fix = instr.get("fix").and_then(|v| v.as_str()).unwrap_or("");
            lines.push(format!("- [{field}]: {issue} -> {fix}"));
        }
        if !lines.is_empty() {
            critique.push_str(&format!(
                "\n\nRepair instructions for the writer:\n{}",
                lines.join("\n")
            ));
        }
    }

    (score, critique.trim().to_string())
}
