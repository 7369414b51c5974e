//! Workflow state for one generation run.
//!
//! `SwarmState` is the aggregate root threaded through every pipeline node:
//! run configuration, the full candidate pool, metrics, errors, and the
//! current phase. Candidates are append-only — a candidate leaves
//! consideration through a status transition, never by removal, so the full
//! audit history of a run survives to the end.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::scenario::{Bundle, ScenarioData};

use super::config::SwarmConfig;
use super::metrics::SwarmMetrics;

/// Lifecycle status of a scenario candidate.
///
/// `Draft → Formatted → Unique → {Approved | Rejected}`; rejected
/// candidates whose critique is consumed by a repair draft become
/// `Repaired` (their rework re-enters the pipeline as a fresh `Formatted`
/// record), and persisted candidates become `Archived`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScenarioStatus {
    Draft,
    Formatted,
    Unique,
    Approved,
    Rejected,
    Repaired,
    Archived,
}

impl std::fmt::Display for ScenarioStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ScenarioStatus::Draft => "draft",
            ScenarioStatus::Formatted => "formatted",
            ScenarioStatus::Unique => "unique",
            ScenarioStatus::Approved => "approved",
            ScenarioStatus::Rejected => "rejected",
            ScenarioStatus::Repaired => "repaired",
            ScenarioStatus::Archived => "archived",
        };
        write!(f, "{s}")
    }
}

/// Which stage rejected a candidate. Only judge rejections are eligible
/// for repair; deduplicated-out candidates never are.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectedBy {
    Deduplicator,
    Judge,
}

/// Phase of the workflow, for logging and terminal reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowPhase {
    Init,
    Scouting,
    Curating,
    Writing,
    Formatting,
    Deduplicating,
    Judging,
    Supervising,
    Archiving,
    Complete,
    Error,
}

/// One in-flight scenario candidate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioCandidate {
    /// Stable identifier for this candidate within the run.
    pub id: Uuid,
    /// Scenario payload (open key/value record).
    pub data: ScenarioData,
    /// Current lifecycle status.
    pub status: ScenarioStatus,
    /// Latest score recorded by the Judge (0-100).
    pub score: f64,
    /// Latest critique.
    pub critique: String,
    /// Append-only feedback log, one entry per judging round.
    pub feedback_history: Vec<String>,
    /// Append-only score log, parallel to `feedback_history`.
    pub score_history: Vec<f64>,
    /// 1 + number of feedback recordings.
    pub attempt_count: u32,
    /// Which stage rejected this candidate, when status is `Rejected`.
    pub rejected_by: Option<RejectedBy>,
    /// True for the Writer's raw-draft carrier candidates.
    pub is_raw_draft: bool,
    /// Embedding cached during this run; never persisted with the state.
    #[serde(skip)]
    pub embedding: Option<Vec<f32>>,
}

impl ScenarioCandidate {
    /// Create a fresh candidate for the given payload.
    pub fn new(data: ScenarioData, status: ScenarioStatus) -> Self {
        Self {
            id: Uuid::new_v4(),
            data,
            status,
            score: 0.0,
            critique: String::new(),
            feedback_history: Vec::new(),
            score_history: Vec::new(),
            attempt_count: 1,
            rejected_by: None,
            is_raw_draft: false,
            embedding: None,
        }
    }

    /// Wrap a raw Writer draft as a transient carrier candidate.
    pub fn raw_draft(text: impl Into<String>, model: &str, category: &str) -> Self {
        let mut data = ScenarioData::new();
        data.insert("raw_text", serde_json::Value::String(text.into()));
        data.insert("model", serde_json::Value::String(model.to_string()));
        data.insert("category", serde_json::Value::String(category.to_string()));
        let mut candidate = Self::new(data, ScenarioStatus::Draft);
        candidate.is_raw_draft = true;
        candidate
    }

    /// Candidate title (empty for raw drafts).
    pub fn title(&self) -> &str {
        self.data.title()
    }

    /// Record one round of judge feedback. Advances `attempt_count` by
    /// exactly one and updates the latest score/critique.
    pub fn record_feedback(&mut self, critique: impl Into<String>, score: f64) {
        let critique = critique.into();
        self.feedback_history.push(critique.clone());
        self.score_history.push(score);
        self.critique = critique;
        self.score = score;
        self.attempt_count += 1;
    }

    /// Whether this candidate may still be routed back for repair:
    /// rejected by the Judge, with attempt budget remaining.
    pub fn is_repair_eligible(&self, max_retries: u32) -> bool {
        self.status == ScenarioStatus::Rejected
            && self.rejected_by == Some(RejectedBy::Judge)
            && self.attempt_count <= max_retries
    }
}

/// Aggregate root for one generation run.
#[derive(Debug, Clone)]
pub struct SwarmState {
    /// Immutable run configuration.
    pub config: SwarmConfig,
    /// Identifier shared by every scenario this run produces.
    pub bundle_id: String,
    /// Generation cycles launched so far; incremented by the Writer.
    pub iteration: u32,
    /// Idea seeds produced by the Scout and filtered by the Curator.
    pub scout_seeds: Vec<String>,
    /// Reference examples loaded once from the repository and reused.
    pub gold_examples: String,
    /// Append-only candidate pool.
    pub candidates: Vec<ScenarioCandidate>,
    /// Aggregate counters and statistics.
    pub metrics: SwarmMetrics,
    /// Human-readable failure notes.
    pub errors: Vec<String>,
    /// Current workflow phase.
    pub current_phase: WorkflowPhase,
}

impl SwarmState {
    /// Create the state for a new run.
    pub fn new(config: SwarmConfig) -> Self {
        Self {
            config,
            bundle_id: format!("bundle-{}", Uuid::new_v4()),
            iteration: 0,
            scout_seeds: Vec::new(),
            gold_examples: String::new(),
            candidates: Vec::new(),
            metrics: SwarmMetrics::new(),
            errors: Vec::new(),
            current_phase: WorkflowPhase::Init,
        }
    }

    /// Transition to a new phase, logging the change.
    pub fn set_phase(&mut self, phase: WorkflowPhase) {
        tracing::info!(from = ?self.current_phase, to = ?phase, "Phase change");
        self.current_phase = phase;
    }

    /// Record a failure note.
    pub fn add_error(&mut self, message: impl Into<String>) {
        let message = message.into();
        tracing::error!(error = message.as_str(), "Run error recorded");
        self.errors.push(message);
    }

    /// Append a candidate to the pool.
    pub fn add_candidate(&mut self, candidate: ScenarioCandidate) {
        self.candidates.push(candidate);
    }

    /// Candidates currently in the given status (raw drafts excluded).
    pub fn candidates_with_status(
        &self,
        status: ScenarioStatus,
    ) -> impl Iterator<Item = &ScenarioCandidate> {
        self.candidates
            .iter()
            .filter(move |c| c.status == status && !c.is_raw_draft)
    }

    /// Number of approved candidates.
    pub fn approved_count(&self) -> usize {
        self.candidates_with_status(ScenarioStatus::Approved).count()
    }

    /// Candidates still eligible for repair routing.
    pub fn repair_eligible(&self) -> Vec<&ScenarioCandidate> {
        self.candidates
            .iter()
            .filter(|c| c.is_repair_eligible(self.config.max_retries_per_scenario))
            .collect()
    }

    /// Whether the run still needs more approved scenarios.
    pub fn needs_more(&self) -> bool {
        self.approved_count() < self.config.target_count
    }

    /// The bundle view: approved (or already archived) scenario payloads.
    pub fn bundle(&self) -> Bundle {
        let scenarios: Vec<ScenarioData> = self
            .candidates
            .iter()
            .filter(|c| {
                !c.is_raw_draft
                    && matches!(
                        c.status,
                        ScenarioStatus::Approved | ScenarioStatus::Archived
                    )
            })
            .map(|c| c.data.clone())
            .collect();
        Bundle {
            bundle_id: self.bundle_id.clone(),
            scenarios,
        }
    }

    /// The summary view for reporting.
    pub fn summary(&self) -> RunSummary {
        RunSummary {
            bundle_id: self.bundle_id.clone(),
            category: self.config.category.clone(),
            phase: self.current_phase,
            iterations: self.iteration,
            total_candidates: self
                .candidates
                .iter()
                .filter(|c| !c.is_raw_draft)
                .count(),
            approved: self.approved_count(),
            rejected: self.candidates_with_status(ScenarioStatus::Rejected).count(),
            archived: self.candidates_with_status(ScenarioStatus::Archived).count(),
            error_count: self.errors.len(),
            metrics: self.metrics.clone(),
        }
    }
}

/// Counts and metrics for terminal reporting of one run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub bundle_id: String,
    pub category: String,
    pub phase: WorkflowPhase,
    pub iterations: u32,
    pub total_candidates: usize,
    pub approved: usize,
    pub rejected: usize,
    pub archived: usize,
    pub error_count: usize,
    pub metrics: SwarmMetrics,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn scenario(title: &str) -> ScenarioData {
        ScenarioData::from_value(json!({"title": title, "category": "emergency"}))
    }

    #[test]
    fn test_fresh_candidate_attempt_count() {
        let c = ScenarioCandidate::new(scenario("T"), ScenarioStatus::Formatted);
        assert_eq!(c.attempt_count, 1);
        assert!(c.feedback_history.is_empty());
        assert!(c.score_history.is_empty());
    }

    #[test]
    fn test_record_feedback_advances_attempt_count() {
        let mut c = ScenarioCandidate::new(scenario("T"), ScenarioStatus::Unique);
        c.record_feedback("needs more detail", 55.0);
        c.record_feedback("better, still thin", 68.0);
        c.record_feedback("good", 82.0);

        assert_eq!(c.attempt_count, 4);
        assert_eq!(c.feedback_history.len(), 3);
        assert_eq!(c.score_history.len(), 3);
        assert_eq!(c.attempt_count as usize, 1 + c.feedback_history.len());
        assert_eq!(c.score, 82.0);
        assert_eq!(c.critique, "good");
    }

    #[test]
    fn test_repair_eligibility() {
        let mut c = ScenarioCandidate::new(scenario("T"), ScenarioStatus::Unique);
        c.record_feedback("too vague", 40.0);
        c.status = ScenarioStatus::Rejected;
        c.rejected_by = Some(RejectedBy::Judge);
        assert!(c.is_repair_eligible(2));

        // Exhausted attempt budget.
        c.record_feedback("still too vague", 45.0);
        assert_eq!(c.attempt_count, 3);
        assert!(!c.is_repair_eligible(2));
    }

    #[test]
    fn test_dedup_rejection_is_never_repairable() {
        let mut c = ScenarioCandidate::new(scenario("T"), ScenarioStatus::Formatted);
        c.status = ScenarioStatus::Rejected;
        c.rejected_by = Some(RejectedBy::Deduplicator);
        c.critique = "too similar to an existing scenario".to_string();
        assert!(!c.is_repair_eligible(10));
    }

    #[test]
    fn test_raw_draft_candidate() {
        let c = ScenarioCandidate::raw_draft("draft text", "model-x", "emergency");
        assert!(c.is_raw_draft);
        assert_eq!(c.status, ScenarioStatus::Draft);
        assert_eq!(c.data.get_str("raw_text"), "draft text");
        assert_eq!(c.data.category(), "emergency");
    }

    #[test]
    fn test_state_counts_and_bundle() {
        let mut state = SwarmState::new(SwarmConfig::new("emergency"));
        let mut approved = ScenarioCandidate::new(scenario("A"), ScenarioStatus::Approved);
        approved.record_feedback("solid", 90.0);
        state.add_candidate(approved);
        state.add_candidate(ScenarioCandidate::new(
            scenario("B"),
            ScenarioStatus::Rejected,
        ));
        state.add_candidate(ScenarioCandidate::raw_draft("x", "m", "emergency"));

        assert_eq!(state.approved_count(), 1);
        assert_eq!(state.bundle().len(), 1);
        let summary = state.summary();
        assert_eq!(summary.total_candidates, 2, "raw drafts are not counted");
        assert_eq!(summary.approved, 1);
        assert_eq!(summary.rejected, 1);
    }

    #[test]
    fn test_bundle_includes_archived() {
        let mut state = SwarmState::new(SwarmConfig::new("emergency"));
        state.add_candidate(ScenarioCandidate::new(
            scenario("A"),
            ScenarioStatus::Archived,
        ));
        assert_eq!(state.bundle().len(), 1);
    }

    #[test]
    fn test_needs_more() {
        let mut state = SwarmState::new(SwarmConfig {
            target_count: 1,
            ..SwarmConfig::new("emergency")
        });
        assert!(state.needs_more());
        state.add_candidate(ScenarioCandidate::new(
            scenario("A"),
            ScenarioStatus::Approved,
        ));
        assert!(!state.needs_more());
    }

    #[test]
    fn test_repair_eligible_view() {
        let mut state = SwarmState::new(SwarmConfig::new("emergency"));
        let mut judge_rejected = ScenarioCandidate::new(scenario("J"), ScenarioStatus::Unique);
        judge_rejected.record_feedback("weak", 30.0);
        judge_rejected.status = ScenarioStatus::Rejected;
        judge_rejected.rejected_by = Some(RejectedBy::Judge);

        let mut dedup_rejected = ScenarioCandidate::new(scenario("D"), ScenarioStatus::Formatted);
        dedup_rejected.status = ScenarioStatus::Rejected;
        dedup_rejected.rejected_by = Some(RejectedBy::Deduplicator);

        state.add_candidate(judge_rejected);
        state.add_candidate(dedup_rejected);

        let eligible = state.repair_eligible();
        assert_eq!(eligible.len(), 1);
        assert_eq!(eligible[0].title(), "J");
    }
}
