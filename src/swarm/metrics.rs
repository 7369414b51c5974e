//! Aggregate counters and score statistics for one run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Counters and statistics accumulated over one run.
///
/// Each counter is updated only by the pipeline node that owns the
/// corresponding event: the Clerk counts formatted candidates, the
/// Deduplicator counts skipped duplicates, the Judge counts verdicts, the
/// Writer counts repairs and provider failures it observed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwarmMetrics {
    /// Candidates created by the Clerk.
    pub total_generated: u64,
    /// Candidates approved by the Judge.
    pub total_approved: u64,
    /// Candidates rejected by the Judge or the doctrine pass.
    pub total_rejected: u64,
    /// Rejected candidates whose critiques were folded into a repair draft.
    pub total_repaired: u64,
    /// Candidates skipped as near-duplicates.
    pub duplicates_skipped: u64,
    /// Failed LLM provider calls.
    pub llm_errors: u64,
    /// Drafts that could not be parsed into scenarios.
    pub parse_errors: u64,
    /// Mean score over the most recent judged set.
    pub average_score: f64,
    /// Highest score over the most recent judged set.
    pub highest_score: f64,
    /// Lowest score over the most recent judged set.
    pub lowest_score: f64,
    /// Run start time.
    pub started_at: DateTime<Utc>,
    /// Run end time, set by the Archivist (or on error termination).
    pub finished_at: Option<DateTime<Utc>>,
}

impl Default for SwarmMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl SwarmMetrics {
    /// Create metrics stamped with the current time.
    pub fn new() -> Self {
        Self {
            total_generated: 0,
            total_approved: 0,
            total_rejected: 0,
            total_repaired: 0,
            duplicates_skipped: 0,
            llm_errors: 0,
            parse_errors: 0,
            average_score: 0.0,
            highest_score: 0.0,
            lowest_score: 0.0,
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    /// Refresh score statistics from the scores of the current judged set.
    pub fn update_score_stats(&mut self, scores: &[f64]) {
        if scores.is_empty() {
            return;
        }
        self.average_score = scores.iter().sum::<f64>() / scores.len() as f64;
        self.highest_score = scores.iter().copied().fold(f64::MIN, f64::max);
        self.lowest_score = scores.iter().copied().fold(f64::MAX, f64::min);
    }

    /// Stamp the end of the run.
    pub fn finalize(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    /// Wall-clock duration of the run, if finished.
    pub fn elapsed(&self) -> Option<chrono::Duration> {
        self.finished_at.map(|end| end - self.started_at)
    }
}
