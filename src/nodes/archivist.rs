//! The Archivist node: persistence of approved candidates.
//!
//! Every approved candidate is inserted through the repository, tagged
//! with the run's bundle id, and its cached embedding is persisted
//! best-effort. A per-item failure is logged and the remaining items
//! continue — one bad record must not lose the rest of the batch.

use std::sync::Arc;

use crate::storage::ScenarioRepository;
use crate::swarm::{ScenarioStatus, SwarmState, WorkflowPhase};

/// Persistence node.
pub struct Archivist {
    repository: Arc<dyn ScenarioRepository>,
}

impl Archivist {
    /// Create an Archivist over the given repository.
    pub fn new(repository: Arc<dyn ScenarioRepository>) -> Self {
        Self { repository }
    }

    /// Persist approved candidates and finalize the run.
    pub async fn run(&self, state: &mut SwarmState) {
        state.set_phase(WorkflowPhase::Archiving);

        let indexes: Vec<usize> = state
            .candidates
            .iter()
            .enumerate()
            .filter(|(_, c)| !c.is_raw_draft && c.status == ScenarioStatus::Approved)
            .map(|(i, _)| i)
            .collect();

        tracing::info!(approved = indexes.len(), "Archivist starting");

        let bundle_id = state.bundle_id.clone();
        let mut archived = 0usize;

        for idx in indexes {
            let data = state.candidates[idx].data.clone();
            let title = data.title().to_string();

            match self.repository.insert_scenario(&data, &bundle_id).await {
                Ok(id) => {
                    tracing::debug!(title = title.as_str(), id, "Scenario archived");

                    if let Some(embedding) = state.candidates[idx].embedding.clone() {
                        if let Err(e) = self.repository.save_embedding(&title, &embedding).await {
                            tracing::debug!(
                                title = title.as_str(),
                                error = %e,
                                "Failed to persist embedding"
                            );
                        }
                    }

                    state.candidates[idx].status = ScenarioStatus::Archived;
                    archived += 1;
                }
                Err(e) => {
                    state.add_error(format!("Failed to archive '{title}': {e}"));
                }
            }
        }

        state.metrics.finalize();
        state.set_phase(WorkflowPhase::Complete);

        tracing::info!(
            archived,
            bundle_id = bundle_id.as_str(),
            "Archivist completed"
        );
    }
}
