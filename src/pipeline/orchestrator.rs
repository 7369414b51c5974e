//! Sequential graph walk over the pipeline nodes.
//!
//! The orchestrator wires the nodes into the fixed workflow
//! `init -> scout -> curator -> writer -> clerk -> deduplicator -> judge ->
//! supervisor`, with one conditional branch after the supervisor: back to
//! the writer (repair drafts skip scout/curator; fresh batches re-run
//! them), forward to the archivist, or termination.
//!
//! A run always terminates with a `SwarmState` — node failures surface as
//! metrics and error entries, never as panics or propagated errors — and
//! the iteration budget bounds the number of cycles launched.

use std::sync::Arc;

use crate::llm::{CompletionChain, CompletionProvider, EmbeddingProvider};
use crate::nodes::{
    decide, init_run, Archivist, Clerk, Curator, Deduplicator, Judge, Route, Scout, Supervisor,
    Writer,
};
use crate::storage::ScenarioRepository;
use crate::swarm::{SwarmConfig, SwarmState, WorkflowPhase};

/// External collaborators consumed by the pipeline.
///
/// Providers are optional: every node degrades per its own policy when its
/// provider is missing. Only the repository is mandatory.
pub struct Collaborators {
    /// Fast, cheap provider: Scout ideation, Curator ranking, Clerk
    /// formatting.
    pub fast: Option<Arc<dyn CompletionProvider>>,
    /// Higher-quality provider: Scout refinement and direct fallback.
    pub quality: Option<Arc<dyn CompletionProvider>>,
    /// Provider used by the Judge's qualitative pass.
    pub judge: Option<Arc<dyn CompletionProvider>>,
    /// Ordered fallback chain for the Writer.
    pub writer_chain: CompletionChain,
    /// Embedding provider for deduplication.
    pub embeddings: Option<Arc<dyn EmbeddingProvider>>,
    /// Scenario repository.
    pub repository: Arc<dyn ScenarioRepository>,
}

/// The wired pipeline.
pub struct Orchestrator {
    scout: Scout,
    curator: Curator,
    writer: Writer,
    clerk: Clerk,
    deduplicator: Deduplicator,
    judge: Judge,
    supervisor: Supervisor,
    archivist: Archivist,
}

impl Orchestrator {
    /// Wire the pipeline nodes over the given collaborators.
    pub fn new(collaborators: Collaborators) -> Self {
        let Collaborators {
            fast,
            quality,
            judge,
            writer_chain,
            embeddings,
            repository,
        } = collaborators;

        Self {
            scout: Scout::new(fast.clone(), quality.clone()),
            curator: Curator::new(fast.clone()),
            writer: Writer::new(writer_chain, repository.clone()),
            clerk: Clerk::new(fast),
            deduplicator: Deduplicator::new(embeddings, repository.clone()),
            judge: Judge::new(judge),
            supervisor: Supervisor::new(),
            archivist: Archivist::new(repository),
        }
    }

    /// Run one generation workflow to completion.
    pub async fn run(&self, config: SwarmConfig) -> SwarmState {
        let mut state = SwarmState::new(config);

        if !init_run(&mut state) {
            state.metrics.finalize();
            return state;
        }

        // The first cycle always scouts; later fresh-batch cycles re-run
        // Scout and Curator while repair cycles jump straight to the Writer.
        let mut fresh_batch = true;

        loop {
            if fresh_batch {
                self.scout.run(&mut state).await;
                self.curator.run(&mut state).await;
            }

            self.writer.run(&mut state).await;
            self.clerk.run(&mut state).await;
            self.deduplicator.run(&mut state).await;
            self.judge.run(&mut state).await;
            self.supervisor.run(&mut state);

            match decide(&state) {
                Route::Archivist => {
                    self.archivist.run(&mut state).await;
                    break;
                }
                Route::End => {
                    if state.approved_count() == 0 {
                        state.add_error(format!(
                            "No scenarios approved after {} iterations",
                            state.iteration
                        ));
                        state.set_phase(WorkflowPhase::Error);
                    }
                    state.metrics.finalize();
                    break;
                }
                Route::Writer => {
                    fresh_batch = state.repair_eligible().is_empty();
                }
            }
        }

        state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nodes::support::{MockRepository, ScriptedEmbeddings, ScriptedProvider};
    use serde_json::json;

    fn compliant(title: &str) -> serde_json::Value {
        json!({
            "title": title,
            "category": "suspicious object",
            "threat_level": "high",
            "background": format!("{title} background narrative"),
            "steps": ["perimeter", "report", "hold flow", "hand over"]
        })
    }

    fn verdict(score: f64) -> String {
        json!({"score": score, "critique": "assessment text"}).to_string()
    }

    fn config(target: usize, max_iterations: u32) -> SwarmConfig {
        SwarmConfig {
            target_count: target,
            max_iterations,
            batch_size: 2,
            ..SwarmConfig::new("suspicious object")
        }
    }

    #[tokio::test]
    async fn test_happy_path_single_iteration() {
        // Scout -> Curator -> Clerk all ride the fast provider, in order.
        let fast = Arc::new(ScriptedProvider::new(vec![
            Ok("- A bag left under a bench on the platform\n- A drone above the entrance gates"
                .to_string()),
            Ok(json!({
                "selected_seeds": [
                    "A bag left under a bench on the platform",
                    "A drone above the entrance gates"
                ]
            })
            .to_string()),
            Ok(json!({"scenarios": [compliant("Bag scenario"), compliant("Drone scenario")]})
                .to_string()),
        ]));
        let writer = Arc::new(ScriptedProvider::always("two scenario write-ups"));
        let judge = Arc::new(ScriptedProvider::always(&verdict(90.0)));
        let repo = Arc::new(MockRepository::new());

        let orchestrator = Orchestrator::new(Collaborators {
            fast: Some(fast),
            quality: None,
            judge: Some(judge),
            writer_chain: CompletionChain::new().with("writer", writer),
            embeddings: Some(Arc::new(ScriptedEmbeddings::with_rules(
                vec![
                    ("Bag".to_string(), vec![1.0, 0.0]),
                    ("Drone".to_string(), vec![0.0, 1.0]),
                ],
                None,
            ))),
            repository: repo.clone(),
        });

        let state = orchestrator.run(config(2, 5)).await;

        assert_eq!(state.current_phase, WorkflowPhase::Complete);
        assert_eq!(state.iteration, 1);
        assert_eq!(state.bundle().len(), 2);
        assert_eq!(repo.insert_count(), 2);
        assert!(state.errors.is_empty());
        assert!(state.metrics.finished_at.is_some());
    }

    #[tokio::test]
    async fn test_duplicate_never_reaches_judge() {
        let fast = Arc::new(ScriptedProvider::new(vec![
            Ok("- A bag left under a bench on the platform".to_string()),
            Ok(json!({"selected_seeds": ["A bag left under a bench on the platform"]}).to_string()),
            Ok(json!({"scenarios": [compliant("Near duplicate")]}).to_string()),
        ]));
        let writer = Arc::new(ScriptedProvider::always("draft"));
        let judge = Arc::new(ScriptedProvider::always(&verdict(90.0)));
        // The corpus already holds a nearly identical embedding.
        let repo = Arc::new(MockRepository::with_embeddings(vec![(
            "Existing scenario".to_string(),
            vec![1.0, 0.05],
        )]));

        let orchestrator = Orchestrator::new(Collaborators {
            fast: Some(fast),
            quality: None,
            judge: Some(judge.clone()),
            writer_chain: CompletionChain::new().with("writer", writer),
            embeddings: Some(Arc::new(ScriptedEmbeddings::constant(vec![1.0, 0.0]))),
            repository: repo.clone(),
        });

        let state = orchestrator.run(config(1, 1)).await;

        assert_eq!(judge.call_count(), 0, "duplicates skip the judge");
        assert_eq!(state.metrics.duplicates_skipped, 1);
        assert_eq!(repo.insert_count(), 0);
        assert_eq!(state.current_phase, WorkflowPhase::Error);
        let duplicate = state
            .candidates
            .iter()
            .find(|c| c.title() == "Near duplicate")
            .expect("candidate exists");
        assert!(duplicate.critique.contains("similar"));
    }

    #[tokio::test]
    async fn test_repair_cycle_replays_critique_then_approves() {
        // No fast provider: the Writer's drafts are already JSON and the
        // Clerk direct-parses them.
        let writer = Arc::new(ScriptedProvider::new(vec![
            Ok(json!({"scenarios": [compliant("First attempt")]}).to_string()),
            Ok(json!({"scenarios": [compliant("Reworked attempt")]}).to_string()),
        ]));
        let judge = Arc::new(ScriptedProvider::new(vec![
            Ok(verdict(40.0)),
            Ok(verdict(95.0)),
        ]));
        let repo = Arc::new(MockRepository::new());

        let orchestrator = Orchestrator::new(Collaborators {
            fast: None,
            quality: None,
            judge: Some(judge),
            writer_chain: CompletionChain::new().with("writer", writer.clone()),
            embeddings: None,
            repository: repo.clone(),
        });

        let state = orchestrator.run(config(1, 5)).await;

        assert_eq!(state.current_phase, WorkflowPhase::Complete);
        assert_eq!(state.iteration, 2);
        assert_eq!(state.metrics.total_repaired, 1);
        assert_eq!(repo.inserted_titles(), vec!["Reworked attempt"]);

        // The second draft request carried the first round's critique.
        let prompts = writer.prompts.lock().expect("lock poisoned");
        assert!(prompts[1].contains("Corrections required"));
        assert!(prompts[1].contains("assessment text"));
    }

    #[tokio::test]
    async fn test_exhausted_run_ends_in_error() {
        let writer = Arc::new(ScriptedProvider::always(
            &json!({"scenarios": [compliant("Never good enough")]}).to_string(),
        ));
        let judge = Arc::new(ScriptedProvider::always(&verdict(5.0)));
        let repo = Arc::new(MockRepository::new());

        let orchestrator = Orchestrator::new(Collaborators {
            fast: None,
            quality: None,
            judge: Some(judge),
            writer_chain: CompletionChain::new().with("writer", writer),
            embeddings: None,
            repository: repo.clone(),
        });

        let state = orchestrator.run(config(1, 3)).await;

        assert_eq!(state.current_phase, WorkflowPhase::Error);
        assert!(!state.errors.is_empty());
        assert_eq!(repo.insert_count(), 0, "the archivist is never invoked");
        assert_eq!(state.iteration, 3, "the iteration budget is exact");
        assert!(state.metrics.finished_at.is_some());
    }

    #[tokio::test]
    async fn test_invalid_config_short_circuits() {
        let repo = Arc::new(MockRepository::new());
        let orchestrator = Orchestrator::new(Collaborators {
            fast: None,
            quality: None,
            judge: None,
            writer_chain: CompletionChain::new(),
            embeddings: None,
            repository: repo.clone(),
        });

        let state = orchestrator.run(SwarmConfig::new("")).await;

        assert_eq!(state.current_phase, WorkflowPhase::Error);
        assert!(!state.errors.is_empty());
        assert_eq!(state.iteration, 0);
        assert_eq!(repo.insert_count(), 0);
    }
}
