//! The Supervisor: routing and termination logic.
//!
//! `decide` is a pure function over the run state, invoked after each
//! Judge pass. It returns exactly one of three routes; because the Writer
//! increments the iteration counter at entry, the iteration bound here is
//! exact regardless of which branch routed back.

use crate::swarm::{SwarmState, WorkflowPhase};

/// Routing decision after a Judge pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// Loop back to the Writer (repair or fresh batch).
    Writer,
    /// Persist the approved candidates and finish.
    Archivist,
    /// Terminate without archiving.
    End,
}

/// Progress-logging node run before each routing decision.
#[derive(Debug, Default)]
pub struct Supervisor;

impl Supervisor {
    /// Create a Supervisor.
    pub fn new() -> Self {
        Self
    }

    /// Log progress for the current iteration.
    pub fn run(&self, state: &mut SwarmState) {
        state.set_phase(WorkflowPhase::Supervising);

        let repairable = state.repair_eligible().len();
        tracing::info!(
            iteration = state.iteration,
            approved = state.approved_count(),
            target = state.config.target_count,
            rejected = state
                .candidates_with_status(crate::swarm::ScenarioStatus::Rejected)
                .count(),
            repairable,
            "Supervisor progress"
        );
    }
}

/// Decide the next route.
///
/// 1. Enough approved candidates -> Archivist.
/// 2. Iteration budget exhausted -> Archivist if anything was approved
///    (best-effort finish), otherwise End.
/// 3. Any repair-eligible candidate -> Writer (repair mode).
/// 4. Otherwise -> Writer (fresh batch).
pub fn decide(state: &SwarmState) -> Route {
    let approved = state.approved_count();

    if approved >= state.config.target_count {
        tracing::info!(approved, target = state.config.target_count, "Target reached");
        return Route::Archivist;
    }

    if state.iteration >= state.config.max_iterations {
        tracing::warn!(
            iterations = state.iteration,
            approved,
            "Iteration budget exhausted"
        );
        if approved > 0 {
            return Route::Archivist;
        }
        return Route::End;
    }

    if !state.repair_eligible().is_empty() {
        tracing::info!("Routing to writer for repair");
        return Route::Writer;
    }

    if state.needs_more() {
        tracing::info!(
            approved,
            target = state.config.target_count,
            "Routing to writer for a fresh batch"
        );
        return Route::Writer;
    }

    tracing::warn!("Unexpected state, ending run");
    Route::End
}

/// Validate the run configuration at workflow start.
///
/// Returns false when the run cannot proceed; the state is left in phase
/// Error with an explanatory entry.
pub fn init_run(state: &mut SwarmState) -> bool {
    tracing::info!(
        bundle_id = state.bundle_id.as_str(),
        category = state.config.category.as_str(),
        target = state.config.target_count,
        threshold = state.config.score_threshold,
        max_iterations = state.config.max_iterations,
        max_retries = state.config.max_retries_per_scenario,
        "Run initialized"
    );

    if let Err(e) = state.config.validate() {
        state.add_error(e.to_string());
        state.set_phase(WorkflowPhase::Error);
        return false;
    }

    state.set_phase(WorkflowPhase::Init);
    true
}
