//! Workflow state, configuration, and metrics for a generation run.

pub mod config;
pub mod metrics;
pub mod state;

pub use config::{ConfigError, SwarmConfig};
pub use metrics::SwarmMetrics;
pub use state::{
    RejectedBy, RunSummary, ScenarioCandidate, ScenarioStatus, SwarmState, WorkflowPhase,
};
