//! Run configuration for one swarm generation run.

use thiserror::Error;

/// Errors that can occur validating a run configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Category is required")]
    MissingCategory,

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: &'static str, message: String },
}

/// Immutable configuration consumed by one run.
#[derive(Debug, Clone)]
pub struct SwarmConfig {
    /// Scenario category to generate for.
    pub category: String,
    /// Number of approved scenarios to produce.
    pub target_count: usize,
    /// Minimum final score for approval (0-100).
    pub score_threshold: f64,
    /// Maximum number of generation cycles.
    pub max_iterations: u32,
    /// Candidates requested per generation cycle.
    pub batch_size: usize,
    /// Repair budget per rejected candidate.
    pub max_retries_per_scenario: u32,
    /// Cosine-similarity cutoff above which two scenarios are duplicates
    /// (inclusive).
    pub diversity_threshold: f32,
}

impl Default for SwarmConfig {
    fn default() -> Self {
        Self {
            category: String::new(),
            target_count: 5,
            score_threshold: 70.0,
            max_iterations: 5,
            batch_size: 8,
            max_retries_per_scenario: 2,
            diversity_threshold: 0.92,
        }
    }
}

impl SwarmConfig {
    /// Create a configuration for the given category with defaults.
    pub fn new(category: impl Into<String>) -> Self {
        Self {
            category: category.into(),
            ..Self::default()
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.category.trim().is_empty() {
            return Err(ConfigError::MissingCategory);
        }
        if self.target_count < 1 {
            return Err(ConfigError::InvalidValue {
                field: "target_count",
                message: "must be at least 1".to_string(),
            });
        }
        if self.batch_size < 1 {
            return Err(ConfigError::InvalidValue {
                field: "batch_size",
                message: "must be at least 1".to_string(),
            });
        }
        if !(0.0..=100.0).contains(&self.score_threshold) {
            return Err(ConfigError::InvalidValue {
                field: "score_threshold",
                message: format!("{} is outside [0, 100]", self.score_threshold),
            });
        }
        if !(0.0..=1.0).contains(&self.diversity_threshold) {
            return Err(ConfigError::InvalidValue {
                field: "diversity_threshold",
                message: format!("{} is outside [0, 1]", self.diversity_threshold),
            });
        }
        Ok(())
    }
}
