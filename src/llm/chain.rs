//! Ordered provider fallback chain.
//!
//! A `CompletionChain` exposes an ordered list of completion providers as a
//! single `complete` capability: providers are tried in sequence and the
//! first success wins. Each provider already handles transient retry
//! internally, so the chain moves on after any terminal failure — including
//! auth failures, which must not be retried against the same provider.
//!
//! The outcome reports how many strategies failed before one succeeded so
//! the calling node can account for them in its metrics.

use std::sync::Arc;

use thiserror::Error;

use crate::error::LlmError;

use super::{CompletionProvider, CompletionRequest, CompletionResponse};

/// Error type for chain operations.
#[derive(Debug, Error)]
pub enum ChainError {
    /// No providers are configured.
    #[error("No providers configured")]
    Empty,

    /// Every provider in the chain failed.
    #[error("All {failed_attempts} providers failed. Last error: {last}")]
    Exhausted {
        failed_attempts: u32,
        #[source]
        last: LlmError,
    },
}

/// Successful outcome of a chain call.
#[derive(Debug)]
pub struct ChainOutcome {
    /// The winning provider's response.
    pub response: CompletionResponse,
    /// Label of the provider that produced the response.
    pub provider: String,
    /// Number of providers that failed before the winner.
    pub failed_attempts: u32,
}

/// Labeled provider entry.
struct ChainEntry {
    label: String,
    provider: Arc<dyn CompletionProvider>,
}

/// Ordered fallback chain over completion providers.
#[derive(Default)]
pub struct CompletionChain {
    entries: Vec<ChainEntry>,
}

impl CompletionChain {
    /// Create an empty chain.
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Append a provider to the end of the chain.
    pub fn push(&mut self, label: impl Into<String>, provider: Arc<dyn CompletionProvider>) {
        self.entries.push(ChainEntry {
            label: label.into(),
            provider,
        });
    }

    /// Append a provider, builder style.
    pub fn with(mut self, label: impl Into<String>, provider: Arc<dyn CompletionProvider>) -> Self {
        self.push(label, provider);
        self
    }

    /// Returns true if no providers are configured.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of providers in the chain.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Labels of the configured providers, in order.
    pub fn labels(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.label.as_str()).collect()
    }

    /// Try each provider in order until one succeeds.
    pub async fn complete(&self, request: CompletionRequest) -> Result<ChainOutcome, ChainError> {
        if self.entries.is_empty() {
            return Err(ChainError::Empty);
        }

        let mut failed_attempts = 0u32;
        let mut last_error = None;

        for entry in &self.entries {
            match entry.provider.complete(request.clone()).await {
                Ok(response) => {
                    return Ok(ChainOutcome {
                        response,
                        provider: entry.label.clone(),
                        failed_attempts,
                    });
                }
                Err(err) => {
                    tracing::warn!(
                        provider = entry.label.as_str(),
                        error = %err,
                        "Provider failed, trying next in chain"
                    );
                    failed_attempts += 1;
                    last_error = Some(err);
                }
            }
        }

        Err(ChainError::Exhausted {
            failed_attempts,
            last: last_error.unwrap_or_else(|| {
                LlmError::RequestFailed("No providers tried".to_string())
            }),
        })
    }
}
