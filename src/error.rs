//! Error types for swarmforge operations.
//!
//! Defines error types for the two external collaborator surfaces:
//! - LLM completion and embedding providers
//! - The scenario repository (persistence)
//!
//! The taxonomy matters for retry behavior: authentication and
//! configuration failures are fatal and must never be retried, while
//! network-level and server-side failures are transient and eligible
//! for bounded retry with backoff.

use thiserror::Error;

/// Errors that can occur during LLM provider operations.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("Missing API key: provider requires an API key but none was configured")]
    MissingApiKey,

    #[error("Missing API base URL: provider endpoint not configured")]
    MissingApiBase,

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("HTTP request failed: {0}")]
    RequestFailed(String),

    #[error("Failed to parse LLM response: {0}")]
    ParseError(String),

    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("API error ({code}): {message}")]
    ApiError { code: u16, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl LlmError {
    /// Whether this error is transient and eligible for retry.
    ///
    /// Auth/configuration errors and client-side (4xx) API errors are
    /// permanent; retrying them only burns the attempt budget.
    pub fn is_transient(&self) -> bool {
        match self {
            LlmError::RequestFailed(msg) => {
                msg.contains("timeout")
                    || msg.contains("timed out")
                    || msg.contains("connection")
                    || msg.contains("Connection refused")
                    || msg.contains("temporarily")
            }
            LlmError::RateLimited(_) => true,
            LlmError::ApiError { code, .. } => *code >= 500 || *code == 429,
            _ => false,
        }
    }

    /// Whether this error is an authentication/configuration failure.
    pub fn is_auth(&self) -> bool {
        matches!(
            self,
            LlmError::Auth(_) | LlmError::MissingApiKey | LlmError::MissingApiBase
        )
    }
}

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("Scenario titled '{0}' already exists")]
    DuplicateTitle(String),

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Query failed: {0}")]
    QueryFailed(#[from] sqlx::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid record: {0}")]
    InvalidRecord(String),
}
