//! LLM integration for swarmforge.
//!
//! This module defines the two capability contracts the pipeline consumes —
//! blocking text completion and text embedding — together with an
//! OpenAI-compatible HTTP client, a bounded retry policy, and an ordered
//! provider fallback chain.
//!
//! The pipeline nodes never see a concrete provider: they hold
//! `Arc<dyn CompletionProvider>` / `Arc<dyn EmbeddingProvider>` handles and
//! remain agnostic to authentication and wire formats.
//!
//! ```ignore
//! use swarmforge::llm::{CompletionChain, CompletionRequest, Message, OpenAiClient};
//! use std::sync::Arc;
//!
//! let client = OpenAiClient::from_env()?;
//! let mut chain = CompletionChain::new();
//! chain.push("primary", Arc::new(client));
//!
//! let request = CompletionRequest::new("", vec![Message::user("Hello")])
//!     .with_temperature(0.7);
//! let outcome = chain.complete(request).await?;
//! ```

pub mod chain;
pub mod openai;
pub mod retry;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::LlmError;

pub use chain::{ChainError, ChainOutcome, CompletionChain};
pub use openai::{OpenAiClient, OpenAiEmbeddings};
pub use retry::RetryPolicy;

/// A message in a conversation with an LLM.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Role of the message sender (e.g., "system", "user", "assistant").
    pub role: String,
    /// Content of the message.
    pub content: String,
}

impl Message {
    /// Create a new system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    /// Create a new user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    /// Create a new assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
        }
    }
}

/// Output format constraint for a completion request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseFormat {
    /// Format type (e.g., "json_object", "text").
    #[serde(rename = "type")]
    pub format_type: String,
}

impl ResponseFormat {
    /// Constrain the response to a single JSON object.
    pub fn json_object() -> Self {
        Self {
            format_type: "json_object".to_string(),
        }
    }
}

/// Request for text completion from an LLM.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionRequest {
    /// Model identifier. Empty string selects the provider's default.
    pub model: String,
    /// Conversation messages.
    pub messages: Vec<Message>,
    /// Sampling temperature (0.0 - 2.0). Higher values = more random.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    /// Maximum number of tokens to generate.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    /// Output format constraint (e.g., force a JSON object).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_format: Option<ResponseFormat>,
}

impl CompletionRequest {
    /// Create a new completion request with default parameters.
    pub fn new(model: impl Into<String>, messages: Vec<Message>) -> Self {
        Self {
            model: model.into(),
            messages,
            temperature: None,
            max_tokens: None,
            response_format: None,
        }
    }

    /// Set the sampling temperature.
    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Set the max tokens.
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Constrain the output to a single JSON object.
    pub fn with_json_output(mut self) -> Self {
        self.response_format = Some(ResponseFormat::json_object());
        self
    }
}

/// Response from an LLM completion request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionResponse {
    /// Unique identifier for this response.
    pub id: String,
    /// Model that generated this response.
    pub model: String,
    /// Generated choices/completions.
    pub choices: Vec<Choice>,
    /// Token usage statistics.
    pub usage: Usage,
}

impl CompletionResponse {
    /// Get the content of the first choice, if available.
    pub fn first_content(&self) -> Option<&str> {
        self.choices.first().map(|c| c.message.content.as_str())
    }

    /// Get the trimmed content of the first choice, or a parse error.
    pub fn text(&self) -> Result<String, LlmError> {
        self.first_content()
            .map(|s| s.trim().to_string())
            .ok_or_else(|| LlmError::ParseError("No content in LLM response".to_string()))
    }
}

/// A single generated choice from the LLM.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Choice {
    /// Index of this choice in the response.
    pub index: u32,
    /// Generated message.
    pub message: Message,
    /// Reason the generation stopped (e.g., "stop", "length").
    pub finish_reason: String,
}

/// Token usage statistics for a completion request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Usage {
    /// Number of tokens in the prompt.
    pub prompt_tokens: u32,
    /// Number of tokens generated.
    pub completion_tokens: u32,
    /// Total tokens used.
    pub total_tokens: u32,
}

/// Trait for providers that can complete a conversation.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Generate a completion for the given request.
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError>;

    /// Human-readable provider name for logging.
    fn name(&self) -> &str;
}

/// Trait for providers that can embed text into a fixed-length vector.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Compute an embedding vector for the given text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, LlmError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_constructors() {
        let system = Message::system("You are helpful.");
        assert_eq!(system.role, "system");
        assert_eq!(system.content, "You are helpful.");

        let user = Message::user("Hello");
        assert_eq!(user.role, "user");

        let assistant = Message::assistant("Hi there!");
        assert_eq!(assistant.role, "assistant");
    }

    #[test]
    fn test_completion_request_builder() {
        let request = CompletionRequest::new("gpt-4", vec![Message::user("test")])
            .with_temperature(0.9)
            .with_max_tokens(1024)
            .with_json_output();

        assert_eq!(request.model, "gpt-4");
        assert_eq!(request.temperature, Some(0.9));
        assert_eq!(request.max_tokens, Some(1024));
        assert_eq!(
            request.response_format.as_ref().map(|f| f.format_type.as_str()),
            Some("json_object")
        );
    }

    #[test]
    fn test_request_serialization_skips_none() {
        let request = CompletionRequest::new("m", vec![Message::user("x")]).with_temperature(0.5);
        let json = serde_json::to_string(&request).expect("serialization should succeed");
        assert!(json.contains("\"temperature\":0.5"));
        assert!(!json.contains("max_tokens"));
        assert!(!json.contains("response_format"));
    }

    #[test]
    fn test_response_first_content() {
        let response = CompletionResponse {
            id: "id-1".to_string(),
            model: "m".to_string(),
            choices: vec![Choice {
                index: 0,
                message: Message::assistant("Hello!"),
                finish_reason: "stop".to_string(),
            }],
            usage: Usage::default(),
        };
        assert_eq!(response.first_content(), Some("Hello!"));

        let empty = CompletionResponse {
            id: "id-2".to_string(),
            model: "m".to_string(),
            choices: vec![],
            usage: Usage::default(),
        };
        assert_eq!(empty.first_content(), None);
        assert!(empty.text().is_err());
    }
}
