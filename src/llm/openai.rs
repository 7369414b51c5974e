//! OpenAI-compatible HTTP clients for completion and embedding.
//!
//! Works against any endpoint speaking the `/chat/completions` and
//! `/embeddings` wire format (OpenAI, OpenRouter, LiteLLM proxies, local
//! servers). Both clients carry an explicit request timeout and a bounded
//! retry policy; 401/403 responses are mapped to `LlmError::Auth` so they
//! are never retried.

use std::env;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::error::LlmError;

use super::retry::RetryPolicy;
use super::{
    Choice, CompletionProvider, CompletionRequest, CompletionResponse, EmbeddingProvider, Message,
    ResponseFormat, Usage,
};

/// Request timeout in seconds.
const REQUEST_TIMEOUT_SECS: u64 = 120;

/// Default embedding model.
const DEFAULT_EMBED_MODEL: &str = "text-embedding-3-small";

/// Client for OpenAI-compatible chat completion APIs.
pub struct OpenAiClient {
    /// Base URL for the API (e.g., "https://api.openai.com/v1").
    api_base: String,
    /// Optional API key for authentication.
    api_key: Option<String>,
    /// Default model to use when a request leaves the model empty.
    default_model: String,
    /// HTTP client for making API requests.
    http_client: Client,
    /// Retry policy applied to every request.
    retry: RetryPolicy,
}

impl OpenAiClient {
    /// Create a new client with explicit configuration.
    pub fn new(api_base: String, api_key: Option<String>, default_model: String) -> Self {
        Self {
            api_base,
            api_key,
            default_model,
            http_client: Client::builder()
                .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
                .build()
                .expect("Failed to build HTTP client - system TLS configuration error"),
            retry: RetryPolicy::default(),
        }
    }

    /// Create a new client from environment variables.
    ///
    /// Reads:
    /// - `SWARMFORGE_API_BASE`: Base URL for the API (required)
    /// - `SWARMFORGE_API_KEY`: API key for authentication (optional)
    /// - `SWARMFORGE_MODEL`: Default model (defaults to "gpt-4o-mini")
    ///
    /// # Errors
    ///
    /// Returns `LlmError::MissingApiBase` if `SWARMFORGE_API_BASE` is not set.
    pub fn from_env() -> Result<Self, LlmError> {
        let api_base = env::var("SWARMFORGE_API_BASE").map_err(|_| LlmError::MissingApiBase)?;
        let api_key = env::var("SWARMFORGE_API_KEY").ok();
        let default_model =
            env::var("SWARMFORGE_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string());
        Ok(Self::new(api_base, api_key, default_model))
    }

    /// Replace the retry policy.
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Replace the default model.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.default_model = model.into();
        self
    }

    /// Get the API base URL.
    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    /// Get the default model.
    pub fn default_model(&self) -> &str {
        &self.default_model
    }

    /// Check if an API key is configured.
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// Execute a single chat completion request (no retry logic).
    async fn execute_request(&self, request: &ApiRequest) -> Result<CompletionResponse, LlmError> {
        let url = format!("{}/chat/completions", self.api_base);

        let mut http_request = self
            .http_client
            .post(&url)
            .header("Content-Type", "application/json")
            .header("X-Title", "swarmforge");

        if let Some(ref api_key) = self.api_key {
            http_request = http_request.header("Authorization", format!("Bearer {}", api_key));
        }

        let http_response = http_request
            .json(request)
            .send()
            .await
            .map_err(|e| LlmError::RequestFailed(e.to_string()))?;

        let status = http_response.status();

        if !status.is_success() {
            let status_code = status.as_u16();
            let error_text = http_response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read error response".to_string());

            let message = serde_json::from_str::<ApiErrorResponse>(&error_text)
                .map(|e| e.error.message)
                .unwrap_or(error_text);

            return Err(classify_status(status_code, message));
        }

        let api_response: ApiResponse = http_response
            .json()
            .await
            .map_err(|e| LlmError::ParseError(format!("Failed to parse API response: {}", e)))?;

        let choices = api_response
            .choices
            .into_iter()
            .map(|choice| Choice {
                index: choice.index,
                message: Message {
                    role: choice.message.role,
                    content: choice.message.content,
                },
                finish_reason: choice.finish_reason.unwrap_or_else(|| "stop".to_string()),
            })
            .collect();

        Ok(CompletionResponse {
            id: api_response.id,
            model: api_response.model,
            choices,
            usage: api_response.usage.map(Into::into).unwrap_or_default(),
        })
    }
}

#[async_trait]
impl CompletionProvider for OpenAiClient {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let model = if request.model.is_empty() {
            self.default_model.clone()
        } else {
            request.model.clone()
        };

        let api_request = ApiRequest {
            model,
            messages: request.messages,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            response_format: request.response_format,
        };

        self.retry
            .run("chat_completion", || self.execute_request(&api_request))
            .await
    }

    fn name(&self) -> &str {
        &self.default_model
    }
}

/// Client for OpenAI-compatible embedding APIs.
pub struct OpenAiEmbeddings {
    api_base: String,
    api_key: Option<String>,
    model: String,
    http_client: Client,
    retry: RetryPolicy,
}

impl OpenAiEmbeddings {
    /// Create a new embeddings client with explicit configuration.
    pub fn new(api_base: String, api_key: Option<String>, model: String) -> Self {
        Self {
            api_base,
            api_key,
            model,
            http_client: Client::builder()
                .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
                .build()
                .expect("Failed to build HTTP client - system TLS configuration error"),
            retry: RetryPolicy::default(),
        }
    }

    /// Create a new embeddings client from environment variables.
    ///
    /// Reads `SWARMFORGE_API_BASE` (required), `SWARMFORGE_API_KEY`
    /// (optional) and `SWARMFORGE_EMBED_MODEL` (defaults to
    /// "text-embedding-3-small").
    pub fn from_env() -> Result<Self, LlmError> {
        let api_base = env::var("SWARMFORGE_API_BASE").map_err(|_| LlmError::MissingApiBase)?;
        let api_key = env::var("SWARMFORGE_API_KEY").ok();
        let model =
            env::var("SWARMFORGE_EMBED_MODEL").unwrap_or_else(|_| DEFAULT_EMBED_MODEL.to_string());
        Ok(Self::new(api_base, api_key, model))
    }

    /// Replace the retry policy.
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Get the embedding model.
    pub fn model(&self) -> &str {
        &self.model
    }

    async fn execute_request(&self, text: &str) -> Result<Vec<f32>, LlmError> {
        let url = format!("{}/embeddings", self.api_base);

        let body = EmbeddingApiRequest {
            model: self.model.clone(),
            input: text.to_string(),
        };

        let mut http_request = self
            .http_client
            .post(&url)
            .header("Content-Type", "application/json");

        if let Some(ref api_key) = self.api_key {
            http_request = http_request.header("Authorization", format!("Bearer {}", api_key));
        }

        let http_response = http_request
            .json(&body)
            .send()
            .await
            .map_err(|e| LlmError::RequestFailed(e.to_string()))?;

        let status = http_response.status();

        if !status.is_success() {
            let status_code = status.as_u16();
            let error_text = http_response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read error response".to_string());
            let message = serde_json::from_str::<ApiErrorResponse>(&error_text)
                .map(|e| e.error.message)
                .unwrap_or(error_text);
            return Err(classify_status(status_code, message));
        }

        let api_response: EmbeddingApiResponse = http_response
            .json()
            .await
            .map_err(|e| LlmError::ParseError(format!("Failed to parse API response: {}", e)))?;

        api_response
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| LlmError::ParseError("No embedding in API response".to_string()))
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbeddings {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, LlmError> {
        self.retry
            .run("embedding", || self.execute_request(text))
            .await
    }
}

/// Map an HTTP error status to the right error class.
fn classify_status(code: u16, message: String) -> LlmError {
    match code {
        401 | 403 => LlmError::Auth(message),
        429 => LlmError::RateLimited(message),
        _ => LlmError::ApiError { code, message },
    }
}

/// Internal request structure for the chat completions API.
#[derive(Debug, Serialize)]
struct ApiRequest {
    model: String,
    messages: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

/// Internal response structure from the chat completions API.
#[derive(Debug, Deserialize)]
struct ApiResponse {
    id: String,
    model: String,
    choices: Vec<ApiChoice>,
    usage: Option<ApiUsage>,
}

#[derive(Debug, Deserialize)]
struct ApiChoice {
    index: u32,
    message: ApiMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ApiUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

impl From<ApiUsage> for Usage {
    fn from(u: ApiUsage) -> Self {
        Self {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: u.completion_tokens,
            total_tokens: u.total_tokens,
        }
    }
}

/// Internal request structure for the embeddings API.
#[derive(Debug, Serialize)]
struct EmbeddingApiRequest {
    model: String,
    input: String,
}

/// Internal response structure from the embeddings API.
#[derive(Debug, Deserialize)]
struct EmbeddingApiResponse {
    data: Vec<EmbeddingApiDatum>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingApiDatum {
    embedding: Vec<f32>,
}

/// Error response from the API.
#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_new() {
        let client = OpenAiClient::new(
            "http://localhost:4000".to_string(),
            Some("test-key".to_string()),
            "gpt-4o-mini".to_string(),
        );
        assert_eq!(client.api_base(), "http://localhost:4000");
        assert_eq!(client.default_model(), "gpt-4o-mini");
        assert!(client.has_api_key());
    }

    #[test]
    fn test_client_without_key() {
        let client =
            OpenAiClient::new("http://localhost:4000".to_string(), None, "m".to_string());
        assert!(!client.has_api_key());
    }

    #[test]
    fn test_classify_status() {
        assert!(matches!(
            classify_status(401, "no".to_string()),
            LlmError::Auth(_)
        ));
        assert!(matches!(
            classify_status(403, "no".to_string()),
            LlmError::Auth(_)
        ));
        assert!(matches!(
            classify_status(429, "slow".to_string()),
            LlmError::RateLimited(_)
        ));
        assert!(matches!(
            classify_status(500, "boom".to_string()),
            LlmError::ApiError { code: 500, .. }
        ));
    }

    #[tokio::test]
    async fn test_generate_connection_error() {
        // Port 65535 is unlikely to have a listener; single attempt keeps
        // the test fast.
        let client = OpenAiClient::new(
            "http://localhost:65535".to_string(),
            None,
            "test-model".to_string(),
        )
        .with_retry_policy(RetryPolicy::new(1));

        let request = CompletionRequest::new("test-model", vec![Message::user("test")]);
        let result = client.complete(request).await;

        assert!(result.is_err());
    }

    #[test]
    fn test_api_request_serialization() {
        let request = ApiRequest {
            model: "m".to_string(),
            messages: vec![Message::user("test")],
            temperature: Some(0.7),
            max_tokens: None,
            response_format: Some(ResponseFormat::json_object()),
        };
        let json = serde_json::to_string(&request).expect("serialization should succeed");
        assert!(json.contains("\"temperature\":0.7"));
        assert!(!json.contains("max_tokens"));
        assert!(json.contains("\"response_format\":{\"type\":\"json_object\"}"));
    }
}
