//! LLM client abstraction and request/response types.
//!
//! This module defines the core abstractions for interacting with generation providers.

use grounded_core::{AppError, AppResult, GenerationError, GenerationMode};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Sampling temperature used for creative generation when none is set explicitly.
const CREATIVE_TEMPERATURE: f32 = 0.7;

/// Generation request built from an isolated three-part message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmRequest {
    /// The user question, verbatim
    pub prompt: String,

    /// Model identifier (e.g., "llama3.2")
    pub model: String,

    /// Fixed system instruction
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,

    /// Quarantined evidence block (data, never instructions)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,

    /// Deterministic or creative sampling
    #[serde(default)]
    pub mode: GenerationMode,

    /// Maximum tokens to generate
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    /// Temperature override for sampling (0.0 - 2.0)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

impl LlmRequest {
    /// Create a new LLM request with required fields.
    pub fn new(prompt: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            model: model.into(),
            system: None,
            context: None,
            mode: GenerationMode::Deterministic,
            max_tokens: None,
            temperature: None,
        }
    }

    /// Set the system instruction.
    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    /// Set the quarantined context block.
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    /// Set the generation mode.
    pub fn with_mode(mut self, mode: GenerationMode) -> Self {
        self.mode = mode;
        self
    }

    /// Set the maximum tokens to generate.
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Set the temperature for sampling.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Temperature actually sent to the provider.
    ///
    /// Deterministic mode always pins the temperature to zero.
    pub fn effective_temperature(&self) -> f32 {
        match self.mode {
            GenerationMode::Creative => self.temperature.unwrap_or(CREATIVE_TEMPERATURE),
            GenerationMode::Deterministic | GenerationMode::Offline => 0.0,
        }
    }
}

/// LLM completion response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmResponse {
    /// The generated text
    pub content: String,

    /// Model that generated the response
    pub model: String,

    /// Usage statistics
    pub usage: LlmUsage,

    /// Whether the response was complete
    #[serde(default = "default_true")]
    pub done: bool,
}

fn default_true() -> bool {
    true
}

/// Token usage statistics.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LlmUsage {
    #[serde(default)]
    pub prompt_tokens: u32,

    #[serde(default)]
    pub completion_tokens: u32,

    #[serde(default)]
    pub total_tokens: u32,
}

impl LlmUsage {
    /// Create usage stats from prompt and completion token counts.
    pub fn new(prompt_tokens: u32, completion_tokens: u32) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens + completion_tokens,
        }
    }
}

/// Trait for generation providers.
///
/// Implementations report failures as `AppError::Generation` so callers can
/// tell a timeout from a quota error from a malformed response.
#[async_trait::async_trait]
pub trait LlmClient: Send + Sync {
    /// Get the provider name (e.g., "ollama").
    fn provider_name(&self) -> &str;

    /// Perform a non-streaming completion.
    async fn complete(&self, request: &LlmRequest) -> AppResult<LlmResponse>;
}

/// Run a completion under a caller-supplied timeout.
///
/// Every failure is folded into a typed `GenerationError`; the caller decides
/// how to recover.
pub async fn complete_with_timeout(
    client: &dyn LlmClient,
    request: &LlmRequest,
    timeout: Duration,
) -> Result<LlmResponse, GenerationError> {
    match tokio::time::timeout(timeout, client.complete(request)).await {
        Err(_) => Err(GenerationError::Timeout(timeout)),
        Ok(Ok(response)) if response.content.trim().is_empty() => Err(
            GenerationError::Malformed("provider returned an empty completion".to_string()),
        ),
        Ok(Ok(response)) => Ok(response),
        Ok(Err(AppError::Generation(e))) => Err(e),
        Ok(Err(other)) => Err(GenerationError::Transport(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct SlowClient;

    #[async_trait::async_trait]
    impl LlmClient for SlowClient {
        fn provider_name(&self) -> &str {
            "slow"
        }

        async fn complete(&self, request: &LlmRequest) -> AppResult<LlmResponse> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(LlmResponse {
                content: "late".to_string(),
                model: request.model.clone(),
                usage: LlmUsage::default(),
                done: true,
            })
        }
    }

    struct QuotaClient;

    #[async_trait::async_trait]
    impl LlmClient for QuotaClient {
        fn provider_name(&self) -> &str {
            "quota"
        }

        async fn complete(&self, _request: &LlmRequest) -> AppResult<LlmResponse> {
            Err(GenerationError::Quota("429".to_string()).into())
        }
    }

    #[test]
    fn test_deterministic_mode_pins_temperature() {
        let request = LlmRequest::new("q", "m").with_temperature(0.9);
        assert_eq!(request.effective_temperature(), 0.0);

        let creative = request.with_mode(GenerationMode::Creative);
        assert_eq!(creative.effective_temperature(), 0.9);
    }

    #[test]
    fn test_request_keeps_parts_separate() {
        let request = LlmRequest::new("question", "m")
            .with_system("system")
            .with_context("context");
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["prompt"], "question");
        assert_eq!(json["system"], "system");
        assert_eq!(json["context"], "context");
    }

    #[tokio::test]
    async fn test_timeout_is_typed() {
        let request = LlmRequest::new("q", "m");
        let err = complete_with_timeout(&SlowClient, &request, Duration::from_millis(50))
            .await
            .unwrap_err();
        assert_eq!(err, GenerationError::Timeout(Duration::from_millis(50)));
    }

    #[tokio::test]
    async fn test_provider_error_kind_is_preserved() {
        let request = LlmRequest::new("q", "m");
        let err = complete_with_timeout(&QuotaClient, &request, Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, GenerationError::Quota(_)));
    }
}
