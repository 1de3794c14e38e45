//! The contract every LLM provider (and the mock) implements (§4.3).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A proposed tool call emitted by the model in lieu of (or alongside) text.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolCallProposal {
    pub tool: String,
    pub arguments: serde_json::Value,
}

/// Why the provider stopped generating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FinishReason {
    Stop,
    MaxTokens,
    ToolCalls,
}

/// A single completion request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionRequest {
    pub prompt: String,
    pub system: String,
    /// Tool names the model is permitted to propose calls against.
    pub tools: Option<Vec<String>>,
    pub max_tokens: u32,
    pub temperature: f32,
    /// A rough token-cost estimate, used for admission against the Cost
    /// Governor before the call is made.
    pub budget_hint: u64,
}

impl CompletionRequest {
    #[must_use]
    pub fn new(system: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            system: system.into(),
            tools: None,
            max_tokens: 1024,
            temperature: 0.0,
            budget_hint: 512,
        }
    }

    #[must_use]
    pub fn with_tools(mut self, tools: Vec<String>) -> Self {
        self.tools = Some(tools);
        self
    }

    #[must_use]
    pub fn with_budget_hint(mut self, hint: u64) -> Self {
        self.budget_hint = hint;
        self
    }
}

/// A completed response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionResponse {
    pub text: String,
    pub tool_calls: Option<Vec<ToolCallProposal>>,
    pub tokens_in: u64,
    pub tokens_out: u64,
    pub finish_reason: FinishReason,
}

/// Errors a provider may raise. [`ProviderError::is_retriable`] decides
/// whether the gateway's retry loop applies.
#[derive(Debug, Error, Clone)]
pub enum ProviderError {
    #[error("provider request timed out")]
    Timeout,
    #[error("provider returned a transient error: {0}")]
    Transient(String),
    #[error("provider rejected the request: {0}")]
    Rejected(String),
}

impl ProviderError {
    #[must_use]
    pub fn is_retriable(&self) -> bool {
        matches!(self, ProviderError::Timeout | ProviderError::Transient(_))
    }
}

/// Provider-agnostic completion interface. Implementations may call out to
/// a real model API or, for `dev_mode`, return deterministic scripted
/// plans (see [`crate::mock::MockProvider`]).
#[async_trait]
pub trait LlmProvider: Send + Sync {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, ProviderError>;
}
