//! The mock provider used when a task runs in `dev_mode` (§4.3). Returns
//! deterministic scripted responses keyed by an intent-class string so
//! tests can assert on a fixed plan shape instead of real model output.

use crate::provider::{CompletionRequest, CompletionResponse, FinishReason, LlmProvider, ProviderError};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;

/// Looks up `request.prompt` by exact match first, then by substring
/// containment against each registered key, returning the first scripted
/// response found. Falls back to `default_response` when nothing matches.
pub struct MockProvider {
    scripts: Mutex<HashMap<String, CompletionResponse>>,
    default_response: CompletionResponse,
}

impl MockProvider {
    #[must_use]
    pub fn new() -> Self {
        Self {
            scripts: Mutex::new(HashMap::new()),
            default_response: CompletionResponse {
                text: "{}".to_string(),
                tool_calls: None,
                tokens_in: 10,
                tokens_out: 10,
                finish_reason: FinishReason::Stop,
            },
        }
    }

    /// Register a scripted response for prompts matching `key` (exact or
    /// substring match against the request prompt).
    #[must_use]
    pub fn with_script(self, key: impl Into<String>, response: CompletionResponse) -> Self {
        self.scripts.lock().insert(key.into(), response);
        self
    }
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LlmProvider for MockProvider {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, ProviderError> {
        let scripts = self.scripts.lock();
        if let Some(response) = scripts.get(&request.prompt) {
            return Ok(response.clone());
        }
        for (key, response) in scripts.iter() {
            if request.prompt.contains(key.as_str()) {
                return Ok(response.clone());
            }
        }
        Ok(self.default_response.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn returns_scripted_response_for_matching_intent_class() {
        let provider = MockProvider::new().with_script(
            "drift",
            CompletionResponse {
                text: "drift plan".to_string(),
                tool_calls: None,
                tokens_in: 5,
                tokens_out: 5,
                finish_reason: FinishReason::Stop,
            },
        );
        let response = provider
            .complete(CompletionRequest::new("sys", "classify: drift on staging"))
            .await
            .unwrap();
        assert_eq!(response.text, "drift plan");
    }

    #[tokio::test]
    async fn falls_back_to_default_when_nothing_matches() {
        let provider = MockProvider::new();
        let response = provider.complete(CompletionRequest::new("sys", "unrelated")).await.unwrap();
        assert_eq!(response.text, "{}");
    }

    #[tokio::test]
    async fn same_prompt_is_deterministic_across_calls() {
        let provider = MockProvider::new().with_script(
            "patch",
            CompletionResponse {
                text: "patch plan".to_string(),
                tool_calls: None,
                tokens_in: 1,
                tokens_out: 1,
                finish_reason: FinishReason::Stop,
            },
        );
        let a = provider.complete(CompletionRequest::new("s", "patch openssl")).await.unwrap();
        let b = provider.complete(CompletionRequest::new("s", "patch openssl")).await.unwrap();
        assert_eq!(a.text, b.text);
    }
}
