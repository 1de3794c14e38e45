//! The single entry point for all model completions (§4.3): wraps a
//! [`LlmProvider`] with Cost Governor admission, redaction, and bounded
//! retry with exponential backoff and full jitter.

use crate::provider::{CompletionRequest, CompletionResponse, LlmProvider, ProviderError};
use crate::redaction::Redactor;
use orch_core::ids::TenantId;
use orch_cost_governor::CostGovernor;
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{instrument, warn};

const MAX_ATTEMPTS: u32 = 3;
const BASE_BACKOFF: Duration = Duration::from_millis(100);

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("cumulative task tokens would exceed governor budget; retry after {retry_after_secs}s")]
    BudgetExceeded { retry_after_secs: u64 },
    #[error("provider timed out after the configured deadline")]
    ProviderTimeout,
    #[error("provider unavailable after exhausting the retry budget: {0}")]
    Unavailable(String),
}

/// Provider-agnostic completion gateway (§4.3). One instance is shared
/// across the Meta-Engine's classify/compose calls.
pub struct LlmGateway {
    provider: Arc<dyn LlmProvider>,
    governor: Arc<CostGovernor>,
    redactor: Redactor,
}

impl LlmGateway {
    #[must_use]
    pub fn new(provider: Arc<dyn LlmProvider>, governor: Arc<CostGovernor>, redactor: Redactor) -> Self {
        Self {
            provider,
            governor,
            redactor,
        }
    }

    /// Run one completion: admits against the budget, redacts the prompt
    /// and system text, retries retriable provider errors up to
    /// [`MAX_ATTEMPTS`] times with exponential backoff and full jitter, and
    /// unredacts the response text before returning it.
    #[instrument(skip(self, request), fields(tenant = %tenant))]
    pub async fn complete(
        &self,
        tenant: &TenantId,
        mut request: CompletionRequest,
    ) -> Result<CompletionResponse, GatewayError> {
        self.governor
            .admit_llm(tenant, request.budget_hint)
            .map_err(|e| GatewayError::BudgetExceeded {
                retry_after_secs: e.retry_after_secs,
            })?;

        let (redacted_system, system_map) = self.redactor.redact(&request.system);
        let (redacted_prompt, prompt_map) = self.redactor.redact(&request.prompt);
        request.system = redacted_system;
        request.prompt = redacted_prompt;

        let mut last_err = None;
        for attempt in 0..MAX_ATTEMPTS {
            match self.provider.complete(request.clone()).await {
                Ok(mut response) => {
                    response.text = Redactor::unredact(&response.text, &system_map);
                    response.text = Redactor::unredact(&response.text, &prompt_map);
                    self.governor
                        .reconcile_tokens(tenant, request.budget_hint, response.tokens_in + response.tokens_out);
                    return Ok(response);
                }
                Err(err) if err.is_retriable() && attempt + 1 < MAX_ATTEMPTS => {
                    let backoff = full_jitter_backoff(attempt);
                    warn!(attempt, ?backoff, error = %err, "retrying LLM completion");
                    tokio::time::sleep(backoff).await;
                    last_err = Some(err);
                }
                Err(err) => {
                    last_err = Some(err);
                    break;
                }
            }
        }

        self.governor.reconcile_tokens(tenant, request.budget_hint, 0);
        match last_err {
            Some(ProviderError::Timeout) => Err(GatewayError::ProviderTimeout),
            Some(err) => Err(GatewayError::Unavailable(err.to_string())),
            None => Err(GatewayError::Unavailable("no attempts were made".to_string())),
        }
    }
}

fn full_jitter_backoff(attempt: u32) -> Duration {
    let cap = BASE_BACKOFF * 2u32.saturating_pow(attempt);
    let millis = rand::thread_rng().gen_range(0..=cap.as_millis().max(1) as u64);
    Duration::from_millis(millis)
}
