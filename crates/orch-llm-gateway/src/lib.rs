//! LLM Gateway (§4.3): the single entry point for all model completions,
//! providing retry, budget admission, and redaction ahead of a
//! provider-agnostic [`LlmProvider`].

#![warn(unreachable_pub)]

mod gateway;
mod mock;
mod provider;
mod redaction;

pub use gateway::{GatewayError, LlmGateway};
pub use mock::MockProvider;
pub use provider::{CompletionRequest, CompletionResponse, FinishReason, LlmProvider, ProviderError, ToolCallProposal};
pub use redaction::Redactor;
