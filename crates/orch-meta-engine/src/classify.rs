//! Classify stage (§4.7 step 1): map free-text intent to an ordered list
//! of capability tags via the LLM Gateway, with a deterministic
//! keyword-matching fallback for offline/dev-mode runs and for whenever
//! the model declines to propose anything parseable.

use crate::error::MetaEngineError;
use orch_core::descriptors::CapabilityTag;
use orch_core::ids::TenantId;
use orch_llm_gateway::{CompletionRequest, LlmGateway};

const CLASSIFIER_SYSTEM_PROMPT: &str = "You are the orchestrator's intent classifier. \
Given an operator intent, respond with a JSON array of capability tags from this closed set: \
drift, patch, compliance, incident, cost, dr, cert-rotation, sbom-remediation.";

/// Classify `intent` into the ordered set of capability tags a plan should
/// be composed from. The LLM Gateway is asked first; its response is
/// expected to be a JSON array of tag strings. Tags are deduplicated and
/// reordered into [`CapabilityTag::all`]'s fixed order so ties between
/// agents registered for more than one of the returned tags resolve
/// deterministically (§4.7: "deterministic tie-break on ordered tag
/// list"). If the model's response carries no recognizable tag, falls
/// back to matching each tag's own name as a keyword against the intent
/// text.
pub async fn classify(gateway: &LlmGateway, tenant: &TenantId, intent: &str) -> Result<Vec<CapabilityTag>, MetaEngineError> {
    let request = CompletionRequest::new(CLASSIFIER_SYSTEM_PROMPT, format!("classify: {intent}")).with_budget_hint(64);
    let response = gateway.complete(tenant, request).await?;

    let mut tags = parse_tags(&response.text);
    if tags.is_empty() {
        tags = keyword_fallback(intent);
    }
    if tags.is_empty() {
        return Err(MetaEngineError::InvalidIntent {
            reason: format!("no capability tag recognized in intent: {intent}"),
        });
    }

    let mut ordered: Vec<CapabilityTag> = CapabilityTag::all().iter().copied().filter(|t| tags.contains(t)).collect();
    ordered.dedup();
    Ok(ordered)
}

fn parse_tags(text: &str) -> Vec<CapabilityTag> {
    let Ok(serde_json::Value::Array(values)) = serde_json::from_str::<serde_json::Value>(text) else {
        return Vec::new();
    };
    values
        .into_iter()
        .filter_map(|v| v.as_str().and_then(tag_from_str))
        .collect()
}

fn keyword_fallback(intent: &str) -> Vec<CapabilityTag> {
    let lower = intent.to_ascii_lowercase();
    CapabilityTag::all()
        .iter()
        .copied()
        .filter(|tag| lower.contains(tag.as_str()))
        .collect()
}

fn tag_from_str(s: &str) -> Option<CapabilityTag> {
    CapabilityTag::all().iter().copied().find(|t| t.as_str() == s)
}
