//! Compose stage (§4.7 step 2): ask each agent in the selected chain to
//! propose the steps it would take, and turn those proposals into
//! `Step`s with a running cost estimate drawn from the Tool Registry's
//! `cost_hint`s.

use crate::error::MetaEngineError;
use orch_core::descriptors::{AgentDescriptor, SideEffectClass};
use orch_core::ids::TenantId;
use orch_core::task_spec::Step;
use orch_llm_gateway::{CompletionRequest, LlmGateway, ToolCallProposal};
use orch_tool_registry::ToolRegistry;
use serde_json::Value;

const COMPOSER_SYSTEM_PROMPT: &str = "You are an orchestrator agent. Given an operator intent and the \
environment it targets, propose the tool calls needed to carry it out, as a JSON array of \
{\"tool\": ..., \"arguments\": {...}} objects.";

/// One step proposed by `agent`, plus the tool's declared cost hint (0.0
/// for a tool the registry doesn't know — the Validation Pipeline's
/// schema-check stage is the authority on unknown tools, not this one).
struct Proposal {
    step: Step,
    cost_hint: f64,
}

/// Compose a full step list (and its cumulative estimated cost) by asking
/// every agent in `chain`, in order, what it would do about `intent`
/// against `environment`. Step indices are assigned sequentially across
/// the whole chain; agents are not told about each other's proposals, so
/// ordering ambiguity between agents is left for a human reviewer to
/// catch via the explanation rather than resolved here.
pub async fn compose(
    gateway: &LlmGateway,
    tools: &ToolRegistry,
    tenant: &TenantId,
    chain: &[AgentDescriptor],
    intent: &str,
    environment: &str,
) -> Result<(Vec<Step>, f64), MetaEngineError> {
    let mut steps = Vec::new();
    let mut estimated_cost = 0.0;
    let mut next_index = 0usize;

    for agent in chain {
        let request = CompletionRequest::new(
            COMPOSER_SYSTEM_PROMPT,
            format!("agent: {}\nintent: {intent}\nenvironment: {environment}", agent.name),
        )
        .with_budget_hint(256);
        let response = gateway.complete(tenant, request).await?;

        for proposal in parse_proposals(&response.text, response.tool_calls.as_deref()) {
            let Proposal { step, cost_hint } = resolve_proposal(tools, &agent.name, proposal, next_index);
            next_index += 1;
            estimated_cost += cost_hint;
            steps.push(step);
        }
    }

    Ok((steps, estimated_cost))
}

fn parse_proposals(text: &str, tool_calls: Option<&[ToolCallProposal]>) -> Vec<ToolCallProposal> {
    if let Some(calls) = tool_calls {
        return calls.to_vec();
    }
    let Ok(Value::Array(values)) = serde_json::from_str::<Value>(text) else {
        return Vec::new();
    };
    values
        .into_iter()
        .filter_map(|v| {
            let tool = v.get("tool")?.as_str()?.to_string();
            let arguments = v.get("arguments").cloned().unwrap_or(Value::Object(Default::default()));
            Some(ToolCallProposal { tool, arguments })
        })
        .collect()
}

fn resolve_proposal(tools: &ToolRegistry, agent: &str, proposal: ToolCallProposal, index: usize) -> Proposal {
    let descriptor = tools.lookup(&proposal.tool);
    let (side_effect_class, cost_hint) = descriptor
        .map(|d| (d.side_effect_class, d.cost_hint))
        .unwrap_or((SideEffectClass::Read, 0.0));

    Proposal {
        step: Step {
            index,
            agent: agent.to_string(),
            tool: proposal.tool,
            arguments: proposal.arguments,
            preconditions: Vec::new(),
            parallel_group: None,
            side_effect_class,
            best_effort: false,
        },
        cost_hint,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use orch_core::descriptors::CapabilityTag;
    use orch_core::ids::TenantId;
    use orch_core::quota::TenantQuota;
    use orch_cost_governor::CostGovernor;
    use orch_llm_gateway::{CompletionResponse, FinishReason, MockProvider, Redactor};
    use orch_test_support::{sample_agent_descriptor, sample_tool_descriptor};
    use orch_tool_registry::{FnHandler, ToolHandler};
    use std::sync::Arc;

    fn gateway(provider: MockProvider) -> LlmGateway {
        let governor = Arc::new(CostGovernor::new(TenantQuota {
            max_concurrent_tasks: 10,
            max_llm_tokens_window: 10_000,
            max_tool_invocations_window: 1_000,
            window_seconds: 3600,
        }));
        LlmGateway::new(Arc::new(provider), governor, Redactor::none())
    }

    fn registry_with_scan_tool() -> ToolRegistry {
        let registry = ToolRegistry::new();
        registry
            .register(
                sample_tool_descriptor("scan_drift", orch_core::descriptors::SideEffectClass::Read),
                Arc::new(FnHandler(|a: serde_json::Value| async move { Ok(a) })) as Arc<dyn ToolHandler>,
            )
            .unwrap();
        registry
    }

    #[tokio::test]
    async fn composes_steps_from_scripted_tool_call_response() {
        let provider = MockProvider::new().with_script(
            "agent: scanner",
            CompletionResponse {
                text: "[]".to_string(),
                tool_calls: Some(vec![ToolCallProposal {
                    tool: "scan_drift".to_string(),
                    arguments: serde_json::json!({"asset_id": "i-1"}),
                }]),
                tokens_in: 10,
                tokens_out: 10,
                finish_reason: FinishReason::ToolCalls,
            },
        );
        let agent = sample_agent_descriptor("scanner", &[CapabilityTag::Drift], &["scan_drift"]);
        let (steps, cost) = compose(
            &gateway(provider),
            &registry_with_scan_tool(),
            &TenantId::new("acme"),
            &[agent],
            "check drift",
            "staging",
        )
        .await
        .unwrap();
        assert_eq!(steps.len(), 1);
        assert_eq!(steps[0].tool, "scan_drift");
        assert_eq!(steps[0].index, 0);
        assert_eq!(cost, 1.0);
    }

    #[tokio::test]
    async fn parses_text_fallback_when_no_tool_calls_are_present() {
        let provider = MockProvider::new().with_script(
            "agent: scanner",
            CompletionResponse {
                text: r#"[{"tool": "scan_drift", "arguments": {"asset_id": "i-1"}}]"#.to_string(),
                tool_calls: None,
                tokens_in: 10,
                tokens_out: 10,
                finish_reason: FinishReason::Stop,
            },
        );
        let agent = sample_agent_descriptor("scanner", &[CapabilityTag::Drift], &["scan_drift"]);
        let (steps, _) = compose(
            &gateway(provider),
            &registry_with_scan_tool(),
            &TenantId::new("acme"),
            &[agent],
            "check drift",
            "staging",
        )
        .await
        .unwrap();
        assert_eq!(steps.len(), 1);
        assert_eq!(steps[0].tool, "scan_drift");
    }

    #[tokio::test]
    async fn unscripted_default_response_yields_no_steps() {
        let agent = sample_agent_descriptor("scanner", &[CapabilityTag::Drift], &["scan_drift"]);
        let (steps, cost) = compose(
            &gateway(MockProvider::new()),
            &registry_with_scan_tool(),
            &TenantId::new("acme"),
            &[agent],
            "check drift",
            "staging",
        )
        .await
        .unwrap();
        assert!(steps.is_empty());
        assert_eq!(cost, 0.0);
    }

    #[tokio::test]
    async fn step_indices_are_sequential_across_multiple_agents() {
        let provider = MockProvider::new()
            .with_script(
                "agent: scanner",
                CompletionResponse {
                    text: "[]".to_string(),
                    tool_calls: Some(vec![ToolCallProposal {
                        tool: "scan_drift".to_string(),
                        arguments: serde_json::json!({}),
                    }]),
                    tokens_in: 1,
                    tokens_out: 1,
                    finish_reason: FinishReason::ToolCalls,
                },
            )
            .with_script(
                "agent: patcher",
                CompletionResponse {
                    text: "[]".to_string(),
                    tool_calls: Some(vec![ToolCallProposal {
                        tool: "scan_drift".to_string(),
                        arguments: serde_json::json!({}),
                    }]),
                    tokens_in: 1,
                    tokens_out: 1,
                    finish_reason: FinishReason::ToolCalls,
                },
            );
        let agents = vec![
            sample_agent_descriptor("scanner", &[CapabilityTag::Drift], &["scan_drift"]),
            sample_agent_descriptor("patcher", &[CapabilityTag::Patch], &["scan_drift"]),
        ];
        let (steps, _) = compose(
            &gateway(provider),
            &registry_with_scan_tool(),
            &TenantId::new("acme"),
            &agents,
            "fix it",
            "staging",
        )
        .await
        .unwrap();
        assert_eq!(steps.len(), 2);
        assert_eq!(steps[0].index, 0);
        assert_eq!(steps[1].index, 1);
    }
}
