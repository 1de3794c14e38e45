//! Wires every component in §2's data-flow diagram into one running
//! assembly: registries seeded with one agent/tool per capability tag,
//! the LLM Gateway behind the mock provider (dev-mode default), the Cost
//! Governor, Task Store, Validation Pipeline, Meta-Engine, and Execution
//! Coordinator, cross-wired via `TaskDispatcher` exactly as §9 requires
//! ("no implicit singletons; all core components receive their
//! collaborators through construction").

use crate::fakes::{InMemoryIdentity, ScaledInventory};
use orch_agent_registry::AgentRegistry;
use orch_core::config::OrchestratorConfig;
use orch_core::descriptors::{AgentDescriptor, CapabilityTag, SideEffectClass, ToolDescriptor};
use orch_cost_governor::CostGovernor;
use orch_core::quota::TenantQuota;
use orch_execution_coordinator::{ExecutionCoordinator, ExecutionCoordinatorConfig, InMemoryJobRunner};
use orch_llm_gateway::{CompletionResponse, FinishReason, LlmGateway, MockProvider, Redactor, ToolCallProposal};
use orch_meta_engine::MetaEngine;
use orch_policy::PolicyEvaluator;
use orch_task_store::{AuditSink, TaskStore, TracingAuditSink};
use orch_tool_registry::{FnHandler, ToolHandler, ToolRegistry};
use orch_validation_pipeline::ValidationPipeline;
use std::collections::BTreeSet;
use std::sync::Arc;

/// One specialist: its capability, the tool it calls, and what that tool
/// does (read vs. mutate) — §4.2's "drift, patch, compliance, incident,
/// cost, dr, cert-rotation, sbom-remediation" roster, each given exactly
/// one representative tool so the assembly can compose an end-to-end plan
/// for every capability tag without a real LLM backing it.
struct SpecialistSpec {
    agent: &'static str,
    tag: CapabilityTag,
    tool: &'static str,
    side_effect: SideEffectClass,
}

const SPECIALISTS: &[SpecialistSpec] = &[
    SpecialistSpec { agent: "drift-agent", tag: CapabilityTag::Drift, tool: "scan_drift", side_effect: SideEffectClass::Read },
    SpecialistSpec { agent: "patch-agent", tag: CapabilityTag::Patch, tool: "apply_patch", side_effect: SideEffectClass::MutateFleet },
    SpecialistSpec {
        agent: "compliance-agent",
        tag: CapabilityTag::Compliance,
        tool: "evaluate_control",
        side_effect: SideEffectClass::Read,
    },
    SpecialistSpec {
        agent: "incident-agent",
        tag: CapabilityTag::Incident,
        tool: "isolate_host",
        side_effect: SideEffectClass::MutateTenant,
    },
    SpecialistSpec { agent: "cost-agent", tag: CapabilityTag::Cost, tool: "rightsize_instance", side_effect: SideEffectClass::MutateTenant },
    SpecialistSpec { agent: "dr-agent", tag: CapabilityTag::Dr, tool: "failover_region", side_effect: SideEffectClass::MutateFleet },
    SpecialistSpec {
        agent: "cert-agent",
        tag: CapabilityTag::CertRotation,
        tool: "rotate_certificate",
        side_effect: SideEffectClass::MutateTenant,
    },
    SpecialistSpec {
        agent: "sbom-agent",
        tag: CapabilityTag::SbomRemediation,
        tool: "patch_dependency",
        side_effect: SideEffectClass::MutateTenant,
    },
];

/// The full assembly a CLI invocation operates against.
pub struct Orchestrator {
    pub engine: MetaEngine,
    pub coordinator: ExecutionCoordinator,
    pub identity: Arc<InMemoryIdentity>,
    pub inventory: Arc<ScaledInventory>,
}

/// Build an assembly from `config`, with `default_quota` governing every
/// tenant that has no dedicated override. Seeds the agent/tool registries
/// with [`SPECIALISTS`] and scripts the mock LLM provider to propose one
/// tool call per agent — enough for `execute_task` to produce a
/// non-empty plan without a real model behind it (§4.3 "mock provider
/// ... enabling reproducible tests").
#[must_use]
pub fn bootstrap(config: &OrchestratorConfig, default_quota: TenantQuota) -> Orchestrator {
    let agents = Arc::new(AgentRegistry::new());
    let tools = Arc::new(ToolRegistry::new());
    let mut provider = MockProvider::new();

    for spec in SPECIALISTS {
        agents
            .register(AgentDescriptor {
                name: spec.agent.to_string(),
                version: 1,
                capabilities: BTreeSet::from([spec.tag]),
                required_tools: BTreeSet::from([spec.tool.to_string()]),
                input_schema: serde_json::json!({}),
                output_schema: serde_json::json!({}),
            })
            .expect("specialist roster has no duplicate agent names");

        tools
            .register(
                ToolDescriptor {
                    name: spec.tool.to_string(),
                    version: 1,
                    category: spec.tag.as_str().to_string(),
                    required_permissions: BTreeSet::new(),
                    input_schema: serde_json::json!({"required": ["asset_id"], "properties": {"asset_id": "string"}}),
                    output_schema: serde_json::json!({}),
                    idempotent: true,
                    side_effect_class: spec.side_effect,
                    cost_hint: 1.0,
                },
                Arc::new(FnHandler(|args: serde_json::Value| async move { Ok(args) })) as Arc<dyn ToolHandler>,
            )
            .expect("specialist roster has no duplicate tool names");

        provider = provider.with_script(
            format!("agent: {}", spec.agent),
            CompletionResponse {
                text: "[]".to_string(),
                tool_calls: Some(vec![ToolCallProposal {
                    tool: spec.tool.to_string(),
                    arguments: serde_json::json!({"asset_id": "i-1"}),
                }]),
                tokens_in: 8,
                tokens_out: 8,
                finish_reason: FinishReason::ToolCalls,
            },
        );
    }

    let governor = Arc::new(CostGovernor::new(default_quota));
    let gateway = Arc::new(LlmGateway::new(Arc::new(provider), Arc::clone(&governor), Redactor::new(&config.redaction_patterns)));

    let audit_sink: Arc<dyn AuditSink> = Arc::new(TracingAuditSink);
    let store = Arc::new(TaskStore::new(Arc::clone(&governor)).with_audit_sink(audit_sink));

    let inventory = Arc::new(ScaledInventory::new());
    let validation = Arc::new(ValidationPipeline::new(
        Arc::clone(&tools),
        Arc::new(PolicyEvaluator::new()),
        Arc::clone(&inventory),
        config.risk_thresholds,
        config.approval_role_map.clone(),
    ));

    let job_runner = Arc::new(InMemoryJobRunner::default());
    let coordinator = ExecutionCoordinator::new(
        Arc::clone(&store),
        Arc::clone(&tools),
        Arc::clone(&governor),
        Arc::clone(&validation),
        job_runner,
        ExecutionCoordinatorConfig {
            long_running_via_job_runner: !config.dev_mode,
            ..ExecutionCoordinatorConfig::default()
        },
    );

    let identity = Arc::new(InMemoryIdentity::new());
    let engine = MetaEngine::new(
        agents,
        tools,
        gateway,
        governor,
        store,
        validation,
        Arc::new(coordinator.clone()),
        config.approval_role_map.clone(),
        identity.clone(),
    );

    Orchestrator { engine, coordinator, identity, inventory }
}
