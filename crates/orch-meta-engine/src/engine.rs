//! The `MetaEngine` (§4.7): drives a `TaskSpec` through Classify, Compose,
//! Draft, Validate, Store, and Route, handing off to the injected
//! [`TaskDispatcher`] once (and only once) a task lands in `approved`
//! without requiring human sign-off.

use crate::classify::classify;
use crate::compose::compose;
use crate::error::MetaEngineError;
use crate::identity::Identity;
use orch_agent_registry::AgentRegistry;
use orch_core::config::ApprovalRoleMap;
use orch_cost_governor::CostGovernor;
use orch_core::ids::{PrincipalId, TaskId, TenantId};
use orch_core::task_spec::{BlastRadius, FailureCause, RiskBand, TaskSpec, TaskState};
use orch_core::TaskDispatcher;
use orch_llm_gateway::LlmGateway;
use orch_task_store::TaskStore;
use orch_tool_registry::ToolRegistry;
use orch_validation_pipeline::ValidationPipeline;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, instrument};

/// Ties together the registries, gateway, governor, store, and validation
/// pipeline a single orchestrator deployment shares, plus whatever hands
/// approved tasks off for execution. `Clone` is cheap — everything behind
/// an `Arc`.
#[derive(Clone)]
pub struct MetaEngine {
    pub(crate) agents: Arc<AgentRegistry>,
    pub(crate) tools: Arc<ToolRegistry>,
    gateway: Arc<LlmGateway>,
    #[allow(dead_code)]
    governor: Arc<CostGovernor>,
    pub(crate) store: Arc<TaskStore>,
    validation: Arc<ValidationPipeline>,
    pub(crate) dispatcher: Arc<dyn TaskDispatcher>,
    pub(crate) role_map: ApprovalRoleMap,
    pub(crate) identity: Arc<dyn Identity>,
}

impl MetaEngine {
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        agents: Arc<AgentRegistry>,
        tools: Arc<ToolRegistry>,
        gateway: Arc<LlmGateway>,
        governor: Arc<CostGovernor>,
        store: Arc<TaskStore>,
        validation: Arc<ValidationPipeline>,
        dispatcher: Arc<dyn TaskDispatcher>,
        role_map: ApprovalRoleMap,
        identity: Arc<dyn Identity>,
    ) -> Self {
        Self {
            agents,
            tools,
            gateway,
            governor,
            store,
            validation,
            dispatcher,
            role_map,
            identity,
        }
    }

    /// `ExecuteTask` (§6): runs Classify → Compose → Draft → Validate →
    /// Store → Route synchronously, returning once the task reaches
    /// `awaiting_approval` or `approved`. The `executing` → `completed`
    /// portion of the lifecycle runs in the background: on the
    /// no-approval-needed path this method fires the dispatcher without
    /// waiting for it, preserving the synchronous contract even though
    /// execution itself may still be running when it returns.
    #[instrument(skip(self, context), fields(%tenant, %environment))]
    pub async fn execute_task(
        &self,
        tenant: TenantId,
        created_by: PrincipalId,
        intent: String,
        environment: String,
        context: BTreeMap<String, String>,
    ) -> Result<TaskSpec, MetaEngineError> {
        let task_id = self
            .store
            .create(draft_task_spec(&tenant, &created_by, &intent, &environment, context))
            .await?;

        match self.plan_and_route(task_id, &tenant, created_by.clone(), &intent, &environment).await {
            Ok(spec) => Ok(spec),
            Err(err) => {
                // Every path above already terminalizes the task on its own
                // failure (validation veto, step failure, ...); anything that
                // reaches here failed before such a transition happened —
                // classify, compose, or a store write — and would otherwise
                // strand the record in `planning` forever, holding the
                // tenant's concurrency slot open (§3, §7, §8).
                if !matches!(err, MetaEngineError::ValidationFailed { .. }) {
                    let _ = self
                        .store
                        .set_error(
                            task_id,
                            FailureCause {
                                code: "planning_failed".to_string(),
                                message: err.to_string(),
                                step_index: None,
                            },
                        )
                        .await;
                    let _ = self.store.transition(task_id, TaskState::Failed, created_by, "planning failed").await;
                }
                Err(err)
            }
        }
    }

    async fn plan_and_route(
        &self,
        task_id: TaskId,
        tenant: &TenantId,
        created_by: PrincipalId,
        intent: &str,
        environment: &str,
    ) -> Result<TaskSpec, MetaEngineError> {
        let tags = classify(&self.gateway, tenant, intent).await?;
        let chain = self.agents.select_chain(&tags)?;
        let agent_chain: Vec<String> = chain.iter().map(|d| d.name.clone()).collect();
        let (steps, estimated_cost) = compose(&self.gateway, &self.tools, tenant, &chain, intent, environment).await?;

        let explanation = format!(
            "classified `{intent}` into {tags:?}; composed {} step(s) via {agent_chain:?}",
            steps.len()
        );
        self.store
            .set_plan(task_id, agent_chain, steps, explanation, estimated_cost)
            .await?;
        let spec = self
            .store
            .transition(task_id, TaskState::Planned, created_by.clone(), "plan composed")
            .await?;

        let report = self.validation.validate(&spec).await?;
        self.store
            .apply_validation(
                task_id,
                report.risk_score,
                report.risk_band,
                report.blast_radius,
                report.findings.clone(),
                report.requires_hitl,
                report.approvals_required,
            )
            .await?;

        if report.vetoed {
            self.store
                .set_error(
                    task_id,
                    FailureCause {
                        code: "validation_vetoed".to_string(),
                        message: summarize_vetoes(&report.findings),
                        step_index: None,
                    },
                )
                .await?;
            self.store
                .transition(task_id, TaskState::Failed, created_by, "validation vetoed")
                .await?;
            return Err(MetaEngineError::ValidationFailed { findings: report.findings });
        }

        let next_state = if report.requires_hitl {
            TaskState::AwaitingApproval
        } else {
            TaskState::Approved
        };
        let spec = self.store.transition(task_id, next_state, created_by, "validated").await?;

        if spec.state == TaskState::Approved {
            info!(%task_id, "auto-approved plan, dispatching for execution");
            self.dispatcher.dispatch(task_id).await;
        }

        Ok(spec)
    }
}

fn draft_task_spec(
    tenant: &TenantId,
    created_by: &PrincipalId,
    intent: &str,
    environment: &str,
    context: BTreeMap<String, String>,
) -> TaskSpec {
    TaskSpec {
        task_id: TaskId::new(),
        tenant_id: tenant.clone(),
        created_by: created_by.clone(),
        created_at: chrono::Utc::now(),
        intent: intent.to_string(),
        environment: environment.to_string(),
        context,
        idempotency_key: None,
        agent_chain: Vec::new(),
        steps: Vec::new(),
        explanation: String::new(),
        estimated_cost: 0.0,
        risk_score: 0.0,
        risk_band: RiskBand::Low,
        blast_radius: BlastRadius::default(),
        policy_findings: Vec::new(),
        requires_hitl: false,
        approvals_required: 0,
        state: TaskState::Planning,
        approvals: Vec::new(),
        step_results: Vec::new(),
        handoffs: Vec::new(),
        error: None,
        llm_tokens_used: 0,
        tool_invocations: 0,
        wallclock_ms: 0,
    }
}

fn summarize_vetoes(findings: &[orch_core::task_spec::PolicyFinding]) -> String {
    findings
        .iter()
        .filter(|f| f.severity == orch_core::task_spec::FindingSeverity::Veto)
        .map(|f| format!("[{}] {}", f.stage, f.message))
        .collect::<Vec<_>>()
        .join("; ")
}
