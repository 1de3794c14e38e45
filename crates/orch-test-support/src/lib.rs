//! Shared fixtures and fakes used by the orchestrator workspace's test
//! suites: a builder for minimal valid `TaskSpec`s, sample agent/tool
//! descriptors, and an in-memory `Inventory` fake. Consolidates helpers
//! that were previously duplicated across `orch-task-store` and
//! `orch-validation-pipeline`'s own test modules.

#![warn(missing_docs)]
#![warn(unreachable_pub)]

use async_trait::async_trait;
use dashmap::DashMap;
use orch_core::descriptors::{AgentDescriptor, CapabilityTag, SideEffectClass, ToolDescriptor};
use orch_core::ids::{PrincipalId, TaskId, TenantId};
use orch_core::task_spec::{BlastRadius, RiskBand, Step, TaskSpec, TaskState};
use orch_meta_engine::{Identity, IdentityError, PrincipalInfo};
use orch_validation_pipeline::{AssetCounts, Inventory, InventoryError, InventorySelector};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Mutex;

/// A minimal, internally consistent `TaskSpec` in `Planning` state for
/// tenant `"acme"`, with no steps. Callers adjust fields with ordinary
/// struct-update syntax (`TaskSpec { risk_band: RiskBand::High, ..sample_task_spec() }`).
#[must_use]
pub fn sample_task_spec() -> TaskSpec {
    TaskSpec {
        task_id: TaskId::new(),
        tenant_id: TenantId::new("acme"),
        created_by: PrincipalId::new("operator-1"),
        created_at: chrono::Utc::now(),
        intent: "check drift".to_string(),
        environment: "staging".to_string(),
        context: BTreeMap::new(),
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

/// `sample_task_spec()` with a single `Read`-class step invoking `tool`
/// against asset `"i-1"`, run by agent `"scanner"`, in `environment`.
#[must_use]
pub fn spec_with_step(tool: &str, environment: &str) -> TaskSpec {
    TaskSpec {
        environment: environment.to_string(),
        steps: vec![sample_step(0, "scanner", tool)],
        ..sample_task_spec()
    }
}

/// A single step at `index`, run by `agent` invoking `tool` against asset
/// `"i-1"`, classified `Read`, not part of any parallel group, not
/// best-effort.
#[must_use]
pub fn sample_step(index: usize, agent: &str, tool: &str) -> Step {
    Step {
        index,
        agent: agent.to_string(),
        tool: tool.to_string(),
        arguments: serde_json::json!({"asset_id": "i-1"}),
        preconditions: Vec::new(),
        parallel_group: None,
        side_effect_class: SideEffectClass::Read,
        best_effort: false,
    }
}

/// A tool descriptor named `name`, version 1, in category `"drift"`,
/// idempotent, with no required permissions, classified `side_effect`.
#[must_use]
pub fn sample_tool_descriptor(name: &str, side_effect: SideEffectClass) -> ToolDescriptor {
    ToolDescriptor {
        name: name.to_string(),
        version: 1,
        category: "drift".to_string(),
        required_permissions: BTreeSet::new(),
        input_schema: serde_json::json!({"required": ["asset_id"], "properties": {"asset_id": "string"}}),
        output_schema: serde_json::json!({}),
        idempotent: true,
        side_effect_class: side_effect,
        cost_hint: 1.0,
    }
}

/// An agent descriptor named `name`, version 1, handling `capabilities`,
/// requiring `required_tools`, with permissive input/output schemas.
#[must_use]
pub fn sample_agent_descriptor(
    name: &str,
    capabilities: &[CapabilityTag],
    required_tools: &[&str],
) -> AgentDescriptor {
    AgentDescriptor {
        name: name.to_string(),
        version: 1,
        capabilities: capabilities.iter().copied().collect(),
        required_tools: required_tools.iter().map(|t| (*t).to_string()).collect(),
        input_schema: serde_json::json!({}),
        output_schema: serde_json::json!({}),
    }
}

/// Deterministic `Inventory` fake: returns a fixed `AssetCounts` for
/// every query, regardless of tenant or selector. Used by the
/// validation pipeline's blast-radius stage in tests.
#[derive(Debug, Clone, Copy)]
pub struct FakeInventory {
    pub counts: AssetCounts,
}

impl FakeInventory {
    /// An inventory fake reporting `assets` assets, 1 site, 1 service.
    #[must_use]
    pub fn with_assets(assets: u64) -> Self {
        Self {
            counts: AssetCounts { assets, sites: 1, services: 1 },
        }
    }
}

#[async_trait]
impl Inventory for FakeInventory {
    async fn query(&self, _tenant: &TenantId, _selector: &InventorySelector) -> Result<AssetCounts, InventoryError> {
        Ok(self.counts)
    }
}

/// `Inventory` fake that always fails, for exercising
/// `InventoryUnavailable` handling.
#[derive(Debug, Clone, Copy, Default)]
pub struct FailingInventory;

#[async_trait]
impl Inventory for FailingInventory {
    async fn query(&self, _tenant: &TenantId, _selector: &InventorySelector) -> Result<AssetCounts, InventoryError> {
        Err(InventoryError("inventory backend unreachable".to_string()))
    }
}

/// Records every prompt it is asked to complete, for assertions on what
/// the Meta-Engine or Execution Coordinator actually sent upstream.
/// Pair with `orch_llm_gateway::MockProvider` for the completions
/// themselves; this wraps a caller who only needs to inspect traffic.
#[derive(Debug, Default)]
pub struct PromptLog(Mutex<Vec<String>>);

impl PromptLog {
    /// A fresh, empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `prompt` to the log.
    pub fn record(&self, prompt: impl Into<String>) {
        self.0.lock().expect("prompt log mutex poisoned").push(prompt.into());
    }

    /// All prompts recorded so far, in call order.
    #[must_use]
    pub fn prompts(&self) -> Vec<String> {
        self.0.lock().expect("prompt log mutex poisoned").clone()
    }
}

/// `Identity` fake driven by a roster registered up front, defaulting
/// unregistered principals to `"operator"` rather than erroring — most
/// integration scenarios only care about the one or two principals whose
/// roles actually matter to the assertion.
#[derive(Debug, Default)]
pub struct FakeIdentity {
    roster: DashMap<PrincipalId, Vec<String>>,
}

impl FakeIdentity {
    /// A fresh, empty roster.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Enroll `id` with `roles`, overwriting any prior entry.
    pub fn register(&self, id: PrincipalId, roles: Vec<String>) {
        self.roster.insert(id, roles);
    }
}

#[async_trait]
impl Identity for FakeIdentity {
    async fn principal(&self, id: &PrincipalId) -> Result<PrincipalInfo, IdentityError> {
        let roles = self.roster.get(id).map(|r| r.clone()).unwrap_or_else(|| vec!["operator".to_string()]);
        Ok(PrincipalInfo {
            id: id.clone(),
            tenant_id: TenantId::new("acme"),
            roles,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fake_identity_defaults_unregistered_principals_to_operator() {
        let identity = FakeIdentity::new();
        let info = identity.principal(&PrincipalId::new("anon")).await.unwrap();
        assert_eq!(info.roles, vec!["operator".to_string()]);
    }

    #[tokio::test]
    async fn fake_identity_resolves_registered_roles() {
        let identity = FakeIdentity::new();
        identity.register(PrincipalId::new("sre-1"), vec!["sre-lead".to_string()]);
        let info = identity.principal(&PrincipalId::new("sre-1")).await.unwrap();
        assert_eq!(info.roles, vec!["sre-lead".to_string()]);
    }

    #[test]
    fn sample_task_spec_upholds_critical_hitl_invariant_by_default() {
        let spec = sample_task_spec();
        assert!(spec.upholds_critical_hitl_invariant());
        assert!(spec.upholds_step_result_invariant());
    }

    #[test]
    fn spec_with_step_carries_one_step_for_the_named_tool() {
        let spec = spec_with_step("scan_drift", "production");
        assert_eq!(spec.steps.len(), 1);
        assert_eq!(spec.steps[0].tool, "scan_drift");
        assert_eq!(spec.environment, "production");
    }

    #[tokio::test]
    async fn fake_inventory_reports_fixed_counts() {
        let inventory = FakeInventory::with_assets(42);
        let counts = inventory
            .query(&TenantId::new("acme"), &InventorySelector::default())
            .await
            .unwrap();
        assert_eq!(counts.assets, 42);
    }

    #[tokio::test]
    async fn failing_inventory_always_errors() {
        let inventory = FailingInventory;
        let result = inventory.query(&TenantId::new("acme"), &InventorySelector::default()).await;
        assert!(result.is_err());
    }

    #[test]
    fn prompt_log_records_in_order() {
        let log = PromptLog::new();
        log.record("first");
        log.record("second");
        assert_eq!(log.prompts(), vec!["first".to_string(), "second".to_string()]);
    }
}
