//! Runs the fixed, ordered validation stages (§4.5) against a draft
//! `TaskSpec` and reports the accumulated findings, blast radius, risk
//! score/band, and HITL routing decision.

use crate::error::ValidationError;
use crate::inventory::{Inventory, InventorySelector};
use crate::risk;
use orch_core::config::{ApprovalRoleMap, RiskThresholds};
use orch_core::ids::TenantId;
use orch_core::task_spec::{BlastRadius, FindingSeverity, PolicyFinding, RiskBand, TaskSpec};
use orch_policy::PolicyEvaluator;
use orch_tool_registry::ToolRegistry;
use std::sync::Arc;
use tracing::instrument;

/// The validation pipeline's verdict on a draft plan.
#[derive(Debug, Clone)]
pub struct ValidationReport {
    pub findings: Vec<PolicyFinding>,
    pub vetoed: bool,
    pub blast_radius: BlastRadius,
    pub risk_score: f64,
    pub risk_band: RiskBand,
    pub requires_hitl: bool,
    pub approvals_required: u32,
}

impl ValidationReport {
    #[must_use]
    pub fn severest_finding_for_step(&self, step_index: usize) -> Option<&PolicyFinding> {
        self.findings
            .iter()
            .filter(|f| f.step_index == Some(step_index))
            .max_by_key(|f| severity_rank(f.severity))
    }
}

fn severity_rank(severity: FindingSeverity) -> u8 {
    match severity {
        FindingSeverity::Info => 0,
        FindingSeverity::Warning => 1,
        FindingSeverity::Veto => 2,
    }
}

/// Ties together the registries and capability interfaces the pipeline's
/// stages consume. Cheap to clone (everything behind an `Arc`).
#[derive(Clone)]
pub struct ValidationPipeline {
    tools: Arc<ToolRegistry>,
    policy: Arc<PolicyEvaluator>,
    inventory: Arc<dyn Inventory>,
    risk_thresholds: RiskThresholds,
    approval_role_map: ApprovalRoleMap,
}

impl ValidationPipeline {
    #[must_use]
    pub fn new(
        tools: Arc<ToolRegistry>,
        policy: Arc<PolicyEvaluator>,
        inventory: Arc<dyn Inventory>,
        risk_thresholds: RiskThresholds,
        approval_role_map: ApprovalRoleMap,
    ) -> Self {
        Self {
            tools,
            policy,
            inventory,
            risk_thresholds,
            approval_role_map,
        }
    }

    /// Run stages 1-5 against `spec`. Stage 6 (post-execution verification)
    /// is driven separately by the Execution Coordinator once steps have
    /// run.
    #[instrument(skip(self, spec), fields(task_id = %spec.task_id))]
    pub async fn validate(&self, spec: &TaskSpec) -> Result<ValidationReport, ValidationError> {
        let mut findings = Vec::new();

        // Stage 1: schema check.
        for step in &spec.steps {
            let Some(descriptor) = self.tools.lookup(&step.tool) else {
                return Err(ValidationError::UnknownTool {
                    step_index: step.index,
                    tool: step.tool.clone(),
                });
            };
            if let Err(source) = orch_tool_registry::schema::validate(&step.arguments, &descriptor.input_schema) {
                findings.push(PolicyFinding {
                    stage: "schema".to_string(),
                    step_index: Some(step.index),
                    severity: FindingSeverity::Veto,
                    message: source.to_string(),
                    requires_approval: false,
                });
            }
        }
        if findings.iter().any(|f| f.severity == FindingSeverity::Veto) {
            return Ok(self.vetoed_report(findings));
        }

        // Stage 2: policy check.
        let policy_outcome = self.policy.evaluate(&spec.tenant_id, spec).await;
        findings.extend(policy_outcome.findings);
        if policy_outcome.vetoed {
            return Ok(self.vetoed_report(findings));
        }

        // Stage 3: blast radius.
        let selector = InventorySelector::from_steps(&spec.steps);
        let blast_radius = if selector.is_empty() {
            BlastRadius::default()
        } else {
            let counts = self
                .inventory
                .query(&spec.tenant_id, &selector)
                .await
                .map_err(|_| ValidationError::InventoryUnavailable(spec.tenant_id.clone()))?;
            BlastRadius {
                assets: counts.assets,
                sites: counts.sites,
                services: counts.services,
            }
        };

        // Stage 4: risk scoring.
        let risk_score = risk::score_risk(blast_radius, &spec.environment, &spec.steps, &findings);
        let risk_band = risk::band_for(risk_score, &self.risk_thresholds);

        // Stage 5: HITL routing.
        let routing = risk::route_hitl(risk_band, &spec.environment, &spec.steps, &findings, &self.approval_role_map);

        Ok(ValidationReport {
            findings,
            vetoed: false,
            blast_radius,
            risk_score,
            risk_band,
            requires_hitl: routing.requires_hitl,
            approvals_required: routing.approvals_required,
        })
    }

    fn vetoed_report(&self, findings: Vec<PolicyFinding>) -> ValidationReport {
        ValidationReport {
            findings,
            vetoed: true,
            blast_radius: BlastRadius::default(),
            risk_score: 0.0,
            risk_band: RiskBand::Low,
            requires_hitl: false,
            approvals_required: 0,
        }
    }

    /// Stage 6: re-run a subset of read-only tools to confirm the intended
    /// post-state, invoked by the Execution Coordinator once a task's steps
    /// have completed and it has moved to `verifying`.
    pub async fn verify_postconditions(
        &self,
        tenant: &TenantId,
        checks: &[(String, serde_json::Value)],
        ctx: &orch_tool_registry::InvocationContext,
    ) -> Result<(), ValidationError> {
        for (tool, args) in checks {
            self.tools
                .invoke(tool, args.clone(), ctx)
                .await
                .map_err(|_| ValidationError::InventoryUnavailable(tenant.clone()))?;
        }
        Ok(())
    }
}
