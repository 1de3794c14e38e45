//! `Policy.Evaluate(tenant, TaskSpec) → {findings, vetoes}` (§6).

use crate::error::PolicyError;
use crate::rule::{PolicyOutcome, RuleSet};
use dashmap::DashMap;
use moka::future::Cache;
use orch_core::ids::TenantId;
use orch_core::task_spec::TaskSpec;
use std::hash::{Hash, Hasher};
use std::time::Duration;

/// Evaluates each tenant's installed [`RuleSet`] against a `TaskSpec`.
///
/// Rule sets are installed once (or updated rarely, e.g. on a config
/// reload) and read on every validation pass, so lookups go through a
/// `DashMap` the way the registries do. Evaluation outcomes for materially
/// identical plans — the common case when a step is retried or the same
/// intent is resubmitted — are memoized for a short TTL to avoid
/// re-walking every rule on every retry.
pub struct PolicyEvaluator {
    rule_sets: DashMap<TenantId, RuleSet>,
    outcome_cache: Cache<u64, PolicyOutcome>,
}

impl PolicyEvaluator {
    #[must_use]
    pub fn new() -> Self {
        Self::with_cache_ttl(Duration::from_secs(30))
    }

    #[must_use]
    pub fn with_cache_ttl(ttl: Duration) -> Self {
        Self {
            rule_sets: DashMap::new(),
            outcome_cache: Cache::builder().max_capacity(10_000).time_to_live(ttl).build(),
        }
    }

    pub fn set_tenant_rules(&self, tenant: TenantId, rules: RuleSet) {
        self.rule_sets.insert(tenant, rules);
        // Stale cached outcomes for this tenant are no longer an issue:
        // they simply expire within the TTL, and a rule change is rare
        // enough that a brief window of using the prior rule set is
        // acceptable (it already governed the in-flight plan).
    }

    /// Evaluate `spec` against the tenant's installed rules, falling back
    /// to an empty rule set (no findings) for tenants with none installed —
    /// a tenant is never blocked by the absence of policy configuration.
    pub async fn evaluate(&self, tenant: &TenantId, spec: &TaskSpec) -> PolicyOutcome {
        let now = chrono::Utc::now();
        let key = cache_key(tenant, spec, now);
        if let Some(cached) = self.outcome_cache.get(&key).await {
            return cached;
        }

        let findings = match self.rule_sets.get(tenant) {
            Some(rules) => rules.evaluate(spec, now),
            None => Vec::new(),
        };
        let outcome: PolicyOutcome = findings.into();
        self.outcome_cache.insert(key, outcome.clone()).await;
        outcome
    }

    /// Variant that reports explicitly when no rule set is installed,
    /// for callers (e.g. an admin surface) that need to distinguish "no
    /// policy configured" from "policy evaluated clean".
    pub fn rules_for(&self, tenant: &TenantId) -> Result<RuleSet, PolicyError> {
        self.rule_sets
            .get(tenant)
            .map(|r| r.clone())
            .ok_or_else(|| PolicyError::NoRuleSet(tenant.clone()))
    }
}

impl Default for PolicyEvaluator {
    fn default() -> Self {
        Self::new()
    }
}

/// A cheap content hash over the parts of `(tenant, spec, now)` that
/// affect the outcome: the tenant, environment, and each step's side-effect
/// class, bucketed by hour since freeze windows are hour-granular.
fn cache_key(tenant: &TenantId, spec: &TaskSpec, now: chrono::DateTime<chrono::Utc>) -> u64 {
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    tenant.hash(&mut hasher);
    spec.environment.hash(&mut hasher);
    for step in &spec.steps {
        (step.side_effect_class as u8 as u64).hash(&mut hasher);
    }
    now.date_naive().hash(&mut hasher);
    now.format("%H").to_string().hash(&mut hasher);
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rule::FreezeWindow;
    use orch_core::descriptors::SideEffectClass;
    use orch_core::ids::{PrincipalId, TaskId};
    use orch_core::task_spec::{BlastRadius, RiskBand, Step, TaskState};
    use std::collections::BTreeMap;

    fn spec(tenant: &str, environment: &str, side_effect: SideEffectClass) -> TaskSpec {
        TaskSpec {
            task_id: TaskId::new(),
            tenant_id: TenantId::new(tenant),
            created_by: PrincipalId::new("operator-1"),
            created_at: chrono::Utc::now(),
            intent: "patch".into(),
            environment: environment.into(),
            context: BTreeMap::new(),
            idempotency_key: None,
            agent_chain: Vec::new(),
            steps: vec![Step {
                index: 0,
                agent: "patcher".into(),
                tool: "apply_patch".into(),
                arguments: serde_json::json!({}),
                preconditions: Vec::new(),
                parallel_group: None,
                side_effect_class: side_effect,
                best_effort: false,
            }],
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

    #[tokio::test]
    async fn tenant_with_no_rules_evaluates_clean() {
        let evaluator = PolicyEvaluator::new();
        let outcome = evaluator
            .evaluate(&TenantId::new("acme"), &spec("acme", "production", SideEffectClass::MutateFleet))
            .await;
        assert!(!outcome.vetoed);
        assert!(outcome.findings.is_empty());
    }

    #[tokio::test]
    async fn installed_freeze_window_vetoes_matching_plan() {
        let evaluator = PolicyEvaluator::new();
        let tenant = TenantId::new("acme");
        evaluator.set_tenant_rules(
            tenant.clone(),
            RuleSet {
                freeze_windows: vec![FreezeWindow {
                    name: "always-on".into(),
                    environment: "production".into(),
                    days: [
                        chrono::Weekday::Mon,
                        chrono::Weekday::Tue,
                        chrono::Weekday::Wed,
                        chrono::Weekday::Thu,
                        chrono::Weekday::Fri,
                        chrono::Weekday::Sat,
                        chrono::Weekday::Sun,
                    ]
                    .into_iter()
                    .collect(),
                    start_hour_utc: 0,
                    end_hour_utc: 24,
                }],
            },
        );
        let outcome = evaluator.evaluate(&tenant, &spec("acme", "production", SideEffectClass::MutateFleet)).await;
        assert!(outcome.vetoed);
    }

    #[tokio::test]
    async fn rules_for_unknown_tenant_is_an_error() {
        let evaluator = PolicyEvaluator::new();
        let err = evaluator.rules_for(&TenantId::new("nobody")).unwrap_err();
        assert!(matches!(err, PolicyError::NoRuleSet(_)));
    }
}
