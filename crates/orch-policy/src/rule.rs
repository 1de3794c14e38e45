//! Tenant-scoped policy rules.
//!
//! A rule set is a small, explicit list of checks rather than a general
//! parser/interpreter for an external policy language — the spec calls for
//! rules like "no mutate-fleet in production during a freeze window", which
//! are naturally expressed as Rust values rather than compiled from text.

use chrono::{DateTime, Datelike, Timelike, Utc, Weekday};
use orch_core::descriptors::SideEffectClass;
use orch_core::task_spec::{FindingSeverity, PolicyFinding, TaskSpec};
use std::collections::BTreeSet;

/// A recurring maintenance freeze: no step with [`SideEffectClass::MutateFleet`]
/// is allowed to run in `environment` while the window is active.
#[derive(Debug, Clone)]
pub struct FreezeWindow {
    pub name: String,
    pub environment: String,
    pub days: BTreeSet<Weekday>,
    /// `[start_hour_utc, end_hour_utc)`; `end_hour_utc` may be `24` to mean
    /// midnight, and may be less than `start_hour_utc` to wrap past midnight.
    pub start_hour_utc: u32,
    pub end_hour_utc: u32,
}

impl FreezeWindow {
    #[must_use]
    pub fn is_active(&self, at: DateTime<Utc>) -> bool {
        if !self.days.contains(&at.weekday()) {
            return false;
        }
        let hour = at.hour();
        if self.start_hour_utc <= self.end_hour_utc {
            hour >= self.start_hour_utc && hour < self.end_hour_utc
        } else {
            hour >= self.start_hour_utc || hour < self.end_hour_utc
        }
    }
}

/// A tenant's installed rule set. Cheap to clone; evaluated fresh against
/// every `TaskSpec`.
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    pub freeze_windows: Vec<FreezeWindow>,
}

impl RuleSet {
    #[must_use]
    pub fn evaluate(&self, spec: &TaskSpec, now: DateTime<Utc>) -> Vec<PolicyFinding> {
        let mut findings = Vec::new();
        for window in &self.freeze_windows {
            if window.environment != spec.environment || !window.is_active(now) {
                continue;
            }
            for step in &spec.steps {
                if step.side_effect_class == SideEffectClass::MutateFleet {
                    findings.push(PolicyFinding {
                        stage: "policy".to_string(),
                        step_index: Some(step.index),
                        severity: FindingSeverity::Veto,
                        message: format!("mutate-fleet step blocked by freeze window '{}'", window.name),
                        requires_approval: false,
                    });
                }
            }
        }
        findings
    }
}

/// Outcome of evaluating a rule set against a `TaskSpec`: the findings plus
/// whether any of them vetoes the plan outright.
#[derive(Debug, Clone, Default)]
pub struct PolicyOutcome {
    pub findings: Vec<PolicyFinding>,
    pub vetoed: bool,
}

impl From<Vec<PolicyFinding>> for PolicyOutcome {
    fn from(findings: Vec<PolicyFinding>) -> Self {
        let vetoed = findings.iter().any(|f| f.severity == FindingSeverity::Veto);
        Self { findings, vetoed }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use orch_core::descriptors::SideEffectClass;
    use orch_core::ids::{PrincipalId, TaskId, TenantId};
    use orch_core::task_spec::{BlastRadius, RiskBand, Step, TaskState};
    use std::collections::BTreeMap;

    fn spec_with_step(side_effect: SideEffectClass, environment: &str) -> TaskSpec {
        TaskSpec {
            task_id: TaskId::new(),
            tenant_id: TenantId::new("acme"),
            created_by: PrincipalId::new("operator-1"),
            created_at: Utc::now(),
            intent: "patch fleet".into(),
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

    fn sunday_freeze() -> FreezeWindow {
        FreezeWindow {
            name: "weekend-freeze".into(),
            environment: "production".into(),
            days: [Weekday::Sat, Weekday::Sun].into_iter().collect(),
            start_hour_utc: 0,
            end_hour_utc: 24,
        }
    }

    #[test]
    fn mutate_fleet_in_active_freeze_window_is_vetoed() {
        let rules = RuleSet {
            freeze_windows: vec![sunday_freeze()],
        };
        let spec = spec_with_step(SideEffectClass::MutateFleet, "production");
        let sunday = DateTime::parse_from_rfc3339("2026-08-02T10:00:00Z").unwrap().with_timezone(&Utc);
        let findings = rules.evaluate(&spec, sunday);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].severity, FindingSeverity::Veto);
    }

    #[test]
    fn read_only_step_is_never_blocked_by_freeze_window() {
        let rules = RuleSet {
            freeze_windows: vec![sunday_freeze()],
        };
        let spec = spec_with_step(SideEffectClass::Read, "production");
        let sunday = DateTime::parse_from_rfc3339("2026-08-02T10:00:00Z").unwrap().with_timezone(&Utc);
        assert!(rules.evaluate(&spec, sunday).is_empty());
    }

    #[test]
    fn mutate_fleet_outside_freeze_window_is_clean() {
        let rules = RuleSet {
            freeze_windows: vec![sunday_freeze()],
        };
        let spec = spec_with_step(SideEffectClass::MutateFleet, "production");
        let tuesday = DateTime::parse_from_rfc3339("2026-08-04T10:00:00Z").unwrap().with_timezone(&Utc);
        assert!(rules.evaluate(&spec, tuesday).is_empty());
    }

    #[test]
    fn freeze_window_in_a_different_environment_does_not_apply() {
        let rules = RuleSet {
            freeze_windows: vec![sunday_freeze()],
        };
        let spec = spec_with_step(SideEffectClass::MutateFleet, "staging");
        let sunday = DateTime::parse_from_rfc3339("2026-08-02T10:00:00Z").unwrap().with_timezone(&Utc);
        assert!(rules.evaluate(&spec, sunday).is_empty());
    }

    #[test]
    fn outcome_is_vetoed_when_any_finding_is_veto_severity() {
        let findings = vec![PolicyFinding {
            stage: "policy".into(),
            step_index: None,
            severity: FindingSeverity::Veto,
            message: "blocked".into(),
            requires_approval: false,
        }];
        let outcome: PolicyOutcome = findings.into();
        assert!(outcome.vetoed);
    }
}
