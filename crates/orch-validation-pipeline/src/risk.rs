//! Risk scoring (§4.5 stage 4) and HITL routing (§4.5 stage 5).

use orch_core::config::{ApprovalRoleMap, RiskThresholds};
use orch_core::descriptors::SideEffectClass;
use orch_core::task_spec::{BlastRadius, FindingSeverity, PolicyFinding, RiskBand, Step};

/// Deterministic function of blast-radius counts, environment, the
/// side-effect classes present among the plan's steps, and policy
/// findings. Weights are fixed and documented here rather than
/// configurable, per the spec's "fixed, documented thresholds".
#[must_use]
pub fn score_risk(blast_radius: BlastRadius, environment: &str, steps: &[Step], findings: &[PolicyFinding]) -> f64 {
    let mut score = 0.0;

    // Blast radius: diminishing returns via a saturating log-like curve so
    // a plan touching 1 asset and one touching 10,000 don't both cap out.
    score += scale(blast_radius.assets) * 0.35;
    score += scale(blast_radius.sites) * 0.15;
    score += scale(blast_radius.services) * 0.15;

    if environment.eq_ignore_ascii_case("production") {
        score += 0.2;
    }

    if steps.iter().any(|s| s.side_effect_class == SideEffectClass::MutateFleet) {
        score += 0.25;
    } else if steps.iter().any(|s| s.side_effect_class == SideEffectClass::MutateTenant) {
        score += 0.1;
    }

    for finding in findings {
        score += match finding.severity {
            FindingSeverity::Veto => 0.3,
            FindingSeverity::Warning => 0.05,
            FindingSeverity::Info => 0.0,
        };
    }

    score.min(1.0)
}

/// 0 assets -> 0.0, saturating toward 1.0 as the count grows; chosen so a
/// single-digit count of assets stays well under the medium threshold.
fn scale(count: u64) -> f64 {
    if count == 0 {
        return 0.0;
    }
    (1.0 - 1.0 / (1.0 + count as f64 / 20.0)).min(1.0)
}

/// Map a score to a band. A score exactly on a boundary resolves to the
/// higher band (§8).
#[must_use]
pub fn band_for(score: f64, thresholds: &RiskThresholds) -> RiskBand {
    if score >= thresholds.critical_at {
        RiskBand::Critical
    } else if score >= thresholds.high_at {
        RiskBand::High
    } else if score >= thresholds.medium_at {
        RiskBand::Medium
    } else {
        RiskBand::Low
    }
}

/// HITL routing outcome: whether the plan needs human approval and how many
/// distinct approvals of what role it needs.
#[derive(Debug, Clone, Copy)]
pub struct HitlRouting {
    pub requires_hitl: bool,
    pub approvals_required: u32,
}

/// §4.5 stage 5: bands `high`/`critical` always route to HITL; any
/// `mutate-fleet` step in `production` routes regardless of band; any
/// policy finding marked `requires_approval` routes regardless of band.
#[must_use]
pub fn route_hitl(band: RiskBand, environment: &str, steps: &[Step], findings: &[PolicyFinding], role_map: &ApprovalRoleMap) -> HitlRouting {
    let band_forces_hitl = matches!(band, RiskBand::High | RiskBand::Critical);
    let production_mutate_fleet =
        environment.eq_ignore_ascii_case("production") && steps.iter().any(|s| s.side_effect_class == SideEffectClass::MutateFleet);
    let finding_forces_approval = findings.iter().any(|f| f.requires_approval);

    let requires_hitl = band_forces_hitl || production_mutate_fleet || finding_forces_approval;

    let approvals_required = if requires_hitl {
        role_map
            .get(band_key(band))
            .map(|req| req.count.max(1))
            .unwrap_or_else(|| band.default_approvals_required().max(1))
    } else {
        0
    };

    HitlRouting {
        requires_hitl,
        approvals_required,
    }
}

fn band_key(band: RiskBand) -> &'static str {
    match band {
        RiskBand::Low => "low",
        RiskBand::Medium => "medium",
        RiskBand::High => "high",
        RiskBand::Critical => "critical",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use orch_core::config::ApprovalRequirement;
    use std::collections::BTreeMap;

    fn role_map() -> ApprovalRoleMap {
        let mut map = BTreeMap::new();
        map.insert("low".into(), ApprovalRequirement { count: 0, minimum_role: "operator".into() });
        map.insert("medium".into(), ApprovalRequirement { count: 1, minimum_role: "operator".into() });
        map.insert("high".into(), ApprovalRequirement { count: 1, minimum_role: "sre-lead".into() });
        map.insert("critical".into(), ApprovalRequirement { count: 2, minimum_role: "sre-lead".into() });
        map
    }

    #[test]
    fn zero_blast_radius_non_production_scores_low() {
        let score = score_risk(BlastRadius::default(), "staging", &[], &[]);
        assert!(score < RiskThresholds::default().medium_at);
    }

    #[test]
    fn large_blast_radius_in_production_with_mutate_fleet_scores_high() {
        let blast = BlastRadius { assets: 500, sites: 10, services: 20 };
        let steps = vec![Step {
            index: 0,
            agent: "a".into(),
            tool: "t".into(),
            arguments: serde_json::json!({}),
            preconditions: Vec::new(),
            parallel_group: None,
            side_effect_class: SideEffectClass::MutateFleet,
            best_effort: false,
        }];
        let score = score_risk(blast, "production", &steps, &[]);
        assert!(score >= RiskThresholds::default().high_at);
    }

    #[test]
    fn score_exactly_on_boundary_rounds_up() {
        let thresholds = RiskThresholds { medium_at: 0.5, high_at: 0.8, critical_at: 0.95 };
        assert_eq!(band_for(0.5, &thresholds), RiskBand::Medium);
        assert_eq!(band_for(0.8, &thresholds), RiskBand::High);
    }

    #[test]
    fn high_band_always_routes_to_hitl() {
        let routing = route_hitl(RiskBand::High, "staging", &[], &[], &role_map());
        assert!(routing.requires_hitl);
        assert_eq!(routing.approvals_required, 1);
    }

    #[test]
    fn low_band_production_mutate_fleet_still_routes_to_hitl() {
        let steps = vec![Step {
            index: 0,
            agent: "a".into(),
            tool: "t".into(),
            arguments: serde_json::json!({}),
            preconditions: Vec::new(),
            parallel_group: None,
            side_effect_class: SideEffectClass::MutateFleet,
            best_effort: false,
        }];
        let routing = route_hitl(RiskBand::Low, "production", &steps, &[], &role_map());
        assert!(routing.requires_hitl);
    }

    #[test]
    fn low_band_non_production_no_findings_skips_hitl() {
        let routing = route_hitl(RiskBand::Low, "staging", &[], &[], &role_map());
        assert!(!routing.requires_hitl);
        assert_eq!(routing.approvals_required, 0);
    }

    #[test]
    fn critical_band_requires_two_approvals() {
        let routing = route_hitl(RiskBand::Critical, "production", &[], &[], &role_map());
        assert_eq!(routing.approvals_required, 2);
    }

    proptest::proptest! {
        #[test]
        fn band_for_is_monotonic_in_score(a in 0.0f64..=1.0, b in 0.0f64..=1.0) {
            let thresholds = RiskThresholds::default();
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            proptest::prop_assert!(band_for(lo, &thresholds) <= band_for(hi, &thresholds));
        }

        #[test]
        fn score_exactly_on_any_configured_boundary_rounds_up(medium_at in 0.1f64..0.5, high_at in 0.5f64..0.8, critical_at in 0.8f64..1.0) {
            let thresholds = RiskThresholds { medium_at, high_at, critical_at };
            proptest::prop_assert_eq!(band_for(medium_at, &thresholds), RiskBand::Medium);
            proptest::prop_assert_eq!(band_for(high_at, &thresholds), RiskBand::High);
            proptest::prop_assert_eq!(band_for(critical_at, &thresholds), RiskBand::Critical);
        }

        #[test]
        fn score_risk_never_leaves_unit_interval(assets in 0u64..100_000, sites in 0u64..1_000, services in 0u64..1_000) {
            let blast = BlastRadius { assets, sites, services };
            let score = score_risk(blast, "production", &[], &[]);
            proptest::prop_assert!((0.0..=1.0).contains(&score));
        }
    }
}
