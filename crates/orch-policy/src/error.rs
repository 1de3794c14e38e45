//! Error types surfaced by policy evaluation.

use orch_core::ids::TenantId;

/// Policy evaluation itself rarely fails; almost everything it has to say
/// is expressed as a [`crate::rule::PolicyOutcome`] (findings and vetoes),
/// not an error. The one exception is a tenant with no rule set and no
/// fallback configured.
#[derive(Debug, thiserror::Error)]
pub enum PolicyError {
    #[error("no policy rule set installed for tenant {0}")]
    NoRuleSet(TenantId),
}
