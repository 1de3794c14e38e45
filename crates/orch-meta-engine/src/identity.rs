//! `Identity.Principal` (§6): resolves an authenticated caller's roles for
//! approval, rejection, and cancellation authorization. Transport (the
//! identity provider integration itself) is out of scope (§1) — this is
//! the capability interface the core calls against whatever resolves it.

use async_trait::async_trait;
use orch_core::ids::{PrincipalId, TenantId};
use thiserror::Error;

/// Closed ordering over the role names `approval_role_map`'s
/// `minimum_role` field references by default. §9 notes these names are
/// placeholders and the role map is the authority on *counts*; this
/// ordering only lets two recognized names be compared for a
/// minimum-role check. An unrecognized name never satisfies any check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Role {
    Operator,
    SreLead,
    Admin,
}

impl Role {
    #[must_use]
    pub fn parse(role: &str) -> Option<Role> {
        match role {
            "operator" => Some(Role::Operator),
            "sre-lead" => Some(Role::SreLead),
            "admin" => Some(Role::Admin),
            _ => None,
        }
    }
}

/// Roles and tenant membership resolved for an authenticated principal.
#[derive(Debug, Clone)]
pub struct PrincipalInfo {
    pub id: PrincipalId,
    pub tenant_id: TenantId,
    pub roles: Vec<String>,
}

impl PrincipalInfo {
    /// True if any held role meets or exceeds `minimum_role`. An
    /// unrecognized `minimum_role` name (not in [`Role::parse`]) never
    /// matches, since there's no ordering to compare against.
    #[must_use]
    pub fn meets_minimum_role(&self, minimum_role: &str) -> bool {
        let Some(floor) = Role::parse(minimum_role) else {
            return false;
        };
        self.roles.iter().filter_map(|r| Role::parse(r)).any(|r| r >= floor)
    }
}

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("no principal resolves for this identity")]
    Unresolvable,
}

/// Consumed interface (§6): resolves a principal's tenant and roles.
/// `ApproveTask`/`RejectTask`/`CancelTask` pass the already-identified
/// `PrincipalId` the transport layer authenticated; this interface is how
/// the core learns what that principal is allowed to approve.
#[async_trait]
pub trait Identity: Send + Sync {
    async fn principal(&self, id: &PrincipalId) -> Result<PrincipalInfo, IdentityError>;
}

/// Test-only fixtures shared by this crate's own test modules
/// (`engine.rs`, `approvals.rs`) so each doesn't hand-roll its own
/// `Identity` fake.
#[cfg(test)]
pub(crate) mod fixtures {
    use super::{Identity, IdentityError, PrincipalInfo};
    use async_trait::async_trait;
    use orch_core::ids::{PrincipalId, TenantId};

    /// Resolves every principal as an `admin`, for tests that don't care
    /// about role gating.
    #[derive(Debug, Default)]
    pub struct AllowAllIdentity;

    #[async_trait]
    impl Identity for AllowAllIdentity {
        async fn principal(&self, id: &PrincipalId) -> Result<PrincipalInfo, IdentityError> {
            Ok(PrincipalInfo {
                id: id.clone(),
                tenant_id: TenantId::new("acme"),
                roles: vec!["admin".to_string()],
            })
        }
    }
}
