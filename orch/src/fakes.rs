//! In-memory stand-ins for the consumed capability interfaces (§6:
//! Identity, Inventory) this assembly wires in place of a real identity
//! provider and CMDB. Production deployments swap these for real clients
//! behind the same traits; nothing in the core changes.

use async_trait::async_trait;
use dashmap::DashMap;
use orch_core::ids::{PrincipalId, TenantId};
use orch_meta_engine::{Identity, IdentityError, PrincipalInfo};
use orch_validation_pipeline::{AssetCounts, Inventory, InventoryError, InventorySelector};

/// Resolves principals from a roster registered up front (`register`),
/// defaulting unknown principals to the `operator` floor rather than
/// failing — a demo or dev-mode deployment doesn't require pre-enrolling
/// every caller before it can route low-risk work.
#[derive(Default)]
pub struct InMemoryIdentity {
    roster: DashMap<PrincipalId, PrincipalInfo>,
}

impl InMemoryIdentity {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, id: PrincipalId, tenant_id: TenantId, roles: Vec<String>) {
        self.roster.insert(id.clone(), PrincipalInfo { id, tenant_id, roles });
    }
}

#[async_trait]
impl Identity for InMemoryIdentity {
    async fn principal(&self, id: &PrincipalId) -> Result<PrincipalInfo, IdentityError> {
        if let Some(info) = self.roster.get(id) {
            return Ok(info.clone());
        }
        Ok(PrincipalInfo {
            id: id.clone(),
            tenant_id: TenantId::new("unknown"),
            roles: vec!["operator".to_string()],
        })
    }
}

/// Fixed per-tenant asset/site/service counts, standing in for a live
/// CMDB query. A tenant with no override reports a single asset — enough
/// to exercise blast-radius math without ever being mistaken for "no
/// fleet at all".
#[derive(Default)]
pub struct ScaledInventory {
    overrides: DashMap<TenantId, AssetCounts>,
}

impl ScaledInventory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, tenant: TenantId, counts: AssetCounts) {
        self.overrides.insert(tenant, counts);
    }
}

#[async_trait]
impl Inventory for ScaledInventory {
    async fn query(&self, tenant: &TenantId, _selector: &InventorySelector) -> Result<AssetCounts, InventoryError> {
        Ok(self
            .overrides
            .get(tenant)
            .map(|c| *c)
            .unwrap_or(AssetCounts { assets: 1, sites: 1, services: 1 }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unregistered_principal_defaults_to_operator() {
        let identity = InMemoryIdentity::new();
        let info = identity.principal(&PrincipalId::new("anon")).await.unwrap();
        assert_eq!(info.roles, vec!["operator".to_string()]);
    }

    #[tokio::test]
    async fn registered_principal_resolves_its_roles() {
        let identity = InMemoryIdentity::new();
        identity.register(PrincipalId::new("sre-1"), TenantId::new("acme"), vec!["sre-lead".to_string()]);
        let info = identity.principal(&PrincipalId::new("sre-1")).await.unwrap();
        assert_eq!(info.roles, vec!["sre-lead".to_string()]);
    }

    #[tokio::test]
    async fn tenant_without_override_reports_one_asset() {
        let inventory = ScaledInventory::new();
        let counts = inventory.query(&TenantId::new("acme"), &InventorySelector::default()).await.unwrap();
        assert_eq!(counts.assets, 1);
    }

    #[tokio::test]
    async fn tenant_override_is_honored() {
        let inventory = ScaledInventory::new();
        inventory.set(TenantId::new("acme"), AssetCounts { assets: 480, sites: 5, services: 20 });
        let counts = inventory.query(&TenantId::new("acme"), &InventorySelector::default()).await.unwrap();
        assert_eq!(counts.assets, 480);
    }
}
