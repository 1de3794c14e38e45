//! `Inventory.Query(tenant, selector) → asset counts` (§6), consumed by the
//! blast-radius stage.

use async_trait::async_trait;
use orch_core::ids::TenantId;
use std::collections::BTreeSet;

/// The asset/site/service identifiers a plan's steps reference, gathered
/// from well-known argument keys (`asset_id`, `site_id`, `service_id`) in
/// each step's `arguments`.
#[derive(Debug, Clone, Default)]
pub struct InventorySelector {
    pub asset_ids: BTreeSet<String>,
    pub site_ids: BTreeSet<String>,
    pub service_ids: BTreeSet<String>,
}

impl InventorySelector {
    #[must_use]
    pub fn from_steps(steps: &[orch_core::task_spec::Step]) -> Self {
        let mut selector = Self::default();
        for step in steps {
            if let Some(obj) = step.arguments.as_object() {
                if let Some(v) = obj.get("asset_id").and_then(|v| v.as_str()) {
                    selector.asset_ids.insert(v.to_string());
                }
                if let Some(v) = obj.get("site_id").and_then(|v| v.as_str()) {
                    selector.site_ids.insert(v.to_string());
                }
                if let Some(v) = obj.get("service_id").and_then(|v| v.as_str()) {
                    selector.service_ids.insert(v.to_string());
                }
            }
        }
        selector
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.asset_ids.is_empty() && self.site_ids.is_empty() && self.service_ids.is_empty()
    }
}

/// Counts returned by an inventory query; maps directly onto
/// [`orch_core::task_spec::BlastRadius`].
#[derive(Debug, Clone, Copy, Default)]
pub struct AssetCounts {
    pub assets: u64,
    pub sites: u64,
    pub services: u64,
}

#[derive(Debug, thiserror::Error)]
#[error("inventory query failed: {0}")]
pub struct InventoryError(pub String);

/// The tenant's current fleet topology, queried to size a plan's blast
/// radius. Implementations talk to whatever CMDB or service catalog the
/// deployment uses; a fake is provided for tests.
#[async_trait]
pub trait Inventory: Send + Sync {
    async fn query(&self, tenant: &TenantId, selector: &InventorySelector) -> Result<AssetCounts, InventoryError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use orch_core::descriptors::SideEffectClass;
    use orch_core::task_spec::Step;

    fn step_with_asset(asset_id: &str) -> Step {
        Step {
            index: 0,
            agent: "patcher".into(),
            tool: "apply_patch".into(),
            arguments: serde_json::json!({"asset_id": asset_id}),
            preconditions: Vec::new(),
            parallel_group: None,
            side_effect_class: SideEffectClass::MutateTenant,
            best_effort: false,
        }
    }

    #[test]
    fn selector_collects_distinct_asset_ids_from_steps() {
        let steps = vec![step_with_asset("i-1"), step_with_asset("i-1"), step_with_asset("i-2")];
        let selector = InventorySelector::from_steps(&steps);
        assert_eq!(selector.asset_ids.len(), 2);
    }

    #[test]
    fn selector_is_empty_for_steps_with_no_known_keys() {
        let step = Step {
            arguments: serde_json::json!({"other": 1}),
            ..step_with_asset("unused")
        };
        let selector = InventorySelector::from_steps(&[step]);
        assert!(selector.is_empty());
    }
}
