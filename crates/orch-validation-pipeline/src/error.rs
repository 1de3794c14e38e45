//! Errors surfaced while running the validation pipeline.

use orch_core::ids::TenantId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("step {step_index} references unregistered tool `{tool}`")]
    UnknownTool { step_index: usize, tool: String },
    #[error("inventory unreachable for tenant {0}")]
    InventoryUnavailable(TenantId),
}
