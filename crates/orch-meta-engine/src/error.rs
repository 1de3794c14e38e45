//! Errors surfaced by the Meta-Engine (a subset of §7's taxonomy, scoped to
//! the Classify/Compose/Draft/Validate/Store/Route pipeline).

use crate::identity::IdentityError;
use orch_agent_registry::AgentRegistryError;
use orch_core::task_spec::PolicyFinding;
use orch_cost_governor::QuotaExceeded;
use orch_llm_gateway::GatewayError;
use orch_task_store::TaskStoreError;
use orch_validation_pipeline::ValidationError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MetaEngineError {
    #[error("could not classify intent into any capability tag: {reason}")]
    InvalidIntent { reason: String },

    #[error("validation failed with {} finding(s)", .findings.len())]
    ValidationFailed { findings: Vec<PolicyFinding> },

    #[error(transparent)]
    Quota(#[from] QuotaExceeded),

    #[error(transparent)]
    Store(#[from] TaskStoreError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error(transparent)]
    AgentRegistry(#[from] AgentRegistryError),

    #[error(transparent)]
    Identity(#[from] IdentityError),

    /// The calling principal lacks the role required for this action.
    #[error("principal not authorized for this action")]
    NotAuthorized,
}
