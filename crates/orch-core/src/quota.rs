//! Tenant quota configuration and sliding-window usage accounting types.
//!
//! The counters themselves live in `orch-cost-governor`; this module defines
//! the shared vocabulary (`TenantQuota`, `UsageCounter`) so the governor and
//! the task store agree on shape without a circular dependency.

use crate::ids::TenantId;
use serde::{Deserialize, Serialize};

/// Per-tenant resource ceilings.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TenantQuota {
    pub max_concurrent_tasks: u32,
    pub max_llm_tokens_window: u64,
    pub max_tool_invocations_window: u64,
    pub window_seconds: u64,
}

impl Default for TenantQuota {
    fn default() -> Self {
        Self {
            max_concurrent_tasks: 25,
            max_llm_tokens_window: 500_000,
            max_tool_invocations_window: 2_000,
            window_seconds: 3600,
        }
    }
}

/// A resource tracked by the cost governor's sliding window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QuotaResource {
    ConcurrentTasks,
    Tokens,
    ToolInvocations,
}

impl std::fmt::Display for QuotaResource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            QuotaResource::ConcurrentTasks => "concurrent",
            QuotaResource::Tokens => "tokens",
            QuotaResource::ToolInvocations => "tool_invocations",
        };
        write!(f, "{s}")
    }
}

/// A point-in-time snapshot of a tenant's sliding-window counter for one
/// resource. Used for diagnostics and for rebuilding counters after restart.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageCounter {
    pub tenant_id: TenantId,
    pub resource: QuotaResource,
    pub used: u64,
    pub window_started_at: chrono::DateTime<chrono::Utc>,
}
