//! `ApproveTask`/`RejectTask`/`CancelTask` (§6): the role-gated half of the
//! Meta-Engine's responsibility, alongside the `GetTask`/`ListTasks`/
//! `StreamTask`/`ListAgents`/`ListTools` read surface. Kept in its own
//! module since `execute_task` (engine.rs) never touches approval state.

use crate::engine::MetaEngine;
use crate::error::MetaEngineError;
use orch_agent_registry::AgentDescriptor;
use orch_core::ids::{PrincipalId, TaskId};
use orch_core::task_spec::{Approval, ApprovalDecision, TaskSpec, TaskState, TransitionEvent};
use orch_task_store::{ListFilter, Page, PagedSummaries, TaskStoreError};
use orch_tool_registry::ToolDescriptor;
use tracing::{info, instrument};

impl MetaEngine {
    /// `GetTask` (§6).
    pub fn get_task(&self, task_id: TaskId) -> Result<TaskSpec, MetaEngineError> {
        Ok(self.store.get(&task_id)?)
    }

    /// `ListTasks` (§6), paginated by `created_at` descending.
    #[must_use]
    pub fn list_tasks(&self, tenant: &orch_core::ids::TenantId, filter: &ListFilter, page: Page) -> PagedSummaries {
        self.store.list(tenant, filter, page)
    }

    /// `StreamTask` (§6): finite sequence of `TransitionEvent`s, closing at
    /// the task's terminal state.
    pub fn stream_task(&self, task_id: TaskId) -> Result<tokio::sync::mpsc::UnboundedReceiver<TransitionEvent>, MetaEngineError> {
        Ok(self.store.subscribe(&task_id)?)
    }

    /// `ListAgents` (§6).
    #[must_use]
    pub fn list_agents(&self) -> Vec<AgentDescriptor> {
        self.agents.list()
    }

    /// `ListTools` (§6).
    #[must_use]
    pub fn list_tools(&self) -> Vec<ToolDescriptor> {
        self.tools.list()
    }

    /// `ApproveTask` (§6). Idempotent: the same principal approving twice
    /// is equivalent to approving once (§8). Requires the principal hold
    /// at least the role the current risk band's `approval_role_map`
    /// entry names; an approval from a role below that floor is
    /// `NotAuthorized` rather than silently ignored.
    #[instrument(skip(self, reason), fields(%task_id, %principal))]
    pub async fn approve_task(&self, task_id: TaskId, principal: PrincipalId, reason: String) -> Result<TaskSpec, MetaEngineError> {
        let spec = self.store.get(&task_id)?;

        if spec.state != TaskState::AwaitingApproval {
            if spec.state.is_terminal() || spec.state != TaskState::Approved {
                return Err(TaskStoreError::Conflict(task_id).into());
            }
            // Already fully approved; a repeat approval from the same
            // principal is a no-op (§8 idempotence).
            return Ok(spec);
        }

        let minimum_role = self.minimum_role_for(&spec);
        let info = self.identity.principal(&principal).await?;
        if !info.meets_minimum_role(&minimum_role) {
            return Err(MetaEngineError::NotAuthorized);
        }

        let spec = self
            .store
            .record_approval(
                task_id,
                Approval {
                    principal: principal.clone(),
                    decision: ApprovalDecision::Approved,
                    reason,
                    at: chrono::Utc::now(),
                },
            )
            .await?;

        if !spec.has_sufficient_approvals() {
            return Ok(spec);
        }

        let spec = self.store.transition(task_id, TaskState::Approved, principal, "approvals satisfied").await?;
        info!(%task_id, "approval threshold met, dispatching for execution");
        self.dispatcher.dispatch(task_id).await;
        Ok(spec)
    }

    /// `RejectTask` (§6). Any single rejection from an authorized
    /// principal is terminal (§4.7: "any rejection"); a repeat rejection
    /// by the same principal after the task is already `rejected` is a
    /// no-op, mirroring approval's idempotence.
    #[instrument(skip(self, reason), fields(%task_id, %principal))]
    pub async fn reject_task(&self, task_id: TaskId, principal: PrincipalId, reason: String) -> Result<TaskSpec, MetaEngineError> {
        let spec = self.store.get(&task_id)?;

        if spec.state == TaskState::Rejected {
            return Ok(spec);
        }
        if spec.state != TaskState::AwaitingApproval {
            return Err(TaskStoreError::Conflict(task_id).into());
        }

        let minimum_role = self.minimum_role_for(&spec);
        let info = self.identity.principal(&principal).await?;
        if !info.meets_minimum_role(&minimum_role) {
            return Err(MetaEngineError::NotAuthorized);
        }

        self.store
            .record_approval(
                task_id,
                Approval {
                    principal: principal.clone(),
                    decision: ApprovalDecision::Rejected,
                    reason: reason.clone(),
                    at: chrono::Utc::now(),
                },
            )
            .await?;
        Ok(self.store.transition(task_id, TaskState::Rejected, principal, &reason).await?)
    }

    /// `CancelTask` (§6). Idempotent on terminal tasks: returns the
    /// terminal state unchanged rather than erroring (§8). Any principal
    /// may request cancellation; the transition's own legality check (any
    /// non-terminal state may move to `cancelled`) is the only gate.
    #[instrument(skip(self, reason), fields(%task_id, %principal))]
    pub async fn cancel_task(&self, task_id: TaskId, principal: PrincipalId, reason: String) -> Result<TaskSpec, MetaEngineError> {
        let spec = self.store.get(&task_id)?;
        if spec.state.is_terminal() {
            return Ok(spec);
        }
        Ok(self.store.transition(task_id, TaskState::Cancelled, principal, &reason).await?)
    }

    /// The `approval_role_map` entry's `minimum_role` for the task's
    /// current risk band, falling back to `"operator"` if the deployment's
    /// map omits an entry for this band (should not happen with
    /// `default_approval_role_map`, but a missing entry must not panic).
    fn minimum_role_for(&self, spec: &TaskSpec) -> String {
        let key = match spec.risk_band {
            orch_core::task_spec::RiskBand::Low => "low",
            orch_core::task_spec::RiskBand::Medium => "medium",
            orch_core::task_spec::RiskBand::High => "high",
            orch_core::task_spec::RiskBand::Critical => "critical",
        };
        self.role_map
            .get(key)
            .map(|req| req.minimum_role.clone())
            .unwrap_or_else(|| "operator".to_string())
    }
}
