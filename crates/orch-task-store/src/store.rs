//! The Task Store (§4.4): owns all `TaskSpec` mutation, serialized per
//! `task_id` (§5), and drives the state machine's legality checks.

use crate::audit::AuditLog;
use crate::audit_sink::{AuditSink, NoopAuditSink};
use crate::backend::{BackendError, InMemoryBackend, TaskRecord, TaskStoreBackend};
use crate::error::TaskStoreError;
use crate::pagination::{paginate, ListFilter, Page, PagedSummaries};
use crate::subscribe::SubscriptionHub;
use dashmap::DashMap;
use orch_core::ids::{PrincipalId, TaskId, TenantId};
use orch_core::task_spec::{
    Approval, ApprovalDecision, BlastRadius, FailureCause, Handoff, PolicyFinding, RiskBand, Step, StepResult, TaskSpec,
    TaskState, TransitionEvent,
};
use orch_cost_governor::CostGovernor;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex as AsyncMutex;
use tracing::{info, instrument};

/// Owns durable `TaskSpec` storage and the task state machine. Cheap to
/// clone (all state lives behind `Arc`s) so every component that needs to
/// read or mutate tasks shares one instance.
#[derive(Clone)]
pub struct TaskStore {
    backend: Arc<dyn TaskStoreBackend>,
    governor: Arc<CostGovernor>,
    hub: Arc<SubscriptionHub>,
    task_locks: Arc<DashMap<TaskId, Arc<AsyncMutex<()>>>>,
    audit_sink: Arc<dyn AuditSink>,
}

impl TaskStore {
    #[must_use]
    pub fn new(governor: Arc<CostGovernor>) -> Self {
        Self {
            backend: Arc::new(InMemoryBackend::new()),
            governor,
            hub: Arc::new(SubscriptionHub::new()),
            task_locks: Arc::new(DashMap::new()),
            audit_sink: Arc::new(NoopAuditSink),
        }
    }

    #[must_use]
    pub fn with_backend(backend: Arc<dyn TaskStoreBackend>, governor: Arc<CostGovernor>) -> Self {
        Self {
            backend,
            governor,
            hub: Arc::new(SubscriptionHub::new()),
            task_locks: Arc::new(DashMap::new()),
            audit_sink: Arc::new(NoopAuditSink),
        }
    }

    /// Install the `AuditSink` every committed `TransitionEvent` is
    /// forwarded to (§6).
    #[must_use]
    pub fn with_audit_sink(mut self, sink: Arc<dyn AuditSink>) -> Self {
        self.audit_sink = sink;
        self
    }

    fn lock_for(&self, id: TaskId) -> Arc<AsyncMutex<()>> {
        Arc::clone(self.task_locks.entry(id).or_insert_with(|| Arc::new(AsyncMutex::new(()))))
    }

    /// `Create(spec)` (§6). Admits against the tenant's concurrency quota
    /// before the record is ever visible to readers, then appends the
    /// genesis `TransitionEvent` (`from: None, to: Planning`) so the audit
    /// log's event count matches the number of distinct states visited
    /// (§8), rather than starting empty until the first real transition.
    #[instrument(skip(self, spec), fields(tenant = %spec.tenant_id))]
    pub async fn create(&self, spec: TaskSpec) -> Result<TaskId, TaskStoreError> {
        self.governor.admit_task(&spec.tenant_id)?;
        let task_id = spec.task_id;
        let created_by = spec.created_by.clone();
        let state = spec.state;
        self.backend.insert(TaskRecord {
            spec,
            version: 0,
            audit: Arc::new(parking_lot::Mutex::new(AuditLog::new())),
        })?;
        self.append_event(
            &task_id,
            TransitionEvent {
                task_id,
                from: None,
                to: state,
                at: chrono::Utc::now(),
                actor: created_by,
                reason: "task created".to_string(),
                diff: None,
            },
        )
        .await?;
        Ok(task_id)
    }

    pub fn get(&self, id: &TaskId) -> Result<TaskSpec, TaskStoreError> {
        Ok(self.backend.get(id)?.spec)
    }

    #[must_use]
    pub fn list(&self, tenant: &TenantId, filter: &ListFilter, page: Page) -> PagedSummaries {
        let specs: Vec<TaskSpec> = self.backend.list(tenant).into_iter().map(|r| r.spec).collect();
        paginate(&specs, filter, page)
    }

    /// Finite sequence of `TransitionEvent`s for `id`, replaying history
    /// and then streaming live until the task reaches a terminal state.
    pub fn subscribe(&self, id: &TaskId) -> Result<tokio::sync::mpsc::UnboundedReceiver<TransitionEvent>, TaskStoreError> {
        let record = self.backend.get(id)?;
        let history: Vec<TransitionEvent> = record.audit.lock().events().iter().map(|c| c.event.clone()).collect();
        Ok(self.hub.subscribe(*id, history, record.spec.state.is_terminal()))
    }

    /// Replace the draft plan (agent chain, steps, explanation, estimated
    /// cost) assembled by the Meta-Engine's Compose stage.
    pub async fn set_plan(
        &self,
        id: TaskId,
        agent_chain: Vec<String>,
        steps: Vec<Step>,
        explanation: String,
        estimated_cost: f64,
    ) -> Result<TaskSpec, TaskStoreError> {
        self.mutate(id, |spec| {
            spec.agent_chain = agent_chain;
            spec.steps = steps;
            spec.explanation = explanation;
            spec.estimated_cost = estimated_cost;
        })
        .await
    }

    /// Record the Validation Pipeline's findings onto the task.
    #[allow(clippy::too_many_arguments)]
    pub async fn apply_validation(
        &self,
        id: TaskId,
        risk_score: f64,
        risk_band: RiskBand,
        blast_radius: BlastRadius,
        policy_findings: Vec<PolicyFinding>,
        requires_hitl: bool,
        approvals_required: u32,
    ) -> Result<TaskSpec, TaskStoreError> {
        self.mutate(id, |spec| {
            spec.risk_score = risk_score;
            spec.risk_band = risk_band;
            spec.blast_radius = blast_radius;
            spec.policy_findings = policy_findings;
            spec.requires_hitl = requires_hitl;
            spec.approvals_required = approvals_required;
        })
        .await
    }

    /// Legal, audited state transition (§4.7's table, enforced by
    /// [`TaskState::can_transition_to`]). Appends one hash-chained
    /// [`TransitionEvent`] and releases the tenant's concurrency slot once
    /// the task lands in a terminal state.
    #[instrument(skip(self))]
    pub async fn transition(
        &self,
        id: TaskId,
        to: TaskState,
        actor: PrincipalId,
        reason: impl Into<String>,
    ) -> Result<TaskSpec, TaskStoreError> {
        let reason = reason.into();
        let lock = self.lock_for(id);
        let _guard = lock.lock().await;

        let record = self.backend.get(&id)?;
        let from = record.spec.state;

        if from.is_terminal() {
            // Cancellation (and any other transition attempt) on an
            // already-terminal task is a no-op, not an error (§8).
            if to == TaskState::Cancelled {
                return Ok(record.spec);
            }
            return Err(TaskStoreError::Conflict(id));
        }

        if !from.can_transition_to(to) {
            return Err(TaskStoreError::Conflict(id));
        }

        let mut new_spec = record.spec.clone();
        new_spec.state = to;
        let updated = self.commit(&record, id, new_spec)?;

        let event = TransitionEvent {
            task_id: id,
            from: Some(from),
            to,
            at: chrono::Utc::now(),
            actor,
            reason,
            diff: None,
        };
        self.append_event(&id, event.clone()).await?;
        info!(%id, ?from, ?to, "task transitioned");

        if to.is_terminal() {
            self.governor.release_task(&updated.tenant_id);
        }

        Ok(updated)
    }

    /// `ApproveTask`/`RejectTask` (§6). Idempotent: the same principal
    /// recording the same decision twice is equivalent to recording it
    /// once (§8).
    pub async fn record_approval(&self, id: TaskId, approval: Approval) -> Result<TaskSpec, TaskStoreError> {
        let lock = self.lock_for(id);
        let _guard = lock.lock().await;
        self.mutate_locked(id, |spec| {
            let already_recorded = spec
                .approvals
                .iter()
                .any(|a| a.principal == approval.principal && a.decision == approval.decision);
            if !already_recorded {
                spec.approvals.push(approval.clone());
            }
        })
    }

    pub async fn record_step_result(&self, id: TaskId, result: StepResult) -> Result<TaskSpec, TaskStoreError> {
        self.mutate(id, |spec| spec.step_results.push(result)).await
    }

    pub async fn record_handoff(&self, id: TaskId, handoff: Handoff) -> Result<TaskSpec, TaskStoreError> {
        self.mutate(id, |spec| spec.handoffs.push(handoff)).await
    }

    pub async fn set_error(&self, id: TaskId, cause: FailureCause) -> Result<TaskSpec, TaskStoreError> {
        self.mutate(id, |spec| spec.error = Some(cause)).await
    }

    pub async fn accrue_cost(&self, id: TaskId, llm_tokens: u64, tool_invocations: u64, wallclock_ms: u64) -> Result<TaskSpec, TaskStoreError> {
        self.mutate(id, |spec| {
            spec.llm_tokens_used += llm_tokens;
            spec.tool_invocations += tool_invocations;
            spec.wallclock_ms += wallclock_ms;
        })
        .await
    }

    async fn mutate(&self, id: TaskId, edit: impl FnOnce(&mut TaskSpec)) -> Result<TaskSpec, TaskStoreError> {
        let lock = self.lock_for(id);
        let _guard = lock.lock().await;
        self.mutate_locked(id, edit)
    }

    fn mutate_locked(&self, id: TaskId, edit: impl FnOnce(&mut TaskSpec)) -> Result<TaskSpec, TaskStoreError> {
        let record = self.backend.get(&id)?;
        let mut new_spec = record.spec.clone();
        edit(&mut new_spec);
        self.commit(&record, id, new_spec)
    }

    fn commit(&self, record: &TaskRecord, id: TaskId, new_spec: TaskSpec) -> Result<TaskSpec, TaskStoreError> {
        let updated = self.backend.compare_and_swap(&id, record.version, new_spec)?;
        Ok(updated.spec)
    }

    async fn append_event(&self, id: &TaskId, event: TransitionEvent) -> Result<(), TaskStoreError> {
        let record = self.backend.get(id)?;
        let chained = {
            let mut audit = record.audit.lock();
            audit.append(event.clone());
            audit.events().last().expect("just appended").clone()
        };
        self.audit_sink.record(&chained.event).await;
        self.hub.publish(*id, chained.event.clone(), record.spec.state.is_terminal());
        Ok(())
    }

    /// Transition every `awaiting_approval` task whose TTL has elapsed to
    /// `expired` (§4.7, §8 boundary: "exceeding TTL by one second
    /// transitions to `expired`"). Intended to be driven by a periodic
    /// background sweep owned by the caller; returns the ids it expired.
    pub async fn sweep_expired_approvals(&self, ttl: Duration, actor: PrincipalId) -> Vec<TaskId> {
        let now = chrono::Utc::now();
        let mut expired = Vec::new();
        for record in self.backend.all() {
            if record.spec.state != TaskState::AwaitingApproval {
                continue;
            }
            let entered_at = {
                let audit = record.audit.lock();
                audit
                    .events()
                    .iter()
                    .rev()
                    .find(|e| e.event.to == TaskState::AwaitingApproval)
                    .map(|e| e.event.at)
                    .unwrap_or(record.spec.created_at)
            };
            let age = now.signed_duration_since(entered_at);
            if age.num_seconds() as u64 > ttl.as_secs()
                && self
                    .transition(record.spec.task_id, TaskState::Expired, actor.clone(), "hitl_ttl_seconds elapsed")
                    .await
                    .is_ok()
            {
                expired.push(record.spec.task_id);
            }
        }
        expired
    }

    /// Verify the hash chain of a task's audit log has not been tampered
    /// with.
    pub fn verify_integrity(&self, id: &TaskId) -> Result<(), TaskStoreError> {
        let record = self.backend.get(id)?;
        record
            .audit
            .lock()
            .verify_integrity()
            .map_err(|e| TaskStoreError::Backend(e.to_string()))
    }
}

impl From<BackendError> for TaskStoreError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::NotFound(id) => TaskStoreError::NotFound(id),
            BackendError::VersionConflict { task, .. } => TaskStoreError::Conflict(task),
        }
    }
}
