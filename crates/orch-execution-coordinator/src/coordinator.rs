//! The `ExecutionCoordinator` (§4.8): drives the `executing` → `verifying`
//! → `completed`/`failed` portion of a task's lifecycle once it has been
//! approved, fanning parallel-group steps out across `tokio::spawn`ed
//! tasks and joining before the next group begins.

use crate::error::ExecutionError;
use crate::job_runner::{JobDescriptor, JobRunner, JobStatus};
use async_trait::async_trait;
use dashmap::DashMap;
use orch_core::descriptors::SideEffectClass;
use orch_core::ids::{HandoffId, PrincipalId, TaskId};
use orch_core::task_spec::{FailureCause, Handoff, HandoffStatus, Step, StepOutcome, StepResult, TaskSpec, TaskState};
use orch_core::TaskDispatcher;
use orch_cost_governor::CostGovernor;
use orch_task_store::TaskStore;
use orch_tool_registry::{InvocationContext, ToolRegistry};
use orch_validation_pipeline::ValidationPipeline;
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{instrument, warn};

const SYSTEM_ACTOR: &str = "execution-coordinator";

/// Tunables for how the coordinator drives a task's steps.
#[derive(Debug, Clone)]
pub struct ExecutionCoordinatorConfig {
    /// Per-step deadline; expiry marks the step `timed_out` (§4.8).
    pub step_timeout: Duration,
    /// Run a read-only `verify_{tool}` checkpoint immediately after each
    /// `mutate-fleet` step, when one is registered.
    pub verify_after_mutate_fleet: bool,
    /// Route `mutate-fleet` steps through the `JobRunner` instead of
    /// invoking them inline — the core never blocks on fleet-wide work.
    pub long_running_via_job_runner: bool,
    pub job_poll_interval: Duration,
}

impl Default for ExecutionCoordinatorConfig {
    fn default() -> Self {
        Self {
            step_timeout: Duration::from_secs(60),
            verify_after_mutate_fleet: true,
            long_running_via_job_runner: true,
            job_poll_interval: Duration::from_millis(200),
        }
    }
}

/// Ties together the Task Store, Tool Registry, Cost Governor, Validation
/// Pipeline, and a `JobRunner`. `Clone` is cheap — everything behind an
/// `Arc`.
#[derive(Clone)]
pub struct ExecutionCoordinator {
    store: Arc<TaskStore>,
    tools: Arc<ToolRegistry>,
    governor: Arc<CostGovernor>,
    validation: Arc<ValidationPipeline>,
    job_runner: Arc<dyn JobRunner>,
    config: ExecutionCoordinatorConfig,
    cancelled: Arc<DashMap<TaskId, Arc<AtomicBool>>>,
}

impl ExecutionCoordinator {
    #[must_use]
    pub fn new(
        store: Arc<TaskStore>,
        tools: Arc<ToolRegistry>,
        governor: Arc<CostGovernor>,
        validation: Arc<ValidationPipeline>,
        job_runner: Arc<dyn JobRunner>,
        config: ExecutionCoordinatorConfig,
    ) -> Self {
        Self {
            store,
            tools,
            governor,
            validation,
            job_runner,
            config,
            cancelled: Arc::new(DashMap::new()),
        }
    }

    /// Request cancellation of `task_id`. The run loop checks this before
    /// starting the next parallel group; in-flight tool calls are allowed
    /// to finish but their results are not applied (§4.8).
    pub fn cancel(&self, task_id: TaskId) {
        self.cancelled
            .entry(task_id)
            .or_insert_with(|| Arc::new(AtomicBool::new(false)))
            .store(true, Ordering::SeqCst);
    }

    fn is_cancelled(&self, task_id: TaskId) -> bool {
        self.cancelled.get(&task_id).map(|flag| flag.load(Ordering::SeqCst)).unwrap_or(false)
    }

    /// Drive `task_id` from `approved` through to a terminal state.
    /// [`TaskDispatcher::dispatch`] spawns this without awaiting it; tests
    /// and callers that need the outcome call it directly.
    #[instrument(skip(self), fields(%task_id))]
    pub async fn run(&self, task_id: TaskId) -> Result<TaskSpec, ExecutionError> {
        let actor = PrincipalId::new(SYSTEM_ACTOR);
        let mut spec = self
            .store
            .transition(task_id, TaskState::Executing, actor.clone(), "execution started")
            .await?;

        for group in group_steps(&spec.steps) {
            if self.is_cancelled(task_id) {
                let cancelled = self
                    .store
                    .transition(task_id, TaskState::Cancelled, actor.clone(), "cancelled before next group")
                    .await?;
                return Ok(cancelled);
            }

            let results = self.run_group(&spec, &group).await;
            let mut first_hard_failure = None;
            for (step, result) in group.iter().zip(results.into_iter()) {
                let is_hard_failure = matches!(result.outcome, StepOutcome::Failed { .. } | StepOutcome::TimedOut) && !step.best_effort;
                self.store.record_step_result(task_id, result).await?;
                if is_hard_failure && first_hard_failure.is_none() {
                    first_hard_failure = Some(step.index);
                }
            }

            if let Some(step_index) = first_hard_failure {
                self.store
                    .set_error(
                        task_id,
                        FailureCause {
                            code: "step_failed".to_string(),
                            message: format!("step {step_index} did not complete successfully"),
                            step_index: Some(step_index),
                        },
                    )
                    .await?;
                return Ok(self.store.transition(task_id, TaskState::Failed, actor, "step failed").await?);
            }

            spec = self.store.get(&task_id)?;
        }

        spec = self.store.transition(task_id, TaskState::Verifying, actor.clone(), "steps complete").await?;

        match self.verify_postconditions(&spec).await {
            Ok(()) => Ok(self
                .store
                .transition(task_id, TaskState::Completed, actor, "postconditions verified")
                .await?),
            Err(source) => {
                self.store
                    .set_error(
                        task_id,
                        FailureCause {
                            code: "verification_failed".to_string(),
                            message: source.to_string(),
                            step_index: None,
                        },
                    )
                    .await?;
                Ok(self
                    .store
                    .transition(task_id, TaskState::Failed, actor, "postcondition verification failed")
                    .await?)
            }
        }
    }

    async fn run_group(&self, spec: &TaskSpec, group: &[Step]) -> Vec<StepResult> {
        let handles: Vec<_> = group
            .iter()
            .cloned()
            .map(|step| {
                let this = self.clone();
                let spec = spec.clone();
                tokio::spawn(async move { this.run_step(&spec, &step).await })
            })
            .collect();

        let mut results = Vec::with_capacity(handles.len());
        for (step, handle) in group.iter().zip(handles) {
            let result = handle.await.unwrap_or_else(|_| StepResult {
                step_index: step.index,
                outcome: StepOutcome::Failed { message: "step task panicked".to_string() },
                output: None,
                wallclock_ms: 0,
            });
            results.push(result);
        }
        results
    }

    async fn run_step(&self, spec: &TaskSpec, step: &Step) -> StepResult {
        let started = std::time::Instant::now();
        let outcome = self.invoke_step(spec, step).await;
        let wallclock_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        let (outcome, output) = match outcome {
            Ok(value) => (StepOutcome::Succeeded, Some(value)),
            Err(StepError::Timeout) => (StepOutcome::TimedOut, None),
            Err(StepError::Failed(message)) => (StepOutcome::Failed { message }, None),
        };

        StepResult { step_index: step.index, outcome, output, wallclock_ms }
    }

    async fn invoke_step(&self, spec: &TaskSpec, step: &Step) -> Result<serde_json::Value, StepError> {
        self.governor.admit_tool(&spec.tenant_id).map_err(|e| StepError::Failed(e.to_string()))?;

        if self.config.long_running_via_job_runner && step.side_effect_class == SideEffectClass::MutateFleet {
            return self.run_via_job_runner(spec, step).await;
        }

        let ctx = invocation_context(spec, step, &self.tools);
        match tokio::time::timeout(self.config.step_timeout, self.tools.invoke(&step.tool, step.arguments.clone(), &ctx)).await {
            Ok(Ok(value)) => {
                if step.side_effect_class == SideEffectClass::MutateFleet && self.config.verify_after_mutate_fleet {
                    self.checkpoint(spec, step).await?;
                }
                Ok(value)
            }
            Ok(Err(err)) => Err(StepError::Failed(err.to_string())),
            Err(_) => Err(StepError::Timeout),
        }
    }

    async fn run_via_job_runner(&self, spec: &TaskSpec, step: &Step) -> Result<serde_json::Value, StepError> {
        let job_id = self
            .job_runner
            .dispatch(&spec.tenant_id, JobDescriptor { tool: step.tool.clone(), arguments: step.arguments.clone() })
            .await
            .map_err(|e| StepError::Failed(e.to_string()))?;

        self.store
            .record_handoff(
                spec.task_id,
                Handoff { handoff_id: HandoffId::new(), step_index: step.index, job_id: job_id.clone(), status: HandoffStatus::Pending },
            )
            .await
            .map_err(|e| StepError::Failed(e.to_string()))?;

        let deadline = tokio::time::Instant::now() + self.config.step_timeout;
        loop {
            if tokio::time::Instant::now() >= deadline {
                return Err(StepError::Timeout);
            }
            match self.job_runner.status(&job_id).await.map_err(|e| StepError::Failed(e.to_string()))? {
                JobStatus::Succeeded => return Ok(serde_json::json!({"job_id": job_id})),
                JobStatus::Failed { message } => return Err(StepError::Failed(message)),
                JobStatus::Pending | JobStatus::Running => tokio::time::sleep(self.config.job_poll_interval).await,
            }
        }
    }

    /// Mid-execution checkpoint (§4.8: "between steps with `mutate-fleet`
    /// side effects, inserts a verification checkpoint ... when
    /// configured"). Looks for a tool named `verify_{tool}`; silently
    /// skipped when no such tool is registered, since not every mutate
    /// tool has (or needs) a dedicated confirmation check.
    async fn checkpoint(&self, spec: &TaskSpec, step: &Step) -> Result<(), StepError> {
        let verify_tool = format!("verify_{}", step.tool);
        if self.tools.lookup(&verify_tool).is_none() {
            return Ok(());
        }
        let ctx = invocation_context(spec, step, &self.tools);
        self.validation
            .verify_postconditions(&spec.tenant_id, &[(verify_tool, step.arguments.clone())], &ctx)
            .await
            .map_err(|e| StepError::Failed(e.to_string()))
    }

    /// Stage 6 of the Validation Pipeline (§4.5): re-confirm every
    /// `mutate-fleet` step's intended post-state once the task has moved
    /// to `verifying`.
    async fn verify_postconditions(&self, spec: &TaskSpec) -> Result<(), ExecutionError> {
        let checks: Vec<(String, serde_json::Value)> = spec
            .steps
            .iter()
            .filter(|s| s.side_effect_class == SideEffectClass::MutateFleet)
            .filter_map(|s| {
                let verify_tool = format!("verify_{}", s.tool);
                self.tools.lookup(&verify_tool).map(|_| (verify_tool, s.arguments.clone()))
            })
            .collect();
        if checks.is_empty() {
            return Ok(());
        }
        let ctx = InvocationContext {
            environment: spec.environment.clone(),
            granted_permissions: all_required_permissions(&self.tools, &spec.steps),
            task_has_approvals: !spec.approvals.is_empty(),
            idempotency_key: spec.idempotency_key.clone(),
        };
        self.validation.verify_postconditions(&spec.tenant_id, &checks, &ctx).await?;
        Ok(())
    }
}

#[async_trait]
impl TaskDispatcher for ExecutionCoordinator {
    async fn dispatch(&self, task_id: TaskId) {
        let this = self.clone();
        tokio::spawn(async move {
            if let Err(err) = this.run(task_id).await {
                warn!(%task_id, error = %err, "task execution ended in error");
            }
        });
    }
}

enum StepError {
    Timeout,
    Failed(String),
}

/// Grants a step the permissions its own tool descriptor requires. By the
/// time a plan reaches `executing` it has already passed Validation and
/// (if required) human approval, so the coordinator — not the caller's
/// original principal — is the trusted actor invoking each tool.
fn invocation_context(spec: &TaskSpec, step: &Step, tools: &ToolRegistry) -> InvocationContext {
    let granted = tools.lookup(&step.tool).map(|d| d.required_permissions).unwrap_or_default();
    InvocationContext {
        environment: spec.environment.clone(),
        granted_permissions: granted,
        task_has_approvals: !spec.approvals.is_empty(),
        idempotency_key: spec.idempotency_key.clone(),
    }
}

fn all_required_permissions(tools: &ToolRegistry, steps: &[Step]) -> BTreeSet<String> {
    steps.iter().filter_map(|s| tools.lookup(&s.tool)).flat_map(|d| d.required_permissions).collect()
}

/// Groups steps into maximal contiguous runs sharing the same
/// `parallel_group`; `parallel_group = None` is always its own singleton
/// group (§4.8).
fn group_steps(steps: &[Step]) -> Vec<Vec<Step>> {
    let mut groups: Vec<Vec<Step>> = Vec::new();
    for step in steps {
        match step.parallel_group {
            Some(g) => {
                let continues_last = groups.last().and_then(|last| last.first()).map(|s: &Step| s.parallel_group) == Some(Some(g));
                if continues_last {
                    groups.last_mut().expect("checked above").push(step.clone());
                } else {
                    groups.push(vec![step.clone()]);
                }
            }
            None => groups.push(vec![step.clone()]),
        }
    }
    groups
}
