//! The durable `TaskSpec` record and its governing state machine.

use crate::descriptors::SideEffectClass;
use crate::ids::{HandoffId, PrincipalId, TaskId, TenantId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Coarse risk level derived from [`risk score`](TaskSpec::risk_score).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RiskBand {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskBand {
    /// Minimum approvals required and the role floor, per the
    /// `approval_role_map` defaults (overridable via configuration).
    #[must_use]
    pub fn default_approvals_required(self) -> u32 {
        match self {
            RiskBand::Low => 0,
            RiskBand::Medium => 1,
            RiskBand::High => 1,
            RiskBand::Critical => 2,
        }
    }
}

/// The authoritative task lifecycle. See `4.7 Meta-Engine` for the legal
/// transition table; [`TaskState::validate_transition`] enforces it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskState {
    Planning,
    Planned,
    AwaitingApproval,
    Approved,
    Executing,
    Verifying,
    Completed,
    Failed,
    Rejected,
    Cancelled,
    Expired,
}

impl TaskState {
    /// True for the five states a `TaskSpec` can never leave.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(
            self,
            TaskState::Completed | TaskState::Failed | TaskState::Rejected | TaskState::Cancelled | TaskState::Expired
        )
    }

    /// Whether `to` is a legal transition target from `self`.
    ///
    /// Cancellation is handled separately by callers: any non-terminal state
    /// may transition to `Cancelled`, which this function also allows so
    /// that a single check suffices.
    #[must_use]
    pub fn can_transition_to(self, to: TaskState) -> bool {
        if self.is_terminal() {
            return false;
        }
        if to == TaskState::Cancelled {
            return true;
        }
        matches!(
            (self, to),
            (TaskState::Planning, TaskState::Planned)
                | (TaskState::Planning, TaskState::Failed)
                | (TaskState::Planned, TaskState::AwaitingApproval)
                | (TaskState::Planned, TaskState::Approved)
                | (TaskState::AwaitingApproval, TaskState::Approved)
                | (TaskState::AwaitingApproval, TaskState::Rejected)
                | (TaskState::AwaitingApproval, TaskState::Expired)
                | (TaskState::Approved, TaskState::Executing)
                | (TaskState::Executing, TaskState::Verifying)
                | (TaskState::Executing, TaskState::Failed)
                | (TaskState::Verifying, TaskState::Completed)
                | (TaskState::Verifying, TaskState::Failed)
        )
    }
}

/// Decision recorded for an approval request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ApprovalDecision {
    Approved,
    Rejected,
}

/// One recorded approval or rejection on a `TaskSpec`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Approval {
    pub principal: PrincipalId,
    pub decision: ApprovalDecision,
    pub reason: String,
    pub at: DateTime<Utc>,
}

/// A single planned action: one tool call on behalf of one agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Step {
    pub index: usize,
    pub agent: String,
    pub tool: String,
    pub arguments: serde_json::Value,
    pub preconditions: Vec<String>,
    /// Steps sharing the same group fan out concurrently and join before
    /// the next group begins; `None` means "run in declared order, alone".
    pub parallel_group: Option<u32>,
    pub side_effect_class: SideEffectClass,
    pub best_effort: bool,
}

/// Outcome of executing (or attempting to execute) a [`Step`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepResult {
    pub step_index: usize,
    pub outcome: StepOutcome,
    pub output: Option<serde_json::Value>,
    pub wallclock_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum StepOutcome {
    Succeeded,
    Failed { message: String },
    TimedOut,
    Cancelled,
}

/// Counts of assets/sites/services a plan would touch, computed by the
/// blast-radius stage of the validation pipeline from the Inventory
/// interface.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct BlastRadius {
    pub assets: u64,
    pub sites: u64,
    pub services: u64,
}

/// One emitted finding from a validation stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyFinding {
    pub stage: String,
    pub step_index: Option<usize>,
    pub severity: FindingSeverity,
    pub message: String,
    pub requires_approval: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum FindingSeverity {
    Info,
    Warning,
    Veto,
}

/// Reference to a long-running side effect handed off to the external
/// `JobRunner` (see `DESIGN NOTES` on long-running side effects).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Handoff {
    pub handoff_id: HandoffId,
    pub step_index: usize,
    pub job_id: String,
    pub status: HandoffStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HandoffStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
}

/// Structured cause recorded on a task that terminates in `Failed`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailureCause {
    pub code: String,
    pub message: String,
    pub step_index: Option<usize>,
}

/// The central durable record. Mutation is exclusively owned by the task
/// store; every other component reads this structure and submits typed
/// mutations (see `orch_task_store::mutation`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskSpec {
    pub task_id: TaskId,
    pub tenant_id: TenantId,
    pub created_by: PrincipalId,
    pub created_at: DateTime<Utc>,

    pub intent: String,
    pub environment: String,
    pub context: BTreeMap<String, String>,
    pub idempotency_key: Option<String>,

    pub agent_chain: Vec<String>,
    pub steps: Vec<Step>,
    pub explanation: String,
    pub estimated_cost: f64,

    pub risk_score: f64,
    pub risk_band: RiskBand,
    pub blast_radius: BlastRadius,
    pub policy_findings: Vec<PolicyFinding>,
    pub requires_hitl: bool,
    pub approvals_required: u32,

    pub state: TaskState,
    pub approvals: Vec<Approval>,
    pub step_results: Vec<StepResult>,
    pub handoffs: Vec<Handoff>,
    pub error: Option<FailureCause>,

    pub llm_tokens_used: u64,
    pub tool_invocations: u64,
    pub wallclock_ms: u64,
}

impl TaskSpec {
    /// Count of approvals with `decision = Approved` from distinct principals.
    #[must_use]
    pub fn distinct_approvers(&self) -> usize {
        let mut seen = std::collections::BTreeSet::new();
        for approval in &self.approvals {
            if approval.decision == ApprovalDecision::Approved {
                seen.insert(&approval.principal);
            }
        }
        seen.len()
    }

    /// Whether the approvals recorded so far satisfy `approvals_required`.
    #[must_use]
    pub fn has_sufficient_approvals(&self) -> bool {
        self.distinct_approvers() as u32 >= self.approvals_required
    }

    /// §3 invariant: `risk_band = critical` implies `requires_hitl`.
    #[must_use]
    pub fn upholds_critical_hitl_invariant(&self) -> bool {
        self.risk_band != RiskBand::Critical || self.requires_hitl
    }

    /// §3 invariant: on success, one result per step.
    #[must_use]
    pub fn upholds_step_result_invariant(&self) -> bool {
        self.step_results.len() <= self.steps.len()
    }
}

/// Append-only audit record. See `orch_task_store::audit` for the
/// hash-chained log this is stored in.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransitionEvent {
    pub task_id: TaskId,
    pub from: Option<TaskState>,
    pub to: TaskState,
    pub at: DateTime<Utc>,
    pub actor: PrincipalId,
    pub reason: String,
    pub diff: Option<serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_states_reject_every_transition() {
        for state in [
            TaskState::Completed,
            TaskState::Failed,
            TaskState::Rejected,
            TaskState::Cancelled,
            TaskState::Expired,
        ] {
            assert!(!state.can_transition_to(TaskState::Planned));
            assert!(!state.can_transition_to(TaskState::Cancelled));
        }
    }

    #[test]
    fn any_non_terminal_state_can_be_cancelled() {
        for state in [
            TaskState::Planning,
            TaskState::Planned,
            TaskState::AwaitingApproval,
            TaskState::Approved,
            TaskState::Executing,
            TaskState::Verifying,
        ] {
            assert!(state.can_transition_to(TaskState::Cancelled));
        }
    }

    #[test]
    fn happy_path_sequence_is_legal() {
        let path = [
            TaskState::Planning,
            TaskState::Planned,
            TaskState::Approved,
            TaskState::Executing,
            TaskState::Verifying,
            TaskState::Completed,
        ];
        for pair in path.windows(2) {
            assert!(pair[0].can_transition_to(pair[1]), "{:?} -> {:?}", pair[0], pair[1]);
        }
    }

    #[test]
    fn illegal_skip_is_rejected() {
        assert!(!TaskState::Planning.can_transition_to(TaskState::Executing));
        assert!(!TaskState::AwaitingApproval.can_transition_to(TaskState::Completed));
    }

    #[test]
    fn critical_band_without_hitl_violates_invariant() {
        let spec = sample_task(RiskBand::Critical, false);
        assert!(!spec.upholds_critical_hitl_invariant());
    }

    fn all_states() -> [TaskState; 11] {
        [
            TaskState::Planning,
            TaskState::Planned,
            TaskState::AwaitingApproval,
            TaskState::Approved,
            TaskState::Executing,
            TaskState::Verifying,
            TaskState::Completed,
            TaskState::Failed,
            TaskState::Rejected,
            TaskState::Cancelled,
            TaskState::Expired,
        ]
    }

    fn state_strategy() -> impl proptest::strategy::Strategy<Value = TaskState> {
        proptest::sample::select(all_states().to_vec())
    }

    proptest::proptest! {
        #[test]
        fn terminal_states_never_transition_anywhere(from in state_strategy(), to in state_strategy()) {
            if from.is_terminal() {
                proptest::prop_assert!(!from.can_transition_to(to));
            }
        }

        #[test]
        fn cancel_is_legal_from_every_non_terminal_state(from in state_strategy()) {
            proptest::prop_assert_eq!(from.can_transition_to(TaskState::Cancelled), !from.is_terminal());
        }
    }

    fn sample_task(band: RiskBand, requires_hitl: bool) -> TaskSpec {
        TaskSpec {
            task_id: TaskId::new(),
            tenant_id: TenantId::new("acme"),
            created_by: PrincipalId::new("operator-1"),
            created_at: Utc::now(),
            intent: "test".into(),
            environment: "staging".into(),
            context: BTreeMap::new(),
            idempotency_key: None,
            agent_chain: Vec::new(),
            steps: Vec::new(),
            explanation: String::new(),
            estimated_cost: 0.0,
            risk_score: 0.9,
            risk_band: band,
            blast_radius: BlastRadius::default(),
            policy_findings: Vec::new(),
            requires_hitl,
            approvals_required: 0,
            state: TaskState::Planning,
            approvals: Vec::new(),
            step_results: Vec::new(),
            handoffs: Vec::new(),
            error: None,
            llm_tokens_used: 0,
            tool_invocations: 0,
            wallclock_ms: 0,
        }
    }
}
