//! The error taxonomy surfaced to callers of the orchestrator (§7), plus the
//! diagnostic context attached to `Internal` errors before they are paged.

use crate::ids::TaskId;
use crate::quota::QuotaResource;
use crate::task_spec::{PolicyFinding, TransitionEvent};
use std::time::Duration;
use thiserror::Error;

/// The outer error taxonomy every component's error converts into.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// The intent could not be classified into any capability tag.
    #[error("could not classify intent: {reason}")]
    InvalidIntent { reason: String },

    /// A validation stage vetoed the plan.
    #[error("validation failed: {} finding(s)", .findings.len())]
    ValidationFailed { findings: Vec<PolicyFinding> },

    /// Admission was refused by the cost governor.
    #[error("quota exceeded for {resource}, retry after {retry_after:?}")]
    QuotaExceeded {
        resource: QuotaResource,
        retry_after: Duration,
    },

    /// The calling principal lacks the role required for the action.
    #[error("principal not authorized for this action")]
    NotAuthorized,

    /// No task exists with the given id.
    #[error("task {0} not found")]
    NotFound(TaskId),

    /// The requested action is not legal in the task's current state.
    #[error("illegal transition requested for task {0}")]
    Conflict(TaskId),

    /// A consumed external interface was unreachable after retries.
    #[error("upstream unavailable: {which}")]
    UpstreamUnavailable { which: &'static str },

    /// An internal invariant was violated; pages and logs with context.
    #[error("internal invariant violated: {diagnostic}")]
    Internal { diagnostic: Box<Diagnostic> },
}

impl OrchestratorError {
    /// Build an `Internal` error carrying the offending transition event.
    #[must_use]
    pub fn internal(summary: impl Into<String>) -> Self {
        Self::Internal {
            diagnostic: Box::new(Diagnostic::new(summary)),
        }
    }

    /// Attach the `TransitionEvent` that exposed the invariant breach.
    #[must_use]
    pub fn with_violating_event(mut self, event: TransitionEvent) -> Self {
        if let Self::Internal { diagnostic } = &mut self {
            diagnostic.violating_event = Some(Box::new(event));
        }
        self
    }

    /// Attach a human-readable suggested fix, when one is known.
    #[must_use]
    pub fn with_suggested_fix(mut self, fix: impl Into<String>) -> Self {
        if let Self::Internal { diagnostic } = &mut self {
            diagnostic.suggested_fix = Some(fix.into());
        }
        self
    }
}

/// Context attached to an `Internal` error: what broke, and — if known — how
/// to fix it. Mirrors the `Diagnostic`/`SuggestedFix` pattern used elsewhere
/// in this codebase for surfacing actionable operator-facing detail.
#[derive(Debug)]
pub struct Diagnostic {
    pub summary: String,
    pub violating_event: Option<Box<TransitionEvent>>,
    pub suggested_fix: Option<String>,
}

impl Diagnostic {
    #[must_use]
    pub fn new(summary: impl Into<String>) -> Self {
        Self {
            summary: summary.into(),
            violating_event: None,
            suggested_fix: None,
        }
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.summary)?;
        if let Some(fix) = &self.suggested_fix {
            write!(f, " (suggested fix: {fix})")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn internal_error_carries_diagnostic_context() {
        let err = OrchestratorError::internal("two terminal states observed")
            .with_suggested_fix("replay the audit log and reconcile");
        let msg = err.to_string();
        assert!(msg.contains("two terminal states"));
        assert!(msg.contains("suggested fix"));
    }

    #[test]
    fn quota_exceeded_displays_resource() {
        let err = OrchestratorError::QuotaExceeded {
            resource: QuotaResource::Tokens,
            retry_after: Duration::from_secs(30),
        };
        assert!(err.to_string().contains("tokens"));
    }
}
