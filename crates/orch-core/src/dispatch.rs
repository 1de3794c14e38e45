//! The seam between the Meta-Engine's Route stage and the Execution
//! Coordinator (§4.7 step 7 "Dispatch"). Lives here, rather than in either
//! crate, so neither depends on the other: the Meta-Engine takes an
//! `Arc<dyn TaskDispatcher>` at construction and the Execution Coordinator
//! implements it, wired together only by whatever assembles the
//! orchestrator (§9 "no implicit singletons; all core components receive
//! their collaborators through construction").

use crate::ids::TaskId;
use async_trait::async_trait;

/// Hands a task that has just reached `approved` off for execution.
/// Implementations own how (and whether) the run happens in the
/// background; this call is not expected to block until the task
/// terminates.
#[async_trait]
pub trait TaskDispatcher: Send + Sync {
    async fn dispatch(&self, task_id: TaskId);
}

/// Drops every dispatch request. Useful for composing a Meta-Engine in
/// isolation (e.g. to exercise Classify/Compose/Validate/Store/Route
/// without standing up an Execution Coordinator).
#[derive(Debug, Default)]
pub struct NoopDispatcher;

#[async_trait]
impl TaskDispatcher for NoopDispatcher {
    async fn dispatch(&self, _task_id: TaskId) {}
}
