//! Errors surfaced while driving a task through `executing`/`verifying`.

use crate::job_runner::JobRunnerError;
use orch_cost_governor::QuotaExceeded;
use orch_task_store::TaskStoreError;
use orch_tool_registry::ToolRegistryError;
use orch_validation_pipeline::ValidationError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("step {step_index} timed out")]
    StepTimedOut { step_index: usize },

    #[error("tool invocation failed for step {step_index}: {source}")]
    ToolInvocation {
        step_index: usize,
        #[source]
        source: ToolRegistryError,
    },

    #[error("post-execution verification failed for step {step_index}: {source}")]
    VerificationFailed {
        step_index: usize,
        #[source]
        source: ToolRegistryError,
    },

    #[error(transparent)]
    JobRunner(#[from] JobRunnerError),

    #[error(transparent)]
    Quota(#[from] QuotaExceeded),

    #[error(transparent)]
    Store(#[from] TaskStoreError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("task was cancelled before step {step_index}")]
    Cancelled { step_index: usize },
}
