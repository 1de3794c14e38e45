//! Errors surfaced by the task store (a subset of §7's taxonomy).

use orch_core::ids::TaskId;
use orch_cost_governor::QuotaExceeded;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TaskStoreError {
    #[error("task {0} not found")]
    NotFound(TaskId),
    #[error("illegal transition requested for task {0}")]
    Conflict(TaskId),
    #[error(transparent)]
    QuotaExceeded(#[from] QuotaExceeded),
    #[error("task store backend error: {0}")]
    Backend(String),
}
