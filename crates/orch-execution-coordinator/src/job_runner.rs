//! `JobRunner.Dispatch`/`JobRunner.Status` (§6): the interface long-running
//! `mutate-fleet` work is handed off to so the coordinator never blocks a
//! worker on it.

use async_trait::async_trait;
use orch_core::ids::TenantId;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Mutex;
use thiserror::Error;

/// What a handed-off job is meant to do; opaque to the `JobRunner`, which
/// only needs enough to route and report on it.
#[derive(Debug, Clone)]
pub struct JobDescriptor {
    pub tool: String,
    pub arguments: Value,
}

/// Terminal and non-terminal states a handed-off job can report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobStatus {
    Pending,
    Running,
    Succeeded,
    Failed { message: String },
}

impl JobStatus {
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Succeeded | JobStatus::Failed { .. })
    }
}

#[derive(Debug, Error)]
pub enum JobRunnerError {
    #[error("job runner unreachable: {0}")]
    Unavailable(String),
    #[error("no job `{0}` is known to this runner")]
    NotFound(String),
}

/// External system that actually carries out long-running `mutate-fleet`
/// operations (patch campaigns, failovers, rotations) the core cannot
/// perform inline.
#[async_trait]
pub trait JobRunner: Send + Sync {
    async fn dispatch(&self, tenant: &TenantId, job: JobDescriptor) -> Result<String, JobRunnerError>;
    async fn status(&self, job_id: &str) -> Result<JobStatus, JobRunnerError>;
}

/// Deterministic fake that completes every job it dispatches immediately
/// with `Succeeded`, unless a job id has been scripted to fail via
/// [`InMemoryJobRunner::fail_next`]. Used in place of a real fleet
/// automation backend for tests and `dev_mode`.
#[derive(Default)]
pub struct InMemoryJobRunner {
    jobs: Mutex<HashMap<String, JobStatus>>,
    next_should_fail: Mutex<bool>,
}

impl InMemoryJobRunner {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The next job dispatched reports `Failed` instead of `Succeeded`.
    pub fn fail_next(&self) {
        *self.next_should_fail.lock().expect("job runner mutex poisoned") = true;
    }
}

#[async_trait]
impl JobRunner for InMemoryJobRunner {
    async fn dispatch(&self, _tenant: &TenantId, job: JobDescriptor) -> Result<String, JobRunnerError> {
        let job_id = format!("job-{}", ulid::Ulid::new());
        let mut should_fail = self.next_should_fail.lock().expect("job runner mutex poisoned");
        let status = if *should_fail {
            *should_fail = false;
            JobStatus::Failed {
                message: format!("simulated failure running `{}`", job.tool),
            }
        } else {
            JobStatus::Succeeded
        };
        self.jobs.lock().expect("job runner mutex poisoned").insert(job_id.clone(), status);
        Ok(job_id)
    }

    async fn status(&self, job_id: &str) -> Result<JobStatus, JobRunnerError> {
        self.jobs
            .lock()
            .expect("job runner mutex poisoned")
            .get(job_id)
            .cloned()
            .ok_or_else(|| JobRunnerError::NotFound(job_id.to_string()))
    }
}
