//! Execution Coordinator (§4.8): drives the `executing`/`verifying`
//! portion of a task's lifecycle — grouping steps by `parallel_group`,
//! routing `mutate-fleet` steps through a `JobRunner`, and running
//! post-execution verification checkpoints.

#![warn(unreachable_pub)]

mod coordinator;
mod error;
mod job_runner;

pub use coordinator::{ExecutionCoordinator, ExecutionCoordinatorConfig};
pub use error::ExecutionError;
pub use job_runner::{InMemoryJobRunner, JobDescriptor, JobRunner, JobRunnerError, JobStatus};
