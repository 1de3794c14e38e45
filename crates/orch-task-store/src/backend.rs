//! Persistence is behind this interface (§4.4): any backend — in-memory
//! here, a relational store in production — must give write-read
//! consistency for a single task and support an exact-version
//! compare-and-swap so the store can serialize mutations per `task_id`
//! without losing concurrent writers to different tasks.

use crate::audit::AuditLog;
use dashmap::DashMap;
use orch_core::ids::{TaskId, TenantId};
use orch_core::task_spec::TaskSpec;
use std::sync::Arc;
use thiserror::Error;

/// A stored task plus its version (for compare-and-swap) and audit trail.
#[derive(Clone)]
pub struct TaskRecord {
    pub spec: TaskSpec,
    pub version: u64,
    pub audit: Arc<parking_lot::Mutex<AuditLog>>,
}

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("task {0} not found")]
    NotFound(TaskId),
    #[error("version conflict for task {0}: expected {expected}, found {found}")]
    VersionConflict { task: TaskId, expected: u64, found: u64 },
}

/// The storage contract the task store drives. In-memory and relational
/// backends both satisfy: write-read consistency for a single task, and
/// at-most-once application of a compare-and-swap at a given version.
pub trait TaskStoreBackend: Send + Sync {
    fn insert(&self, record: TaskRecord) -> Result<(), BackendError>;
    fn get(&self, id: &TaskId) -> Result<TaskRecord, BackendError>;
    fn compare_and_swap(&self, id: &TaskId, expected_version: u64, new_spec: TaskSpec) -> Result<TaskRecord, BackendError>;
    fn list(&self, tenant: &TenantId) -> Vec<TaskRecord>;
    /// All records across every tenant, for cross-tenant sweeps (TTL
    /// expiry). Not part of any per-tenant read path.
    fn all(&self) -> Vec<TaskRecord>;
}

/// Default in-process backend, keyed by `task_id` with one shard per key
/// via `DashMap` (read-mostly after the planning burst, non-blocking for
/// readers of other tasks).
#[derive(Default)]
pub struct InMemoryBackend {
    tasks: DashMap<TaskId, TaskRecord>,
}

impl InMemoryBackend {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl TaskStoreBackend for InMemoryBackend {
    fn insert(&self, record: TaskRecord) -> Result<(), BackendError> {
        self.tasks.insert(record.spec.task_id, record);
        Ok(())
    }

    fn get(&self, id: &TaskId) -> Result<TaskRecord, BackendError> {
        self.tasks.get(id).map(|r| r.clone()).ok_or(BackendError::NotFound(*id))
    }

    fn compare_and_swap(&self, id: &TaskId, expected_version: u64, new_spec: TaskSpec) -> Result<TaskRecord, BackendError> {
        let mut entry = self.tasks.get_mut(id).ok_or(BackendError::NotFound(*id))?;
        if entry.version != expected_version {
            return Err(BackendError::VersionConflict {
                task: *id,
                expected: expected_version,
                found: entry.version,
            });
        }
        entry.spec = new_spec;
        entry.version += 1;
        Ok(entry.clone())
    }

    fn list(&self, tenant: &TenantId) -> Vec<TaskRecord> {
        self.tasks
            .iter()
            .filter(|r| &r.spec.tenant_id == tenant)
            .map(|r| r.clone())
            .collect()
    }

    fn all(&self) -> Vec<TaskRecord> {
        self.tasks.iter().map(|r| r.clone()).collect()
    }
}
