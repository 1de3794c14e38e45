//! Task Store (§4.4): durable `TaskSpec` storage, the authoritative state
//! machine, the hash-chained audit trail, and `StreamTask`'s live
//! subscription fan-out.

#![warn(unreachable_pub)]

mod audit;
mod audit_sink;
mod backend;
mod error;
mod pagination;
mod store;
mod subscribe;

pub use audit::{AuditLog, ChainedTransitionEvent, IntegrityError};
pub use audit_sink::{AuditSink, NoopAuditSink, TracingAuditSink};
pub use backend::{BackendError, InMemoryBackend, TaskRecord, TaskStoreBackend};
pub use error::TaskStoreError;
pub use pagination::{ListFilter, Page, PagedSummaries, TaskSummary};
pub use store::TaskStore;
pub use subscribe::SubscriptionHub;
