//! `AuditSink.Record(event)` (§6): the external interface that receives
//! every `TransitionEvent` as it is committed. The task store's own
//! hash-chained [`crate::audit::AuditLog`] is the durable record of
//! truth; this is a fan-out notification for whatever external system
//! (SIEM, compliance export, log aggregator) wants a live copy.

use async_trait::async_trait;
use orch_core::task_spec::TransitionEvent;

/// Receives a copy of every committed `TransitionEvent`, in commit order,
/// for one task at a time (no cross-task ordering is promised, matching
/// §5's "across tasks, no global ordering").
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn record(&self, event: &TransitionEvent);
}

/// Default sink: drops events. Installed when no external audit
/// destination is configured so the task store never blocks on one.
#[derive(Debug, Default)]
pub struct NoopAuditSink;

#[async_trait]
impl AuditSink for NoopAuditSink {
    async fn record(&self, _event: &TransitionEvent) {}
}

/// Forwards every event to `tracing`, at `info` level with the
/// transition's core fields as structured fields. Useful as a default
/// when no dedicated audit backend is wired up but the events should
/// still show up in the process's own logs.
#[derive(Debug, Default)]
pub struct TracingAuditSink;

#[async_trait]
impl AuditSink for TracingAuditSink {
    async fn record(&self, event: &TransitionEvent) {
        tracing::info!(
            task_id = %event.task_id,
            from = ?event.from,
            to = ?event.to,
            actor = %event.actor,
            reason = %event.reason,
            "audit: transition recorded"
        );
    }
}
