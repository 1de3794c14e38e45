//! Hash-chained audit log for a single task's [`TransitionEvent`]s.
//!
//! Grounded in this codebase's event-log pattern: each record commits to
//! the previous record's hash, so tampering with history is externally
//! detectable by re-walking the chain (`verify_integrity`). This
//! strengthens the append-only requirement in §3 without changing what a
//! caller of `AuditSink.Record` (§6) observes.

use orch_core::task_spec::TransitionEvent;
use sha2::{Digest, Sha256};

/// One audit record plus its position and hash-chain linkage.
#[derive(Debug, Clone)]
pub struct ChainedTransitionEvent {
    pub event: TransitionEvent,
    pub sequence: u64,
    pub prev_hash: [u8; 32],
    pub hash: [u8; 32],
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum IntegrityError {
    #[error("audit log for task is broken at sequence {0}")]
    ChainBroken(u64),
}

/// Append-only, hash-chained log of [`TransitionEvent`]s for one task.
#[derive(Debug, Default)]
pub struct AuditLog {
    events: Vec<ChainedTransitionEvent>,
}

impl AuditLog {
    #[must_use]
    pub fn new() -> Self {
        Self { events: Vec::new() }
    }

    pub fn append(&mut self, event: TransitionEvent) -> &ChainedTransitionEvent {
        let prev_hash = self.events.last().map(|e| e.hash).unwrap_or([0u8; 32]);
        let sequence = self.events.len() as u64;
        let hash = compute_hash(&event, sequence, &prev_hash);
        self.events.push(ChainedTransitionEvent {
            event,
            sequence,
            prev_hash,
            hash,
        });
        self.events.last().expect("just pushed")
    }

    #[must_use]
    pub fn events(&self) -> &[ChainedTransitionEvent] {
        &self.events
    }

    /// Walk the chain, recomputing every hash, to detect tampering.
    pub fn verify_integrity(&self) -> Result<(), IntegrityError> {
        let mut prev = [0u8; 32];
        for record in &self.events {
            if record.prev_hash != prev {
                return Err(IntegrityError::ChainBroken(record.sequence));
            }
            let expected = compute_hash(&record.event, record.sequence, &record.prev_hash);
            if record.hash != expected {
                return Err(IntegrityError::ChainBroken(record.sequence));
            }
            prev = record.hash;
        }
        Ok(())
    }
}

fn compute_hash(event: &TransitionEvent, sequence: u64, prev_hash: &[u8; 32]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(event.task_id.to_string().as_bytes());
    hasher.update([0]);
    hasher.update(format!("{:?}", event.from).as_bytes());
    hasher.update([0]);
    hasher.update(format!("{:?}", event.to).as_bytes());
    hasher.update([0]);
    hasher.update(event.at.to_rfc3339().as_bytes());
    hasher.update([0]);
    hasher.update(event.actor.to_string().as_bytes());
    hasher.update([0]);
    hasher.update(event.reason.as_bytes());
    hasher.update([0]);
    hasher.update(sequence.to_le_bytes());
    hasher.update(prev_hash);
    hasher.finalize().into()
}
