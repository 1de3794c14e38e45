//! `StreamTask` (§6): a finite sequence of `TransitionEvent`s for one task,
//! replaying history on subscribe and then streaming live events until the
//! task reaches a terminal state, at which point the channel closes and is
//! not restartable (§4.4).

use dashmap::DashMap;
use orch_core::ids::TaskId;
use orch_core::task_spec::TransitionEvent;
use tokio::sync::mpsc;

#[derive(Default)]
pub struct SubscriptionHub {
    subscribers: DashMap<TaskId, Vec<mpsc::UnboundedSender<TransitionEvent>>>,
}

impl SubscriptionHub {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to `task_id`. `history` is replayed immediately; if
    /// `terminal` is true the channel is closed right after replay since
    /// no further events will ever be appended.
    pub fn subscribe(
        &self,
        task_id: TaskId,
        history: Vec<TransitionEvent>,
        terminal: bool,
    ) -> mpsc::UnboundedReceiver<TransitionEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        for event in history {
            let _ = tx.send(event);
        }
        if !terminal {
            self.subscribers.entry(task_id).or_default().push(tx);
        }
        rx
    }

    /// Push a newly appended event to every live subscriber of `task_id`.
    /// Called by the store right after `audit.append`.
    pub fn publish(&self, task_id: TaskId, event: TransitionEvent, terminal: bool) {
        if let Some(mut subs) = self.subscribers.get_mut(&task_id) {
            subs.retain(|tx| tx.send(event.clone()).is_ok());
        }
        if terminal {
            self.subscribers.remove(&task_id);
        }
    }
}
