//! Bounded-window deduplication for tool invocations carrying an
//! `idempotency_key`.
//!
//! §4.1: "All tools are required to be either idempotent or to accept an
//! `idempotency_key` that the registry deduplicates within a bounded
//! window." Tools marked `idempotent` in their descriptor skip this
//! machinery entirely; everything else is deduplicated here.

use dashmap::DashMap;
use serde_json::Value;
use std::time::{Duration, Instant};

/// Deduplicates invocations keyed by `(tool name, idempotency key)` for a
/// configurable window, returning the first result to any later duplicate.
pub struct IdempotencyWindow {
    window: Duration,
    entries: DashMap<(String, String), (Instant, Value)>,
}

impl IdempotencyWindow {
    #[must_use]
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            entries: DashMap::new(),
        }
    }

    /// Returns the cached result for a prior invocation of `tool` under
    /// `key`, if one was recorded within the window.
    #[must_use]
    pub fn get(&self, tool: &str, key: &str) -> Option<Value> {
        self.prune();
        self.entries
            .get(&(tool.to_string(), key.to_string()))
            .map(|entry| entry.value().1.clone())
    }

    /// Record the result of an invocation for later deduplication.
    pub fn record(&self, tool: &str, key: &str, result: Value) {
        self.entries
            .insert((tool.to_string(), key.to_string()), (Instant::now(), result));
    }

    fn prune(&self) {
        let window = self.window;
        self.entries.retain(|_, (recorded_at, _)| recorded_at.elapsed() < window);
    }
}

impl Default for IdempotencyWindow {
    fn default() -> Self {
        Self::new(Duration::from_secs(600))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn duplicate_key_returns_first_result() {
        let window = IdempotencyWindow::new(Duration::from_secs(60));
        assert!(window.get("patch", "key-1").is_none());
        window.record("patch", "key-1", json!({"ok": true}));
        assert_eq!(window.get("patch", "key-1"), Some(json!({"ok": true})));
    }

    #[test]
    fn different_tools_do_not_collide_on_same_key() {
        let window = IdempotencyWindow::new(Duration::from_secs(60));
        window.record("patch", "key-1", json!(1));
        assert!(window.get("drift-scan", "key-1").is_none());
    }

    #[test]
    fn expired_entries_are_pruned() {
        let window = IdempotencyWindow::new(Duration::from_millis(1));
        window.record("patch", "key-1", json!(1));
        std::thread::sleep(Duration::from_millis(5));
        assert!(window.get("patch", "key-1").is_none());
    }
}
