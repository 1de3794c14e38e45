//! Cost Governor (§4.6): per-tenant sliding-window admission control for
//! concurrent tasks, LLM tokens, and tool invocations.
//!
//! Counters are plain per-tenant atomics guarded by `DashMap` shards (§5:
//! "reads are best-effort, admission is exact via compare-and-update").
//! Windows are fixed (reset wholesale once `window_seconds` elapses since
//! they were opened) rather than a continuously-sliding log — simpler to
//! reason about and sufficient for the boundary guarantees in §8.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use orch_core::ids::TenantId;
use orch_core::quota::{QuotaResource, TenantQuota, UsageCounter};
use parking_lot::Mutex;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
#[error("quota exceeded for {resource}, retry after {retry_after_secs}s")]
pub struct QuotaExceeded {
    pub resource: QuotaResource,
    pub retry_after_secs: u64,
}

struct WindowCounter {
    used: u64,
    window_started_at: DateTime<Utc>,
}

impl WindowCounter {
    fn fresh(now: DateTime<Utc>) -> Self {
        Self {
            used: 0,
            window_started_at: now,
        }
    }

    fn roll_if_expired(&mut self, window_seconds: u64, now: DateTime<Utc>) {
        let elapsed = (now - self.window_started_at).num_seconds().max(0) as u64;
        if elapsed >= window_seconds {
            self.used = 0;
            self.window_started_at = now;
        }
    }

    fn retry_after(&self, window_seconds: u64, now: DateTime<Utc>) -> Duration {
        let elapsed = (now - self.window_started_at).num_seconds().max(0) as u64;
        Duration::from_secs(window_seconds.saturating_sub(elapsed))
    }
}

/// Per-tenant admission control over concurrency, LLM tokens, and tool
/// invocations. One instance is shared (behind an `Arc`) across the
/// Meta-Engine, LLM Gateway, and Execution Coordinator.
pub struct CostGovernor {
    default_quota: TenantQuota,
    quotas: DashMap<TenantId, TenantQuota>,
    concurrent_tasks: DashMap<TenantId, u32>,
    tokens: DashMap<TenantId, Mutex<WindowCounter>>,
    tool_invocations: DashMap<TenantId, Mutex<WindowCounter>>,
}

impl CostGovernor {
    #[must_use]
    pub fn new(default_quota: TenantQuota) -> Self {
        Self {
            default_quota,
            quotas: DashMap::new(),
            concurrent_tasks: DashMap::new(),
            tokens: DashMap::new(),
            tool_invocations: DashMap::new(),
        }
    }

    /// Install a tenant-specific quota, overriding the default.
    pub fn set_tenant_quota(&self, tenant: TenantId, quota: TenantQuota) {
        self.quotas.insert(tenant, quota);
    }

    fn quota_for(&self, tenant: &TenantId) -> TenantQuota {
        self.quotas.get(tenant).map(|q| *q).unwrap_or(self.default_quota)
    }

    /// `AdmitTask(tenant)` — called at `Create` time. Fails with
    /// `QuotaExceeded{resource: concurrent}` if the tenant is already at
    /// its concurrency ceiling.
    pub fn admit_task(&self, tenant: &TenantId) -> Result<(), QuotaExceeded> {
        let quota = self.quota_for(tenant);
        let mut entry = self.concurrent_tasks.entry(tenant.clone()).or_insert(0);
        if *entry >= quota.max_concurrent_tasks {
            return Err(QuotaExceeded {
                resource: QuotaResource::ConcurrentTasks,
                retry_after_secs: 0,
            });
        }
        *entry += 1;
        Ok(())
    }

    /// Release a concurrency slot when a task reaches a terminal state.
    pub fn release_task(&self, tenant: &TenantId) {
        if let Some(mut entry) = self.concurrent_tasks.get_mut(tenant) {
            *entry = entry.saturating_sub(1);
        }
    }

    #[must_use]
    pub fn concurrent_tasks(&self, tenant: &TenantId) -> u32 {
        self.concurrent_tasks.get(tenant).map(|e| *e).unwrap_or(0)
    }

    /// `AdmitLLM(tenant, estimate)` — called before every gateway call.
    /// Reserves `estimate` tokens against the tenant's window; callers that
    /// learn the true usage afterwards should call
    /// [`Self::reconcile_tokens`].
    pub fn admit_llm(&self, tenant: &TenantId, estimate: u64) -> Result<(), QuotaExceeded> {
        self.admit_window(
            tenant,
            &self.tokens,
            estimate,
            self.quota_for(tenant).max_llm_tokens_window,
            self.quota_for(tenant).window_seconds,
            QuotaResource::Tokens,
        )
    }

    /// True up a token reservation once the actual usage is known (the
    /// provider may return more or fewer tokens than estimated).
    pub fn reconcile_tokens(&self, tenant: &TenantId, estimated: u64, actual: u64) {
        if let Some(counter) = self.tokens.get(tenant) {
            let mut counter = counter.lock();
            counter.used = counter.used.saturating_sub(estimated).saturating_add(actual);
        }
    }

    /// `AdmitTool(tenant, tool)` — called before every tool invocation.
    pub fn admit_tool(&self, tenant: &TenantId) -> Result<(), QuotaExceeded> {
        self.admit_window(
            tenant,
            &self.tool_invocations,
            1,
            self.quota_for(tenant).max_tool_invocations_window,
            self.quota_for(tenant).window_seconds,
            QuotaResource::ToolInvocations,
        )
    }

    fn admit_window(
        &self,
        tenant: &TenantId,
        table: &DashMap<TenantId, Mutex<WindowCounter>>,
        amount: u64,
        max: u64,
        window_seconds: u64,
        resource: QuotaResource,
    ) -> Result<(), QuotaExceeded> {
        let now = Utc::now();
        let entry = table
            .entry(tenant.clone())
            .or_insert_with(|| Mutex::new(WindowCounter::fresh(now)));
        let mut counter = entry.lock();
        counter.roll_if_expired(window_seconds, now);
        if counter.used.saturating_add(amount) > max {
            return Err(QuotaExceeded {
                resource,
                retry_after_secs: counter.retry_after(window_seconds, now).as_secs(),
            });
        }
        counter.used += amount;
        Ok(())
    }

    /// Rebuild a tenant's usage counter from persisted state after a
    /// process restart, with a grace of one full window (§4.6): usage from
    /// the snapshot is honored as-is rather than assumed stale.
    pub fn restore_usage(&self, snapshot: UsageCounter) {
        let counter = Mutex::new(WindowCounter {
            used: snapshot.used,
            window_started_at: snapshot.window_started_at,
        });
        match snapshot.resource {
            QuotaResource::Tokens => {
                self.tokens.insert(snapshot.tenant_id, counter);
            }
            QuotaResource::ToolInvocations => {
                self.tool_invocations.insert(snapshot.tenant_id, counter);
            }
            QuotaResource::ConcurrentTasks => {
                // Concurrency isn't windowed; restored separately via
                // `restore_concurrency` since it tracks live task count,
                // not a time-bounded usage rate.
            }
        }
    }

    pub fn restore_concurrency(&self, tenant: TenantId, count: u32) {
        self.concurrent_tasks.insert(tenant, count);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tenant(name: &str) -> TenantId {
        TenantId::new(name)
    }

    fn quota(max_concurrent: u32, max_tokens: u64, max_tools: u64) -> TenantQuota {
        TenantQuota {
            max_concurrent_tasks: max_concurrent,
            max_llm_tokens_window: max_tokens,
            max_tool_invocations_window: max_tools,
            window_seconds: 3600,
        }
    }

    #[test]
    fn admits_up_to_and_denies_at_limit() {
        let gov = CostGovernor::new(quota(2, 1000, 10));
        let t = tenant("acme");
        assert!(gov.admit_task(&t).is_ok());
        assert!(gov.admit_task(&t).is_ok());
        let err = gov.admit_task(&t).unwrap_err();
        assert_eq!(err.resource, QuotaResource::ConcurrentTasks);
    }

    #[test]
    fn limit_minus_one_succeeds_at_limit_fails() {
        let gov = CostGovernor::new(quota(1, 1000, 10));
        let t = tenant("acme");
        assert!(gov.admit_task(&t).is_ok());
        assert!(gov.admit_task(&t).is_err());
    }

    #[test]
    fn release_frees_a_concurrency_slot() {
        let gov = CostGovernor::new(quota(1, 1000, 10));
        let t = tenant("acme");
        gov.admit_task(&t).unwrap();
        assert!(gov.admit_task(&t).is_err());
        gov.release_task(&t);
        assert!(gov.admit_task(&t).is_ok());
    }

    #[test]
    fn token_admission_respects_window_budget() {
        let gov = CostGovernor::new(quota(10, 100, 10));
        let t = tenant("acme");
        assert!(gov.admit_llm(&t, 60).is_ok());
        assert!(gov.admit_llm(&t, 41).is_err());
        assert!(gov.admit_llm(&t, 40).is_ok());
    }

    #[test]
    fn reconcile_lowers_usage_when_actual_is_less_than_estimate() {
        let gov = CostGovernor::new(quota(10, 100, 10));
        let t = tenant("acme");
        gov.admit_llm(&t, 90).unwrap();
        gov.reconcile_tokens(&t, 90, 30);
        assert!(gov.admit_llm(&t, 60).is_ok());
    }

    #[test]
    fn tool_invocation_admission_respects_window_budget() {
        let gov = CostGovernor::new(quota(10, 1000, 2));
        let t = tenant("acme");
        assert!(gov.admit_tool(&t).is_ok());
        assert!(gov.admit_tool(&t).is_ok());
        assert!(gov.admit_tool(&t).is_err());
    }

    #[test]
    fn per_tenant_quota_override_is_independent() {
        let gov = CostGovernor::new(quota(1, 1000, 10));
        gov.set_tenant_quota(tenant("vip"), quota(5, 1000, 10));
        assert!(gov.admit_task(&tenant("vip")).is_ok());
        assert!(gov.admit_task(&tenant("vip")).is_ok());
        assert!(gov.admit_task(&tenant("default")).is_ok());
        assert!(gov.admit_task(&tenant("default")).is_err());
    }
}
