//! The process-wide tool directory (§4.1).

use crate::idempotency::IdempotencyWindow;
use crate::schema;
use async_trait::async_trait;
use orch_core::descriptors::{SideEffectClass, ToolDescriptor};
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Context a caller attaches to an invocation: its granted permissions and
/// enough of the owning task's state to enforce the production
/// `mutate-fleet` approval gate.
#[derive(Debug, Clone, Default)]
pub struct InvocationContext {
    pub environment: String,
    pub granted_permissions: BTreeSet<String>,
    /// Whether the owning `TaskSpec` already carries a recorded approval.
    pub task_has_approvals: bool,
    pub idempotency_key: Option<String>,
}

/// Errors raised while registering or invoking a tool.
#[derive(Debug, Error)]
pub enum ToolRegistryError {
    #[error("tool `{0}` is already registered at version {1}")]
    AlreadyRegistered(String, u32),
    #[error("no tool named `{0}` is registered")]
    NotFound(String),
    #[error("tool `{0}` has no version {1}")]
    VersionNotFound(String, u32),
    #[error("caller lacks required permission(s) {0:?} for tool `{1}`")]
    AccessDenied(Vec<String>, String),
    #[error("mutate-fleet tool `{0}` cannot run against production without an attached approval")]
    ProductionMutateFleetRequiresApproval(String),
    #[error("invocation arguments do not conform to `{tool}`'s input schema: {source}")]
    InvalidInput {
        tool: String,
        #[source]
        source: schema::SchemaError,
    },
    #[error("result from `{tool}` does not conform to its output schema: {source}")]
    InvalidOutput {
        tool: String,
        #[source]
        source: schema::SchemaError,
    },
    #[error("tool `{0}` handler failed: {1}")]
    HandlerFailed(String, String),
}

/// A tool's typed, async invocation behavior. Implementors perform the
/// actual side effect (or read); the registry is responsible for
/// permission checks, schema validation, and idempotency, not handler
/// bodies.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    async fn call(&self, args: Value) -> Result<Value, String>;
}

/// A handler built from a plain closure, for tools whose body is a short
/// synchronous-looking async block rather than a dedicated type.
pub struct FnHandler<F>(pub F);

#[async_trait]
impl<F, Fut> ToolHandler for FnHandler<F>
where
    F: Fn(Value) -> Fut + Send + Sync,
    Fut: std::future::Future<Output = Result<Value, String>> + Send,
{
    async fn call(&self, args: Value) -> Result<Value, String> {
        (self.0)(args).await
    }
}

struct Registration {
    descriptor: ToolDescriptor,
    handler: Arc<dyn ToolHandler>,
}

/// Process-wide, read-mostly catalog of [`ToolDescriptor`]s and their
/// invocation handlers, keyed by `(name, version)`. Registration happens
/// once at startup; after that, lookups and invocations never block on a
/// writer (registration uses a `RwLock` but the steady-state path only
/// ever takes read locks).
pub struct ToolRegistry {
    tools: RwLock<BTreeMap<(String, u32), Registration>>,
    dedup: IdempotencyWindow,
}

impl ToolRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self {
            tools: RwLock::new(BTreeMap::new()),
            dedup: IdempotencyWindow::new(Duration::from_secs(600)),
        }
    }

    #[must_use]
    pub fn with_dedup_window(window: Duration) -> Self {
        Self {
            tools: RwLock::new(BTreeMap::new()),
            dedup: IdempotencyWindow::new(window),
        }
    }

    /// Register a tool descriptor with its invocation handler. Descriptors
    /// are immutable once registered: re-registering the same
    /// `(name, version)` pair is an error.
    pub fn register(
        &self,
        descriptor: ToolDescriptor,
        handler: Arc<dyn ToolHandler>,
    ) -> Result<(), ToolRegistryError> {
        let key = descriptor.key();
        let mut tools = self.tools.write();
        if tools.contains_key(&key) {
            return Err(ToolRegistryError::AlreadyRegistered(key.0, key.1));
        }
        tools.insert(key, Registration { descriptor, handler });
        Ok(())
    }

    /// Look up the highest-versioned descriptor registered under `name`.
    #[must_use]
    pub fn lookup(&self, name: &str) -> Option<ToolDescriptor> {
        self.tools
            .read()
            .iter()
            .filter(|((n, _), _)| n == name)
            .map(|(_, reg)| reg.descriptor.clone())
            .max_by_key(|d| d.version)
    }

    /// Look up an exact `(name, version)` descriptor.
    #[must_use]
    pub fn lookup_version(&self, name: &str, version: u32) -> Option<ToolDescriptor> {
        self.tools
            .read()
            .get(&(name.to_string(), version))
            .map(|reg| reg.descriptor.clone())
    }

    /// All registered descriptors, for `ListTools()` (§6).
    #[must_use]
    pub fn list(&self) -> Vec<ToolDescriptor> {
        self.tools.read().values().map(|r| r.descriptor.clone()).collect()
    }

    /// Invoke `name` at its latest registered version.
    pub async fn invoke(
        &self,
        name: &str,
        args: Value,
        ctx: &InvocationContext,
    ) -> Result<Value, ToolRegistryError> {
        let descriptor = self
            .lookup(name)
            .ok_or_else(|| ToolRegistryError::NotFound(name.to_string()))?;
        self.invoke_version(&descriptor, args, ctx).await
    }

    async fn invoke_version(
        &self,
        descriptor: &ToolDescriptor,
        args: Value,
        ctx: &InvocationContext,
    ) -> Result<Value, ToolRegistryError> {
        let missing: Vec<String> = descriptor
            .required_permissions
            .iter()
            .filter(|p| !ctx.granted_permissions.contains(*p))
            .cloned()
            .collect();
        if !missing.is_empty() {
            return Err(ToolRegistryError::AccessDenied(missing, descriptor.name.clone()));
        }

        if descriptor.side_effect_class == SideEffectClass::MutateFleet
            && ctx.environment.eq_ignore_ascii_case("production")
            && !ctx.task_has_approvals
        {
            return Err(ToolRegistryError::ProductionMutateFleetRequiresApproval(
                descriptor.name.clone(),
            ));
        }

        schema::validate(&args, &descriptor.input_schema).map_err(|source| ToolRegistryError::InvalidInput {
            tool: descriptor.name.clone(),
            source,
        })?;

        if !descriptor.idempotent {
            if let Some(key) = &ctx.idempotency_key {
                if let Some(cached) = self.dedup.get(&descriptor.name, key) {
                    return Ok(cached);
                }
            }
        }

        let handler = {
            let tools = self.tools.read();
            tools
                .get(&descriptor.key())
                .map(|reg| Arc::clone(&reg.handler))
                .ok_or_else(|| ToolRegistryError::VersionNotFound(descriptor.name.clone(), descriptor.version))?
        };

        let result = handler
            .call(args)
            .await
            .map_err(|e| ToolRegistryError::HandlerFailed(descriptor.name.clone(), e))?;

        schema::validate(&result, &descriptor.output_schema).map_err(|source| ToolRegistryError::InvalidOutput {
            tool: descriptor.name.clone(),
            source,
        })?;

        if !descriptor.idempotent {
            if let Some(key) = &ctx.idempotency_key {
                self.dedup.record(&descriptor.name, key, result.clone());
            }
        }

        Ok(result)
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use orch_core::descriptors::SideEffectClass;
    use serde_json::json;
    use std::collections::BTreeSet;

    fn read_only_descriptor(name: &str) -> ToolDescriptor {
        ToolDescriptor {
            name: name.to_string(),
            version: 1,
            category: "drift".to_string(),
            required_permissions: BTreeSet::new(),
            input_schema: json!({}),
            output_schema: json!({}),
            idempotent: true,
            side_effect_class: SideEffectClass::Read,
            cost_hint: 1.0,
        }
    }

    fn mutate_fleet_descriptor(name: &str) -> ToolDescriptor {
        ToolDescriptor {
            side_effect_class: SideEffectClass::MutateFleet,
            idempotent: false,
            ..read_only_descriptor(name)
        }
    }

    #[tokio::test]
    async fn invokes_registered_tool() {
        let registry = ToolRegistry::new();
        registry
            .register(
                read_only_descriptor("drift-scan"),
                Arc::new(FnHandler(|args: Value| async move { Ok(args) })),
            )
            .unwrap();
        let out = registry
            .invoke("drift-scan", json!({"x": 1}), &InvocationContext::default())
            .await
            .unwrap();
        assert_eq!(out, json!({"x": 1}));
    }

    #[tokio::test]
    async fn missing_tool_fails_with_not_found() {
        let registry = ToolRegistry::new();
        let err = registry
            .invoke("missing", json!({}), &InvocationContext::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ToolRegistryError::NotFound(_)));
    }

    #[tokio::test]
    async fn access_denied_without_required_permission() {
        let mut descriptor = read_only_descriptor("rotate-cert");
        descriptor.required_permissions.insert("cert:write".to_string());
        let registry = ToolRegistry::new();
        registry
            .register(descriptor, Arc::new(FnHandler(|a: Value| async move { Ok(a) })))
            .unwrap();
        let err = registry
            .invoke("rotate-cert", json!({}), &InvocationContext::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ToolRegistryError::AccessDenied(_, _)));
    }

    #[tokio::test]
    async fn mutate_fleet_blocked_in_production_without_approval() {
        let registry = ToolRegistry::new();
        registry
            .register(
                mutate_fleet_descriptor("patch-fleet"),
                Arc::new(FnHandler(|a: Value| async move { Ok(a) })),
            )
            .unwrap();
        let ctx = InvocationContext {
            environment: "production".to_string(),
            task_has_approvals: false,
            ..Default::default()
        };
        let err = registry.invoke("patch-fleet", json!({}), &ctx).await.unwrap_err();
        assert!(matches!(
            err,
            ToolRegistryError::ProductionMutateFleetRequiresApproval(_)
        ));
    }

    #[tokio::test]
    async fn mutate_fleet_allowed_in_production_with_approval() {
        let registry = ToolRegistry::new();
        registry
            .register(
                mutate_fleet_descriptor("patch-fleet"),
                Arc::new(FnHandler(|a: Value| async move { Ok(a) })),
            )
            .unwrap();
        let ctx = InvocationContext {
            environment: "production".to_string(),
            task_has_approvals: true,
            idempotency_key: Some("patch-run-1".to_string()),
            ..Default::default()
        };
        assert!(registry.invoke("patch-fleet", json!({}), &ctx).await.is_ok());
    }

    #[tokio::test]
    async fn non_idempotent_tool_dedupes_within_window() {
        use std::sync::atomic::{AtomicU32, Ordering};
        let calls = Arc::new(AtomicU32::new(0));
        let calls_clone = Arc::clone(&calls);
        let registry = ToolRegistry::new();
        registry
            .register(
                mutate_fleet_descriptor("cordon-node"),
                Arc::new(FnHandler(move |a: Value| {
                    let calls = Arc::clone(&calls_clone);
                    async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        Ok(a)
                    }
                })),
            )
            .unwrap();
        let ctx = InvocationContext {
            environment: "staging".to_string(),
            idempotency_key: Some("dedup-key".to_string()),
            ..Default::default()
        };
        registry.invoke("cordon-node", json!({}), &ctx).await.unwrap();
        registry.invoke("cordon-node", json!({}), &ctx).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn lookup_returns_highest_version() {
        let registry = ToolRegistry::new();
        registry
            .register(
                read_only_descriptor("drift-scan"),
                Arc::new(FnHandler(|a: Value| async move { Ok(a) })),
            )
            .unwrap();
        let mut v2 = read_only_descriptor("drift-scan");
        v2.version = 2;
        registry
            .register(v2, Arc::new(FnHandler(|a: Value| async move { Ok(a) })))
            .unwrap();
        assert_eq!(registry.lookup("drift-scan").unwrap().version, 2);
    }

    #[test]
    fn reregistering_same_version_is_rejected() {
        let registry = ToolRegistry::new();
        registry
            .register(
                read_only_descriptor("drift-scan"),
                Arc::new(FnHandler(|a: Value| async move { Ok(a) })),
            )
            .unwrap();
        let err = registry
            .register(
                read_only_descriptor("drift-scan"),
                Arc::new(FnHandler(|a: Value| async move { Ok(a) })),
            )
            .unwrap_err();
        assert!(matches!(err, ToolRegistryError::AlreadyRegistered(_, _)));
    }
}
