//! Tool Registry (§4.1): a process-wide directory of [`ToolDescriptor`]s
//! keyed by `{name, version}`, exposing registration, lookup, and
//! permission- and schema-checked invocation.
//!
//! Registries are read-mostly, write-at-startup (§5): once the fleet's
//! tool set is registered, `invoke` never takes a write lock.

#![warn(unreachable_pub)]

mod idempotency;
mod registry;
pub mod schema;

pub use orch_core::descriptors::{SideEffectClass, ToolDescriptor};
pub use registry::{FnHandler, InvocationContext, ToolHandler, ToolRegistry, ToolRegistryError};
