//! Shared types, error taxonomy, and configuration for the AI Orchestrator
//! (§3 Data Model, §6 Configuration, §7 Error Handling).
//!
//! Every other workspace crate depends on this one for the vocabulary they
//! agree on — `TaskSpec`, the capability/tool descriptors, ids, and the
//! error taxonomy — without depending on each other.

#![warn(unreachable_pub)]

pub mod config;
pub mod descriptors;
pub mod dispatch;
pub mod error;
pub mod ids;
pub mod quota;
pub mod task_spec;

pub use dispatch::{NoopDispatcher, TaskDispatcher};
pub use error::OrchestratorError;
