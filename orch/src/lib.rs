//! End-to-end assembly of the AI Orchestrator's core components, wired
//! against in-memory stand-ins for the capability interfaces (§6) that
//! would otherwise reach out to a real identity provider or CMDB.
//! Consumed by the `orch-daemon` binary; kept as a library so the
//! assembly itself stays testable without a process boundary.

pub mod bootstrap;
pub mod fakes;

pub use bootstrap::{bootstrap, Orchestrator};
