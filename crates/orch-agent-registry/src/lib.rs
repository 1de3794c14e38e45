//! Agent Registry (§4.2): the directory of registered [`AgentDescriptor`]s
//! and the tag-based selection strategy the Meta-Engine's Compose stage
//! uses to build an agent chain from a set of capability tags.

#![warn(unreachable_pub)]

mod registry;

pub use orch_core::descriptors::{AgentDescriptor, CapabilityTag};
pub use registry::{AgentRegistry, AgentRegistryError};
