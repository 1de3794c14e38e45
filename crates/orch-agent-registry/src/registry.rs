//! The agent directory and capability-tag selection strategy.

use orch_core::descriptors::{AgentDescriptor, CapabilityTag};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AgentRegistryError {
    #[error("agent `{0}` is already registered at version {1}")]
    AlreadyRegistered(String, u32),
    #[error("no agent registered handles capability `{0}`")]
    NoAgentForCapability(CapabilityTag),
    #[error("no agent named `{0}` is registered")]
    NotFound(String),
}

/// Process-wide, read-mostly catalog of [`AgentDescriptor`]s. Registration
/// happens once at startup (§5); routing reads never block on a writer in
/// steady state.
pub struct AgentRegistry {
    agents: RwLock<BTreeMap<(String, u32), AgentDescriptor>>,
}

impl AgentRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self {
            agents: RwLock::new(BTreeMap::new()),
        }
    }

    /// Register an agent descriptor. Descriptors are immutable once
    /// registered: re-registering the same `(name, version)` is an error.
    pub fn register(&self, descriptor: AgentDescriptor) -> Result<(), AgentRegistryError> {
        let key = (descriptor.name.clone(), descriptor.version);
        let mut agents = self.agents.write();
        if agents.contains_key(&key) {
            return Err(AgentRegistryError::AlreadyRegistered(key.0, key.1));
        }
        agents.insert(key, descriptor);
        Ok(())
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<AgentDescriptor> {
        self.agents
            .read()
            .iter()
            .filter(|((n, _), _)| n == name)
            .map(|(_, d)| d.clone())
            .max_by_key(|d| d.version)
    }

    /// All registered descriptors, for `ListAgents()` (§6); highest version
    /// per name only, matching what routing would actually select.
    #[must_use]
    pub fn list(&self) -> Vec<AgentDescriptor> {
        let mut by_name: BTreeMap<String, AgentDescriptor> = BTreeMap::new();
        for descriptor in self.agents.read().values() {
            by_name
                .entry(descriptor.name.clone())
                .and_modify(|existing| {
                    if descriptor.version > existing.version {
                        *existing = descriptor.clone();
                    }
                })
                .or_insert_with(|| descriptor.clone());
        }
        by_name.into_values().collect()
    }

    /// Select the agent that handles `tag`, exact tag match with a
    /// tie-break on highest `version` (§4.2).
    pub fn select_for(&self, tag: CapabilityTag) -> Result<AgentDescriptor, AgentRegistryError> {
        self.agents
            .read()
            .values()
            .filter(|d| d.handles(tag))
            .max_by_key(|d| d.version)
            .cloned()
            .ok_or(AgentRegistryError::NoAgentForCapability(tag))
    }

    /// Select one agent per tag, in the deterministic order the tags were
    /// given (the Meta-Engine classifier produces an ordered tag list;
    /// §4.7 resolves ties by that fixed order).
    pub fn select_chain(&self, tags: &[CapabilityTag]) -> Result<Vec<AgentDescriptor>, AgentRegistryError> {
        tags.iter().map(|tag| self.select_for(*tag)).collect()
    }
}

impl Default for AgentRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::BTreeSet;

    fn descriptor(name: &str, version: u32, tags: &[CapabilityTag]) -> AgentDescriptor {
        AgentDescriptor {
            name: name.to_string(),
            version,
            capabilities: tags.iter().copied().collect::<BTreeSet<_>>(),
            required_tools: BTreeSet::new(),
            input_schema: json!({}),
            output_schema: json!({}),
        }
    }

    #[test]
    fn selects_highest_version_on_tie() {
        let registry = AgentRegistry::new();
        registry
            .register(descriptor("drift-agent", 1, &[CapabilityTag::Drift]))
            .unwrap();
        registry
            .register(descriptor("drift-agent", 2, &[CapabilityTag::Drift]))
            .unwrap();
        assert_eq!(registry.select_for(CapabilityTag::Drift).unwrap().version, 2);
    }

    #[test]
    fn missing_capability_errors() {
        let registry = AgentRegistry::new();
        let err = registry.select_for(CapabilityTag::Dr).unwrap_err();
        assert!(matches!(err, AgentRegistryError::NoAgentForCapability(CapabilityTag::Dr)));
    }

    #[test]
    fn select_chain_preserves_tag_order() {
        let registry = AgentRegistry::new();
        registry
            .register(descriptor("patch-agent", 1, &[CapabilityTag::Patch]))
            .unwrap();
        registry
            .register(descriptor("compliance-agent", 1, &[CapabilityTag::Compliance]))
            .unwrap();
        let chain = registry
            .select_chain(&[CapabilityTag::Compliance, CapabilityTag::Patch])
            .unwrap();
        assert_eq!(chain[0].name, "compliance-agent");
        assert_eq!(chain[1].name, "patch-agent");
    }

    #[test]
    fn reregistering_same_version_is_rejected() {
        let registry = AgentRegistry::new();
        registry
            .register(descriptor("drift-agent", 1, &[CapabilityTag::Drift]))
            .unwrap();
        let err = registry
            .register(descriptor("drift-agent", 1, &[CapabilityTag::Drift]))
            .unwrap_err();
        assert!(matches!(err, AgentRegistryError::AlreadyRegistered(_, _)));
    }
}
