//! Immutable descriptors for registered agents and tools.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Closed set of capability tags used for agent routing and intent classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum CapabilityTag {
    Drift,
    Patch,
    Compliance,
    Incident,
    Cost,
    Dr,
    CertRotation,
    SbomRemediation,
}

impl CapabilityTag {
    /// All tags, in the fixed order used for deterministic tie-breaking.
    #[must_use]
    pub const fn all() -> &'static [CapabilityTag] {
        &[
            CapabilityTag::Drift,
            CapabilityTag::Patch,
            CapabilityTag::Compliance,
            CapabilityTag::Incident,
            CapabilityTag::Cost,
            CapabilityTag::Dr,
            CapabilityTag::CertRotation,
            CapabilityTag::SbomRemediation,
        ]
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            CapabilityTag::Drift => "drift",
            CapabilityTag::Patch => "patch",
            CapabilityTag::Compliance => "compliance",
            CapabilityTag::Incident => "incident",
            CapabilityTag::Cost => "cost",
            CapabilityTag::Dr => "dr",
            CapabilityTag::CertRotation => "cert-rotation",
            CapabilityTag::SbomRemediation => "sbom-remediation",
        }
    }
}

impl std::fmt::Display for CapabilityTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Side-effect classification of a tool invocation, used by the validation
/// pipeline and the execution coordinator to decide on approval and
/// verification-checkpoint requirements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SideEffectClass {
    /// Read-only; safe to invoke without restriction.
    Read,
    /// Mutates resources owned by a single tenant.
    MutateTenant,
    /// Mutates shared fleet-wide resources; the highest-impact class.
    MutateFleet,
}

/// Registered specialist agent. Immutable once registered.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentDescriptor {
    pub name: String,
    pub version: u32,
    pub capabilities: BTreeSet<CapabilityTag>,
    pub required_tools: BTreeSet<String>,
    /// JSON schema (as a `serde_json::Value`) describing the agent's sub-task input.
    pub input_schema: serde_json::Value,
    /// JSON schema describing the agent's proposed-steps output.
    pub output_schema: serde_json::Value,
}

impl AgentDescriptor {
    #[must_use]
    pub fn handles(&self, tag: CapabilityTag) -> bool {
        self.capabilities.contains(&tag)
    }
}

/// Registered tool capability. Immutable once registered.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDescriptor {
    pub name: String,
    pub version: u32,
    pub category: String,
    pub required_permissions: BTreeSet<String>,
    pub input_schema: serde_json::Value,
    pub output_schema: serde_json::Value,
    pub idempotent: bool,
    pub side_effect_class: SideEffectClass,
    /// Rough relative cost unit, used for estimated-cost annotation.
    pub cost_hint: f64,
}

impl ToolDescriptor {
    #[must_use]
    pub fn key(&self) -> (String, u32) {
        (self.name.clone(), self.version)
    }
}
