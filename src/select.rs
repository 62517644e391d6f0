//! Selector: deterministic choice of one descriptor from a registry snapshot.
//!
//! Precedence:
//! 1. first host-preferred identity present in the registry
//! 2. first descriptor not flagged default-embedded
//! 3. first registered descriptor

use serde::{Deserialize, Serialize};

use crate::provider::{ProviderDescriptor, ProviderIdentity, ProviderRegistry};

/// Host-supplied ranking on top of the two-tier rule.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionPolicy {
    #[serde(default)]
    pub preferred: Vec<ProviderIdentity>,
    #[serde(default)]
    pub excluded: Vec<ProviderIdentity>,
}

impl SelectionPolicy {
    pub fn preferring(preferred: &[ProviderIdentity]) -> Self {
        Self { preferred: preferred.to_vec(), excluded: Vec::new() }
    }
}

/// `None` tells the caller to present an install prompt.
pub fn select(registry: &ProviderRegistry, preferred: &[ProviderIdentity]) -> Option<ProviderDescriptor> {
    select_with(registry, &SelectionPolicy::preferring(preferred))
}

pub fn select_with(registry: &ProviderRegistry, policy: &SelectionPolicy) -> Option<ProviderDescriptor> {
    let candidates: Vec<&ProviderDescriptor> = registry
        .iter()
        .filter(|d| !policy.excluded.contains(d.identity()))
        .collect();

    policy
        .preferred
        .iter()
        .find_map(|id| candidates.iter().find(|d| d.identity() == id))
        .or_else(|| candidates.iter().find(|d| !d.is_default_embedded()))
        .or_else(|| candidates.first())
        .map(|d| (*d).clone())
}
