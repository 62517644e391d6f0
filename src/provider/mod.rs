//! Injected providers: the environment seam, capability flags, descriptors.
//!
//! # Architecture
//!
//! ```text
//! Environment (window globals / scripted fixture)
//!     │
//!     └── InjectedRoot { source: "ethereum" | "injectedWeb3.<name>", handle }
//!             │
//!             ├── handle.providers() empty  → one descriptor
//!             └── handle.providers() = [a, b, ...] → one descriptor per member
//!                                                        │
//!                                                        ▼
//!                                             ProviderRegistry (one pass)
//! ```
//!
//! Descriptors expose plain data. The handle stays crate-private and is only
//! used by the connection orchestrator.

mod known;

pub use known::{classify, default_catalog, probe_flags, Classification, KnownWallet, DEFAULT_EMBEDDED_FLAG};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;
use std::fmt;
use std::rc::Rc;

use crate::error::ProviderError;

/// Prompting account access (`eth_requestAccounts`).
pub const REQUEST_ACCOUNTS: &str = "eth_requestAccounts";
/// Silent account listing (`eth_accounts`).
pub const LIST_ACCOUNTS: &str = "eth_accounts";

/// Root key for `window.ethereum`.
pub const ETHEREUM_SOURCE: &str = "ethereum";

/// Root key for an entry of `window.injectedWeb3`.
pub fn injected_web3_source(name: &str) -> String {
    format!("injectedWeb3.{}", name)
}

/// An environment-injected wallet object.
#[async_trait(?Send)]
pub trait InjectedProvider {
    /// Self-declared boolean properties (`isMetaMask`, `isBraveWallet`, ...).
    fn flags(&self) -> CapabilityFlags;

    /// Competing handles exposed by an umbrella object (`ethereum.providers`).
    fn providers(&self) -> Vec<Rc<dyn InjectedProvider>> {
        Vec::new()
    }

    async fn request(&self, method: &str, params: Value) -> Result<Value, ProviderError>;
}

/// Source of injected globals. Implementations must not fail: absence is an empty list.
pub trait Environment {
    fn injected(&self) -> Vec<InjectedRoot>;
}

/// One top-level injected global.
#[derive(Clone)]
pub struct InjectedRoot {
    pub source: String,
    pub handle: Rc<dyn InjectedProvider>,
}

impl InjectedRoot {
    pub fn new(source: impl Into<String>, handle: Rc<dyn InjectedProvider>) -> Self {
        Self { source: source.into(), handle }
    }
}

impl fmt::Debug for InjectedRoot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InjectedRoot").field("source", &self.source).finish_non_exhaustive()
    }
}

/// Set of declared-true capability flags.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CapabilityFlags(BTreeSet<String>);

impl CapabilityFlags {
    pub fn new() -> Self { Self::default() }

    pub fn with(mut self, flag: impl Into<String>) -> Self {
        self.0.insert(flag.into());
        self
    }

    pub fn insert(&mut self, flag: impl Into<String>) { self.0.insert(flag.into()); }

    pub fn has(&self, flag: &str) -> bool { self.0.contains(flag) }

    pub fn is_empty(&self) -> bool { self.0.is_empty() }

    pub fn iter(&self) -> impl Iterator<Item = &str> { self.0.iter().map(String::as_str) }
}

impl<S: Into<String>> FromIterator<S> for CapabilityFlags {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

/// Identity tag: `metamask`, `brave-wallet`, `generic`, or a host-defined id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProviderIdentity(String);

impl ProviderIdentity {
    pub const GENERIC: &'static str = "generic";

    pub fn new(id: impl Into<String>) -> Self { Self(id.into()) }

    pub fn generic() -> Self { Self::new(Self::GENERIC) }

    pub fn as_str(&self) -> &str { &self.0 }

    pub fn is_generic(&self) -> bool { self.0 == Self::GENERIC }
}

impl fmt::Display for ProviderIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.0) }
}

impl From<&str> for ProviderIdentity {
    fn from(value: &str) -> Self { Self::new(value) }
}

/// Where a handle was found: root global plus index inside an umbrella collection.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ProviderSlot {
    pub source: String,
    pub index: Option<usize>,
}

/// One injected handle as seen by a single detection pass.
#[derive(Clone)]
pub struct ProviderDescriptor {
    identity: ProviderIdentity,
    name: String,
    flags: CapabilityFlags,
    default_embedded: bool,
    slot: ProviderSlot,
    pass: u64,
    handle: Rc<dyn InjectedProvider>,
}

/// Plain-data view of a descriptor for collaborators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DescriptorInfo {
    pub identity: ProviderIdentity,
    pub name: String,
    pub flags: CapabilityFlags,
    pub default_embedded: bool,
    pub slot: ProviderSlot,
}

impl ProviderDescriptor {
    /// Host-built descriptor (outside detection). Flags drive the default-embedded bit.
    pub fn new(identity: impl Into<ProviderIdentity>, flags: CapabilityFlags, handle: Rc<dyn InjectedProvider>) -> Self {
        let identity = identity.into();
        let default_embedded = flags.has(DEFAULT_EMBEDDED_FLAG);
        Self {
            name: identity.to_string(),
            identity,
            flags,
            default_embedded,
            slot: ProviderSlot::default(),
            pass: 0,
            handle,
        }
    }

    pub(crate) fn detected(class: Classification, flags: CapabilityFlags, slot: ProviderSlot, pass: u64, handle: Rc<dyn InjectedProvider>) -> Self {
        Self {
            identity: class.identity,
            name: class.name,
            flags,
            default_embedded: class.default_embedded,
            slot,
            pass,
            handle,
        }
    }

    pub fn identity(&self) -> &ProviderIdentity { &self.identity }
    pub fn name(&self) -> &str { &self.name }
    pub fn flags(&self) -> &CapabilityFlags { &self.flags }
    pub fn is_default_embedded(&self) -> bool { self.default_embedded }
    pub fn slot(&self) -> &ProviderSlot { &self.slot }
    pub fn pass(&self) -> u64 { self.pass }

    pub(crate) fn handle(&self) -> Rc<dyn InjectedProvider> { self.handle.clone() }

    pub fn info(&self) -> DescriptorInfo {
        DescriptorInfo {
            identity: self.identity.clone(),
            name: self.name.clone(),
            flags: self.flags.clone(),
            default_embedded: self.default_embedded,
            slot: self.slot.clone(),
        }
    }
}

impl fmt::Debug for ProviderDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderDescriptor")
            .field("identity", &self.identity)
            .field("default_embedded", &self.default_embedded)
            .field("slot", &self.slot)
            .field("pass", &self.pass)
            .finish_non_exhaustive()
    }
}

/// Immutable, ordered result of one detection pass.
#[derive(Debug, Clone, Default)]
pub struct ProviderRegistry {
    pass: u64,
    descriptors: Vec<ProviderDescriptor>,
}

impl ProviderRegistry {
    pub fn new(pass: u64, descriptors: Vec<ProviderDescriptor>) -> Self { Self { pass, descriptors } }

    /// Registry assembled by the host instead of a detection pass.
    pub fn from_descriptors(descriptors: Vec<ProviderDescriptor>) -> Self { Self::new(0, descriptors) }

    pub fn pass(&self) -> u64 { self.pass }
    pub fn len(&self) -> usize { self.descriptors.len() }
    pub fn is_empty(&self) -> bool { self.descriptors.is_empty() }
    pub fn get(&self, index: usize) -> Option<&ProviderDescriptor> { self.descriptors.get(index) }
    pub fn iter(&self) -> std::slice::Iter<'_, ProviderDescriptor> { self.descriptors.iter() }

    pub fn find(&self, identity: &ProviderIdentity) -> Option<&ProviderDescriptor> {
        self.descriptors.iter().find(|d| d.identity() == identity)
    }

    pub fn infos(&self) -> Vec<DescriptorInfo> { self.descriptors.iter().map(ProviderDescriptor::info).collect() }
}

impl<'a> IntoIterator for &'a ProviderRegistry {
    type Item = &'a ProviderDescriptor;
    type IntoIter = std::slice::Iter<'a, ProviderDescriptor>;
    fn into_iter(self) -> Self::IntoIter { self.descriptors.iter() }
}
