//! Known wallet catalog. Order matters: Brave also declares `isMetaMask`,
//! so more specific entries come first.

use super::{CapabilityFlags, ProviderIdentity};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Flag a provider sets to announce itself as the environment's baseline wallet.
pub const DEFAULT_EMBEDDED_FLAG: &str = "isDefaultEmbedded";

const GENERIC_NAME: &str = "Browser Wallet";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnownWallet {
    pub id: String,
    pub name: String,
    /// Any of these flags identifies the wallet.
    #[serde(default)]
    pub flags: Vec<String>,
    /// Root source key that identifies the wallet on its own.
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub default_embedded: bool,
}

impl KnownWallet {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self { id: id.into(), name: name.into(), flags: Vec::new(), source: None, default_embedded: false }
    }

    pub fn flag(mut self, flag: impl Into<String>) -> Self { self.flags.push(flag.into()); self }
    pub fn source(mut self, source: impl Into<String>) -> Self { self.source = Some(source.into()); self }
    pub fn embedded(mut self) -> Self { self.default_embedded = true; self }

    fn matches(&self, source: &str, flags: &CapabilityFlags) -> bool {
        self.flags.iter().any(|f| flags.has(f)) || self.source.as_deref() == Some(source)
    }
}

pub fn default_catalog() -> Vec<KnownWallet> {
    vec![
        KnownWallet::new("brave-wallet", "Brave Wallet").flag("isBraveWallet").embedded(),
        KnownWallet::new("wallet-x", "WalletX").flag("isWalletX"),
        KnownWallet::new("one-inch", "1inch Wallet").flag("is1inch"),
        KnownWallet::new("trust-wallet", "Trust Wallet").flag("isTrust").flag("isTrustWallet"),
        KnownWallet::new("metamask", "MetaMask").flag("isMetaMask"),
        KnownWallet::new("polkadot-js", "Polkadot{.js}").source("injectedWeb3.polkadot-js"),
    ]
}

/// Every flag worth reading off an injected object: host entries, the built-in
/// catalog and the embedded marker, each once.
pub fn probe_flags(extra: &[KnownWallet]) -> Vec<String> {
    let catalog = default_catalog();
    extra
        .iter()
        .chain(catalog.iter())
        .flat_map(|w| w.flags.iter().cloned())
        .chain(std::iter::once(DEFAULT_EMBEDDED_FLAG.to_string()))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub identity: ProviderIdentity,
    pub name: String,
    pub default_embedded: bool,
}

/// Tag a handle by the first catalog entry it matches, else `generic`.
pub fn classify(catalog: &[KnownWallet], source: &str, flags: &CapabilityFlags) -> Classification {
    let declared_embedded = flags.has(DEFAULT_EMBEDDED_FLAG);
    match catalog.iter().find(|w| w.matches(source, flags)) {
        Some(known) => Classification {
            identity: ProviderIdentity::new(known.id.clone()),
            name: known.name.clone(),
            default_embedded: known.default_embedded || declared_embedded,
        },
        None => Classification {
            identity: ProviderIdentity::generic(),
            name: GENERIC_NAME.into(),
            default_embedded: declared_embedded,
        },
    }
}
