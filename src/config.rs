//! Connection configuration - passed from the host application

use std::time::Duration;

use crate::provider::{KnownWallet, ProviderIdentity};
use crate::select::SelectionPolicy;

/// Handshake budget when the host does not set one.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

pub const TIMEOUT_ENV: &str = "POLCONNECT_TIMEOUT_MS";
pub const PREFERRED_ENV: &str = "POLCONNECT_PREFERRED";
pub const EXCLUDED_ENV: &str = "POLCONNECT_EXCLUDED";

/// Host configuration for a `WalletSession`.
#[derive(Debug, Clone)]
pub struct ConnectConfig {
    pub app: String,
    pub timeout: Duration,
    pub preferred: Vec<ProviderIdentity>,
    pub excluded: Vec<ProviderIdentity>,
    /// Extra catalog entries, matched before the built-in ones.
    pub wallets: Vec<KnownWallet>,
}

impl Default for ConnectConfig {
    fn default() -> Self {
        Self {
            app: "polconnect".into(),
            timeout: DEFAULT_TIMEOUT,
            preferred: Vec::new(),
            excluded: Vec::new(),
            wallets: Vec::new(),
        }
    }
}

impl ConnectConfig {
    pub fn new(app: impl Into<String>) -> Self {
        Self { app: app.into(), ..Default::default() }
    }
    pub fn with_timeout(mut self, timeout: Duration) -> Self { self.timeout = timeout; self }
    pub fn with_preferred(mut self, id: impl Into<ProviderIdentity>) -> Self { self.preferred.push(id.into()); self }
    pub fn with_excluded(mut self, id: impl Into<ProviderIdentity>) -> Self { self.excluded.push(id.into()); self }
    pub fn with_wallet(mut self, wallet: KnownWallet) -> Self { self.wallets.push(wallet); self }

    /// Overlay `POLCONNECT_*` variables. Unparseable values are ignored.
    pub fn from_env(app: impl Into<String>) -> Self {
        let mut config = Self::new(app);
        if let Some(ms) = std::env::var(TIMEOUT_ENV).ok().and_then(|v| v.trim().parse::<u64>().ok()) {
            config.timeout = Duration::from_millis(ms);
        }
        if let Ok(list) = std::env::var(PREFERRED_ENV) {
            config.preferred = parse_identities(&list);
        }
        if let Ok(list) = std::env::var(EXCLUDED_ENV) {
            config.excluded = parse_identities(&list);
        }
        config
    }

    pub fn policy(&self) -> SelectionPolicy {
        SelectionPolicy { preferred: self.preferred.clone(), excluded: self.excluded.clone() }
    }
}

fn parse_identities(list: &str) -> Vec<ProviderIdentity> {
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ProviderIdentity::from)
        .collect()
}
