//! Wallet session: the host-facing handle.
//!
//! Wires Detector, Selector, Orchestrator and Connection State together and
//! mirrors the two durable keys into a [`SessionStore`]. Persistence failures
//! are logged and never change the outcome of a connect.

pub mod store;

use futures::channel::mpsc;
use std::rc::Rc;
use tracing::{info, warn};

use crate::address::CanonicalAddress;
use crate::config::ConnectConfig;
use crate::connect::Connector;
use crate::detect::Detector;
use crate::error::ConnectError;
use crate::provider::{Environment, ProviderDescriptor, ProviderRegistry};
use crate::select::select_with;
use crate::state::{ConnectionSnapshot, ConnectionState};
use crate::timer::Timer;

pub use store::{MemoryStore, SessionStore, CONNECTED_KEY, HAS_WALLET_KEY};
#[cfg(feature = "native")]
pub use store::{session_path, FileStore};

pub struct WalletSession {
    config: ConnectConfig,
    detector: Rc<Detector>,
    connector: Connector,
    store: Rc<dyn SessionStore>,
}

impl WalletSession {
    pub fn new(env: Rc<dyn Environment>, timer: Rc<dyn Timer>, store: Rc<dyn SessionStore>, config: ConnectConfig) -> Self {
        let detector = Rc::new(Detector::new(env).with_known(config.wallets.clone()));
        let connector = Connector::new(ConnectionState::new(), detector.clone(), timer);
        Self { config, detector, connector, store }
    }

    pub fn config(&self) -> &ConnectConfig { &self.config }

    pub fn state(&self) -> &ConnectionState { self.connector.state() }

    /// Fresh detection pass. Records the sticky "wallet seen" flag.
    pub fn detect(&self) -> ProviderRegistry {
        let registry = self.detector.detect();
        if !registry.is_empty() {
            self.persist(HAS_WALLET_KEY, Some("true"));
        }
        registry
    }

    /// Selection under the configured preferred/excluded policy.
    pub fn select(&self, registry: &ProviderRegistry) -> Option<ProviderDescriptor> {
        select_with(registry, &self.config.policy())
    }

    pub async fn connect(&self, descriptor: &ProviderDescriptor) -> Result<CanonicalAddress, ConnectError> {
        let address = self.connector.connect(descriptor, self.config.timeout).await?;
        self.persist(CONNECTED_KEY, Some(&address.to_string()));
        Ok(address)
    }

    /// Detect, select, connect.
    pub async fn connect_default(&self) -> Result<CanonicalAddress, ConnectError> {
        let descriptor = self.pick()?;
        self.connect(&descriptor).await
    }

    pub async fn resume(&self, descriptor: &ProviderDescriptor) -> Result<CanonicalAddress, ConnectError> {
        let address = self.connector.resume(descriptor, self.config.timeout).await?;
        self.persist(CONNECTED_KEY, Some(&address.to_string()));
        Ok(address)
    }

    /// Silent restore on page load, only when a previous session was stored.
    pub async fn restore(&self) -> Result<Option<CanonicalAddress>, ConnectError> {
        if self.last_connected().is_none() {
            return Ok(None);
        }
        let descriptor = self.pick()?;
        self.resume(&descriptor).await.map(Some)
    }

    pub async fn accounts(&self, descriptor: &ProviderDescriptor) -> Result<Vec<CanonicalAddress>, ConnectError> {
        self.connector.accounts(descriptor, self.config.timeout).await
    }

    pub fn current(&self) -> ConnectionSnapshot { self.state().current() }

    pub fn watch(&self) -> mpsc::UnboundedReceiver<ConnectionSnapshot> { self.state().watch() }

    /// Explicit user disconnect. The "wallet seen" flag stays.
    pub fn disconnect(&self) {
        self.state().clear();
        self.persist(CONNECTED_KEY, None);
        info!(app = %self.config.app, "wallet disconnected");
    }

    pub fn provider_seen(&self) -> bool {
        self.read(HAS_WALLET_KEY).as_deref() == Some("true")
    }

    /// Last stored address. A corrupt value reads as absent.
    pub fn last_connected(&self) -> Option<CanonicalAddress> {
        self.read(CONNECTED_KEY).and_then(|raw| raw.parse().ok())
    }

    fn pick(&self) -> Result<ProviderDescriptor, ConnectError> {
        let registry = self.detect();
        if registry.is_empty() {
            return Err(ConnectError::NoProviderFound);
        }
        self.select(&registry).ok_or(ConnectError::SelectionEmpty)
    }

    fn read(&self, key: &str) -> Option<String> {
        self.store.get(key).unwrap_or_else(|e| {
            warn!(key, error = %e, "session store read failed");
            None
        })
    }

    fn persist(&self, key: &str, value: Option<&str>) {
        let result = match value {
            Some(value) => self.store.set(key, value),
            None => self.store.remove(key),
        };
        if let Err(e) = result {
            warn!(key, error = %e, "session store write failed");
        }
    }
}
