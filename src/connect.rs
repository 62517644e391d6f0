//! Connection Orchestrator: timed, raced account handshake with one bounded retry.
//!
//! ```text
//! connect(descriptor, timeout)
//!     │
//!     ├── state.begin()            Busy if an attempt is pending; guard abandons on drop
//!     ├── race(request, deadline)  first settled wins
//!     │     ├── 4001               UserRejected (no retry)
//!     │     ├── transport error    re_resolve + retry once, same deadline
//!     │     └── accounts           first entry → normalize
//!     └── guard.settle()           discarded if a disconnect cut in
//! ```
//!
//! The losing side of a race is dropped; the wallet's own call is not aborted.

use serde_json::{json, Value};
use std::rc::Rc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::address::{normalize, CanonicalAddress};
use crate::detect::Detector;
use crate::error::ConnectError;
use crate::provider::{ProviderDescriptor, LIST_ACCOUNTS, REQUEST_ACCOUNTS};
use crate::state::ConnectionState;
use crate::timer::{millis, race, Raced, Timer};

pub struct Connector {
    state: ConnectionState,
    detector: Rc<Detector>,
    timer: Rc<dyn Timer>,
}

impl Connector {
    pub fn new(state: ConnectionState, detector: Rc<Detector>, timer: Rc<dyn Timer>) -> Self {
        Self { state, detector, timer }
    }

    pub fn state(&self) -> &ConnectionState { &self.state }

    /// Prompting handshake (`eth_requestAccounts`).
    pub async fn connect(&self, descriptor: &ProviderDescriptor, timeout: Duration) -> Result<CanonicalAddress, ConnectError> {
        self.handshake(descriptor, timeout, REQUEST_ACCOUNTS).await
    }

    /// Silent handshake (`eth_accounts`): restores a session the wallet still authorizes.
    pub async fn resume(&self, descriptor: &ProviderDescriptor, timeout: Duration) -> Result<CanonicalAddress, ConnectError> {
        self.handshake(descriptor, timeout, LIST_ACCOUNTS).await
    }

    /// Authorized accounts, normalized. Entries that fail normalization are skipped.
    /// Does not touch connection state.
    pub async fn accounts(&self, descriptor: &ProviderDescriptor, timeout: Duration) -> Result<Vec<CanonicalAddress>, ConnectError> {
        let deadline_ms = self.timer.now_ms().saturating_add(millis(timeout));
        let payload = self.request(descriptor, LIST_ACCOUNTS, deadline_ms, timeout).await?;
        let entries = account_list(payload)?;
        Ok(entries
            .iter()
            .filter_map(|entry| match entry.as_str().map(normalize) {
                Some(Ok(address)) => Some(address),
                _ => {
                    warn!(provider = %descriptor.identity(), entry = %entry, "skipping malformed account");
                    None
                }
            })
            .collect())
    }

    async fn handshake(&self, descriptor: &ProviderDescriptor, timeout: Duration, method: &str) -> Result<CanonicalAddress, ConnectError> {
        let guard = self.state.begin(descriptor.identity().clone(), self.timer.now_ms(), timeout)?;
        let (id, deadline_ms) = (guard.attempt().id, guard.attempt().deadline_ms);
        info!(provider = %descriptor.identity(), attempt = id, method, "connection attempt started");

        // Dropping this future before it settles abandons the attempt via the guard.
        let result = self.run(descriptor, method, deadline_ms, timeout).await;

        if !guard.settle(&result) {
            warn!(attempt = id, "discarding settlement of abandoned attempt");
            return Err(result.err().unwrap_or(ConnectError::Superseded));
        }
        match &result {
            Ok(address) => info!(provider = %descriptor.identity(), address = %address, "wallet connected"),
            Err(e) => info!(provider = %descriptor.identity(), error = %e, "connection attempt failed"),
        }
        result
    }

    async fn run(&self, descriptor: &ProviderDescriptor, method: &str, deadline_ms: u64, timeout: Duration) -> Result<CanonicalAddress, ConnectError> {
        let mut target = descriptor.clone();
        let mut retried = false;
        loop {
            let outcome = match self.request(&target, method, deadline_ms, timeout).await {
                Ok(payload) => account_list(payload),
                Err(e) => Err(e),
            };
            match outcome {
                Err(ConnectError::TransportError(reason)) if !retried => {
                    retried = true;
                    warn!(provider = %target.identity(), %reason, "transport failure, re-resolving provider");
                    target = self.detector.re_resolve(&target).ok_or(ConnectError::NoProviderFound)?;
                }
                Err(e) => return Err(e),
                Ok(entries) => return first_address(&entries),
            }
        }
    }

    /// One request, bounded by what is left of the attempt's deadline.
    async fn request(&self, target: &ProviderDescriptor, method: &str, deadline_ms: u64, timeout: Duration) -> Result<Value, ConnectError> {
        let expired = ConnectError::Timeout(millis(timeout));
        let remaining = deadline_ms.saturating_sub(self.timer.now_ms());
        if remaining == 0 {
            return Err(expired);
        }
        debug!(provider = %target.identity(), method, remaining_ms = remaining, "issuing request");

        let handle = target.handle();
        match race(&*self.timer, Duration::from_millis(remaining), handle.request(method, json!([]))).await {
            Raced::Settled(result) => result.map_err(ConnectError::from),
            Raced::Expired => Err(expired),
        }
    }
}

fn account_list(payload: Value) -> Result<Vec<Value>, ConnectError> {
    match payload {
        Value::Array(entries) => Ok(entries),
        other => Err(ConnectError::TransportError(format!("expected account list, got {}", other))),
    }
}

fn first_address(entries: &[Value]) -> Result<CanonicalAddress, ConnectError> {
    match entries.first() {
        None => Err(ConnectError::EmptyAccountList),
        Some(Value::String(raw)) => normalize(raw),
        Some(other) => Err(ConnectError::InvalidFormat(other.to_string())),
    }
}
