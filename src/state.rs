//! Connection State: current status, last-connected address, attempt bookkeeping.
//!
//! Single writer: only the orchestrator begins/settles attempts and sets the
//! address; only an explicit disconnect clears it. Readers get snapshots.
//! The pending-attempt rule replaces a lock (single-threaded execution).

use chrono::{DateTime, Utc};
use futures::channel::mpsc;
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use crate::address::CanonicalAddress;
use crate::error::ConnectError;
use crate::provider::ProviderIdentity;
use crate::timer::millis;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionStatus {
    Disconnected,
    Connecting,
    Connected,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "detail", rename_all = "snake_case")]
pub enum AttemptOutcome {
    Pending,
    Success(CanonicalAddress),
    Rejected,
    TimedOut,
    Errored(String),
    /// Cut off by a disconnect while pending, or dropped by its caller before
    /// settling. A late settlement is discarded.
    Abandoned,
}

impl AttemptOutcome {
    pub fn is_pending(&self) -> bool { matches!(self, AttemptOutcome::Pending) }

    fn from_result(result: &Result<CanonicalAddress, ConnectError>) -> Self {
        match result {
            Ok(address) => AttemptOutcome::Success(*address),
            Err(ConnectError::UserRejected) => AttemptOutcome::Rejected,
            Err(ConnectError::Timeout(_)) => AttemptOutcome::TimedOut,
            Err(e) => AttemptOutcome::Errored(e.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionAttempt {
    /// Generation id; a settlement carrying a stale id is discarded.
    pub id: u64,
    pub provider: ProviderIdentity,
    pub started_at: DateTime<Utc>,
    pub started_ms: u64,
    pub deadline_ms: u64,
    pub outcome: AttemptOutcome,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionSnapshot {
    pub status: ConnectionStatus,
    pub address: Option<CanonicalAddress>,
    pub connected_at: Option<DateTime<Utc>>,
    /// Pending attempt, or the last finished one.
    pub attempt: Option<ConnectionAttempt>,
}

#[derive(Default)]
struct StateInner {
    address: Option<CanonicalAddress>,
    connected_at: Option<DateTime<Utc>>,
    attempt: Option<ConnectionAttempt>,
    generation: u64,
    watchers: Vec<mpsc::UnboundedSender<ConnectionSnapshot>>,
}

impl StateInner {
    fn pending(&self) -> Option<&ConnectionAttempt> {
        self.attempt.as_ref().filter(|a| a.outcome.is_pending())
    }

    fn snapshot(&self) -> ConnectionSnapshot {
        let status = if self.pending().is_some() {
            ConnectionStatus::Connecting
        } else if self.address.is_some() {
            ConnectionStatus::Connected
        } else {
            ConnectionStatus::Disconnected
        };
        ConnectionSnapshot {
            status,
            address: self.address,
            connected_at: self.connected_at,
            attempt: self.attempt.clone(),
        }
    }

    fn notify(&mut self) {
        let snapshot = self.snapshot();
        self.watchers.retain(|tx| tx.unbounded_send(snapshot.clone()).is_ok());
    }
}

/// Shared handle; clones observe the same state.
#[derive(Clone, Default)]
pub struct ConnectionState {
    inner: Rc<RefCell<StateInner>>,
}

impl ConnectionState {
    /// Starts disconnected.
    pub fn new() -> Self { Self::default() }

    pub fn current(&self) -> ConnectionSnapshot { self.inner.borrow().snapshot() }

    pub fn address(&self) -> Option<CanonicalAddress> { self.inner.borrow().address }

    pub fn is_pending(&self) -> bool { self.inner.borrow().pending().is_some() }

    /// Snapshot stream, pushed on every transition. Closed receivers are dropped.
    pub fn watch(&self) -> mpsc::UnboundedReceiver<ConnectionSnapshot> {
        let (tx, rx) = mpsc::unbounded();
        self.inner.borrow_mut().watchers.push(tx);
        rx
    }

    /// Explicit user disconnect. Abandons a pending attempt.
    pub fn clear(&self) {
        let mut inner = self.inner.borrow_mut();
        if let Some(attempt) = inner.attempt.as_mut().filter(|a| a.outcome.is_pending()) {
            attempt.outcome = AttemptOutcome::Abandoned;
        }
        inner.address = None;
        inner.connected_at = None;
        inner.notify();
    }

    /// Open a new attempt. The returned guard abandons it if dropped unsettled.
    pub(crate) fn begin(&self, provider: ProviderIdentity, now_ms: u64, timeout: Duration) -> Result<AttemptGuard, ConnectError> {
        let mut inner = self.inner.borrow_mut();
        if inner.pending().is_some() {
            return Err(ConnectError::Busy);
        }
        inner.generation += 1;
        let attempt = ConnectionAttempt {
            id: inner.generation,
            provider,
            started_at: Utc::now(),
            started_ms: now_ms,
            deadline_ms: now_ms.saturating_add(millis(timeout)),
            outcome: AttemptOutcome::Pending,
        };
        inner.attempt = Some(attempt.clone());
        inner.notify();
        Ok(AttemptGuard { state: self.clone(), attempt, open: true })
    }

    /// Record the terminal outcome of attempt `id`. Returns false (and changes
    /// nothing) when `id` is no longer the pending attempt.
    pub(crate) fn settle(&self, id: u64, result: &Result<CanonicalAddress, ConnectError>) -> bool {
        let mut inner = self.inner.borrow_mut();
        match inner.attempt.as_mut() {
            Some(attempt) if attempt.id == id && attempt.outcome.is_pending() => {
                attempt.outcome = AttemptOutcome::from_result(result);
            }
            _ => return false,
        }
        if let Ok(address) = result {
            Self::set(&mut inner, *address);
        }
        inner.notify();
        true
    }

    fn set(inner: &mut StateInner, address: CanonicalAddress) {
        inner.address = Some(address);
        inner.connected_at = Some(Utc::now());
    }

    fn abandon(&self, id: u64) {
        let mut inner = self.inner.borrow_mut();
        match inner.attempt.as_mut() {
            Some(attempt) if attempt.id == id && attempt.outcome.is_pending() => {
                attempt.outcome = AttemptOutcome::Abandoned;
            }
            _ => return,
        }
        inner.notify();
    }
}

/// Owns a pending attempt until it is settled. Dropping it unsettled (the
/// caller stopped polling `connect`) marks the attempt `Abandoned`, so the
/// state never stays `Connecting` behind a cancelled future.
pub(crate) struct AttemptGuard {
    state: ConnectionState,
    attempt: ConnectionAttempt,
    open: bool,
}

impl AttemptGuard {
    pub(crate) fn attempt(&self) -> &ConnectionAttempt { &self.attempt }

    /// Same contract as [`ConnectionState::settle`].
    pub(crate) fn settle(mut self, result: &Result<CanonicalAddress, ConnectError>) -> bool {
        self.open = false;
        self.state.settle(self.attempt.id, result)
    }
}

impl Drop for AttemptGuard {
    fn drop(&mut self) {
        if self.open {
            self.state.abandon(self.attempt.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::normalize;
    use futures::StreamExt;

    fn addr(fill: char) -> CanonicalAddress {
        normalize(&fill.to_string().repeat(40)).unwrap()
    }

    fn begin(state: &ConnectionState) -> AttemptGuard {
        state.begin(ProviderIdentity::from("metamask"), 0, Duration::from_secs(1)).unwrap()
    }

    #[test]
    fn starts_disconnected() {
        let snap = ConnectionState::new().current();
        assert_eq!(snap.status, ConnectionStatus::Disconnected);
        assert!(snap.address.is_none());
        assert!(snap.attempt.is_none());
    }

    #[test]
    fn single_pending_attempt() {
        let state = ConnectionState::new();
        let attempt = begin(&state);
        assert_eq!(attempt.attempt().deadline_ms, 1000);
        assert_eq!(state.current().status, ConnectionStatus::Connecting);
        assert!(matches!(
            state.begin(ProviderIdentity::generic(), 0, Duration::from_secs(1)),
            Err(ConnectError::Busy)
        ));
        assert!(attempt.settle(&Ok(addr('1'))));
        assert_eq!(state.current().status, ConnectionStatus::Connected);
        assert!(!state.is_pending());
    }

    #[test]
    fn failure_preserves_prior_session() {
        let state = ConnectionState::new();
        begin(&state).settle(&Ok(addr('1')));

        let second = begin(&state);
        assert!(second.settle(&Err(ConnectError::Timeout(1000))));
        let snap = state.current();
        assert_eq!(snap.status, ConnectionStatus::Connected);
        assert_eq!(snap.address, Some(addr('1')));
        assert_eq!(snap.attempt.unwrap().outcome, AttemptOutcome::TimedOut);
    }

    #[test]
    fn stale_settlement_is_discarded() {
        let state = ConnectionState::new();
        let old = begin(&state);
        state.clear();
        let new = begin(&state);
        let new_id = new.attempt().id;
        assert!(!old.settle(&Ok(addr('a'))));
        assert!(state.address().is_none());
        assert!(state.is_pending());
        assert!(new.settle(&Ok(addr('b'))));
        assert_eq!(state.address(), Some(addr('b')));
        // Already terminal.
        assert!(!state.settle(new_id, &Ok(addr('c'))));
    }

    #[test]
    fn clear_abandons_pending_attempt() {
        let state = ConnectionState::new();
        let _attempt = begin(&state);
        state.clear();
        let snap = state.current();
        assert_eq!(snap.status, ConnectionStatus::Disconnected);
        assert_eq!(snap.attempt.unwrap().outcome, AttemptOutcome::Abandoned);
    }

    #[test]
    fn dropped_guard_abandons_its_attempt() {
        let state = ConnectionState::new();
        begin(&state).settle(&Ok(addr('1')));
        drop(begin(&state));

        let snap = state.current();
        assert_eq!(snap.status, ConnectionStatus::Connected);
        assert_eq!(snap.address, Some(addr('1')));
        assert_eq!(snap.attempt.unwrap().outcome, AttemptOutcome::Abandoned);
        assert!(begin(&state).settle(&Ok(addr('2'))));
    }

    #[test]
    fn dropped_guard_leaves_newer_attempt_alone() {
        let state = ConnectionState::new();
        let old = begin(&state);
        state.clear();
        let _new = begin(&state);
        drop(old);
        assert!(state.is_pending());
    }

    #[test]
    fn watchers_see_transitions() {
        let state = ConnectionState::new();
        let mut rx = state.watch();
        begin(&state).settle(&Ok(addr('2')));
        state.clear();
        drop(state);

        let statuses: Vec<_> = futures::executor::block_on(rx.by_ref().map(|s| s.status).collect::<Vec<_>>());
        assert_eq!(
            statuses,
            vec![ConnectionStatus::Connecting, ConnectionStatus::Connected, ConnectionStatus::Disconnected]
        );
    }
}
