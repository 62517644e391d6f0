//! Timer seam and the request/deadline race.
//!
//! The orchestrator never names a runtime: tokio drives it on native,
//! `setTimeout` in the browser (see `wasm::BrowserTimer`).

use futures::future::{self, Either, LocalBoxFuture};
use std::future::Future;
use std::pin::pin;
use std::time::Duration;

pub trait Timer {
    /// Monotonic milliseconds since an arbitrary origin.
    fn now_ms(&self) -> u64;

    fn sleep(&self, duration: Duration) -> LocalBoxFuture<'static, ()>;
}

/// Whole milliseconds in `duration`, saturating at `u64::MAX`.
pub fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Result of racing a future against a deadline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Raced<T> {
    Settled(T),
    Expired,
}

/// First settled wins. The loser is dropped; a dropped request cannot write anything.
pub async fn race<F: Future>(timer: &dyn Timer, budget: Duration, fut: F) -> Raced<F::Output> {
    let fut = pin!(fut);
    match future::select(fut, timer.sleep(budget)).await {
        Either::Left((out, _)) => Raced::Settled(out),
        Either::Right(((), _)) => Raced::Expired,
    }
}

#[cfg(feature = "native")]
pub use native::TokioTimer;

#[cfg(feature = "native")]
mod native {
    use super::*;
    use tokio::time::Instant;

    /// Tokio-backed timer. Honours paused time in tests.
    #[derive(Debug, Clone)]
    pub struct TokioTimer {
        origin: Instant,
    }

    impl Default for TokioTimer {
        fn default() -> Self { Self::new() }
    }

    impl TokioTimer {
        pub fn new() -> Self { Self { origin: Instant::now() } }
    }

    impl Timer for TokioTimer {
        fn now_ms(&self) -> u64 {
            millis(self.origin.elapsed())
        }

        fn sleep(&self, duration: Duration) -> LocalBoxFuture<'static, ()> {
            Box::pin(tokio::time::sleep(duration))
        }
    }
}

#[cfg(all(test, feature = "native"))]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn fast_future_wins() {
        let timer = TokioTimer::new();
        let out = race(&timer, Duration::from_millis(100), async { 7 }).await;
        assert_eq!(out, Raced::Settled(7));
    }

    #[tokio::test(start_paused = true)]
    async fn pending_future_expires_at_deadline() {
        let timer = TokioTimer::new();
        let out = race(&timer, Duration::from_millis(250), future::pending::<()>()).await;
        assert_eq!(out, Raced::Expired);
        assert_eq!(timer.now_ms(), 250);
    }

    #[tokio::test(start_paused = true)]
    async fn slower_future_loses() {
        let timer = TokioTimer::new();
        let slow = async {
            tokio::time::sleep(Duration::from_millis(500)).await;
            "late"
        };
        assert_eq!(race(&timer, Duration::from_millis(100), slow).await, Raced::Expired);
    }

    #[test]
    fn millis_saturates() {
        assert_eq!(millis(Duration::from_millis(1500)), 1500);
        assert_eq!(millis(Duration::MAX), u64::MAX);
    }
}
