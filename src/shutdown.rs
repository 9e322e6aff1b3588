//! Cooperative cancellation shared by every task in the topology.

use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::time::Duration;

/// Cancellation token polled at every suspension point.
///
/// One token is cloned into the request source, the dispatcher, and every
/// device at construction time, replacing ambient global state. [`wait_for`]
/// doubles as a cancellation-aware sleep: a cancelled token wakes sleepers
/// immediately instead of letting them run out their interval.
///
/// [`wait_for`]: ShutdownToken::wait_for
#[derive(Clone, Default)]
pub struct ShutdownToken {
    inner: Arc<TokenInner>,
}

#[derive(Default)]
struct TokenInner {
    cancelled: Mutex<bool>,
    wake: Condvar,
}

impl ShutdownToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation and wake every task sleeping on this token.
    /// Safe to call more than once.
    pub fn cancel(&self) {
        let mut cancelled = self.inner.cancelled.lock();
        *cancelled = true;
        self.inner.wake.notify_all();
    }

    pub fn is_cancelled(&self) -> bool {
        *self.inner.cancelled.lock()
    }

    /// Sleep up to `timeout`, returning early if the token is cancelled.
    ///
    /// Returns `true` if cancellation was observed (before or during the
    /// wait), `false` if the full interval elapsed.
    pub fn wait_for(&self, timeout: Duration) -> bool {
        let mut cancelled = self.inner.cancelled.lock();
        if *cancelled {
            return true;
        }
        self.inner.wake.wait_for(&mut cancelled, timeout);
        *cancelled
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Instant;

    #[test]
    fn starts_uncancelled() {
        let token = ShutdownToken::new();
        assert!(!token.is_cancelled());
    }

    #[test]
    fn cancel_is_sticky_and_idempotent() {
        let token = ShutdownToken::new();
        token.cancel();
        token.cancel();
        assert!(token.is_cancelled());
        assert!(token.wait_for(Duration::from_millis(1)));
    }

    #[test]
    fn wait_for_elapses_when_not_cancelled() {
        let token = ShutdownToken::new();
        let start = Instant::now();
        assert!(!token.wait_for(Duration::from_millis(30)));
        assert!(start.elapsed() >= Duration::from_millis(25));
    }

    #[test]
    fn cancel_wakes_sleeper_early() {
        let token = ShutdownToken::new();
        let sleeper = token.clone();
        let handle = thread::spawn(move || {
            let start = Instant::now();
            let cancelled = sleeper.wait_for(Duration::from_secs(10));
            (cancelled, start.elapsed())
        });
        thread::sleep(Duration::from_millis(30));
        token.cancel();
        let (cancelled, elapsed) = handle.join().expect("sleeper thread panicked");
        assert!(cancelled);
        assert!(elapsed < Duration::from_secs(5));
    }
}
