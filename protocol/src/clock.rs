//! # Time Source
//!
//! The ledger never reads the system clock directly. It asks a [`Clock`],
//! which the execution environment supplies and the ledger trusts. In a
//! running node that is [`SystemClock`]; in tests and simulations it is a
//! [`ManualClock`] that only moves when told to.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;

use crate::types::Timestamp;

/// A trusted source of "now", in Unix seconds.
pub trait Clock: Send + Sync + fmt::Debug {
    /// Current time in whole seconds.
    fn now(&self) -> Timestamp;
}

/// Wall-clock time via `chrono`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        // Pre-epoch clocks are a host misconfiguration; clamp rather than wrap.
        Utc::now().timestamp().max(0) as Timestamp
    }
}

/// A settable clock shared between clones.
///
/// Cloning yields a handle to the same underlying instant, so a test can
/// hand one clone to the ledger and keep another to advance time.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Arc<AtomicU64>,
}

impl ManualClock {
    /// Creates a clock frozen at `start`.
    pub fn new(start: Timestamp) -> Self {
        Self {
            now: Arc::new(AtomicU64::new(start)),
        }
    }

    /// Moves the clock forward by `secs`.
    pub fn advance(&self, secs: u64) {
        self.now.fetch_add(secs, Ordering::SeqCst);
    }

    /// Jumps to an absolute instant. Going backwards is allowed; the ledger
    /// treats negative elapsed time as zero.
    pub fn set(&self, at: Timestamp) {
        self.now.store(at, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        self.now.load(Ordering::SeqCst)
    }
}

/// Shared, dynamically dispatched clock handle.
pub type SharedClock = Arc<dyn Clock>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_clock_clones_share_time() {
        let clock = ManualClock::new(1_000);
        let handle = clock.clone();
        handle.advance(60);
        assert_eq!(clock.now(), 1_060);
        clock.set(5);
        assert_eq!(handle.now(), 5);
    }

    #[test]
    fn system_clock_is_after_2020() {
        assert!(SystemClock.now() > 1_577_836_800);
    }
}
