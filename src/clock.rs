//! Wall-clock sources
//!
//! The engine never reads the system time directly. A [`Clock`] is injected at
//! construction so tests and simulations can drive time by hand.

use std::sync::{
    atomic::{AtomicI64, Ordering},
    Arc,
};

/// Source of wall-clock time in milliseconds since the Unix epoch
pub trait Clock: Send + Sync {
    fn now_epoch_ms(&self) -> i64;
}

/// Clock backed by the host's system time
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_epoch_ms(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}

/// Manually driven clock. Clones share the same underlying time.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now_ms: Arc<AtomicI64>,
}

impl ManualClock {
    /// Create a clock frozen at `epoch_ms`
    pub fn new(epoch_ms: i64) -> Self {
        Self {
            now_ms: Arc::new(AtomicI64::new(epoch_ms)),
        }
    }

    /// Jump to an absolute time (may move backwards)
    pub fn set(&self, epoch_ms: i64) {
        self.now_ms.store(epoch_ms, Ordering::SeqCst);
    }

    /// Move the clock forward by `ms`
    pub fn advance(&self, ms: i64) {
        self.now_ms.fetch_add(ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_epoch_ms(&self) -> i64 {
        self.now_ms.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_clock_clones_share_time() {
        let clock = ManualClock::new(1_000);
        let other = clock.clone();
        clock.advance(500);
        assert_eq!(other.now_epoch_ms(), 1_500);
        other.set(10);
        assert_eq!(clock.now_epoch_ms(), 10);
    }

    #[test]
    fn system_clock_is_after_2020() {
        assert!(SystemClock.now_epoch_ms() > 1_577_836_800_000);
    }
}
