//! Warning threshold tracking

use std::collections::BTreeSet;

use tracing::warn;

use super::timer_state::MS_PER_MINUTE;

/// Configured remaining-minutes values at which a one-time warning is due
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WarningThresholds {
    /// Deduplicated, largest first
    minutes: Vec<u32>,
}

impl WarningThresholds {
    /// Accepts any order; duplicates collapse and zero is dropped since
    /// expiry always preempts a zero-minute warning.
    pub fn new(minutes: impl IntoIterator<Item = u32>) -> Self {
        let mut set = BTreeSet::new();
        for m in minutes {
            if m == 0 {
                warn!("Ignoring zero-minute warning threshold");
                continue;
            }
            set.insert(m);
        }
        Self {
            minutes: set.into_iter().rev().collect(),
        }
    }

    pub fn none() -> Self {
        Self { minutes: Vec::new() }
    }

    pub fn minutes(&self) -> &[u32] {
        &self.minutes
    }

    /// Thresholds that are due at `remaining_ms` and not yet in `fired`,
    /// largest first. Several may be due at once after a stalled loop.
    pub fn due(&self, remaining_ms: u64, fired: &BTreeSet<u32>) -> Vec<u32> {
        let remaining_minutes = remaining_minutes_ceil(remaining_ms);
        self.minutes
            .iter()
            .copied()
            .filter(|t| remaining_minutes <= u64::from(*t) && !fired.contains(t))
            .collect()
    }
}

impl Default for WarningThresholds {
    fn default() -> Self {
        Self::new([30, 15, 5, 1])
    }
}

/// Remaining time in whole minutes, rounded up (30:00 -> 30, 29:59.999 -> 30)
pub fn remaining_minutes_ceil(remaining_ms: u64) -> u64 {
    remaining_ms.div_ceil(MS_PER_MINUTE)
}
