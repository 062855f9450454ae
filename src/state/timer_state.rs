//! Timer state structure and clock math

use std::{collections::BTreeSet, fmt};

use serde::{Deserialize, Serialize};

use crate::error::{Result, TimerError};

/// Milliseconds per minute
pub const MS_PER_MINUTE: u64 = 60_000;

/// Lifecycle status of a countdown
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimerStatus {
    Idle,
    Running,
    Paused,
    Expired,
    Stopped,
}

impl fmt::Display for TimerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TimerStatus::Idle => "idle",
            TimerStatus::Running => "running",
            TimerStatus::Paused => "paused",
            TimerStatus::Expired => "expired",
            TimerStatus::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

/// Complete state of one countdown run.
///
/// Remaining time is never stored while running: it is derived from
/// `duration_ms - (now - started_at_epoch_ms)` on every read.
#[derive(Debug, Clone, PartialEq)]
pub struct TimerState {
    pub duration_ms: u64,
    /// Only set while `Running`
    pub started_at_epoch_ms: Option<i64>,
    /// Authoritative remaining time while `Paused`; remaining at stop for `Stopped`
    pub remaining_ms_snapshot: u64,
    pub status: TimerStatus,
    /// Thresholds (minutes) already notified in this run
    pub fired_thresholds: BTreeSet<u32>,
}

impl TimerState {
    /// Create a new idle timer state
    pub fn new() -> Self {
        Self {
            duration_ms: 0,
            started_at_epoch_ms: None,
            remaining_ms_snapshot: 0,
            status: TimerStatus::Idle,
            fired_thresholds: BTreeSet::new(),
        }
    }

    /// Fresh running state armed at `now`
    pub fn armed(duration_ms: u64, now: i64) -> Self {
        Self {
            duration_ms,
            started_at_epoch_ms: Some(now),
            remaining_ms_snapshot: 0,
            status: TimerStatus::Running,
            fired_thresholds: BTreeSet::new(),
        }
    }

    /// A timer is armed when it has a positive duration and is running or paused
    pub fn is_armed(&self) -> bool {
        self.duration_ms > 0 && matches!(self.status, TimerStatus::Running | TimerStatus::Paused)
    }

    /// Remaining time at `now`, never negative
    pub fn remaining_ms(&self, now: i64) -> u64 {
        match self.status {
            TimerStatus::Running => match self.started_at_epoch_ms {
                Some(started) => self.duration_ms.saturating_sub(elapsed_between(started, now)),
                None => 0,
            },
            TimerStatus::Paused => self.remaining_ms_snapshot,
            _ => 0,
        }
    }

    /// Elapsed time at `now`, clamped to `[0, duration_ms]`
    pub fn elapsed_ms(&self, now: i64) -> u64 {
        match self.status {
            TimerStatus::Running => match self.started_at_epoch_ms {
                Some(started) => elapsed_between(started, now).min(self.duration_ms),
                None => 0,
            },
            TimerStatus::Paused | TimerStatus::Stopped => {
                self.duration_ms.saturating_sub(self.remaining_ms_snapshot)
            }
            TimerStatus::Expired => self.duration_ms,
            TimerStatus::Idle => 0,
        }
    }

    /// Progress through the run in percent, clamped to `[0, 100]`
    pub fn progress_percent(&self, now: i64) -> f64 {
        if self.duration_ms == 0 {
            return 0.0;
        }
        let pct = self.elapsed_ms(now) as f64 / self.duration_ms as f64 * 100.0;
        pct.clamp(0.0, 100.0)
    }

    /// Start timestamp that makes `remaining_ms` continue from `remaining` at `now`
    pub fn rebased_start(&self, remaining: u64, now: i64) -> i64 {
        let consumed = self.duration_ms.saturating_sub(remaining);
        now.saturating_sub(i64::try_from(consumed).unwrap_or(i64::MAX))
    }

    /// Validate internal consistency
    pub fn check_invariants(&self) -> Result<()> {
        match self.status {
            TimerStatus::Running => {
                if self.duration_ms == 0 {
                    return Err(TimerError::InvariantViolation(
                        "running with zero duration".to_string(),
                    ));
                }
                if self.started_at_epoch_ms.is_none() {
                    return Err(TimerError::InvariantViolation(
                        "running without a start timestamp".to_string(),
                    ));
                }
            }
            TimerStatus::Paused => {
                if self.duration_ms == 0 {
                    return Err(TimerError::InvariantViolation(
                        "paused while not armed".to_string(),
                    ));
                }
                if self.started_at_epoch_ms.is_some() {
                    return Err(TimerError::InvariantViolation(
                        "paused with a running clock".to_string(),
                    ));
                }
            }
            TimerStatus::Idle | TimerStatus::Expired | TimerStatus::Stopped => {
                if self.started_at_epoch_ms.is_some() {
                    return Err(TimerError::InvariantViolation(format!(
                        "{} with a running clock",
                        self.status
                    )));
                }
            }
        }

        // Unsigned fields cannot go negative; a snapshot above the duration is
        // the same accounting error seen from the other side.
        if self.remaining_ms_snapshot > self.duration_ms {
            return Err(TimerError::InvariantViolation(format!(
                "negative elapsed time: remaining {}ms exceeds duration {}ms",
                self.remaining_ms_snapshot, self.duration_ms
            )));
        }
        Ok(())
    }
}

impl Default for TimerState {
    fn default() -> Self {
        Self::new()
    }
}

/// Wall-clock delta; a clock that steps backwards counts as zero elapsed
fn elapsed_between(started: i64, now: i64) -> u64 {
    u64::try_from(now.saturating_sub(started)).unwrap_or(0)
}
