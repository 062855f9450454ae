//! Serialized timer state used to survive a page or process teardown

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::{TimerState, TimerStatus};

/// Current snapshot format version
pub const SNAPSHOT_VERSION: u32 = 1;

/// Persisted form of a [`TimerState`].
///
/// `remaining_at_snapshot_ms` is the remaining time at `saved_at_epoch_ms`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimerSnapshot {
    #[serde(default = "default_version")]
    pub version: u32,
    pub duration_ms: u64,
    pub remaining_at_snapshot_ms: u64,
    #[serde(default)]
    pub started_at_epoch_ms: Option<i64>,
    pub status: TimerStatus,
    #[serde(default)]
    pub fired_thresholds: Vec<u32>,
    #[serde(default)]
    pub saved_at_epoch_ms: Option<i64>,
}

fn default_version() -> u32 {
    SNAPSHOT_VERSION
}

impl TimerSnapshot {
    /// Capture `state` as seen at `now`
    pub fn capture(state: &TimerState, now: i64) -> Self {
        let remaining = match state.status {
            TimerStatus::Stopped => state.remaining_ms_snapshot,
            _ => state.remaining_ms(now),
        };
        Self {
            version: SNAPSHOT_VERSION,
            duration_ms: state.duration_ms,
            remaining_at_snapshot_ms: remaining,
            started_at_epoch_ms: state.started_at_epoch_ms,
            status: state.status,
            fired_thresholds: state.fired_thresholds.iter().copied().collect(),
            saved_at_epoch_ms: Some(now),
        }
    }

    /// Rebuild a state at `now`. Time that passed since a running snapshot
    /// was taken is charged against the remaining budget.
    pub fn into_state(self, now: i64) -> Result<TimerState, String> {
        if self.version > SNAPSHOT_VERSION {
            return Err(format!("unsupported snapshot version {}", self.version));
        }
        if self.remaining_at_snapshot_ms > self.duration_ms {
            return Err(format!(
                "remaining {}ms exceeds duration {}ms",
                self.remaining_at_snapshot_ms, self.duration_ms
            ));
        }

        let fired: BTreeSet<u32> = self.fired_thresholds.iter().copied().collect();
        let mut state = TimerState::new();

        match self.status {
            TimerStatus::Running => {
                if self.duration_ms == 0 {
                    return Err("running snapshot with zero duration".to_string());
                }
                let unobserved = match (self.saved_at_epoch_ms, self.started_at_epoch_ms) {
                    (Some(saved), _) => u64::try_from(now.saturating_sub(saved)).unwrap_or(0),
                    (None, Some(started)) => {
                        // Older snapshots carry only the start timestamp.
                        let elapsed = u64::try_from(now.saturating_sub(started)).unwrap_or(0);
                        let consumed = self.duration_ms - self.remaining_at_snapshot_ms;
                        elapsed.saturating_sub(consumed)
                    }
                    (None, None) => {
                        return Err("running snapshot without any timestamp".to_string());
                    }
                };
                let remaining_now = self.remaining_at_snapshot_ms.saturating_sub(unobserved);
                state.duration_ms = self.duration_ms;
                state.status = TimerStatus::Running;
                state.started_at_epoch_ms = Some(state.rebased_start(remaining_now, now));
                state.fired_thresholds = fired;
            }
            TimerStatus::Paused => {
                if self.duration_ms == 0 {
                    return Err("paused snapshot with zero duration".to_string());
                }
                state.duration_ms = self.duration_ms;
                state.status = TimerStatus::Paused;
                state.remaining_ms_snapshot = self.remaining_at_snapshot_ms;
                state.fired_thresholds = fired;
            }
            TimerStatus::Expired | TimerStatus::Stopped => {
                state.duration_ms = self.duration_ms;
                state.status = self.status;
                state.remaining_ms_snapshot = if self.status == TimerStatus::Stopped {
                    self.remaining_at_snapshot_ms
                } else {
                    0
                };
                state.fired_thresholds = fired;
            }
            TimerStatus::Idle => {}
        }

        Ok(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn running_snapshot() -> TimerSnapshot {
        TimerSnapshot {
            version: SNAPSHOT_VERSION,
            duration_ms: 600_000,
            remaining_at_snapshot_ms: 400_000,
            started_at_epoch_ms: Some(0),
            status: TimerStatus::Running,
            fired_thresholds: vec![30, 15],
            saved_at_epoch_ms: Some(200_000),
        }
    }

    #[test]
    fn running_snapshot_charges_unobserved_time() {
        let state = running_snapshot().into_state(260_000).unwrap();
        assert_eq!(state.status, TimerStatus::Running);
        assert_eq!(state.remaining_ms(260_000), 340_000);
        assert!(state.fired_thresholds.contains(&15));
    }

    #[test]
    fn legacy_snapshot_uses_start_timestamp() {
        let mut snap = running_snapshot();
        snap.saved_at_epoch_ms = None;
        let state = snap.into_state(260_000).unwrap();
        assert_eq!(state.remaining_ms(260_000), 340_000);
    }

    #[test]
    fn running_snapshot_past_deadline_restores_at_zero() {
        let state = running_snapshot().into_state(10_000_000).unwrap();
        assert_eq!(state.status, TimerStatus::Running);
        assert_eq!(state.remaining_ms(10_000_000), 0);
    }

    #[test]
    fn paused_snapshot_has_no_clock() {
        let mut snap = running_snapshot();
        snap.status = TimerStatus::Paused;
        let state = snap.into_state(999_999_999).unwrap();
        assert_eq!(state.started_at_epoch_ms, None);
        assert_eq!(state.remaining_ms(999_999_999), 400_000);
    }

    #[test]
    fn rejects_inconsistent_snapshots() {
        let mut snap = running_snapshot();
        snap.remaining_at_snapshot_ms = 700_000;
        assert!(snap.into_state(0).is_err());

        let mut snap = running_snapshot();
        snap.saved_at_epoch_ms = None;
        snap.started_at_epoch_ms = None;
        assert!(snap.into_state(0).is_err());

        let mut snap = running_snapshot();
        snap.version = SNAPSHOT_VERSION + 1;
        assert!(snap.into_state(0).is_err());
    }

    #[test]
    fn uses_camel_case_field_names() {
        let json = serde_json::to_value(running_snapshot()).unwrap();
        assert_eq!(json["durationMs"], 600_000);
        assert_eq!(json["remainingAtSnapshotMs"], 400_000);
        assert_eq!(json["status"], "running");
    }
}
