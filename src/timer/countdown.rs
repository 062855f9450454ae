//! Countdown timer engine.
//!
//! A synchronous, wall-clock-based state machine. Remaining time is always
//! recomputed as `duration - (now - started_at)`; nothing is ever decremented,
//! so a sampling loop that gets throttled or suspended cannot accumulate
//! error. The engine owns no thread or task: something (normally the
//! countdown loop in [`crate::tasks`]) calls [`CountdownTimer::sample`] about
//! once per second while the timer is running.
//!
//! ## State Transitions
//!
//! ```text
//! Idle -> Running <-> Paused
//!            |          |
//!            v          v
//!         Expired    Stopped      (start re-arms from any of these)
//! ```

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, error, info, warn};

use super::observer::{ObserverRegistry, SubscriptionId, TickEvent, TimerObserver, WarningEvent};
use crate::{
    clock::{Clock, SystemClock},
    error::{CallbackFault, CallbackKind, Operation, Result, TimerError, TimerWarning},
    state::{TimerSnapshot, TimerState, TimerStatus, WarningThresholds, MS_PER_MINUTE},
    utils::format_mm_ss,
};

/// Result of a state-changing operation that is allowed to be a no-op
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    Applied { from: TimerStatus, to: TimerStatus },
    Ignored(TimerWarning),
}

impl Transition {
    pub fn is_applied(&self) -> bool {
        matches!(self, Transition::Applied { .. })
    }

    pub fn warning(&self) -> Option<&TimerWarning> {
        match self {
            Transition::Ignored(w) => Some(w),
            Transition::Applied { .. } => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SampleKind {
    /// Timer was not running; nothing was notified
    Idle,
    Ticked(TickEvent),
    Expired,
}

/// Outcome of one sampling-loop iteration
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub kind: SampleKind,
    /// Thresholds that fired during this sample, largest first
    pub warnings: Vec<u32>,
    /// Observer callbacks that failed during this sample
    pub faults: Vec<CallbackFault>,
}

impl Sample {
    fn idle() -> Self {
        Self {
            kind: SampleKind::Idle,
            warnings: Vec::new(),
            faults: Vec::new(),
        }
    }
}

/// Point-in-time view of the timer for display and status endpoints
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimerView {
    pub status: TimerStatus,
    pub duration_ms: u64,
    pub remaining_ms: u64,
    pub elapsed_ms: u64,
    pub progress_percent: f64,
    pub formatted: String,
    pub is_expired: bool,
    pub fired_thresholds: Vec<u32>,
}

/// Single countdown with threshold warnings and snapshot support
pub struct CountdownTimer {
    state: TimerState,
    thresholds: WarningThresholds,
    clock: Arc<dyn Clock>,
    observers: ObserverRegistry,
    #[cfg(test)]
    injected_faults: Arc<std::sync::atomic::AtomicU32>,
}

impl CountdownTimer {
    /// Create an idle timer reading time from `clock`
    pub fn new(clock: Arc<dyn Clock>, thresholds: WarningThresholds) -> Self {
        Self {
            state: TimerState::new(),
            thresholds,
            clock,
            observers: ObserverRegistry::new(),
            #[cfg(test)]
            injected_faults: Arc::default(),
        }
    }

    /// Create an idle timer on the system clock
    pub fn with_system_clock(thresholds: WarningThresholds) -> Self {
        Self::new(Arc::new(SystemClock), thresholds)
    }

    pub fn subscribe(&mut self, observer: impl TimerObserver + 'static) -> SubscriptionId {
        self.observers.subscribe(Box::new(observer))
    }

    pub fn subscribe_boxed(&mut self, observer: Box<dyn TimerObserver>) -> SubscriptionId {
        self.observers.subscribe(observer)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.observers.unsubscribe(id)
    }

    /// Arm a fresh run of `duration_minutes`.
    ///
    /// Re-initializes everything, including fired thresholds, from any state
    /// except `Running`, where it is ignored.
    pub fn start(&mut self, duration_minutes: f64) -> Result<Transition> {
        let duration_ms = minutes_to_ms(duration_minutes)?;
        let from = self.state.status;
        if from == TimerStatus::Running {
            return Ok(self.ignore(Operation::Start));
        }

        self.state = TimerState::armed(duration_ms, self.now());
        info!(
            "Countdown started: {} ({}ms), thresholds={:?}",
            format_mm_ss(duration_ms),
            duration_ms,
            self.thresholds.minutes()
        );
        Ok(self.applied(from))
    }

    pub fn pause(&mut self) -> Transition {
        if self.state.status != TimerStatus::Running || self.expire_if_due() {
            return self.ignore(Operation::Pause);
        }
        let now = self.now();
        self.state.remaining_ms_snapshot = self.state.remaining_ms(now);
        self.state.started_at_epoch_ms = None;
        self.state.status = TimerStatus::Paused;
        info!(
            "Countdown paused with {} remaining",
            format_mm_ss(self.state.remaining_ms_snapshot)
        );
        self.applied(TimerStatus::Running)
    }

    pub fn resume(&mut self) -> Transition {
        if self.state.status != TimerStatus::Paused || self.state.duration_ms == 0 {
            return self.ignore(Operation::Resume);
        }
        let now = self.now();
        let remaining = self.state.remaining_ms_snapshot;
        self.state.started_at_epoch_ms = Some(self.state.rebased_start(remaining, now));
        self.state.status = TimerStatus::Running;
        info!("Countdown resumed with {} remaining", format_mm_ss(remaining));
        self.applied(TimerStatus::Paused)
    }

    /// Cancel the run; observers get `on_stopped` with the elapsed time
    pub fn stop(&mut self) -> Transition {
        let from = self.state.status;
        if !matches!(from, TimerStatus::Running | TimerStatus::Paused) || self.expire_if_due() {
            return self.ignore(Operation::Stop);
        }
        let elapsed = self.halt();
        info!("Countdown stopped after {}ms", elapsed);
        self.applied(from)
    }

    /// Extend a running countdown
    pub fn add_time(&mut self, minutes: f64) -> Result<Transition> {
        let extra_ms = minutes_to_ms(minutes)?;
        if self.state.status != TimerStatus::Running || self.expire_if_due() {
            return Ok(self.ignore(Operation::AddTime));
        }
        self.state.duration_ms = self.state.duration_ms.saturating_add(extra_ms);
        info!(
            "Added {}ms; remaining now {}",
            extra_ms,
            format_mm_ss(self.remaining_ms())
        );
        Ok(self.applied(TimerStatus::Running))
    }

    /// One sampling-loop iteration.
    ///
    /// Expires the timer once remaining reaches zero, otherwise fires due
    /// warnings and then the tick callback. Does nothing unless running.
    pub fn sample(&mut self) -> Result<Sample> {
        if self.state.status != TimerStatus::Running {
            return Ok(Sample::idle());
        }
        #[cfg(test)]
        self.take_injected_fault()?;
        self.state.check_invariants()?;

        let now = self.now();
        let remaining = self.state.remaining_ms(now);

        if remaining == 0 {
            let faults = self.expire();
            return Ok(Sample {
                kind: SampleKind::Expired,
                warnings: Vec::new(),
                faults,
            });
        }

        let mut faults = Vec::new();
        let due = self.thresholds.due(remaining, &self.state.fired_thresholds);
        for &threshold in &due {
            self.state.fired_thresholds.insert(threshold);
            let event = WarningEvent {
                threshold_minutes: threshold,
                remaining_ms: remaining,
                formatted: format_mm_ss(remaining),
            };
            info!("{}-minute warning at {}", threshold, event.formatted);
            faults.extend(
                self.observers
                    .notify(CallbackKind::Warning, |o| o.on_warning(&event)),
            );
        }

        let tick = TickEvent {
            remaining_ms: remaining,
            formatted: format_mm_ss(remaining),
            progress_percent: self.state.progress_percent(now),
            elapsed_ms: self.state.elapsed_ms(now),
        };
        debug!("Tick: {} ({:.1}%)", tick.formatted, tick.progress_percent);
        faults.extend(self.observers.notify(CallbackKind::Tick, |o| o.on_tick(&tick)));

        Ok(Sample {
            kind: SampleKind::Ticked(tick),
            warnings: due,
            faults,
        })
    }

    /// Forced recomputation after the host was backgrounded.
    ///
    /// The derived remaining time is already correct; observers just need to
    /// hear about it now rather than at the next scheduled tick.
    pub fn on_visibility_restored(&mut self) -> Result<Sample> {
        if self.state.status == TimerStatus::Running {
            debug!(
                "Visibility restored with {} remaining",
                format_mm_ss(self.remaining_ms())
            );
        }
        self.sample()
    }

    /// Move to `Stopped` regardless of current consistency
    pub fn force_stop(&mut self, reason: &str) {
        error!("Forcing countdown to stop: {}", reason);
        if matches!(self.state.status, TimerStatus::Running | TimerStatus::Paused) {
            self.halt();
        } else {
            self.state.started_at_epoch_ms = None;
        }
    }

    pub fn serialize(&self) -> TimerSnapshot {
        TimerSnapshot::capture(&self.state, self.now())
    }

    /// Replace the current state with `snapshot`.
    ///
    /// A malformed snapshot is logged and leaves the timer `Idle`.
    pub fn restore(&mut self, snapshot: TimerSnapshot) -> Transition {
        let from = self.state.status;
        let restored = snapshot.into_state(self.now()).and_then(|state| {
            state
                .check_invariants()
                .map(|_| state)
                .map_err(|e| e.to_string())
        });

        match restored {
            Ok(state) => {
                self.state = state;
                info!(
                    "Restored {} countdown with {} remaining",
                    self.state.status,
                    format_mm_ss(self.remaining_ms())
                );
                self.applied(from)
            }
            Err(reason) => self.reject_snapshot(reason),
        }
    }

    /// Decode a JSON snapshot and restore it
    pub fn restore_json(&mut self, raw: &str) -> Transition {
        match serde_json::from_str::<TimerSnapshot>(raw) {
            Ok(snapshot) => self.restore(snapshot),
            Err(e) => self.reject_snapshot(e.to_string()),
        }
    }

    pub fn status(&self) -> TimerStatus {
        self.state.status
    }

    pub fn state(&self) -> &TimerState {
        &self.state
    }

    pub fn remaining_ms(&self) -> u64 {
        self.state.remaining_ms(self.now())
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.state.elapsed_ms(self.now())
    }

    pub fn progress_percent(&self) -> f64 {
        self.state.progress_percent(self.now())
    }

    /// True once the run has expired, or when an armed run has no time left
    /// but the loop has not sampled it yet
    pub fn is_expired(&self) -> bool {
        self.state.status == TimerStatus::Expired
            || (self.state.is_armed() && self.remaining_ms() == 0)
    }

    pub fn check_invariants(&self) -> Result<()> {
        self.state.check_invariants()
    }

    pub fn view(&self) -> TimerView {
        let now = self.now();
        let remaining = self.state.remaining_ms(now);
        TimerView {
            status: self.state.status,
            duration_ms: self.state.duration_ms,
            remaining_ms: remaining,
            elapsed_ms: self.state.elapsed_ms(now),
            progress_percent: self.state.progress_percent(now),
            formatted: format_mm_ss(remaining),
            is_expired: self.is_expired(),
            fired_thresholds: self.state.fired_thresholds.iter().copied().collect(),
        }
    }

    fn now(&self) -> i64 {
        self.clock.now_epoch_ms()
    }

    /// Expire a running timer whose deadline passed since the last sample.
    ///
    /// Commands that arrive late must not pause, stop or extend a run that
    /// has already ended.
    fn expire_if_due(&mut self) -> bool {
        let due = self.state.status == TimerStatus::Running && self.remaining_ms() == 0;
        if due {
            self.expire();
        }
        due
    }

    fn expire(&mut self) -> Vec<CallbackFault> {
        self.state.status = TimerStatus::Expired;
        self.state.started_at_epoch_ms = None;
        self.state.remaining_ms_snapshot = 0;
        info!("Countdown expired after {}ms", self.state.duration_ms);
        self.observers
            .notify(CallbackKind::Expired, |o| o.on_expired())
    }

    /// Freeze the clock into `Stopped` and notify observers; returns elapsed ms
    fn halt(&mut self) -> u64 {
        let now = self.now();
        let remaining = self.state.remaining_ms(now).min(self.state.duration_ms);
        self.state.remaining_ms_snapshot = remaining;
        self.state.started_at_epoch_ms = None;
        self.state.status = TimerStatus::Stopped;
        let elapsed = self.state.elapsed_ms(now);
        self.observers
            .notify(CallbackKind::Stopped, |o| o.on_stopped(elapsed));
        elapsed
    }

    fn applied(&self, from: TimerStatus) -> Transition {
        Transition::Applied {
            from,
            to: self.state.status,
        }
    }

    fn ignore(&self, operation: Operation) -> Transition {
        let warning = TimerWarning::InvalidTransition {
            operation,
            status: self.state.status,
        };
        warn!("{}", warning);
        Transition::Ignored(warning)
    }

    fn reject_snapshot(&mut self, reason: String) -> Transition {
        self.state = TimerState::new();
        let warning = TimerWarning::MalformedSnapshot { reason };
        warn!("{}", warning);
        Transition::Ignored(warning)
    }
}

#[cfg(test)]
impl CountdownTimer {
    /// Number of upcoming samples that fail as if the state were corrupt
    pub(crate) fn fault_injector(&self) -> Arc<std::sync::atomic::AtomicU32> {
        Arc::clone(&self.injected_faults)
    }

    fn take_injected_fault(&self) -> Result<()> {
        use std::sync::atomic::Ordering;
        let taken = self
            .injected_faults
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if taken {
            return Err(TimerError::InvariantViolation(
                "injected sampling fault".to_string(),
            ));
        }
        Ok(())
    }
}

impl std::fmt::Debug for CountdownTimer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CountdownTimer")
            .field("state", &self.state)
            .field("thresholds", &self.thresholds)
            .field("observers", &self.observers)
            .finish()
    }
}

/// Convert a caller-supplied minute count into whole milliseconds
pub fn minutes_to_ms(minutes: f64) -> Result<u64> {
    let ms = (minutes * MS_PER_MINUTE as f64).round();
    if !minutes.is_finite() || minutes <= 0.0 || ms < 1.0 || ms >= i64::MAX as f64 {
        return Err(TimerError::InvalidDuration { value: minutes });
    }
    Ok(ms as u64)
}
