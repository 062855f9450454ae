//! Countdown loop background task
//!
//! Owns the [`CountdownTimer`] exclusively. Commands, visibility events and
//! sampling ticks are all handled on this one task, so there is never more
//! than one sample or visibility cycle in flight and a pause, stop or expiry
//! drops the ticker before anything else can fire.

use tokio::{
    sync::{mpsc, oneshot},
    task::JoinHandle,
    time::{interval_at, sleep_until, Instant, Interval, MissedTickBehavior},
};
use tracing::{debug, error, info, warn};

use crate::{
    config::TimerConfig,
    state::TimerStatus,
    timer::{Command, CountdownTimer, Sample, TimerHandle},
    visibility::{VisibilityEvent, VisibilityEvents},
};

const COMMAND_BUFFER: usize = 64;

/// Spawn the loop for `timer` and return a handle to drive it
pub fn spawn_countdown(
    timer: CountdownTimer,
    visibility: VisibilityEvents,
    config: TimerConfig,
) -> (TimerHandle, JoinHandle<()>) {
    let (tx, rx) = mpsc::channel(COMMAND_BUFFER);
    let join = tokio::spawn(countdown_loop_task(timer, rx, visibility, config));
    (TimerHandle::new(tx), join)
}

/// Scheduling state of the loop
struct LoopState {
    config: TimerConfig,
    ticker: Option<Interval>,
    visibility_retry: Option<Instant>,
    consecutive_faults: u32,
}

impl LoopState {
    fn arm(&mut self, first_tick: Instant) {
        let mut ticker = interval_at(first_tick, self.config.tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        self.ticker = Some(ticker);
    }

    fn disarm(&mut self) {
        if self.ticker.take().is_some() {
            debug!("Sampling loop disarmed");
        }
        self.visibility_retry = None;
    }

    /// Reschedule after a successful sample
    fn after_sample(&mut self, sample: &Sample, timer: &CountdownTimer) {
        if timer.status() != TimerStatus::Running {
            self.disarm();
            return;
        }
        if !sample.faults.is_empty() {
            warn!(
                "{} observer callback(s) failed; re-arming sampling loop in {:?}",
                sample.faults.len(),
                self.config.recovery_delay
            );
            self.arm(Instant::now() + self.config.recovery_delay);
        }
    }

    /// Reschedule after a sample that failed inside the engine
    fn after_fault(&mut self, timer: &mut CountdownTimer, reason: String) {
        self.consecutive_faults += 1;
        if self.consecutive_faults >= self.config.max_consecutive_faults {
            timer.force_stop(&format!(
                "{} consecutive sampling faults, last: {}",
                self.consecutive_faults, reason
            ));
            self.disarm();
            return;
        }
        error!(
            "Sampling fault {}/{}: {}; re-arming in {:?}",
            self.consecutive_faults, self.config.max_consecutive_faults, reason, self.config.recovery_delay
        );
        self.arm(Instant::now() + self.config.recovery_delay);
    }
}

/// Background task that drives one countdown
pub async fn countdown_loop_task(
    mut timer: CountdownTimer,
    mut commands: mpsc::Receiver<Command>,
    mut visibility: VisibilityEvents,
    config: TimerConfig,
) {
    info!("Starting countdown loop");

    let mut state = LoopState {
        config,
        ticker: None,
        visibility_retry: None,
        consecutive_faults: 0,
    };
    let mut visibility_open = true;

    if timer.status() == TimerStatus::Running {
        state.arm(Instant::now());
    }

    loop {
        tokio::select! {
            biased;

            command = commands.recv() => {
                let Some(command) = command else {
                    info!("All timer handles dropped, stopping countdown loop");
                    break;
                };
                let was_running = timer.status() == TimerStatus::Running;
                handle_command(&mut timer, command);
                match (was_running, timer.status() == TimerStatus::Running) {
                    (false, true) => {
                        state.consecutive_faults = 0;
                        state.arm(Instant::now());
                    }
                    (_, false) => state.disarm(),
                    (true, true) => {}
                }
            }

            event = visibility.recv(), if visibility_open => {
                match event {
                    Some(VisibilityEvent::Restored) if timer.status() == TimerStatus::Running => {
                        match timer.on_visibility_restored() {
                            Ok(sample) => {
                                state.consecutive_faults = 0;
                                // Next scheduled tick is a full period after the forced one.
                                state.arm(Instant::now() + state.config.tick_interval);
                                state.after_sample(&sample, &timer);
                            }
                            Err(e) => {
                                warn!(
                                    "Visibility correction failed: {}; retrying in {:?}",
                                    e, state.config.visibility_retry_delay
                                );
                                state.visibility_retry =
                                    Some(Instant::now() + state.config.visibility_retry_delay);
                            }
                        }
                    }
                    Some(VisibilityEvent::Restored) => {
                        debug!("Visibility restored while {}; nothing to correct", timer.status());
                    }
                    Some(VisibilityEvent::Hidden) => {
                        debug!("Host hidden; sampling may be throttled until restore");
                    }
                    None => {
                        debug!("Visibility notifier dropped");
                        visibility_open = false;
                    }
                }
            }

            _ = wait_until(state.visibility_retry) => {
                state.visibility_retry = None;
                match timer.on_visibility_restored() {
                    Ok(sample) => {
                        info!("Visibility correction succeeded on retry");
                        state.after_sample(&sample, &timer);
                    }
                    Err(e) => {
                        error!(
                            "Visibility correction retry failed: {}; keeping last good state",
                            e
                        );
                    }
                }
            }

            _ = next_tick(&mut state.ticker) => {
                match timer.sample() {
                    Ok(sample) => {
                        state.consecutive_faults = 0;
                        state.after_sample(&sample, &timer);
                    }
                    Err(e) => state.after_fault(&mut timer, e.to_string()),
                }
            }
        }
    }
}

fn handle_command(timer: &mut CountdownTimer, command: Command) {
    match command {
        Command::Start { minutes, reply } => respond(reply, timer.start(minutes)),
        Command::Pause { reply } => respond(reply, timer.pause()),
        Command::Resume { reply } => respond(reply, timer.resume()),
        Command::Stop { reply } => respond(reply, timer.stop()),
        Command::AddTime { minutes, reply } => respond(reply, timer.add_time(minutes)),
        Command::View { reply } => respond(reply, timer.view()),
        Command::Serialize { reply } => respond(reply, timer.serialize()),
        Command::Restore { snapshot, reply } => respond(reply, timer.restore(snapshot)),
        Command::CheckInvariants { reply } => respond(reply, timer.check_invariants()),
        Command::Subscribe { observer, reply } => respond(reply, timer.subscribe_boxed(observer)),
        Command::Unsubscribe { id, reply } => respond(reply, timer.unsubscribe(id)),
    }
}

fn respond<T>(reply: oneshot::Sender<T>, value: T) {
    if reply.send(value).is_err() {
        debug!("Caller went away before the reply was sent");
    }
}

async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => std::future::pending().await,
    }
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use std::{
        sync::{
            atomic::{AtomicU32, Ordering},
            Arc,
        },
        time::Duration,
    };

    use tokio::sync::mpsc::UnboundedReceiver;

    use super::*;
    use crate::{
        clock::ManualClock,
        state::WarningThresholds,
        timer::{ChannelObserver, TickEvent, TimerEvent},
        visibility::{self, VisibilityNotifier},
    };

    struct Harness {
        clock: ManualClock,
        handle: TimerHandle,
        events: UnboundedReceiver<TimerEvent>,
        notifier: VisibilityNotifier,
        faults: Arc<AtomicU32>,
    }

    fn harness() -> Harness {
        let clock = ManualClock::new(0);
        let mut timer = CountdownTimer::new(Arc::new(clock.clone()), WarningThresholds::none());
        let (observer, events) = ChannelObserver::channel();
        timer.subscribe(observer);
        let faults = timer.fault_injector();
        let (notifier, visibility_events) = visibility::channel();
        let (handle, _join) = spawn_countdown(timer, visibility_events, TimerConfig::default());
        Harness {
            clock,
            handle,
            events,
            notifier,
            faults,
        }
    }

    async fn next_tick(events: &mut UnboundedReceiver<TimerEvent>) -> TickEvent {
        loop {
            match events.recv().await {
                Some(TimerEvent::Tick(tick)) => return tick,
                Some(_) => continue,
                None => panic!("event channel closed"),
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn visibility_correction_is_retried_after_a_fault() {
        let mut h = harness();
        h.handle.start(10.0).await.unwrap();
        next_tick(&mut h.events).await;

        h.faults.store(1, Ordering::SeqCst);
        h.clock.advance(180_000);
        let restored_at = Instant::now();
        h.notifier.restored();

        let tick = next_tick(&mut h.events).await;
        assert_eq!(tick.remaining_ms, 420_000);
        assert_eq!(restored_at.elapsed(), Duration::from_millis(500));
    }

    #[tokio::test(start_paused = true)]
    async fn failed_retry_keeps_running_until_next_tick() {
        let mut h = harness();
        h.handle.start(10.0).await.unwrap();
        next_tick(&mut h.events).await;

        h.faults.store(2, Ordering::SeqCst);
        h.clock.advance(180_000);
        let restored_at = Instant::now();
        h.notifier.restored();

        let tick = next_tick(&mut h.events).await;
        assert_eq!(tick.remaining_ms, 420_000);
        assert_eq!(restored_at.elapsed(), Duration::from_secs(1));
        assert_eq!(h.faults.load(Ordering::SeqCst), 0);
        assert_eq!(h.handle.view().await.unwrap().status, TimerStatus::Running);
    }

    #[tokio::test(start_paused = true)]
    async fn repeated_sampling_faults_force_stop() {
        let mut h = harness();
        h.faults.store(3, Ordering::SeqCst);
        let started_at = Instant::now();
        h.handle.start(10.0).await.unwrap();

        assert_eq!(
            h.events.recv().await,
            Some(TimerEvent::Stopped { elapsed_ms: 0 })
        );
        assert_eq!(started_at.elapsed(), Duration::from_secs(2));

        let view = h.handle.view().await.unwrap();
        assert_eq!(view.status, TimerStatus::Stopped);
        assert!(h.handle.check_invariants().await.is_ok());

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(h.events.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn a_good_sample_resets_the_fault_count() {
        let mut h = harness();
        h.faults.store(2, Ordering::SeqCst);
        h.handle.start(10.0).await.unwrap();

        // Two faults, then a clean tick one recovery delay later.
        next_tick(&mut h.events).await;
        h.faults.store(2, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_secs(4)).await;

        assert_eq!(h.handle.view().await.unwrap().status, TimerStatus::Running);
    }
}
