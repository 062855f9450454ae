//! End-to-end countdown scenarios driven by a manual clock.

use std::sync::Arc;

use proptest::prelude::*;
use quiz_timer::{
    timer::{ChannelObserver, SampleKind},
    CountdownTimer, ManualClock, TimerEvent, TimerStatus, WarningThresholds,
};
use tokio::sync::mpsc::UnboundedReceiver;

const MINUTE: i64 = 60_000;

fn timer_with(clock: &ManualClock, thresholds: &[u32]) -> (CountdownTimer, UnboundedReceiver<TimerEvent>) {
    let mut timer = CountdownTimer::new(
        Arc::new(clock.clone()),
        WarningThresholds::new(thresholds.iter().copied()),
    );
    let (observer, rx) = ChannelObserver::channel();
    timer.subscribe(observer);
    (timer, rx)
}

fn drain(rx: &mut UnboundedReceiver<TimerEvent>) -> Vec<TimerEvent> {
    std::iter::from_fn(|| rx.try_recv().ok()).collect()
}

fn warnings(events: &[TimerEvent]) -> Vec<u32> {
    events
        .iter()
        .filter_map(|e| match e {
            TimerEvent::Warning(w) => Some(w.threshold_minutes),
            _ => None,
        })
        .collect()
}

#[test]
fn one_minute_exam_warns_immediately_and_expires_at_sixty_seconds() {
    let clock = ManualClock::new(1_700_000_000_000);
    let (mut timer, mut rx) = timer_with(&clock, &[1]);

    timer.start(1.0).unwrap();
    timer.sample().unwrap();
    let events = drain(&mut rx);
    assert_eq!(warnings(&events), vec![1]);
    assert!(matches!(events.last(), Some(TimerEvent::Tick(t)) if t.formatted == "01:00"));

    for _ in 0..59 {
        clock.advance(1_000);
        let sample = timer.sample().unwrap();
        assert!(matches!(sample.kind, SampleKind::Ticked(_)));
    }
    assert!(!drain(&mut rx).contains(&TimerEvent::Expired));

    clock.advance(1_000);
    assert_eq!(timer.sample().unwrap().kind, SampleKind::Expired);
    clock.advance(5_000);
    timer.sample().unwrap();

    let events = drain(&mut rx);
    assert_eq!(events, vec![TimerEvent::Expired]);
    assert_eq!(timer.status(), TimerStatus::Expired);
    assert_eq!(timer.remaining_ms(), 0);
}

#[test]
fn pause_does_not_consume_exam_time() {
    let clock = ManualClock::new(0);
    let (mut timer, _rx) = timer_with(&clock, &[]);

    timer.start(80.0).unwrap();
    clock.advance(10 * MINUTE);
    timer.pause();
    clock.advance(5 * MINUTE);
    timer.resume();

    assert_eq!(timer.remaining_ms(), 70 * MINUTE as u64);
    assert_eq!(timer.elapsed_ms(), 10 * MINUTE as u64);
}

#[test]
fn stalled_loop_is_corrected_on_visibility_restore() {
    let clock = ManualClock::new(0);
    let (mut timer, mut rx) = timer_with(&clock, &[]);

    timer.start(10.0).unwrap();
    timer.sample().unwrap();
    drain(&mut rx);

    // Loop silently stalled while the tab was in the background.
    clock.advance(3 * MINUTE);
    timer.on_visibility_restored().unwrap();

    let events = drain(&mut rx);
    assert_eq!(events.len(), 1);
    match &events[0] {
        TimerEvent::Tick(tick) => {
            assert_eq!(tick.remaining_ms, 7 * MINUTE as u64);
            assert_eq!(tick.elapsed_ms, 3 * MINUTE as u64);
            assert_eq!(tick.formatted, "07:00");
        }
        other => panic!("expected tick, got {:?}", other),
    }
    assert_eq!(timer.remaining_ms(), 7 * MINUTE as u64);
}

#[test]
fn every_crossed_threshold_fires_once_per_run() {
    let clock = ManualClock::new(0);
    let (mut timer, mut rx) = timer_with(&clock, &[1, 5, 30, 15]);

    timer.start(40.0).unwrap();
    timer.sample().unwrap();
    assert!(warnings(&drain(&mut rx)).is_empty());

    clock.advance(36 * MINUTE);
    let sample = timer.sample().unwrap();
    assert_eq!(sample.warnings, vec![30, 15, 5]);
    assert_eq!(warnings(&drain(&mut rx)), vec![30, 15, 5]);

    timer.sample().unwrap();
    assert!(warnings(&drain(&mut rx)).is_empty());

    clock.advance(3 * MINUTE + 30_000);
    timer.sample().unwrap();
    assert_eq!(warnings(&drain(&mut rx)), vec![1]);

    clock.advance(MINUTE);
    timer.sample().unwrap();
    assert_eq!(drain(&mut rx), vec![TimerEvent::Expired]);

    // A fresh run warns again.
    timer.start(40.0).unwrap();
    clock.advance(39 * MINUTE + 30_000);
    timer.sample().unwrap();
    assert_eq!(warnings(&drain(&mut rx)), vec![30, 15, 5, 1]);
}

#[test]
fn thirty_minute_warning_fires_at_thirty_zero_zero() {
    let clock = ManualClock::new(0);
    let (mut timer, mut rx) = timer_with(&clock, &[30]);
    timer.start(80.0).unwrap();

    clock.advance(50 * MINUTE - 1_000);
    timer.sample().unwrap();
    assert!(warnings(&drain(&mut rx)).is_empty());

    clock.advance(1_000);
    timer.sample().unwrap();
    let events = drain(&mut rx);
    assert_eq!(warnings(&events), vec![30]);
    assert!(matches!(&events[0], TimerEvent::Warning(w) if w.formatted == "30:00"));
}

#[test]
fn running_timer_survives_serialize_restore() {
    let clock = ManualClock::new(5_000_000);
    let (mut original, _rx) = timer_with(&clock, &[30, 15]);
    original.start(45.0).unwrap();
    clock.advance(20 * MINUTE + 7_250);
    original.sample().unwrap();

    let snapshot = original.serialize();
    let json = serde_json::to_string(&snapshot).unwrap();

    let (mut restored, _rx2) = timer_with(&clock, &[30, 15]);
    assert!(restored.restore_json(&json).is_applied());
    assert_eq!(restored.status(), TimerStatus::Running);
    assert_eq!(restored.remaining_ms(), original.remaining_ms());
    assert_eq!(
        restored.state().fired_thresholds,
        original.state().fired_thresholds
    );

    clock.advance(90_000);
    assert_eq!(restored.remaining_ms(), original.remaining_ms());
    assert_eq!(restored.elapsed_ms(), original.elapsed_ms());
}

#[test]
fn time_spent_away_counts_against_the_budget() {
    let clock = ManualClock::new(0);
    let (mut timer, _rx) = timer_with(&clock, &[]);
    timer.start(30.0).unwrap();
    clock.advance(5 * MINUTE);
    let snapshot = timer.serialize();

    // Page torn down for two minutes before being recreated.
    clock.advance(2 * MINUTE);
    let (mut reloaded, mut rx) = timer_with(&clock, &[]);
    reloaded.restore(snapshot);
    assert_eq!(reloaded.remaining_ms(), 23 * MINUTE as u64);

    // Away long enough to run out: expires on the first sample.
    clock.advance(30 * MINUTE);
    reloaded.sample().unwrap();
    assert_eq!(drain(&mut rx), vec![TimerEvent::Expired]);
}

#[test]
fn paused_timer_restores_paused() {
    let clock = ManualClock::new(0);
    let (mut timer, _rx) = timer_with(&clock, &[]);
    timer.start(10.0).unwrap();
    clock.advance(MINUTE);
    timer.pause();
    let snapshot = timer.serialize();

    clock.advance(60 * MINUTE);
    let (mut reloaded, _rx2) = timer_with(&clock, &[]);
    reloaded.restore(snapshot);
    assert_eq!(reloaded.status(), TimerStatus::Paused);
    assert_eq!(reloaded.remaining_ms(), 9 * MINUTE as u64);
    assert!(reloaded.state().started_at_epoch_ms.is_none());
}

proptest! {
    #[test]
    fn remaining_after_start_equals_duration(minutes in 1u32..=600) {
        let clock = ManualClock::new(42);
        let (mut timer, _rx) = timer_with(&clock, &[]);
        timer.start(f64::from(minutes)).unwrap();
        prop_assert_eq!(timer.remaining_ms(), u64::from(minutes) * 60_000);
    }

    #[test]
    fn remaining_is_non_increasing_and_zero_only_when_expired(
        minutes in 1u32..=20,
        steps in proptest::collection::vec(0i64..90_000, 1..60),
    ) {
        let clock = ManualClock::new(0);
        let (mut timer, _rx) = timer_with(&clock, &[5, 1]);
        timer.start(f64::from(minutes)).unwrap();
        let mut previous = timer.remaining_ms();

        for step in steps {
            clock.advance(step);
            timer.sample().unwrap();
            let remaining = timer.remaining_ms();
            prop_assert!(remaining <= previous);
            prop_assert_eq!(remaining == 0, timer.status() == TimerStatus::Expired);
            previous = remaining;
        }
    }

    #[test]
    fn instant_pause_resume_preserves_remaining(
        run_ms in 0i64..600_000,
        paused_ms in 0i64..3_600_000,
    ) {
        let clock = ManualClock::new(0);
        let (mut timer, _rx) = timer_with(&clock, &[]);
        timer.start(10.0).unwrap();
        clock.advance(run_ms);
        let before = timer.remaining_ms();
        timer.pause();
        clock.advance(paused_ms);
        timer.resume();
        prop_assert_eq!(timer.remaining_ms(), before);
    }
}
