//! Observer registration and fault-contained dispatch

use std::panic::{catch_unwind, AssertUnwindSafe};

use serde::Serialize;
use tokio::sync::mpsc;
use tracing::error;

use crate::error::{CallbackFault, CallbackKind};

/// Payload of the once-per-second notification
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TickEvent {
    pub remaining_ms: u64,
    pub formatted: String,
    pub progress_percent: f64,
    pub elapsed_ms: u64,
}

/// Payload of a threshold warning
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WarningEvent {
    pub threshold_minutes: u32,
    pub remaining_ms: u64,
    pub formatted: String,
}

/// Every notification as a single value, for channel consumers
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum TimerEvent {
    Tick(TickEvent),
    Warning(WarningEvent),
    Expired,
    Stopped {
        #[serde(rename = "elapsedMs")]
        elapsed_ms: u64,
    },
}

/// Subscriber to timer notifications.
///
/// Returning an error (or panicking) is contained by the engine; it never
/// stops the countdown.
pub trait TimerObserver: Send {
    fn on_tick(&mut self, _event: &TickEvent) -> anyhow::Result<()> {
        Ok(())
    }

    fn on_warning(&mut self, _event: &WarningEvent) -> anyhow::Result<()> {
        Ok(())
    }

    fn on_expired(&mut self) -> anyhow::Result<()> {
        Ok(())
    }

    fn on_stopped(&mut self, _elapsed_ms: u64) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Forwards notifications into an mpsc channel
#[derive(Debug, Clone)]
pub struct ChannelObserver {
    tx: mpsc::UnboundedSender<TimerEvent>,
}

impl ChannelObserver {
    pub fn new(tx: mpsc::UnboundedSender<TimerEvent>) -> Self {
        Self { tx }
    }

    /// Observer plus the receiving end
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<TimerEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }

    fn forward(&self, event: TimerEvent) -> anyhow::Result<()> {
        self.tx
            .send(event)
            .map_err(|_| anyhow::anyhow!("event receiver dropped"))
    }
}

impl TimerObserver for ChannelObserver {
    fn on_tick(&mut self, event: &TickEvent) -> anyhow::Result<()> {
        self.forward(TimerEvent::Tick(event.clone()))
    }

    fn on_warning(&mut self, event: &WarningEvent) -> anyhow::Result<()> {
        self.forward(TimerEvent::Warning(event.clone()))
    }

    fn on_expired(&mut self) -> anyhow::Result<()> {
        self.forward(TimerEvent::Expired)
    }

    fn on_stopped(&mut self, elapsed_ms: u64) -> anyhow::Result<()> {
        self.forward(TimerEvent::Stopped { elapsed_ms })
    }
}

/// Handle returned by `subscribe`, used to unsubscribe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub u64);

/// Ordered list of subscribed observers
#[derive(Default)]
pub struct ObserverRegistry {
    next_id: u64,
    observers: Vec<(SubscriptionId, Box<dyn TimerObserver>)>,
}

impl ObserverRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, observer: Box<dyn TimerObserver>) -> SubscriptionId {
        self.next_id += 1;
        let id = SubscriptionId(self.next_id);
        self.observers.push((id, observer));
        id
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.observers.len();
        self.observers.retain(|(sid, _)| *sid != id);
        self.observers.len() != before
    }

    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }

    /// Invoke `call` on every observer; faults are logged and collected
    pub fn notify<F>(&mut self, kind: CallbackKind, mut call: F) -> Vec<CallbackFault>
    where
        F: FnMut(&mut dyn TimerObserver) -> anyhow::Result<()>,
    {
        let mut faults = Vec::new();
        for (id, observer) in self.observers.iter_mut() {
            let outcome = catch_unwind(AssertUnwindSafe(|| call(observer.as_mut())));
            let message = match outcome {
                Ok(Ok(())) => continue,
                Ok(Err(e)) => e.to_string(),
                Err(panic) => panic_message(panic.as_ref()),
            };
            let fault = CallbackFault {
                kind,
                subscription: id.0,
                message,
            };
            error!("{}", fault);
            faults.push(fault);
        }
        faults
    }
}

impl std::fmt::Debug for ObserverRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObserverRegistry")
            .field("observers", &self.observers.len())
            .finish()
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("panicked: {}", s)
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("panicked: {}", s)
    } else {
        "panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Failing;

    impl TimerObserver for Failing {
        fn on_expired(&mut self) -> anyhow::Result<()> {
            anyhow::bail!("scoring backend unavailable")
        }
    }

    struct Panicking;

    impl TimerObserver for Panicking {
        fn on_expired(&mut self) -> anyhow::Result<()> {
            panic!("render crashed")
        }
    }

    #[test]
    fn faults_are_collected_and_other_observers_still_run() {
        let mut registry = ObserverRegistry::new();
        let (observer, mut rx) = ChannelObserver::channel();
        registry.subscribe(Box::new(Failing));
        registry.subscribe(Box::new(Panicking));
        registry.subscribe(Box::new(observer));

        let faults = registry.notify(CallbackKind::Expired, |o| o.on_expired());

        assert_eq!(faults.len(), 2);
        assert_eq!(faults[0].subscription, 1);
        assert!(faults[0].message.contains("scoring backend"));
        assert!(faults[1].message.contains("render crashed"));
        assert_eq!(rx.try_recv().unwrap(), TimerEvent::Expired);
    }

    #[test]
    fn unsubscribe_removes_observer() {
        let mut registry = ObserverRegistry::new();
        let (observer, mut rx) = ChannelObserver::channel();
        let id = registry.subscribe(Box::new(observer));
        assert!(registry.unsubscribe(id));
        assert!(!registry.unsubscribe(id));
        assert!(registry.is_empty());

        registry.notify(CallbackKind::Expired, |o| o.on_expired());
        assert!(rx.try_recv().is_err());
    }
}
