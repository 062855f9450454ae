//! Countdown engine, observers and the async handle

mod countdown;
mod handle;
mod observer;

pub use countdown::{minutes_to_ms, CountdownTimer, Sample, SampleKind, TimerView, Transition};
pub use handle::{Command, TimerHandle};
pub use observer::{
    ChannelObserver, ObserverRegistry, SubscriptionId, TickEvent, TimerEvent, TimerObserver,
    WarningEvent,
};
