//! Quiz Timer - drift-free countdown engine for timed assessments
//! 
//! This library provides the countdown timer behind an in-browser exam: a
//! wall-clock-derived state machine with one-time warning thresholds, a
//! snapshot format that survives page reloads, and an async loop that keeps
//! sampling it once per second and corrects itself when the host comes back
//! from the background.

pub mod api;
pub mod clock;
pub mod config;
pub mod error;
pub mod state;
pub mod store;
pub mod tasks;
pub mod timer;
pub mod utils;
pub mod visibility;

// Re-export commonly used types
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{Config, TimerConfig};
pub use error::{CallbackFault, TimerError, TimerWarning};
pub use state::{TimerSnapshot, TimerStatus, WarningThresholds};
pub use store::{FileStore, KeyValueStore, MemoryStore, SnapshotStore};
pub use tasks::spawn_countdown;
pub use timer::{CountdownTimer, TimerEvent, TimerHandle, TimerObserver, TimerView, Transition};
pub use api::create_router;
pub use utils::signals::shutdown_signal;
