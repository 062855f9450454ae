//! State management module
//! 
//! This module contains the timer state, its warning thresholds, the
//! persisted snapshot form and the shared application state.

pub mod app_state;
pub mod snapshot;
pub mod thresholds;
pub mod timer_state;

// Re-export main types
pub use app_state::AppState;
pub use snapshot::{TimerSnapshot, SNAPSHOT_VERSION};
pub use thresholds::{remaining_minutes_ceil, WarningThresholds};
pub use timer_state::{TimerState, TimerStatus, MS_PER_MINUTE};
