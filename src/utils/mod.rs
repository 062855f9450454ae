//! Utility functions module
//! 
//! Display formatting and process signal helpers.

pub mod format;
pub mod signals;

// Re-export main functions
pub use format::format_mm_ss;
pub use signals::{continue_signals, shutdown_signal};
