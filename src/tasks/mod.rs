//! Background tasks module
//! 
//! This module contains the countdown loop and the tasks that run alongside it.

pub mod autosave;
pub mod countdown_loop;
pub mod resume_watch;

// Re-export main functions
pub use autosave::{autosave_task, save_now};
pub use countdown_loop::{countdown_loop_task, spawn_countdown};
pub use resume_watch::resume_watch_task;
