//! Shared state for the HTTP layer

use std::{sync::Mutex, time::Instant};

use chrono::{DateTime, Utc};

use crate::{timer::TimerHandle, visibility::VisibilityNotifier};

/// Everything a request handler needs to reach the countdown
#[derive(Debug)]
pub struct AppState {
    /// Handle to the countdown loop
    pub timer: TimerHandle,
    /// Host visibility channel into the countdown loop
    pub visibility: VisibilityNotifier,
    /// Duration used when a start request omits one
    pub default_minutes: f64,
    /// Server metadata
    pub start_time: Instant,
    pub port: u16,
    pub host: String,
    /// Last action tracking
    last_action: Mutex<Option<(String, DateTime<Utc>)>>,
}

impl AppState {
    pub fn new(
        timer: TimerHandle,
        visibility: VisibilityNotifier,
        default_minutes: f64,
        port: u16,
        host: String,
    ) -> Self {
        Self {
            timer,
            visibility,
            default_minutes,
            start_time: Instant::now(),
            port,
            host,
            last_action: Mutex::new(None),
        }
    }

    /// Record an accepted API action
    pub fn record_action(&self, action: &str) {
        if let Ok(mut last) = self.last_action.lock() {
            *last = Some((action.to_string(), Utc::now()));
        }
    }

    /// Get last action information
    pub fn last_action(&self) -> (Option<String>, Option<DateTime<Utc>>) {
        match self.last_action.lock().ok().and_then(|a| a.clone()) {
            Some((action, at)) => (Some(action), Some(at)),
            None => (None, None),
        }
    }

    /// Calculate server uptime as a formatted string
    pub fn uptime(&self) -> String {
        let duration = self.start_time.elapsed();
        let hours = duration.as_secs() / 3600;
        let minutes = (duration.as_secs() % 3600) / 60;
        let seconds = duration.as_secs() % 60;

        if hours > 0 {
            format!("{}h {}m {}s", hours, minutes, seconds)
        } else if minutes > 0 {
            format!("{}m {}s", minutes, seconds)
        } else {
            format!("{}s", seconds)
        }
    }
}
