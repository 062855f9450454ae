//! Host visibility notifications
//!
//! The host tells the countdown loop when its page (or process) went to the
//! background and when it came back. Only the restore matters to the timer:
//! it forces an immediate recomputation instead of waiting for the next tick.

use tokio::sync::mpsc;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisibilityEvent {
    Hidden,
    Restored,
}

/// Sending half, held by the host environment
#[derive(Debug, Clone)]
pub struct VisibilityNotifier {
    tx: mpsc::UnboundedSender<VisibilityEvent>,
}

/// Receiving half, consumed by the countdown loop
#[derive(Debug)]
pub struct VisibilityEvents {
    rx: mpsc::UnboundedReceiver<VisibilityEvent>,
}

/// Create a connected notifier/receiver pair
pub fn channel() -> (VisibilityNotifier, VisibilityEvents) {
    let (tx, rx) = mpsc::unbounded_channel();
    (VisibilityNotifier { tx }, VisibilityEvents { rx })
}

impl VisibilityNotifier {
    pub fn hidden(&self) -> bool {
        self.send(VisibilityEvent::Hidden)
    }

    pub fn restored(&self) -> bool {
        self.send(VisibilityEvent::Restored)
    }

    /// Returns false if the countdown loop has gone away
    pub fn send(&self, event: VisibilityEvent) -> bool {
        debug!("Visibility event: {:?}", event);
        self.tx.send(event).is_ok()
    }
}

impl VisibilityEvents {
    pub async fn recv(&mut self) -> Option<VisibilityEvent> {
        self.rx.recv().await
    }
}
