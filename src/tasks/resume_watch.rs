//! Process resume detection

use futures::stream::StreamExt;
use tracing::{info, warn};

use crate::{utils::continue_signals, visibility::VisibilityNotifier};

/// Background task that forwards SIGCONT as a visibility restore.
///
/// A process stopped with Ctrl-Z (or frozen by the host) misses every tick
/// while it is stopped, the same way a throttled background tab does.
pub async fn resume_watch_task(notifier: VisibilityNotifier) {
    let mut signals = match continue_signals() {
        Ok(signals) => signals,
        Err(e) => {
            warn!("Resume detection unavailable: {}", e);
            return;
        }
    };
    info!("Starting resume watch task");

    while signals.next().await.is_some() {
        info!("Process resumed, forcing timer correction");
        if !notifier.restored() {
            info!("Countdown loop closed, stopping resume watch");
            break;
        }
    }
}
