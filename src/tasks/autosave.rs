//! Periodic snapshot persistence

use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::{
    error::{Result, TimerError},
    store::{KeyValueStore, SnapshotStore},
    timer::TimerHandle,
};

/// Serialize the countdown and write it to `store`
pub async fn save_now<S: KeyValueStore>(handle: &TimerHandle, store: &SnapshotStore<S>) -> Result<()> {
    let snapshot = handle.serialize().await?;
    store.save(&snapshot)?;
    debug!(
        "Saved {} snapshot ({}ms remaining)",
        snapshot.status, snapshot.remaining_at_snapshot_ms
    );
    Ok(())
}

/// Background task that saves the snapshot every `every` until the loop goes away
pub async fn autosave_task<S: KeyValueStore>(handle: TimerHandle, store: SnapshotStore<S>, every: Duration) {
    info!("Starting autosave task (every {:?})", every);

    let mut interval = interval(every);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        interval.tick().await;

        match save_now(&handle, &store).await {
            Ok(()) => {}
            Err(TimerError::LoopClosed) => {
                info!("Countdown loop closed, stopping autosave");
                break;
            }
            Err(e) => warn!("Failed to autosave timer snapshot: {}", e),
        }
    }
}
