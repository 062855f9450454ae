//! Quiz Timer - countdown service for timed assessments
//!
//! This is the main entry point for the quiz-timer application.

use std::{sync::Arc, time::Duration};
use tokio::{net::TcpListener, sync::mpsc::UnboundedReceiver};
use tracing::{info, warn};

use quiz_timer::{
    api::create_router,
    config::Config,
    state::{AppState, TimerStatus},
    store::{FileStore, SnapshotStore},
    tasks::{autosave_task, resume_watch_task, save_now, spawn_countdown},
    timer::{ChannelObserver, CountdownTimer, TimerEvent, TimerHandle},
    utils::shutdown_signal,
    visibility,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::parse();

    // Initialize tracing with appropriate log level
    tracing_subscriber::fmt()
        .with_env_filter(format!("quiz_timer={},tower_http=info", config.log_level()))
        .init();

    info!("Starting quiz-timer v{}", env!("CARGO_PKG_VERSION"));
    info!(
        "Configuration: host={}, port={}, minutes={}, warnings={:?}",
        config.host, config.port, config.minutes, config.warnings
    );

    let timer_config = config.timer_config();
    let state_dir = config.state_dir()?;
    let store = SnapshotStore::new(FileStore::open(&state_dir)?, timer_config.storage_key.clone());
    info!("Snapshots stored in {} under key {}", state_dir.display(), store.key());

    let mut timer = CountdownTimer::with_system_clock(timer_config.thresholds());
    let (observer, events) = ChannelObserver::channel();
    timer.subscribe(observer);

    if config.fresh {
        if let Err(e) = store.clear() {
            warn!("Failed to clear saved snapshot: {}", e);
        }
    } else {
        match store.load() {
            Ok(Some(snapshot)) => {
                timer.restore(snapshot);
            }
            Ok(None) => {}
            Err(e) => {
                warn!("Discarding unreadable snapshot: {}", e);
                if let Err(e) = store.clear() {
                    warn!("Failed to clear saved snapshot: {}", e);
                }
            }
        }
    }

    // Start the countdown loop and its companions
    let (notifier, visibility_events) = visibility::channel();
    let (handle, _loop_task) = spawn_countdown(timer, visibility_events, timer_config);

    if config.start && handle.view().await?.status == TimerStatus::Idle {
        handle.start(config.minutes).await?;
    }

    tokio::spawn(autosave_task(
        handle.clone(),
        store.clone(),
        Duration::from_secs(config.autosave_secs.max(1)),
    ));
    tokio::spawn(resume_watch_task(notifier.clone()));
    tokio::spawn(assessment_events_task(events, handle.clone(), store.clone()));

    // Create HTTP router with all endpoints
    let state = Arc::new(AppState::new(
        handle.clone(),
        notifier,
        config.minutes,
        config.port,
        config.host.clone(),
    ));
    let app = create_router(state, config.serve_dir.as_deref());

    // Bind to the specified address
    let addr = config.address();
    let listener = TcpListener::bind(&addr).await?;

    info!("Server running on http://{}", addr);
    info!("Endpoints:");
    info!("  GET  /timer             - Current countdown");
    info!("  POST /timer/start       - Start a countdown {{\"minutes\": n}}");
    info!("  POST /timer/pause       - Pause");
    info!("  POST /timer/resume      - Resume");
    info!("  POST /timer/stop        - Stop");
    info!("  POST /timer/add-time    - Extend {{\"minutes\": n}}");
    info!("  POST /timer/visibility  - Page visibility {{\"visible\": bool}}");
    info!("  GET  /timer/snapshot    - Serialized state");
    info!("  GET  /health            - Health check");
    if let Some(dir) = &config.serve_dir {
        info!("Serving quiz files from {}", dir.display());
    }

    if config.open {
        if let Err(e) = open::that(format!("http://{}", addr)) {
            warn!("Failed to open browser: {}", e);
        }
    }

    // Setup graceful shutdown
    let server = axum::serve(listener, app);

    tokio::select! {
        result = server => {
            if let Err(e) = result {
                tracing::error!("Server error: {}", e);
            }
        }
        _ = shutdown_signal() => {
            info!("Shutdown signal received");
        }
    }

    if let Err(e) = save_now(&handle, &store).await {
        warn!("Failed to save snapshot on shutdown: {}", e);
    }

    info!("Server shutdown complete");
    Ok(())
}

/// Reacts to terminal timer events on behalf of the quiz controller
async fn assessment_events_task(
    mut events: UnboundedReceiver<TimerEvent>,
    handle: TimerHandle,
    store: SnapshotStore<FileStore>,
) {
    while let Some(event) = events.recv().await {
        let persist = match event {
            TimerEvent::Tick(_) => false,
            TimerEvent::Warning(warning) => {
                info!(
                    "{} minute(s) left ({})",
                    warning.threshold_minutes, warning.formatted
                );
                false
            }
            TimerEvent::Expired => {
                info!("Time is up: finalizing and submitting the assessment");
                true
            }
            TimerEvent::Stopped { elapsed_ms } => {
                info!("Assessment stopped after {}s", elapsed_ms / 1000);
                true
            }
        };

        // Terminal states are saved right away so a reload cannot re-arm them.
        if persist {
            if let Err(e) = save_now(&handle, &store).await {
                warn!("Failed to save terminal snapshot: {}", e);
            }
        }
    }
}
