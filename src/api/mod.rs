//! HTTP API module
//!
//! Local control surface for the countdown, plus optional static hosting of
//! the quiz front-end.

pub mod handlers;
pub mod responses;

use std::{path::Path, sync::Arc};
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};

use crate::state::AppState;
use handlers::*;

/// Create the HTTP router with all endpoints
pub fn create_router(state: Arc<AppState>, serve_dir: Option<&Path>) -> Router {
    let router = Router::new()
        .route("/timer", get(timer_handler))
        .route("/timer/start", post(start_handler))
        .route("/timer/pause", post(pause_handler))
        .route("/timer/resume", post(resume_handler))
        .route("/timer/stop", post(stop_handler))
        .route("/timer/add-time", post(add_time_handler))
        .route("/timer/visibility", post(visibility_handler))
        .route("/timer/snapshot", get(snapshot_handler))
        .route("/timer/invariants", get(invariants_handler))
        .route("/status", get(status_handler))
        .route("/health", get(health_handler));

    let router = match serve_dir {
        Some(dir) => router.fallback_service(ServeDir::new(dir)),
        None => router,
    };

    router
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
