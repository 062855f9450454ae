//! HTTP endpoint handlers

use std::sync::Arc;
use axum::{
    body::Bytes,
    extract::State,
    response::Json,
};
use tracing::{info, warn};

use crate::{
    error::TimerError,
    state::{AppState, TimerSnapshot},
    timer::{TimerView, Transition},
};
use super::responses::{
    AddTimeRequest, ApiError, ApiResponse, HealthResponse, InvariantsResponse, StartRequest,
    StatusResponse, VisibilityRequest,
};

type ApiResult<T> = Result<Json<T>, ApiError>;

/// Build the response for a transition and remember accepted actions
async fn respond(state: &AppState, action: &str, transition: Transition) -> ApiResult<ApiResponse> {
    if transition.is_applied() {
        state.record_action(action);
    }
    let view = state.timer.view().await?;
    Ok(Json(ApiResponse::from_transition(action, &transition, view)))
}

/// Handle POST /timer/start - Arm a fresh countdown
///
/// An empty body starts the configured default length; a body that does not
/// decode is rejected rather than falling back to the default.
pub async fn start_handler(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> ApiResult<ApiResponse> {
    let request = if body.iter().all(u8::is_ascii_whitespace) {
        StartRequest::default()
    } else {
        serde_json::from_slice::<StartRequest>(&body).map_err(TimerError::from)?
    };
    let minutes = request.minutes.unwrap_or(state.default_minutes);
    let transition = state.timer.start(minutes).await?;
    info!("Start endpoint called ({} minutes)", minutes);
    respond(&state, "start", transition).await
}

/// Handle POST /timer/pause
pub async fn pause_handler(State(state): State<Arc<AppState>>) -> ApiResult<ApiResponse> {
    let transition = state.timer.pause().await?;
    respond(&state, "pause", transition).await
}

/// Handle POST /timer/resume
pub async fn resume_handler(State(state): State<Arc<AppState>>) -> ApiResult<ApiResponse> {
    let transition = state.timer.resume().await?;
    respond(&state, "resume", transition).await
}

/// Handle POST /timer/stop
pub async fn stop_handler(State(state): State<Arc<AppState>>) -> ApiResult<ApiResponse> {
    let transition = state.timer.stop().await?;
    respond(&state, "stop", transition).await
}

/// Handle POST /timer/add-time
pub async fn add_time_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<AddTimeRequest>,
) -> ApiResult<ApiResponse> {
    let transition = state.timer.add_time(req.minutes).await?;
    respond(&state, "add-time", transition).await
}

/// Handle POST /timer/visibility - Page visibility changed
pub async fn visibility_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<VisibilityRequest>,
) -> ApiResult<TimerView> {
    let delivered = if req.visible {
        state.visibility.restored()
    } else {
        state.visibility.hidden()
    };
    if !delivered {
        warn!("Visibility change dropped: countdown loop is not running");
    }
    Ok(Json(state.timer.view().await?))
}

/// Handle GET /timer - Current countdown view
pub async fn timer_handler(State(state): State<Arc<AppState>>) -> ApiResult<TimerView> {
    Ok(Json(state.timer.view().await?))
}

/// Handle GET /timer/snapshot - Serialized state for client-side storage
pub async fn snapshot_handler(State(state): State<Arc<AppState>>) -> ApiResult<TimerSnapshot> {
    Ok(Json(state.timer.serialize().await?))
}

/// Handle GET /timer/invariants - Run the consistency check
pub async fn invariants_handler(State(state): State<Arc<AppState>>) -> ApiResult<InvariantsResponse> {
    let response = match state.timer.check_invariants().await {
        Ok(()) => InvariantsResponse { ok: true, error: None },
        Err(e) => InvariantsResponse {
            ok: false,
            error: Some(e.to_string()),
        },
    };
    Ok(Json(response))
}

/// Handle GET /status - Timer plus server metadata
pub async fn status_handler(State(state): State<Arc<AppState>>) -> ApiResult<StatusResponse> {
    let timer = state.timer.view().await?;
    let (last_action, last_action_time) = state.last_action();

    Ok(Json(StatusResponse {
        timer,
        uptime: state.uptime(),
        port: state.port,
        host: state.host.clone(),
        last_action,
        last_action_time,
    }))
}

/// Handle GET /health - Health check endpoint
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::ok())
}
