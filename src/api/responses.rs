//! API request and response structures

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    error::TimerError,
    timer::{TimerView, Transition},
};

/// Body of POST /timer/start; minutes default to the configured length
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StartRequest {
    pub minutes: Option<f64>,
}

/// Body of POST /timer/add-time
#[derive(Debug, Clone, Deserialize)]
pub struct AddTimeRequest {
    pub minutes: f64,
}

/// Body of POST /timer/visibility, sent by the page on `visibilitychange`
#[derive(Debug, Clone, Deserialize)]
pub struct VisibilityRequest {
    pub visible: bool,
}

/// API response structure for state change endpoints
#[derive(Debug, Clone, Serialize)]
pub struct ApiResponse {
    pub status: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    pub timer: TimerView,
}

impl ApiResponse {
    /// Create a new API response
    pub fn new(status: &str, message: String, timer: TimerView) -> Self {
        Self {
            status: status.to_string(),
            message,
            timestamp: Utc::now(),
            timer,
        }
    }

    /// Describe the outcome of a transition
    pub fn from_transition(action: &str, transition: &Transition, timer: TimerView) -> Self {
        match transition {
            Transition::Applied { from, to } => {
                Self::new("applied", format!("{}: {} -> {}", action, from, to), timer)
            }
            Transition::Ignored(warning) => Self::new("ignored", warning.to_string(), timer),
        }
    }
}

/// Enhanced status response with server information
#[derive(Debug, Clone, Serialize)]
pub struct StatusResponse {
    pub timer: TimerView,
    pub uptime: String,
    pub port: u16,
    pub host: String,
    pub last_action: Option<String>,
    pub last_action_time: Option<DateTime<Utc>>,
}

/// Result of GET /timer/invariants
#[derive(Debug, Clone, Serialize)]
pub struct InvariantsResponse {
    pub ok: bool,
    pub error: Option<String>,
}

/// Health check response
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: DateTime<Utc>,
    pub version: String,
}

impl HealthResponse {
    /// Create a new health response
    pub fn ok() -> Self {
        Self {
            status: "ok".to_string(),
            timestamp: Utc::now(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
struct ErrorBody {
    status: &'static str,
    message: String,
    timestamp: DateTime<Utc>,
}

/// Timer errors rendered as JSON with a matching status code
#[derive(Debug)]
pub struct ApiError(pub TimerError);

impl From<TimerError> for ApiError {
    fn from(err: TimerError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let code = match &self.0 {
            TimerError::InvalidDuration { .. }
            | TimerError::MalformedSnapshot(_)
            | TimerError::Json(_) => StatusCode::BAD_REQUEST,
            TimerError::LoopClosed => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = ErrorBody {
            status: "error",
            message: self.0.to_string(),
            timestamp: Utc::now(),
        };
        (code, Json(body)).into_response()
    }
}
