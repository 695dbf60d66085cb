use super::state::{AppState, OperatorCommand};
use crate::session::{SessionState, SessionStatus};
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde::Serialize;
use tracing::{error, info, warn};

// ============================================================================
// Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct CommandResponse {
    pub command: String,
    pub status: String,
    pub state: SessionState,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

// ============================================================================
// Handlers
// ============================================================================

/// Queue a command if the session is in a state that accepts it
async fn forward(
    state: AppState,
    command: OperatorCommand,
    name: &str,
    accepted_in: &[SessionState],
) -> axum::response::Response {
    let current = state.status.borrow().state;

    if !accepted_in.contains(&current) {
        warn!("Operator {} refused while {}", name, current);
        return (
            StatusCode::CONFLICT,
            Json(ErrorResponse {
                error: format!("{} is not accepted while {}", name, current),
            }),
        )
            .into_response();
    }

    if let Err(e) = state.commands.send(command).await {
        error!("Failed to forward {}: {}", name, e);
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ErrorResponse {
                error: "session loop is not running".to_string(),
            }),
        )
            .into_response();
    }

    info!("Operator {} queued", name);

    (
        StatusCode::ACCEPTED,
        Json(CommandResponse {
            command: name.to_string(),
            status: "queued".to_string(),
            state: current,
        }),
    )
        .into_response()
}

/// POST /session/ready
/// Subject is ready for calibration or for the challenges
pub async fn ready(State(state): State<AppState>) -> impl IntoResponse {
    forward(
        state,
        OperatorCommand::Ready,
        "ready",
        &[
            SessionState::WaitingForBrightnessCalibration,
            SessionState::WaitingForChallenges,
        ],
    )
    .await
}

/// POST /session/stop-recording
/// Subject finished answering
pub async fn stop_recording(State(state): State<AppState>) -> impl IntoResponse {
    forward(
        state,
        OperatorCommand::StopRecording,
        "stop-recording",
        &[SessionState::RecordingResponse],
    )
    .await
}

/// GET /session/status
pub async fn get_status(State(state): State<AppState>) -> impl IntoResponse {
    let status: SessionStatus = state.status.borrow().clone();
    (StatusCode::OK, Json(status))
}

/// GET /health
/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}
