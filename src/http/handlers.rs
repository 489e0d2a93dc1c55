use super::state::AppState;
use crate::capture::CaptureError;
use crate::encoder::EncoderError;
use crate::session::{SessionError, SessionSettings, SessionState};
use crate::storage::Theme;
use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;
use tracing::{error, info};

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct StartRecordingResponse {
    pub session_id: String,
    pub status: String,
}

#[derive(Debug, Serialize)]
pub struct StopRecordingResponse {
    pub status: String,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct SettingsResponse {
    pub settings: SessionSettings,
    pub state: SessionState,
}

#[derive(Debug, Serialize)]
pub struct ThemeResponse {
    pub theme: Theme,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

fn error_response(e: &SessionError) -> Response {
    let status = match e {
        SessionError::Busy(_) | SessionError::NotRecording | SessionError::ControlsLocked(_) => {
            StatusCode::CONFLICT
        }
        SessionError::Capture(CaptureError::AccessDenied(_)) => StatusCode::FORBIDDEN,
        SessionError::Capture(CaptureError::NotSupported(_))
        | SessionError::Encoder(EncoderError::NotSupported(_)) => StatusCode::UNPROCESSABLE_ENTITY,
        SessionError::RecorderClosed => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };

    (
        status,
        Json(ErrorResponse {
            error: e.to_string(),
        }),
    )
        .into_response()
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /health
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

/// GET /status
pub async fn get_status(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.status.snapshot())
}

/// POST /record/start
/// Resolves once capture access is granted or refused
pub async fn start_recording(State(state): State<AppState>) -> Response {
    match state.recorder.start().await {
        Ok(id) => {
            info!("Recording started via HTTP: {}", id);
            (
                StatusCode::OK,
                Json(StartRecordingResponse {
                    session_id: id.to_string(),
                    status: SessionState::Recording.to_string(),
                }),
            )
                .into_response()
        }
        Err(e) => {
            error!("Failed to start recording: {}", e);
            error_response(&e)
        }
    }
}

/// POST /record/stop
/// The recording is saved asynchronously; poll /status for the result
pub async fn stop_recording(State(state): State<AppState>) -> Response {
    match state.recorder.stop().await {
        Ok(()) => (
            StatusCode::ACCEPTED,
            Json(StopRecordingResponse {
                status: SessionState::Processing.to_string(),
                message: "Recording stopped, saving".to_string(),
            }),
        )
            .into_response(),
        Err(e) => error_response(&e),
    }
}

/// GET /settings
pub async fn get_settings(State(state): State<AppState>) -> Response {
    match state.recorder.settings().await {
        Ok((settings, session_state)) => Json(SettingsResponse {
            settings,
            state: session_state,
        })
        .into_response(),
        Err(e) => error_response(&e),
    }
}

/// PUT /settings
pub async fn update_settings(
    State(state): State<AppState>,
    Json(settings): Json<SessionSettings>,
) -> Response {
    match state.recorder.configure(settings).await {
        Ok(()) => Json(SettingsResponse {
            settings,
            state: SessionState::Idle,
        })
        .into_response(),
        Err(e) => error_response(&e),
    }
}

/// GET /preview
/// Bytes of the last finished recording
pub async fn get_preview(State(state): State<AppState>) -> Response {
    match state.status.snapshot().preview {
        Some(artifact) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, artifact.mime_type())],
            artifact.data().to_vec(),
        )
            .into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: "No recording to preview".to_string(),
            }),
        )
            .into_response(),
    }
}

/// GET /theme
pub async fn get_theme(State(state): State<AppState>) -> impl IntoResponse {
    let theme = state.theme.lock().await.current();
    Json(ThemeResponse { theme })
}

/// POST /theme/toggle
pub async fn toggle_theme(State(state): State<AppState>) -> Response {
    let result = state.theme.lock().await.toggle();

    match result {
        Ok(theme) => Json(ThemeResponse { theme }).into_response(),
        Err(e) => {
            error!("Failed to persist theme: {:#}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: format!("Failed to persist theme: {}", e),
                }),
            )
                .into_response()
        }
    }
}
