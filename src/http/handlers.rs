use super::state::AppState;
use crate::capture::DeviceInfo;
use crate::error::InterviewError;
use crate::interview::{InterviewContext, Turn};
use crate::session::{Completion, InterviewSession, Phase, SessionConfig, SessionOutput};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{error, info, warn};

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartInterviewRequest {
    /// Optional session ID (if not provided, generate UUID)
    pub session_id: Option<String>,

    #[serde(flatten)]
    pub context: InterviewContext,

    /// Preferred microphone id
    pub audio_device: Option<String>,

    /// Preferred camera id
    pub video_device: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct StartInterviewResponse {
    pub session_id: String,
    pub phase: Phase,
    pub question: Turn,
}

#[derive(Debug, Default, Deserialize)]
pub struct AnswerRequest {
    /// Typed answer; the live transcription is used when absent
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct QuestionResponse {
    pub session_id: String,
    pub question: Turn,
}

#[derive(Debug, Serialize)]
pub struct TranscriptResponse {
    pub session_id: String,
    /// Live transcription of the current answer
    pub live_transcript: String,
    pub history: Vec<Turn>,
}

#[derive(Debug, Serialize)]
pub struct InterviewSummary<'a> {
    #[serde(flatten)]
    pub output: &'a SessionOutput,
    pub recording_bytes: usize,
    pub recording_duration_secs: f64,
}

impl<'a> From<&'a SessionOutput> for InterviewSummary<'a> {
    fn from(output: &'a SessionOutput) -> Self {
        Self {
            output,
            recording_bytes: output.artifact.len(),
            recording_duration_secs: output.artifact.duration_secs(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub session_id: String,
    /// Whether a live session was torn down
    pub abandoned: bool,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
        .into_response()
}

fn not_found(session_id: &str) -> Response {
    error_response(
        StatusCode::NOT_FOUND,
        format!("Interview {} not found", session_id),
    )
}

/// HTTP status for a session error
pub fn status_for(error: &InterviewError) -> StatusCode {
    match error {
        InterviewError::DeviceUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
        InterviewError::InvalidPhase { .. }
        | InterviewError::AnswerPending
        | InterviewError::AlreadyBegun
        | InterviewError::NoOpenQuestion
        | InterviewError::SessionClosed
        | InterviewError::Abandoned => StatusCode::CONFLICT,
        InterviewError::TurnGenerationFailed { .. } | InterviewError::MalformedResponse { .. } => {
            StatusCode::BAD_GATEWAY
        }
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn interview_error(error: InterviewError) -> Response {
    let status = status_for(&error);
    if status.is_server_error() {
        error!("Interview request failed: {}", error);
    } else {
        warn!("Interview request rejected: {}", error);
    }
    error_response(status, error.to_string())
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /health
/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

/// GET /devices
/// List capture devices
pub async fn list_devices(State(state): State<AppState>) -> Response {
    match state.services.capture.list_devices().await {
        Ok(devices) => (StatusCode::OK, Json::<Vec<DeviceInfo>>(devices)).into_response(),
        Err(e) => interview_error(e),
    }
}

/// POST /interviews
/// Start a new interview and return its first question
pub async fn start_interview(
    State(state): State<AppState>,
    Json(req): Json<StartInterviewRequest>,
) -> Response {
    let session_id = req
        .session_id
        .unwrap_or_else(|| format!("interview-{}", uuid::Uuid::new_v4()));

    info!("Starting interview: {}", session_id);

    let duration = req
        .context
        .duration_minutes
        .map(|minutes| Duration::from_secs(u64::from(minutes) * 60))
        .unwrap_or(state.defaults.duration);

    let config = SessionConfig {
        session_id: session_id.clone(),
        context: req.context,
        duration,
        affect_interval: state.defaults.affect_interval,
        audio_device: req.audio_device,
        video_device: req.video_device,
    };

    let feed = state.transcription_feed(&session_id).await;

    // Register before starting so DELETE can tear down a session mid-start
    let session = {
        let mut sessions = state.sessions.write().await;
        if sessions.contains_key(&session_id) {
            return error_response(
                StatusCode::CONFLICT,
                format!("Interview {} already exists", session_id),
            );
        }
        let session = InterviewSession::new(config, state.services.clone(), feed);
        sessions.insert(session_id.clone(), session.clone());
        session
    };

    match session.begin().await {
        Ok(question) => {
            info!("Interview {} started", session_id);
            state.evict_when_finished(&session);
            (
                StatusCode::OK,
                Json(StartInterviewResponse {
                    session_id,
                    phase: session.phase(),
                    question,
                }),
            )
                .into_response()
        }
        Err(e) => {
            state.sessions.write().await.remove(&session_id);
            interview_error(e)
        }
    }
}

/// POST /interviews/:session_id/answer
/// Submit an answer and get the next question
pub async fn submit_answer(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Json(req): Json<AnswerRequest>,
) -> Response {
    let Some(session) = state.session(&session_id).await else {
        return not_found(&session_id);
    };

    match session.submit_answer(req.text).await {
        Ok(question) => (
            StatusCode::OK,
            Json(QuestionResponse {
                session_id,
                question,
            }),
        )
            .into_response(),
        Err(e) => interview_error(e),
    }
}

/// POST /interviews/:session_id/end
/// End an interview and return its feedback
pub async fn end_interview(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Response {
    let Some(session) = state.session(&session_id).await else {
        return not_found(&session_id);
    };

    info!("Ending interview: {}", session_id);

    match session.end().await {
        Ok(output) => (StatusCode::OK, Json(InterviewSummary::from(output.as_ref()))).into_response(),
        // Lost to the deadline or an earlier end: report that outcome
        Err(InterviewError::InvalidPhase {
            phase: Phase::Ending | Phase::Ended,
        }) => completion_response(&session, session.wait_for_completion().await),
        Err(e) => interview_error(e),
    }
}

fn completion_response(session: &InterviewSession, completion: Completion) -> Response {
    match completion {
        Completion::Finalized(output) => {
            (StatusCode::OK, Json(InterviewSummary::from(output.as_ref()))).into_response()
        }
        Completion::Abandoned => error_response(
            StatusCode::GONE,
            format!("Interview {} was torn down without feedback", session.id()),
        ),
        Completion::Pending => interview_error(InterviewError::InvalidPhase {
            phase: session.phase(),
        }),
    }
}

/// GET /interviews/:session_id/status
/// Get status of an interview
pub async fn get_interview_status(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Response {
    match state.session(&session_id).await {
        Some(session) => (StatusCode::OK, Json(session.status())).into_response(),
        None => not_found(&session_id),
    }
}

/// GET /interviews/:session_id/transcript
/// Get the live transcription and the turns so far
pub async fn get_interview_transcript(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Response {
    match state.session(&session_id).await {
        Some(session) => (
            StatusCode::OK,
            Json(TranscriptResponse {
                session_id,
                live_transcript: session.transcript(),
                history: session.history(),
            }),
        )
            .into_response(),
        None => not_found(&session_id),
    }
}

/// GET /interviews/:session_id/feedback
/// Get the final output of an ended interview
pub async fn get_interview_feedback(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Response {
    let Some(session) = state.session(&session_id).await else {
        return not_found(&session_id);
    };

    completion_response(&session, session.completion())
}

/// DELETE /interviews/:session_id
/// Tear down an interview and forget it
pub async fn delete_interview(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Response {
    let session = {
        let mut sessions = state.sessions.write().await;
        sessions.remove(&session_id)
    };

    match session {
        Some(session) => {
            let abandoned = session.abandon().await;
            info!("Deleted interview {} (abandoned: {})", session_id, abandoned);
            (
                StatusCode::OK,
                Json(DeleteResponse {
                    session_id,
                    abandoned,
                }),
            )
                .into_response()
        }
        None => not_found(&session_id),
    }
}
