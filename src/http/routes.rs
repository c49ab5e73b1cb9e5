use super::handlers;
use super::state::AppState;
use axum::{
    routing::{delete, get, post},
    Router,
};
use tower_http::trace::TraceLayer;

/// Create the HTTP router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        .route("/devices", get(handlers::list_devices))
        // Interview control
        .route("/interviews", post(handlers::start_interview))
        .route(
            "/interviews/:session_id",
            delete(handlers::delete_interview),
        )
        .route(
            "/interviews/:session_id/answer",
            post(handlers::submit_answer),
        )
        .route("/interviews/:session_id/end", post(handlers::end_interview))
        // Interview queries
        .route(
            "/interviews/:session_id/status",
            get(handlers::get_interview_status),
        )
        .route(
            "/interviews/:session_id/transcript",
            get(handlers::get_interview_transcript),
        )
        .route(
            "/interviews/:session_id/feedback",
            get(handlers::get_interview_feedback),
        )
        // Add tracing middleware for request logging
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
