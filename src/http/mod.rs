//! HTTP API server for driving interviews
//!
//! This module provides a REST API for controlling interview sessions:
//! - POST /interviews - Start an interview, returns the first question
//! - POST /interviews/:id/answer - Answer the open question
//! - POST /interviews/:id/end - End the interview and get feedback
//! - GET /interviews/:id/status - Query session status
//! - GET /interviews/:id/transcript - Live transcript and turns
//! - GET /interviews/:id/feedback - Feedback of an ended interview
//! - DELETE /interviews/:id - Tear down an interview
//! - GET /devices - Capture devices
//! - GET /health - Health check

mod handlers;
mod routes;
mod state;

pub use handlers::status_for;
pub use routes::create_router;
pub use state::{AppState, SessionDefaults};
