use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::phase::Phase;
use crate::affect::AffectSample;
use crate::analysis::FeedbackResult;
use crate::interview::Turn;
use crate::recording::MediaArtifact;

/// What ended the interview
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EndTrigger {
    /// The configured duration elapsed
    Deadline,
    /// The candidate ended the interview
    User,
    /// The session was torn down by its owner
    Teardown,
}

/// Events for a live presentation layer
#[derive(Debug, Clone)]
pub enum SessionEvent {
    PhaseChanged(Phase),
    Question(Turn),
    /// One-off user-facing notice (e.g. degraded transcription)
    Notice(String),
}

/// Read-only result of a finalized interview
#[derive(Debug, Clone, Serialize)]
pub struct SessionOutput {
    pub session_id: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub trigger: EndTrigger,
    pub history: Vec<Turn>,
    pub affect_samples: Vec<AffectSample>,
    pub feedback: FeedbackResult,
    /// The analysis failed and `feedback` is the fixed placeholder
    pub feedback_is_placeholder: bool,
    #[serde(skip)]
    pub artifact: Arc<MediaArtifact>,
}

/// How a session finished, once it has
#[derive(Debug, Clone)]
pub enum Completion {
    Pending,
    Finalized(Arc<SessionOutput>),
    /// Torn down without finalization
    Abandoned,
}

/// Live snapshot of a session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionStatus {
    pub session_id: String,

    pub phase: Phase,

    /// When the session became active
    pub started_at: Option<DateTime<Utc>>,

    /// Seconds until the deadline, while active
    pub remaining_secs: Option<u64>,

    /// Question awaiting an answer
    pub current_question: Option<String>,

    /// Live transcription of the current answer
    pub live_transcript: String,

    /// Number of turns so far
    pub turns: usize,

    /// Number of affect samples so far
    pub affect_samples: usize,

    /// Whether live transcription is working
    pub recognition_available: bool,
}
