use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::affect::AffectClassifier;
use crate::analysis::AnalysisService;
use crate::capture::CaptureManager;
use crate::interview::{InterviewContext, ReasoningService};
use crate::recording::RecordingSink;
use crate::storage::InterviewStore;

/// Configuration for one interview attempt
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Unique session identifier (e.g., "interview-<uuid>")
    pub session_id: String,

    /// Seed for the first question
    pub context: InterviewContext,

    /// Time from the first question until the interview ends by itself
    /// Default: 30 minutes
    pub duration: Duration,

    /// Interval between affect samples
    /// Default: 1 second
    pub affect_interval: Duration,

    /// Preferred microphone id (first available if unset)
    pub audio_device: Option<String>,

    /// Preferred camera id (first available if unset)
    pub video_device: Option<String>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            session_id: format!("interview-{}", uuid::Uuid::new_v4()),
            context: InterviewContext::default(),
            duration: Duration::from_secs(30 * 60),
            affect_interval: Duration::from_secs(1),
            audio_device: None,
            video_device: None,
        }
    }
}

/// Capabilities shared by every session, constructed once at startup
#[derive(Clone)]
pub struct SessionServices {
    pub capture: Arc<CaptureManager>,
    pub recorder: Arc<RecordingSink>,
    pub reasoning: Arc<dyn ReasoningService>,
    pub analysis: Arc<dyn AnalysisService>,
    pub classifier: Arc<dyn AffectClassifier>,
    /// Receives finished interviews; never awaited by the session
    pub store: Option<Arc<dyn InterviewStore>>,
}
