pub mod affect;
pub mod analysis;
pub mod capture;
pub mod config;
pub mod error;
pub mod http;
pub mod interview;
pub mod nats;
pub mod recording;
pub mod session;
pub mod storage;
pub mod transcription;

pub use affect::{AffectClassifier, AffectSample, AffectSampler, Emotion, HttpClassifier};
pub use analysis::{AnalysisService, FeedbackResult, HttpAnalysisService};
pub use capture::{
    CaptureManager, CaptureProvider, DeviceInfo, DeviceKind, FileDeviceProvider, MediaFrame,
    MediaStream,
};
pub use config::Config;
pub use error::{InterviewError, Result};
pub use http::{create_router, AppState};
pub use interview::{HttpReasoningService, InterviewContext, ReasoningService, Turn, TurnKind};
pub use nats::{AudioFrameMessage, NatsClient, TranscriptMessage};
pub use recording::{MediaArtifact, RecordingSink};
pub use session::{
    EndTrigger, InterviewSession, Phase, SessionConfig, SessionOutput, SessionServices,
    SessionStatus,
};
pub use storage::{InterviewStore, JsonFileStore};
pub use transcription::{NatsRecognizer, TranscriptionFeed};
