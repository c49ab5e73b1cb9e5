//! Error types for interview sessions.

use thiserror::Error;

use crate::session::Phase;

#[derive(Error, Debug)]
pub enum InterviewError {
    // Capture errors
    #[error("Capture device unavailable: {message}")]
    DeviceUnavailable { message: String },

    // Turn protocol errors
    #[error("Failed to generate next question: {message}")]
    TurnGenerationFailed { message: String },

    #[error("Interview already has its first question")]
    AlreadyBegun,

    #[error("An answer is already being submitted")]
    AnswerPending,

    #[error("No open question to answer")]
    NoOpenQuestion,

    // Affect errors (never surfaced outside the sampler)
    #[error("Affect classification failed: {message}")]
    ClassificationFailed { message: String },

    // Transcription errors
    #[error("Speech recognition unavailable: {message}")]
    RecognitionUnavailable { message: String },

    // Analysis errors
    #[error("Interview analysis failed: {message}")]
    AnalysisFailed { message: String },

    #[error("Malformed response from {service}: {message}")]
    MalformedResponse { service: String, message: String },

    // Lifecycle errors
    #[error("Operation not allowed while session is {phase:?}")]
    InvalidPhase { phase: Phase },

    #[error("Session is closed")]
    SessionClosed,

    #[error("Session was abandoned before it became active")]
    Abandoned,

    #[error("Finalization failed: {message}")]
    Finalization { message: String },

    #[error("Recording error: {message}")]
    Recording { message: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl InterviewError {
    pub fn device_unavailable(message: impl Into<String>) -> Self {
        Self::DeviceUnavailable {
            message: message.into(),
        }
    }

    pub fn malformed(service: impl Into<String>, message: impl Into<String>) -> Self {
        Self::MalformedResponse {
            service: service.into(),
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, InterviewError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_unavailable_display() {
        let error = InterviewError::device_unavailable("no camera");
        assert_eq!(error.to_string(), "Capture device unavailable: no camera");
    }

    #[test]
    fn test_invalid_phase_display() {
        let error = InterviewError::InvalidPhase { phase: Phase::Ended };
        assert_eq!(error.to_string(), "Operation not allowed while session is Ended");
    }

    #[test]
    fn test_malformed_response_display() {
        let error = InterviewError::malformed("reasoning", "missing field `question`");
        assert!(error.to_string().contains("reasoning"));
        assert!(error.to_string().contains("question"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let error: InterviewError = io.into();
        assert!(matches!(error, InterviewError::Io(_)));
    }
}
