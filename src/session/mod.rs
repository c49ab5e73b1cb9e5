//! Interview session management
//!
//! This module provides the `InterviewSession` orchestrator that manages:
//! - Capture stream acquisition and release
//! - Chunked recording of the stream
//! - Live transcription of the current answer
//! - Periodic affect sampling
//! - The question/answer turn protocol and its deadline
//! - Exactly-once finalization into feedback

mod config;
mod orchestrator;
mod output;
mod phase;

pub use config::{SessionConfig, SessionServices};
pub use orchestrator::InterviewSession;
pub use output::{Completion, EndTrigger, SessionEvent, SessionOutput, SessionStatus};
pub use phase::{Phase, PhaseCell};
