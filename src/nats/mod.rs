//! NATS transport to the speech-to-text service.

pub mod client;
pub mod messages;

pub use client::{audio_subject, NatsClient, TRANSCRIPT_SUBJECT};
pub use messages::{AudioFrameMessage, TranscriptMessage};
