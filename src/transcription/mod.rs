//! Transcription feed: continuous speech-to-text for the current answer.
//!
//! The feed is either backed by a recognizer (`Supported`) or a no-op that
//! always reports empty text (`Unsupported`), so sessions keep working on
//! hosts without a speech-to-text service.

mod feed;
mod nats;

pub use feed::{RecognitionError, Recognizer, TranscriptionFeed};
pub use nats::{NatsRecognizer, UtteranceBuilder};
