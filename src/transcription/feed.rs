use std::sync::{Arc, Mutex};
use thiserror::Error;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::capture::{MediaFrame, MediaStream};
use crate::error::{InterviewError, Result};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RecognitionError {
    #[error("Recognizer already started")]
    AlreadyStarted,

    #[error("Recognizer already stopped")]
    AlreadyStopped,

    #[error("Speech recognition unavailable: {0}")]
    Unavailable(String),

    #[error("Recognition transport error: {0}")]
    Transport(String),
}

impl From<RecognitionError> for InterviewError {
    fn from(err: RecognitionError) -> Self {
        InterviewError::RecognitionUnavailable {
            message: err.to_string(),
        }
    }
}

/// Continuous speech recognizer capability
#[async_trait::async_trait]
pub trait Recognizer: Send + Sync {
    /// Begin continuous listening on `audio`
    ///
    /// Every update carries the best hypothesis for the whole current
    /// utterance; it replaces, never extends, the previous one.
    async fn start(
        &self,
        audio: broadcast::Receiver<MediaFrame>,
        updates: mpsc::UnboundedSender<String>,
    ) -> std::result::Result<(), RecognitionError>;

    /// Stop listening
    async fn stop(&self) -> std::result::Result<(), RecognitionError>;

    /// Recognizer name for logging
    fn name(&self) -> &str;
}

/// Text of the current utterance, tagged with the listening generation that
/// produced it. Updates from an older generation are ignored.
#[derive(Default)]
struct Utterance {
    generation: u64,
    text: String,
}

pub struct RecognitionFeed {
    recognizer: Arc<dyn Recognizer>,
    utterance: Arc<Mutex<Utterance>>,
    forwarder: Mutex<Option<JoinHandle<()>>>,
}

impl RecognitionFeed {
    async fn listen(
        &self,
        stream: &MediaStream,
    ) -> std::result::Result<mpsc::UnboundedReceiver<String>, RecognitionError> {
        let audio = stream
            .subscribe()
            .map_err(|e| RecognitionError::Unavailable(e.to_string()))?;
        let (updates_tx, updates_rx) = mpsc::unbounded_channel();
        self.recognizer.start(audio, updates_tx).await?;
        Ok(updates_rx)
    }
}

pub enum TranscriptionFeed {
    Supported(RecognitionFeed),
    Unsupported,
}

impl TranscriptionFeed {
    pub fn supported(recognizer: Arc<dyn Recognizer>) -> Self {
        TranscriptionFeed::Supported(RecognitionFeed {
            recognizer,
            utterance: Arc::new(Mutex::new(Utterance::default())),
            forwarder: Mutex::new(None),
        })
    }

    pub fn unsupported() -> Self {
        TranscriptionFeed::Unsupported
    }

    pub fn is_supported(&self) -> bool {
        matches!(self, TranscriptionFeed::Supported(_))
    }

    /// Best current hypothesis for the current answer; empty when unsupported
    pub fn text(&self) -> String {
        match self {
            TranscriptionFeed::Supported(feed) => feed
                .utterance
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .text
                .clone(),
            TranscriptionFeed::Unsupported => String::new(),
        }
    }

    /// Begin listening on the stream's audio track
    pub async fn start(&self, stream: &MediaStream) -> Result<()> {
        let TranscriptionFeed::Supported(feed) = self else {
            return Ok(());
        };

        let generation = {
            let utterance = feed.utterance.lock().unwrap_or_else(|e| e.into_inner());
            utterance.generation
        };

        let updates_rx = match feed.listen(stream).await {
            Err(RecognitionError::AlreadyStarted) => {
                // Restart race: the previous stop has not settled yet, so the
                // recognizer still feeds a channel nobody reads
                debug!("{} still listening, stopping it first", feed.recognizer.name());
                if let Err(e) = feed.recognizer.stop().await {
                    debug!("Settling stop: {}", e);
                }
                feed.listen(stream).await?
            }
            other => other?,
        };

        let forwarder = tokio::spawn(forward_updates(
            updates_rx,
            Arc::clone(&feed.utterance),
            generation,
        ));
        if let Some(previous) = feed
            .forwarder
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .replace(forwarder)
        {
            previous.abort();
        }

        info!("Transcription feed listening via {}", feed.recognizer.name());
        Ok(())
    }

    /// Stop listening. Safe to call when not listening.
    pub async fn stop(&self) {
        let TranscriptionFeed::Supported(feed) = self else {
            return;
        };

        {
            // Bump the generation first so nothing in flight can land
            let mut utterance = feed.utterance.lock().unwrap_or_else(|e| e.into_inner());
            utterance.generation += 1;
        }

        if let Some(forwarder) = feed
            .forwarder
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
        {
            forwarder.abort();
        }

        match feed.recognizer.stop().await {
            Ok(()) => debug!("Transcription feed stopped"),
            Err(RecognitionError::AlreadyStopped) => debug!("Transcription feed was not listening"),
            Err(e) => warn!("Failed to stop recognizer: {}", e),
        }
    }

    /// Restart listening so the next answer begins with empty text
    pub async fn restart(&self, stream: &MediaStream) -> Result<()> {
        self.stop().await;

        if let TranscriptionFeed::Supported(feed) = self {
            let mut utterance = feed.utterance.lock().unwrap_or_else(|e| e.into_inner());
            utterance.text.clear();
        }

        self.start(stream).await
    }
}

async fn forward_updates(
    mut updates: mpsc::UnboundedReceiver<String>,
    utterance: Arc<Mutex<Utterance>>,
    generation: u64,
) {
    while let Some(text) = updates.recv().await {
        let mut current = utterance.lock().unwrap_or_else(|e| e.into_inner());
        if current.generation != generation {
            break;
        }
        current.text = text;
    }
}
