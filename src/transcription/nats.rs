use futures::stream::StreamExt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::feed::{RecognitionError, Recognizer, TranscriptionFeed};
use crate::capture::MediaFrame;
use crate::nats::{NatsClient, TranscriptMessage};

/// Builds the running hypothesis for one utterance from STT segments
///
/// Final segments accumulate; the latest partial is appended after them
/// and replaced by the next partial or final.
#[derive(Debug, Default)]
pub struct UtteranceBuilder {
    finals: Vec<String>,
    partial: String,
}

impl UtteranceBuilder {
    pub fn apply(&mut self, segment: &TranscriptMessage) {
        let text = segment.text.trim();
        if segment.partial {
            self.partial = text.to_string();
        } else {
            self.partial.clear();
            if !text.is_empty() {
                self.finals.push(text.to_string());
            }
        }
    }

    pub fn text(&self) -> String {
        let mut parts: Vec<&str> = self.finals.iter().map(String::as_str).collect();
        if !self.partial.is_empty() {
            parts.push(&self.partial);
        }
        parts.join(" ")
    }
}

struct Listening {
    tasks: Vec<JoinHandle<()>>,
}

/// Recognizer backed by a NATS speech-to-text service
///
/// Audio frames go out on `audio.frame.<session_id>`, transcripts come
/// back on `stt.text.>` and are filtered by session id.
pub struct NatsRecognizer {
    client: Arc<NatsClient>,
    listening: Mutex<Option<Listening>>,
    sequence: Arc<AtomicU32>,
    format: Arc<Mutex<(u32, u16)>>,
}

impl NatsRecognizer {
    pub fn new(client: NatsClient) -> Self {
        Self {
            client: Arc::new(client),
            listening: Mutex::new(None),
            sequence: Arc::new(AtomicU32::new(0)),
            format: Arc::new(Mutex::new((16000, 1))),
        }
    }

    /// Connect to NATS for `session_id`
    pub async fn connect(url: &str, session_id: String) -> Result<Self, RecognitionError> {
        let client = NatsClient::connect(url, session_id)
            .await
            .map_err(|e| RecognitionError::Unavailable(format!("{:#}", e)))?;
        Ok(Self::new(client))
    }

    /// Feed for `session_id`, or the unsupported feed when NATS is unreachable
    pub async fn feed(url: &str, session_id: String) -> TranscriptionFeed {
        match Self::connect(url, session_id).await {
            Ok(recognizer) => TranscriptionFeed::supported(Arc::new(recognizer)),
            Err(e) => {
                warn!("Speech recognition unavailable, continuing without it: {}", e);
                TranscriptionFeed::unsupported()
            }
        }
    }

    fn is_listening(&self) -> bool {
        self.listening
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .is_some()
    }
}

#[async_trait::async_trait]
impl Recognizer for NatsRecognizer {
    async fn start(
        &self,
        mut audio: broadcast::Receiver<MediaFrame>,
        updates: mpsc::UnboundedSender<String>,
    ) -> Result<(), RecognitionError> {
        if self.is_listening() {
            return Err(RecognitionError::AlreadyStarted);
        }

        let mut transcripts = self
            .client
            .transcripts()
            .await
            .map_err(|e| RecognitionError::Transport(format!("{:#}", e)))?;

        // Audio publishing task
        let client = Arc::clone(&self.client);
        let sequence = Arc::clone(&self.sequence);
        let format = Arc::clone(&self.format);
        let publisher = tokio::spawn(async move {
            loop {
                let frame = match audio.recv().await {
                    Ok(MediaFrame::Audio(frame)) => frame,
                    Ok(MediaFrame::Video(_)) => continue,
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!("Recognizer lagged by {} frames", n);
                        continue;
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                };

                *format.lock().unwrap_or_else(|e| e.into_inner()) =
                    (frame.sample_rate, frame.channels);
                let seq = sequence.fetch_add(1, Ordering::SeqCst);
                if let Err(e) = client.publish_audio(&frame, seq).await {
                    error!("Failed to publish audio frame: {}", e);
                }
            }
            debug!("Recognizer audio publisher finished");
        });

        // Transcript receiving task
        let receiver = tokio::spawn(async move {
            let mut utterance = UtteranceBuilder::default();
            while let Some(transcript) = transcripts.next().await {
                utterance.apply(&transcript);
                if updates.send(utterance.text()).is_err() {
                    break;
                }
            }
        });

        let mut listening = self.listening.lock().unwrap_or_else(|e| e.into_inner());
        if listening.is_some() {
            // Lost a race against a concurrent start
            publisher.abort();
            receiver.abort();
            return Err(RecognitionError::AlreadyStarted);
        }
        *listening = Some(Listening {
            tasks: vec![publisher, receiver],
        });

        info!("NATS recognizer listening for {}", self.client.session_id());
        Ok(())
    }

    async fn stop(&self) -> Result<(), RecognitionError> {
        let listening = self
            .listening
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        let Some(listening) = listening else {
            return Err(RecognitionError::AlreadyStopped);
        };

        for task in listening.tasks {
            task.abort();
        }

        // Mark the end of the utterance so the STT service flushes
        let (sample_rate, channels) = *self.format.lock().unwrap_or_else(|e| e.into_inner());
        let seq = self.sequence.fetch_add(1, Ordering::SeqCst);
        self.client
            .publish_end_of_utterance(sample_rate, channels, seq)
            .await
            .map_err(|e| RecognitionError::Transport(format!("{:#}", e)))?;

        info!("NATS recognizer stopped for {}", self.client.session_id());
        Ok(())
    }

    fn name(&self) -> &str {
        "NATS speech-to-text"
    }
}
