use anyhow::{Context, Result};
use async_nats::Client;
use base64::Engine;
use futures::stream::{BoxStream, StreamExt};
use tracing::{debug, info, warn};

use super::messages::{AudioFrameMessage, TranscriptMessage};
use crate::capture::AudioFrame;

/// Transcripts from the STT service (`stt.text.partial`, `stt.text.final`)
pub const TRANSCRIPT_SUBJECT: &str = "stt.text.>";

/// Subject the STT service listens on for a session's audio
pub fn audio_subject(session_id: &str) -> String {
    format!("audio.frame.{}", session_id)
}

/// Wire message for one frame of `session_id`'s audio
///
/// An end-of-utterance marker carries no PCM and `final = true`.
pub fn audio_message(
    session_id: &str,
    pcm_bytes: &[u8],
    sample_rate: u32,
    channels: u16,
    sequence: u32,
    is_final: bool,
) -> AudioFrameMessage {
    AudioFrameMessage {
        session_id: session_id.to_string(),
        sequence,
        pcm: base64::engine::general_purpose::STANDARD.encode(pcm_bytes),
        sample_rate,
        channels,
        timestamp: chrono::Utc::now().to_rfc3339(),
        final_frame: is_final,
    }
}

/// Parse a transcript payload, keeping only `session_id`'s messages
pub fn decode_transcript(payload: &[u8], session_id: &str) -> Option<TranscriptMessage> {
    match serde_json::from_slice::<TranscriptMessage>(payload) {
        Ok(transcript) if transcript.session_id == session_id => Some(transcript),
        Ok(_) => None,
        Err(e) => {
            warn!("Failed to parse transcript message: {}", e);
            None
        }
    }
}

/// NATS connection scoped to one interview session
pub struct NatsClient {
    client: Client,
    session_id: String,
}

impl NatsClient {
    /// Connect to NATS server
    pub async fn connect(url: &str, session_id: String) -> Result<Self> {
        info!("Connecting to NATS at {} for {}", url, session_id);

        let client = async_nats::connect(url)
            .await
            .context("Failed to connect to NATS")?;

        Ok(Self { client, session_id })
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    async fn publish(&self, message: &AudioFrameMessage) -> Result<()> {
        let subject = audio_subject(&self.session_id);
        let payload = serde_json::to_vec(message)?;

        self.client
            .publish(subject.clone(), payload.into())
            .await
            .context("Failed to publish audio frame")?;

        debug!(
            "Published audio frame to {} (seq={}, final={})",
            subject, message.sequence, message.final_frame
        );
        Ok(())
    }

    /// Publish one captured audio frame
    pub async fn publish_audio(&self, frame: &AudioFrame, sequence: u32) -> Result<()> {
        let message = audio_message(
            &self.session_id,
            &frame.to_pcm_bytes(),
            frame.sample_rate,
            frame.channels,
            sequence,
            false,
        );
        self.publish(&message).await
    }

    /// Tell the STT service the current utterance is over so it flushes
    pub async fn publish_end_of_utterance(
        &self,
        sample_rate: u32,
        channels: u16,
        sequence: u32,
    ) -> Result<()> {
        let message = audio_message(&self.session_id, &[], sample_rate, channels, sequence, true);
        self.publish(&message).await
    }

    /// Transcripts for this session, in arrival order
    pub async fn transcripts(&self) -> Result<BoxStream<'static, TranscriptMessage>> {
        let subscriber = self
            .client
            .subscribe(TRANSCRIPT_SUBJECT)
            .await
            .context("Failed to subscribe to transcripts")?;

        info!("Subscribed to {} for {}", TRANSCRIPT_SUBJECT, self.session_id);

        let session_id = self.session_id.clone();
        Ok(subscriber
            .filter_map(move |msg| {
                let transcript = decode_transcript(&msg.payload, &session_id);
                async move { transcript }
            })
            .boxed())
    }
}
