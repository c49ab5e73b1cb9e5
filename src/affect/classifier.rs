use base64::Engine;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tracing::debug;

use crate::capture::VideoFrame;
use crate::error::{InterviewError, Result};

/// Closed set of emotion categories, in the classifier's output order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Emotion {
    Angry,
    Disgust,
    Fear,
    Happy,
    Sad,
    Surprise,
    Neutral,
}

impl Emotion {
    pub const ALL: [Emotion; 7] = [
        Emotion::Angry,
        Emotion::Disgust,
        Emotion::Fear,
        Emotion::Happy,
        Emotion::Sad,
        Emotion::Surprise,
        Emotion::Neutral,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Emotion::Angry => "angry",
            Emotion::Disgust => "disgust",
            Emotion::Fear => "fear",
            Emotion::Happy => "happy",
            Emotion::Sad => "sad",
            Emotion::Surprise => "surprise",
            Emotion::Neutral => "neutral",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        let label = label.trim();
        Self::ALL
            .into_iter()
            .find(|e| e.as_str().eq_ignore_ascii_case(label))
    }

    /// Pick the most probable class from a softmax vector
    pub fn from_probabilities(probabilities: &[f32]) -> Option<Self> {
        if probabilities.len() != Self::ALL.len() {
            return None;
        }
        probabilities
            .iter()
            .enumerate()
            .filter(|(_, p)| p.is_finite())
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| Self::ALL[i])
    }
}

impl fmt::Display for Emotion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Facial-affect classifier capability
///
/// Constructed once at startup and handed to each session's sampler.
/// Treated as pure and possibly slow.
#[async_trait::async_trait]
pub trait AffectClassifier: Send + Sync {
    async fn classify(&self, frame: VideoFrame) -> Result<Emotion>;
}

#[derive(Serialize)]
struct ClassifyRequest {
    width: u32,
    height: u32,
    /// Base64 packed RGB8
    pixels: String,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ClassifyResponse {
    Label { label: String },
    Probabilities { probabilities: Vec<f32> },
}

/// Classifier served over HTTP
pub struct HttpClassifier {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpClassifier {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| InterviewError::ClassificationFailed {
                message: e.to_string(),
            })?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }
}

fn failed(message: impl Into<String>) -> InterviewError {
    InterviewError::ClassificationFailed {
        message: message.into(),
    }
}

fn parse_response(response: ClassifyResponse) -> Result<Emotion> {
    match response {
        ClassifyResponse::Label { label } => Emotion::from_label(&label)
            .ok_or_else(|| InterviewError::malformed("classifier", format!("unknown label {:?}", label))),
        ClassifyResponse::Probabilities { probabilities } => {
            Emotion::from_probabilities(&probabilities).ok_or_else(|| {
                InterviewError::malformed(
                    "classifier",
                    format!("expected 7 probabilities, got {}", probabilities.len()),
                )
            })
        }
    }
}

#[async_trait::async_trait]
impl AffectClassifier for HttpClassifier {
    async fn classify(&self, frame: VideoFrame) -> Result<Emotion> {
        let request = ClassifyRequest {
            width: frame.width,
            height: frame.height,
            pixels: base64::engine::general_purpose::STANDARD.encode(frame.pixels.as_slice()),
        };

        let response = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|e| failed(e.to_string()))?;

        if !response.status().is_success() {
            return Err(failed(format!("classifier returned {}", response.status())));
        }

        let body: ClassifyResponse = response
            .json()
            .await
            .map_err(|e| InterviewError::malformed("classifier", e.to_string()))?;

        let emotion = parse_response(body)?;
        debug!("Classified frame @{}ms as {}", frame.timestamp_ms, emotion);
        Ok(emotion)
    }
}
