use serde::{Deserialize, Serialize};

/// One frame of candidate audio, published on `audio.frame.<session_id>`
///
/// `pcm` is base64 of 16-bit little-endian samples. `final` marks the end
/// of an answer and carries no samples.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioFrameMessage {
    pub session_id: String,
    pub sequence: u32,
    pub pcm: String,
    pub sample_rate: u32,
    pub channels: u16,
    /// RFC3339
    pub timestamp: String,
    #[serde(rename = "final")]
    pub final_frame: bool,
}

/// A recognized segment from the STT service
///
/// Partial segments are revised hypotheses for the words being spoken;
/// a final segment settles them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptMessage {
    pub session_id: String,
    pub text: String,
    pub partial: bool,
    pub timestamp: String,
    #[serde(default)]
    pub confidence: Option<f32>,
}
