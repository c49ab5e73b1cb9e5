use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;

use crate::error::InterviewError;

/// Kind of capture input
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceKind {
    /// Microphone
    AudioInput,
    /// Camera
    VideoInput,
}

/// A selectable capture device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    /// Stable identifier used for device selection
    pub id: String,
    /// Human readable label
    pub label: String,
    pub kind: DeviceKind,
}

/// Audio sample data (16-bit PCM, interleaved)
#[derive(Debug, Clone)]
pub struct AudioFrame {
    /// Raw audio samples (i16 PCM, interleaved)
    pub samples: Vec<i16>,
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Number of channels
    pub channels: u16,
    /// Timestamp in milliseconds since the track was opened
    pub timestamp_ms: u64,
}

impl AudioFrame {
    /// Little-endian PCM bytes of this frame
    pub fn to_pcm_bytes(&self) -> Vec<u8> {
        self.samples.iter().flat_map(|s| s.to_le_bytes()).collect()
    }
}

/// A single camera frame (packed RGB8)
#[derive(Debug, Clone)]
pub struct VideoFrame {
    pub width: u32,
    pub height: u32,
    /// Packed RGB pixels, `width * height * 3` bytes
    pub pixels: Arc<Vec<u8>>,
    /// Timestamp in milliseconds since the track was opened
    pub timestamp_ms: u64,
}

/// One frame from either track of a live stream
#[derive(Debug, Clone)]
pub enum MediaFrame {
    Audio(AudioFrame),
    Video(VideoFrame),
}

impl MediaFrame {
    pub fn timestamp_ms(&self) -> u64 {
        match self {
            MediaFrame::Audio(frame) => frame.timestamp_ms,
            MediaFrame::Video(frame) => frame.timestamp_ms,
        }
    }
}

#[derive(Error, Debug, Clone)]
pub enum CaptureError {
    #[error("Permission denied for {0}")]
    PermissionDenied(String),

    #[error("No {kind:?} device available")]
    NoDevice { kind: DeviceKind },

    #[error("Device not found: {0}")]
    NotFound(String),

    #[error("Stream already released")]
    Released,

    #[error("Capture backend error: {0}")]
    Backend(String),
}

impl From<CaptureError> for InterviewError {
    fn from(err: CaptureError) -> Self {
        InterviewError::device_unavailable(err.to_string())
    }
}

/// Write side of a stream's tracks, handed to a provider when it opens devices.
///
/// Audio and video frames are fanned out to every subscriber; the most
/// recent video frame is additionally kept so consumers can grab it on demand.
#[derive(Clone)]
pub struct TrackSender {
    frames: broadcast::Sender<MediaFrame>,
    latest_video: Arc<watch::Sender<Option<VideoFrame>>>,
}

impl TrackSender {
    pub(crate) fn new(
        frames: broadcast::Sender<MediaFrame>,
        latest_video: watch::Sender<Option<VideoFrame>>,
    ) -> Self {
        Self {
            frames,
            latest_video: Arc::new(latest_video),
        }
    }

    pub fn send_audio(&self, frame: AudioFrame) {
        // No subscribers is not an error: the stream may only be previewed
        let _ = self.frames.send(MediaFrame::Audio(frame));
    }

    pub fn send_video(&self, frame: VideoFrame) {
        self.latest_video.send_replace(Some(frame.clone()));
        let _ = self.frames.send(MediaFrame::Video(frame));
    }
}

/// Capture provider trait
///
/// Implementations:
/// - `FileDeviceProvider`: audio files as microphones plus a synthetic camera (headless)
/// - test fakes
#[async_trait::async_trait]
pub trait CaptureProvider: Send + Sync {
    /// Enumerate available input devices
    async fn list_devices(&self) -> Result<Vec<DeviceInfo>, CaptureError>;

    /// Open both devices and start producing frames into `tracks`
    ///
    /// Returns the producer tasks; aborting them stops the tracks.
    async fn open(
        &self,
        audio: &DeviceInfo,
        video: &DeviceInfo,
        tracks: TrackSender,
    ) -> Result<Vec<JoinHandle<()>>, CaptureError>;

    /// Provider name for logging
    fn name(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pcm_bytes_are_little_endian() {
        let frame = AudioFrame {
            samples: vec![1, -2],
            sample_rate: 16000,
            channels: 1,
            timestamp_ms: 0,
        };
        assert_eq!(frame.to_pcm_bytes(), vec![0x01, 0x00, 0xFE, 0xFF]);
    }

    #[test]
    fn test_capture_error_maps_to_device_unavailable() {
        let err: InterviewError = CaptureError::NoDevice {
            kind: DeviceKind::VideoInput,
        }
        .into();
        assert!(matches!(err, InterviewError::DeviceUnavailable { .. }));
    }

    #[tokio::test]
    async fn test_track_sender_keeps_latest_video_frame() {
        let (frames, mut rx) = broadcast::channel(4);
        let (video_tx, video_rx) = watch::channel(None);
        let sender = TrackSender::new(frames, video_tx);

        sender.send_video(VideoFrame {
            width: 1,
            height: 1,
            pixels: Arc::new(vec![0, 0, 0]),
            timestamp_ms: 40,
        });

        assert_eq!(video_rx.borrow().as_ref().map(|f| f.timestamp_ms), Some(40));
        assert!(matches!(rx.recv().await, Ok(MediaFrame::Video(_))));
    }
}
