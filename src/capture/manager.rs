use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::backend::{
    CaptureError, CaptureProvider, DeviceInfo, DeviceKind, MediaFrame, TrackSender, VideoFrame,
};
use crate::error::Result;

/// A live camera + microphone stream
///
/// Owned by the session for its whole lifetime. Consumers only ever get
/// read-side handles (`subscribe`, `video_frames`); stopping the tracks is
/// reserved for `CaptureManager::release`.
pub struct MediaStream {
    id: String,
    audio_device: DeviceInfo,
    video_device: DeviceInfo,
    frames: Mutex<Option<broadcast::Sender<MediaFrame>>>,
    latest_video: watch::Receiver<Option<VideoFrame>>,
    producers: Mutex<Vec<JoinHandle<()>>>,
    live: AtomicBool,
}

impl MediaStream {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn audio_device(&self) -> &DeviceInfo {
        &self.audio_device
    }

    pub fn video_device(&self) -> &DeviceInfo {
        &self.video_device
    }

    pub fn is_live(&self) -> bool {
        self.live.load(Ordering::SeqCst)
    }

    /// Subscribe to every audio and video frame from now on
    pub fn subscribe(&self) -> std::result::Result<broadcast::Receiver<MediaFrame>, CaptureError> {
        let frames = self.frames.lock().unwrap_or_else(|e| e.into_inner());
        frames
            .as_ref()
            .map(|tx| tx.subscribe())
            .ok_or(CaptureError::Released)
    }

    /// Watch cell holding the most recent camera frame
    pub fn video_frames(&self) -> watch::Receiver<Option<VideoFrame>> {
        self.latest_video.clone()
    }

    /// Grab the current camera frame, if the camera has produced one yet
    pub fn latest_video_frame(&self) -> Option<VideoFrame> {
        self.latest_video.borrow().clone()
    }

    /// Stop all tracks. Returns `false` if they were already stopped.
    fn stop_tracks(&self) -> bool {
        if !self.live.swap(false, Ordering::SeqCst) {
            return false;
        }

        let producers = {
            let mut producers = self.producers.lock().unwrap_or_else(|e| e.into_inner());
            std::mem::take(&mut *producers)
        };
        for producer in producers {
            producer.abort();
        }

        // Dropping our sender lets subscribers observe the end of the stream
        // once the aborted producers have dropped theirs.
        self.frames.lock().unwrap_or_else(|e| e.into_inner()).take();

        true
    }
}

/// Acquires and releases capture streams, owning device selection
pub struct CaptureManager {
    provider: Arc<dyn CaptureProvider>,
    frame_buffer: usize,
}

impl CaptureManager {
    pub fn new(provider: Arc<dyn CaptureProvider>, frame_buffer: usize) -> Self {
        Self {
            provider,
            frame_buffer: frame_buffer.max(1),
        }
    }

    /// Enumerate available capture devices
    pub async fn list_devices(&self) -> Result<Vec<DeviceInfo>> {
        Ok(self.provider.list_devices().await?)
    }

    /// Acquire a camera + microphone stream
    ///
    /// Falls back to the first device of each kind when no preference is given
    /// or the preferred device is gone. Fails with `DeviceUnavailable` when
    /// permission is denied or no device of a kind exists.
    pub async fn acquire(
        &self,
        preferred_audio: Option<&str>,
        preferred_video: Option<&str>,
    ) -> Result<MediaStream> {
        let devices = self.provider.list_devices().await?;

        let audio = select_device(&devices, DeviceKind::AudioInput, preferred_audio).ok_or(
            CaptureError::NoDevice {
                kind: DeviceKind::AudioInput,
            },
        )?;
        let video = select_device(&devices, DeviceKind::VideoInput, preferred_video).ok_or(
            CaptureError::NoDevice {
                kind: DeviceKind::VideoInput,
            },
        )?;

        let (frames_tx, _) = broadcast::channel(self.frame_buffer);
        let (video_tx, video_rx) = watch::channel(None);
        let tracks = TrackSender::new(frames_tx.clone(), video_tx);

        let producers = self.provider.open(&audio, &video, tracks).await?;

        let stream = MediaStream {
            id: uuid::Uuid::new_v4().to_string(),
            audio_device: audio,
            video_device: video,
            frames: Mutex::new(Some(frames_tx)),
            latest_video: video_rx,
            producers: Mutex::new(producers),
            live: AtomicBool::new(true),
        };

        info!(
            "Acquired capture stream {} via {} (mic: {}, camera: {})",
            stream.id,
            self.provider.name(),
            stream.audio_device.label,
            stream.video_device.label
        );

        Ok(stream)
    }

    /// Stop every track of `stream`. Safe to call any number of times.
    pub fn release(&self, stream: &MediaStream) {
        if stream.stop_tracks() {
            info!("Released capture stream {}", stream.id);
        } else {
            debug!("Capture stream {} already released", stream.id);
        }
    }
}

/// Pick the preferred device of `kind`, or the first one available
pub fn select_device(
    devices: &[DeviceInfo],
    kind: DeviceKind,
    preferred: Option<&str>,
) -> Option<DeviceInfo> {
    let mut candidates = devices.iter().filter(|d| d.kind == kind);

    if let Some(id) = preferred {
        if let Some(device) = devices.iter().find(|d| d.kind == kind && d.id == id) {
            return Some(device.clone());
        }
        debug!("Preferred {:?} device {} not found, using default", kind, id);
    }

    candidates.next().cloned()
}
