//! Headless capture: audio files act as microphones, a synthetic camera
//! produces a moving test pattern. Lets a full interview run on machines
//! without devices (CI, servers).

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::backend::{
    AudioFrame, CaptureError, CaptureProvider, DeviceInfo, DeviceKind, TrackSender, VideoFrame,
};
use super::file::{AudioFile, AUDIO_EXTENSIONS};

pub const TEST_PATTERN_DEVICE_ID: &str = "test-pattern";

/// Track formats produced by the headless provider
#[derive(Debug, Clone)]
pub struct HeadlessConfig {
    pub sample_rate: u32,
    /// Samples per audio frame, expressed as a duration
    pub frame_duration_ms: u64,
    pub video_fps: u32,
    pub video_width: u32,
    pub video_height: u32,
}

impl Default for HeadlessConfig {
    fn default() -> Self {
        Self {
            sample_rate: 16000,
            frame_duration_ms: 100,
            video_fps: 5,
            video_width: 64,
            video_height: 48,
        }
    }
}

pub struct FileDeviceProvider {
    media_dir: PathBuf,
    config: HeadlessConfig,
}

impl FileDeviceProvider {
    pub fn new(media_dir: impl Into<PathBuf>, config: HeadlessConfig) -> Self {
        Self {
            media_dir: media_dir.into(),
            config,
        }
    }

    fn is_audio_file(path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .map(|e| AUDIO_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
            .unwrap_or(false)
    }

    fn spawn_microphone(&self, samples: Vec<i16>, tracks: TrackSender) -> JoinHandle<()> {
        let sample_rate = self.config.sample_rate;
        let frame_ms = self.config.frame_duration_ms.max(1);
        let per_frame = (sample_rate as u64 * frame_ms / 1000).max(1) as usize;

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_millis(frame_ms));
            let mut offset = 0usize;
            let mut timestamp_ms = 0u64;

            loop {
                ticker.tick().await;

                // Once the file is exhausted the microphone keeps producing silence
                let frame_samples = if offset < samples.len() {
                    let end = (offset + per_frame).min(samples.len());
                    let mut chunk = samples[offset..end].to_vec();
                    chunk.resize(per_frame, 0);
                    offset = end;
                    chunk
                } else {
                    vec![0; per_frame]
                };

                tracks.send_audio(AudioFrame {
                    samples: frame_samples,
                    sample_rate,
                    channels: 1,
                    timestamp_ms,
                });
                timestamp_ms += frame_ms;
            }
        })
    }

    fn spawn_camera(&self, tracks: TrackSender) -> JoinHandle<()> {
        let width = self.config.video_width.max(1);
        let height = self.config.video_height.max(1);
        let frame_ms = 1000 / self.config.video_fps.max(1) as u64;

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_millis(frame_ms));
            let mut index = 0u64;

            loop {
                ticker.tick().await;
                tracks.send_video(test_pattern(width, height, index, index * frame_ms));
                index += 1;
            }
        })
    }
}

/// Gray frame with a bright vertical bar sweeping left to right
pub fn test_pattern(width: u32, height: u32, index: u64, timestamp_ms: u64) -> VideoFrame {
    let bar = (index % width as u64) as u32;
    let mut pixels = Vec::with_capacity((width * height * 3) as usize);
    for _y in 0..height {
        for x in 0..width {
            let value = if x == bar { 240 } else { 96 };
            pixels.extend_from_slice(&[value, value, value]);
        }
    }

    VideoFrame {
        width,
        height,
        pixels: Arc::new(pixels),
        timestamp_ms,
    }
}

#[async_trait::async_trait]
impl CaptureProvider for FileDeviceProvider {
    async fn list_devices(&self) -> Result<Vec<DeviceInfo>, CaptureError> {
        let mut devices = Vec::new();

        match std::fs::read_dir(&self.media_dir) {
            Ok(entries) => {
                let mut files: Vec<PathBuf> = entries
                    .filter_map(|e| e.ok().map(|e| e.path()))
                    .filter(|p| Self::is_audio_file(p))
                    .collect();
                files.sort();

                for path in files {
                    if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                        devices.push(DeviceInfo {
                            id: name.to_string(),
                            label: format!("File microphone ({})", name),
                            kind: DeviceKind::AudioInput,
                        });
                    }
                }
            }
            Err(e) => {
                warn!(
                    "Media directory {} not readable: {}",
                    self.media_dir.display(),
                    e
                );
            }
        }

        devices.push(DeviceInfo {
            id: TEST_PATTERN_DEVICE_ID.to_string(),
            label: "Test pattern camera".to_string(),
            kind: DeviceKind::VideoInput,
        });

        debug!("Headless provider lists {} devices", devices.len());
        Ok(devices)
    }

    async fn open(
        &self,
        audio: &DeviceInfo,
        video: &DeviceInfo,
        tracks: TrackSender,
    ) -> Result<Vec<JoinHandle<()>>, CaptureError> {
        if video.id != TEST_PATTERN_DEVICE_ID {
            return Err(CaptureError::NotFound(video.id.clone()));
        }

        let path = self.media_dir.join(&audio.id);
        let target_rate = self.config.sample_rate;
        let samples = tokio::task::spawn_blocking(move || {
            AudioFile::open(&path).map(|file| file.to_mono(target_rate))
        })
        .await
        .map_err(|e| CaptureError::Backend(e.to_string()))?
        .map_err(|e| CaptureError::Backend(format!("{:#}", e)))?;

        info!(
            "Opened file microphone {} ({:.1}s of audio)",
            audio.id,
            samples.len() as f64 / target_rate as f64
        );

        Ok(vec![
            self.spawn_microphone(samples, tracks.clone()),
            self.spawn_camera(tracks),
        ])
    }

    fn name(&self) -> &str {
        "headless files"
    }
}
