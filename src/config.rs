use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

use crate::capture::HeadlessConfig;
use crate::recording::RecorderConfig;

#[derive(Debug, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub service: ServiceConfig,
    #[serde(default)]
    pub interview: InterviewSettings,
    #[serde(default)]
    pub capture: CaptureSettings,
    #[serde(default)]
    pub services: RemoteServices,
    #[serde(default)]
    pub transcription: TranscriptionSettings,
    #[serde(default)]
    pub storage: StorageSettings,
}

#[derive(Debug, Deserialize)]
pub struct ServiceConfig {
    #[serde(default = "default_service_name")]
    pub name: String,
    #[serde(default)]
    pub http: HttpConfig,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: default_service_name(),
            http: HttpConfig::default(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct HttpConfig {
    pub bind: String,
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1".to_string(),
            port: 3040,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct InterviewSettings {
    pub duration_minutes: u32,
    pub affect_interval_ms: u64,
    pub recorder_timeslice_ms: u64,
    /// Frames buffered per stream subscriber before the slowest one lags
    pub frame_buffer: usize,
    /// How long a finished interview stays readable over HTTP
    pub retention_minutes: u32,
}

impl Default for InterviewSettings {
    fn default() -> Self {
        Self {
            duration_minutes: 30,
            affect_interval_ms: 1000,
            recorder_timeslice_ms: 1000,
            frame_buffer: 256,
            retention_minutes: 60,
        }
    }
}

impl InterviewSettings {
    pub fn duration(&self) -> Duration {
        Duration::from_secs(u64::from(self.duration_minutes) * 60)
    }

    pub fn affect_interval(&self) -> Duration {
        Duration::from_millis(self.affect_interval_ms)
    }

    pub fn retention(&self) -> Duration {
        Duration::from_secs(u64::from(self.retention_minutes) * 60)
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct CaptureSettings {
    /// Audio files here show up as microphones
    pub media_dir: String,
    pub sample_rate: u32,
    pub channels: u16,
    pub frame_duration_ms: u64,
    pub video_fps: u32,
    pub video_width: u32,
    pub video_height: u32,
}

impl Default for CaptureSettings {
    fn default() -> Self {
        let headless = HeadlessConfig::default();
        Self {
            media_dir: "~/.interview-coach/media".to_string(),
            sample_rate: headless.sample_rate,
            channels: 1,
            frame_duration_ms: headless.frame_duration_ms,
            video_fps: headless.video_fps,
            video_width: headless.video_width,
            video_height: headless.video_height,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct RemoteServices {
    pub reasoning_url: String,
    pub analysis_url: String,
    pub classifier_url: String,
    pub request_timeout_secs: u64,
    pub api_key: Option<String>,
}

impl Default for RemoteServices {
    fn default() -> Self {
        Self {
            reasoning_url: "http://localhost:5000".to_string(),
            analysis_url: "http://localhost:5000".to_string(),
            classifier_url: "http://localhost:5001/predict".to_string(),
            request_timeout_secs: 60,
            api_key: None,
        }
    }
}

impl RemoteServices {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct TranscriptionSettings {
    pub enabled: bool,
    pub nats_url: String,
}

impl Default for TranscriptionSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            nats_url: "nats://localhost:4222".to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    pub output_dir: String,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            output_dir: "~/.interview-coach/interviews".to_string(),
        }
    }
}

fn default_service_name() -> String {
    "interview-coach".to_string()
}

fn expand(path: &str) -> Result<PathBuf> {
    let expanded = shellexpand::full(path).with_context(|| format!("Failed to expand {}", path))?;
    Ok(PathBuf::from(expanded.as_ref()))
}

impl Config {
    /// Load `path` (any format the config crate knows, extension optional)
    /// with `INTERVIEW_COACH__SECTION__KEY` environment overrides
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .add_source(config::Environment::with_prefix("INTERVIEW_COACH").separator("__"))
            .build()
            .context("Failed to read configuration")?;

        settings
            .try_deserialize()
            .context("Invalid configuration")
    }

    pub fn media_dir(&self) -> Result<PathBuf> {
        expand(&self.capture.media_dir)
    }

    pub fn output_dir(&self) -> Result<PathBuf> {
        expand(&self.storage.output_dir)
    }

    pub fn headless(&self) -> HeadlessConfig {
        HeadlessConfig {
            sample_rate: self.capture.sample_rate,
            frame_duration_ms: self.capture.frame_duration_ms,
            video_fps: self.capture.video_fps,
            video_width: self.capture.video_width,
            video_height: self.capture.video_height,
        }
    }

    pub fn recorder(&self) -> RecorderConfig {
        RecorderConfig {
            timeslice_ms: self.interview.recorder_timeslice_ms,
            default_sample_rate: self.capture.sample_rate,
            default_channels: self.capture.channels,
        }
    }
}
