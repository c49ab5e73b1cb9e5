pub mod backend;
pub mod file;
pub mod headless;
pub mod manager;

pub use backend::{
    AudioFrame, CaptureError, CaptureProvider, DeviceInfo, DeviceKind, MediaFrame, TrackSender,
    VideoFrame,
};
pub use file::AudioFile;
pub use headless::{FileDeviceProvider, HeadlessConfig, TEST_PATTERN_DEVICE_ID};
pub use manager::{CaptureManager, MediaStream};
