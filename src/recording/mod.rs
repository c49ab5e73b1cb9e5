//! Recording sink: wraps a live stream into a chunked recorder and
//! assembles the final media artifact once the recorder confirms its stop.

mod artifact;
mod sink;

pub use artifact::{MediaArtifact, PCM_MIME_TYPE};
pub use sink::{RecorderConfig, RecordingHandle, RecordingSink};
