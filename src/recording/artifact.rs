use anyhow::{Context, Result};
use std::path::Path;
use tracing::info;

pub const PCM_MIME_TYPE: &str = "audio/pcm";

/// Recorded media assembled from the recorder's chunks, in delivery order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaArtifact {
    /// Concatenation of every buffered chunk
    pub bytes: Vec<u8>,
    pub mime_type: String,
    /// Number of chunks the artifact was assembled from
    pub chunk_count: usize,
    pub sample_rate: u32,
    pub channels: u16,
}

impl MediaArtifact {
    pub fn from_chunks(chunks: Vec<Vec<u8>>, sample_rate: u32, channels: u16) -> Self {
        let chunk_count = chunks.len();
        let bytes = chunks.concat();

        Self {
            bytes,
            mime_type: PCM_MIME_TYPE.to_string(),
            chunk_count,
            sample_rate,
            channels,
        }
    }

    pub fn empty(sample_rate: u32, channels: u16) -> Self {
        Self::from_chunks(Vec::new(), sample_rate, channels)
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Recorded duration in seconds, derived from the PCM byte count
    pub fn duration_secs(&self) -> f64 {
        let bytes_per_second = self.sample_rate as f64 * self.channels.max(1) as f64 * 2.0;
        if bytes_per_second == 0.0 {
            return 0.0;
        }
        self.bytes.len() as f64 / bytes_per_second
    }

    /// Decode the PCM payload back into samples; a trailing odd byte is ignored
    pub fn samples(&self) -> impl Iterator<Item = i16> + '_ {
        self.bytes
            .chunks_exact(2)
            .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
    }

    /// Write the artifact as a 16-bit WAV file
    pub fn save_wav(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let spec = hound::WavSpec {
            channels: self.channels.max(1),
            sample_rate: self.sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };

        let mut writer = hound::WavWriter::create(path, spec)
            .with_context(|| format!("Failed to create WAV file: {:?}", path))?;
        for sample in self.samples() {
            writer
                .write_sample(sample)
                .context("Failed to write sample to WAV")?;
        }
        writer.finalize().context("Failed to finalize WAV file")?;

        info!(
            "Saved recording to {} ({:.1}s, {} chunks)",
            path.display(),
            self.duration_secs(),
            self.chunk_count
        );

        Ok(())
    }
}
