use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{broadcast, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::artifact::MediaArtifact;
use crate::capture::{MediaFrame, MediaStream};
use crate::error::{InterviewError, Result};

/// Recorder configuration
#[derive(Debug, Clone)]
pub struct RecorderConfig {
    /// Length of each chunk in milliseconds of media time (default: 1000)
    pub timeslice_ms: u64,
    /// Format reported for recordings that never saw a frame
    pub default_sample_rate: u32,
    pub default_channels: u16,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            timeslice_ms: 1000,
            default_sample_rate: 16000,
            default_channels: 1,
        }
    }
}

/// Identifies one recording within a sink
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RecordingHandle(u64);

struct ChunkBuffer {
    chunks: Vec<Vec<u8>>,
    sample_rate: u32,
    channels: u16,
}

/// Chunk buffers keyed by handle
///
/// Lives in the sink rather than the recorder task so chunks survive the gap
/// between "stop requested" and "stop confirmed".
#[derive(Clone, Default)]
struct ChunkStore {
    buffers: Arc<Mutex<HashMap<RecordingHandle, ChunkBuffer>>>,
}

impl ChunkStore {
    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<RecordingHandle, ChunkBuffer>> {
        self.buffers.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn open(&self, handle: RecordingHandle, config: &RecorderConfig) {
        self.lock().insert(
            handle,
            ChunkBuffer {
                chunks: Vec::new(),
                sample_rate: config.default_sample_rate,
                channels: config.default_channels,
            },
        );
    }

    fn set_format(&self, handle: RecordingHandle, sample_rate: u32, channels: u16) {
        if let Some(buffer) = self.lock().get_mut(&handle) {
            buffer.sample_rate = sample_rate;
            buffer.channels = channels;
        }
    }

    /// Returns `false` if the recording has already been assembled or discarded
    fn append(&self, handle: RecordingHandle, chunk: Vec<u8>) -> bool {
        if chunk.is_empty() {
            return true;
        }
        match self.lock().get_mut(&handle) {
            Some(buffer) => {
                buffer.chunks.push(chunk);
                true
            }
            None => false,
        }
    }

    fn take(&self, handle: RecordingHandle) -> Option<ChunkBuffer> {
        self.lock().remove(&handle)
    }
}

struct ActiveRecorder {
    stop_tx: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

/// Chunked recorder over live capture streams
pub struct RecordingSink {
    config: RecorderConfig,
    next_handle: AtomicU64,
    store: ChunkStore,
    active: Mutex<HashMap<RecordingHandle, ActiveRecorder>>,
}

impl RecordingSink {
    pub fn new(config: RecorderConfig) -> Self {
        info!(
            "Recording sink initialized (timeslice: {}ms)",
            config.timeslice_ms
        );

        Self {
            config,
            next_handle: AtomicU64::new(1),
            store: ChunkStore::default(),
            active: Mutex::new(HashMap::new()),
        }
    }

    /// Start recording `stream`
    ///
    /// The stream is only read; the sink never stops its tracks.
    pub fn start(&self, stream: &MediaStream) -> Result<RecordingHandle> {
        let frames = stream.subscribe().map_err(|e| InterviewError::Recording {
            message: e.to_string(),
        })?;

        let handle = RecordingHandle(self.next_handle.fetch_add(1, Ordering::SeqCst));
        self.store.open(handle, &self.config);

        let (stop_tx, stop_rx) = oneshot::channel();
        let task = tokio::spawn(record_loop(
            handle,
            frames,
            stop_rx,
            self.store.clone(),
            self.config.timeslice_ms.max(1),
        ));

        self.active
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(handle, ActiveRecorder { stop_tx, task });

        info!("Recording {:?} started on stream {}", handle, stream.id());
        Ok(handle)
    }

    /// Artifact for a session that never recorded anything
    pub fn empty_artifact(&self) -> MediaArtifact {
        MediaArtifact::empty(self.config.default_sample_rate, self.config.default_channels)
    }

    /// Append a chunk to `handle`'s buffer
    ///
    /// Chunks arriving after the recording was assembled are dropped.
    pub fn ondata(&self, handle: RecordingHandle, chunk: Vec<u8>) {
        let len = chunk.len();
        if !self.store.append(handle, chunk) {
            debug!("Dropping late chunk ({} bytes) for {:?}", len, handle);
        }
    }

    /// Whether the recorder for `handle` is still running
    pub fn is_recording(&self, handle: RecordingHandle) -> bool {
        self.active
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains_key(&handle)
    }

    /// Stop the recording and assemble its artifact
    ///
    /// Resolves only after the recorder has flushed its final chunk. A handle
    /// with no running recorder resolves immediately with whatever was buffered.
    pub async fn stop(&self, handle: RecordingHandle) -> MediaArtifact {
        let active = self
            .active
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&handle);

        match active {
            Some(recorder) => {
                // The recorder may already have exited on its own (stream closed)
                let _ = recorder.stop_tx.send(());
                if let Err(e) = recorder.task.await {
                    error!("Recorder task for {:?} panicked: {}", handle, e);
                }
                debug!("Recorder {:?} confirmed stop", handle);
            }
            None => {
                warn!("Stop requested for inactive recording {:?}", handle);
            }
        }

        let artifact = match self.store.take(handle) {
            Some(buffer) => {
                MediaArtifact::from_chunks(buffer.chunks, buffer.sample_rate, buffer.channels)
            }
            None => self.empty_artifact(),
        };

        info!(
            "Recording {:?} assembled: {} chunks, {} bytes",
            handle,
            artifact.chunk_count,
            artifact.len()
        );

        artifact
    }

    /// Abort the recording and drop its buffered chunks
    pub fn discard(&self, handle: RecordingHandle) {
        let active = self
            .active
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&handle);
        if let Some(recorder) = active {
            recorder.task.abort();
        }
        if self.store.take(handle).is_some() {
            info!("Recording {:?} discarded", handle);
        }
    }
}

/// Accumulate audio into timeslice chunks until stopped or the stream ends
async fn record_loop(
    handle: RecordingHandle,
    mut frames: broadcast::Receiver<MediaFrame>,
    mut stop_rx: oneshot::Receiver<()>,
    store: ChunkStore,
    timeslice_ms: u64,
) {
    let mut slicer = Slicer::new(handle, store, timeslice_ms);

    loop {
        tokio::select! {
            _ = &mut stop_rx => {
                // Take everything the stream delivered before the stop request
                loop {
                    match frames.try_recv() {
                        Ok(frame) => slicer.push(frame),
                        Err(broadcast::error::TryRecvError::Lagged(n)) => {
                            warn!("Recorder {:?} lagged by {} frames", handle, n);
                        }
                        Err(_) => break,
                    }
                }
                break;
            }
            frame = frames.recv() => match frame {
                Ok(frame) => slicer.push(frame),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!("Recorder {:?} lagged by {} frames", handle, n);
                }
                Err(broadcast::error::RecvError::Closed) => {
                    debug!("Stream closed under recorder {:?}", handle);
                    break;
                }
            },
        }
    }

    slicer.flush();
}

/// Splits the audio track into fixed media-time chunks
struct Slicer {
    handle: RecordingHandle,
    store: ChunkStore,
    timeslice_ms: u64,
    current: Vec<u8>,
    slice_start_ms: Option<u64>,
}

impl Slicer {
    fn new(handle: RecordingHandle, store: ChunkStore, timeslice_ms: u64) -> Self {
        Self {
            handle,
            store,
            timeslice_ms,
            current: Vec::new(),
            slice_start_ms: None,
        }
    }

    fn push(&mut self, frame: MediaFrame) {
        let MediaFrame::Audio(frame) = frame else {
            return;
        };

        match self.slice_start_ms {
            None => {
                self.store
                    .set_format(self.handle, frame.sample_rate, frame.channels);
                self.slice_start_ms = Some(frame.timestamp_ms);
            }
            Some(start) if frame.timestamp_ms.saturating_sub(start) >= self.timeslice_ms => {
                self.flush();
                self.slice_start_ms = Some(frame.timestamp_ms);
            }
            Some(_) => {}
        }

        self.current.extend(frame.to_pcm_bytes());
    }

    fn flush(&mut self) {
        if self.current.is_empty() {
            return;
        }
        let chunk = std::mem::take(&mut self.current);
        if !self.store.append(self.handle, chunk) {
            debug!("Recording {:?} already closed, chunk dropped", self.handle);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::AudioFrame;

    fn audio(ts: u64, value: i16) -> MediaFrame {
        MediaFrame::Audio(AudioFrame {
            samples: vec![value; 2],
            sample_rate: 8000,
            channels: 1,
            timestamp_ms: ts,
        })
    }

    #[test]
    fn test_slicer_rotates_on_timeslice() {
        let store = ChunkStore::default();
        let handle = RecordingHandle(7);
        store.open(handle, &RecorderConfig::default());

        let mut slicer = Slicer::new(handle, store.clone(), 200);
        for (i, ts) in [0u64, 100, 200, 300, 400].into_iter().enumerate() {
            slicer.push(audio(ts, i as i16));
        }
        slicer.flush();

        let buffer = store.take(handle).unwrap();
        // [0,100] [200,300] [400]
        assert_eq!(buffer.chunks.len(), 3);
        assert_eq!(buffer.chunks[0].len(), 8);
        assert_eq!(buffer.chunks[2], vec![4, 0, 4, 0]);
        assert_eq!(buffer.sample_rate, 8000);
    }

    #[test]
    fn test_append_after_take_is_rejected() {
        let store = ChunkStore::default();
        let handle = RecordingHandle(1);
        store.open(handle, &RecorderConfig::default());
        assert!(store.append(handle, vec![1]));
        store.take(handle);
        assert!(!store.append(handle, vec![2]));
    }

    #[tokio::test]
    async fn test_stop_unknown_handle_yields_empty_artifact() {
        let sink = RecordingSink::new(RecorderConfig::default());
        let artifact = sink.stop(RecordingHandle(99)).await;
        assert!(artifact.is_empty());
        assert_eq!(artifact.sample_rate, 16000);
    }
}
