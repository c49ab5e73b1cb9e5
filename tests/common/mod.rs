// Fake capabilities shared by the integration tests
//
// Every fake implements the crate's capability traits and counts its calls
// so tests can assert on side effects (remote calls, open devices).

#![allow(dead_code)]

use interview_coach::affect::{AffectClassifier, Emotion};
use interview_coach::analysis::{AnalysisRequest, AnalysisService, FeedbackResult};
use interview_coach::capture::{
    AudioFrame, CaptureError, CaptureManager, CaptureProvider, DeviceInfo, DeviceKind,
    MediaFrame, TrackSender, VideoFrame,
};
use interview_coach::error::{InterviewError, Result};
use interview_coach::interview::{InterviewContext, ReasoningService, Turn};
use interview_coach::recording::{RecorderConfig, RecordingSink};
use interview_coach::session::{SessionConfig, SessionOutput, SessionServices};
use interview_coach::storage::InterviewStore;
use interview_coach::transcription::{RecognitionError, Recognizer};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, Notify};
use tokio::task::JoinHandle;

// ============================================================================
// Capture
// ============================================================================

/// Decrements the live-producer count when a producer task is dropped
struct LiveGuard(Arc<AtomicUsize>);

impl Drop for LiveGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// One microphone and one camera; audio every 10ms, video every 100ms
#[derive(Default)]
pub struct FakeDevices {
    pub deny_permission: AtomicBool,
    pub opened: AtomicUsize,
    pub live_producers: Arc<AtomicUsize>,
}

impl FakeDevices {
    pub fn live(&self) -> usize {
        self.live_producers.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl CaptureProvider for FakeDevices {
    async fn list_devices(&self) -> std::result::Result<Vec<DeviceInfo>, CaptureError> {
        Ok(vec![
            DeviceInfo {
                id: "mic-1".to_string(),
                label: "Fake microphone".to_string(),
                kind: DeviceKind::AudioInput,
            },
            DeviceInfo {
                id: "cam-1".to_string(),
                label: "Fake camera".to_string(),
                kind: DeviceKind::VideoInput,
            },
        ])
    }

    async fn open(
        &self,
        _audio: &DeviceInfo,
        _video: &DeviceInfo,
        tracks: TrackSender,
    ) -> std::result::Result<Vec<JoinHandle<()>>, CaptureError> {
        if self.deny_permission.load(Ordering::SeqCst) {
            return Err(CaptureError::PermissionDenied("camera".to_string()));
        }
        self.opened.fetch_add(1, Ordering::SeqCst);
        self.live_producers.fetch_add(2, Ordering::SeqCst);

        let audio_tracks = tracks.clone();
        let audio_guard = LiveGuard(Arc::clone(&self.live_producers));
        let audio = tokio::spawn(async move {
            let _guard = audio_guard;
            let mut timestamp_ms = 0;
            loop {
                audio_tracks.send_audio(AudioFrame {
                    samples: vec![1000; 160],
                    sample_rate: 16000,
                    channels: 1,
                    timestamp_ms,
                });
                timestamp_ms += 10;
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        });

        let video_guard = LiveGuard(Arc::clone(&self.live_producers));
        let video = tokio::spawn(async move {
            let _guard = video_guard;
            let mut timestamp_ms = 0;
            loop {
                tracks.send_video(VideoFrame {
                    width: 4,
                    height: 4,
                    pixels: Arc::new(vec![128; 4 * 4 * 3]),
                    timestamp_ms,
                });
                timestamp_ms += 100;
                tokio::time::sleep(Duration::from_millis(100)).await;
            }
        });

        Ok(vec![audio, video])
    }

    fn name(&self) -> &str {
        "fake"
    }
}

// ============================================================================
// Remote services
// ============================================================================

#[derive(Default)]
pub struct FakeReasoning {
    pub fail_first: AtomicBool,
    pub fail_next: AtomicBool,
    /// Delay before each answer is turned into a question
    pub next_delay: Mutex<Duration>,
    pub first_delay: Mutex<Duration>,
    /// When set, follow-up questions wait for a notification
    pub next_gate: Mutex<Option<Arc<Notify>>>,
    pub calls: AtomicUsize,
}

impl FakeReasoning {
    pub fn gate_next(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.next_gate.lock().unwrap() = Some(Arc::clone(&gate));
        gate
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn set_next_delay(&self, delay: Duration) {
        *self.next_delay.lock().unwrap() = delay;
    }

    pub fn set_first_delay(&self, delay: Duration) {
        *self.first_delay.lock().unwrap() = delay;
    }
}

#[async_trait::async_trait]
impl ReasoningService for FakeReasoning {
    async fn first_question(&self, _context: &InterviewContext) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.first_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if self.fail_first.load(Ordering::SeqCst) {
            return Err(InterviewError::TurnGenerationFailed {
                message: "HTTP 500".to_string(),
            });
        }
        Ok("Tell me about yourself.".to_string())
    }

    async fn next_question(&self, history: &[Turn], _last_answer: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.next_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        let gate = self.next_gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        if self.fail_next.load(Ordering::SeqCst) {
            return Err(InterviewError::TurnGenerationFailed {
                message: "timeout".to_string(),
            });
        }
        Ok(format!("Follow-up after {} turns?", history.len()))
    }
}

#[derive(Default)]
pub struct FakeAnalysis {
    pub fail: AtomicBool,
    pub calls: AtomicUsize,
    /// (turns, affect samples, recorded bytes) of the last request
    pub last_request: Mutex<Option<(usize, usize, usize)>>,
}

impl FakeAnalysis {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl AnalysisService for FakeAnalysis {
    async fn analyze(&self, request: &AnalysisRequest<'_>) -> Result<FeedbackResult> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_request.lock().unwrap() = Some((
            request.history.len(),
            request.affect_samples.len(),
            request.artifact.len(),
        ));
        if self.fail.load(Ordering::SeqCst) {
            return Err(InterviewError::AnalysisFailed {
                message: "HTTP 502".to_string(),
            });
        }
        Ok(FeedbackResult {
            overall_performance: "Clear and structured.".to_string(),
            speech_analysis: "Good pacing.".to_string(),
            areas_of_improvement: vec!["Quantify impact".to_string()],
            strengths: vec!["Concrete examples".to_string()],
        })
    }
}

/// Always "happy"; optionally slow or held until notified
#[derive(Default)]
pub struct FakeClassifier {
    pub delay: Mutex<Duration>,
    pub gate: Mutex<Option<Arc<Notify>>>,
    pub calls: AtomicUsize,
}

impl FakeClassifier {
    pub fn gate(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.gate.lock().unwrap() = Some(Arc::clone(&gate));
        gate
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl AffectClassifier for FakeClassifier {
    async fn classify(&self, _frame: VideoFrame) -> Result<Emotion> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        let gate = self.gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        Ok(Emotion::Happy)
    }
}

#[derive(Default)]
pub struct MemoryStore {
    pub saved: Mutex<Vec<String>>,
}

impl MemoryStore {
    pub fn saved(&self) -> Vec<String> {
        self.saved.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl InterviewStore for MemoryStore {
    async fn save(&self, output: &SessionOutput) -> anyhow::Result<()> {
        self.saved.lock().unwrap().push(output.session_id.clone());
        Ok(())
    }
}

// ============================================================================
// Recognition
// ============================================================================

/// Hears the same utterance every time it starts listening
pub struct ScriptedRecognizer {
    pub utterance: String,
    pub starts: AtomicUsize,
    listening: AtomicBool,
}

impl ScriptedRecognizer {
    pub fn new(utterance: &str) -> Self {
        Self {
            utterance: utterance.to_string(),
            starts: AtomicUsize::new(0),
            listening: AtomicBool::new(false),
        }
    }

    pub fn starts(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl Recognizer for ScriptedRecognizer {
    async fn start(
        &self,
        _audio: broadcast::Receiver<MediaFrame>,
        updates: mpsc::UnboundedSender<String>,
    ) -> std::result::Result<(), RecognitionError> {
        if self.listening.swap(true, Ordering::SeqCst) {
            return Err(RecognitionError::AlreadyStarted);
        }
        self.starts.fetch_add(1, Ordering::SeqCst);
        let _ = updates.send(self.utterance.clone());
        Ok(())
    }

    async fn stop(&self) -> std::result::Result<(), RecognitionError> {
        if !self.listening.swap(false, Ordering::SeqCst) {
            return Err(RecognitionError::AlreadyStopped);
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

// ============================================================================
// Harness
// ============================================================================

pub struct Harness {
    pub devices: Arc<FakeDevices>,
    pub reasoning: Arc<FakeReasoning>,
    pub analysis: Arc<FakeAnalysis>,
    pub classifier: Arc<FakeClassifier>,
    pub store: Arc<MemoryStore>,
    pub services: SessionServices,
}

impl Harness {
    pub fn new() -> Self {
        let devices = Arc::new(FakeDevices::default());
        let reasoning = Arc::new(FakeReasoning::default());
        let analysis = Arc::new(FakeAnalysis::default());
        let classifier = Arc::new(FakeClassifier::default());
        let store = Arc::new(MemoryStore::default());

        let services = SessionServices {
            capture: Arc::new(CaptureManager::new(devices.clone(), 1024)),
            recorder: Arc::new(RecordingSink::new(RecorderConfig::default())),
            reasoning: reasoning.clone(),
            analysis: analysis.clone(),
            classifier: classifier.clone(),
            store: Some(store.clone()),
        };

        Self {
            devices,
            reasoning,
            analysis,
            classifier,
            store,
            services,
        }
    }
}

pub fn session_config(session_id: &str, duration: Duration) -> SessionConfig {
    SessionConfig {
        session_id: session_id.to_string(),
        context: InterviewContext {
            interview_type: "behavioral".to_string(),
            resume_text: "Five years of backend work".to_string(),
            job_description: "Senior engineer".to_string(),
            duration_minutes: None,
        },
        duration,
        affect_interval: Duration::from_secs(1),
        audio_device: None,
        video_device: None,
    }
}
