use chrono::{DateTime, Utc};
use std::fmt::Display;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use super::config::{SessionConfig, SessionServices};
use super::output::{Completion, EndTrigger, SessionEvent, SessionOutput, SessionStatus};
use super::phase::{Phase, PhaseCell};
use crate::affect::AffectSampler;
use crate::analysis::{feedback_or_placeholder, AnalysisRequest};
use crate::capture::MediaStream;
use crate::error::{InterviewError, Result};
use crate::interview::{Turn, TurnController};
use crate::recording::RecordingHandle;
use crate::transcription::TranscriptionFeed;

const RECOGNITION_NOTICE: &str =
    "Live transcription is unavailable. You can still type your answers.";

/// Resources acquired while starting, released exactly once on the way out
#[derive(Default)]
struct Resources {
    stream: Option<Arc<MediaStream>>,
    recording: Option<RecordingHandle>,
    deadline_task: Option<JoinHandle<()>>,
    started: Option<Started>,
}

#[derive(Debug, Clone, Copy)]
struct Started {
    at: DateTime<Utc>,
    deadline: Instant,
}

/// Whatever `stop_producers` took out of the session
struct Released {
    stream: Option<Arc<MediaStream>>,
    recording: Option<RecordingHandle>,
    started: Option<Started>,
    history: Vec<Turn>,
}

/// One live interview: capture, recording, transcription, affect sampling
/// and the turn protocol, ended exactly once by the deadline, the user, or
/// teardown.
pub struct InterviewSession {
    config: SessionConfig,
    services: SessionServices,
    phase: PhaseCell,
    controller: TurnController,
    feed: TranscriptionFeed,
    sampler: AffectSampler,
    resources: Mutex<Resources>,
    events: broadcast::Sender<SessionEvent>,
    completion: watch::Sender<Completion>,
    recognition_degraded: AtomicBool,
}

impl InterviewSession {
    /// Create an idle session
    pub fn new(
        config: SessionConfig,
        services: SessionServices,
        feed: TranscriptionFeed,
    ) -> Arc<Self> {
        let controller = TurnController::new(Arc::clone(&services.reasoning));
        let (events, _) = broadcast::channel(64);
        let (completion, _) = watch::channel(Completion::Pending);

        info!("Creating interview session: {}", config.session_id);

        Arc::new(Self {
            config,
            services,
            phase: PhaseCell::new(),
            controller,
            feed,
            sampler: AffectSampler::new(),
            resources: Mutex::new(Resources::default()),
            events,
            completion,
            recognition_degraded: AtomicBool::new(false),
        })
    }

    pub fn id(&self) -> &str {
        &self.config.session_id
    }

    pub fn phase(&self) -> Phase {
        self.phase.get()
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Live events: phase changes, new questions, notices
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    fn emit(&self, event: SessionEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    fn lock_resources(&self) -> MutexGuard<'_, Resources> {
        self.resources.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Acquire devices, start every component and ask the first question
    ///
    /// On failure the session returns to `Idle` with everything it acquired
    /// released, so `begin` may be retried.
    pub async fn begin(self: &Arc<Self>) -> Result<Turn> {
        self.phase
            .claim(&[Phase::Idle], Phase::Starting)
            .map_err(|phase| InterviewError::InvalidPhase { phase })?;
        self.emit(SessionEvent::PhaseChanged(Phase::Starting));
        info!("Starting interview {}", self.config.session_id);

        match self.start_components().await {
            Ok(question) => Ok(question),
            Err(e) => {
                self.release_startup_resources().await;
                if self.phase.rollback_start() {
                    warn!("Interview {} failed to start: {}", self.config.session_id, e);
                    self.emit(SessionEvent::PhaseChanged(Phase::Idle));
                    Err(e)
                } else {
                    debug!(
                        "Interview {} torn down while starting ({})",
                        self.config.session_id, e
                    );
                    Err(InterviewError::Abandoned)
                }
            }
        }
    }

    async fn start_components(self: &Arc<Self>) -> Result<Turn> {
        let capture = &self.services.capture;
        let recorder = &self.services.recorder;

        let stream = Arc::new(
            capture
                .acquire(
                    self.config.audio_device.as_deref(),
                    self.config.video_device.as_deref(),
                )
                .await?,
        );
        if !self.adopt(|r| r.stream = Some(Arc::clone(&stream))) {
            capture.release(&stream);
            return Err(InterviewError::Abandoned);
        }

        let recording = recorder.start(&stream)?;
        if !self.adopt(|r| r.recording = Some(recording)) {
            recorder.discard(recording);
            return Err(InterviewError::Abandoned);
        }

        if !self.feed.is_supported() {
            self.degrade_recognition("no speech recognizer configured");
        } else if let Err(e) = self.feed.start(&stream).await {
            self.degrade_recognition(e);
        }
        if self.phase.get() != Phase::Starting {
            self.feed.stop().await;
            return Err(InterviewError::Abandoned);
        }

        let question = match self.controller.begin(&self.config.context).await {
            Err(InterviewError::SessionClosed) => return Err(InterviewError::Abandoned),
            other => other?,
        };

        self.activate(&stream)?;
        self.emit(SessionEvent::Question(question.clone()));
        Ok(question)
    }

    /// Store something acquired during `Starting`
    ///
    /// Returns false when the session was torn down meanwhile; the caller
    /// then owns the resource and must release it.
    fn adopt(&self, store: impl FnOnce(&mut Resources)) -> bool {
        let mut resources = self.lock_resources();
        if self.phase.get() != Phase::Starting {
            return false;
        }
        store(&mut resources);
        true
    }

    /// Starting -> Active: start the sampler and arm the deadline
    fn activate(self: &Arc<Self>, stream: &MediaStream) -> Result<()> {
        let mut resources = self.lock_resources();
        self.phase
            .claim(&[Phase::Starting], Phase::Active)
            .map_err(|_| InterviewError::Abandoned)?;

        let now = Instant::now();
        let deadline = now + self.config.duration;
        resources.started = Some(Started {
            at: Utc::now(),
            deadline,
        });

        self.sampler.start(
            stream,
            self.config.affect_interval,
            Arc::clone(&self.services.classifier),
            now,
        );
        resources.deadline_task = Some(tokio::spawn(watch_deadline(Arc::downgrade(self), deadline)));
        drop(resources);

        self.emit(SessionEvent::PhaseChanged(Phase::Active));
        info!(
            "Interview {} active for {}s",
            self.config.session_id,
            self.config.duration.as_secs()
        );
        Ok(())
    }

    async fn release_startup_resources(&self) {
        let (stream, recording) = {
            let mut resources = self.lock_resources();
            (resources.stream.take(), resources.recording.take())
        };
        if let Some(recording) = recording {
            self.services.recorder.discard(recording);
        }
        if let Some(stream) = stream {
            self.services.capture.release(&stream);
        }
        self.feed.stop().await;
    }

    fn degrade_recognition(&self, reason: impl Display) {
        if !self.recognition_degraded.swap(true, Ordering::SeqCst) {
            warn!(
                "Live transcription unavailable for {}: {}",
                self.config.session_id, reason
            );
            self.emit(SessionEvent::Notice(RECOGNITION_NOTICE.to_string()));
        }
    }

    /// Submit an answer to the open question and return the next question
    ///
    /// With `text` unset the live transcription is used. Empty answers are
    /// accepted.
    pub async fn submit_answer(&self, text: Option<String>) -> Result<Turn> {
        let phase = self.phase.get();
        if phase != Phase::Active {
            return Err(InterviewError::InvalidPhase { phase });
        }

        let answer = text.unwrap_or_else(|| self.feed.text());
        let question = self.controller.submit_answer(answer).await?;
        self.emit(SessionEvent::Question(question.clone()));

        self.restart_recognition().await;
        Ok(question)
    }

    /// Clear the live transcription so the next answer starts empty
    async fn restart_recognition(&self) {
        if !self.feed.is_supported() {
            return;
        }
        let stream = self.lock_resources().stream.clone();
        let Some(stream) = stream else {
            return;
        };

        if let Err(e) = self.feed.restart(&stream).await {
            self.degrade_recognition(e);
        }
        // Ending may have stopped the feed while we were restarting it
        if self.phase.get() != Phase::Active {
            self.feed.stop().await;
        }
    }

    /// End the interview on the candidate's request
    ///
    /// Fails with `InvalidPhase` unless the session is active. Finalization
    /// runs to completion even if the caller stops waiting.
    pub async fn end(self: &Arc<Self>) -> Result<Arc<SessionOutput>> {
        self.finish(EndTrigger::User).await
    }

    async fn finish(self: &Arc<Self>, trigger: EndTrigger) -> Result<Arc<SessionOutput>> {
        self.phase
            .claim(&[Phase::Active], Phase::Ending)
            .map_err(|phase| InterviewError::InvalidPhase { phase })?;
        // Close sample and turn intake before anything else can run
        let released = self.stop_producers();
        let ended_at = Utc::now();
        self.emit(SessionEvent::PhaseChanged(Phase::Ending));
        info!("Ending interview {} ({:?})", self.config.session_id, trigger);

        let session = Arc::clone(self);
        tokio::spawn(async move { session.finalize(trigger, released, ended_at).await })
            .await
            .map_err(|e| InterviewError::Finalization {
                message: e.to_string(),
            })
    }

    /// Stop every producer and take the resources out of the session
    fn stop_producers(&self) -> Released {
        let mut resources = self.lock_resources();
        if let Some(task) = resources.deadline_task.take() {
            task.abort();
        }
        self.sampler.stop();
        let history = self.controller.close();

        Released {
            stream: resources.stream.take(),
            recording: resources.recording.take(),
            started: resources.started,
            history,
        }
    }

    async fn finalize(
        &self,
        trigger: EndTrigger,
        released: Released,
        ended_at: DateTime<Utc>,
    ) -> Arc<SessionOutput> {
        self.feed.stop().await;

        let artifact = match released.recording {
            Some(recording) => self.services.recorder.stop(recording).await,
            None => self.services.recorder.empty_artifact(),
        };
        if let Some(stream) = released.stream {
            self.services.capture.release(&stream);
        }

        let affect_samples = self.sampler.samples();
        let request = AnalysisRequest {
            history: &released.history,
            affect_samples: &affect_samples,
            artifact: &artifact,
        };
        let (feedback, feedback_is_placeholder) =
            feedback_or_placeholder(self.services.analysis.as_ref(), &request).await;

        let output = Arc::new(SessionOutput {
            session_id: self.config.session_id.clone(),
            started_at: released.started.map(|s| s.at).unwrap_or(ended_at),
            ended_at,
            trigger,
            history: released.history,
            affect_samples,
            feedback,
            feedback_is_placeholder,
            artifact: Arc::new(artifact),
        });

        self.complete(Completion::Finalized(Arc::clone(&output)));
        info!(
            "Interview {} ended: {} turns, {} affect samples, {} recorded bytes",
            output.session_id,
            output.history.len(),
            output.affect_samples.len(),
            output.artifact.len()
        );

        if let Some(store) = self.services.store.clone() {
            let output = Arc::clone(&output);
            tokio::spawn(async move {
                if let Err(e) = store.save(&output).await {
                    error!("Failed to store interview {}: {:#}", output.session_id, e);
                }
            });
        }

        output
    }

    /// Tear the session down without finalizing
    ///
    /// Releases everything, discards the recording, and makes no remote
    /// calls. Returns false when there was nothing to tear down.
    pub async fn abandon(&self) -> bool {
        let previous = match self
            .phase
            .claim(&[Phase::Starting, Phase::Active], Phase::Ending)
        {
            Ok(previous) => previous,
            Err(_) => return false,
        };
        let released = self.stop_producers();
        self.emit(SessionEvent::PhaseChanged(Phase::Ending));

        if let Some(recording) = released.recording {
            self.services.recorder.discard(recording);
        }
        if let Some(stream) = released.stream {
            self.services.capture.release(&stream);
        }
        self.feed.stop().await;

        self.complete(Completion::Abandoned);
        info!(
            "Interview {} torn down while {:?} ({:?})",
            self.config.session_id,
            previous,
            EndTrigger::Teardown
        );
        true
    }

    /// Publish the completion, then Ending -> Ended
    fn complete(&self, completion: Completion) {
        self.completion.send_replace(completion);
        if self.phase.claim(&[Phase::Ending], Phase::Ended).is_ok() {
            self.emit(SessionEvent::PhaseChanged(Phase::Ended));
        }
    }

    /// The finalized output, once the session has ended normally
    pub fn output(&self) -> Option<Arc<SessionOutput>> {
        match &*self.completion.borrow() {
            Completion::Finalized(output) => Some(Arc::clone(output)),
            _ => None,
        }
    }

    pub fn completion(&self) -> Completion {
        self.completion.borrow().clone()
    }

    /// Wait until the session has been finalized or torn down
    pub async fn wait_for_completion(&self) -> Completion {
        let mut rx = self.completion.subscribe();
        let completion = match rx.wait_for(|c| !matches!(c, Completion::Pending)).await {
            Ok(completion) => (*completion).clone(),
            Err(_) => self.completion(),
        };
        completion
    }

    /// Turns recorded so far
    pub fn history(&self) -> Vec<Turn> {
        self.controller.history()
    }

    /// Live transcription of the current answer
    pub fn transcript(&self) -> String {
        self.feed.text()
    }

    pub fn status(&self) -> SessionStatus {
        let phase = self.phase.get();
        let started = self.lock_resources().started;
        let remaining_secs = match (phase, started) {
            (Phase::Active, Some(started)) => Some(
                started
                    .deadline
                    .saturating_duration_since(Instant::now())
                    .as_secs(),
            ),
            _ => None,
        };

        SessionStatus {
            session_id: self.config.session_id.clone(),
            phase,
            started_at: started.map(|s| s.at),
            remaining_secs,
            current_question: self.controller.current_question().map(|turn| turn.text),
            live_transcript: self.feed.text(),
            turns: self.controller.history().len(),
            affect_samples: self.sampler.sample_count(),
            recognition_available: self.feed.is_supported()
                && !self.recognition_degraded.load(Ordering::SeqCst),
        }
    }
}

impl Drop for InterviewSession {
    fn drop(&mut self) {
        let resources = self.resources.get_mut().unwrap_or_else(|e| e.into_inner());
        if let Some(task) = resources.deadline_task.take() {
            task.abort();
        }
        if let Some(recording) = resources.recording.take() {
            self.services.recorder.discard(recording);
        }
        if let Some(stream) = resources.stream.take() {
            self.services.capture.release(&stream);
        }
    }
}

async fn watch_deadline(session: Weak<InterviewSession>, deadline: Instant) {
    tokio::time::sleep_until(deadline).await;

    let Some(session) = session.upgrade() else {
        return;
    };
    match session.finish(EndTrigger::Deadline).await {
        Ok(output) => info!("Interview {} reached its deadline", output.session_id),
        Err(e) => debug!("Deadline passed after the interview ended: {}", e),
    }
}
