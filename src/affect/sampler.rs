use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use super::classifier::{AffectClassifier, Emotion};
use crate::capture::MediaStream;

/// One classified camera frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AffectSample {
    pub label: Emotion,
    /// Milliseconds since the session became active
    pub offset_ms: u64,
}

#[derive(Default)]
struct SamplerState {
    running: bool,
    stopped: bool,
    samples: Vec<AffectSample>,
    skipped_ticks: u64,
}

/// Grabs a camera frame on a fixed interval and records its emotion label
///
/// Classifications may overlap; a slow one never delays the next tick.
/// Results that resolve after `stop()` are discarded.
pub struct AffectSampler {
    state: Arc<Mutex<SamplerState>>,
    ticker: Mutex<Option<JoinHandle<()>>>,
}

impl Default for AffectSampler {
    fn default() -> Self {
        Self::new()
    }
}

impl AffectSampler {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(SamplerState::default())),
            ticker: Mutex::new(None),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, SamplerState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Start ticking every `interval`, with offsets measured from `session_start`
    pub fn start(
        &self,
        stream: &MediaStream,
        interval: Duration,
        classifier: Arc<dyn AffectClassifier>,
        session_start: Instant,
    ) {
        {
            let mut state = self.lock();
            if state.running || state.stopped {
                warn!("Affect sampler already started");
                return;
            }
            state.running = true;
        }

        let frames = stream.video_frames();
        let state = Arc::clone(&self.state);
        let period = interval.max(Duration::from_millis(1));

        let ticker = tokio::spawn(async move {
            let mut ticks = tokio::time::interval_at(Instant::now() + period, period);
            ticks.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                ticks.tick().await;

                let latest = frames.borrow().clone();
                let Some(frame) = latest else {
                    debug!("No camera frame yet, skipping affect tick");
                    state.lock().unwrap_or_else(|e| e.into_inner()).skipped_ticks += 1;
                    continue;
                };

                // Each classification runs on its own so the timer never waits on it
                let classifier = Arc::clone(&classifier);
                let state = Arc::clone(&state);
                tokio::spawn(async move {
                    let result = classifier.classify(frame).await;
                    let mut state = state.lock().unwrap_or_else(|e| e.into_inner());
                    match result {
                        Ok(label) if state.running => {
                            let offset_ms = session_start.elapsed().as_millis() as u64;
                            state.samples.push(AffectSample { label, offset_ms });
                        }
                        Ok(label) => {
                            debug!("Discarding {} classified after sampler stopped", label);
                        }
                        Err(e) => {
                            debug!("Affect classification failed, tick skipped: {}", e);
                            state.skipped_ticks += 1;
                        }
                    }
                });
            }
        });

        *self.ticker.lock().unwrap_or_else(|e| e.into_inner()) = Some(ticker);
        info!("Affect sampler started ({}ms interval)", period.as_millis());
    }

    /// Halt future ticks. Returns `false` if the sampler was not running.
    ///
    /// Once this returns, the sample sequence is final.
    pub fn stop(&self) -> bool {
        let was_running = {
            let mut state = self.lock();
            let was_running = state.running;
            state.running = false;
            state.stopped = true;
            was_running
        };

        if let Some(ticker) = self.ticker.lock().unwrap_or_else(|e| e.into_inner()).take() {
            ticker.abort();
        }

        if was_running {
            let state = self.lock();
            info!(
                "Affect sampler stopped ({} samples, {} skipped ticks)",
                state.samples.len(),
                state.skipped_ticks
            );
        }

        was_running
    }

    pub fn is_running(&self) -> bool {
        self.lock().running
    }

    /// Snapshot of the samples collected so far, in time order
    pub fn samples(&self) -> Vec<AffectSample> {
        self.lock().samples.clone()
    }

    pub fn sample_count(&self) -> usize {
        self.lock().samples.len()
    }
}

impl Drop for AffectSampler {
    fn drop(&mut self) {
        if let Some(ticker) = self.ticker.lock().unwrap_or_else(|e| e.into_inner()).take() {
            ticker.abort();
        }
    }
}
