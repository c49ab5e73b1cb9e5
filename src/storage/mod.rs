//! Persistence of finished interviews.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::info;

use crate::affect::AffectSample;
use crate::analysis::FeedbackResult;
use crate::interview::Turn;
use crate::session::SessionOutput;

/// Stored form of a finished interview
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterviewRecord {
    pub session_id: String,
    pub completed_at: DateTime<Utc>,
    pub history: Vec<Turn>,
    pub feedback: FeedbackResult,
    pub affect_samples: Vec<AffectSample>,
}

impl From<&SessionOutput> for InterviewRecord {
    fn from(output: &SessionOutput) -> Self {
        Self {
            session_id: output.session_id.clone(),
            completed_at: output.ended_at,
            history: output.history.clone(),
            feedback: output.feedback.clone(),
            affect_samples: output.affect_samples.clone(),
        }
    }
}

/// Persistence collaborator; sessions call it without waiting on the result
#[async_trait::async_trait]
pub trait InterviewStore: Send + Sync {
    async fn save(&self, output: &SessionOutput) -> Result<()>;
}

/// Writes `<dir>/<session_id>/interview.json` and `recording.wav`
pub struct JsonFileStore {
    output_dir: PathBuf,
}

impl JsonFileStore {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    pub fn session_dir(&self, session_id: &str) -> PathBuf {
        self.output_dir.join(session_id)
    }

    /// Load a previously stored interview
    pub async fn load(&self, session_id: &str) -> Result<InterviewRecord> {
        let path = self.session_dir(session_id).join("interview.json");
        let bytes = tokio::fs::read(&path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        serde_json::from_slice(&bytes).context("Failed to parse interview record")
    }
}

#[async_trait::async_trait]
impl InterviewStore for JsonFileStore {
    async fn save(&self, output: &SessionOutput) -> Result<()> {
        let dir = self.session_dir(&output.session_id);
        tokio::fs::create_dir_all(&dir)
            .await
            .with_context(|| format!("Failed to create {}", dir.display()))?;

        let record = InterviewRecord::from(output);
        let json = serde_json::to_vec_pretty(&record)?;
        tokio::fs::write(dir.join("interview.json"), json)
            .await
            .context("Failed to write interview record")?;

        let artifact = output.artifact.clone();
        let wav_path = dir.join("recording.wav");
        tokio::task::spawn_blocking(move || artifact.save_wav(&wav_path))
            .await
            .context("Recording writer panicked")??;

        info!("Stored interview {} in {}", output.session_id, dir.display());
        Ok(())
    }
}
