//! Final feedback from the remote analysis service.
//!
//! A failed or malformed analysis never blocks a session: callers substitute
//! [`FeedbackResult::placeholder`].

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::affect::AffectSample;
use crate::error::{InterviewError, Result};
use crate::interview::{HistoryEntry, Turn};
use crate::recording::MediaArtifact;

pub const PLACEHOLDER_MESSAGE: &str = "Analysis could not be completed. Please try again.";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackResult {
    pub overall_performance: String,
    pub speech_analysis: String,
    pub areas_of_improvement: Vec<String>,
    pub strengths: Vec<String>,
}

impl FeedbackResult {
    pub fn placeholder() -> Self {
        Self {
            overall_performance: PLACEHOLDER_MESSAGE.to_string(),
            speech_analysis: PLACEHOLDER_MESSAGE.to_string(),
            areas_of_improvement: Vec::new(),
            strengths: Vec::new(),
        }
    }

    pub fn is_placeholder(&self) -> bool {
        *self == Self::placeholder()
    }
}

/// Everything the analysis service sees about a finished interview
pub struct AnalysisRequest<'a> {
    pub history: &'a [Turn],
    pub affect_samples: &'a [AffectSample],
    pub artifact: &'a MediaArtifact,
}

#[async_trait::async_trait]
pub trait AnalysisService: Send + Sync {
    async fn analyze(&self, request: &AnalysisRequest<'_>) -> Result<FeedbackResult>;
}

/// Run the analysis, falling back to the placeholder on any failure
///
/// Returns the feedback and whether it is the placeholder.
pub async fn feedback_or_placeholder(
    service: &dyn AnalysisService,
    request: &AnalysisRequest<'_>,
) -> (FeedbackResult, bool) {
    match service.analyze(request).await {
        Ok(feedback) => (feedback, false),
        Err(e) => {
            warn!("Analysis failed, using placeholder feedback: {}", e);
            (FeedbackResult::placeholder(), true)
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct InterviewData<'a> {
    interview_history: Vec<HistoryEntry>,
    emotion_predictions: &'a [AffectSample],
}

#[derive(Deserialize)]
#[serde(untagged)]
enum AnalysisResponse {
    Envelope { feedback: FeedbackResult },
    Bare(FeedbackResult),
}

fn validate_feedback(response: AnalysisResponse) -> Result<FeedbackResult> {
    let feedback = match response {
        AnalysisResponse::Envelope { feedback } => feedback,
        AnalysisResponse::Bare(feedback) => feedback,
    };
    if feedback.overall_performance.trim().is_empty() {
        return Err(InterviewError::malformed("analysis", "empty overallPerformance"));
    }
    Ok(feedback)
}

fn analysis_failed(message: impl Into<String>) -> InterviewError {
    InterviewError::AnalysisFailed {
        message: message.into(),
    }
}

/// Analysis service reached over HTTP (`POST {base}/api/analyze-interview`)
///
/// Sends the recording as the `video` part and the history plus affect
/// samples as the `interviewData` JSON part.
pub struct HttpAnalysisService {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl HttpAnalysisService {
    pub fn new(base_url: &str, api_key: Option<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| analysis_failed(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.trim().trim_end_matches('/').to_string(),
            api_key,
        })
    }
}

#[async_trait::async_trait]
impl AnalysisService for HttpAnalysisService {
    async fn analyze(&self, request: &AnalysisRequest<'_>) -> Result<FeedbackResult> {
        let url = format!("{}/api/analyze-interview", self.base_url);

        let data = InterviewData {
            interview_history: request.history.iter().map(HistoryEntry::from).collect(),
            emotion_predictions: request.affect_samples,
        };
        let data = serde_json::to_string(&data).map_err(|e| analysis_failed(e.to_string()))?;

        let video = reqwest::multipart::Part::bytes(request.artifact.bytes.clone())
            .file_name("interview.pcm")
            .mime_str(&request.artifact.mime_type)
            .map_err(|e| analysis_failed(e.to_string()))?;
        let form = reqwest::multipart::Form::new()
            .part("video", video)
            .text("interviewData", data);

        debug!(
            "Submitting interview for analysis ({} turns, {} affect samples, {} bytes)",
            request.history.len(),
            request.affect_samples.len(),
            request.artifact.len()
        );

        let mut req = self.client.post(&url).multipart(form);
        if let Some(ref key) = self.api_key {
            req = req.bearer_auth(key);
        }

        let response = req
            .send()
            .await
            .map_err(|e| analysis_failed(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(analysis_failed(format!("API error {}: {}", status, body)));
        }

        let parsed: AnalysisResponse = response
            .json()
            .await
            .map_err(|e| InterviewError::malformed("analysis", e.to_string()))?;

        let feedback = validate_feedback(parsed)?;
        info!("Analysis complete");
        Ok(feedback)
    }
}
