use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

use super::context::InterviewContext;
use super::turn::{Turn, TurnKind};
use crate::error::{InterviewError, Result};

/// Question-generation service
///
/// Any provider that turns a history into `{question}` fits. Calls are not
/// idempotent; callers must never resend an accepted answer.
#[async_trait::async_trait]
pub trait ReasoningService: Send + Sync {
    /// First question, seeded with the interview context
    async fn first_question(&self, context: &InterviewContext) -> Result<String>;

    /// Next question given the full history (ending with the new answer)
    async fn next_question(&self, history: &[Turn], last_answer: &str) -> Result<String>;
}

/// History entry as exchanged with the remote services
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    #[serde(rename = "type")]
    pub kind: TurnKind,
    pub content: String,
}

impl From<&Turn> for HistoryEntry {
    fn from(turn: &Turn) -> Self {
        Self {
            kind: turn.kind,
            content: turn.text.clone(),
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct NextQuestionRequest<'a> {
    interview_history: Vec<HistoryEntry>,
    answer: &'a str,
}

#[derive(Deserialize)]
struct QuestionResponse {
    question: Option<String>,
}

/// Reject responses without a usable question
fn validate_question(response: QuestionResponse) -> Result<String> {
    match response.question.map(|q| q.trim().to_string()) {
        Some(question) if !question.is_empty() => Ok(question),
        Some(_) => Err(InterviewError::malformed("reasoning", "empty question")),
        None => Err(InterviewError::malformed("reasoning", "missing field `question`")),
    }
}

fn generation_failed(message: impl Into<String>) -> InterviewError {
    InterviewError::TurnGenerationFailed {
        message: message.into(),
    }
}

/// Reasoning service reached over HTTP
///
/// - POST {base}/api/start-interview
/// - POST {base}/api/next-question
pub struct HttpReasoningService {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl HttpReasoningService {
    pub fn new(base_url: &str, api_key: Option<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| generation_failed(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.trim().trim_end_matches('/').to_string(),
            api_key,
        })
    }

    async fn post<T: Serialize + Sync>(&self, path: &str, body: &T) -> Result<String> {
        let url = format!("{}{}", self.base_url, path);
        debug!("Requesting question from {}", url);

        let mut request = self.client.post(&url).json(body);
        if let Some(ref key) = self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| generation_failed(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(generation_failed(format!("API error {}: {}", status, body)));
        }

        let parsed: QuestionResponse = response
            .json()
            .await
            .map_err(|e| InterviewError::malformed("reasoning", e.to_string()))?;

        validate_question(parsed)
    }
}

#[async_trait::async_trait]
impl ReasoningService for HttpReasoningService {
    async fn first_question(&self, context: &InterviewContext) -> Result<String> {
        info!("Starting {} interview", context.interview_type);
        self.post("/api/start-interview", context).await
    }

    async fn next_question(&self, history: &[Turn], last_answer: &str) -> Result<String> {
        let request = NextQuestionRequest {
            interview_history: history.iter().map(HistoryEntry::from).collect(),
            answer: last_answer,
        };
        self.post("/api/next-question", &request).await
    }
}
