use serde::{Deserialize, Serialize};

/// What the interviewer knows about the candidate before the first question
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterviewContext {
    /// e.g. "behavioral", "technical"
    pub interview_type: String,
    #[serde(default)]
    pub resume_text: String,
    #[serde(default)]
    pub job_description: String,
    /// Requested interview length; the service default applies when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_minutes: Option<u32>,
}
