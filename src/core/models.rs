use serde::{Deserialize, Serialize};
use std::fmt;

use crate::errors::RelayError;

/// Returned next to an empty answer so the caller knows the run itself
/// succeeded.
pub const EMPTY_ANSWER_HINT: &str = "No answer text was produced. Check that the vector store \
contains the relevant documents or rephrase the question.";

/// A validated, trimmed, non-empty question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question(String);

impl Question {
    /// # Errors
    ///
    /// Returns [`RelayError::InvalidRequest`] if the text is empty after
    /// trimming.
    pub fn parse(raw: &str) -> Result<Self, RelayError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(RelayError::InvalidRequest(
                "question is required and must not be empty".to_string(),
            ));
        }
        Ok(Self(trimmed.to_string()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Inbound request body.
#[derive(Debug, Deserialize)]
pub struct AskRequest {
    #[serde(default)]
    pub question: Option<String>,
}

/// Text produced by a backend plus the document ids it cited.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Answer {
    pub text: String,
    pub sources: Vec<String>,
}

/// Body of a successful response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnswerResult {
    pub answer: String,
    pub sources: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

impl From<Answer> for AnswerResult {
    fn from(answer: Answer) -> Self {
        let hint = answer
            .text
            .is_empty()
            .then(|| EMPTY_ANSWER_HINT.to_string());
        Self {
            answer: answer.text,
            sources: answer.sources,
            hint,
        }
    }
}

/// Status of an Assistants run.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Queued,
    InProgress,
    RequiresAction,
    Cancelling,
    Completed,
    Failed,
    Cancelled,
    Expired,
    Incomplete,
    #[serde(other)]
    Unknown,
}

impl RunStatus {
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Completed | Self::Failed | Self::Cancelled | Self::Expired | Self::Incomplete
        )
    }

    #[must_use]
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            Self::Failed | Self::Cancelled | Self::Expired | Self::Incomplete
        )
    }

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::InProgress => "in_progress",
            Self::RequiresAction => "requires_action",
            Self::Cancelling => "cancelling",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
            Self::Expired => "expired",
            Self::Incomplete => "incomplete",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RunError {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IncompleteDetails {
    #[serde(default)]
    pub reason: Option<String>,
}

/// The fields of a run this relay looks at.
#[derive(Debug, Clone, Deserialize)]
pub struct Run {
    pub id: String,
    pub thread_id: String,
    pub status: RunStatus,
    #[serde(default)]
    pub last_error: Option<RunError>,
    #[serde(default)]
    pub incomplete_details: Option<IncompleteDetails>,
}

impl Run {
    /// Message describing a failed run: `last_error.message` when present,
    /// then `incomplete_details.reason`, otherwise the bare status.
    #[must_use]
    pub fn failure_message(&self) -> String {
        let error = self.last_error.as_ref().and_then(|e| e.message.as_deref());
        let reason = self
            .incomplete_details
            .as_ref()
            .and_then(|d| d.reason.as_deref());
        [error, reason]
            .into_iter()
            .flatten()
            .map(str::trim)
            .find(|m| !m.is_empty())
            .map_or_else(|| self.status.to_string(), ToString::to_string)
    }
}
