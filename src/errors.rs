use serde_json::{Value, json};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("Method {0} not allowed")]
    MethodNotAllowed(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Configuration error: {0}")]
    Config(String),

    /// The external API answered with a non-success status. `body` is kept
    /// exactly as received.
    #[error("OpenAI API error (status {status}) during {step}")]
    Upstream {
        status: u16,
        step: &'static str,
        body: String,
    },

    #[error("Run {status}: {message}")]
    RunFailed { status: String, message: String },

    #[error("Timed out after {}s waiting for the run to complete", .0.as_secs())]
    Timeout(Duration),

    #[error("Failed to send HTTP request: {0}")]
    Http(String),

    #[error("{0}")]
    Unexpected(String),
}

impl RelayError {
    /// HTTP status returned to the caller for this error.
    #[must_use]
    pub fn status_code(&self) -> u16 {
        match self {
            Self::MethodNotAllowed(_) => 405,
            Self::InvalidRequest(_) => 400,
            Self::Upstream { status, .. } => *status,
            Self::Config(_)
            | Self::RunFailed { .. }
            | Self::Timeout(_)
            | Self::Http(_)
            | Self::Unexpected(_) => 500,
        }
    }

    /// JSON body returned to the caller. Upstream failures carry the
    /// external payload under `detail`, parsed when it is JSON and raw
    /// otherwise.
    #[must_use]
    pub fn to_body(&self) -> Value {
        match self {
            Self::Upstream { body, .. } => {
                let detail = serde_json::from_str::<Value>(body)
                    .unwrap_or_else(|_| Value::String(body.clone()));
                json!({ "error": self.to_string(), "detail": detail })
            }
            _ => json!({ "error": self.to_string() }),
        }
    }
}

impl From<reqwest::Error> for RelayError {
    fn from(error: reqwest::Error) -> Self {
        RelayError::Http(error.to_string())
    }
}
