use async_trait::async_trait;

use super::assistants::AssistantsBackend;
use super::responses::ResponsesBackend;
use crate::core::config::{AppConfig, Protocol};
use crate::core::models::{Answer, Question};
use crate::errors::RelayError;

/// One way of asking `OpenAI` a question against the configured documents.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Answers `question`. An empty answer text is not an error.
    async fn answer(&self, question: &Question) -> Result<Answer, RelayError>;
}

/// Builds the backend selected by `config.protocol`.
///
/// # Errors
///
/// Returns an error if the HTTP client cannot be built.
pub fn from_config(config: &AppConfig) -> Result<Box<dyn CompletionBackend>, RelayError> {
    Ok(match config.protocol {
        Protocol::Responses => Box::new(ResponsesBackend::new(config)?),
        Protocol::Assistants => Box::new(AssistantsBackend::new(config)?),
    })
}
