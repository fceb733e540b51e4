//! Question in, answer out.

use tracing::info;

use crate::ai::backend::{self, CompletionBackend};
use crate::core::config::AppConfig;
use crate::core::models::{AnswerResult, Question};
use crate::errors::RelayError;

pub struct RequestRelay {
    backend: Box<dyn CompletionBackend>,
}

impl RequestRelay {
    #[must_use]
    pub fn new(backend: Box<dyn CompletionBackend>) -> Self {
        Self { backend }
    }

    /// Relay using the backend `config.protocol` selects.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Config`] when no document source is configured,
    /// before anything is sent.
    pub fn from_config(config: &AppConfig) -> Result<Self, RelayError> {
        config.require_sources()?;
        Ok(Self::new(backend::from_config(config)?))
    }

    /// # Errors
    ///
    /// Whatever the backend reports. An empty answer is returned as success
    /// with a hint.
    pub async fn ask(&self, question: &Question) -> Result<AnswerResult, RelayError> {
        info!(backend = self.backend.name(), "Forwarding question");
        let answer = self.backend.answer(question).await?;
        if answer.text.is_empty() {
            info!("Backend produced no answer text");
        }
        Ok(AnswerResult::from(answer))
    }
}

/// Validates `question` and answers it with the backend `config` selects.
///
/// # Errors
///
/// * [`RelayError::InvalidRequest`] for an empty question.
/// * [`RelayError::Config`] when no document source is configured.
/// * Any backend failure.
pub async fn handle_question(question: &str, config: &AppConfig) -> Result<AnswerResult, RelayError> {
    let question = Question::parse(question)?;
    RequestRelay::from_config(config)?.ask(&question).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::DocumentSources;
    use crate::core::models::{Answer, EMPTY_ANSWER_HINT};
    use async_trait::async_trait;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedBackend {
        text: &'static str,
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl CompletionBackend for FixedBackend {
        fn name(&self) -> &'static str {
            "fixed"
        }

        async fn answer(&self, question: &Question) -> Result<Answer, RelayError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            assert!(!question.as_str().is_empty());
            Ok(Answer {
                text: self.text.to_string(),
                sources: Vec::new(),
            })
        }
    }

    fn config() -> AppConfig {
        AppConfig::from_lookup(|key| match key {
            "OPENAI_API_KEY" => Some("sk-test".to_string()),
            "OPENAI_VECTOR_STORE_IDS" => Some("vs_1".to_string()),
            _ => None,
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_ask_passes_answer_through() {
        let calls = Arc::new(AtomicUsize::new(0));
        let relay = RequestRelay::new(Box::new(FixedBackend {
            text: "forty-two",
            calls: Arc::clone(&calls),
        }));

        let result = relay
            .ask(&Question::parse("meaning?").unwrap())
            .await
            .unwrap();
        assert_eq!(result.answer, "forty-two");
        assert_eq!(result.hint, None);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_empty_answer_is_success_with_hint() {
        let relay = RequestRelay::new(Box::new(FixedBackend {
            text: "",
            calls: Arc::new(AtomicUsize::new(0)),
        }));

        let result = relay.ask(&Question::parse("?").unwrap()).await.unwrap();
        assert_eq!(result.answer, "");
        assert_eq!(result.hint.as_deref(), Some(EMPTY_ANSWER_HINT));
    }

    #[tokio::test]
    async fn test_handle_question_rejects_blank_question() {
        let err = handle_question("   ", &config()).await.unwrap_err();
        assert_eq!(err.status_code(), 400);
    }

    #[tokio::test]
    async fn test_handle_question_requires_sources() {
        let mut config = config();
        config.sources = DocumentSources::default();

        let err = handle_question("what?", &config).await.unwrap_err();
        assert!(matches!(err, RelayError::Config(_)));
        assert_eq!(err.status_code(), 500);
    }
}
