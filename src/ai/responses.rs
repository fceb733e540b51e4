//! Single-call backend on the Responses API.

use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::info;

use super::backend::CompletionBackend;
use super::client::OpenAiClient;
use super::extract::response_answer;
use crate::core::config::{AppConfig, DocumentSources};
use crate::core::models::{Answer, Question};
use crate::errors::RelayError;

pub struct ResponsesBackend {
    client: OpenAiClient,
    model: String,
    instructions: String,
    sources: DocumentSources,
    max_search_results: Option<u32>,
}

impl ResponsesBackend {
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: &AppConfig) -> Result<Self, RelayError> {
        Ok(Self {
            client: OpenAiClient::new(config)?,
            model: config.openai_model.clone(),
            instructions: config.instructions.clone(),
            sources: config.sources.clone(),
            max_search_results: config.max_search_results,
        })
    }

    /// Request body for `POST /responses`.
    #[must_use]
    pub fn build_request(&self, question: &Question) -> Value {
        let mut content = vec![json!({ "type": "input_text", "text": question.as_str() })];
        content.extend(
            self.sources
                .file_ids
                .iter()
                .map(|id| json!({ "type": "input_file", "file_id": id })),
        );

        let mut body = json!({
            "model": self.model,
            "instructions": self.instructions,
            "input": [{ "role": "user", "content": content }],
        });

        // file_search on this endpoint only searches vector stores; raw files
        // reach the model as input_file parts above.
        if !self.sources.vector_store_ids.is_empty() {
            let mut tool = json!({
                "type": "file_search",
                "vector_store_ids": self.sources.vector_store_ids,
            });
            if let Some(max) = self.max_search_results {
                tool["max_num_results"] = json!(max);
            }
            body["tools"] = json!([tool]);
        }

        body
    }
}

#[async_trait]
impl CompletionBackend for ResponsesBackend {
    fn name(&self) -> &'static str {
        "responses"
    }

    async fn answer(&self, question: &Question) -> Result<Answer, RelayError> {
        let request_body = self.build_request(question);
        let response = self
            .client
            .post_json("create response", "responses", &request_body)
            .await?;

        if let Some(id) = response.get("id").and_then(Value::as_str) {
            info!(response_id = %id, "Response created");
        }

        Ok(response_answer(&response))
    }
}
