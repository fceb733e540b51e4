//! Assistant + Thread + Run backend.
//!
//! Each question creates its own assistant and thread. Neither is deleted
//! afterwards. Vector stores are attached when the run is created; the
//! assistant only enables the `file_search` tool.

use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::{error, info, warn};

use super::backend::CompletionBackend;
use super::client::{OpenAiClient, required_str};
use super::extract::assistant_answer;
use crate::core::config::{AppConfig, DocumentSources};
use crate::core::models::{Answer, Question, Run};
use crate::errors::RelayError;
use crate::utils::poll::{PollError, PollPolicy, poll_until};

const ASSISTANT_NAME: &str = "Document Q&A";
const MESSAGE_PAGE_SIZE: &str = "20";

pub struct AssistantsBackend {
    client: OpenAiClient,
    model: String,
    instructions: String,
    sources: DocumentSources,
    policy: PollPolicy,
}

impl AssistantsBackend {
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: &AppConfig) -> Result<Self, RelayError> {
        Ok(Self {
            client: OpenAiClient::for_assistants(config)?,
            model: config.openai_model.clone(),
            instructions: config.instructions.clone(),
            sources: config.sources.clone(),
            policy: PollPolicy::new(config.poll_interval, config.poll_timeout),
        })
    }

    #[must_use]
    pub fn assistant_request(&self) -> Value {
        json!({
            "model": self.model,
            "name": ASSISTANT_NAME,
            "instructions": self.instructions,
            "tools": [{ "type": "file_search" }],
        })
    }

    #[must_use]
    pub fn thread_request(&self, question: &Question) -> Value {
        let mut message = json!({ "role": "user", "content": question.as_str() });
        if !self.sources.file_ids.is_empty() {
            let attachments: Vec<Value> = self
                .sources
                .file_ids
                .iter()
                .map(|id| json!({ "file_id": id, "tools": [{ "type": "file_search" }] }))
                .collect();
            message["attachments"] = json!(attachments);
        }
        json!({ "messages": [message] })
    }

    #[must_use]
    pub fn run_request(&self, assistant_id: &str) -> Value {
        let mut body = json!({ "assistant_id": assistant_id });
        if !self.sources.vector_store_ids.is_empty() {
            body["tool_resources"] = json!({
                "file_search": { "vector_store_ids": self.sources.vector_store_ids }
            });
        }
        body
    }

    async fn create_assistant(&self) -> Result<String, RelayError> {
        let step = "create assistant";
        let value = self
            .client
            .post_json(step, "assistants", &self.assistant_request())
            .await?;
        Ok(required_str(&value, "id", step)?.to_string())
    }

    async fn create_thread(&self, question: &Question) -> Result<String, RelayError> {
        let step = "create thread";
        let value = self
            .client
            .post_json(step, "threads", &self.thread_request(question))
            .await?;
        Ok(required_str(&value, "id", step)?.to_string())
    }

    async fn create_run(&self, thread_id: &str, assistant_id: &str) -> Result<Run, RelayError> {
        let value = self
            .client
            .post_json(
                "create run",
                &format!("threads/{thread_id}/runs"),
                &self.run_request(assistant_id),
            )
            .await?;
        serde_json::from_value(value).map_err(|e| {
            RelayError::Unexpected(format!("Unexpected run payload from create run: {e}"))
        })
    }

    async fn fetch_run(&self, thread_id: &str, run_id: &str) -> Result<Run, RelayError> {
        let value = self
            .client
            .get_json(
                "retrieve run",
                &format!("threads/{thread_id}/runs/{run_id}"),
                &[],
            )
            .await?;
        let run: Run = serde_json::from_value(value).map_err(|e| {
            RelayError::Unexpected(format!("Unexpected run payload from retrieve run: {e}"))
        })?;
        info!(run_id = %run.id, status = %run.status, "Run status");
        Ok(run)
    }

    /// Polls the run until it completes.
    ///
    /// # Errors
    ///
    /// [`RelayError::RunFailed`] on `failed`, `cancelled`, `expired` or
    /// `incomplete`,
    /// [`RelayError::Timeout`] when the policy runs out, and any error from
    /// the status call itself.
    pub async fn wait_for_run(&self, thread_id: &str, run_id: &str) -> Result<Run, RelayError> {
        poll_until(
            self.policy,
            || self.fetch_run(thread_id, run_id),
            |run: &Run| run.status.is_terminal() && !run.status.is_failure(),
            |run: &Run| run.status.is_failure(),
        )
        .await
        .map_err(|e| match e {
            PollError::Check(inner) => inner,
            PollError::Failed(run) => {
                let message = run.failure_message();
                error!(run_id = %run.id, status = %run.status, error = %message, "Run ended without completing");
                RelayError::RunFailed {
                    status: run.status.to_string(),
                    message,
                }
            }
            PollError::TimedOut(after) => {
                warn!(run_id = %run_id, "Gave up waiting for run");
                RelayError::Timeout(after)
            }
        })
    }

    async fn latest_answer(&self, thread_id: &str) -> Result<Answer, RelayError> {
        let messages = self
            .client
            .get_json(
                "list messages",
                &format!("threads/{thread_id}/messages"),
                &[("order", "desc"), ("limit", MESSAGE_PAGE_SIZE)],
            )
            .await?;
        Ok(assistant_answer(&messages))
    }
}

#[async_trait]
impl CompletionBackend for AssistantsBackend {
    fn name(&self) -> &'static str {
        "assistants"
    }

    async fn answer(&self, question: &Question) -> Result<Answer, RelayError> {
        let assistant_id = self.create_assistant().await?;
        info!(assistant_id = %assistant_id, "Assistant created");

        let thread_id = self.create_thread(question).await?;
        info!(thread_id = %thread_id, "Thread created");

        let run = self.create_run(&thread_id, &assistant_id).await?;
        info!(run_id = %run.id, status = %run.status, "Run created");

        let run = self.wait_for_run(&run.thread_id, &run.id).await?;
        info!(run_id = %run.id, "Run completed");

        self.latest_answer(&thread_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use wiremock::matchers::{body_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(base_url: &str, file_ids: Option<&str>) -> AppConfig {
        let base_url = base_url.to_string();
        let file_ids = file_ids.map(ToString::to_string);
        let mut config = AppConfig::from_lookup(move |key| match key {
            "OPENAI_API_KEY" => Some("sk-test".to_string()),
            "OPENAI_VECTOR_STORE_IDS" => Some("vs_1".to_string()),
            "OPENAI_FILE_IDS" => file_ids.clone(),
            "OPENAI_BASE_URL" => Some(base_url.clone()),
            "RELAY_PROTOCOL" => Some("assistants".to_string()),
            _ => None,
        })
        .unwrap();
        config.poll_interval = Duration::from_millis(10);
        config.poll_timeout = Duration::from_millis(300);
        config
    }

    fn run(status: &str) -> Value {
        json!({ "id": "run_1", "object": "thread.run", "thread_id": "thread_1", "status": status })
    }

    async fn mount_setup(server: &MockServer) {
        Mock::given(method("POST"))
            .and(path("/assistants"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "asst_1" })))
            .expect(1)
            .mount(server)
            .await;
        Mock::given(method("POST"))
            .and(path("/threads"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "thread_1" })))
            .expect(1)
            .mount(server)
            .await;
        Mock::given(method("POST"))
            .and(path("/threads/thread_1/runs"))
            .and(body_json(json!({
                "assistant_id": "asst_1",
                "tool_resources": { "file_search": { "vector_store_ids": ["vs_1"] } }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(run("queued")))
            .expect(1)
            .mount(server)
            .await;
    }

    #[test]
    fn test_vector_stores_only_attached_to_run() {
        let backend = AssistantsBackend::new(&config("http://localhost", None)).unwrap();

        let assistant = backend.assistant_request();
        assert!(assistant.get("tool_resources").is_none());
        assert_eq!(assistant["tools"], json!([{ "type": "file_search" }]));

        let run = backend.run_request("asst_1");
        assert_eq!(
            run["tool_resources"]["file_search"]["vector_store_ids"],
            json!(["vs_1"])
        );
    }

    #[test]
    fn test_file_ids_become_message_attachments() {
        let backend =
            AssistantsBackend::new(&config("http://localhost", Some("file-a,file-b"))).unwrap();
        let thread = backend.thread_request(&Question::parse(" Where is it? ").unwrap());

        let message = &thread["messages"][0];
        assert_eq!(message["role"], "user");
        assert_eq!(message["content"], "Where is it?");
        assert_eq!(message["attachments"][1]["file_id"], "file-b");
        assert_eq!(
            message["attachments"][0]["tools"],
            json!([{ "type": "file_search" }])
        );
    }

    #[tokio::test]
    async fn test_polls_until_completed_then_reads_assistant_message() {
        let server = MockServer::start().await;
        mount_setup(&server).await;

        let run_path = "/threads/thread_1/runs/run_1";
        Mock::given(method("GET"))
            .and(path(run_path))
            .respond_with(ResponseTemplate::new(200).set_body_json(run("queued")))
            .up_to_n_times(1)
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(run_path))
            .respond_with(ResponseTemplate::new(200).set_body_json(run("in_progress")))
            .up_to_n_times(1)
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(run_path))
            .respond_with(ResponseTemplate::new(200).set_body_json(run("completed")))
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/threads/thread_1/messages"))
            .and(query_param("order", "desc"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [
                    { "role": "assistant", "content": [
                        { "type": "text", "text": { "value": " The answer. ", "annotations": [
                            { "type": "file_citation", "file_citation": { "file_id": "file-3" } }
                        ] } }
                    ] },
                    { "role": "user", "content": [{ "type": "text", "text": { "value": "q" } }] }
                ]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let backend = AssistantsBackend::new(&config(&server.uri(), None)).unwrap();
        let answer = backend
            .answer(&Question::parse("q").unwrap())
            .await
            .unwrap();

        assert_eq!(answer.text, "The answer.");
        assert_eq!(answer.sources, vec!["file-3".to_string()]);
    }

    #[tokio::test]
    async fn test_failed_run_surfaces_last_error() {
        let server = MockServer::start().await;
        mount_setup(&server).await;

        Mock::given(method("GET"))
            .and(path("/threads/thread_1/runs/run_1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "run_1",
                "thread_id": "thread_1",
                "status": "failed",
                "last_error": { "code": "server_error", "message": "boom" }
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/threads/thread_1/messages"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": [] })))
            .expect(0)
            .mount(&server)
            .await;

        let backend = AssistantsBackend::new(&config(&server.uri(), None)).unwrap();
        let err = backend
            .answer(&Question::parse("q").unwrap())
            .await
            .unwrap_err();

        assert!(matches!(err, RelayError::RunFailed { .. }));
        assert!(err.to_string().contains("boom"));
        assert_eq!(err.status_code(), 500);
    }

    #[tokio::test]
    async fn test_expired_run_without_detail_uses_status() {
        let server = MockServer::start().await;
        mount_setup(&server).await;

        Mock::given(method("GET"))
            .and(path("/threads/thread_1/runs/run_1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(run("expired")))
            .mount(&server)
            .await;

        let backend = AssistantsBackend::new(&config(&server.uri(), None)).unwrap();
        let err = backend
            .answer(&Question::parse("q").unwrap())
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "Run expired: expired");
    }

    #[tokio::test]
    async fn test_incomplete_run_fails_fast_with_reason() {
        let server = MockServer::start().await;
        mount_setup(&server).await;

        Mock::given(method("GET"))
            .and(path("/threads/thread_1/runs/run_1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "run_1",
                "thread_id": "thread_1",
                "status": "incomplete",
                "incomplete_details": { "reason": "max_prompt_tokens" }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let backend = AssistantsBackend::new(&config(&server.uri(), None)).unwrap();
        let err = backend
            .answer(&Question::parse("q").unwrap())
            .await
            .unwrap_err();

        assert!(matches!(err, RelayError::RunFailed { .. }));
        assert_eq!(err.to_string(), "Run incomplete: max_prompt_tokens");
    }

    #[tokio::test]
    async fn test_run_that_never_finishes_times_out() {
        let server = MockServer::start().await;
        mount_setup(&server).await;

        Mock::given(method("GET"))
            .and(path("/threads/thread_1/runs/run_1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(run("in_progress")))
            .mount(&server)
            .await;

        let backend = AssistantsBackend::new(&config(&server.uri(), None)).unwrap();
        let err = backend
            .answer(&Question::parse("q").unwrap())
            .await
            .unwrap_err();

        assert!(matches!(err, RelayError::Timeout(_)));
        assert!(err.to_string().contains("Timed out"));
    }

    #[tokio::test]
    async fn test_upstream_error_stops_workflow() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/assistants"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "asst_1" })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/threads"))
            .respond_with(
                ResponseTemplate::new(429).set_body_string("Rate limit reached for requests"),
            )
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/threads/thread_1/runs"))
            .respond_with(ResponseTemplate::new(200).set_body_json(run("queued")))
            .expect(0)
            .mount(&server)
            .await;

        let backend = AssistantsBackend::new(&config(&server.uri(), None)).unwrap();
        let err = backend
            .answer(&Question::parse("q").unwrap())
            .await
            .unwrap_err();

        assert_eq!(err.status_code(), 429);
        assert_eq!(
            err.to_body()["detail"],
            json!("Rate limit reached for requests")
        );
    }
}
