//! API Lambda handler.
//!
//! This module handles:
//! - CORS preflight (`OPTIONS`), answered locally
//! - Method and body validation
//! - Configuration loading, once per invocation
//! - Relaying the question to `OpenAI` and shaping the answer

use std::any::Any;
use std::panic::AssertUnwindSafe;

use futures::FutureExt;
use lambda_runtime::{Error, LambdaEvent};
use serde_json::Value;
use tracing::{Instrument, error, info, info_span, warn};
use uuid::Uuid;

use super::{helpers, parsing};
use crate::core::config::AppConfig;
use crate::core::models::AnswerResult;
use crate::errors::RelayError;
use crate::relay::RequestRelay;

pub use self::function_handler as handler;

/// Lambda handler for the API entrypoint.
///
/// # Errors
///
/// Never fails at the Lambda level; every failure becomes an HTTP error
/// response.
pub async fn function_handler(event: LambdaEvent<Value>) -> Result<Value, Error> {
    Ok(handle_request(&event.payload, AppConfig::from_env).await)
}

/// Turns one proxy event into one proxy response. `load_config` is only
/// called for `POST` requests with a valid question.
pub async fn handle_request<F>(payload: &Value, load_config: F) -> Value
where
    F: FnOnce() -> Result<AppConfig, RelayError>,
{
    let correlation_id = Uuid::new_v4().to_string();
    let trace_id = payload
        .get("headers")
        .and_then(|h| parsing::get_header_value(h, "X-Amzn-Trace-Id"))
        .unwrap_or("")
        .to_string();
    let span = info_span!("request", correlation_id = %correlation_id, xray_trace_id = %trace_id);

    async move {
        let method = parsing::request_method(payload).unwrap_or_default();
        info!(method = %method, "API Lambda received request");

        if method == "OPTIONS" {
            return helpers::preflight();
        }

        let outcome = AssertUnwindSafe(answer_request(payload, &method, load_config))
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| Err(RelayError::Unexpected(panic_message(&*panic))));

        match outcome {
            Ok(result) => {
                info!(
                    answer_chars = result.answer.chars().count(),
                    sources = result.sources.len(),
                    "Question answered"
                );
                helpers::ok_answer(&result)
            }
            Err(e) => {
                let status = e.status_code();
                if status >= 500 {
                    error!(status, error = %e, "Request failed");
                } else {
                    warn!(status, error = %e, "Request rejected");
                }
                helpers::err_response(&e)
            }
        }
    }
    .instrument(span)
    .await
}

async fn answer_request<F>(
    payload: &Value,
    method: &str,
    load_config: F,
) -> Result<AnswerResult, RelayError>
where
    F: FnOnce() -> Result<AppConfig, RelayError>,
{
    if method != "POST" {
        let shown = if method.is_empty() { "UNKNOWN" } else { method };
        return Err(RelayError::MethodNotAllowed(shown.to_string()));
    }

    let body = parsing::request_body(payload)?;
    let question = parsing::parse_question(&body)?;

    #[cfg(feature = "debug-logs")]
    info!(question = %question.as_str(), "Question");

    #[cfg(not(feature = "debug-logs"))]
    info!(question_chars = question.as_str().chars().count(), "Question received");

    let config = load_config()?;
    info!(protocol = %config.protocol, model = %config.openai_model, "Configuration loaded");

    RequestRelay::from_config(&config)?.ask(&question).await
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    panic
        .downcast_ref::<&str>()
        .map(ToString::to_string)
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "Unexpected internal error".to_string())
}
