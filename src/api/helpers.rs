//! Response builders for the Lambda proxy integration.
//!
//! Every response carries the same CORS headers so browsers can call the
//! endpoint directly.

use serde_json::{Map, Value, json};

use crate::core::models::AnswerResult;
use crate::errors::RelayError;

pub const ALLOWED_METHODS: &str = "POST, OPTIONS";
pub const ALLOWED_HEADERS: &str = "Content-Type, Authorization";

#[must_use]
pub fn cors_headers() -> Map<String, Value> {
    let mut headers = Map::new();
    headers.insert("Access-Control-Allow-Origin".to_string(), json!("*"));
    headers.insert(
        "Access-Control-Allow-Methods".to_string(),
        json!(ALLOWED_METHODS),
    );
    headers.insert(
        "Access-Control-Allow-Headers".to_string(),
        json!(ALLOWED_HEADERS),
    );
    headers
}

/// Returns a response with `body` serialized as JSON.
#[must_use]
pub fn json_response(status_code: u16, body: &Value) -> Value {
    let mut headers = cors_headers();
    headers.insert("Content-Type".to_string(), json!("application/json"));
    json!({
        "statusCode": status_code,
        "headers": headers,
        "body": body.to_string()
    })
}

/// Returns a 200 OK response carrying the answer.
#[must_use]
pub fn ok_answer(result: &AnswerResult) -> Value {
    let mut body = json!({ "answer": result.answer, "sources": result.sources });
    if let Some(hint) = &result.hint {
        body["hint"] = json!(hint);
    }
    json_response(200, &body)
}

/// Returns the error response for `error`.
#[must_use]
pub fn err_response(error: &RelayError) -> Value {
    let mut response = json_response(error.status_code(), &error.to_body());
    if matches!(error, RelayError::MethodNotAllowed(_)) {
        response["headers"]["Allow"] = json!(ALLOWED_METHODS);
    }
    response
}

/// Returns the 200 response to a CORS preflight request.
#[must_use]
pub fn preflight() -> Value {
    json!({
        "statusCode": 200,
        "headers": cors_headers(),
        "body": ""
    })
}
