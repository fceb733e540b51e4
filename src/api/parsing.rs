use base64::{Engine as _, engine::general_purpose};
use serde_json::Value;

use crate::core::models::{AskRequest, Question};
use crate::errors::RelayError;

pub fn v_path<'a>(root: &'a Value, path: &[&str]) -> Option<&'a Value> {
    let mut cur = root;
    for key in path {
        cur = cur.get(*key)?;
    }
    Some(cur)
}

pub fn v_str<'a>(root: &'a Value, path: &[&str]) -> Option<&'a str> {
    v_path(root, path).and_then(|v| v.as_str())
}

/// HTTP method of an API Gateway / function URL event, upper-cased.
/// Payload format 2.0 keeps it under `requestContext.http.method`, 1.0
/// under `httpMethod`.
pub fn request_method(payload: &Value) -> Option<String> {
    v_str(payload, &["requestContext", "http", "method"])
        .or_else(|| v_str(payload, &["httpMethod"]))
        .map(|m| m.trim().to_ascii_uppercase())
        .filter(|m| !m.is_empty())
}

pub fn get_header_value<'a>(headers: &'a Value, name: &str) -> Option<&'a str> {
    if let Some(v) = headers.get(name).and_then(|s| s.as_str()) {
        return Some(v);
    }
    headers.as_object().and_then(|map| {
        map.iter().find_map(|(k, v)| {
            if k.eq_ignore_ascii_case(name) {
                v.as_str()
            } else {
                None
            }
        })
    })
}

/// Raw request body, base64-decoded when the event says so. A missing body
/// is an empty string.
pub fn request_body(payload: &Value) -> Result<String, RelayError> {
    let body = match payload.get("body") {
        None | Some(Value::Null) => return Ok(String::new()),
        Some(Value::String(s)) => s.as_str(),
        Some(_) => {
            return Err(RelayError::InvalidRequest(
                "Invalid body format".to_string(),
            ));
        }
    };

    let is_base64 = payload
        .get("isBase64Encoded")
        .and_then(Value::as_bool)
        .unwrap_or(false);
    if !is_base64 {
        return Ok(body.to_string());
    }

    let bytes = general_purpose::STANDARD
        .decode(body)
        .map_err(|e| RelayError::InvalidRequest(format!("Failed to decode body: {e}")))?;
    String::from_utf8(bytes)
        .map_err(|e| RelayError::InvalidRequest(format!("Body is not valid UTF-8: {e}")))
}

/// Parses `{ "question": "..." }` into a validated [`Question`].
pub fn parse_question(body: &str) -> Result<Question, RelayError> {
    if body.trim().is_empty() {
        return Question::parse("");
    }
    let request: AskRequest = serde_json::from_str(body).map_err(|e| {
        RelayError::InvalidRequest(format!("Body must be JSON like {{\"question\": \"...\"}}: {e}"))
    })?;
    Question::parse(request.question.as_deref().unwrap_or_default())
}
