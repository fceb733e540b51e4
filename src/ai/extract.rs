//! Pulls answer text and cited file ids out of `OpenAI` response shapes.

use serde_json::Value;

use crate::core::models::Answer;

/// Answer from a `POST /responses` result.
///
/// Uses the top-level `output_text` when it is a non-empty string, otherwise
/// joins every `output_text` part of `output[].content[]` with newlines.
#[must_use]
pub fn response_answer(response: &Value) -> Answer {
    let parts = response_output_parts(response);

    let text = response
        .get("output_text")
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
        .map_or_else(
            || {
                parts
                    .iter()
                    .filter_map(|p| part_text(p))
                    .collect::<Vec<_>>()
                    .join("\n")
            },
            ToString::to_string,
        );

    let mut sources = Vec::new();
    for part in &parts {
        collect_citations(part.get("annotations"), &mut sources);
    }

    Answer {
        text: text.trim().to_string(),
        sources,
    }
}

fn response_output_parts(response: &Value) -> Vec<&Value> {
    response
        .get("output")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(|item| item.get("content").and_then(Value::as_array))
        .flatten()
        .filter(|p| p.get("type").and_then(Value::as_str) == Some("output_text"))
        .collect()
}

/// Answer from a `GET /threads/{id}/messages?order=desc` listing: the first
/// assistant message, with its `text` parts concatenated in order.
#[must_use]
pub fn assistant_answer(messages: &Value) -> Answer {
    let Some(message) = messages
        .get("data")
        .and_then(Value::as_array)
        .and_then(|data| {
            data.iter()
                .find(|m| m.get("role").and_then(Value::as_str) == Some("assistant"))
        })
    else {
        return Answer::default();
    };

    let mut text = String::new();
    let mut sources = Vec::new();
    for part in message
        .get("content")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter(|p| p.get("type").and_then(Value::as_str) == Some("text"))
    {
        if let Some(s) = part_text(part) {
            text.push_str(s);
        }
        collect_citations(
            part.get("text").and_then(|t| t.get("annotations")),
            &mut sources,
        );
    }

    Answer {
        text: text.trim().to_string(),
        sources,
    }
}

// Text may be a plain string or `{ "value": ... }` depending on the API.
fn part_text(part: &Value) -> Option<&str> {
    let text = part.get("text")?;
    text.as_str()
        .or_else(|| text.get("value").and_then(Value::as_str))
}

fn collect_citations(annotations: Option<&Value>, sources: &mut Vec<String>) {
    let Some(annotations) = annotations.and_then(Value::as_array) else {
        return;
    };
    for annotation in annotations {
        if annotation.get("type").and_then(Value::as_str) != Some("file_citation") {
            continue;
        }
        let file_id = annotation
            .get("file_id")
            .or_else(|| annotation.get("file_citation").and_then(|c| c.get("file_id")))
            .and_then(Value::as_str);
        if let Some(id) = file_id {
            if !sources.iter().any(|s| s == id) {
                sources.push(id.to_string());
            }
        }
    }
}
