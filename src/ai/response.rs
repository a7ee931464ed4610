//! Provider response parsing.
//!
//! Responses are inspected as untyped JSON: the proxy returns either key
//! convention for the same logical field, so each field is looked up through
//! an ordered list of accepted keys.

use crate::error::truncate_detail;
use crate::models::{OperationKind, OperationResult};
use crate::{Error, Result};
use serde_json::Value;

const INLINE_DATA_KEYS: [&str; 2] = ["inlineData", "inline_data"];
const THOUGHT_SIGNATURE_KEYS: [&str; 2] = ["thoughtSignature", "thought_signature"];
const FINISH_REASON_KEYS: [&str; 2] = ["finishReason", "finish_reason"];

// Deep enough to show the fields inside `candidates[].content.parts[].inlineData`.
const MAX_SHAPE_DEPTH: usize = 8;
const MAX_SHAPE_ITEMS: usize = 3;

pub fn parse(response: &Value, kind: OperationKind) -> Result<OperationResult> {
    match kind {
        OperationKind::Analyze | OperationKind::Recognize | OperationKind::Fuse => {
            parse_chat_text(response).map(OperationResult::Text)
        }
        OperationKind::Generate => parse_generated_image(response).map(OperationResult::Image),
    }
}

/// Text of `choices[0].message.content`, verbatim.
pub fn parse_chat_text(response: &Value) -> Result<String> {
    response
        .get("choices")
        .and_then(Value::as_array)
        .and_then(|choices| choices.first())
        .and_then(|choice| choice.get("message"))
        .and_then(|message| message.get("content"))
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| malformed("expected text at choices[0].message.content", response))
}

/// Base64 image data from the first candidate.
///
/// Thought-signature parts are skipped. A candidate made only of thought
/// signatures is reported as [`Error::IncompleteGeneration`].
pub fn parse_generated_image(response: &Value) -> Result<String> {
    let candidate = response
        .get("candidates")
        .and_then(Value::as_array)
        .and_then(|candidates| candidates.first())
        .ok_or_else(|| malformed("no candidates in response", response))?;

    let parts = candidate
        .get("content")
        .and_then(|content| content.get("parts"))
        .and_then(Value::as_array);

    let Some(parts) = parts else {
        let reason = match first_key(candidate, &FINISH_REASON_KEYS).and_then(Value::as_str) {
            Some(finish) => format!("first candidate has no content parts (finish reason {})", finish),
            None => "first candidate has no content parts".to_string(),
        };
        return Err(malformed(&reason, response));
    };

    if let Some(data) = parts.iter().find_map(inline_image_data) {
        return Ok(data.to_string());
    }

    if !parts.is_empty() && parts.iter().all(is_thought_signature) {
        tracing::warn!(
            "Model returned {} thought signature part(s) and no image",
            parts.len()
        );
        return Err(Error::IncompleteGeneration);
    }

    let model_text: Vec<&str> = parts
        .iter()
        .filter(|part| !is_thought_text(part))
        .filter_map(|part| part.get("text").and_then(Value::as_str))
        .filter(|text| !text.trim().is_empty())
        .collect();

    if model_text.is_empty() {
        Err(malformed("no image data in first candidate", response))
    } else {
        let reason = format!(
            "model replied with text instead of an image: {}",
            truncate_detail(&model_text.join(" "))
        );
        Err(malformed(&reason, response))
    }
}

fn first_key<'a>(value: &'a Value, keys: &[&str]) -> Option<&'a Value> {
    keys.iter().find_map(|key| value.get(*key))
}

/// Non-empty `data` under either inline-data key, in convention order.
fn inline_image_data(part: &Value) -> Option<&str> {
    INLINE_DATA_KEYS.iter().find_map(|key| {
        part.get(*key)
            .and_then(|inline| inline.get("data"))
            .and_then(Value::as_str)
            .filter(|data| !data.is_empty())
    })
}

fn is_thought_signature(part: &Value) -> bool {
    first_key(part, &THOUGHT_SIGNATURE_KEYS).is_some()
}

fn is_thought_text(part: &Value) -> bool {
    part.get("thought").and_then(Value::as_bool).unwrap_or(false)
}

fn malformed(reason: &str, response: &Value) -> Error {
    let shape = describe_shape(response);
    tracing::error!("Malformed provider response: {}; shape: {}", reason, shape);
    Error::MalformedResponse(format!("{}; received {}", reason, shape))
}

/// Structural summary of a JSON value: keys and types, string lengths only.
///
/// Never echoes string contents, which may be multi-megabyte image payloads.
pub fn describe_shape(value: &Value) -> String {
    shape_at(value, 0)
}

fn shape_at(value: &Value, depth: usize) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(_) => "bool".to_string(),
        Value::Number(_) => "number".to_string(),
        Value::String(s) => format!("string({})", s.len()),
        Value::Array(_) | Value::Object(_) if depth >= MAX_SHAPE_DEPTH => "...".to_string(),
        Value::Array(items) => {
            let mut shown: Vec<String> = items
                .iter()
                .take(MAX_SHAPE_ITEMS)
                .map(|item| shape_at(item, depth + 1))
                .collect();
            if items.len() > MAX_SHAPE_ITEMS {
                shown.push(format!("+{} more", items.len() - MAX_SHAPE_ITEMS));
            }
            format!("[{}]", shown.join(", "))
        }
        Value::Object(map) => {
            let fields: Vec<String> = map
                .iter()
                .map(|(key, value)| format!("{}: {}", key, shape_at(value, depth + 1)))
                .collect();
            format!("{{{}}}", fields.join(", "))
        }
    }
}
