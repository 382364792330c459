//! Normalization of workflow webhook replies.
//!
//! The workflow engine answers in whatever shape its last node happened to
//! produce: a single object, an array of items, text under `response`, text
//! wrapped in `data`/`payload` (sometimes as a JSON *string*), and so on.
//! [`normalize_reply`] folds all of that into one [`NormalizedReply`] whose
//! text is never empty.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::chat::ChatAction;

/// Message the front-end sends to open a conversation.
pub const INIT_CONVERSATION: &str = "INIT_CONVERSATION";

/// Reply used on the first turn when the workflow engine is unavailable.
pub const FALLBACK_GREETING: &str =
    "Hi! I'm your AI assistant. How can I help you today? (Note: fallback mode)";

/// Reply used on later turns when the workflow engine is unavailable.
pub const FALLBACK_REPLY: &str =
    "I understand. Can you tell me more about that? (Note: n8n not available)";

/// Reply used when the workflow engine answered without any usable text.
pub const DEFAULT_REPLY: &str = "I received your message.";

/// Reply used when the workflow engine answered with something that is not JSON.
pub const INVALID_FORMAT_REPLY: &str = "Sorry, I encountered an invalid response format.";

/// The reply text, actions and metadata extracted from a webhook response.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NormalizedReply {
    pub text: String,
    pub actions: Vec<ChatAction>,
    pub metadata: Map<String, Value>,
}

impl NormalizedReply {
    /// Reply for an unavailable workflow engine: the greeting when the turn
    /// opens the conversation, the generic holding reply otherwise.
    #[must_use]
    pub fn fallback(message: &str, metadata: Map<String, Value>) -> Self {
        let text = if message == INIT_CONVERSATION {
            FALLBACK_GREETING
        } else {
            FALLBACK_REPLY
        };
        Self {
            text: text.to_owned(),
            actions: Vec::new(),
            metadata,
        }
    }

    /// Reply for a response body that could not be decoded. The raw body is
    /// preserved in the metadata.
    #[must_use]
    pub fn invalid_format(raw: &str) -> Self {
        let mut metadata = Map::new();
        metadata.insert("error".into(), Value::from("JSON parse error"));
        metadata.insert("rawResponse".into(), Value::from(raw));
        Self {
            text: INVALID_FORMAT_REPLY.to_owned(),
            actions: Vec::new(),
            metadata,
        }
    }
}

type TextExtractor = fn(&Map<String, Value>) -> Option<String>;

/// Text extractors in priority order. For each item the first extractor that
/// yields text wins; the first item that yields text wins overall.
const TEXT_EXTRACTORS: &[TextExtractor] = &[direct_response, wrapped_payload];

/// Normalize a raw webhook body.
///
/// Returns [`NormalizedReply::invalid_format`] when the body is not JSON.
#[must_use]
pub fn normalize_reply(raw: &str) -> NormalizedReply {
    serde_json::from_str::<Value>(raw).map_or_else(
        |_| NormalizedReply::invalid_format(raw),
        |value| normalize_value(&value),
    )
}

/// Normalize an already decoded webhook body.
#[must_use]
pub fn normalize_value(value: &Value) -> NormalizedReply {
    let items: Vec<&Map<String, Value>> = match value {
        Value::Array(items) => items.iter().filter_map(Value::as_object).collect(),
        other => other.as_object().into_iter().collect(),
    };

    let text = items
        .iter()
        .find_map(|item| TEXT_EXTRACTORS.iter().find_map(|extract| extract(item)))
        .unwrap_or_else(|| DEFAULT_REPLY.to_owned());

    let actions = items
        .iter()
        .map(|item| validated_actions(item))
        .find(|actions| !actions.is_empty())
        .unwrap_or_default();

    let metadata = items
        .iter()
        .filter_map(|item| item.get("metadata").and_then(Value::as_object))
        .find(|metadata| !metadata.is_empty())
        .cloned()
        .unwrap_or_default();

    NormalizedReply {
        text,
        actions,
        metadata,
    }
}

fn non_blank(value: &Value) -> Option<String> {
    let trimmed = value.as_str()?.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_owned())
}

fn direct_response(item: &Map<String, Value>) -> Option<String> {
    item.get("response").and_then(non_blank)
}

fn wrapped_payload(item: &Map<String, Value>) -> Option<String> {
    let wrapped = item
        .get("data")
        .filter(|v| !v.is_null())
        .or_else(|| item.get("payload"))?;

    match decode_embedded_json(wrapped) {
        Some(Value::Object(inner)) => nested_text(&inner),
        Some(_) => None,
        None => match wrapped {
            Value::Object(inner) => nested_text(inner),
            Value::String(_) => non_blank(wrapped),
            _ => None,
        },
    }
}

/// `response`, else `message`, of a wrapped object. Any non-empty string is
/// taken as is, surrounding whitespace included.
fn nested_text(inner: &Map<String, Value>) -> Option<String> {
    let non_empty = |key: &str| {
        inner
            .get(key)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(String::from)
    };
    non_empty("response").or_else(|| non_empty("message"))
}

/// Decode a string that looks like a JSON object or array. Returns `None`
/// for anything else, including strings that only look like JSON.
fn decode_embedded_json(value: &Value) -> Option<Value> {
    let trimmed = value.as_str()?.trim();
    let looks_like_json = (trimmed.starts_with('{') && trimmed.ends_with('}'))
        || (trimmed.starts_with('[') && trimmed.ends_with(']'));
    if !looks_like_json {
        return None;
    }
    serde_json::from_str(trimmed).ok()
}

fn validated_actions(item: &Map<String, Value>) -> Vec<ChatAction> {
    item.get("actions")
        .and_then(Value::as_array)
        .map(|actions| actions.iter().filter_map(ChatAction::from_value).collect())
        .unwrap_or_default()
}
