//! Conversation history and workflow actions.

use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};

/// Who authored a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sender {
    User,
    Assistant,
}

/// Expected shape of one entry of the conversation history the browser sends
/// with each chat turn.
///
/// The portal forwards history unchanged; this type only describes what a
/// well-formed entry looks like. The timestamp is kept as the client sent it
/// (normally ISO 8601).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub text: String,
    pub sender: Sender,
    pub timestamp: String,
}

impl HistoryEntry {
    /// Whether `value` has the shape of a history entry.
    #[must_use]
    pub fn is_wellformed(value: &Value) -> bool {
        Self::deserialize(value).is_ok()
    }
}

/// The `type` tag of a [`ChatAction`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    /// Navigate the browser, normally to the action's `url`.
    Redirect,
    /// Opaque payload the front-end stores for the conversation.
    SaveData,
    /// Close the conversation, optionally showing a final `message`.
    EndConversation,
}

impl ActionKind {
    /// Returns the wire name of the tag.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Redirect => "redirect",
            Self::SaveData => "save_data",
            Self::EndConversation => "end_conversation",
        }
    }

    /// Match an exact wire name. Tags are case-sensitive.
    #[must_use]
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "redirect" => Some(Self::Redirect),
            "save_data" => Some(Self::SaveData),
            "end_conversation" => Some(Self::EndConversation),
            _ => None,
        }
    }
}

impl std::fmt::Display for ActionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a value is not an action object with a known `type`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("not an action object with a known type")]
pub struct InvalidAction;

/// Instruction the workflow engine may attach to a reply.
///
/// Only the `type` tag is checked. The object is kept exactly as the workflow
/// engine sent it, so fields the portal does not know about still reach the
/// browser.
///
/// ```
/// use submissions_hub_core::chat::{ActionKind, ChatAction};
///
/// let action: ChatAction =
///     serde_json::from_str(r#"{"type":"redirect","url":"/forms/report-upload"}"#).unwrap();
/// assert_eq!(action.kind(), ActionKind::Redirect);
/// assert_eq!(action.url(), Some("/forms/report-upload"));
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "Value")]
pub struct ChatAction {
    kind: ActionKind,
    fields: Map<String, Value>,
}

impl ChatAction {
    /// Validate one untyped action element.
    ///
    /// Returns `None` unless `value` is an object whose `type` is a known tag.
    #[must_use]
    pub fn from_value(value: &Value) -> Option<Self> {
        Self::try_from(value.clone()).ok()
    }

    /// The `type` tag of this action.
    #[must_use]
    pub const fn kind(&self) -> ActionKind {
        self.kind
    }

    /// The `url` field, when it is a string.
    #[must_use]
    pub fn url(&self) -> Option<&str> {
        self.fields.get("url").and_then(Value::as_str)
    }
}

impl TryFrom<Value> for ChatAction {
    type Error = InvalidAction;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        let Value::Object(fields) = value else {
            return Err(InvalidAction);
        };
        let kind = fields
            .get("type")
            .and_then(Value::as_str)
            .and_then(ActionKind::from_tag)
            .ok_or(InvalidAction)?;
        Ok(Self { kind, fields })
    }
}

impl Serialize for ChatAction {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.fields.serialize(serializer)
    }
}
