//! Chat route handlers.
//!
//! The portal does not run the interview itself; it relays each turn to the
//! workflow engine and hands the normalized reply back to the browser.

use axum::{
    Json,
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use serde_json::{Map, Value, json};

use submissions_hub_core::{ChatAction, ConversationId, HistoryEntry};

use super::{lenient_object, string_field};
use crate::middleware::RequireUser;
use crate::services::{ChatTurn, Envelope, RequestContext, StopRequest};
use crate::state::AppState;

const MISSING_FIELDS: &str = "Missing required fields: message, conversationId";

/// Reply to one chat turn.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatResponse {
    pub message: String,
    pub actions: Vec<ChatAction>,
    pub conversation_id: ConversationId,
    pub metadata: Map<String, Value>,
}

fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Status ping for `GET /api/n8n/chat`.
pub async fn status() -> Json<Value> {
    Json(json!({
        "message": "n8n Chat API is running",
        "methods": ["POST"],
        "timestamp": now_rfc3339(),
    }))
}

/// Decode a chat turn from a leniently parsed body.
///
/// Returns `None` when `message` or `conversationId` is missing or empty.
/// History is forwarded as sent; entries without the usual shape are only
/// counted in the debug log.
fn parse_turn(body: &Map<String, Value>) -> Option<ChatTurn> {
    let message = string_field(body, "message").filter(|m| !m.is_empty())?;
    let conversation_id = string_field(body, "conversationId")
        .filter(|c| !c.is_empty())
        .map(ConversationId::from_client)?;

    let history = body
        .get("messageHistory")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();

    let irregular = history
        .iter()
        .filter(|entry| !HistoryEntry::is_wellformed(entry))
        .count();
    if irregular > 0 {
        tracing::debug!(
            irregular,
            total = history.len(),
            "Forwarding history entries with an unexpected shape"
        );
    }

    let session_data = body
        .get("sessionData")
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default();

    Some(ChatTurn {
        message,
        conversation_id,
        user_id: string_field(body, "userId"),
        client_id: string_field(body, "clientId"),
        history,
        session_data,
    })
}

/// Relay one chat turn to the workflow engine.
pub async fn chat(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let Some(turn) = parse_turn(&lenient_object(&body)) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": MISSING_FIELDS })),
        )
            .into_response();
    };

    let role = state.access().role_of(&user.email);
    let context = RequestContext::from_headers(&headers);
    let envelope = Envelope::new(&turn, &user, role, &context);

    let reply = state.relay().relay(&envelope).await;
    tracing::debug!(
        conversation_id = %turn.conversation_id,
        actions = ?reply.actions.iter().map(ChatAction::kind).collect::<Vec<_>>(),
        redirect = ?reply.actions.iter().find_map(ChatAction::url),
        "Chat turn relayed"
    );

    Json(ChatResponse {
        message: reply.text,
        actions: reply.actions,
        conversation_id: turn.conversation_id,
        metadata: reply.metadata,
    })
    .into_response()
}

/// Tell the workflow engine the user stopped the interview.
///
/// Missing identity fields are filled in from the signed-in user.
pub async fn stop(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    body: Bytes,
) -> Response {
    let failed = || {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "success": false, "error": "Failed to stop interview" })),
        )
            .into_response()
    };

    let Ok(Value::Object(body)) = serde_json::from_slice::<Value>(&body) else {
        tracing::warn!("Stop request with a non-object body");
        return failed();
    };

    let request = StopRequest {
        conversation_id: string_field(&body, "conversationId"),
        user_id: string_field(&body, "userId").or_else(|| Some(user.email.as_str().to_owned())),
        username: string_field(&body, "username").or_else(|| Some(user.username().to_owned())),
        client_id: string_field(&body, "clientId"),
        current_time: string_field(&body, "currentTime").or_else(|| Some(now_rfc3339())),
    };

    match state.relay().stop(&request).await {
        Ok(()) => {
            tracing::info!(conversation_id = ?request.conversation_id, "Interview stopped");
            Json(json!({ "success": true })).into_response()
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to notify stop webhook");
            failed()
        }
    }
}

/// Mint a fresh conversation id.
pub async fn new_conversation(RequireUser(_user): RequireUser) -> Json<Value> {
    Json(json!({ "conversationId": ConversationId::generate() }))
}
