//! Workflow webhook relay.
//!
//! Each chat turn is one POST to the workflow engine's webhook. The reply is
//! folded into a [`NormalizedReply`] by the core normalizer; anything that
//! goes wrong upstream (non-2xx, timeout, refused connection, garbage body)
//! becomes a fallback reply instead of an error, so the chat never breaks.

use std::sync::Arc;

use chrono::{SecondsFormat, Utc};
use reqwest::header::{HeaderMap, HeaderValue};
use secrecy::ExposeSecret;
use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::instrument;
use url::Url;

use submissions_hub_core::relay::normalize_reply;
use submissions_hub_core::{ConversationId, NormalizedReply, Role};

use crate::config::RelayConfig;
use crate::models::CurrentUser;

/// Username reported when neither a display name nor an email local part exists.
pub const UNKNOWN_USER: &str = "Unknown User";

/// Errors that can occur when calling the workflow webhooks.
#[derive(Debug, Error)]
pub enum RelayError {
    /// HTTP request failed (connect, timeout, body read).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Webhook answered with a non-success status.
    #[error("Webhook returned status {0}")]
    Status(u16),

    /// The webhook is not configured.
    #[error("Webhook not configured: {0}")]
    NotConfigured(&'static str),

    /// Client construction failed.
    #[error("Invalid relay configuration: {0}")]
    Config(String),
}

/// One chat turn as received from the browser.
///
/// `history` is the client's `messageHistory` array, forwarded element by
/// element without reshaping.
#[derive(Debug, Clone)]
pub struct ChatTurn {
    pub message: String,
    pub conversation_id: ConversationId,
    pub user_id: Option<String>,
    pub client_id: Option<String>,
    pub history: Vec<Value>,
    pub session_data: Map<String, Value>,
}

/// Request details forwarded to the workflow engine.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    pub user_agent: Option<String>,
    pub ip: Option<String>,
}

impl RequestContext {
    /// Extract the user agent and client IP from request headers.
    ///
    /// The IP is the first `x-forwarded-for` entry, else `x-real-ip`.
    #[must_use]
    pub fn from_headers(headers: &axum::http::HeaderMap) -> Self {
        let header = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .filter(|v| !v.is_empty())
        };

        let ip = header("x-forwarded-for")
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .or_else(|| header("x-real-ip"))
            .map(String::from);

        Self {
            user_agent: header("user-agent").map(String::from),
            ip,
        }
    }
}

/// Outbound webhook payload.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope<'a> {
    message: &'a str,
    conversation_id: &'a str,
    user_id: &'a str,
    username: &'a str,
    client_id: Option<&'a str>,
    message_history: &'a [Value],
    session_data: Map<String, Value>,
    metadata: EnvelopeMetadata<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct EnvelopeMetadata<'a> {
    source: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    user_agent: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    ip: Option<&'a str>,
}

impl<'a> Envelope<'a> {
    /// Build the payload for one turn.
    ///
    /// Server-derived session keys overwrite any client-supplied ones.
    #[must_use]
    pub fn new(
        turn: &'a ChatTurn,
        user: &'a CurrentUser,
        role: Role,
        context: &'a RequestContext,
    ) -> Self {
        let username = Some(user.username())
            .filter(|name| !name.is_empty())
            .unwrap_or(UNKNOWN_USER);

        let mut session_data = turn.session_data.clone();
        session_data.insert(
            "serverTimestamp".into(),
            Value::from(Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)),
        );
        session_data.insert("userEmail".into(), Value::from(user.email.as_str()));
        session_data.insert("userRole".into(), Value::from(role.as_str()));
        session_data.insert("username".into(), Value::from(username));

        Self {
            message: &turn.message,
            conversation_id: turn.conversation_id.as_str(),
            user_id: turn
                .user_id
                .as_deref()
                .filter(|id| !id.is_empty())
                .unwrap_or_else(|| user.email.as_str()),
            username,
            client_id: turn.client_id.as_deref(),
            message_history: &turn.history,
            session_data,
            metadata: EnvelopeMetadata {
                source: "chat_interface",
                user_agent: context.user_agent.as_deref(),
                ip: context.ip.as_deref(),
            },
        }
    }
}

/// Payload for the stop webhook.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StopRequest {
    pub conversation_id: Option<String>,
    pub user_id: Option<String>,
    pub username: Option<String>,
    pub client_id: Option<String>,
    pub current_time: Option<String>,
}

/// Workflow webhook client.
#[derive(Clone)]
pub struct RelayClient {
    inner: Arc<RelayClientInner>,
}

struct RelayClientInner {
    client: reqwest::Client,
    webhook_url: Url,
    stop_webhook_url: Option<Url>,
}

impl RelayClient {
    /// Create a new relay client.
    ///
    /// # Errors
    ///
    /// Returns error if the token is not a valid header value or the HTTP
    /// client fails to build.
    pub fn new(config: &RelayConfig) -> Result<Self, RelayError> {
        let mut headers = HeaderMap::new();
        if let Some(token) = &config.webhook_token {
            let mut value = HeaderValue::from_str(&format!("Bearer {}", token.expose_secret()))
                .map_err(|e| RelayError::Config(format!("Invalid webhook token format: {e}")))?;
            value.set_sensitive(true);
            headers.insert(reqwest::header::AUTHORIZATION, value);
        }

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(config.timeout)
            .build()?;

        Ok(Self {
            inner: Arc::new(RelayClientInner {
                client,
                webhook_url: config.webhook_url.clone(),
                stop_webhook_url: config.stop_webhook_url.clone(),
            }),
        })
    }

    /// Relay one chat turn and normalize the reply.
    ///
    /// Never fails: upstream problems yield a fallback reply.
    #[instrument(skip_all, fields(conversation_id = %envelope.conversation_id))]
    pub async fn relay(&self, envelope: &Envelope<'_>) -> NormalizedReply {
        match self.post_chat(envelope).await {
            Ok(body) => normalize_reply(&body),
            Err(RelayError::Status(status)) => {
                tracing::warn!(status = status, "Workflow webhook returned an error status");
                let mut metadata = Map::new();
                metadata.insert("fallbackMode".into(), Value::Bool(true));
                metadata.insert("n8nStatus".into(), Value::from(status));
                NormalizedReply::fallback(envelope.message, metadata)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Workflow webhook unavailable");
                let mut metadata = Map::new();
                metadata.insert("fallbackMode".into(), Value::Bool(true));
                metadata.insert("error".into(), Value::from("upstream unavailable"));
                NormalizedReply::fallback(envelope.message, metadata)
            }
        }
    }

    async fn post_chat(&self, envelope: &Envelope<'_>) -> Result<String, RelayError> {
        let response = self
            .inner
            .client
            .post(self.inner.webhook_url.clone())
            .json(envelope)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(RelayError::Status(status.as_u16()));
        }

        let body = response.text().await?;
        tracing::debug!(bytes = body.len(), "Workflow webhook replied");
        Ok(body)
    }

    /// Notify the stop webhook that an interview was ended by the user.
    ///
    /// # Errors
    ///
    /// Returns an error if no stop webhook is configured, the request fails,
    /// or the webhook answers with a non-success status.
    #[instrument(skip_all, fields(conversation_id = ?request.conversation_id))]
    pub async fn stop(&self, request: &StopRequest) -> Result<(), RelayError> {
        let url = self
            .inner
            .stop_webhook_url
            .clone()
            .ok_or(RelayError::NotConfigured("N8N_STOP_WEBHOOK_URL"))?;

        let response = self.inner.client.post(url).json(request).send().await?;

        let status = response.status();
        if !status.is_success() {
            tracing::error!(status = status.as_u16(), "Stop webhook returned an error status");
            return Err(RelayError::Status(status.as_u16()));
        }

        Ok(())
    }
}
