//! HTTP route handlers for the portal.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                    - Liveness check
//! GET  /health/ready              - Readiness (identity provider reachable)
//!
//! # Auth
//! GET  /auth/confirm              - Verify an emailed token_hash, start session
//! GET  /auth/callback             - Exchange a PKCE code, start session
//! POST /auth/signout              - End session, redirect to /login
//! POST /api/auth/signout          - Same, for fetch() callers
//! GET  /api/auth/send-magic-link  - Route ping
//! POST /api/auth/send-magic-link  - Email a sign-in link (rate limited)
//! GET  /api/auth/check-domain     - Gate decision for the signed-in user
//!
//! # Portal API
//! GET  /api/me                    - Signed-in email and role
//! POST /api/role                  - Role lookup for an email (rate limited)
//! GET  /api/config                - Front-end destinations and feature flags (auth)
//! GET  /api/forms/{slug}          - Form embed descriptor
//!
//! # Chat (auth)
//! GET  /api/n8n/chat              - Status ping (public)
//! POST /api/n8n/chat              - Relay one chat turn to the workflow engine
//! POST /api/n8n/stop              - Notify the workflow engine an interview stopped
//! POST /api/conversations         - Mint a conversation id
//! ```

pub mod api;
pub mod auth;
pub mod chat;

use axum::{
    Router,
    extract::State,
    http::StatusCode,
    middleware::from_fn,
    routing::{get, post},
};
use serde_json::{Map, Value};
use tower_http::trace::{DefaultOnResponse, OnResponse, TraceLayer};
use tower_sessions::MemoryStore;
use tracing::Span;

use crate::middleware::{
    auth_rate_limiter, create_session_layer, request_id_middleware, security_headers_middleware,
};
use crate::state::AppState;

/// Create the auth routes router (mounted at `/auth`).
pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/confirm", get(auth::confirm))
        .route("/callback", get(auth::callback))
        .route("/signout", post(auth::sign_out))
}

/// Create the rate-limited API routes.
///
/// These are reachable without a session, so each client IP is throttled.
pub fn limited_api_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/send-magic-link", post(auth::send_magic_link))
        .route("/role", post(api::role))
        .layer(auth_rate_limiter())
}

/// Create the API routes router (mounted at `/api`).
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/send-magic-link", get(auth::send_magic_link_status))
        .route("/auth/signout", post(auth::sign_out))
        .route("/auth/check-domain", get(api::check_domain))
        .route("/me", get(api::me))
        .route("/config", get(api::config))
        .route("/forms/{slug}", get(api::form))
        .route("/n8n/chat", get(chat::status).post(chat::chat))
        .route("/n8n/stop", post(chat::stop))
        .route("/conversations", post(chat::new_conversation))
        .merge(limited_api_routes())
}

/// Create all routes for the portal.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/health/ready", get(readiness))
        .nest("/auth", auth_routes())
        .nest("/api", api_routes())
}

/// Build the complete application: routes, sessions, and the middleware stack.
pub fn app(state: AppState) -> Router {
    let session_layer = create_session_layer(MemoryStore::default(), state.config());

    routes()
        .layer(session_layer)
        .layer(from_fn(security_headers_middleware))
        .layer(from_fn(request_id_middleware))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &axum::http::Request<_>| {
                    tracing::info_span!(
                        "http_request",
                        method = %request.method(),
                        uri = %request.uri(),
                        request_id = tracing::field::Empty,
                        status = tracing::field::Empty,
                        latency_ms = tracing::field::Empty,
                    )
                })
                .on_response(
                    |response: &axum::http::Response<_>,
                     latency: std::time::Duration,
                     span: &Span| {
                        span.record("status", response.status().as_u16());
                        span.record(
                            "latency_ms",
                            u64::try_from(latency.as_millis()).unwrap_or(u64::MAX),
                        );
                        DefaultOnResponse::default().on_response(response, latency, span);
                    },
                ),
        )
        .with_state(state)
        // Sentry layers (outermost for full request coverage)
        .layer(sentry_tower::NewSentryLayer::new_from_top())
        .layer(sentry_tower::SentryHttpLayer::new().enable_transaction())
}

/// Liveness health check endpoint.
///
/// Returns "ok" if the server is running. Does not check dependencies.
async fn health() -> &'static str {
    "ok"
}

/// Readiness health check endpoint.
///
/// Returns 503 Service Unavailable if the identity provider is not reachable.
async fn readiness(State(state): State<AppState>) -> StatusCode {
    match state.identity().health().await {
        Ok(()) => StatusCode::OK,
        Err(e) => {
            tracing::warn!(error = %e, "Identity provider not ready");
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}

/// Decode a request body as a JSON object, treating anything else as empty.
///
/// Browser callers send hand-built JSON; a malformed body must produce the
/// route's own validation answer, not a framework rejection.
pub(crate) fn lenient_object(body: &[u8]) -> Map<String, Value> {
    match serde_json::from_slice::<Value>(body) {
        Ok(Value::Object(map)) => map,
        _ => Map::new(),
    }
}

/// Read a string field from a leniently decoded body.
pub(crate) fn string_field(body: &Map<String, Value>, key: &str) -> Option<String> {
    body.get(key).and_then(Value::as_str).map(String::from)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::net::SocketAddr;

    use axum::body::Body;
    use axum::extract::connect_info::MockConnectInfo;
    use axum::http::{Request, header};
    use serde_json::json;
    use tower::ServiceExt;

    use super::*;
    use crate::config::PortalConfig;

    fn test_app() -> Router {
        let config = PortalConfig::from_lookup(|key| {
            match key {
                "SUPABASE_URL" => Some("http://127.0.0.1:9"),
                "SUPABASE_ANON_KEY" => Some("anon-test-key"),
                "N8N_WEBHOOK_URL" => Some("http://127.0.0.1:9/webhook/chat"),
                _ => None,
            }
            .map(String::from)
        })
        .unwrap();
        app(AppState::new(config).unwrap())
    }

    #[tokio::test]
    async fn test_health_has_security_headers() {
        let response = test_app()
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["x-frame-options"], "DENY");
        assert!(response.headers().contains_key("x-request-id"));
    }

    #[tokio::test]
    async fn test_request_id_is_echoed() {
        let response = test_app()
            .oneshot(
                Request::get("/health")
                    .header("x-request-id", "req-42")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.headers()["x-request-id"], "req-42");
    }

    #[tokio::test]
    async fn test_protected_api_route_answers_401() {
        let response = test_app()
            .oneshot(Request::get("/api/config").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "application/json"
        );
    }

    #[tokio::test]
    async fn test_role_lookup_without_proxy_headers() {
        let app = test_app().layer(MockConnectInfo(SocketAddr::from(([127, 0, 0, 1], 40_000))));
        let response = app
            .oneshot(
                Request::post("/api/role")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(r#"{"email":"jane@example.com"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(value, json!({"ok": true, "role": "contributor"}));
    }

    #[tokio::test]
    async fn test_unknown_route_is_404() {
        let response = test_app()
            .oneshot(Request::get("/nope").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_lenient_object() {
        assert_eq!(lenient_object(b"not json"), Map::new());
        assert_eq!(lenient_object(b"[1,2]"), Map::new());
        assert_eq!(lenient_object(b""), Map::new());

        let body = lenient_object(br#"{"email":"a@b.co","n":1}"#);
        assert_eq!(string_field(&body, "email").as_deref(), Some("a@b.co"));
        assert_eq!(string_field(&body, "n"), None);
        assert_eq!(body.get("n"), Some(&json!(1)));
    }
}
