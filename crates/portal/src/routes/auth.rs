//! Sign-in route handlers.
//!
//! Sign-in is passwordless: the browser posts an email to
//! `/api/auth/send-magic-link`, the identity provider emails a one-time link,
//! and the link lands on `/auth/confirm` (token hash) or `/auth/callback`
//! (PKCE code). Both landings run the access gate again before a portal
//! session is created, so a denied address never gets a session even if the
//! provider issued it a token.

use axum::{
    Json,
    body::Bytes,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use serde_json::json;
use tower_sessions::Session;

use submissions_hub_core::Email;

use super::{lenient_object, string_field};
use crate::error::{AppError, clear_sentry_user, set_sentry_user};
use crate::middleware::{OptionalUser, clear_current_user, set_current_user};
use crate::models::{CurrentUser, session_keys};
use crate::services::{AuthSession, OtpType, PkceVerifier};
use crate::state::AppState;

/// Where a successful sign-in lands when no usable `next` is given.
const DEFAULT_LANDING: &str = "/";

// =============================================================================
// Query Types
// =============================================================================

/// Query parameters of the `/auth/confirm` email link.
#[derive(Debug, Deserialize)]
pub struct ConfirmQuery {
    pub token_hash: Option<String>,
    #[serde(rename = "type")]
    pub otp_type: Option<String>,
    pub next: Option<String>,
}

/// Query parameters of the `/auth/callback` PKCE landing.
#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    pub code: Option<String>,
}

// =============================================================================
// Magic Link
// =============================================================================

/// Answer for `/api/auth/send-magic-link`.
fn link_response(status: StatusCode, reason: &str) -> Response {
    (status, Json(json!({ "ok": false, "reason": reason }))).into_response()
}

/// Email a sign-in link.
///
/// The gate runs before the provider is called, so addresses outside the
/// allowlists never receive a link.
pub async fn send_magic_link(
    State(state): State<AppState>,
    session: Session,
    body: Bytes,
) -> Result<Response, AppError> {
    let body = lenient_object(&body);

    let Some(email) = string_field(&body, "email")
        .and_then(|raw| Email::parse(&raw).ok())
        .filter(Email::is_deliverable)
    else {
        return Ok(link_response(StatusCode::BAD_REQUEST, "invalid_email"));
    };

    let decision = state.access().authorize_email(&email);
    if !decision.allowed {
        tracing::info!(email = %email, reason = %decision.reason, "Magic link refused by access gate");
        return Ok(link_response(StatusCode::FORBIDDEN, "unauthorized_domain"));
    }

    let verifier = PkceVerifier::generate();
    session
        .insert(session_keys::PKCE_VERIFIER, &verifier)
        .await?;

    if let Err(e) = state.identity().send_magic_link(&email, &verifier).await {
        tracing::error!(email = %email, error = %e, "Failed to send magic link");
        return Ok((
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "ok": false, "reason": "send_failed", "message": e.to_string() })),
        )
            .into_response());
    }

    tracing::info!(email = %email, "Magic link sent");
    Ok(Json(json!({ "ok": true })).into_response())
}

/// Route ping for `GET /api/auth/send-magic-link`.
pub async fn send_magic_link_status() -> Json<serde_json::Value> {
    Json(json!({ "ok": true, "route": "send-magic-link" }))
}

// =============================================================================
// Link Landings
// =============================================================================

/// Verify an emailed token hash and start a portal session.
pub async fn confirm(
    State(state): State<AppState>,
    session: Session,
    Query(query): Query<ConfirmQuery>,
) -> Response {
    let (Some(token_hash), Some(otp_type)) = (
        query.token_hash.filter(|t| !t.is_empty()),
        query.otp_type.filter(|t| !t.is_empty()),
    ) else {
        tracing::warn!("Confirm link missing token_hash or type");
        return Redirect::to("/login?missing_code=1").into_response();
    };

    let Ok(otp_type) = otp_type.parse::<OtpType>() else {
        tracing::warn!(otp_type = %otp_type, "Confirm link has unknown type");
        return Redirect::to("/login?auth_error=1").into_response();
    };

    let auth = match state.identity().verify_otp(&token_hash, otp_type).await {
        Ok(auth) => auth,
        Err(e) => {
            tracing::warn!(error = %e, "Failed to verify confirm link");
            return Redirect::to("/login?auth_error=1").into_response();
        }
    };

    let landing = safe_next(query.next.as_deref());
    start_session(&state, &session, auth, landing).await
}

/// Exchange a PKCE code for a provider session and start a portal session.
///
/// The verifier is taken out of the session whatever the outcome, so a code
/// can only be redeemed once per link request.
pub async fn callback(
    State(state): State<AppState>,
    session: Session,
    Query(query): Query<CallbackQuery>,
) -> Response {
    let Some(code) = query.code.filter(|c| !c.is_empty()) else {
        tracing::warn!("Auth callback missing code");
        return Redirect::to("/login?missing_code=1").into_response();
    };

    let verifier = match session
        .remove::<PkceVerifier>(session_keys::PKCE_VERIFIER)
        .await
    {
        Ok(Some(verifier)) => verifier,
        Ok(None) => {
            tracing::warn!("Auth callback without a PKCE verifier in session");
            return Redirect::to("/login?auth_error=1").into_response();
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to read PKCE verifier from session");
            return Redirect::to("/login?auth_error=1").into_response();
        }
    };

    let auth = match state.identity().exchange_code(&code, &verifier).await {
        Ok(auth) => auth,
        Err(e) => {
            tracing::warn!(error = %e, "Failed to exchange auth code");
            return Redirect::to("/login?auth_error=1").into_response();
        }
    };

    start_session(&state, &session, auth, DEFAULT_LANDING).await
}

/// Gate the provider user and, if allowed, store them in the portal session.
///
/// A denied user has their provider session revoked before the redirect.
async fn start_session(
    state: &AppState,
    session: &Session,
    auth: AuthSession,
    landing: &str,
) -> Response {
    let email = match auth.user.email() {
        Ok(email) => email,
        Err(e) => {
            tracing::warn!(error = %e, "Provider session has no usable email");
            revoke(state, &auth.access_token).await;
            return Redirect::to("/login?auth_error=1").into_response();
        }
    };

    let decision = state.access().authorize_email(&email);
    if !decision.allowed {
        tracing::warn!(email = %email, reason = %decision.reason, "Sign-in refused by access gate");
        revoke(state, &auth.access_token).await;
        return Redirect::to("/login?unauthorized=1").into_response();
    }

    let user = CurrentUser {
        display_name: auth.user.display_name(),
        email,
        access_token: auth.access_token,
    };

    if let Err(e) = set_current_user(session, &user).await {
        tracing::error!(error = %e, "Failed to store user in session");
        return Redirect::to("/login?auth_error=1").into_response();
    }

    set_sentry_user(user.email.as_str());
    tracing::info!(email = %user.email, role = %decision.role, "User signed in");
    Redirect::to(landing).into_response()
}

/// Best-effort provider sign-out.
async fn revoke(state: &AppState, access_token: &str) {
    if let Err(e) = state.identity().sign_out(access_token).await {
        tracing::warn!(error = %e, "Failed to revoke provider session");
    }
}

/// Accept only same-site relative paths as a post-login destination.
fn safe_next(next: Option<&str>) -> &str {
    match next {
        Some(path)
            if path.starts_with('/')
                && !path.starts_with("//")
                && !path.starts_with("/\\") =>
        {
            path
        }
        _ => DEFAULT_LANDING,
    }
}

// =============================================================================
// Sign Out
// =============================================================================

/// End the portal session and redirect to the login page.
///
/// Provider logout is best effort; the portal session is cleared regardless.
pub async fn sign_out(
    State(state): State<AppState>,
    session: Session,
    OptionalUser(user): OptionalUser,
) -> Response {
    if let Some(user) = &user {
        revoke(&state, &user.access_token).await;
        tracing::info!(email = %user.email, "User signed out");
    }

    if let Err(e) = clear_current_user(&session).await {
        tracing::error!(error = %e, "Failed to clear session");
    }
    clear_sentry_user();

    Redirect::to("/login").into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_safe_next() {
        assert_eq!(safe_next(None), "/");
        assert_eq!(safe_next(Some("/chat")), "/chat");
        assert_eq!(safe_next(Some("/chat?x=1")), "/chat?x=1");
        assert_eq!(safe_next(Some("https://evil.example")), "/");
        assert_eq!(safe_next(Some("//evil.example")), "/");
        assert_eq!(safe_next(Some("/\\evil.example")), "/");
        assert_eq!(safe_next(Some("chat")), "/");
        assert_eq!(safe_next(Some("")), "/");
    }
}
