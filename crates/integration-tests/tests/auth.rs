//! Integration tests for sign-in, the access gate, and sign-out.

#![allow(clippy::unwrap_used)]

use mockito::Matcher;
use serde_json::{Value, json};
use submissions_hub_integration_tests::{ADMIN_EMAIL, TestContext, location, session_body};

// ============================================================================
// Health
// ============================================================================

#[tokio::test]
async fn test_health() {
    let ctx = TestContext::new().await;
    let resp = ctx.get("/health").await;
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.text().await.unwrap(), "ok");
}

#[tokio::test]
async fn test_readiness_follows_identity_provider() {
    let mut ctx = TestContext::new().await;

    let down = ctx
        .upstream
        .mock("GET", "/auth/v1/health")
        .with_status(503)
        .create_async()
        .await;
    assert_eq!(ctx.get("/health/ready").await.status(), 503);
    down.remove_async().await;

    let _up = ctx
        .upstream
        .mock("GET", "/auth/v1/health")
        .with_status(200)
        .with_body("{}")
        .create_async()
        .await;
    assert_eq!(ctx.get("/health/ready").await.status(), 200);
}

#[tokio::test]
async fn test_security_headers_and_request_id() {
    let ctx = TestContext::new().await;
    let resp = ctx.get("/health").await;
    assert_eq!(resp.headers()["x-content-type-options"], "nosniff");
    assert!(resp.headers().contains_key("x-request-id"));
}

// ============================================================================
// Magic Link
// ============================================================================

#[tokio::test]
async fn test_send_magic_link_route_ping() {
    let ctx = TestContext::new().await;
    let resp = ctx.get("/api/auth/send-magic-link").await;
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body, json!({"ok": true, "route": "send-magic-link"}));
}

#[tokio::test]
async fn test_send_magic_link_rejects_malformed_email() {
    let ctx = TestContext::new().await;

    for body in [json!({"email": "not-an-email"}), json!({"email": "a@b"}), json!({})] {
        let resp = ctx.post_json("/api/auth/send-magic-link", &body).await;
        assert_eq!(resp.status(), 400, "for {body}");
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body, json!({"ok": false, "reason": "invalid_email"}));
    }

    let resp = ctx.post_raw("/api/auth/send-magic-link", "{oops").await;
    assert_eq!(resp.status(), 400);
}

#[tokio::test]
async fn test_send_magic_link_refuses_other_domains_without_calling_provider() {
    let mut ctx = TestContext::new().await;
    let otp = ctx
        .upstream
        .mock("POST", "/auth/v1/otp")
        .expect(0)
        .create_async()
        .await;

    let resp = ctx
        .post_json("/api/auth/send-magic-link", &json!({"email": "x@else.net"}))
        .await;
    assert_eq!(resp.status(), 403);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body, json!({"ok": false, "reason": "unauthorized_domain"}));

    otp.assert_async().await;
}

#[tokio::test]
async fn test_send_magic_link_success_sends_pkce_challenge() {
    let mut ctx = TestContext::new().await;
    let otp = ctx
        .upstream
        .mock("POST", "/auth/v1/otp")
        .match_header("apikey", "anon-test-key")
        .match_body(Matcher::PartialJson(json!({
            "email": "jane@example.com",
            "create_user": true,
            "code_challenge_method": "s256"
        })))
        .with_status(200)
        .with_body("{}")
        .create_async()
        .await;

    let resp = ctx
        .post_json("/api/auth/send-magic-link", &json!({"email": "  Jane@Example.COM "}))
        .await;
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body, json!({"ok": true}));

    otp.assert_async().await;
}

#[tokio::test]
async fn test_send_magic_link_reports_provider_failure() {
    let mut ctx = TestContext::new().await;
    let _otp = ctx
        .upstream
        .mock("POST", "/auth/v1/otp")
        .with_status(429)
        .with_body(r#"{"msg":"Email rate limit exceeded"}"#)
        .create_async()
        .await;

    let resp = ctx
        .post_json("/api/auth/send-magic-link", &json!({"email": ADMIN_EMAIL}))
        .await;
    assert_eq!(resp.status(), 500);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["ok"], false);
    assert_eq!(body["reason"], "send_failed");
    assert!(
        body["message"]
            .as_str()
            .unwrap()
            .contains("Email rate limit exceeded")
    );
}

#[tokio::test]
async fn test_send_magic_link_is_rate_limited() {
    let ctx = TestContext::new().await;
    let mut statuses = Vec::new();
    for _ in 0..8 {
        let resp = ctx
            .post_json("/api/auth/send-magic-link", &json!({"email": "bad"}))
            .await;
        statuses.push(resp.status().as_u16());
    }
    assert!(statuses.contains(&429), "statuses: {statuses:?}");
}

// ============================================================================
// Link Landings
// ============================================================================

#[tokio::test]
async fn test_confirm_missing_parameters() {
    let ctx = TestContext::new().await;
    for path in ["/auth/confirm", "/auth/confirm?token_hash=abc", "/auth/confirm?type=email"] {
        let resp = ctx.get(path).await;
        assert_eq!(resp.status(), 303, "for {path}");
        assert_eq!(location(&resp), "/login?missing_code=1");
    }
}

#[tokio::test]
async fn test_confirm_provider_failure() {
    let mut ctx = TestContext::new().await;
    let _verify = ctx
        .upstream
        .mock("POST", "/auth/v1/verify")
        .with_status(403)
        .with_body(r#"{"msg":"Token has expired or is invalid"}"#)
        .create_async()
        .await;

    let resp = ctx.get("/auth/confirm?token_hash=stale&type=magiclink").await;
    assert_eq!(location(&resp), "/login?auth_error=1");

    let resp = ctx.get("/api/me").await;
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body, json!({"email": null, "role": null}));
}

#[tokio::test]
async fn test_confirm_success_honors_relative_next() {
    let mut ctx = TestContext::new().await;
    let _verify = ctx.mock_verify("h1", "jane@example.com").await;

    let resp = ctx
        .get("/auth/confirm?token_hash=h1&type=email&next=/chat")
        .await;
    assert_eq!(resp.status(), 303);
    assert_eq!(location(&resp), "/chat");

    let body: Value = ctx.get("/api/me").await.json().await.unwrap();
    assert_eq!(body, json!({"email": "jane@example.com", "role": "contributor"}));
}

#[tokio::test]
async fn test_confirm_ignores_offsite_next() {
    let mut ctx = TestContext::new().await;
    let _verify = ctx.mock_verify("h2", "jane@example.com").await;

    let resp = ctx
        .get("/auth/confirm?token_hash=h2&type=email&next=//evil.example/x")
        .await;
    assert_eq!(location(&resp), "/");
}

#[tokio::test]
async fn test_confirm_denied_user_is_signed_out_upstream() {
    let mut ctx = TestContext::new().await;
    let _verify = ctx.mock_verify("h3", "intruder@else.net").await;
    let logout = ctx
        .upstream
        .mock("POST", "/auth/v1/logout")
        .match_header("authorization", "Bearer access-h3")
        .with_status(204)
        .create_async()
        .await;

    let resp = ctx.get("/auth/confirm?token_hash=h3&type=magiclink").await;
    assert_eq!(location(&resp), "/login?unauthorized=1");
    logout.assert_async().await;

    let body: Value = ctx.get("/api/me").await.json().await.unwrap();
    assert_eq!(body["email"], Value::Null);
}

#[tokio::test]
async fn test_callback_requires_code_and_verifier() {
    let ctx = TestContext::new().await;

    let resp = ctx.get("/auth/callback").await;
    assert_eq!(location(&resp), "/login?missing_code=1");

    // No magic link was requested from this browser, so no verifier exists.
    let resp = ctx.get("/auth/callback?code=abc").await;
    assert_eq!(location(&resp), "/login?auth_error=1");
}

#[tokio::test]
async fn test_callback_exchanges_code_with_stored_verifier() {
    let mut ctx = TestContext::new().await;
    let _otp = ctx
        .upstream
        .mock("POST", "/auth/v1/otp")
        .with_status(200)
        .with_body("{}")
        .create_async()
        .await;
    let token = ctx
        .upstream
        .mock("POST", "/auth/v1/token")
        .match_query(Matcher::UrlEncoded("grant_type".into(), "pkce".into()))
        .match_body(Matcher::PartialJson(json!({"auth_code": "code-1"})))
        .with_status(200)
        .with_body(session_body(ADMIN_EMAIL, "access-admin"))
        .create_async()
        .await;

    let resp = ctx
        .post_json("/api/auth/send-magic-link", &json!({"email": ADMIN_EMAIL}))
        .await;
    assert_eq!(resp.status(), 200);

    let resp = ctx.get("/auth/callback?code=code-1").await;
    assert_eq!(resp.status(), 303);
    assert_eq!(location(&resp), "/");
    token.assert_async().await;

    let body: Value = ctx.get("/api/me").await.json().await.unwrap();
    assert_eq!(body, json!({"email": ADMIN_EMAIL, "role": "admin"}));

    // The verifier is single-use.
    let resp = ctx.get("/auth/callback?code=code-1").await;
    assert_eq!(location(&resp), "/login?auth_error=1");
}

// ============================================================================
// Sign Out
// ============================================================================

#[tokio::test]
async fn test_sign_out_clears_session() {
    let mut ctx = TestContext::new().await;
    ctx.sign_in("jane@example.com").await;
    let logout = ctx.mock_logout().await;

    let resp = ctx.client.post(ctx.url("/auth/signout")).send().await.unwrap();
    assert_eq!(resp.status(), 303);
    assert_eq!(location(&resp), "/login");
    logout.assert_async().await;

    let body: Value = ctx.get("/api/me").await.json().await.unwrap();
    assert_eq!(body, json!({"email": null, "role": null}));
}

#[tokio::test]
async fn test_api_sign_out_without_session() {
    let ctx = TestContext::new().await;
    let resp = ctx
        .client
        .post(ctx.url("/api/auth/signout"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 303);
    assert_eq!(location(&resp), "/login");
}

#[tokio::test]
async fn test_sign_out_succeeds_when_provider_logout_fails() {
    let mut ctx = TestContext::new().await;
    ctx.sign_in("jane@example.com").await;
    let _logout = ctx
        .upstream
        .mock("POST", "/auth/v1/logout")
        .with_status(500)
        .create_async()
        .await;

    let resp = ctx.client.post(ctx.url("/auth/signout")).send().await.unwrap();
    assert_eq!(location(&resp), "/login");

    let body: Value = ctx.get("/api/me").await.json().await.unwrap();
    assert_eq!(body["email"], Value::Null);
}
