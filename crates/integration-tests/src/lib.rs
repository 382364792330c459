//! Integration tests for the Submissions Hub portal.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p submissions-hub-integration-tests
//! ```
//!
//! Each test starts the full portal router on an ephemeral port. The identity
//! provider and the workflow webhooks are played by one mockito server:
//!
//! - `/auth/v1/*` - identity provider
//! - `/webhook/chat` - chat webhook
//! - `/webhook/stop` - stop webhook
//!
//! # Test Categories
//!
//! - `auth` - magic link, link landings, sign-out
//! - `api` - identity, roles, config and forms
//! - `chat` - chat relay, stop, conversation ids

#![allow(clippy::unwrap_used, clippy::missing_panics_doc)]

use std::collections::HashMap;
use std::net::SocketAddr;

use mockito::{Matcher, Mock, ServerGuard};
use reqwest::{Client, Response, header};
use serde_json::json;
use tokio::task::JoinHandle;

use submissions_hub_portal::config::PortalConfig;
use submissions_hub_portal::routes;
use submissions_hub_portal::state::AppState;

/// Admin allowlisted in every test context.
pub const ADMIN_EMAIL: &str = "boss@partner.org";

/// Domain allowlisted in every test context.
pub const ALLOWED_DOMAIN: &str = "example.com";

/// Client IP sent on every request as `x-forwarded-for`.
pub const CLIENT_IP: &str = "203.0.113.7";

/// A running portal wired to a mock upstream.
pub struct TestContext {
    /// Cookie-keeping client that does not follow redirects.
    pub client: Client,
    /// Base URL of the running portal.
    pub base_url: String,
    /// Mock identity provider and workflow webhooks.
    pub upstream: ServerGuard,
    server: JoinHandle<()>,
}

impl TestContext {
    /// Start a portal with the default test configuration.
    pub async fn new() -> Self {
        Self::with_env(&[]).await
    }

    /// Start a portal, overriding or removing configuration variables.
    ///
    /// An empty value removes the variable.
    pub async fn with_env(overrides: &[(&str, &str)]) -> Self {
        let upstream = mockito::Server::new_async().await;
        let upstream_url = upstream.url();

        let mut vars: HashMap<String, String> = [
            ("SUPABASE_URL", upstream_url.clone()),
            ("SUPABASE_ANON_KEY", "anon-test-key".to_owned()),
            ("N8N_WEBHOOK_URL", format!("{upstream_url}/webhook/chat")),
            ("N8N_STOP_WEBHOOK_URL", format!("{upstream_url}/webhook/stop")),
            ("N8N_TIMEOUT_SECS", "5".to_owned()),
            ("ADMIN_EMAILS", ADMIN_EMAIL.to_owned()),
            ("ALLOWED_EMAIL_DOMAINS", ALLOWED_DOMAIN.to_owned()),
            ("AIRTABLE_URL_MEETING_UPLOAD", "https://forms.example/meeting".to_owned()),
            ("AIRTABLE_EMBED_REPORT_UPLOAD", "https://embed.example/report".to_owned()),
            ("BIG_NEWS_BADGE", "New".to_owned()),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_owned(), v))
        .collect();

        for (key, value) in overrides {
            vars.insert((*key).to_owned(), (*value).to_owned());
        }

        let config = PortalConfig::from_lookup(|key| vars.get(key).cloned())
            .expect("test configuration is valid");
        let state = AppState::new(config).expect("test state builds");
        let app = routes::app(state);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            axum::serve(
                listener,
                app.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .await
            .unwrap();
        });

        let mut headers = header::HeaderMap::new();
        headers.insert("x-forwarded-for", header::HeaderValue::from_static(CLIENT_IP));
        let client = Client::builder()
            .cookie_store(true)
            .redirect(reqwest::redirect::Policy::none())
            .default_headers(headers)
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            base_url: format!("http://{addr}"),
            upstream,
            server,
        }
    }

    /// Absolute URL for a portal path.
    #[must_use]
    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// GET a portal path.
    pub async fn get(&self, path: &str) -> Response {
        self.client.get(self.url(path)).send().await.unwrap()
    }

    /// POST a JSON body to a portal path.
    pub async fn post_json(&self, path: &str, body: &serde_json::Value) -> Response {
        self.client
            .post(self.url(path))
            .json(body)
            .send()
            .await
            .unwrap()
    }

    /// POST a raw body to a portal path.
    pub async fn post_raw(&self, path: &str, body: &'static str) -> Response {
        self.client
            .post(self.url(path))
            .header(header::CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
            .unwrap()
    }

    /// Mock the provider's `/verify` for one token hash.
    pub async fn mock_verify(&mut self, token_hash: &str, email: &str) -> Mock {
        self.upstream
            .mock("POST", "/auth/v1/verify")
            .match_header("apikey", "anon-test-key")
            .match_body(Matcher::PartialJson(json!({ "token_hash": token_hash })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(session_body(email, &format!("access-{token_hash}")))
            .create_async()
            .await
    }

    /// Mock the provider's `/logout`.
    pub async fn mock_logout(&mut self) -> Mock {
        self.upstream
            .mock("POST", "/auth/v1/logout")
            .with_status(204)
            .create_async()
            .await
    }

    /// Sign in through `/auth/confirm` against a mocked provider.
    ///
    /// The session cookie stays in the client's cookie store.
    pub async fn sign_in(&mut self, email: &str) -> Response {
        let token_hash = format!("hash-{}", email.replace(['@', '.'], "-"));
        let _verify = self.mock_verify(&token_hash, email).await;

        let response = self
            .get(&format!(
                "/auth/confirm?token_hash={token_hash}&type=magiclink"
            ))
            .await;
        assert_eq!(response.status(), 303, "sign-in should redirect");
        response
    }
}

impl Drop for TestContext {
    fn drop(&mut self) {
        self.server.abort();
    }
}

/// A provider session body for `email`.
#[must_use]
pub fn session_body(email: &str, access_token: &str) -> String {
    json!({
        "access_token": access_token,
        "token_type": "bearer",
        "expires_in": 3600,
        "refresh_token": "refresh-token",
        "user": {
            "id": "00000000-0000-4000-8000-000000000001",
            "email": email,
            "user_metadata": {"full_name": "Test User"}
        }
    })
    .to_string()
}

/// `Location` header of a redirect response.
#[must_use]
pub fn location(response: &Response) -> &str {
    response
        .headers()
        .get(header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
}
