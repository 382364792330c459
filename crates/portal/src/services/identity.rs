//! Identity provider client (Supabase GoTrue REST API).
//!
//! The portal never stores credentials. Sign-in is a one-time email link:
//!
//! 1. `send_magic_link` asks the provider to email a link, carrying the S256
//!    challenge of a PKCE verifier kept in the portal session.
//! 2. The link lands on `/auth/confirm` (`token_hash` flow, [`IdentityClient::verify_otp`])
//!    or `/auth/callback` (PKCE flow, [`IdentityClient::exchange_code`]).
//! 3. Either returns an [`AuthSession`] whose user email goes through the
//!    access gate before anything is written to the portal session.
//!
//! # API Reference
//!
//! - Base URL: `{SUPABASE_URL}/auth/v1`
//! - Authentication: `apikey: <anon key>` on every call, plus a bearer user
//!   token for `/logout`

use std::sync::Arc;

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::RngCore;
use reqwest::header::{HeaderMap, HeaderValue};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::instrument;
use url::Url;

use submissions_hub_core::Email;

use crate::config::IdentityConfig;

/// Errors that can occur when talking to the identity provider.
#[derive(Debug, Error)]
pub enum IdentityError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Provider returned an error response.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Failed to parse response.
    #[error("Parse error: {0}")]
    Parse(String),

    /// The provider session carries no email address.
    #[error("Provider user has no usable email address")]
    MissingEmail,
}

/// One-time token types accepted by `/verify`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OtpType {
    Email,
    Magiclink,
    Signup,
    Recovery,
    Invite,
    EmailChange,
}

impl std::str::FromStr for OtpType {
    type Err = IdentityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "email" => Ok(Self::Email),
            "magiclink" => Ok(Self::Magiclink),
            "signup" => Ok(Self::Signup),
            "recovery" => Ok(Self::Recovery),
            "invite" => Ok(Self::Invite),
            "email_change" => Ok(Self::EmailChange),
            other => Err(IdentityError::Parse(format!("unknown OTP type: {other}"))),
        }
    }
}

/// Provider session returned by `/verify` and `/token`.
#[derive(Clone, Deserialize)]
pub struct AuthSession {
    pub access_token: String,
    pub user: AuthUser,
}

impl std::fmt::Debug for AuthSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthSession")
            .field("access_token", &"[REDACTED]")
            .field("user", &self.user)
            .finish()
    }
}

/// Provider user record (only the fields the portal reads).
#[derive(Debug, Clone, Deserialize)]
pub struct AuthUser {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub user_metadata: Map<String, Value>,
}

impl AuthUser {
    /// Normalized email of the user.
    ///
    /// # Errors
    ///
    /// Returns `IdentityError::MissingEmail` if the user has no valid email.
    pub fn email(&self) -> Result<Email, IdentityError> {
        self.email
            .as_deref()
            .and_then(|e| Email::parse(e).ok())
            .ok_or(IdentityError::MissingEmail)
    }

    /// `user_metadata.username`, else `user_metadata.full_name`.
    #[must_use]
    pub fn display_name(&self) -> Option<String> {
        ["username", "full_name"].iter().find_map(|key| {
            self.user_metadata
                .get(*key)
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|name| !name.is_empty())
                .map(String::from)
        })
    }
}

/// PKCE code verifier (RFC 7636) for the magic-link flow.
#[derive(Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PkceVerifier(String);

impl PkceVerifier {
    /// Generate a new verifier from 32 random bytes (43 URL-safe characters).
    #[must_use]
    pub fn generate() -> Self {
        let mut bytes = [0u8; 32];
        rand::rng().fill_bytes(&mut bytes);
        Self(URL_SAFE_NO_PAD.encode(bytes))
    }

    /// The verifier sent when exchanging the code.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The S256 challenge sent with the OTP request.
    #[must_use]
    pub fn challenge(&self) -> String {
        URL_SAFE_NO_PAD.encode(Sha256::digest(self.0.as_bytes()))
    }
}

#[derive(Serialize)]
struct OtpRequest<'a> {
    email: &'a str,
    create_user: bool,
    code_challenge: &'a str,
    code_challenge_method: &'static str,
}

#[derive(Serialize)]
struct VerifyRequest<'a> {
    #[serde(rename = "type")]
    otp_type: OtpType,
    token_hash: &'a str,
}

#[derive(Serialize)]
struct PkceTokenRequest<'a> {
    auth_code: &'a str,
    code_verifier: &'a str,
}

/// Identity provider API client.
#[derive(Clone)]
pub struct IdentityClient {
    inner: Arc<IdentityClientInner>,
}

struct IdentityClientInner {
    client: reqwest::Client,
    base_url: String,
}

impl IdentityClient {
    /// Create a new identity provider client.
    ///
    /// # Errors
    ///
    /// Returns error if the anon key is not a valid header value or the HTTP
    /// client fails to build.
    pub fn new(config: &IdentityConfig) -> Result<Self, IdentityError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            "apikey",
            HeaderValue::from_str(config.anon_key.expose_secret())
                .map_err(|e| IdentityError::Parse(format!("Invalid anon key format: {e}")))?,
        );

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(config.timeout)
            .build()?;

        Ok(Self {
            inner: Arc::new(IdentityClientInner {
                client,
                base_url: config.url.as_str().trim_end_matches('/').to_string(),
            }),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/auth/v1{path}", self.inner.base_url)
    }

    /// Ask the provider to email a one-time sign-in link.
    ///
    /// New users are created on first sign-in; the access gate runs before
    /// this call so only allowed addresses ever reach the provider.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the provider rejects it.
    #[instrument(skip_all, fields(email = %email))]
    pub async fn send_magic_link(
        &self,
        email: &Email,
        verifier: &PkceVerifier,
    ) -> Result<(), IdentityError> {
        let challenge = verifier.challenge();
        let body = OtpRequest {
            email: email.as_str(),
            create_user: true,
            code_challenge: &challenge,
            code_challenge_method: "s256",
        };

        let response = self
            .inner
            .client
            .post(self.endpoint("/otp"))
            .json(&body)
            .send()
            .await?;

        if response.status().is_success() {
            tracing::debug!("Magic link requested");
            return Ok(());
        }

        Err(parse_error(response).await)
    }

    /// Verify the `token_hash` from an email link.
    ///
    /// # Errors
    ///
    /// Returns an error if the token is invalid, expired or already used.
    #[instrument(skip(self, token_hash))]
    pub async fn verify_otp(
        &self,
        token_hash: &str,
        otp_type: OtpType,
    ) -> Result<AuthSession, IdentityError> {
        let body = VerifyRequest {
            otp_type,
            token_hash,
        };

        let response = self
            .inner
            .client
            .post(self.endpoint("/verify"))
            .json(&body)
            .send()
            .await?;

        handle_session(response).await
    }

    /// Exchange a PKCE authorization code for a session.
    ///
    /// # Errors
    ///
    /// Returns an error if the code or verifier is rejected.
    #[instrument(skip_all)]
    pub async fn exchange_code(
        &self,
        auth_code: &str,
        verifier: &PkceVerifier,
    ) -> Result<AuthSession, IdentityError> {
        let mut url = Url::parse(&self.endpoint("/token"))
            .map_err(|e| IdentityError::Parse(format!("Invalid token URL: {e}")))?;
        url.query_pairs_mut().append_pair("grant_type", "pkce");

        let body = PkceTokenRequest {
            auth_code,
            code_verifier: verifier.as_str(),
        };

        let response = self.inner.client.post(url).json(&body).send().await?;

        handle_session(response).await
    }

    /// Revoke a provider session.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the provider rejects it.
    #[instrument(skip_all)]
    pub async fn sign_out(&self, access_token: &str) -> Result<(), IdentityError> {
        let response = self
            .inner
            .client
            .post(self.endpoint("/logout"))
            .bearer_auth(access_token)
            .send()
            .await?;

        if response.status().is_success() {
            return Ok(());
        }

        Err(parse_error(response).await)
    }

    /// Check that the provider is reachable.
    ///
    /// # Errors
    ///
    /// Returns an error if the provider does not answer with a 2xx status.
    pub async fn health(&self) -> Result<(), IdentityError> {
        let response = self
            .inner
            .client
            .get(self.endpoint("/health"))
            .send()
            .await?;

        if response.status().is_success() {
            return Ok(());
        }

        Err(parse_error(response).await)
    }
}

async fn handle_session(response: reqwest::Response) -> Result<AuthSession, IdentityError> {
    if !response.status().is_success() {
        return Err(parse_error(response).await);
    }

    response
        .json()
        .await
        .map_err(|e| IdentityError::Parse(format!("Failed to parse session: {e}")))
}

/// Turn a non-2xx provider response into an `IdentityError::Api`.
///
/// GoTrue reports errors under `msg`, `error_description` or `message`
/// depending on the endpoint.
async fn parse_error(response: reqwest::Response) -> IdentityError {
    let status = response.status().as_u16();
    let text = response.text().await.unwrap_or_default();

    let message = serde_json::from_str::<Value>(&text)
        .ok()
        .and_then(|body| {
            ["msg", "error_description", "message", "error"]
                .iter()
                .find_map(|key| body.get(*key).and_then(Value::as_str).map(String::from))
        })
        .unwrap_or(text);

    tracing::error!(status = status, message = %message, "Identity provider error");

    IdentityError::Api { status, message }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use mockito::{Matcher, Server};
    use serde_json::json;

    use super::*;

    fn client_at(url: &str, timeout: Duration) -> IdentityClient {
        IdentityClient::new(&IdentityConfig {
            url: Url::parse(url).unwrap(),
            anon_key: SecretString::from("anon-test-key"),
            timeout,
        })
        .unwrap()
    }

    fn client_for(server: &Server) -> IdentityClient {
        client_at(&server.url(), Duration::from_secs(5))
    }

    fn session_body() -> String {
        json!({
            "access_token": "access-123",
            "token_type": "bearer",
            "expires_in": 3600,
            "refresh_token": "refresh-456",
            "user": {
                "id": "6f1c2b1e-0000-4000-8000-000000000001",
                "email": "Jane@Example.com",
                "user_metadata": {"full_name": "Jane Doe"}
            }
        })
        .to_string()
    }

    #[test]
    fn test_pkce_challenge_matches_rfc7636_vector() {
        let verifier = PkceVerifier("dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk".to_string());
        assert_eq!(
            verifier.challenge(),
            "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM"
        );
    }

    #[test]
    fn test_pkce_verifier_length() {
        let verifier = PkceVerifier::generate();
        assert_eq!(verifier.as_str().len(), 43);
        assert_ne!(verifier.as_str(), PkceVerifier::generate().as_str());
    }

    #[test]
    fn test_otp_type_parsing() {
        assert_eq!("magiclink".parse::<OtpType>().unwrap(), OtpType::Magiclink);
        assert_eq!(
            "email_change".parse::<OtpType>().unwrap(),
            OtpType::EmailChange
        );
        assert!("sms".parse::<OtpType>().is_err());
        assert_eq!(
            serde_json::to_value(OtpType::EmailChange).unwrap(),
            json!("email_change")
        );
    }

    #[test]
    fn test_display_name_precedence() {
        let user: AuthUser = serde_json::from_value(json!({
            "id": "1",
            "email": "a@b.co",
            "user_metadata": {"username": "jd", "full_name": "Jane Doe"}
        }))
        .unwrap();
        assert_eq!(user.display_name().as_deref(), Some("jd"));

        let user: AuthUser = serde_json::from_value(json!({
            "id": "1",
            "user_metadata": {"username": " ", "full_name": "Jane Doe"}
        }))
        .unwrap();
        assert_eq!(user.display_name().as_deref(), Some("Jane Doe"));
        assert!(matches!(user.email(), Err(IdentityError::MissingEmail)));

        let user: AuthUser = serde_json::from_value(json!({"id": "1"})).unwrap();
        assert_eq!(user.display_name(), None);
    }

    #[tokio::test]
    async fn test_send_magic_link_sends_challenge() {
        let mut server = Server::new_async().await;
        let verifier = PkceVerifier::generate();
        let mock = server
            .mock("POST", "/auth/v1/otp")
            .match_header("apikey", "anon-test-key")
            .match_body(Matcher::PartialJson(json!({
                "email": "jane@example.com",
                "create_user": true,
                "code_challenge": verifier.challenge(),
                "code_challenge_method": "s256"
            })))
            .with_status(200)
            .with_body("{}")
            .create_async()
            .await;

        let email = Email::parse("jane@example.com").unwrap();
        let result = client_for(&server).send_magic_link(&email, &verifier).await;

        mock.assert_async().await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_send_magic_link_reports_provider_message() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/auth/v1/otp")
            .with_status(429)
            .with_body(r#"{"code":429,"msg":"Email rate limit exceeded"}"#)
            .create_async()
            .await;

        let email = Email::parse("jane@example.com").unwrap();
        let err = client_for(&server)
            .send_magic_link(&email, &PkceVerifier::generate())
            .await
            .unwrap_err();

        match err {
            IdentityError::Api { status, message } => {
                assert_eq!(status, 429);
                assert_eq!(message, "Email rate limit exceeded");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_verify_otp_returns_session() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/auth/v1/verify")
            .match_body(Matcher::Json(json!({
                "type": "magiclink",
                "token_hash": "hash-abc"
            })))
            .with_status(200)
            .with_body(session_body())
            .create_async()
            .await;

        let session = client_for(&server)
            .verify_otp("hash-abc", OtpType::Magiclink)
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(session.access_token, "access-123");
        assert_eq!(session.user.email().unwrap().as_str(), "jane@example.com");
        assert_eq!(session.user.display_name().as_deref(), Some("Jane Doe"));
    }

    #[tokio::test]
    async fn test_verify_otp_rejected() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/auth/v1/verify")
            .with_status(403)
            .with_body(r#"{"error_description":"Token has expired or is invalid"}"#)
            .create_async()
            .await;

        let err = client_for(&server)
            .verify_otp("stale", OtpType::Email)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Token has expired"));
    }

    #[tokio::test]
    async fn test_exchange_code_uses_pkce_grant() {
        let mut server = Server::new_async().await;
        let verifier = PkceVerifier::generate();
        let mock = server
            .mock("POST", "/auth/v1/token")
            .match_query(Matcher::UrlEncoded("grant_type".into(), "pkce".into()))
            .match_body(Matcher::Json(json!({
                "auth_code": "code-1",
                "code_verifier": verifier.as_str()
            })))
            .with_status(200)
            .with_body(session_body())
            .create_async()
            .await;

        let session = client_for(&server)
            .exchange_code("code-1", &verifier)
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(session.user.id, "6f1c2b1e-0000-4000-8000-000000000001");
    }

    #[tokio::test]
    async fn test_sign_out_sends_bearer() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/auth/v1/logout")
            .match_header("authorization", "Bearer access-123")
            .match_header("apikey", "anon-test-key")
            .with_status(204)
            .create_async()
            .await;

        client_for(&server).sign_out("access-123").await.unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_health() {
        let mut server = Server::new_async().await;
        let _ok = server
            .mock("GET", "/auth/v1/health")
            .with_status(200)
            .with_body(r#"{"name":"GoTrue"}"#)
            .create_async()
            .await;
        assert!(client_for(&server).health().await.is_ok());

        let mut down = Server::new_async().await;
        let _fail = down
            .mock("GET", "/auth/v1/health")
            .with_status(503)
            .create_async()
            .await;
        assert!(client_for(&down).health().await.is_err());
    }

    #[tokio::test]
    async fn test_unresponsive_provider_times_out() {
        // Accepts connections but never answers.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let _silent = tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });

        let client = client_at(&format!("http://{addr}"), Duration::from_millis(200));
        let result = tokio::time::timeout(Duration::from_secs(5), client.health())
            .await
            .expect("client timeout fires first");
        assert!(matches!(result, Err(IdentityError::Http(ref e)) if e.is_timeout()));
    }
}
