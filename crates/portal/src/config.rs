//! Portal configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `SUPABASE_URL` - Identity provider base URL (falls back to `NEXT_PUBLIC_SUPABASE_URL`)
//! - `SUPABASE_ANON_KEY` - Identity provider anon key (falls back to `NEXT_PUBLIC_SUPABASE_ANON_KEY`)
//! - `N8N_WEBHOOK_URL` - Workflow webhook that answers chat turns
//!
//! ## Optional
//! - `PORTAL_HOST` - Bind address (default: 127.0.0.1)
//! - `PORTAL_PORT` - Listen port (default: 3000)
//! - `PORTAL_BASE_URL` - Public URL of the portal (default: `http://localhost:3000`)
//! - `ADMIN_EMAILS` - Comma-separated admin allowlist
//! - `ALLOWED_EMAIL_DOMAINS` - Comma-separated domain allowlist (empty allows every domain)
//! - `N8N_WEBHOOK_TOKEN` - Bearer token sent to the chat webhook
//! - `N8N_STOP_WEBHOOK_URL` - Webhook notified when an interview is stopped
//! - `N8N_TIMEOUT_SECS` - Chat webhook timeout (default: 60)
//! - `SUPABASE_TIMEOUT_SECS` - Identity provider request timeout (default: 10)
//! - `SENTRY_DSN`, `SENTRY_ENVIRONMENT`, `SENTRY_SAMPLE_RATE`, `SENTRY_TRACES_SAMPLE_RATE`
//!
//! ## Optional (front-end links and feature flags)
//! - `AIRTABLE_URL_MEETING_UPLOAD`, `AIRTABLE_URL_ARTICLE_UPLOAD`,
//!   `AIRTABLE_URL_AI_EXCHANGE_UPLOAD`, `AIRTABLE_BASE_ADMIN_URL`,
//!   `AIRTABLE_URL_DOCUMENTS_UPLOAD`, `ELEVEN_LABS_CONVO` (or `11_LABS_CONVO`),
//!   `NEWS_SUBMISSION_URL`
//! - `AIRTABLE_EMBED_REPORT_UPLOAD`, `AIRTABLE_EMBED_ARTICLE_UPLOAD` - Form embeds
//! - `SHOW_BIG_NEWS_BANNER` - Only the literal `false` hides the banner
//! - `BIG_NEWS_BADGE` - Banner badge text (default: Breaking)

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use secrecy::SecretString;
use submissions_hub_core::AccessPolicy;
use thiserror::Error;
use url::Url;

const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;
const DEFAULT_WEBHOOK_TIMEOUT_SECS: u64 = 60;
const DEFAULT_IDENTITY_TIMEOUT_SECS: u64 = 10;
const DEFAULT_BIG_NEWS_BADGE: &str = "Breaking";

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "secret",
    "password",
    "xxx",
    "todo",
    "fixme",
    "insert",
    "enter-",
    "put-your",
    "add-your",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// Portal application configuration.
#[derive(Debug, Clone)]
pub struct PortalConfig {
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Public base URL of the portal
    pub base_url: String,
    /// Identity provider settings
    pub identity: IdentityConfig,
    /// Workflow webhook settings
    pub relay: RelayConfig,
    /// Admin and domain allowlists, parsed once
    pub access: AccessPolicy,
    /// Destinations and flags handed to the front-end
    pub links: PortalLinks,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment (e.g., "development", "staging", "production")
    pub sentry_environment: Option<String>,
    /// Sentry error sample rate (0.0 to 1.0)
    pub sentry_sample_rate: f32,
    /// Sentry traces sample rate for performance monitoring (0.0 to 1.0)
    pub sentry_traces_sample_rate: f32,
}

/// Identity provider (Supabase GoTrue) configuration.
///
/// Implements `Debug` manually to redact the anon key.
#[derive(Clone)]
pub struct IdentityConfig {
    /// Project URL, e.g. `https://abc.supabase.co`
    pub url: Url,
    /// Public anon key sent as the `apikey` header
    pub anon_key: SecretString,
    /// Timeout for a single provider call
    pub timeout: Duration,
}

impl std::fmt::Debug for IdentityConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentityConfig")
            .field("url", &self.url.as_str())
            .field("anon_key", &"[REDACTED]")
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Workflow webhook configuration.
///
/// Implements `Debug` manually to redact the bearer token.
#[derive(Clone)]
pub struct RelayConfig {
    /// Webhook answering chat turns
    pub webhook_url: Url,
    /// Bearer token for the chat webhook
    pub webhook_token: Option<SecretString>,
    /// Webhook notified when an interview is stopped
    pub stop_webhook_url: Option<Url>,
    /// Timeout for a single chat webhook call
    pub timeout: Duration,
}

impl std::fmt::Debug for RelayConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelayConfig")
            .field("webhook_url", &self.webhook_url.as_str())
            .field(
                "webhook_token",
                &self.webhook_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field(
                "stop_webhook_url",
                &self.stop_webhook_url.as_ref().map(Url::as_str),
            )
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// External destinations and feature flags served by `/api/config` and
/// `/api/forms/{slug}`. Unset destinations are empty strings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PortalLinks {
    pub meeting_upload: String,
    pub article_upload: String,
    pub ai_exchange_upload: String,
    pub admin_base: String,
    pub documents_upload: String,
    pub eleven_labs: String,
    pub news: String,
    pub report_upload_embed: String,
    pub article_upload_embed: String,
    pub show_big_news_banner: bool,
    pub big_news_badge: String,
}

impl PortalConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    ///
    /// Empty values are treated as unset.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let env = Env(&lookup);

        let host = env
            .or_default("PORTAL_HOST", "127.0.0.1")
            .parse::<IpAddr>()
            .map_err(|e| ConfigError::InvalidEnvVar("PORTAL_HOST".to_string(), e.to_string()))?;
        let port = env
            .or_default("PORTAL_PORT", "3000")
            .parse::<u16>()
            .map_err(|e| ConfigError::InvalidEnvVar("PORTAL_PORT".to_string(), e.to_string()))?;
        let base_url = env.or_default("PORTAL_BASE_URL", "http://localhost:3000");
        parse_url("PORTAL_BASE_URL", &base_url)?;

        let identity = IdentityConfig::from_env(&env)?;
        let relay = RelayConfig::from_env(&env)?;

        let access = AccessPolicy::from_lists(
            &env.optional("ADMIN_EMAILS").unwrap_or_default(),
            &env.optional("ALLOWED_EMAIL_DOMAINS").unwrap_or_default(),
        );

        let links = PortalLinks::from_env(&env);

        let sentry_dsn = env.optional("SENTRY_DSN");
        let sentry_environment = env.optional("SENTRY_ENVIRONMENT");
        let sentry_sample_rate = env
            .optional("SENTRY_SAMPLE_RATE")
            .and_then(|s| s.parse().ok())
            .unwrap_or(1.0);
        let sentry_traces_sample_rate = env
            .optional("SENTRY_TRACES_SAMPLE_RATE")
            .and_then(|s| s.parse().ok())
            .unwrap_or(1.0);

        Ok(Self {
            host,
            port,
            base_url,
            identity,
            relay,
            access,
            links,
            sentry_dsn,
            sentry_environment,
            sentry_sample_rate,
            sentry_traces_sample_rate,
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Whether session cookies should carry the `Secure` attribute.
    #[must_use]
    pub fn is_secure(&self) -> bool {
        self.base_url.starts_with("https://")
    }
}

impl IdentityConfig {
    fn from_env(env: &Env<'_>) -> Result<Self, ConfigError> {
        let url = env.required_with_fallback("SUPABASE_URL", "NEXT_PUBLIC_SUPABASE_URL")?;
        let anon_key =
            env.required_with_fallback("SUPABASE_ANON_KEY", "NEXT_PUBLIC_SUPABASE_ANON_KEY")?;

        Ok(Self {
            url: parse_url("SUPABASE_URL", &url)?,
            anon_key: SecretString::from(anon_key),
            timeout: env.seconds("SUPABASE_TIMEOUT_SECS", DEFAULT_IDENTITY_TIMEOUT_SECS)?,
        })
    }
}

impl RelayConfig {
    fn from_env(env: &Env<'_>) -> Result<Self, ConfigError> {
        let webhook_url = parse_url("N8N_WEBHOOK_URL", &env.required("N8N_WEBHOOK_URL")?)?;

        let webhook_token = env.optional("N8N_WEBHOOK_TOKEN").map(|token| {
            if let Err(e) = validate_secret_strength(&token, "N8N_WEBHOOK_TOKEN") {
                tracing::warn!("N8N_WEBHOOK_TOKEN validation warning: {e}");
            }
            SecretString::from(token)
        });

        let stop_webhook_url = env
            .optional("N8N_STOP_WEBHOOK_URL")
            .map(|url| parse_url("N8N_STOP_WEBHOOK_URL", &url))
            .transpose()?;

        Ok(Self {
            webhook_url,
            webhook_token,
            stop_webhook_url,
            timeout: env.seconds("N8N_TIMEOUT_SECS", DEFAULT_WEBHOOK_TIMEOUT_SECS)?,
        })
    }
}

impl PortalLinks {
    fn from_env(env: &Env<'_>) -> Self {
        let get = |key: &str| env.optional(key).unwrap_or_default();

        Self {
            meeting_upload: get("AIRTABLE_URL_MEETING_UPLOAD"),
            article_upload: get("AIRTABLE_URL_ARTICLE_UPLOAD"),
            ai_exchange_upload: get("AIRTABLE_URL_AI_EXCHANGE_UPLOAD"),
            admin_base: get("AIRTABLE_BASE_ADMIN_URL"),
            documents_upload: get("AIRTABLE_URL_DOCUMENTS_UPLOAD"),
            eleven_labs: env
                .optional("ELEVEN_LABS_CONVO")
                .or_else(|| env.optional("11_LABS_CONVO"))
                .unwrap_or_default(),
            news: get("NEWS_SUBMISSION_URL"),
            report_upload_embed: get("AIRTABLE_EMBED_REPORT_UPLOAD"),
            article_upload_embed: get("AIRTABLE_EMBED_ARTICLE_UPLOAD"),
            show_big_news_banner: env.optional("SHOW_BIG_NEWS_BANNER").as_deref() != Some("false"),
            big_news_badge: env.or_default("BIG_NEWS_BADGE", DEFAULT_BIG_NEWS_BADGE),
        }
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Variable lookup shared by the `from_env` constructors.
struct Env<'a>(&'a dyn Fn(&str) -> Option<String>);

impl Env<'_> {
    /// Get an optional variable. Blank values count as unset.
    fn optional(&self, key: &str) -> Option<String> {
        (self.0)(key).filter(|v| !v.trim().is_empty())
    }

    /// Get a required variable.
    fn required(&self, key: &str) -> Result<String, ConfigError> {
        self.optional(key)
            .ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))
    }

    /// Get a required variable, accepting a legacy name as fallback.
    fn required_with_fallback(&self, key: &str, fallback: &str) -> Result<String, ConfigError> {
        self.optional(key)
            .or_else(|| self.optional(fallback))
            .ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))
    }

    /// Get a variable with a default value.
    fn or_default(&self, key: &str, default: &str) -> String {
        self.optional(key).unwrap_or_else(|| default.to_string())
    }

    /// Get a duration given in whole seconds.
    fn seconds(&self, key: &str, default: u64) -> Result<Duration, ConfigError> {
        let secs = self
            .optional(key)
            .map(|s| {
                s.trim()
                    .parse::<u64>()
                    .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
            })
            .transpose()?
            .unwrap_or(default);
        Ok(Duration::from_secs(secs))
    }
}

fn parse_url(key: &str, value: &str) -> Result<Url, ConfigError> {
    Url::parse(value).map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}

/// Calculate Shannon entropy in bits per character.
fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }

    let mut freq: HashMap<char, usize> = HashMap::new();
    for c in s.chars() {
        *freq.entry(c).or_insert(0) += 1;
    }

    #[allow(clippy::cast_precision_loss)] // String length will never exceed f64 precision
    let len = s.len() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)] // Character count will never exceed f64 precision
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Validate that a secret is not a placeholder and has sufficient entropy.
fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();

    if let Some(pattern) = PLACEHOLDER_PATTERNS.iter().find(|p| lower.contains(*p)) {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!("appears to be a placeholder (contains '{pattern}')"),
        ));
    }

    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}). Use a randomly generated secret."
            ),
        ));
    }

    Ok(())
}
