//! CLI command implementations.

pub mod access;
pub mod conversation;

use std::io::Write;

use submissions_hub_core::AccessPolicy;
use thiserror::Error;

/// Errors that can occur while running a command.
#[derive(Debug, Error)]
pub enum CommandError {
    /// Writing to stdout failed.
    #[error("Output error: {0}")]
    Io(#[from] std::io::Error),

    /// Result could not be encoded as JSON.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// How results are printed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Output {
    Text,
    Json,
}

/// Build the access policy from the same variables the portal reads.
///
/// Unset variables are treated as empty lists.
pub fn load_policy() -> AccessPolicy {
    dotenvy::dotenv().ok();

    let var = |key: &str| std::env::var(key).unwrap_or_default();
    let policy = AccessPolicy::from_lists(&var("ADMIN_EMAILS"), &var("ALLOWED_EMAIL_DOMAINS"));

    if policy.is_domain_gate_open() {
        tracing::warn!("ALLOWED_EMAIL_DOMAINS is empty: every email domain is allowed");
    }
    policy
}

/// Write lines to stdout.
fn emit<I>(lines: I) -> Result<(), CommandError>
where
    I: IntoIterator<Item = String>,
{
    let mut stdout = std::io::stdout().lock();
    for line in lines {
        writeln!(stdout, "{line}")?;
    }
    Ok(())
}
