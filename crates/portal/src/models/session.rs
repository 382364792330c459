//! Session-related types for portal authentication.

use serde::{Deserialize, Serialize};

use submissions_hub_core::Email;

/// Session-stored user identity.
///
/// The role is deliberately absent: it is re-derived from the access policy
/// on every request so allowlist changes apply on the next restart.
#[derive(Clone, Serialize, Deserialize)]
pub struct CurrentUser {
    /// Verified email address.
    pub email: Email,
    /// Display name from the identity provider's user metadata.
    pub display_name: Option<String>,
    /// Provider access token, kept only to revoke the session on sign-out.
    pub access_token: String,
}

impl CurrentUser {
    /// Name shown to the workflow engine: the display name, else the local
    /// part of the email.
    #[must_use]
    pub fn username(&self) -> &str {
        self.display_name
            .as_deref()
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| self.email.local_part())
    }
}

impl std::fmt::Debug for CurrentUser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CurrentUser")
            .field("email", &self.email)
            .field("display_name", &self.display_name)
            .field("access_token", &"[REDACTED]")
            .finish()
    }
}

/// Session keys for authentication data.
pub mod keys {
    /// Key for storing the current signed-in user.
    pub const CURRENT_USER: &str = "current_user";

    /// Key for the PKCE code verifier of a pending magic-link sign-in.
    pub const PKCE_VERIFIER: &str = "pkce_verifier";
}
