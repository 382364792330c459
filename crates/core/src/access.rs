//! Access gate: who may use the portal, and with which role.
//!
//! The policy is two allowlists read from configuration once at startup:
//!
//! - **admin emails** - exact, case-insensitive matches. Admins bypass the
//!   domain restriction entirely.
//! - **allowed domains** - compared against everything from the last `@` of
//!   the address onward. Entries may be written with or without a leading
//!   `@`; they are normalized to carry one.
//!
//! An empty domain list means *every* domain is allowed. This open default is
//! intentional and is kept as-is; the portal logs a warning at startup when it
//! is in effect.
//!
//! ```
//! use submissions_hub_core::{AccessPolicy, AccessReason, Role};
//!
//! let policy = AccessPolicy::from_lists("boss@partner.org", "example.com, @corp.io");
//!
//! let staff = policy.authorize("Jane@Example.com");
//! assert!(staff.allowed);
//! assert_eq!(staff.role, Role::Contributor);
//!
//! let boss = policy.authorize("boss@partner.org");
//! assert_eq!((boss.allowed, boss.role, boss.reason), (true, Role::Admin, AccessReason::Admin));
//!
//! assert!(!policy.authorize("someone@else.net").allowed);
//! ```

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::types::{Email, Role};

/// Why the gate reached its decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessReason {
    /// The address is in the admin allowlist.
    Admin,
    /// The address belongs to an allowed domain (or the domain gate is open).
    Domain,
    /// Well-formed address that matched neither list.
    Unauthorized,
    /// Not an email address (no `@`).
    Invalid,
}

impl AccessReason {
    /// Returns the wire name of the reason.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Domain => "domain",
            Self::Unauthorized => "unauthorized",
            Self::Invalid => "invalid",
        }
    }
}

impl std::fmt::Display for AccessReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of [`AccessPolicy::authorize`].
///
/// `role` is only meaningful when `allowed` is true; callers must check
/// `allowed` first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AccessDecision {
    /// Whether the bearer of the address may use the portal.
    pub allowed: bool,
    /// Role the user acts with.
    pub role: Role,
    /// Why the decision was made.
    pub reason: AccessReason,
}

/// Admin and domain allowlists.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccessPolicy {
    admin_emails: BTreeSet<String>,
    allowed_domains: BTreeSet<String>,
}

impl AccessPolicy {
    /// Build a policy from explicit lists. Entries are trimmed and lowercased;
    /// empty entries are dropped and domains gain a leading `@`.
    pub fn new<A, D>(admin_emails: A, allowed_domains: D) -> Self
    where
        A: IntoIterator,
        A::Item: AsRef<str>,
        D: IntoIterator,
        D::Item: AsRef<str>,
    {
        let admin_emails = admin_emails
            .into_iter()
            .filter_map(|e| normalize_entry(e.as_ref()))
            .collect();

        let allowed_domains = allowed_domains
            .into_iter()
            .filter_map(|d| normalize_entry(d.as_ref()))
            .map(|d| if d.starts_with('@') { d } else { format!("@{d}") })
            .collect();

        Self {
            admin_emails,
            allowed_domains,
        }
    }

    /// Build a policy from the raw comma-separated configuration values.
    #[must_use]
    pub fn from_lists(admin_emails: &str, allowed_domains: &str) -> Self {
        Self::new(admin_emails.split(','), allowed_domains.split(','))
    }

    /// Normalized admin allowlist.
    pub fn admin_emails(&self) -> impl Iterator<Item = &str> {
        self.admin_emails.iter().map(String::as_str)
    }

    /// Normalized domain allowlist (each entry starts with `@`).
    pub fn allowed_domains(&self) -> impl Iterator<Item = &str> {
        self.allowed_domains.iter().map(String::as_str)
    }

    /// True when no domain restriction is configured.
    #[must_use]
    pub fn is_domain_gate_open(&self) -> bool {
        self.allowed_domains.is_empty()
    }

    /// Whether the normalized address is in the admin allowlist.
    #[must_use]
    pub fn is_admin(&self, email: &str) -> bool {
        self.admin_emails.contains(&email.trim().to_lowercase())
    }

    /// Whether the address's domain passes the domain gate.
    ///
    /// Addresses without an `@` never pass, even when the gate is open.
    #[must_use]
    pub fn is_domain_allowed(&self, email: &str) -> bool {
        let email = email.trim().to_lowercase();
        let Some(at) = email.rfind('@') else {
            return false;
        };

        if self.allowed_domains.is_empty() {
            return true;
        }

        email
            .get(at..)
            .is_some_and(|domain| self.allowed_domains.contains(domain))
    }

    /// Decide whether `email` may use the portal, and with which role.
    #[must_use]
    pub fn authorize(&self, email: &str) -> AccessDecision {
        let email = email.trim().to_lowercase();

        if !email.contains('@') {
            return AccessDecision {
                allowed: false,
                role: Role::Contributor,
                reason: AccessReason::Invalid,
            };
        }

        if self.is_admin(&email) {
            return AccessDecision {
                allowed: true,
                role: Role::Admin,
                reason: AccessReason::Admin,
            };
        }

        let domain_allowed = self.is_domain_allowed(&email);
        AccessDecision {
            allowed: domain_allowed,
            role: Role::Contributor,
            reason: if domain_allowed {
                AccessReason::Domain
            } else {
                AccessReason::Unauthorized
            },
        }
    }

    /// [`AccessPolicy::authorize`] for an already parsed address.
    #[must_use]
    pub fn authorize_email(&self, email: &Email) -> AccessDecision {
        self.authorize(email.as_str())
    }

    /// Role for an address, regardless of whether it is allowed.
    #[must_use]
    pub fn role_of(&self, email: &Email) -> Role {
        self.authorize_email(email).role
    }
}

fn normalize_entry(raw: &str) -> Option<String> {
    let entry = raw.trim().to_lowercase();
    (!entry.is_empty()).then_some(entry)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn policy() -> AccessPolicy {
        AccessPolicy::from_lists(
            " Boss@Partner.org , chief@example.com,,",
            "example.com, @Corp.IO ,",
        )
    }

    #[test]
    fn test_lists_are_normalized() {
        let p = policy();
        assert_eq!(
            p.admin_emails().collect::<Vec<_>>(),
            vec!["boss@partner.org", "chief@example.com"]
        );
        assert_eq!(
            p.allowed_domains().collect::<Vec<_>>(),
            vec!["@corp.io", "@example.com"]
        );
        assert!(!p.is_domain_gate_open());
    }

    #[test]
    fn test_admin_bypasses_domain_gate() {
        let decision = policy().authorize("boss@partner.org");
        assert_eq!(
            decision,
            AccessDecision {
                allowed: true,
                role: Role::Admin,
                reason: AccessReason::Admin,
            }
        );
    }

    #[test]
    fn test_admin_on_allowed_domain_is_still_admin() {
        let decision = policy().authorize("chief@example.com");
        assert!(decision.allowed);
        assert_eq!(decision.role, Role::Admin);
    }

    #[test]
    fn test_domain_match_is_contributor() {
        let decision = policy().authorize("writer@corp.io");
        assert!(decision.allowed);
        assert_eq!(decision.role, Role::Contributor);
        assert_eq!(decision.reason, AccessReason::Domain);
    }

    #[test]
    fn test_subdomain_does_not_match() {
        let decision = policy().authorize("writer@mail.corp.io");
        assert!(!decision.allowed);
        assert_eq!(decision.reason, AccessReason::Unauthorized);
    }

    #[test]
    fn test_domain_taken_from_last_at() {
        let p = policy();
        assert!(p.authorize("x@evil.net@example.com").allowed);
        assert!(!p.authorize("x@example.com@evil.net").allowed);
    }

    #[test]
    fn test_missing_at_is_invalid() {
        let decision = policy().authorize("not-an-email");
        assert!(!decision.allowed);
        assert_eq!(decision.reason, AccessReason::Invalid);

        let open = AccessPolicy::default();
        assert_eq!(open.authorize("  ").reason, AccessReason::Invalid);
        assert!(!open.is_domain_allowed("nobody"));
    }

    #[test]
    fn test_empty_domain_list_is_open() {
        let open = AccessPolicy::from_lists("", "");
        assert!(open.is_domain_gate_open());
        for email in ["a@b.c", "someone@anywhere.example", "x@y"] {
            let decision = open.authorize(email);
            assert!(decision.allowed, "{email} should be allowed");
            assert_eq!(decision.role, Role::Contributor);
        }
    }

    #[test]
    fn test_case_insensitive_and_idempotent() {
        let p = policy();
        for email in [
            "BOSS@PARTNER.ORG",
            " Writer@Example.Com ",
            "Someone@Else.Net",
            "nope",
        ] {
            let first = p.authorize(email);
            assert_eq!(first, p.authorize(&email.to_lowercase()));
            assert_eq!(first, p.authorize(email));
        }
    }

    #[test]
    fn test_role_of_parsed_email() {
        let p = policy();
        let admin = Email::parse("Boss@partner.org").unwrap();
        let other = Email::parse("random@else.net").unwrap();
        assert_eq!(p.role_of(&admin), Role::Admin);
        assert_eq!(p.role_of(&other), Role::Contributor);
        assert!(!p.authorize_email(&other).allowed);
    }

    #[test]
    fn test_decision_serializes_snake_case() {
        let json = serde_json::to_value(policy().authorize("writer@corp.io")).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"allowed": true, "role": "contributor", "reason": "domain"})
        );
    }
}
