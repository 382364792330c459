//! Portal roles.

use serde::{Deserialize, Serialize};

/// Role granted to an authorized portal user.
///
/// Roles are derived from the access policy on every use; they are never
/// persisted or cached in a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Listed in the admin allowlist. Bypasses the domain restriction.
    Admin,
    /// Any other authorized user.
    Contributor,
}

impl Role {
    /// Returns the wire name of the role.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Contributor => "contributor",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_role_wire_names() {
        assert_eq!(serde_json::to_string(&Role::Admin).unwrap(), "\"admin\"");
        assert_eq!(
            serde_json::to_string(&Role::Contributor).unwrap(),
            "\"contributor\""
        );
        assert_eq!(Role::Admin.to_string(), "admin");
    }
}
