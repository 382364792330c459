//! Access policy commands.
//!
//! # Usage
//!
//! ```bash
//! hub-cli check jane@example.com boss@partner.org
//! hub-cli --json policy
//! ```

use serde_json::json;
use submissions_hub_core::{AccessDecision, AccessPolicy};

use super::{CommandError, Output, emit};

/// Print the gate decision for every email.
///
/// Returns `true` when every email is allowed.
///
/// # Errors
///
/// Returns an error if the results cannot be written.
pub fn check(policy: &AccessPolicy, emails: &[String], output: Output) -> Result<bool, CommandError> {
    let decisions: Vec<(&str, AccessDecision)> = emails
        .iter()
        .map(|email| (email.as_str(), policy.authorize(email)))
        .collect();

    let all_allowed = decisions.iter().all(|(_, decision)| decision.allowed);

    match output {
        Output::Text => emit(
            decisions
                .iter()
                .map(|(email, decision)| decision_line(email, decision)),
        )?,
        Output::Json => {
            let rows: Vec<_> = decisions
                .iter()
                .map(|(email, decision)| {
                    json!({
                        "email": email,
                        "allowed": decision.allowed,
                        "role": decision.role,
                        "reason": decision.reason,
                    })
                })
                .collect();
            emit([serde_json::to_string_pretty(&rows)?])?;
        }
    }

    if !all_allowed {
        tracing::info!(
            denied = decisions.iter().filter(|(_, d)| !d.allowed).count(),
            "Some emails are not allowed"
        );
    }
    Ok(all_allowed)
}

/// Print the allowlists as the portal parses them.
///
/// # Errors
///
/// Returns an error if the results cannot be written.
pub fn policy(policy: &AccessPolicy, output: Output) -> Result<(), CommandError> {
    match output {
        Output::Text => emit(policy_lines(policy)),
        Output::Json => {
            let value = json!({
                "adminEmails": policy.admin_emails().collect::<Vec<_>>(),
                "allowedDomains": policy.allowed_domains().collect::<Vec<_>>(),
                "domainGateOpen": policy.is_domain_gate_open(),
            });
            emit([serde_json::to_string_pretty(&value)?])
        }
    }
}

fn decision_line(email: &str, decision: &AccessDecision) -> String {
    if decision.allowed {
        format!("{email}\tallowed\t{}\t{}", decision.role, decision.reason)
    } else {
        format!("{email}\tdenied\t-\t{}", decision.reason)
    }
}

fn policy_lines(policy: &AccessPolicy) -> Vec<String> {
    let mut lines = vec!["Admin emails:".to_owned()];
    lines.extend(policy.admin_emails().map(|email| format!("  {email}")));
    if policy.admin_emails().next().is_none() {
        lines.push("  (none)".to_owned());
    }

    lines.push("Allowed domains:".to_owned());
    if policy.is_domain_gate_open() {
        lines.push("  (any domain - gate is open)".to_owned());
    } else {
        lines.extend(policy.allowed_domains().map(|domain| format!("  {domain}")));
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decision_line() {
        let policy = AccessPolicy::from_lists("boss@partner.org", "example.com");

        assert_eq!(
            decision_line("boss@partner.org", &policy.authorize("boss@partner.org")),
            "boss@partner.org\tallowed\tadmin\tadmin"
        );
        assert_eq!(
            decision_line("jane@example.com", &policy.authorize("jane@example.com")),
            "jane@example.com\tallowed\tcontributor\tdomain"
        );
        assert_eq!(
            decision_line("x@else.net", &policy.authorize("x@else.net")),
            "x@else.net\tdenied\t-\tunauthorized"
        );
        assert_eq!(
            decision_line("nope", &policy.authorize("nope")),
            "nope\tdenied\t-\tinvalid"
        );
    }

    #[test]
    fn test_policy_lines_open_gate() {
        let lines = policy_lines(&AccessPolicy::from_lists("", ""));
        assert_eq!(
            lines,
            vec![
                "Admin emails:",
                "  (none)",
                "Allowed domains:",
                "  (any domain - gate is open)",
            ]
        );
    }

    #[test]
    fn test_policy_lines_lists_entries() {
        let lines = policy_lines(&AccessPolicy::from_lists("b@x.io, a@x.io", "example.com"));
        assert!(lines.contains(&"  a@x.io".to_owned()));
        assert!(lines.contains(&"  b@x.io".to_owned()));
        assert!(lines.iter().any(|l| l.contains("example.com")));
    }
}
