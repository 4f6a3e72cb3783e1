//! # Authenticated Principal
//!
//! The identity abstraction the security pipeline passes downstream once a
//! bearer token has been validated: a subject plus its granted authorities.
//! The principal travels as an explicit value (a request extension in the
//! HTTP layer) — never as ambient per-thread state.

use serde::{Deserialize, Serialize};

/// Well-known authority strings.
pub mod authority {
    /// Full administrative access.
    pub const ADMIN: &str = "ROLE_ADMIN";
    /// Standard authenticated user.
    pub const USER: &str = "ROLE_USER";
    /// Unauthenticated caller.
    pub const ANONYMOUS: &str = "ROLE_ANONYMOUS";
}

/// An authenticated identity: subject and granted authorities.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    subject: String,
    authorities: Vec<String>,
}

impl Principal {
    /// Create a principal.
    pub fn new(subject: impl Into<String>, authorities: Vec<String>) -> Self {
        Self {
            subject: subject.into(),
            authorities,
        }
    }

    /// The subject (user name) this principal authenticates.
    pub fn subject(&self) -> &str {
        &self.subject
    }

    /// Granted authorities, in grant order.
    pub fn authorities(&self) -> &[String] {
        &self.authorities
    }

    /// Whether the principal holds `authority`.
    pub fn has_authority(&self, authority: &str) -> bool {
        self.authorities.iter().any(|a| a == authority)
    }
}

impl std::fmt::Display for Principal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.subject)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn principal_exposes_subject_and_authorities() {
        let p = Principal::new(
            "alice",
            vec![authority::ADMIN.to_string(), authority::USER.to_string()],
        );
        assert_eq!(p.subject(), "alice");
        assert_eq!(p.authorities().len(), 2);
        assert!(p.has_authority(authority::ADMIN));
        assert!(!p.has_authority(authority::ANONYMOUS));
    }

    #[test]
    fn display_is_subject() {
        let p = Principal::new("bob", vec![authority::USER.to_string()]);
        assert_eq!(p.to_string(), "bob");
    }

    #[test]
    fn serde_roundtrip() {
        let p = Principal::new("alice", vec![authority::USER.to_string()]);
        let json = serde_json::to_string(&p).unwrap();
        let back: Principal = serde_json::from_str(&json).unwrap();
        assert_eq!(p, back);
    }
}
