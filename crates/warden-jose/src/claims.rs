//! # Claim Sets and the Token Triple
//!
//! One claims type covers every token flavor the provider issues; the
//! constructors fix which optional fields each flavor carries. Registered
//! claims (`iss`, `iat`, `exp`, `jti`) are always present; `sub` is absent
//! on detached-signature and payload tokens; the `data` claim carries either
//! a payload hash (detached signatures) or an arbitrary JSON value (payload
//! envelopes). Optional fields are omitted from the wire entirely, so each
//! flavor serializes to exactly its own claim set.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;
use warden_policy::Principal;

/// The token type string in issued token triples.
pub const TOKEN_TYPE_BEARER: &str = "Bearer";

/// A verified or to-be-signed claim set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Subject: who the token authenticates. Absent on detached-signature
    /// and payload tokens.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,
    /// Granted authorities. Only access tokens carry these.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub authorities: Vec<String>,
    /// Display name. Only id tokens carry this.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Email address. Only id tokens carry this.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Detached-signature hash (hex) or encrypted payload, by token flavor.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    /// Issuer.
    pub iss: String,
    /// Issued-at, epoch seconds.
    pub iat: i64,
    /// Expiry, epoch seconds.
    pub exp: i64,
    /// Unique token id.
    pub jti: String,
}

impl TokenClaims {
    fn base(issuer: &str, now: DateTime<Utc>, ttl: Duration) -> Self {
        Self {
            sub: None,
            authorities: Vec::new(),
            name: None,
            email: None,
            data: None,
            iss: issuer.to_string(),
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
            jti: Uuid::new_v4().to_string(),
        }
    }

    /// Access-token claims: subject plus authorities.
    pub fn access(
        subject: &str,
        authorities: &[String],
        issuer: &str,
        now: DateTime<Utc>,
        ttl: Duration,
    ) -> Self {
        Self {
            sub: Some(subject.to_string()),
            authorities: authorities.to_vec(),
            ..Self::base(issuer, now, ttl)
        }
    }

    /// Id-token claims: subject plus display attributes.
    pub fn id(
        subject: &str,
        name: Option<String>,
        email: Option<String>,
        issuer: &str,
        now: DateTime<Utc>,
        ttl: Duration,
    ) -> Self {
        Self {
            sub: Some(subject.to_string()),
            name,
            email,
            ..Self::base(issuer, now, ttl)
        }
    }

    /// Refresh-token claims: subject only.
    pub fn refresh(subject: &str, issuer: &str, now: DateTime<Utc>, ttl: Duration) -> Self {
        Self {
            sub: Some(subject.to_string()),
            ..Self::base(issuer, now, ttl)
        }
    }

    /// Detached-signature claims: the payload hash (lowercase hex) under
    /// `data`, no subject.
    pub fn detached_signature(
        hash_hex: &str,
        issuer: &str,
        now: DateTime<Utc>,
        ttl: Duration,
    ) -> Self {
        Self {
            data: Some(Value::String(hash_hex.to_string())),
            ..Self::base(issuer, now, ttl)
        }
    }

    /// Payload-envelope claims: an arbitrary JSON value under `data`, no
    /// subject.
    pub fn payload(data: Value, issuer: &str, now: DateTime<Utc>, ttl: Duration) -> Self {
        Self {
            data: Some(data),
            ..Self::base(issuer, now, ttl)
        }
    }

    /// Derive the authenticated principal, when the claims carry a subject.
    pub fn to_principal(&self) -> Option<Principal> {
        self.sub
            .as_ref()
            .map(|sub| Principal::new(sub.clone(), self.authorities.clone()))
    }

    /// The `data` claim as a string, when present and textual.
    pub fn data_str(&self) -> Option<&str> {
        self.data.as_ref().and_then(Value::as_str)
    }
}

/// The issued token triple: access, id, and refresh tokens with their
/// expiries in seconds. Immutable once returned; superseded, never mutated,
/// on refresh.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Token {
    /// The access token (possibly JWE-wrapped).
    pub access_token: String,
    /// Always `"Bearer"`.
    pub token_type: String,
    /// Access-token lifetime in seconds.
    pub access_token_expires_in: i64,
    /// The id token (possibly JWE-wrapped).
    pub id_token: String,
    /// Id-token lifetime in seconds.
    pub id_token_expires_in: i64,
    /// The refresh token (possibly JWE-wrapped); single-use.
    pub refresh_token: String,
    /// Refresh-token lifetime in seconds.
    pub refresh_token_expires_in: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> DateTime<Utc> {
        Utc::now()
    }

    #[test]
    fn access_claims_carry_authorities() {
        let claims = TokenClaims::access(
            "alice",
            &["ROLE_USER".to_string()],
            "https://warden.example",
            now(),
            Duration::seconds(3600),
        );
        assert_eq!(claims.sub.as_deref(), Some("alice"));
        assert_eq!(claims.authorities, vec!["ROLE_USER"]);
        assert!(claims.name.is_none());
        assert_eq!(claims.exp - claims.iat, 3600);
    }

    #[test]
    fn id_claims_carry_display_attributes() {
        let claims = TokenClaims::id(
            "alice",
            Some("Alice Example".to_string()),
            Some("alice@example.com".to_string()),
            "https://warden.example",
            now(),
            Duration::seconds(3600),
        );
        assert_eq!(claims.name.as_deref(), Some("Alice Example"));
        assert_eq!(claims.email.as_deref(), Some("alice@example.com"));
        assert!(claims.authorities.is_empty());
    }

    #[test]
    fn id_claims_omit_unknown_display_attributes() {
        let claims = TokenClaims::id(
            "bob",
            None,
            None,
            "https://warden.example",
            now(),
            Duration::seconds(3600),
        );
        assert!(claims.name.is_none());
        assert!(claims.email.is_none());
        let json = serde_json::to_value(&claims).unwrap();
        assert!(json.get("name").is_none());
        assert!(json.get("email").is_none());
    }

    #[test]
    fn refresh_claims_carry_subject_only() {
        let claims =
            TokenClaims::refresh("alice", "https://warden.example", now(), Duration::days(1));
        let json = serde_json::to_value(&claims).unwrap();
        let mut keys: Vec<_> = json.as_object().unwrap().keys().cloned().collect();
        keys.sort();
        assert_eq!(keys, vec!["exp", "iat", "iss", "jti", "sub"]);
    }

    #[test]
    fn signature_claims_have_no_subject() {
        let claims = TokenClaims::detached_signature(
            "deadbeef",
            "https://warden.example",
            now(),
            Duration::seconds(300),
        );
        assert!(claims.sub.is_none());
        assert_eq!(claims.data_str(), Some("deadbeef"));
    }

    #[test]
    fn payload_claims_carry_arbitrary_json() {
        let value = serde_json::json!({"city": "Istanbul", "population": 15462452});
        let claims = TokenClaims::payload(
            value.clone(),
            "https://warden.example",
            now(),
            Duration::seconds(300),
        );
        assert_eq!(claims.data, Some(value));
        assert!(claims.data_str().is_none()); // not textual
    }

    #[test]
    fn jti_is_unique_per_claim_set() {
        let a = TokenClaims::refresh("x", "iss", now(), Duration::days(1));
        let b = TokenClaims::refresh("x", "iss", now(), Duration::days(1));
        assert_ne!(a.jti, b.jti);
    }

    #[test]
    fn principal_derivation() {
        let claims = TokenClaims::access(
            "alice",
            &["ROLE_ADMIN".to_string()],
            "iss",
            now(),
            Duration::seconds(60),
        );
        let principal = claims.to_principal().unwrap();
        assert_eq!(principal.subject(), "alice");
        assert!(principal.has_authority("ROLE_ADMIN"));

        let unsubjected =
            TokenClaims::detached_signature("ab", "iss", now(), Duration::seconds(60));
        assert!(unsubjected.to_principal().is_none());
    }

    #[test]
    fn token_triple_serializes_camel_case() {
        let token = Token {
            access_token: "a".into(),
            token_type: TOKEN_TYPE_BEARER.into(),
            access_token_expires_in: 3600,
            id_token: "b".into(),
            id_token_expires_in: 3600,
            refresh_token: "c".into(),
            refresh_token_expires_in: 86400,
        };
        let json = serde_json::to_value(&token).unwrap();
        assert_eq!(json["accessToken"], "a");
        assert_eq!(json["tokenType"], "Bearer");
        assert_eq!(json["refreshTokenExpiresIn"], 86400);
    }
}
